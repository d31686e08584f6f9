//! Application settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use cockpit_engine::DEFAULT_BAUD_RATE;
use cockpit_sim::{VirtualPanelConfig, VirtualSimulatorConfig};
use serde::{Deserialize, Serialize};

/// Where the panel link goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelMode {
    /// A panel on a serial port
    #[default]
    Serial,
    /// An emulated panel, for running without hardware
    Virtual,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Serial port path
    pub port: String,
    pub baud_rate: u32,
    /// Directory holding the preset documents
    pub presets_dir: PathBuf,
    /// Connect on startup and keep reconnecting
    pub keep_connected: bool,
    pub panel_mode: PanelMode,
    /// Firmware the emulated panel reports
    pub virtual_panel: VirtualPanelConfig,
    /// Aircraft the offline simulator announces
    pub simulator: VirtualSimulatorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            presets_dir: PathBuf::from("presets"),
            keep_connected: false,
            panel_mode: PanelMode::Serial,
            virtual_panel: VirtualPanelConfig::default(),
            simulator: VirtualSimulatorConfig::default(),
        }
    }
}

#[cfg(windows)]
fn default_port() -> &'static str {
    "COM3"
}

#[cfg(not(windows))]
fn default_port() -> &'static str {
    "/dev/ttyACM0"
}

impl Settings {
    /// Get the XDG config directory for cockpit-bridge
    /// Uses $XDG_CONFIG_HOME/cockpit-bridge, falls back to ~/.config/cockpit-bridge
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("cockpit-bridge"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("cockpit-bridge"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cockpit-bridge-settings-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.baud_rate, 2400);
        assert_eq!(settings.presets_dir, PathBuf::from("presets"));
        assert_eq!(settings.panel_mode, PanelMode::Serial);
        assert!(!settings.keep_connected);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"port": "COM7", "panel_mode": "virtual"}"#).unwrap();
        assert_eq!(settings.port, "COM7");
        assert_eq!(settings.panel_mode, PanelMode::Virtual);
        assert_eq!(settings.baud_rate, 2400);
        assert_eq!(settings.simulator, VirtualSimulatorConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = scratch_dir("save");
        let path = dir.join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.keep_connected = true;
        settings.simulator.title = "Airbus A320 Neo".into();

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unreadable_file_uses_defaults() {
        let dir = scratch_dir("broken");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(
            Settings::load_from(&dir.join("missing.json")),
            Settings::default()
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
