//! Preset directory loading
//!
//! Every `*.json` file in the presets directory holds one preset. Files are
//! loaded in file-name order so resolution is stable across runs; a file that
//! fails to parse is logged and skipped rather than taking the others down.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::document::PresetDocument;
use crate::error::PresetError;
use crate::model::CockpitPreset;
use crate::resolver::{resolve, AircraftIdentity, Resolution};
use crate::version::SimVersion;

/// All presets known to the application
#[derive(Debug, Clone, Default)]
pub struct PresetLibrary {
    presets: Vec<CockpitPreset>,
}

impl PresetLibrary {
    pub fn new(presets: Vec<CockpitPreset>) -> Self {
        Self { presets }
    }

    /// Load every `*.json` preset in `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, PresetError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| PresetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        paths.sort();

        let mut presets = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::load_file(&path) {
                Ok(preset) => presets.push(preset),
                Err(e) => warn!("Skipping preset {}: {}", path.display(), e),
            }
        }

        info!("Loaded {} presets from {}", presets.len(), dir.display());
        Ok(Self { presets })
    }

    /// Load and validate one preset file
    pub fn load_file(path: &Path) -> Result<CockpitPreset, PresetError> {
        let text = fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse and validate one preset document
    pub fn parse(json: &str) -> Result<CockpitPreset, PresetError> {
        let doc: PresetDocument = serde_json::from_str(json)?;
        CockpitPreset::from_document(&doc)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&CockpitPreset> {
        self.presets.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut CockpitPreset> {
        self.presets.get_mut(id)
    }

    pub fn presets(&self) -> &[CockpitPreset] {
        &self.presets
    }

    /// Names for a list of preset ids, skipping unknown ids
    pub fn names(&self, ids: &[usize]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.get(id))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Run the resolver against this library
    pub fn resolve(&self, identity: &AircraftIdentity, version: SimVersion) -> Resolution {
        resolve(identity, version, &self.presets)
    }

    /// Make `id` the selected preset, invalidating its event handles
    pub fn select(&mut self, id: usize) -> Option<&CockpitPreset> {
        let preset = self.presets.get_mut(id)?;
        preset.reset_runtime();
        Some(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let preset = PresetLibrary::parse(
            r#"{
                "presetName": "C172",
                "fsVersion": "FS2020, FS2024",
                "AtcModelKeywords": ["C172"],
                "bgColor": "0000",
                "screenFieldItems": [
                    {"x": "0", "y": "0", "text": "HDG", "textWidth": 3}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(preset.name, "C172");
        assert_eq!(preset.fields.len(), 1);
        assert_eq!(preset.model_keywords, vec!["C172"]);
    }

    #[test]
    fn test_parse_rejects_bad_color() {
        let result = PresetLibrary::parse(r#"{"presetName": "X", "bgColor": "GGGG"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_dir_missing_directory() {
        let result = PresetLibrary::load_dir("/nonexistent/cockpit/presets");
        assert!(matches!(result, Err(PresetError::Io { .. })));
    }

    #[test]
    fn test_names_skip_unknown_ids() {
        let library = PresetLibrary::new(vec![
            PresetLibrary::parse(r#"{"presetName": "A"}"#).unwrap(),
            PresetLibrary::parse(r#"{"presetName": "B"}"#).unwrap(),
        ]);
        assert_eq!(library.names(&[1, 7, 0]), vec!["B", "A"]);
    }
}
