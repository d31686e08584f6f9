//! Engine tunables

use std::time::Duration;

use cockpit_protocol::FIRMWARE_ID;
use serde::{Deserialize, Serialize};

/// Timing and identity settings of the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period after a knob turn before simulator values are pushed back (ms)
    pub knob_debounce_ms: u64,
    /// Coalescing window for aircraft identification updates (ms)
    pub resolution_delay_ms: u64,
    /// Pause after each field during activation; the panel's input buffer is small (ms)
    pub field_settle_ms: u64,
    /// Period of the connection supervisor (ms)
    pub supervisor_period_ms: u64,
    /// Time the panel gets to process `R` before the link is closed (ms)
    pub reset_grace_ms: u64,
    /// Upper bound on waiting for the read loop during shutdown (ms)
    pub join_timeout_ms: u64,
    /// Firmware id the panel has to report in its `M` reply
    pub firmware_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            knob_debounce_ms: 500,
            resolution_delay_ms: 3000,
            field_settle_ms: 100,
            supervisor_period_ms: 5000,
            reset_grace_ms: 100,
            join_timeout_ms: 2000,
            firmware_id: FIRMWARE_ID.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn knob_debounce(&self) -> Duration {
        Duration::from_millis(self.knob_debounce_ms)
    }

    pub fn resolution_delay(&self) -> Duration {
        Duration::from_millis(self.resolution_delay_ms)
    }

    pub fn field_settle(&self) -> Duration {
        Duration::from_millis(self.field_settle_ms)
    }

    pub fn supervisor_period(&self) -> Duration {
        Duration::from_millis(self.supervisor_period_ms)
    }

    pub fn reset_grace(&self) -> Duration {
        Duration::from_millis(self.reset_grace_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}
