//! Simulator collaborator
//!
//! The bridge talks to the flight simulator through [`SimulatorLink`]. The
//! methods are synchronous because simulator SDKs queue requests and return
//! immediately; value updates flow back asynchronously through the
//! [`SimUpdate`] channel handed over in [`SimulatorLink::connect`].

use cockpit_preset::{EventHandle, SimVariable, SimVersion};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures reported by a simulator link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimLinkError {
    #[error("simulator not connected")]
    NotConnected,

    #[error("cannot connect to simulator: {0}")]
    Connect(String),

    #[error("simulator rejected request: {0}")]
    Request(String),
}

/// One value update for a subscribed variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimUpdate {
    pub variable: String,
    pub value: String,
}

impl SimUpdate {
    pub fn new(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            value: value.into(),
        }
    }
}

/// Telemetry and event service of the flight simulator
pub trait SimulatorLink: Send + Sync {
    /// Open the link; updates for subscribed variables go to `updates`
    fn connect(&self, updates: mpsc::Sender<SimUpdate>) -> Result<(), SimLinkError>;

    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Version of the running simulator
    fn version(&self) -> SimVersion;

    /// Start streaming updates for `variable`
    fn subscribe(&self, variable: &SimVariable) -> Result<(), SimLinkError>;

    /// Drop the subscriptions of the previous preset
    ///
    /// Aircraft identification subscriptions made right after connecting
    /// survive this call.
    fn clear_subscriptions(&self) -> Result<(), SimLinkError>;

    fn set_value(&self, variable: &SimVariable, value: &str) -> Result<(), SimLinkError>;

    /// Register a named event and return the handle used to trigger it
    fn register_event(&self, name: &str) -> Result<EventHandle, SimLinkError>;

    fn transmit_event(&self, handle: EventHandle, payload: u32) -> Result<(), SimLinkError>;

    /// Run calculator code through the scripting side-channel
    fn execute_code(&self, code: &str) -> Result<(), SimLinkError>;
}
