//! Virtual flight simulator
//!
//! Implements [`SimulatorLink`] on top of an in-memory variable table. Values
//! set through [`VirtualSimulator::set_variable`] or written by the bridge are
//! streamed to the bridge for every subscribed variable, and each write,
//! event and script call is recorded for test verification.

use std::collections::HashMap;

use cockpit_engine::{SimLinkError, SimUpdate, SimulatorLink};
use cockpit_preset::{
    AircraftIdentity, EventHandle, SimVariable, SimVersion, ATC_MODEL_VAR, ATC_TYPE_VAR,
    TITLE_VAR,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for creating a virtual simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualSimulatorConfig {
    pub version: SimVersion,
    /// Aircraft loaded when the simulator starts
    pub title: String,
    pub model: String,
    pub aircraft_type: String,
    /// Whether the simulator accepts connections
    pub running: bool,
}

impl Default for VirtualSimulatorConfig {
    fn default() -> Self {
        Self {
            version: SimVersion::Fs2020,
            title: "Cessna Skyhawk G1000".to_string(),
            model: "C172".to_string(),
            aircraft_type: "Cessna".to_string(),
            running: true,
        }
    }
}

/// Request made by the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    SetValue { variable: String, value: String },
    Transmit { event: String, payload: u32 },
    Execute(String),
}

#[derive(Debug, Default)]
struct SimState {
    running: bool,
    updates: Option<mpsc::Sender<SimUpdate>>,
    values: HashMap<String, String>,
    subscriptions: Vec<SimVariable>,
    events: Vec<String>,
    calls: Vec<SimCall>,
}

impl SimState {
    fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.iter().any(|v| v.name == name)
    }

    fn push(&self, name: &str) {
        let (Some(updates), Some(value)) = (self.updates.as_ref(), self.values.get(name)) else {
            return;
        };
        if let Err(e) = updates.try_send(SimUpdate::new(name, value.clone())) {
            warn!("Dropping update for {}: {}", name, e);
        }
    }
}

/// Simulated flight simulator
pub struct VirtualSimulator {
    version: SimVersion,
    state: Mutex<SimState>,
}

impl VirtualSimulator {
    pub fn new(config: VirtualSimulatorConfig) -> Self {
        let values = HashMap::from([
            (TITLE_VAR.to_string(), config.title),
            (ATC_MODEL_VAR.to_string(), config.model),
            (ATC_TYPE_VAR.to_string(), config.aircraft_type),
        ]);
        Self {
            version: config.version,
            state: Mutex::new(SimState {
                running: config.running,
                values,
                ..Default::default()
            }),
        }
    }

    /// Start or stop accepting connections
    pub fn set_running(&self, running: bool) {
        self.state.lock().running = running;
    }

    /// Change a variable and stream it if subscribed
    pub fn set_variable(&self, name: &str, value: &str) {
        let mut state = self.state.lock();
        state.values.insert(name.to_string(), value.to_string());
        if state.is_subscribed(name) {
            state.push(name);
        }
    }

    /// Load another aircraft
    pub fn load_aircraft(&self, title: &str, model: &str, aircraft_type: &str) {
        info!("Virtual simulator loading {}", title);
        self.set_variable(TITLE_VAR, title);
        self.set_variable(ATC_MODEL_VAR, model);
        self.set_variable(ATC_TYPE_VAR, aircraft_type);
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.state.lock().values.get(name).cloned()
    }

    pub fn subscriptions(&self) -> Vec<SimVariable> {
        self.state.lock().subscriptions.clone()
    }

    pub fn registered_events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().calls.clone()
    }

    /// Simulate the simulator going away
    pub fn crash(&self) {
        let mut state = self.state.lock();
        state.updates = None;
        state.subscriptions.clear();
        warn!("Virtual simulator crashed");
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut SimState) -> Result<T, SimLinkError>,
    ) -> Result<T, SimLinkError> {
        let mut state = self.state.lock();
        if state.updates.is_none() {
            return Err(SimLinkError::NotConnected);
        }
        f(&mut state)
    }
}

impl SimulatorLink for VirtualSimulator {
    fn connect(&self, updates: mpsc::Sender<SimUpdate>) -> Result<(), SimLinkError> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(SimLinkError::Connect("simulator is not running".into()));
        }
        state.updates = Some(updates);
        state.subscriptions.clear();
        info!("Virtual simulator connected");
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.state.lock();
        state.updates = None;
        state.subscriptions.clear();
        state.events.clear();
        info!("Virtual simulator disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state.lock().updates.is_some()
    }

    fn version(&self) -> SimVersion {
        self.version
    }

    fn subscribe(&self, variable: &SimVariable) -> Result<(), SimLinkError> {
        self.with_connection(|state| {
            if !state.is_subscribed(&variable.name) {
                debug!("Subscribed to {}", variable.name);
                state.subscriptions.push(variable.clone());
            }
            state.push(&variable.name);
            Ok(())
        })
    }

    fn clear_subscriptions(&self) -> Result<(), SimLinkError> {
        self.with_connection(|state| {
            state
                .subscriptions
                .retain(|v| AircraftIdentity::is_identification(&v.name));
            Ok(())
        })
    }

    fn set_value(&self, variable: &SimVariable, value: &str) -> Result<(), SimLinkError> {
        self.with_connection(|state| {
            state.calls.push(SimCall::SetValue {
                variable: variable.name.clone(),
                value: value.to_string(),
            });
            state.values.insert(variable.name.clone(), value.to_string());
            if state.is_subscribed(&variable.name) {
                state.push(&variable.name);
            }
            Ok(())
        })
    }

    fn register_event(&self, name: &str) -> Result<EventHandle, SimLinkError> {
        self.with_connection(|state| {
            let index = match state.events.iter().position(|e| e == name) {
                Some(index) => index,
                None => {
                    state.events.push(name.to_string());
                    state.events.len() - 1
                }
            };
            u32::try_from(index)
                .map(EventHandle)
                .map_err(|_| SimLinkError::Request(format!("too many events: {name}")))
        })
    }

    fn transmit_event(&self, handle: EventHandle, payload: u32) -> Result<(), SimLinkError> {
        self.with_connection(|state| {
            let event = usize::try_from(handle.0)
                .ok()
                .and_then(|i| state.events.get(i))
                .cloned()
                .ok_or_else(|| {
                    SimLinkError::Request(format!("unknown event handle {}", handle.0))
                })?;
            debug!("Event {} ({})", event, payload);
            state.calls.push(SimCall::Transmit { event, payload });
            Ok(())
        })
    }

    fn execute_code(&self, code: &str) -> Result<(), SimLinkError> {
        self.with_connection(|state| {
            state.calls.push(SimCall::Execute(code.to_string()));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> (VirtualSimulator, mpsc::Receiver<SimUpdate>) {
        let sim = VirtualSimulator::new(VirtualSimulatorConfig::default());
        let (tx, rx) = mpsc::channel(16);
        sim.connect(tx).unwrap();
        (sim, rx)
    }

    #[test]
    fn test_refuses_when_not_running() {
        let sim = VirtualSimulator::new(VirtualSimulatorConfig {
            running: false,
            ..Default::default()
        });
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(sim.connect(tx), Err(SimLinkError::Connect(_))));
        assert_eq!(
            sim.subscribe(&SimVariable::new("TITLE", "")),
            Err(SimLinkError::NotConnected)
        );
    }

    #[test]
    fn test_subscribe_streams_known_value() {
        let (sim, mut rx) = connected();
        sim.subscribe(&SimVariable::new(ATC_MODEL_VAR, "")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SimUpdate::new(ATC_MODEL_VAR, "C172"));

        sim.set_variable(ATC_MODEL_VAR, "A320");
        assert_eq!(rx.try_recv().unwrap(), SimUpdate::new(ATC_MODEL_VAR, "A320"));

        sim.set_variable("FLAPS HANDLE INDEX", "2");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clear_keeps_identification() {
        let (sim, _rx) = connected();
        sim.subscribe(&SimVariable::new(TITLE_VAR, "")).unwrap();
        sim.subscribe(&SimVariable::new("AIRSPEED INDICATED", "knots")).unwrap();
        sim.clear_subscriptions().unwrap();
        let names: Vec<_> = sim.subscriptions().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec![TITLE_VAR]);
    }

    #[test]
    fn test_events_are_recorded_by_name() {
        let (sim, _rx) = connected();
        let gear = sim.register_event("GEAR_TOGGLE").unwrap();
        let hdg = sim.register_event("HEADING_BUG_SET").unwrap();
        assert_eq!(sim.register_event("GEAR_TOGGLE").unwrap(), gear);

        sim.transmit_event(hdg, 270).unwrap();
        sim.execute_code("1 (>K:AP_MASTER)").unwrap();
        assert_eq!(
            sim.calls(),
            vec![
                SimCall::Transmit {
                    event: "HEADING_BUG_SET".into(),
                    payload: 270
                },
                SimCall::Execute("1 (>K:AP_MASTER)".into()),
            ]
        );
        assert!(sim.transmit_event(EventHandle(9), 0).is_err());
    }
}
