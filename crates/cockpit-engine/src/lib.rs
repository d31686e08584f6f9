//! Cockpit Protocol Engine
//!
//! This crate bridges a flight simulator to a serial cockpit panel. It keeps
//! the panel's screen fields in sync with simulator variables, turns knob
//! rotations and switch flips into simulator writes, and picks the preset
//! matching the loaded aircraft.
//!
//! # Architecture
//!
//! The engine is split into a synchronous core and an async driver:
//!
//! - [`ProtocolEngine`] owns all runtime state and answers every input with a
//!   list of [`Effect`]s. It performs no I/O and is tested directly.
//! - [`CockpitBridge`] runs the panel read loop, the simulator dispatcher, the
//!   activation task, delayed preset resolution and the connection
//!   supervisor, carrying out the effects against a [`DevicePort`] and a
//!   [`SimulatorLink`].
//!
//! Operator-facing output leaves through an [`EngineEvent`] stream; preset
//! choices the engine cannot make alone arrive as [`PresetChoiceRequest`]s.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//!
//! use cockpit_engine::{Effect, EngineConfig, ProtocolEngine};
//! use cockpit_preset::PresetLibrary;
//! use cockpit_protocol::PanelCommand;
//!
//! let mut engine = ProtocolEngine::new(PresetLibrary::default(), EngineConfig::default());
//! let effects = engine.transport_connected();
//! assert!(effects.contains(&Effect::Device(PanelCommand::Ping)));
//!
//! // The panel answers with its firmware id
//! engine.handle_device_line("MSFSCP0", Instant::now());
//! assert!(engine.link_state().is_active());
//! ```

pub mod bridge;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod render;
pub mod scheduler;
pub mod simulator;
pub mod state;
mod supervisor;

pub use bridge::{BridgeChannels, CockpitBridge};
pub use config::EngineConfig;
pub use device::{
    write_lines, BoxedDeviceIo, DeviceIo, DevicePort, DeviceReader, SerialDevicePort,
    DEFAULT_BAUD_RATE,
};
pub use engine::{Effect, ProtocolEngine, SimCommand};
pub use error::EngineError;
pub use events::{
    Direction, EngineEvent, Indicator, Link, LogLevel, PresetChoiceRequest,
};
pub use render::{event_payload, render_value, ALTIMETER_EVENT};
pub use scheduler::{FlightGuard, SingleFlight};
pub use simulator::{SimLinkError, SimUpdate, SimulatorLink};
pub use state::{KnobSlot, KnobTable, LinkState};
