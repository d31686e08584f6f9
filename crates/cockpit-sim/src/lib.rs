//! Cockpit Simulation Library
//!
//! This crate provides hardware-free doubles for running the cockpit bridge
//! without a panel or a flight simulator. It includes:
//!
//! - **VirtualPanel**: emulates the panel firmware behind an in-memory stream
//! - **VirtualDevicePort**: a device port that plugs in a fresh virtual panel
//! - **VirtualSimulator**: a simulator link backed by a variable table
//!
//! # Example
//!
//! ```rust
//! use cockpit_protocol::EncodeLine;
//! use cockpit_sim::{VirtualPanel, VirtualPanelConfig};
//!
//! let mut panel = VirtualPanel::new(VirtualPanelConfig::default());
//!
//! // The panel answers the handshake ping with its firmware id
//! let response = panel.process_line("P");
//! assert_eq!(response.replies[0].encode(), "MSFSCP0");
//! ```

pub mod panel;
pub mod panel_task;
pub mod port;
pub mod simulator;

pub use panel::{KnobBinding, LineResponse, PanelField, VirtualPanel, VirtualPanelConfig};
pub use panel_task::{run_virtual_panel_task, VirtualPanelCommand, VirtualPanelEvent};
pub use port::VirtualDevicePort;
pub use simulator::{SimCall, VirtualSimulator, VirtualSimulatorConfig};
