//! Cockpit Panel Protocol Library
//!
//! This crate provides encoding and decoding for the newline-delimited text
//! protocol spoken by the cockpit instrument panel firmware.
//!
//! # Architecture
//!
//! - [`LineCodec`] turns a raw byte stream into lines
//! - [`Frame`] splits a line into its type character and payload
//! - [`PanelCommand`] and [`DeviceMessage`] give each direction typed messages
//! - [`format`] holds the fixed-width padding rules both sides rely on
//!
//! Numeric columns are fixed width and left padded. Negative values keep the
//! `-` in the first column and zero-pad the digits after it.
//!
//! # Example
//!
//! ```rust
//! use cockpit_protocol::{DeviceMessage, EncodeLine, LineCodec, PanelCommand};
//!
//! assert_eq!(PanelCommand::Ping.encode(), "P");
//!
//! let mut codec = LineCodec::new();
//! codec.push_bytes(b"MSFSCP0\n");
//! let line = codec.next_line().unwrap();
//! assert_eq!(
//!     DeviceMessage::decode(&line).unwrap(),
//!     Some(DeviceMessage::Firmware("SFSCP0".into()))
//! );
//! ```

pub mod codec;
pub mod definition;
pub mod error;
pub mod format;
pub mod knob;
pub mod message;
pub mod switches;

pub use codec::LineCodec;
pub use definition::{FieldDefinition, FieldId, Padding, Rgb565, DEFINITION_LEN};
pub use error::ParseError;
pub use knob::{KnobId, KnobSpec, KnobValue, KNOB_COUNT, KNOB_VALUE_WIDTH};
pub use message::{
    DeviceMessage, EncodeLine, Frame, PanelCommand, FIRMWARE_ID, LINE_DELIMITER,
};
pub use switches::{SwitchBitmap, SwitchTransition, SWITCH_COUNT};
