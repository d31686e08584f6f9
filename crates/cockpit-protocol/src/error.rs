//! Error types for panel protocol parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing or building protocol lines
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The type character is not part of the protocol
    #[error("unknown message type: {0:?}")]
    UnknownType(char),

    /// The payload does not match the layout of its message type
    #[error("invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: char, reason: String },

    /// Field id outside 1..=99
    #[error("invalid field id: {0}")]
    InvalidField(String),

    /// Knob id outside 0..=3 or malformed knob spec
    #[error("invalid knob: {0}")]
    InvalidKnob(String),

    /// Colour is not four hex digits
    #[error("invalid colour: {0}")]
    InvalidColor(String),

    /// Switch bitmap has the wrong length or a non-binary character
    #[error("invalid switch state: {0}")]
    InvalidSwitchState(String),

    /// Field definition values out of range
    #[error("invalid field definition: {0}")]
    InvalidDefinition(String),

    /// Payload would contain the line delimiter
    #[error("payload contains the line delimiter")]
    EmbeddedDelimiter,
}

impl ParseError {
    pub(crate) fn payload(kind: char, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            kind,
            reason: reason.into(),
        }
    }
}
