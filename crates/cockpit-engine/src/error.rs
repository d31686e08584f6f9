//! Error types for the protocol engine
//!
//! None of these terminate the bridge. Each one is logged, reported to the
//! operator and turned into a link state change where that applies.

use cockpit_protocol::ParseError;
use thiserror::Error;

/// Failures surfaced while bridging the simulator and the panel
#[derive(Debug, Error)]
pub enum EngineError {
    /// Opening, reading or writing the panel transport failed
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The panel answered the handshake with something other than our firmware id
    #[error("no compatible panel found. Received: {received} Expected: {expected}")]
    HandshakeMismatch { received: String, expected: String },

    /// A line from the panel could not be decoded
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] ParseError),

    /// Neither a matching preset nor a default exists for the aircraft
    #[error("no preset found for aircraft: {aircraft}")]
    UnresolvedPreset { aircraft: String },

    /// Several presets match and the operator has to choose
    #[error("{} presets match the aircraft: {}", candidates.len(), candidates.join(", "))]
    AmbiguousPreset { candidates: Vec<String> },

    /// The simulator link refused a request or dropped
    #[error("simulator link error: {0}")]
    SimulatorLink(String),

    /// A knob reported text that is not a number
    #[error("knob {knob} sent a non-numeric value {text:?}")]
    NumericDecode { knob: String, text: String },
}

impl From<crate::simulator::SimLinkError> for EngineError {
    fn from(e: crate::simulator::SimLinkError) -> Self {
        EngineError::SimulatorLink(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_message_names_both_ids() {
        let err = EngineError::HandshakeMismatch {
            received: "MXYZ".into(),
            expected: "SFSCP0".into(),
        };
        assert_eq!(
            err.to_string(),
            "no compatible panel found. Received: MXYZ Expected: SFSCP0"
        );
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let err = EngineError::AmbiguousPreset {
            candidates: vec!["A320 FBW".into(), "A320 Fenix".into()],
        };
        assert_eq!(err.to_string(), "2 presets match the aircraft: A320 FBW, A320 Fenix");
    }
}
