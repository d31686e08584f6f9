//! Error types for preset loading

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or validating preset documents
#[derive(Debug, Error)]
pub enum PresetError {
    /// Preset file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid preset JSON
    #[error("invalid preset document: {0}")]
    Json(#[from] serde_json::Error),

    /// A protocol-level value inside the document is out of range
    #[error("preset '{preset}' field {field}: {source}")]
    Field {
        preset: String,
        field: usize,
        #[source]
        source: cockpit_protocol::ParseError,
    },

    /// Visibility expression is not `VAR[,unit]=value`
    #[error("preset '{preset}' field {field}: invalid visibility condition {expression:?}")]
    Visibility {
        preset: String,
        field: usize,
        expression: String,
    },

    /// More switch bindings than the panel has switches
    #[error("preset '{preset}' defines {count} switches, at most {max} are supported")]
    TooManySwitches {
        preset: String,
        count: usize,
        max: usize,
    },

    /// More fields than the two-digit field id allows
    #[error("preset '{preset}' defines {count} fields, at most {max} are supported")]
    TooManyFields {
        preset: String,
        count: usize,
        max: usize,
    },

    /// Simulator version flag list contains an unknown entry
    #[error("unknown simulator version flag: {0}")]
    UnknownVersion(String),
}
