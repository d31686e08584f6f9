//! Operator-facing event stream
//!
//! Everything a front end shows (link indicators, the append-only log, the
//! active preset, switch labels and raw panel traffic) arrives through one
//! [`EngineEvent`] channel. The one interaction that needs an answer, picking
//! between several matching presets, travels separately as a
//! [`PresetChoiceRequest`] because it carries a reply channel.

use std::fmt;

use tokio::sync::oneshot;

/// Which external link an indicator describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Device,
    Simulator,
}

/// Indicator state shown for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Not requested by the operator
    Inactive,
    /// Transport open, waiting for the panel to answer the handshake
    Connecting,
    Ok,
    Failed,
}

/// Severity of an operator log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Direction of a line on the panel link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Engine to panel
    Out,
    /// Panel to engine
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => f.write_str("->"),
            Direction::In => f.write_str("<-"),
        }
    }
}

/// Events emitted by the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A link indicator changed
    LinkChanged { link: Link, indicator: Indicator },

    /// A line for the operator log
    Log { level: LogLevel, message: String },

    /// The active preset changed; `None` when no preset applies
    PresetChanged { name: Option<String> },

    /// Labels for the fourteen switch positions shown to the operator
    SwitchLabels(Vec<String>),

    /// The panel firmware reported an error
    DeviceError(String),

    /// A line was written to or read from the panel
    DeviceTraffic { direction: Direction, line: String },

    /// The keep-connected intent was changed by the bridge itself
    KeepConnectedChanged(bool),
}

impl EngineEvent {
    pub fn info(message: impl Into<String>) -> Self {
        EngineEvent::Log {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        EngineEvent::Log {
            level: LogLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        EngineEvent::Log {
            level: LogLevel::Error,
            message: message.into(),
        }
    }

    pub fn link(link: Link, indicator: Indicator) -> Self {
        EngineEvent::LinkChanged { link, indicator }
    }
}

/// Ask the operator to pick one of several matching presets
///
/// The reply is a position in `candidates`; `None` or a dropped sender means
/// the operator cancelled.
#[derive(Debug)]
pub struct PresetChoiceRequest {
    /// Aircraft title the presets matched
    pub aircraft: String,
    pub candidates: Vec<String>,
    pub reply: oneshot::Sender<Option<usize>>,
}
