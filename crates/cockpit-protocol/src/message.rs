//! Typed panel messages
//!
//! Every line is one type character followed by a payload. Two characters
//! (`S` and `K`) are reused with a different meaning per direction, so the
//! protocol is modelled as two enums:
//!
//! - [`PanelCommand`]: engine → panel
//! - [`DeviceMessage`]: panel → engine
//!
//! Both decode from a [`Frame`], the direction-agnostic `(type, payload)` pair.

use std::fmt;

use crate::definition::{FieldDefinition, FieldId, Rgb565};
use crate::error::ParseError;
use crate::format::sanitize;
use crate::knob::{KnobId, KnobSpec, KnobValue, KNOB_VALUE_WIDTH};
use crate::switches::SwitchBitmap;

/// Line delimiter used on the serial link
pub const LINE_DELIMITER: char = '\n';

/// Firmware identifier a compatible panel answers a ping with
pub const FIRMWARE_ID: &str = "SFSCP0";

/// A decoded line: type character plus raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: char,
    payload: String,
}

impl Frame {
    pub fn new(kind: char, payload: impl Into<String>) -> Result<Self, ParseError> {
        let payload = payload.into();
        if kind == LINE_DELIMITER || payload.contains(LINE_DELIMITER) {
            return Err(ParseError::EmbeddedDelimiter);
        }
        Ok(Self { kind, payload })
    }

    /// Decode a line with or without its trailing delimiter
    ///
    /// Returns `Ok(None)` for an empty line.
    pub fn decode(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.strip_suffix(LINE_DELIMITER).unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut chars = line.chars();
        let Some(kind) = chars.next() else {
            return Ok(None);
        };
        if !kind.is_ascii_alphabetic() {
            return Err(ParseError::UnknownType(kind));
        }
        Ok(Some(Self::new(kind, chars.as_str())?))
    }

    pub fn kind(&self) -> char {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Line text without the delimiter
    pub fn encode(&self) -> String {
        let mut line = String::with_capacity(1 + self.payload.len());
        line.push(self.kind);
        line.push_str(&self.payload);
        line
    }

    fn expect_empty(&self) -> Result<(), ParseError> {
        if self.payload.is_empty() {
            Ok(())
        } else {
            Err(ParseError::payload(self.kind, "unexpected payload"))
        }
    }
}

/// Encoding shared by both message directions
pub trait EncodeLine {
    /// Line text without the delimiter
    fn encode(&self) -> String;

    /// Line bytes including the delimiter, ready for the transport
    fn encode_line(&self) -> Vec<u8> {
        let mut line = self.encode().into_bytes();
        line.push(LINE_DELIMITER as u8);
        line
    }
}

/// Messages sent from the engine to the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    /// `C`: start a new layout with this many fields
    BeginLayout { field_count: u8 },
    /// `B`: background colour
    Background(Rgb565),
    /// `I`: field layout
    DefineField {
        field: FieldId,
        definition: FieldDefinition,
    },
    /// `T`: field text
    SetText { field: FieldId, text: String },
    /// `K`: attach a knob to a field
    BindKnob {
        spec: KnobSpec,
        field: FieldId,
        decimal_places: u8,
        step: u16,
    },
    /// `D`: authoritative knob value
    SetKnobValue { knob: KnobId, value: KnobValue },
    /// `S`: apply all pending layout changes
    CommitLayout,
    /// `P`: handshake ping
    Ping,
    /// `R`: release the panel before closing the link
    Reset,
}

impl PanelCommand {
    pub fn kind(&self) -> char {
        match self {
            PanelCommand::BeginLayout { .. } => 'C',
            PanelCommand::Background(_) => 'B',
            PanelCommand::DefineField { .. } => 'I',
            PanelCommand::SetText { .. } => 'T',
            PanelCommand::BindKnob { .. } => 'K',
            PanelCommand::SetKnobValue { .. } => 'D',
            PanelCommand::CommitLayout => 'S',
            PanelCommand::Ping => 'P',
            PanelCommand::Reset => 'R',
        }
    }

    /// Decode a line travelling towards the panel
    pub fn decode(line: &str) -> Result<Option<Self>, ParseError> {
        Frame::decode(line)?.map(Self::try_from).transpose()
    }
}

impl EncodeLine for PanelCommand {
    fn encode(&self) -> String {
        let payload = match self {
            PanelCommand::BeginLayout { field_count } => format!("{:02}", (*field_count).min(99)),
            PanelCommand::Background(color) => color.to_string(),
            PanelCommand::DefineField { field, definition } => format!("{field}{definition}"),
            PanelCommand::SetText { field, text } => format!("{field}{}", sanitize(text)),
            PanelCommand::BindKnob {
                spec,
                field,
                decimal_places,
                step,
            } => format!(
                "{}{}{}{}{:03}",
                spec.knob,
                field,
                spec.range_text(),
                (*decimal_places).min(9),
                (*step).min(999)
            ),
            PanelCommand::SetKnobValue { knob, value } => format!("{knob}{value}"),
            PanelCommand::CommitLayout | PanelCommand::Ping | PanelCommand::Reset => String::new(),
        };
        let mut line = String::with_capacity(1 + payload.len());
        line.push(self.kind());
        line.push_str(&payload);
        line
    }
}

impl TryFrom<Frame> for PanelCommand {
    type Error = ParseError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let kind = frame.kind;
        let p = frame.payload.as_str();
        match kind {
            'C' => {
                if p.len() != 2 || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ParseError::payload(kind, "field count must be two digits"));
                }
                let field_count = p
                    .parse()
                    .map_err(|_| ParseError::payload(kind, "field count"))?;
                Ok(PanelCommand::BeginLayout { field_count })
            }
            'B' => Ok(PanelCommand::Background(p.parse()?)),
            'I' => {
                let (field, definition) = split_field(kind, p)?;
                Ok(PanelCommand::DefineField {
                    field,
                    definition: definition.parse()?,
                })
            }
            'T' => {
                let (field, text) = split_field(kind, p)?;
                Ok(PanelCommand::SetText {
                    field,
                    text: text.to_string(),
                })
            }
            'K' => {
                // N FF mmmmmm MMMMMM W D SSS
                if p.len() != 20 || !p.is_ascii() {
                    return Err(ParseError::payload(kind, "knob bind must be 20 characters"));
                }
                let knob = knob_char(kind, p)?;
                let field: FieldId = p[1..3].parse()?;
                let spec = KnobSpec::parse_range(knob, &p[3..16])?;
                let decimal_places = p[16..17]
                    .parse()
                    .map_err(|_| ParseError::payload(kind, "decimal places"))?;
                let step = p[17..20]
                    .parse()
                    .map_err(|_| ParseError::payload(kind, "step"))?;
                Ok(PanelCommand::BindKnob {
                    spec,
                    field,
                    decimal_places,
                    step,
                })
            }
            'D' => {
                let knob = knob_char(kind, p)?;
                let value = &p[1..];
                if value.chars().count() < KNOB_VALUE_WIDTH {
                    return Err(ParseError::payload(kind, "knob value shorter than 5"));
                }
                Ok(PanelCommand::SetKnobValue {
                    knob,
                    value: KnobValue::new(value),
                })
            }
            'S' => frame.expect_empty().map(|_| PanelCommand::CommitLayout),
            'P' => frame.expect_empty().map(|_| PanelCommand::Ping),
            'R' => frame.expect_empty().map(|_| PanelCommand::Reset),
            other => Err(ParseError::UnknownType(other)),
        }
    }
}

/// Messages sent from the panel to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// `S`: full switch bitmap
    Switches(SwitchBitmap),
    /// `M`: handshake reply carrying the firmware id
    Firmware(String),
    /// `E`: firmware-side error text
    Error(String),
    /// `K`: knob turned to a new value
    KnobTurned { knob: KnobId, value: String },
}

impl DeviceMessage {
    pub fn kind(&self) -> char {
        match self {
            DeviceMessage::Switches(_) => 'S',
            DeviceMessage::Firmware(_) => 'M',
            DeviceMessage::Error(_) => 'E',
            DeviceMessage::KnobTurned { .. } => 'K',
        }
    }

    /// Decode a line received from the panel
    pub fn decode(line: &str) -> Result<Option<Self>, ParseError> {
        Frame::decode(line)?.map(Self::try_from).transpose()
    }
}

impl EncodeLine for DeviceMessage {
    fn encode(&self) -> String {
        match self {
            DeviceMessage::Switches(bits) => format!("S{bits}"),
            DeviceMessage::Firmware(id) => format!("M{}", sanitize(id)),
            DeviceMessage::Error(text) => format!("E{}", sanitize(text)),
            DeviceMessage::KnobTurned { knob, value } => format!("K{knob}{}", sanitize(value)),
        }
    }
}

impl TryFrom<Frame> for DeviceMessage {
    type Error = ParseError;

    fn try_from(frame: Frame) -> Result<Self, ParseError> {
        let kind = frame.kind;
        match kind {
            'S' => Ok(DeviceMessage::Switches(frame.payload.parse()?)),
            'M' => Ok(DeviceMessage::Firmware(frame.payload)),
            'E' => Ok(DeviceMessage::Error(frame.payload)),
            'K' => {
                let knob = knob_char(kind, &frame.payload)?;
                let value = frame.payload[1..].to_string();
                if value.is_empty() {
                    return Err(ParseError::payload(kind, "missing knob value"));
                }
                Ok(DeviceMessage::KnobTurned { knob, value })
            }
            other => Err(ParseError::UnknownType(other)),
        }
    }
}

impl fmt::Display for PanelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn knob_char(kind: char, payload: &str) -> Result<KnobId, ParseError> {
    let first = payload
        .chars()
        .next()
        .ok_or_else(|| ParseError::payload(kind, "missing knob id"))?;
    KnobId::from_char(first)
}

fn split_field(kind: char, payload: &str) -> Result<(FieldId, &str), ParseError> {
    if payload.len() < 2 || !payload.is_char_boundary(2) {
        return Err(ParseError::payload(kind, "missing field id"));
    }
    let (id, rest) = payload.split_at(2);
    Ok((id.parse()?, rest))
}
