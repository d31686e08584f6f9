//! Rotary encoder identifiers, ranges and values

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::format::pad_signed;

/// Number of rotary encoders on the panel
pub const KNOB_COUNT: usize = 4;

/// Width of a knob value on the wire
pub const KNOB_VALUE_WIDTH: usize = 5;

/// Width of the min and max columns of a knob spec
const RANGE_WIDTH: usize = 6;

/// Rotary encoder id, `0..KNOB_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KnobId(u8);

impl KnobId {
    pub fn new(id: u8) -> Option<Self> {
        (usize::from(id) < KNOB_COUNT).then_some(Self(id))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Parse the single digit used on the wire
    pub fn from_char(c: char) -> Result<Self, ParseError> {
        c.to_digit(10)
            .and_then(|d| u8::try_from(d).ok())
            .and_then(Self::new)
            .ok_or_else(|| ParseError::InvalidKnob(c.to_string()))
    }

    /// Iterate over every knob on the panel
    pub fn all() -> impl Iterator<Item = KnobId> {
        (0..KNOB_COUNT as u8).map(KnobId)
    }
}

impl fmt::Display for KnobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Knob binding in the compact `NmmmmmmMMMMMMC` form
///
/// `N` is the knob id, `mmmmmm` and `MMMMMM` the signed range limits and `C`
/// is `Y` when the value wraps around at either end. Example:
/// `1000000000359Y` binds knob 1 to 0..=359 with wrap-around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KnobSpec {
    pub knob: KnobId,
    pub min: i32,
    pub max: i32,
    pub wrap: bool,
}

impl KnobSpec {
    /// Encoded length of the compact form
    pub const LEN: usize = 1 + 2 * RANGE_WIDTH + 1;

    pub(crate) fn range_text(&self) -> String {
        format!(
            "{}{}{}",
            pad_signed(&self.min.to_string(), RANGE_WIDTH),
            pad_signed(&self.max.to_string(), RANGE_WIDTH),
            if self.wrap { 'Y' } else { 'N' }
        )
    }

    pub(crate) fn parse_range(knob: KnobId, s: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidKnob(s.to_string());
        if s.len() != 2 * RANGE_WIDTH + 1 || !s.is_ascii() {
            return Err(invalid());
        }
        let min = parse_limit(&s[..RANGE_WIDTH]).ok_or_else(invalid)?;
        let max = parse_limit(&s[RANGE_WIDTH..2 * RANGE_WIDTH]).ok_or_else(invalid)?;
        let wrap = match &s[2 * RANGE_WIDTH..] {
            "Y" => true,
            "N" => false,
            _ => return Err(invalid()),
        };
        if min > max {
            return Err(invalid());
        }
        Ok(Self {
            knob,
            min,
            max,
            wrap,
        })
    }
}

fn parse_limit(s: &str) -> Option<i32> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for KnobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.knob, self.range_text())
    }
}

impl FromStr for KnobSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let knob = chars
            .next()
            .ok_or_else(|| ParseError::InvalidKnob(s.to_string()))
            .and_then(KnobId::from_char)?;
        Self::parse_range(knob, chars.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for KnobSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for KnobSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Value text pushed to a knob, sign-first zero padded to five columns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KnobValue(String);

impl KnobValue {
    pub fn new(text: &str) -> Self {
        Self(pad_signed(text, KNOB_VALUE_WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KnobValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
