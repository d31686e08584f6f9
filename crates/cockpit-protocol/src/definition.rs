//! Screen field identity and layout
//!
//! A field's layout is sent to the panel as a 14-character definition string
//! `xxxyyyCCCCFWWP`:
//!
//! | Columns | Meaning |
//! |---------|---------|
//! | `xxx`   | x position, zero padded |
//! | `yyy`   | y position, zero padded |
//! | `CCCC`  | RGB565 colour, upper-case hex |
//! | `F`     | font size class, 1 to 4 |
//! | `WW`    | display width in characters |
//! | `P`     | padding kind, `0` or space |
//!
//! The colour is baked into the definition, so boolean fields change colour by
//! re-sending a definition built with [`FieldDefinition::with_color`].

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Length of a rendered definition string
pub const DEFINITION_LEN: usize = 14;

/// 16-bit packed RGB565 colour as used by the panel display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    pub const BLACK: Rgb565 = Rgb565(0x0000);
    pub const GREY: Rgb565 = Rgb565(0xD6BA);
}

impl fmt::Display for Rgb565 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl FromStr for Rgb565 {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidColor(s.to_string()));
        }
        u16::from_str_radix(s, 16)
            .map(Rgb565)
            .map_err(|_| ParseError::InvalidColor(s.to_string()))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Rgb565 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Rgb565 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Wire identifier of a screen field (1-based, two digits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u8);

impl FieldId {
    /// Largest id that fits the two-digit wire column
    pub const MAX: u8 = 99;

    /// Build from the 1-based wire number
    pub fn new(id: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&id).then_some(Self(id))
    }

    /// Build from a 0-based position in a preset's field list
    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_add(1)
            .and_then(|id| u8::try_from(id).ok())
            .and_then(Self::new)
    }

    /// 0-based position in the preset's field list
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for FieldId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidField(s.to_string()));
        }
        s.parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ParseError::InvalidField(s.to_string()))
    }
}

/// How the panel pads text inside a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Padding {
    #[default]
    Space,
    Zero,
}

impl Padding {
    pub fn as_char(self) -> char {
        match self {
            Padding::Space => ' ',
            Padding::Zero => '0',
        }
    }
}

/// Structured form of the fixed-width definition string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDefinition {
    x: u16,
    y: u16,
    color: Rgb565,
    font: u8,
    width: u8,
    padding: Padding,
}

impl FieldDefinition {
    pub fn new(
        x: u16,
        y: u16,
        color: Rgb565,
        font: u8,
        width: u8,
        padding: Padding,
    ) -> Result<Self, ParseError> {
        if x > 999 || y > 999 {
            return Err(ParseError::InvalidDefinition(format!(
                "position ({x}, {y}) exceeds 999"
            )));
        }
        if !(1..=4).contains(&font) {
            return Err(ParseError::InvalidDefinition(format!(
                "font size {font} outside 1..=4"
            )));
        }
        if width > 99 {
            return Err(ParseError::InvalidDefinition(format!(
                "width {width} exceeds 99"
            )));
        }
        Ok(Self {
            x,
            y,
            color,
            font,
            width,
            padding,
        })
    }

    /// Same layout rendered in a different colour
    pub fn with_color(&self, color: Rgb565) -> Self {
        Self { color, ..*self }
    }

    pub fn x(&self) -> u16 {
        self.x
    }

    pub fn y(&self) -> u16 {
        self.y
    }

    pub fn color(&self) -> Rgb565 {
        self.color
    }

    pub fn font(&self) -> u8 {
        self.font
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }
}

impl fmt::Display for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}{:03}{}{}{:02}{}",
            self.x,
            self.y,
            self.color,
            self.font,
            self.width,
            self.padding.as_char()
        )
    }
}

impl FromStr for FieldDefinition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidDefinition(s.to_string());
        if s.len() != DEFINITION_LEN || !s.is_ascii() {
            return Err(invalid());
        }
        let number = |range: std::ops::Range<usize>| -> Result<u16, ParseError> {
            let part = &s[range];
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let padding = match &s[13..14] {
            " " => Padding::Space,
            "0" => Padding::Zero,
            _ => return Err(invalid()),
        };
        let font = u8::try_from(number(10..11)?).map_err(|_| invalid())?;
        let width = u8::try_from(number(11..13)?).map_err(|_| invalid())?;
        Self::new(
            number(0..3)?,
            number(3..6)?,
            s[6..10].parse()?,
            font,
            width,
            padding,
        )
    }
}
