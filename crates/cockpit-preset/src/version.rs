//! Simulator generations a preset applies to

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PresetError;

/// Simulator generation reported by the simulator link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SimVersion {
    Fs2020,
    Fs2024,
    /// Version not reported; presets are not filtered by version
    #[default]
    Unknown,
}

/// Bitmask of simulator generations, written `"FS2020, FS2024"` in documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SimVersionMask(u8);

impl SimVersionMask {
    pub const NONE: SimVersionMask = SimVersionMask(0);
    pub const FS2020: SimVersionMask = SimVersionMask(1);
    pub const FS2024: SimVersionMask = SimVersionMask(2);
    pub const ALL: SimVersionMask = SimVersionMask(3);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn union(self, other: SimVersionMask) -> SimVersionMask {
        SimVersionMask(self.0 | other.0)
    }

    /// Whether a preset with this mask may be used on `version`
    pub fn allows(self, version: SimVersion) -> bool {
        match version {
            SimVersion::Fs2020 => self.0 & Self::FS2020.0 != 0,
            SimVersion::Fs2024 => self.0 & Self::FS2024.0 != 0,
            SimVersion::Unknown => true,
        }
    }
}

impl FromStr for SimVersionMask {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|flag| !flag.is_empty())
            .try_fold(Self::NONE, |mask, flag| {
                let bit = match flag.to_ascii_uppercase().as_str() {
                    "FS2020" => Self::FS2020,
                    "FS2024" => Self::FS2024,
                    "NONE" => Self::NONE,
                    _ => return Err(PresetError::UnknownVersion(flag.to_string())),
                };
                Ok(mask.union(bit))
            })
    }
}

impl fmt::Display for SimVersionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.0 & Self::FS2020.0 != 0 {
            flags.push("FS2020");
        }
        if self.0 & Self::FS2024.0 != 0 {
            flags.push("FS2024");
        }
        if flags.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&flags.join(", "))
        }
    }
}

impl Serialize for SimVersionMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SimVersionMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bits(u8),
            Flags(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bits(bits) => Ok(SimVersionMask(bits & Self::ALL.0)),
            Repr::Flags(text) => text.parse().map_err(de::Error::custom),
        }
    }
}
