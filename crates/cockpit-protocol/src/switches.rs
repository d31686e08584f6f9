//! Toggle switch bitmap reported by the panel

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Number of switch positions reported in one bitmap
pub const SWITCH_COUNT: usize = 20;

/// One character per switch, `'1'` when closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SwitchBitmap([bool; SWITCH_COUNT]);

/// A single switch changing position between two bitmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchTransition {
    pub index: usize,
    /// `true` for 0→1, `false` for 1→0
    pub on: bool,
}

impl SwitchBitmap {
    pub fn from_bits(bits: [bool; SWITCH_COUNT]) -> Self {
        Self(bits)
    }

    pub fn is_on(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, index: usize, on: bool) {
        if let Some(bit) = self.0.get_mut(index) {
            *bit = on;
        }
    }

    /// Transitions from `self` to `next`, in ascending switch order
    pub fn transitions_to(&self, next: &SwitchBitmap) -> Vec<SwitchTransition> {
        self.0
            .iter()
            .zip(next.0.iter())
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(index, (_, &on))| SwitchTransition { index, on })
            .collect()
    }
}

impl fmt::Display for SwitchBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for SwitchBitmap {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SWITCH_COUNT {
            return Err(ParseError::InvalidSwitchState(format!(
                "expected {SWITCH_COUNT} positions, got {}",
                s.len()
            )));
        }
        let mut bits = [false; SWITCH_COUNT];
        for (bit, b) in bits.iter_mut().zip(s.bytes()) {
            *bit = match b {
                b'0' => false,
                b'1' => true,
                _ => return Err(ParseError::InvalidSwitchState(s.to_string())),
            };
        }
        Ok(Self(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(prefix: &str) -> SwitchBitmap {
        format!("{prefix:0<20}").parse().unwrap()
    }

    #[test]
    fn test_single_off_transition() {
        let prev = bitmap("00100");
        let next = bitmap("00000");
        assert_eq!(
            prev.transitions_to(&next),
            vec![SwitchTransition { index: 2, on: false }]
        );
    }

    #[test]
    fn test_mixed_transitions_in_order() {
        let prev = bitmap("1100");
        let next = bitmap("0110");
        let t = prev.transitions_to(&next);
        assert_eq!(t.len(), 2);
        assert_eq!(t[0], SwitchTransition { index: 0, on: false });
        assert_eq!(t[1], SwitchTransition { index: 2, on: true });
    }

    #[test]
    fn test_identical_bitmaps_have_no_transitions() {
        let b = bitmap("10101");
        assert!(b.transitions_to(&b).is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("0101".parse::<SwitchBitmap>().is_err());
        assert!("0000000000000000000x".parse::<SwitchBitmap>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let text = "10000000000000000001";
        assert_eq!(text.parse::<SwitchBitmap>().unwrap().to_string(), text);
    }
}
