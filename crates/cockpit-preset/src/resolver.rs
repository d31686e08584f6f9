//! Aircraft to preset resolution
//!
//! # Algorithm
//!
//! 1. Drop presets whose version mask excludes the running simulator.
//! 2. A preset matches when one of its model keywords occurs in the aircraft
//!    model, or, failing that, one of its type keywords occurs in the aircraft
//!    type. Both comparisons are case-insensitive substring checks.
//! 3. The first eligible preset named `Default` is remembered as fallback.
//!
//! Zero matches fall back to the default preset, one match is selected and
//! several matches are never auto-picked: the caller has to ask the operator.

use crate::model::CockpitPreset;
use crate::version::SimVersion;

/// Simulator variable carrying the aircraft title
pub const TITLE_VAR: &str = "TITLE";
/// Simulator variable carrying the ATC model, matched against model keywords
pub const ATC_MODEL_VAR: &str = "ATC MODEL";
/// Simulator variable carrying the ATC type, matched against type keywords
pub const ATC_TYPE_VAR: &str = "ATC TYPE";

/// Identification variables in the order they are subscribed
pub const IDENTIFICATION_VARS: [&str; 3] = [TITLE_VAR, ATC_MODEL_VAR, ATC_TYPE_VAR];

/// Identification signals of the loaded aircraft
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AircraftIdentity {
    pub title: String,
    pub model: String,
    pub aircraft_type: String,
}

impl AircraftIdentity {
    /// Record one identification variable; returns `false` for other variables
    pub fn update(&mut self, variable: &str, value: &str) -> bool {
        let slot = match variable {
            TITLE_VAR => &mut self.title,
            ATC_MODEL_VAR => &mut self.model,
            ATC_TYPE_VAR => &mut self.aircraft_type,
            _ => return false,
        };
        *slot = value.to_string();
        true
    }

    pub fn is_identification(variable: &str) -> bool {
        IDENTIFICATION_VARS.contains(&variable)
    }
}

/// Result of resolving the preset for the current aircraft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No match and no default preset
    None,
    /// No match; the default preset applies
    DefaultApplied(usize),
    /// Exactly one preset matches
    Matched(usize),
    /// Several presets match; the operator has to pick one
    Ambiguous(Vec<usize>),
}

impl Resolution {
    /// Preset to select, if the outcome names exactly one
    pub fn selected(&self) -> Option<usize> {
        match self {
            Resolution::DefaultApplied(id) | Resolution::Matched(id) => Some(*id),
            Resolution::None | Resolution::Ambiguous(_) => None,
        }
    }

    /// Settle an ambiguous outcome with the operator's pick
    ///
    /// `pick` is a position in the candidate list. A missing or out-of-range
    /// pick degrades to [`Resolution::None`]. Other outcomes are returned as is.
    pub fn with_choice(self, pick: Option<usize>) -> Resolution {
        match self {
            Resolution::Ambiguous(candidates) => pick
                .and_then(|i| candidates.get(i).copied())
                .map_or(Resolution::None, Resolution::Matched),
            other => other,
        }
    }
}

/// Pick the preset for `identity` on `version`
pub fn resolve(
    identity: &AircraftIdentity,
    version: SimVersion,
    presets: &[CockpitPreset],
) -> Resolution {
    let mut matches = Vec::new();
    let mut default = None;

    for (id, preset) in presets.iter().enumerate() {
        if !preset.versions.allows(version) {
            continue;
        }
        if default.is_none() && preset.is_default() {
            default = Some(id);
        }
        if contains_any(&identity.model, &preset.model_keywords)
            || contains_any(&identity.aircraft_type, &preset.type_keywords)
        {
            matches.push(id);
        }
    }

    match (matches.len(), default) {
        (0, Some(id)) => Resolution::DefaultApplied(id),
        (0, None) => Resolution::None,
        (1, _) => Resolution::Matched(matches[0]),
        _ => Resolution::Ambiguous(matches),
    }
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    keywords
        .iter()
        .filter(|kw| !kw.is_empty())
        .any(|kw| haystack.contains(&kw.to_lowercase()))
}
