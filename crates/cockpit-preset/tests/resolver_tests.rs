//! Integration tests for preset loading and resolution
//!
//! These tests verify:
//! - Loading a presets directory, including skipping broken files
//! - The tie-break policy over realistic preset sets
//! - Determinism of resolution for arbitrary identification signals

use std::fs;
use std::path::PathBuf;

use cockpit_preset::{AircraftIdentity, PresetLibrary, Resolution, SimVersion};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Fresh scratch directory under the system temp dir
    pub fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cockpit-preset-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn library() -> PresetLibrary {
        let presets = [
            r#"{"presetName": "Default", "fsVersion": "FS2020, FS2024"}"#,
            r#"{"presetName": "FBW A32NX", "fsVersion": "FS2020", "AtcModelKeywords": ["A20N", "A320"]}"#,
            r#"{"presetName": "Fenix A320", "fsVersion": "FS2020", "AtcModelKeywords": ["A320"]}"#,
            r#"{"presetName": "C172", "fsVersion": "FS2020, FS2024", "AtcModelKeywords": ["C172"], "AtcTypeKeywords": ["Cessna Skyhawk"]}"#,
            r#"{"presetName": "PMDG 737", "fsVersion": "FS2024", "AtcModelKeywords": ["B738"]}"#,
        ];
        PresetLibrary::new(
            presets
                .iter()
                .map(|json| PresetLibrary::parse(json).unwrap())
                .collect(),
        )
    }

    pub fn identity(model: &str, aircraft_type: &str) -> AircraftIdentity {
        AircraftIdentity {
            title: "Test Aircraft".into(),
            model: model.into(),
            aircraft_type: aircraft_type.into(),
        }
    }
}

// ============================================================================
// Loading Tests
// ============================================================================

mod loading_tests {
    use super::*;

    #[test]
    fn loads_json_files_in_name_order_and_skips_broken_ones() {
        let dir = helpers::scratch_dir("load");
        fs::write(dir.join("b.json"), r#"{"presetName": "Second"}"#).unwrap();
        fs::write(dir.join("a.json"), r#"{"presetName": "First"}"#).unwrap();
        fs::write(dir.join("broken.json"), "{ not json").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let library = PresetLibrary::load_dir(&dir).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.names(&[0, 1]), vec!["First", "Second"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn select_resets_runtime_state() {
        let mut library = PresetLibrary::new(vec![PresetLibrary::parse(
            r#"{"presetName": "P", "screenFieldItems": [{"text": "X", "visibilityCondition": "V=1"}]}"#,
        )
        .unwrap()]);
        library.get_mut(0).unwrap().fields[0].runtime.visible = true;
        let preset = library.select(0).unwrap();
        assert!(!preset.fields[0].runtime.visible);
        assert!(library.select(5).is_none());
    }
}

// ============================================================================
// Tie-break Tests
// ============================================================================

mod tie_break_tests {
    use super::*;

    #[test]
    fn single_match_is_selected() {
        let library = helpers::library();
        let result = library.resolve(&helpers::identity("C172", ""), SimVersion::Fs2024);
        assert_eq!(result, Resolution::Matched(3));
    }

    #[test]
    fn type_keyword_matches_when_model_does_not() {
        let library = helpers::library();
        let result = library.resolve(
            &helpers::identity("TT:ATCCOM.AC_MODEL", "Cessna Skyhawk G1000"),
            SimVersion::Fs2020,
        );
        assert_eq!(result, Resolution::Matched(3));
    }

    #[test]
    fn two_candidates_are_never_auto_picked() {
        let library = helpers::library();
        let result = library.resolve(&helpers::identity("A320", "AIRBUS"), SimVersion::Fs2020);
        assert_eq!(result, Resolution::Ambiguous(vec![1, 2]));
        assert_eq!(library.names(&[1, 2]), vec!["FBW A32NX", "Fenix A320"]);
    }

    #[test]
    fn cancelled_choice_degrades_to_none() {
        let library = helpers::library();
        let result = library
            .resolve(&helpers::identity("A320", "AIRBUS"), SimVersion::Fs2020)
            .with_choice(None);
        assert_eq!(result, Resolution::None);
    }

    #[test]
    fn version_mismatch_falls_back_to_default() {
        let library = helpers::library();
        let result = library.resolve(&helpers::identity("B738", "BOEING"), SimVersion::Fs2020);
        assert_eq!(result, Resolution::DefaultApplied(0));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn version() -> impl Strategy<Value = SimVersion> {
        prop_oneof![
            Just(SimVersion::Fs2020),
            Just(SimVersion::Fs2024),
            Just(SimVersion::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(
            model in "[A-Z0-9 ]{0,12}",
            aircraft_type in "[A-Za-z ]{0,16}",
            version in version(),
        ) {
            let library = helpers::library();
            let identity = helpers::identity(&model, &aircraft_type);
            let first = library.resolve(&identity, version);
            let second = library.resolve(&identity, version);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn unmatched_aircraft_gets_the_default(model in "[XYZ]{1,8}") {
            let library = helpers::library();
            let result = library.resolve(&helpers::identity(&model, "Glider"), SimVersion::Fs2024);
            prop_assert_eq!(result, Resolution::DefaultApplied(0));
        }
    }
}
