//! Cockpit Preset Model
//!
//! A preset describes one panel layout: the screen fields, which simulator
//! variable each field shows, which knob edits it, what the twenty switches
//! trigger and when conditional fields are visible.
//!
//! # Architecture
//!
//! - [`document`]: the JSON layout of preset files
//! - [`model`]: validated presets with their per-activation runtime state
//! - [`store`]: loading a presets directory into a [`PresetLibrary`]
//! - [`resolver`]: choosing the preset for the loaded aircraft
//!
//! # Example
//!
//! ```rust
//! use cockpit_preset::{AircraftIdentity, PresetLibrary, Resolution, SimVersion};
//!
//! let a320 = PresetLibrary::parse(
//!     r#"{"presetName": "A320", "fsVersion": "FS2020", "AtcModelKeywords": ["A320"]}"#,
//! ).unwrap();
//! let library = PresetLibrary::new(vec![a320]);
//!
//! let identity = AircraftIdentity {
//!     model: "A320NEO".into(),
//!     ..Default::default()
//! };
//! assert_eq!(library.resolve(&identity, SimVersion::Fs2020), Resolution::Matched(0));
//! ```

pub mod document;
pub mod error;
pub mod model;
pub mod resolver;
pub mod store;
pub mod version;

pub use document::{PresetDocument, ScreenFieldDocument, SwitchDocument};
pub use error::PresetError;
pub use model::{
    default_switch_labels, CockpitPreset, EventHandle, EventRef, FieldRuntime, ScreenField,
    SimVariable, SwitchAction, SwitchBinding, ValueKind, VisibilityCondition,
    DEFAULT_PRESET_NAME, SCRIPT_ESCAPE,
};
pub use resolver::{
    resolve, AircraftIdentity, Resolution, ATC_MODEL_VAR, ATC_TYPE_VAR, IDENTIFICATION_VARS,
    TITLE_VAR,
};
pub use store::PresetLibrary;
pub use version::{SimVersion, SimVersionMask};
