//! Panel configuration entities
//!
//! A [`CockpitPreset`] is built once from a [`PresetDocument`] and then only
//! its runtime parts change: each [`ScreenField`] carries a [`FieldRuntime`]
//! and each [`SwitchBinding`] carries its registered event handles. All of
//! those are cleared by [`CockpitPreset::reset_runtime`] whenever the preset is
//! selected, because simulator event handles only live as long as one
//! activation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use cockpit_protocol::{FieldDefinition, FieldId, KnobSpec, Padding, Rgb565, SWITCH_COUNT};

use crate::document::{PresetDocument, ScreenFieldDocument, SwitchDocument};
use crate::error::PresetError;
use crate::version::SimVersionMask;

/// Leading character that routes an event through the scripting side-channel
pub const SCRIPT_ESCAPE: char = '!';

/// Name of the fallback preset used when no aircraft keyword matches
pub const DEFAULT_PRESET_NAME: &str = "Default";

/// Switch labels shown while no preset is active
pub const DEFAULT_SWITCH_LABELS: [&str; 14] = [
    "SW 0/1",
    "SW 2/3",
    "SW 4/5",
    "SW 6/7",
    "SW 8/9",
    "SW 10/11",
    "ENC 1 / SW 12",
    "ENC 2 / SW 13",
    "ENC 3 / SW 14",
    "ENC 4 / SW 15",
    "SW 16",
    "SW 17",
    "SW 18",
    "SW 19",
];

/// Number of three-position switches; each uses two adjacent bitmap slots
const THREE_POSITION_SWITCHES: usize = 6;

/// Handle returned by the simulator when an event name is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(pub u32);

/// How a field's value is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "ValueKindRepr")]
pub enum ValueKind {
    /// Shown as received, right aligned
    #[default]
    #[serde(rename = "TYPE_STRING")]
    Text,
    /// Rounded, padded with spaces
    #[serde(rename = "TYPE_NUMBER")]
    Number,
    /// Rounded, padded with zeros after the sign
    #[serde(rename = "TYPE_P0_NUMBER")]
    ZeroPaddedNumber,
    /// Non-zero selects the primary text and colour, zero the alternate ones
    #[serde(rename = "TYPE_BOOLEAN")]
    Boolean,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueKindRepr {
    Index(u8),
    Name(String),
}

impl TryFrom<ValueKindRepr> for ValueKind {
    type Error = String;

    fn try_from(repr: ValueKindRepr) -> Result<Self, Self::Error> {
        match repr {
            ValueKindRepr::Index(0) => Ok(ValueKind::Text),
            ValueKindRepr::Index(1) => Ok(ValueKind::Number),
            ValueKindRepr::Index(2) => Ok(ValueKind::ZeroPaddedNumber),
            ValueKindRepr::Index(3) => Ok(ValueKind::Boolean),
            ValueKindRepr::Name(name) => match name.as_str() {
                "TYPE_STRING" => Ok(ValueKind::Text),
                "TYPE_NUMBER" => Ok(ValueKind::Number),
                "TYPE_P0_NUMBER" => Ok(ValueKind::ZeroPaddedNumber),
                "TYPE_BOOLEAN" => Ok(ValueKind::Boolean),
                _ => Err(format!("unknown value kind {name:?}")),
            },
            ValueKindRepr::Index(n) => Err(format!("unknown value kind {n}")),
        }
    }
}

/// A simulator variable with its unit of measure
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimVariable {
    pub name: String,
    /// Empty for string-valued variables
    pub unit: String,
}

impl SimVariable {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }

    /// Computed variables like `(L:A32NX_FLAPS,enum)` go through the side-channel
    pub fn is_computed(&self) -> bool {
        self.name.starts_with('(')
    }
}

/// A simulator event referenced by a field or switch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventRef {
    /// Registered with the simulator and triggered through its handle
    Native(String),
    /// Executed as calculator code; stored without the escape character
    Script(String),
}

impl EventRef {
    /// Parse a configured event name; empty means no event
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(match name.strip_prefix(SCRIPT_ESCAPE) {
            Some(code) => EventRef::Script(code.to_string()),
            None => EventRef::Native(name.to_string()),
        })
    }

    pub fn is_script(&self) -> bool {
        matches!(self, EventRef::Script(_))
    }
}

/// Links a simulator variable to the visibility of one field
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityCondition {
    pub variable: SimVariable,
    pub expected: String,
    expected_number: Option<f64>,
    /// Index of the field this condition shows or hides
    pub field: usize,
}

impl VisibilityCondition {
    /// Parse `VAR[,unit]=value`
    ///
    /// The unit is only split off for regular variables; computed variables
    /// carry their unit inside the parentheses.
    pub fn parse(expression: &str, field: usize) -> Option<Self> {
        let mut parts = expression.split('=');
        let (Some(var), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return None;
        };
        if var.is_empty() {
            return None;
        }
        let variable = match var.split_once(',') {
            Some((name, unit)) if !var.starts_with('(') && !unit.contains(',') => {
                SimVariable::new(name, unit)
            }
            _ => SimVariable::new(var, ""),
        };
        Some(Self {
            variable,
            expected: value.to_string(),
            expected_number: value.trim().parse().ok(),
            field,
        })
    }

    /// Numeric comparison when both sides are numbers, exact text otherwise
    pub fn is_satisfied_by(&self, observed: &str) -> bool {
        if let Some(expected) = self.expected_number {
            if let Ok(observed) = observed.trim().parse::<f64>() {
                return observed == expected;
            }
        }
        observed == self.expected
    }
}

/// Per-activation state of a screen field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRuntime {
    /// Last rendered text
    pub text: String,
    /// Last boolean state; fields start in their primary rendering
    pub last_bool: bool,
    pub visible: bool,
    pub event_handle: Option<EventHandle>,
}

/// One displayed field
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenField {
    /// Static text, also the initial text of bound fields
    pub text: String,
    pub definition: FieldDefinition,
    pub variable: Option<SimVariable>,
    /// Write path for variables the simulator refuses to set directly
    pub event: Option<EventRef>,
    pub kind: ValueKind,
    pub decimal_places: u8,
    pub alt_text: String,
    pub alt_color: Rgb565,
    pub knob: Option<KnobSpec>,
    pub knob_step: u16,
    /// Whether a visibility condition controls this field
    pub conditional: bool,
    pub runtime: FieldRuntime,
}

impl ScreenField {
    fn from_document(
        preset: &str,
        index: usize,
        doc: &ScreenFieldDocument,
    ) -> Result<Self, PresetError> {
        let field_err = |source| PresetError::Field {
            preset: preset.to_string(),
            field: index,
            source,
        };

        let color: Rgb565 = doc.color.trim().parse().map_err(field_err)?;
        let alt_color = if doc.alt_color.trim().is_empty() {
            color
        } else {
            doc.alt_color.trim().parse().map_err(field_err)?
        };
        let width = if doc.text_width == 0 {
            u8::try_from(doc.text.chars().count()).unwrap_or(u8::MAX)
        } else {
            doc.text_width
        };
        let padding = match doc.simvar_type {
            ValueKind::ZeroPaddedNumber => Padding::Zero,
            _ => Padding::Space,
        };
        let definition =
            FieldDefinition::new(doc.x, doc.y, color, doc.font_size, width, padding)
                .map_err(field_err)?;
        let knob = match doc.knob_spec.trim() {
            "" => None,
            spec => Some(spec.parse::<KnobSpec>().map_err(field_err)?),
        };
        let knob_step = match doc.knob_step.trim() {
            "" => 1,
            step => step.parse().unwrap_or_else(|_| {
                warn!(
                    "Preset '{}' field {}: knob step {:?} is not a number, using 1",
                    preset, index, step
                );
                1
            }),
        };
        let variable = match doc.sim_variable.trim() {
            "" => None,
            name => Some(SimVariable::new(name, doc.unit_of_measure.trim())),
        };

        Ok(Self {
            text: doc.text.clone(),
            definition,
            variable,
            event: EventRef::parse(&doc.sim_event),
            kind: doc.simvar_type,
            decimal_places: doc.decimal_places.min(9),
            alt_text: doc.alt_text.clone(),
            alt_color,
            knob,
            knob_step,
            conditional: !doc.visibility_condition.trim().is_empty(),
            runtime: FieldRuntime {
                text: doc.text.clone(),
                last_bool: true,
                visible: doc.visibility_condition.trim().is_empty(),
                event_handle: None,
            },
        })
    }

    /// Width of the field on the panel
    pub fn width(&self) -> usize {
        usize::from(self.definition.width())
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == ValueKind::Boolean
    }

    /// Definition to send for the current boolean state
    pub fn current_definition(&self) -> FieldDefinition {
        if self.is_boolean() && !self.runtime.last_bool {
            self.definition.with_color(self.alt_color)
        } else {
            self.definition
        }
    }

    /// Text matching the current boolean state
    pub fn boolean_text(&self) -> &str {
        if self.runtime.last_bool {
            &self.text
        } else {
            &self.alt_text
        }
    }

    fn reset_runtime(&mut self) {
        self.runtime = FieldRuntime {
            text: self.text.clone(),
            last_bool: true,
            visible: !self.conditional,
            event_handle: None,
        };
    }

    fn restart(&mut self) {
        self.runtime.visible = !self.conditional;
        self.runtime.event_handle = None;
    }
}

/// Event fired when a switch moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchAction {
    pub event: EventRef,
    pub value: u32,
    pub handle: Option<EventHandle>,
}

impl SwitchAction {
    fn new(event: &str, value: u32) -> Option<Self> {
        EventRef::parse(event).map(|event| Self {
            event,
            value,
            handle: None,
        })
    }
}

/// One physical switch position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchBinding {
    pub label: String,
    pub on: Option<SwitchAction>,
    pub off: Option<SwitchAction>,
}

impl SwitchBinding {
    fn from_document(doc: &SwitchDocument) -> Self {
        Self {
            label: doc.switch_label.clone(),
            on: SwitchAction::new(&doc.sim_event_on, doc.sim_event_on_value),
            off: SwitchAction::new(&doc.sim_event_off, doc.sim_event_off_value),
        }
    }

    /// Action for a transition, `on` selecting the 0→1 direction
    pub fn action(&self, on: bool) -> Option<&SwitchAction> {
        if on {
            self.on.as_ref()
        } else {
            self.off.as_ref()
        }
    }

    pub fn action_mut(&mut self, on: bool) -> Option<&mut SwitchAction> {
        if on {
            self.on.as_mut()
        } else {
            self.off.as_mut()
        }
    }
}

/// One named panel configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CockpitPreset {
    pub name: String,
    pub versions: SimVersionMask,
    pub model_keywords: Vec<String>,
    pub type_keywords: Vec<String>,
    pub background: Rgb565,
    pub fields: Vec<ScreenField>,
    /// Always [`SWITCH_COUNT`] entries
    pub switches: Vec<SwitchBinding>,
    pub visibility: Vec<VisibilityCondition>,
}

impl CockpitPreset {
    /// Validate a document and pre-render its field definitions
    pub fn from_document(doc: &PresetDocument) -> Result<Self, PresetError> {
        let name = doc.preset_name.clone();
        let max_fields = usize::from(FieldId::MAX);
        if doc.screen_field_items.len() > max_fields {
            return Err(PresetError::TooManyFields {
                preset: name,
                count: doc.screen_field_items.len(),
                max: max_fields,
            });
        }
        if doc.switch_def_items.len() > SWITCH_COUNT {
            return Err(PresetError::TooManySwitches {
                preset: name,
                count: doc.switch_def_items.len(),
                max: SWITCH_COUNT,
            });
        }

        let background = match doc.bg_color.trim() {
            "" => Rgb565::BLACK,
            color => color.parse().map_err(|source| PresetError::Field {
                preset: name.clone(),
                field: 0,
                source,
            })?,
        };

        let mut fields = Vec::with_capacity(doc.screen_field_items.len());
        let mut visibility = Vec::new();
        for (index, item) in doc.screen_field_items.iter().enumerate() {
            fields.push(ScreenField::from_document(&name, index, item)?);
            let expression = item.visibility_condition.trim();
            if !expression.is_empty() {
                let condition = VisibilityCondition::parse(expression, index).ok_or_else(|| {
                    PresetError::Visibility {
                        preset: name.clone(),
                        field: index,
                        expression: expression.to_string(),
                    }
                })?;
                visibility.push(condition);
            }
        }

        let mut switches: Vec<SwitchBinding> = doc
            .switch_def_items
            .iter()
            .map(SwitchBinding::from_document)
            .collect();
        switches.resize_with(SWITCH_COUNT, SwitchBinding::default);

        Ok(Self {
            name,
            versions: doc.fs_version,
            model_keywords: doc.atc_model_keywords.clone(),
            type_keywords: doc.atc_type_keywords.clone(),
            background,
            fields,
            switches,
            visibility,
        })
    }

    pub fn is_default(&self) -> bool {
        self.name.eq_ignore_ascii_case(DEFAULT_PRESET_NAME)
    }

    /// First field displaying `variable`
    pub fn field_for_variable(&self, variable: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.variable.as_ref().is_some_and(|v| v.name == variable))
    }

    /// Distinct variables the preset needs, fields first, then visibility inputs
    pub fn subscriptions(&self) -> Vec<SimVariable> {
        let mut out: Vec<SimVariable> = Vec::new();
        let candidates = self
            .fields
            .iter()
            .filter_map(|f| f.variable.as_ref())
            .chain(self.visibility.iter().map(|c| &c.variable));
        for variable in candidates {
            if !out.iter().any(|v| v.name == variable.name) {
                out.push(variable.clone());
            }
        }
        out
    }

    /// Labels for the operator view: six three-position switches, then push-buttons
    pub fn switch_labels(&self) -> Vec<String> {
        let label = |i: usize| self.switches.get(i).map(|s| s.label.as_str()).unwrap_or("");
        (0..THREE_POSITION_SWITCHES)
            .map(|i| format!("{}\n{}", label(i * 2), label(i * 2 + 1)))
            .chain((THREE_POSITION_SWITCHES * 2..SWITCH_COUNT).map(|i| label(i).to_string()))
            .collect()
    }

    /// Forget everything learned during a previous activation
    pub fn reset_runtime(&mut self) {
        for field in &mut self.fields {
            field.reset_runtime();
        }
        self.clear_switch_handles();
    }

    /// Start another upload of the same preset
    ///
    /// Handles and visibility start over; values last seen from the
    /// simulator are kept.
    pub fn restart_runtime(&mut self) {
        for field in &mut self.fields {
            field.restart();
        }
        self.clear_switch_handles();
    }

    fn clear_switch_handles(&mut self) {
        for switch in &mut self.switches {
            for action in [switch.on.as_mut(), switch.off.as_mut()].into_iter().flatten() {
                action.handle = None;
            }
        }
    }
}

/// Labels shown while no preset is active
pub fn default_switch_labels() -> Vec<String> {
    DEFAULT_SWITCH_LABELS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_doc(json: &str) -> ScreenFieldDocument {
        serde_json::from_str(json).unwrap()
    }

    fn preset_with_fields(fields: Vec<ScreenFieldDocument>) -> CockpitPreset {
        let doc = PresetDocument {
            preset_name: "Test".into(),
            screen_field_items: fields,
            ..Default::default()
        };
        CockpitPreset::from_document(&doc).unwrap()
    }

    #[test]
    fn test_definition_uses_text_length_without_width() {
        let field = ScreenField::from_document(
            "p",
            0,
            &field_doc(r#"{"x": "5", "y": "7", "text": "NAV1", "color": "FFFF", "fontSize": "1"}"#),
        )
        .unwrap();
        assert_eq!(field.definition.to_string(), "005007FFFF104 ");
        assert!(field.runtime.visible);
    }

    #[test]
    fn test_zero_padded_kind_sets_padding() {
        let field = ScreenField::from_document(
            "p",
            0,
            &field_doc(r#"{"textWidth": 5, "simvarType": "TYPE_P0_NUMBER"}"#),
        )
        .unwrap();
        assert_eq!(field.definition.padding(), Padding::Zero);
    }

    #[test]
    fn test_value_kind_accepts_index() {
        let field = field_doc(r#"{"simvarType": 3}"#);
        assert_eq!(field.simvar_type, ValueKind::Boolean);
    }

    #[test]
    fn test_boolean_alternate_definition() {
        let mut field = ScreenField::from_document(
            "p",
            0,
            &field_doc(
                r#"{"text": "ON ", "altText": "OFF", "color": "07E0", "altColor": "F800", "simvarType": "TYPE_BOOLEAN"}"#,
            ),
        )
        .unwrap();
        assert_eq!(field.current_definition().color(), Rgb565(0x07E0));
        field.runtime.last_bool = false;
        assert_eq!(field.current_definition().color(), Rgb565(0xF800));
        assert_eq!(field.boolean_text(), "OFF");
    }

    #[test]
    fn test_knob_step_falls_back() {
        let field = ScreenField::from_document(
            "p",
            0,
            &field_doc(r#"{"knobSpec": "0000000000359Y", "knobStep": "XMLVAR_INCREMENT", "textWidth": 3}"#),
        )
        .unwrap();
        assert_eq!(field.knob_step, 1);
        assert!(field.knob.is_some());
    }

    #[test]
    fn test_bad_knob_spec_is_an_error() {
        let result = ScreenField::from_document("p", 2, &field_doc(r#"{"knobSpec": "9xx"}"#));
        assert!(matches!(result, Err(PresetError::Field { field: 2, .. })));
    }

    #[test]
    fn test_visibility_condition_parsing() {
        let c = VisibilityCondition::parse("FLAPS HANDLE INDEX,number=1", 3).unwrap();
        assert_eq!(c.variable, SimVariable::new("FLAPS HANDLE INDEX", "number"));
        assert_eq!(c.field, 3);

        let c = VisibilityCondition::parse("(L:A32NX_FLAPS,enum)=2", 0).unwrap();
        assert_eq!(c.variable.name, "(L:A32NX_FLAPS,enum)");
        assert_eq!(c.variable.unit, "");

        assert!(VisibilityCondition::parse("NO_EQUALS", 0).is_none());
        assert!(VisibilityCondition::parse("A=1=2", 0).is_none());
    }

    #[test]
    fn test_visibility_numeric_and_text_compare() {
        let c = VisibilityCondition::parse("GEAR,bool=1", 0).unwrap();
        assert!(c.is_satisfied_by("1.0"));
        assert!(c.is_satisfied_by("1"));
        assert!(!c.is_satisfied_by("0"));

        let c = VisibilityCondition::parse("MODE=NAV", 0).unwrap();
        assert!(c.is_satisfied_by("NAV"));
        assert!(!c.is_satisfied_by("nav"));
    }

    #[test]
    fn test_conditioned_fields_start_hidden() {
        let preset = preset_with_fields(vec![
            field_doc(r#"{"text": "A"}"#),
            field_doc(r#"{"text": "B", "visibilityCondition": "GEAR,bool=1"}"#),
        ]);
        assert!(preset.fields[0].runtime.visible);
        assert!(!preset.fields[1].runtime.visible);
        assert_eq!(preset.visibility.len(), 1);
        assert_eq!(preset.switches.len(), SWITCH_COUNT);
    }

    #[test]
    fn test_subscriptions_are_distinct() {
        let preset = preset_with_fields(vec![
            field_doc(r#"{"simVariable": "GEAR", "unitOfMeasure": "bool"}"#),
            field_doc(r#"{"simVariable": "HDG", "unitOfMeasure": "degrees"}"#),
            field_doc(r#"{"text": "X", "visibilityCondition": "GEAR,bool=1"}"#),
        ]);
        let names: Vec<_> = preset.subscriptions().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["GEAR", "HDG"]);
    }

    #[test]
    fn test_script_events() {
        assert_eq!(
            EventRef::parse("!(>K:A32NX.FCU_HDG_INC)"),
            Some(EventRef::Script("(>K:A32NX.FCU_HDG_INC)".into()))
        );
        assert_eq!(EventRef::parse("AP_MASTER"), Some(EventRef::Native("AP_MASTER".into())));
        assert_eq!(EventRef::parse("  "), None);
    }

    #[test]
    fn test_switch_labels_layout() {
        let mut doc = PresetDocument {
            preset_name: "Labels".into(),
            ..Default::default()
        };
        for i in 0..SWITCH_COUNT {
            doc.switch_def_items.push(SwitchDocument {
                switch_label: format!("L{i}"),
                ..Default::default()
            });
        }
        let labels = CockpitPreset::from_document(&doc).unwrap().switch_labels();
        assert_eq!(labels.len(), 14);
        assert_eq!(labels[0], "L0\nL1");
        assert_eq!(labels[5], "L10\nL11");
        assert_eq!(labels[6], "L12");
        assert_eq!(labels[13], "L19");
    }

    #[test]
    fn test_reset_runtime_clears_handles() {
        let doc = PresetDocument {
            preset_name: "Handles".into(),
            screen_field_items: vec![field_doc(r#"{"simVariable": "HDG", "simEvent": "HEADING_BUG_SET"}"#)],
            switch_def_items: vec![SwitchDocument {
                sim_event_on: "GEAR_UP".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut preset = CockpitPreset::from_document(&doc).unwrap();
        preset.fields[0].runtime.event_handle = Some(EventHandle(4));
        preset.fields[0].runtime.last_bool = false;
        if let Some(action) = preset.switches[0].on.as_mut() {
            action.handle = Some(EventHandle(5));
        }
        preset.reset_runtime();
        assert_eq!(preset.fields[0].runtime.event_handle, None);
        assert!(preset.fields[0].runtime.last_bool);
        assert_eq!(preset.switches[0].on.as_ref().and_then(|a| a.handle), None);
    }

    #[test]
    fn test_restart_keeps_values() {
        let doc = PresetDocument {
            preset_name: "Restart".into(),
            screen_field_items: vec![
                field_doc(r#"{"text": "---", "simVariable": "HDG", "simEvent": "HEADING_BUG_SET"}"#),
                field_doc(r#"{"text": "ALT", "visibilityCondition": "AUTOPILOT MASTER,bool=1"}"#),
            ],
            ..Default::default()
        };
        let mut preset = CockpitPreset::from_document(&doc).unwrap();
        preset.reset_runtime();
        preset.fields[0].runtime.text = "270".into();
        preset.fields[0].runtime.last_bool = false;
        preset.fields[0].runtime.event_handle = Some(EventHandle(2));
        preset.fields[1].runtime.visible = true;

        preset.restart_runtime();
        assert_eq!(preset.fields[0].runtime.text, "270");
        assert!(!preset.fields[0].runtime.last_bool);
        assert_eq!(preset.fields[0].runtime.event_handle, None);
        assert!(!preset.fields[1].runtime.visible);

        preset.reset_runtime();
        assert_eq!(preset.fields[0].runtime.text, "---");
    }
}
