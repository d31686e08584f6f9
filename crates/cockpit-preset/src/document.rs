//! On-disk preset document layout
//!
//! Preset files are JSON objects written by hand, so the readers here are
//! forgiving: missing keys take defaults, `null` lists read as empty, and
//! numeric columns such as `x` accept either `"120"` or `120`.

use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::model::ValueKind;
use crate::version::SimVersionMask;

/// One preset file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetDocument {
    #[serde(rename = "presetName", deserialize_with = "null_as_default")]
    pub preset_name: String,
    #[serde(rename = "fsVersion")]
    pub fs_version: SimVersionMask,
    #[serde(rename = "AtcModelKeywords", deserialize_with = "null_as_default")]
    pub atc_model_keywords: Vec<String>,
    #[serde(rename = "AtcTypeKeywords", deserialize_with = "null_as_default")]
    pub atc_type_keywords: Vec<String>,
    #[serde(rename = "bgColor", deserialize_with = "null_as_default")]
    pub bg_color: String,
    #[serde(rename = "screenFieldItems", deserialize_with = "null_as_default")]
    pub screen_field_items: Vec<ScreenFieldDocument>,
    #[serde(rename = "switchDefItems", deserialize_with = "null_as_default")]
    pub switch_def_items: Vec<SwitchDocument>,
}

/// One screen field entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenFieldDocument {
    pub visibility_condition: String,
    pub text: String,
    #[serde(deserialize_with = "lenient_number")]
    pub x: u16,
    #[serde(deserialize_with = "lenient_number")]
    pub y: u16,
    pub color: String,
    #[serde(deserialize_with = "lenient_number")]
    pub font_size: u8,
    #[serde(deserialize_with = "lenient_number")]
    pub text_width: u8,
    pub sim_variable: String,
    pub sim_event: String,
    pub unit_of_measure: String,
    pub simvar_type: ValueKind,
    #[serde(deserialize_with = "lenient_number")]
    pub decimal_places: u8,
    pub alt_text: String,
    pub alt_color: String,
    pub knob_spec: String,
    pub knob_step: String,
}

impl Default for ScreenFieldDocument {
    fn default() -> Self {
        Self {
            visibility_condition: String::new(),
            text: String::new(),
            x: 0,
            y: 0,
            color: "D6BA".to_string(),
            font_size: 2,
            text_width: 0,
            sim_variable: String::new(),
            sim_event: String::new(),
            unit_of_measure: String::new(),
            simvar_type: ValueKind::Text,
            decimal_places: 0,
            alt_text: String::new(),
            alt_color: String::new(),
            knob_spec: String::new(),
            knob_step: String::new(),
        }
    }
}

/// One switch entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwitchDocument {
    pub switch_label: String,
    pub sim_event_on: String,
    pub sim_event_on_value: u32,
    pub sim_event_off: String,
    pub sim_event_off_value: u32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => {
            T::try_from(n).map_err(|_| de::Error::custom(format!("number {n} out of range")))
        }
        Repr::Text(text) if text.trim().is_empty() => Ok(T::default()),
        Repr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid number {text:?}"))),
    }
}
