//! Field value rendering and event payload conversion

use cockpit_preset::{ScreenField, ValueKind};
use cockpit_protocol::format::{fit, format_decimal, pad_signed};

/// Altimeter setting event, the one event whose payload needs unit scaling
pub const ALTIMETER_EVENT: &str = "KOHLSMAN_SET";

/// Altimeter payload units per millibar
const MILLIBAR_FACTOR: f64 = 16.0;
/// Altimeter payload units per inch of mercury
const INHG_FACTOR: f64 = 541.8224;

/// Render a simulator value for a non-boolean field
///
/// Knob-bound fields keep the bare number; the knob value encoder pads it.
/// Text that does not parse as a number is shown as received.
pub fn render_value(field: &ScreenField, raw: &str) -> String {
    let width = field.width();
    let number = match field.kind {
        ValueKind::Number | ValueKind::ZeroPaddedNumber => raw.trim().parse::<f64>().ok(),
        ValueKind::Text | ValueKind::Boolean => None,
    };
    let Some(number) = number else {
        return if field.knob.is_some() {
            raw.trim().to_string()
        } else {
            fit_width(raw, width, ' ')
        };
    };

    let text = format_decimal(number, field.decimal_places);
    if field.knob.is_some() {
        return text;
    }
    match field.kind {
        ValueKind::ZeroPaddedNumber if width > 0 => {
            pad_signed(&text, width).chars().take(width).collect()
        }
        _ => fit_width(&text, width, ' '),
    }
}

/// Interpret a boolean simulator value; anything non-zero is `true`
pub fn parse_bool(raw: &str) -> Option<bool> {
    raw.trim().parse::<f64>().ok().map(|v| v != 0.0)
}

/// Pad to the field width; fields without a width show the text as is
pub fn fit_width(text: &str, width: usize, fill: char) -> String {
    if width == 0 {
        text.to_string()
    } else {
        fit(text, width, fill)
    }
}

/// Convert a knob value into the payload of `event`
///
/// Values are truncated to a signed 32-bit integer and sent as its unsigned
/// bit pattern, except for the altimeter setting which is scaled per unit.
pub fn event_payload(event: &str, unit: &str, value: f64) -> u32 {
    if event.eq_ignore_ascii_case(ALTIMETER_EVENT) {
        let factor = if unit.eq_ignore_ascii_case("millibars") {
            MILLIBAR_FACTOR
        } else {
            INHG_FACTOR
        };
        (value * factor) as u32
    } else {
        (value.trunc() as i32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cockpit_preset::PresetLibrary;

    fn field(json: &str) -> ScreenField {
        let preset =
            PresetLibrary::parse(&format!(r#"{{"presetName": "T", "screenFieldItems": [{json}]}}"#))
                .unwrap();
        preset.fields[0].clone()
    }

    #[test]
    fn test_number_is_rounded_and_space_padded() {
        let f = field(r#"{"textWidth": 6, "simvarType": "TYPE_NUMBER", "decimalPlaces": 1}"#);
        assert_eq!(render_value(&f, "123.46"), " 123.5");
        assert_eq!(render_value(&f, "-3"), "  -3.0");
    }

    #[test]
    fn test_zero_padded_keeps_sign_first() {
        let f = field(r#"{"textWidth": 5, "simvarType": "TYPE_P0_NUMBER"}"#);
        assert_eq!(render_value(&f, "-3"), "-0003");
        assert_eq!(render_value(&f, "42.4"), "00042");
    }

    #[test]
    fn test_text_is_fitted() {
        let f = field(r#"{"textWidth": 4}"#);
        assert_eq!(render_value(&f, "NAV"), " NAV");
        assert_eq!(render_value(&f, "APPROACH"), "APPR");
    }

    #[test]
    fn test_unparseable_number_shown_raw() {
        let f = field(r#"{"textWidth": 4, "simvarType": "TYPE_NUMBER"}"#);
        assert_eq!(render_value(&f, "--"), "  --");
    }

    #[test]
    fn test_knob_field_keeps_bare_number() {
        let f = field(r#"{"textWidth": 3, "simvarType": "TYPE_NUMBER", "knobSpec": "0000000000359Y"}"#);
        assert_eq!(render_value(&f, "270.2"), "270");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0.0"), Some(false));
        assert_eq!(parse_bool("-0.5"), Some(true));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_altimeter_scaling() {
        assert_eq!(event_payload("KOHLSMAN_SET", "millibars", 1013.25), 16212);
        assert_eq!(event_payload("KOHLSMAN_SET", "inHg", 29.92), 16211);
    }

    #[test]
    fn test_plain_events_truncate() {
        assert_eq!(event_payload("HEADING_BUG_SET", "degrees", 270.9), 270);
        assert_eq!(event_payload("VS_SET", "feet per minute", -500.0), (-500i32) as u32);
    }
}
