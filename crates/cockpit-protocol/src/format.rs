//! Fixed-width text helpers shared by the encoders and the engine
//!
//! The panel firmware reads every numeric sub-field at a fixed column, so
//! values are padded on the left. Widths are counted in characters, never
//! bytes, because preset texts may contain non-ASCII glyph placeholders.

/// Left-pad `text` with `fill` until it is `width` characters wide
///
/// Text already at or beyond `width` is returned unchanged.
pub fn pad_left(text: &str, width: usize, fill: char) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat(fill).take(width - len));
    out.push_str(text);
    out
}

/// Zero-pad a signed number so that a leading `-` stays in the first column
///
/// `pad_signed("-3", 5)` is `"-0003"`, `pad_signed("42", 5)` is `"00042"`.
pub fn pad_signed(text: &str, width: usize) -> String {
    match text.strip_prefix('-') {
        Some(digits) => {
            let mut out = String::with_capacity(width);
            out.push('-');
            out.push_str(&pad_left(digits, width.saturating_sub(1), '0'));
            out
        }
        None => pad_left(text, width, '0'),
    }
}

/// Pad to `width` with `fill`, then cut anything past `width` characters
pub fn fit(text: &str, width: usize, fill: char) -> String {
    pad_left(text, width, fill).chars().take(width).collect()
}

/// Render `value` rounded to `decimal_places`, never producing `-0`
pub fn format_decimal(value: f64, decimal_places: u8) -> String {
    let text = format!("{:.*}", usize::from(decimal_places), value);
    match text.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => text,
    }
}

/// Replace characters that would break line framing
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_signed_negative() {
        assert_eq!(pad_signed("-3", 5), "-0003");
        assert_eq!(pad_signed("-12.5", 6), "-012.5");
    }

    #[test]
    fn test_pad_signed_positive() {
        assert_eq!(pad_signed("3", 5), "00003");
        assert_eq!(pad_signed("123456", 5), "123456");
    }

    #[test]
    fn test_pad_left_spaces() {
        assert_eq!(pad_left("7.5", 6, ' '), "   7.5");
        assert_eq!(pad_left("", 2, ' '), "  ");
    }

    #[test]
    fn test_fit_truncates() {
        assert_eq!(fit("ABCDEFG", 4, ' '), "ABCD");
        assert_eq!(fit("AB", 4, ' '), "  AB");
    }

    #[test]
    fn test_format_decimal_rounding() {
        assert_eq!(format_decimal(29.921, 2), "29.92");
        assert_eq!(format_decimal(359.6, 0), "360");
        assert_eq!(format_decimal(-7.26, 1), "-7.3");
    }

    #[test]
    fn test_format_decimal_negative_zero() {
        assert_eq!(format_decimal(-0.4, 0), "0");
        assert_eq!(format_decimal(-0.001, 2), "0.00");
    }

    #[test]
    fn test_sanitize_strips_delimiters() {
        assert_eq!(sanitize("A\nB\r"), "A B ");
    }
}
