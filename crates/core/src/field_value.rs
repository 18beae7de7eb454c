use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// A single cell value. Grid records are maps from field name to one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b).is_eq(),
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            FieldValue::Timestamp(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Text as the grid shows it. Filtering, string sorting and column
    /// measurement all work on this form.
    pub fn display_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Timestamp(ms) => format_timestamp(*ms),
        }
    }

    /// Numeric sort key. Text is parsed leniently from its leading number;
    /// anything unparseable sorts as zero.
    pub fn sort_number(&self) -> f64 {
        match self {
            FieldValue::Number(n) if !n.is_nan() => *n,
            FieldValue::Number(_) | FieldValue::Null => 0.0,
            FieldValue::Text(s) => parse_leading_f64(s).unwrap_or(0.0),
            FieldValue::Timestamp(ms) => *ms as f64,
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// RFC 3339 with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

/// Parse the longest numeric prefix of `s`, ignoring leading whitespace.
/// `"12.5kg"` gives 12.5, `"abc"` gives `None`.
pub fn parse_leading_f64(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    // Exponent only counts if at least one digit follows it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_number_parse() {
        assert_eq!(parse_leading_f64("12.5"), Some(12.5));
        assert_eq!(parse_leading_f64("  30 units"), Some(30.0));
        assert_eq!(parse_leading_f64("-4e2x"), Some(-400.0));
        assert_eq!(parse_leading_f64("7e"), Some(7.0));
        assert_eq!(parse_leading_f64(".5"), Some(0.5));
        assert_eq!(parse_leading_f64("abc"), None);
        assert_eq!(parse_leading_f64(""), None);
        assert_eq!(parse_leading_f64("-"), None);
        assert_eq!(parse_leading_f64("."), None);
    }

    #[test]
    fn sort_number_defaults_to_zero() {
        assert_eq!(FieldValue::Text("n/a".into()).sort_number(), 0.0);
        assert_eq!(FieldValue::Null.sort_number(), 0.0);
        assert_eq!(FieldValue::Number(f64::NAN).sort_number(), 0.0);
        assert_eq!(FieldValue::Text("19.99".into()).sort_number(), 19.99);
    }

    #[test]
    fn display_text_forms() {
        assert_eq!(FieldValue::Null.display_text(), "");
        assert_eq!(FieldValue::Number(30.0).display_text(), "30");
        assert_eq!(FieldValue::Number(12.5).display_text(), "12.5");
        assert_eq!(
            FieldValue::Timestamp(1_700_000_000_000).display_text(),
            "2023-11-14T22:13:20.000Z"
        );
    }

    #[test]
    fn msgpack_preserves_variant() {
        let values = [
            FieldValue::Null,
            FieldValue::Text("abc".into()),
            FieldValue::Number(12.5),
            FieldValue::Timestamp(42),
        ];
        for value in values {
            let bytes = value.to_msgpack().unwrap();
            assert_eq!(FieldValue::from_msgpack(&bytes).unwrap(), value);
        }
    }
}
