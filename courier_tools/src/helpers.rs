use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Courier identifiers and free-text fields arrive as JSON strings from some endpoints and as bare numbers from
/// others. Values of any other type are accepted but carry nothing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IdValue {
    Text(String),
    Number(Number),
    Other(Value),
}

impl IdValue {
    /// Returns the value as a trimmed string, or `None` if it is blank or not a string or number.
    pub fn into_non_empty(self) -> Option<String> {
        let s = match self {
            IdValue::Text(s) => s.trim().to_string(),
            IdValue::Number(n) => number_text(&n),
            IdValue::Other(_) => return None,
        };
        (!s.is_empty()).then_some(s)
    }
}

impl Display for IdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdValue::Text(s) => write!(f, "{s}"),
            IdValue::Number(n) => write!(f, "{}", number_text(n)),
            IdValue::Other(v) => write!(f, "{v}"),
        }
    }
}

/// Whole floats (`9876543210.0`) are written without the fraction, so that a phone number or id sent as a float
/// reads the same as one sent as an integer.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(v) if n.is_f64() && v.fract() == 0.0 && v.abs() < 9.0e15 => format!("{}", v as i64),
        _ => n.to_string(),
    }
}

/// Coordinates are sometimes quoted. Values of any other type are accepted but carry no coordinate.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FlexibleNumber {
    Number(f64),
    Text(String),
    Other(Value),
}

impl FlexibleNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FlexibleNumber::Number(v) => Some(*v),
            FlexibleNumber::Text(s) => s.trim().parse::<f64>().ok(),
            FlexibleNumber::Other(_) => None,
        }
        .filter(|v| v.is_finite())
    }
}

pub(crate) fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_from_strings_or_numbers() {
        let id: IdValue = serde_json::from_str("12345").unwrap();
        assert_eq!(id.into_non_empty(), Some("12345".to_string()));
        let id: IdValue = serde_json::from_str("\" GZ001 \"").unwrap();
        assert_eq!(id.into_non_empty(), Some("GZ001".to_string()));
        let id: IdValue = serde_json::from_str("\"  \"").unwrap();
        assert_eq!(id.into_non_empty(), None);
        let id: IdValue = serde_json::from_str("9876543210.0").unwrap();
        assert_eq!(id.into_non_empty(), Some("9876543210".to_string()));
        let id: IdValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(id.into_non_empty(), Some("12.5".to_string()));
        let id: IdValue = serde_json::from_str("true").unwrap();
        assert_eq!(id.into_non_empty(), None);
        let id: IdValue = serde_json::from_str(r#"{"code": 7}"#).unwrap();
        assert_eq!(id.into_non_empty(), None);
    }

    #[test]
    fn quoted_coordinates() {
        let n: FlexibleNumber = serde_json::from_str("\"12.9716\"").unwrap();
        assert_eq!(n.as_f64(), Some(12.9716));
        let n: FlexibleNumber = serde_json::from_str("77.5946").unwrap();
        assert_eq!(n.as_f64(), Some(77.5946));
        let n: FlexibleNumber = serde_json::from_str("\"north\"").unwrap();
        assert_eq!(n.as_f64(), None);
        let n: FlexibleNumber = serde_json::from_str("[12.9, 77.5]").unwrap();
        assert_eq!(n.as_f64(), None);
    }
}
