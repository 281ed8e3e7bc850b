use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A money field as it arrives from a form: either a JSON number or free text
/// such as `"1,250.50"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(f64),
    Text(String),
}

impl Default for AmountField {
    fn default() -> Self {
        AmountField::Number(0.0)
    }
}

impl AmountField {
    pub fn value(&self) -> f64 {
        match self {
            AmountField::Number(n) if n.is_finite() => *n,
            AmountField::Number(_) => 0.0,
            AmountField::Text(s) => parse_amount(s),
        }
    }
}

/// Blank or unparsable input reads as zero; thousands separators are stripped.
pub fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '\u{066C}' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Parses an optional `YYYY-MM-DD` form field. Blank means "no date";
/// anything else that is not a date is an error carrying the raw text.
pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| s.to_string()),
    }
}

/// Trims a text field; `None` becomes the empty string.
pub fn clean_text(raw: Option<&str>) -> String {
    raw.map(str::trim).unwrap_or_default().to_string()
}
