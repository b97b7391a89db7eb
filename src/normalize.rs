//! Geo-coordinate normalization
//!
//! Listing sources encode latitude/longitude in several incompatible textual
//! formats. [`normalize_geopoint`] reconciles them into a canonical decimal
//! degree:
//! - plain signed decimal strings (`-20.646`)
//! - degrees-minutes-seconds with a hemisphere suffix (`19°33'19.5"S`)
//! - free text with embedded decimals, including combined "lat, lon" strings
//!   split by calling the function twice with different component indices
//! - integers with an implied decimal point (`2084846291235996`)
//!
//! Normalization never fails: a value matching no known pattern is returned
//! unchanged, and downstream consumers treat a non-numeric coordinate as a
//! data-quality signal.

use crate::config::FieldsConfig;
use crate::types::RawRecord;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+\.\d+$").expect("static regex"))
}

#[allow(clippy::expect_used)]
fn dms_re() -> &'static Regex {
    // Separators are intentionally any single char; only the decimal seconds
    // anchor the shape. Matches e.g. 19°33'19.5"S
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+).(\d+).(\d+\.\d+)").expect("static regex"))
}

#[allow(clippy::expect_used)]
fn embedded_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+\.\d+").expect("static regex"))
}

#[allow(clippy::expect_used)]
fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+$").expect("static regex"))
}

/// Normalize one coordinate value into a decimal degree
///
/// `component_index` selects which embedded decimal to pick from combined
/// "lat, lon" strings: 0 for latitude, 1 for longitude. Values that are
/// empty, already numeric, or match no known encoding are returned unchanged.
pub fn normalize_geopoint(value: &Value, component_index: usize) -> Value {
    let text = match value {
        Value::Null | Value::Number(_) => return value.clone(),
        Value::String(s) if s.is_empty() => return value.clone(),
        Value::String(s) => s.as_str(),
        _ => return value.clone(),
    };

    match parse_geopoint(text, component_index) {
        Some(degrees) => serde_json::Number::from_f64(degrees)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        None => value.clone(),
    }
}

fn parse_geopoint(text: &str, component_index: usize) -> Option<f64> {
    // 1. Plain signed decimal string: -20.646
    if decimal_re().is_match(text) {
        return text.parse().ok();
    }

    // 2. Degrees-minutes-seconds, sign from the trailing hemisphere letter
    if let Some(caps) = dms_re().captures(text) {
        let degrees: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        let mut result = degrees + minutes / 60.0 + seconds / 3600.0;
        if matches!(text.chars().last(), Some('S' | 'W')) {
            result = -result;
        }
        return Some(result);
    }

    // 3. Embedded decimals: -20.646434548320997, -40.52329658650793
    let embedded: Vec<&str> = embedded_re().find_iter(text).map(|m| m.as_str()).collect();
    if !embedded.is_empty() {
        let picked = if embedded.len() == 1 {
            embedded[0]
        } else {
            embedded.get(component_index).copied()?
        };
        return picked.parse().ok();
    }

    // 4. Integer with an implied decimal point: 2084846291235996
    if integer_re().is_match(text) {
        let n: f64 = text.parse().ok()?;
        if n == 0.0 {
            return None;
        }
        let digits = n.abs().log10().floor();
        return Some(n / 10f64.powf(digits - 1.0));
    }

    None
}

/// Normalize the latitude/longitude fields of a record
///
/// Latitude uses component index 0, longitude index 1, so a combined
/// coordinate string duplicated across both fields splits correctly.
/// Missing coordinate fields are left untouched.
pub fn normalize_record(record: &RawRecord, fields: &FieldsConfig) -> RawRecord {
    let mut result = record.clone();
    if let Some(value) = record.get(&fields.latitude) {
        result.insert(fields.latitude.clone(), normalize_geopoint(value, 0));
    }
    if let Some(value) = record.get(&fields.longitude) {
        result.insert(fields.longitude.clone(), normalize_geopoint(value, 1));
    }
    result
}
