//! Lenient deserializers for provider payloads
//!
//! Upstream APIs encode missing strings as `[]`, numbers as strings and absent
//! objects as empty arrays. These helpers accept all of those shapes.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept a string, a number or anything else (mapped to an empty string)
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Accept a plain string or an object carrying a `name` field
pub fn name_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    })
}

/// Accept an object, or treat any other shape (`[]`, `null`, `""`) as absent
pub fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => T::deserialize(value).map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

/// Parse a numeric string, falling back to zero on garbage
#[must_use]
pub fn lenient_f64(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Seconds string to whole minutes, rounded down
#[must_use]
pub fn seconds_to_minutes(raw: &str) -> u32 {
    to_u32(lenient_f64(raw) / 60.0)
}

/// Meters string to whole meters
#[must_use]
pub fn meters(raw: &str) -> u32 {
    to_u32(lenient_f64(raw))
}

fn to_u32(value: f64) -> u32 {
    if value <= 0.0 {
        0
    } else if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value.floor() as u32
    }
}
