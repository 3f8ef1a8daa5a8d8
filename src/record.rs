// src/record.rs

//! Output records, cache deadlines and producer response normalization.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::ContractViolation;

/// Sentinel `cached_until` value meaning "never reschedule automatically".
pub const CACHE_FOREVER: f64 = -1.0;

/// Key of the required display text.
pub const FULL_TEXT: &str = "full_text";
/// Key of the optional explicit cache deadline (Unix seconds).
pub const CACHED_UNTIL: &str = "cached_until";

/// Point in time (Unix seconds) after which a producer is due again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deadline {
    At(f64),
    /// Never due by the passage of time.
    Forever,
}

impl Deadline {
    /// A producer is due exactly when `now >= deadline`.
    pub fn is_due(self, now: f64) -> bool {
        match self {
            Deadline::At(t) => now >= t,
            Deadline::Forever => false,
        }
    }

    /// The sooner of two deadlines; `Forever` only wins against `Forever`.
    pub fn earliest(self, other: Deadline) -> Deadline {
        match (self, other) {
            (Deadline::At(a), Deadline::At(b)) => Deadline::At(a.min(b)),
            (Deadline::At(a), Deadline::Forever) | (Deadline::Forever, Deadline::At(a)) => {
                Deadline::At(a)
            }
            (Deadline::Forever, Deadline::Forever) => Deadline::Forever,
        }
    }

    pub fn is_forever(self) -> bool {
        matches!(self, Deadline::Forever)
    }

    /// Read a `cached_until` value.
    pub fn from_value(value: &Value) -> Result<Deadline, ContractViolation> {
        match value.as_f64() {
            Some(t) if t == CACHE_FOREVER => Ok(Deadline::Forever),
            Some(t) if t.is_finite() => Ok(Deadline::At(t)),
            _ => Err(ContractViolation::BadCacheDeadline(value.to_string())),
        }
    }
}

/// Fold an optional running minimum with a new deadline.
pub fn track_earliest(current: Option<Deadline>, next: Deadline) -> Option<Deadline> {
    Some(match current {
        Some(c) => c.earliest(next),
        None => next,
    })
}

/// One block of bar output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutputRecord(Map<String, Value>);

impl OutputRecord {
    /// Empty record a producer shows before its first successful run.
    pub fn placeholder(producer: &str) -> Self {
        let mut map = Map::new();
        map.insert("name".into(), Value::from(producer));
        map.insert(FULL_TEXT.into(), Value::from(""));
        OutputRecord(map)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        OutputRecord(map)
    }

    pub fn full_text(&self) -> Option<&str> {
        self.0.get(FULL_TEXT).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn instance(&self) -> Option<&str> {
        self.0.get("instance").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A producer response after shape validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: Map<String, Value>,
    /// Position reported by a legacy `[position, record]` response.
    pub position: Option<Value>,
    /// Explicit cache deadline, when the record carried one.
    pub cached_until: Option<Deadline>,
}

/// Validate and unpack a producer response.
///
/// Accepts a record object, or a two-element `[position, record]` array.
/// The record must carry `full_text`; `cached_until`, when present, must be
/// a number.
pub fn normalize_response(response: Value) -> Result<Normalized, ContractViolation> {
    let (position, record) = match response {
        Value::Object(map) => (None, map),
        Value::Array(mut pair) if pair.len() == 2 => match pair.pop() {
            Some(Value::Object(map)) => (pair.pop(), map),
            _ => return Err(ContractViolation::NotARecord),
        },
        _ => return Err(ContractViolation::NotARecord),
    };

    if !record.contains_key(FULL_TEXT) {
        return Err(ContractViolation::MissingFullText);
    }

    let cached_until = record.get(CACHED_UNTIL).map(Deadline::from_value).transpose()?;

    Ok(Normalized {
        record,
        position,
        cached_until,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn forever_is_never_due_and_loses_minimum() {
        assert!(!Deadline::Forever.is_due(f64::MAX));
        assert!(Deadline::At(5.0).is_due(5.0));
        assert!(!Deadline::At(5.0).is_due(4.999));
        assert_eq!(Deadline::Forever.earliest(Deadline::At(9.0)), Deadline::At(9.0));
        assert_eq!(Deadline::At(3.0).earliest(Deadline::At(9.0)), Deadline::At(3.0));
    }

    #[test]
    fn normalizes_plain_and_positioned_responses() {
        let plain = normalize_response(json!({"full_text": "ok", "cached_until": 12.5})).unwrap();
        assert_eq!(plain.position, None);
        assert_eq!(plain.cached_until, Some(Deadline::At(12.5)));

        let legacy = normalize_response(json!([0, {"full_text": "vpn"}])).unwrap();
        assert_eq!(legacy.position, Some(json!(0)));
        assert_eq!(legacy.record["full_text"], json!("vpn"));

        let forever = normalize_response(json!({"full_text": "", "cached_until": -1})).unwrap();
        assert_eq!(forever.cached_until, Some(Deadline::Forever));
    }

    #[test]
    fn rejects_contract_violations() {
        assert_eq!(
            normalize_response(json!({"color": "#fff"})),
            Err(ContractViolation::MissingFullText)
        );
        assert_eq!(normalize_response(json!("text")), Err(ContractViolation::NotARecord));
        assert_eq!(
            normalize_response(json!([0, "text"])),
            Err(ContractViolation::NotARecord)
        );
        assert!(matches!(
            normalize_response(json!({"full_text": "", "cached_until": "soon"})),
            Err(ContractViolation::BadCacheDeadline(_))
        ));
    }
}
