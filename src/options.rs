// src/options.rs

//! Universal display options.
//!
//! These are read from a unit's configuration block and overlaid onto every
//! record the unit produces. A value of the wrong type fails the load of
//! that unit instead of being coerced.

use std::str::FromStr;

use serde_json::{Map, Number, Value};

use crate::config::UnitOptionMap;
use crate::errors::{EngineError, Result};
use crate::unit::UnitId;

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    pub fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

impl FromStr for Align {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(Align::Left),
            "center" => Ok(Align::Center),
            "right" => Ok(Align::Right),
            other => Err(format!(
                "invalid value {other:?}, valid values are: left, center, right"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniversalOptions {
    pub min_width: Option<Number>,
    pub separator: Option<bool>,
    pub separator_block_width: Option<i64>,
    pub align: Option<Align>,
}

impl UniversalOptions {
    /// Extract and validate the universal options of one unit.
    pub fn from_config(id: &UnitId, raw: &UnitOptionMap) -> Result<Self> {
        let invalid = |option: &str, reason: String| EngineError::InvalidOption {
            unit: id.full_name().to_string(),
            option: option.to_string(),
            reason,
        };

        let mut opts = UniversalOptions::default();

        if let Some(v) = raw.get("min_width") {
            match v {
                Value::Number(n) => opts.min_width = Some(n.clone()),
                other => return Err(invalid("min_width", format!("should be a number, got {other}"))),
            }
        }

        if let Some(v) = raw.get("separator") {
            match v {
                Value::Bool(b) => opts.separator = Some(*b),
                other => return Err(invalid("separator", format!("should be a bool, got {other}"))),
            }
        }

        if let Some(v) = raw.get("separator_block_width") {
            match v.as_i64() {
                Some(w) => opts.separator_block_width = Some(w),
                None => {
                    return Err(invalid(
                        "separator_block_width",
                        format!("should be an int, got {v}"),
                    ));
                }
            }
        }

        if let Some(v) = raw.get("align") {
            let parsed = v
                .as_str()
                .ok_or_else(|| format!("should be a string, got {v}"))
                .and_then(Align::from_str)
                .map_err(|reason| invalid("align", reason))?;
            opts.align = Some(parsed);
        }

        Ok(opts)
    }

    pub fn is_empty(&self) -> bool {
        *self == UniversalOptions::default()
    }

    /// Overlay the options onto a record. Option values replace whatever the
    /// producer set for the same keys.
    pub fn apply(&self, record: &mut Map<String, Value>) {
        if let Some(w) = &self.min_width {
            record.insert("min_width".into(), Value::Number(w.clone()));
        }
        if let Some(s) = self.separator {
            record.insert("separator".into(), Value::Bool(s));
        }
        if let Some(w) = self.separator_block_width {
            record.insert("separator_block_width".into(), Value::from(w));
        }
        if let Some(a) = self.align {
            record.insert("align".into(), Value::from(a.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(pairs: &[(&str, Value)]) -> UnitOptionMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn accepts_well_typed_options() {
        let id = UnitId::parse("clock");
        let opts = UniversalOptions::from_config(
            &id,
            &block(&[
                ("min_width", json!(120)),
                ("separator", json!(false)),
                ("separator_block_width", json!(9)),
                ("align", json!("Center")),
                ("format", json!("%H:%M")),
            ]),
        )
        .unwrap();

        assert_eq!(opts.separator, Some(false));
        assert_eq!(opts.separator_block_width, Some(9));
        assert_eq!(opts.align, Some(Align::Center));

        let mut record = Map::new();
        record.insert("separator".into(), json!(true));
        record.insert("full_text".into(), json!("12:00"));
        opts.apply(&mut record);
        assert_eq!(record["separator"], json!(false));
        assert_eq!(record["align"], json!("center"));
        assert_eq!(record["min_width"], json!(120));
        assert_eq!(record["full_text"], json!("12:00"));
    }

    #[test]
    fn rejects_wrong_types() {
        let id = UnitId::parse("clock");
        for (key, value) in [
            ("separator", json!("no")),
            ("separator_block_width", json!(2.5)),
            ("align", json!("middle")),
            ("align", json!(1)),
            ("min_width", json!([1])),
        ] {
            let err = UniversalOptions::from_config(&id, &block(&[(key, value)])).unwrap_err();
            match err {
                EngineError::InvalidOption { option, .. } => assert_eq!(option, key),
                other => panic!("expected InvalidOption, got {other:?}"),
            }
        }
    }
}
