// src/units/static_text.rs

//! `static_text`: shows a fixed string and never reschedules itself.
//!
//! Options: `format` (text, default empty), `color` (optional).
//! Clicking it forces a refresh.

use anyhow::Result;
use serde_json::{Map, Value, json};

use crate::engine::Py3;
use crate::unit::{Args, MethodSpec, StatusUnit, UnitContext};

pub const NAME: &str = "static_text";

#[derive(Debug)]
pub struct StaticText {
    format: String,
    color: Option<String>,
    py3: Py3,
}

impl StaticText {
    pub fn factory(ctx: UnitContext) -> Result<Box<dyn StatusUnit>> {
        Ok(Box::new(StaticText {
            format: ctx.options.get("format")?.unwrap_or_default(),
            color: ctx.options.get("color")?,
            py3: ctx.py3,
        }))
    }
}

impl StatusUnit for StaticText {
    fn methods(&self) -> Vec<MethodSpec> {
        vec![MethodSpec::new_style("show"), MethodSpec::new_style("on_click")]
    }

    fn call(&mut self, method: &str, _args: Args<'_>) -> Result<Value> {
        match method {
            "show" => {
                let mut record = Map::new();
                record.insert("full_text".into(), json!(self.format));
                record.insert("cached_until".into(), json!(Py3::CACHE_FOREVER));
                if let Some(color) = &self.color {
                    record.insert("color".into(), json!(color));
                }
                Ok(Value::Object(record))
            }
            "on_click" => {
                self.py3.update()?;
                Ok(Value::Null)
            }
            other => anyhow::bail!("unknown method '{other}'"),
        }
    }
}
