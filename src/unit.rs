// src/unit.rs

//! The contract a pluggable status unit implements.
//!
//! A unit is any type implementing [`StatusUnit`]. It lists its callables via
//! [`StatusUnit::methods`] and the engine invokes them by name through
//! [`StatusUnit::call`], passing [`Args`] shaped by the calling convention the
//! method registry detected for that callable.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::engine::Py3;

/// Stable identity of a loaded unit: its name plus an optional instance
/// qualifier (e.g. `"vpn_status home"` → name `vpn_status`, instance `home`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId {
    name: String,
    instance: String,
    full_name: String,
}

impl UnitId {
    /// Parse a full unit name.
    ///
    /// The first whitespace-separated word is the name; the remaining words
    /// are concatenated (without spaces) into the instance qualifier.
    pub fn parse(full_name: &str) -> Self {
        let full_name = full_name.trim();
        let mut words = full_name.split(' ').filter(|w| !w.is_empty());
        let name = words.next().unwrap_or_default().to_string();
        let instance = words.collect::<String>();
        Self {
            name,
            instance,
            full_name: full_name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance qualifier; empty when the unit is not qualified.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Calling convention of a producer or handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Invoked with no arguments (click handlers: the event only).
    New,
    /// Invoked with the aggregated bar output and the general display
    /// configuration (click handlers: those two, then the event).
    Legacy,
}

/// How a callable advertises its calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// The unit states which protocol the callable implements.
    Declared(Convention),
    /// The callable's parameter list, as a dynamic unit would expose it.
    ///
    /// `positional` counts every declared positional parameter *including*
    /// the receiver slot, so `fn update(self)` is `positional == 1`.
    Params {
        positional: usize,
        variadic: bool,
        keywords: bool,
    },
}

impl CallShape {
    /// A plain positional parameter list with no collectors.
    pub fn params(positional: usize) -> Self {
        CallShape::Params {
            positional,
            variadic: false,
            keywords: false,
        }
    }
}

/// One callable exposed by a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: String,
    pub shape: CallShape,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, shape: CallShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// A callable declaring the new convention.
    pub fn new_style(name: impl Into<String>) -> Self {
        Self::new(name, CallShape::Declared(Convention::New))
    }

    /// A callable declaring the legacy convention.
    pub fn legacy(name: impl Into<String>) -> Self {
        Self::new(name, CallShape::Declared(Convention::Legacy))
    }
}

/// Extra arguments passed to a legacy-convention callable.
#[derive(Debug, Clone, Copy)]
pub struct LegacyArgs<'a> {
    /// Current aggregated bar output.
    pub bar: &'a [Value],
    /// General display configuration (`[general]`).
    pub general: &'a Map<String, Value>,
}

/// Arguments of one invocation.
#[derive(Debug, Clone, Copy)]
pub enum Args<'a> {
    /// New-convention producer or teardown.
    None,
    /// Legacy-convention producer or teardown.
    Legacy(LegacyArgs<'a>),
    /// New-convention click handler.
    Event(&'a Value),
    /// Legacy-convention click handler: bar output, general config, event.
    LegacyEvent(LegacyArgs<'a>, &'a Value),
}

/// A status unit.
///
/// Producers return a record object (`{"full_text": ..., ...}`) or, under
/// the legacy convention, a `[position, record]` pair. Errors and panics are
/// contained by the engine and never reach other units.
pub trait StatusUnit: Send + 'static {
    /// Every callable the unit exposes, public or not.
    ///
    /// Names starting with `_` are private and never invoked. `on_click` and
    /// `kill` are the reserved click and teardown handlers; every other
    /// public name is a producer.
    fn methods(&self) -> Vec<MethodSpec>;

    /// Invoke a callable by name.
    fn call(&mut self, method: &str, args: Args<'_>) -> anyhow::Result<Value>;
}

/// Scalar configuration handed to a unit at construction.
///
/// Keys starting with `.` configure the engine and are never visible here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOptions {
    values: BTreeMap<String, Value>,
}

impl UnitOptions {
    /// Prefix marking engine-private option names.
    pub const PRIVATE_PREFIX: char = '.';

    pub fn from_config(raw: &BTreeMap<String, Value>) -> Self {
        let values = raw
            .iter()
            .filter(|(k, _)| !k.starts_with(Self::PRIVATE_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { values }
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    /// Deserialize an option into any type; `Ok(None)` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .with_context(|| format!("option '{key}' has an unexpected type")),
        }
    }

    /// Like [`get`](Self::get) but fails when the option is missing.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<T> {
        self.get(key)?
            .ok_or_else(|| anyhow!("missing required option '{key}'"))
    }
}

/// Everything a unit receives when it is constructed.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub id: UnitId,
    pub options: UnitOptions,
    /// Capability handle back into the engine; keep it only if needed.
    pub py3: Py3,
}
