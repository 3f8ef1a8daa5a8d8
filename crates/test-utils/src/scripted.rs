use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use barengine::{Args, CallShape, MethodSpec, Py3, StatusUnit, UnitContext};
use serde_json::{Map, Value, json};

/// What a scripted callable does when invoked.
#[derive(Debug, Clone)]
pub enum Reply {
    Value(Value),
    Fail(String),
    Panic(String),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Value(json!({ "full_text": text }))
    }

    pub fn fail(msg: &str) -> Self {
        Reply::Fail(msg.to_string())
    }
}

/// Owned copy of the arguments a callable received.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedArgs {
    None,
    Legacy {
        bar: Vec<Value>,
        general: Map<String, Value>,
    },
    Event(Value),
    LegacyEvent {
        bar: Vec<Value>,
        general: Map<String, Value>,
        event: Value,
    },
}

impl From<Args<'_>> for RecordedArgs {
    fn from(args: Args<'_>) -> Self {
        match args {
            Args::None => RecordedArgs::None,
            Args::Legacy(l) => RecordedArgs::Legacy {
                bar: l.bar.to_vec(),
                general: l.general.clone(),
            },
            Args::Event(e) => RecordedArgs::Event(e.clone()),
            Args::LegacyEvent(l, e) => RecordedArgs::LegacyEvent {
                bar: l.bar.to_vec(),
                general: l.general.clone(),
                event: e.clone(),
            },
        }
    }
}

/// Shared view of what a scripted unit did, kept by the test.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    calls: Arc<Mutex<Vec<(String, RecordedArgs)>>>,
    py3: Arc<Mutex<Option<Py3>>>,
    options: Arc<Mutex<Option<barengine::UnitOptions>>>,
}

impl Probe {
    pub fn calls(&self) -> Vec<(String, RecordedArgs)> {
        self.calls.lock().unwrap().clone()
    }

    /// Method names in invocation order.
    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// The `Py3` handle the unit received, once built through a factory.
    pub fn py3(&self) -> Option<Py3> {
        self.py3.lock().unwrap().clone()
    }

    /// The options the unit received, once built through a factory.
    pub fn options(&self) -> Option<barengine::UnitOptions> {
        self.options.lock().unwrap().clone()
    }
}

/// A unit whose callables replay scripted replies.
pub struct ScriptedUnit {
    methods: Vec<MethodSpec>,
    queued: HashMap<String, VecDeque<Reply>>,
    fallback: HashMap<String, Reply>,
    probe: Probe,
}

impl ScriptedUnit {
    pub fn builder() -> ScriptedUnitBuilder {
        ScriptedUnitBuilder {
            unit: ScriptedUnit {
                methods: Vec::new(),
                queued: HashMap::new(),
                fallback: HashMap::new(),
                probe: Probe::default(),
            },
        }
    }

    /// Turn the unit into a registry factory. The factory hands the unit out
    /// once; later calls fail.
    pub fn into_factory(
        self,
    ) -> impl Fn(UnitContext) -> anyhow::Result<Box<dyn StatusUnit>> + Send + Sync + 'static {
        let slot = Mutex::new(Some(self));
        move |ctx: UnitContext| {
            let unit = slot
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow!("scripted unit already constructed"))?;
            *unit.probe.py3.lock().unwrap() = Some(ctx.py3.clone());
            *unit.probe.options.lock().unwrap() = Some(ctx.options.clone());
            Ok(Box::new(unit) as Box<dyn StatusUnit>)
        }
    }
}

impl StatusUnit for ScriptedUnit {
    fn methods(&self) -> Vec<MethodSpec> {
        self.methods.clone()
    }

    fn call(&mut self, method: &str, args: Args<'_>) -> anyhow::Result<Value> {
        self.probe
            .calls
            .lock()
            .unwrap()
            .push((method.to_string(), RecordedArgs::from(args)));

        let reply = self
            .queued
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.fallback.get(method).cloned())
            .unwrap_or_else(|| Reply::text(method));

        match reply {
            Reply::Value(v) => Ok(v),
            Reply::Fail(msg) => Err(anyhow!(msg)),
            Reply::Panic(msg) => panic!("{msg}"),
        }
    }
}

pub struct ScriptedUnitBuilder {
    unit: ScriptedUnit,
}

impl ScriptedUnitBuilder {
    /// Add a callable with the given shape.
    pub fn method(mut self, name: &str, shape: CallShape) -> Self {
        self.unit.methods.push(MethodSpec::new(name, shape));
        self
    }

    /// New-convention producer (`fn name(self)`).
    pub fn producer(self, name: &str) -> Self {
        self.method(name, CallShape::params(1))
    }

    /// Legacy-convention producer (`fn name(self, bar, general)`).
    pub fn legacy_producer(self, name: &str) -> Self {
        self.method(name, CallShape::params(3))
    }

    /// Click handler with the given positional arity (receiver included).
    pub fn click(self, positional: usize) -> Self {
        self.method("on_click", CallShape::params(positional))
            .always("on_click", Reply::Value(Value::Null))
    }

    /// Teardown handler with the given positional arity (receiver included).
    pub fn teardown(self, positional: usize) -> Self {
        self.method("kill", CallShape::params(positional))
            .always("kill", Reply::Value(Value::Null))
    }

    /// Reply used whenever nothing is queued.
    pub fn always(mut self, method: &str, reply: Reply) -> Self {
        self.unit.fallback.insert(method.to_string(), reply);
        self
    }

    /// Reply used once, before any fallback.
    pub fn then(mut self, method: &str, reply: Reply) -> Self {
        self.unit
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn build(self) -> (ScriptedUnit, Probe) {
        let probe = self.unit.probe.clone();
        (self.unit, probe)
    }
}
