// src/registry.rs

//! Method registry: partitions a unit's callables into producers, the click
//! handler and the teardown handler, and classifies each by calling
//! convention.
//!
//! Convention detection lives in [`detect_convention`], a pure function, so
//! the arity rules can be checked without an engine.

use tracing::debug;

use crate::unit::{CallShape, Convention, MethodSpec, UnitId};

/// Reserved name of the click handler.
pub const CLICK_HANDLER: &str = "on_click";
/// Reserved name of the teardown handler.
pub const TEARDOWN_HANDLER: &str = "kill";

/// Role a callable plays for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRole {
    Producer,
    Click,
    Teardown,
}

impl MethodRole {
    pub fn of(name: &str) -> Self {
        match name {
            CLICK_HANDLER => MethodRole::Click,
            TEARDOWN_HANDLER => MethodRole::Teardown,
            _ => MethodRole::Producer,
        }
    }

    /// Positional parameter count (receiver included) of the new convention.
    fn new_style_arity(self) -> usize {
        match self {
            MethodRole::Click => 2,
            MethodRole::Producer | MethodRole::Teardown => 1,
        }
    }
}

/// Classify a callable.
///
/// A declared convention is taken as-is. An introspected parameter list is
/// new-style only when it has exactly the new-style arity for its role and no
/// variadic or keyword collectors; anything else is legacy.
pub fn detect_convention(role: MethodRole, shape: CallShape) -> Convention {
    match shape {
        CallShape::Declared(convention) => convention,
        CallShape::Params {
            positional,
            variadic,
            keywords,
        } => {
            if positional == role.new_style_arity() && !variadic && !keywords {
                Convention::New
            } else {
                Convention::Legacy
            }
        }
    }
}

/// Callables of one unit, partitioned and classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodTable {
    /// Producers in discovery order (sorted by name).
    pub producers: Vec<(String, Convention)>,
    pub click: Option<Convention>,
    pub teardown: Option<Convention>,
}

impl MethodTable {
    /// Build the table from the callables a unit exposes.
    pub fn discover(id: &UnitId, methods: Vec<MethodSpec>) -> Self {
        let mut methods: Vec<MethodSpec> = methods
            .into_iter()
            .filter(|m| !m.name.is_empty() && !m.name.starts_with('_'))
            .collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods.dedup_by(|a, b| a.name == b.name);

        let mut table = MethodTable::default();
        for method in methods {
            let role = MethodRole::of(&method.name);
            let convention = detect_convention(role, method.shape);
            match role {
                MethodRole::Click => table.click = Some(convention),
                MethodRole::Teardown => table.teardown = Some(convention),
                MethodRole::Producer => table.producers.push((method.name, convention)),
            }
        }

        debug!(
            unit = %id,
            click = ?table.click,
            teardown = ?table.teardown,
            producers = ?table.producers.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            "discovered unit methods"
        );

        table
    }
}
