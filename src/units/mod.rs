// src/units/mod.rs

//! Units bundled with the engine.
//!
//! Real deployments register their own units through
//! [`UnitRegistry::with_builtin`] / [`UnitRegistry::with_override`]; the
//! bundled set is the fallback tier of the loader.

pub mod static_text;

use crate::loader::UnitRegistry;

impl UnitRegistry {
    /// Registry pre-populated with every bundled unit.
    pub fn bundled() -> Self {
        UnitRegistry::new().with_builtin(static_text::NAME, static_text::StaticText::factory)
    }
}
