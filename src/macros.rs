// ABOUTME: Macro registry and the gensym counter backing macro hygiene

use crate::sexp::SExp;
use crate::source::Position;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A user macro: a compile-time function from syntax to syntax.
#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub rest_param: Option<String>,
    pub body: Vec<SExp>,
    /// Original surface text, kept for diagnostics.
    pub source: Option<String>,
    pub defined_at: Option<Position>,
}

#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: IndexMap<String, MacroDefinition>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, def: MacroDefinition) {
        self.macros.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Merge another registry's macros into this one (used when a module's
    /// exports are imported). Later definitions win.
    pub fn absorb(&mut self, other: &MacroRegistry) {
        for def in other.macros.values() {
            self.macros.insert(def.name.clone(), def.clone());
        }
    }
}

// ============================================================================
// Gensym
// ============================================================================

// Process-wide counter. Per-compilation prefixes keep generated names
// readable; the shared counter guarantees uniqueness within one compilation
// (and, as a byproduct, across every compilation in the process).
static GENSYM_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mint a fresh symbol name. The result never collides with another gensym
/// from this process, and the leading pattern keeps it out of the way of
/// user identifiers.
pub fn gensym(prefix: &str) -> String {
    let n = GENSYM_COUNTER.fetch_add(1, Ordering::Relaxed);
    let prefix = if prefix.is_empty() { "gensym" } else { prefix };
    format!("__hql_{}_{}", prefix, n)
}
