// ABOUTME: Environment module for managing variable bindings and scopes

use crate::config::DEFAULT_MAX_ENV_DEPTH;
use crate::error::{suggest, HqlError};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A lexical scope. Frames form a parent chain; `define` always writes to
/// the current frame, lookup walks outward.
#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<IndexMap<String, Value>>,
    parent: Option<Rc<Environment>>,
    depth: usize,
}

impl Environment {
    /// Creates a new root environment with no parent
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(IndexMap::new()),
            parent: None,
            depth: 0,
        })
    }

    /// Creates a child environment sharing this one as parent. Depth is
    /// bounded to catch runaway recursive expansion.
    pub fn extend(self: &Rc<Self>) -> Result<Rc<Self>, HqlError> {
        if self.depth + 1 > DEFAULT_MAX_ENV_DEPTH {
            return Err(HqlError::MaxCallDepth {
                limit: DEFAULT_MAX_ENV_DEPTH,
            });
        }
        Ok(Rc::new(Environment {
            bindings: RefCell::new(IndexMap::new()),
            parent: Some(self.clone()),
            depth: self.depth + 1,
        }))
    }

    /// Defines a binding in THIS scope (replaces if present)
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Looks up a symbol in this scope and parent scopes recursively.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        if let Some(ref parent) = self.parent {
            return parent.get(name);
        }
        None
    }

    /// Lookup with the hyphen-to-underscore fallback: `a-b` falls back to
    /// `a_b`, mirroring identifier mangling in emitted JavaScript so macros
    /// can call mangled names. Misses produce an `UndefinedSymbol` carrying
    /// a nearest-name suggestion.
    pub fn lookup(&self, name: &str) -> Result<Value, HqlError> {
        if let Some(v) = self.get(name) {
            return Ok(v);
        }
        if name.contains('-') {
            let mangled = name.replace('-', "_");
            if let Some(v) = self.get(&mangled) {
                return Ok(v);
            }
        }
        let names = self.visible_names();
        Err(HqlError::UndefinedSymbol {
            name: name.to_string(),
            pos: None,
            suggestion: suggest(name, names.iter().map(String::as_str)),
        })
    }

    /// Every name visible from this scope, innermost first.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        if let Some(ref parent) = self.parent {
            names.extend(parent.visible_names());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0));

        match env.get("x") {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("Expected Number(42.0)"),
        }
    }

    #[test]
    fn test_undefined_symbol() {
        let env = Environment::new();
        assert!(env.get("undefined").is_none());
    }

    #[test]
    fn test_shadowing() {
        let parent = Environment::new();
        parent.define("x", Value::Number(42.0));

        let child = parent.extend().unwrap();
        child.define("x", Value::Number(100.0));

        match child.get("x") {
            Some(Value::Number(n)) => assert_eq!(n, 100.0),
            _ => panic!("Expected Number(100.0)"),
        }
    }

    #[test]
    fn test_parent_lookup() {
        let parent = Environment::new();
        parent.define("x", Value::Number(42.0));

        let child = parent.extend().unwrap();

        match child.get("x") {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("Expected Number(42.0)"),
        }
    }

    #[test]
    fn test_hyphen_underscore_fallback() {
        let env = Environment::new();
        env.define("my_helper", Value::Number(1.0));

        assert!(env.lookup("my-helper").is_ok());
        assert!(env.get("my-helper").is_none());
    }

    #[test]
    fn test_lookup_suggests_near_name() {
        let env = Environment::new();
        env.define("filter", Value::Nil);

        match env.lookup("fitler") {
            Err(HqlError::UndefinedSymbol { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("filter"));
            }
            other => panic!("expected UndefinedSymbol, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_bound() {
        let mut env = Environment::new();
        for _ in 0..DEFAULT_MAX_ENV_DEPTH {
            env = match env.extend() {
                Ok(e) => e,
                Err(_) => return, // hit the bound, which is the point
            };
        }
        assert!(env.extend().is_err());
    }
}
