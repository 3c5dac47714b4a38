//! Logic operations: `not`
//!
//! `and`/`or` are macros in the surface language; only `not` needs a
//! function form so it can be passed to higher-order callers.

use super::define_builtin;
use crate::env::Environment;
use crate::error::{HqlError, ARITY_ONE};
use crate::value::Value;
use std::rc::Rc;

define_builtin! {
    builtin_not,
    name: "not",
    |args, _env, _interp| {
        if args.len() != 1 {
            return Err(HqlError::arity_error("not", ARITY_ONE, args.len()));
        }
        Ok(Value::Bool(!args[0].is_truthy()))
    }
}

/// Register all logic builtins in the environment
pub fn register(env: &Rc<Environment>) {
    register_builtin_not(env);
}
