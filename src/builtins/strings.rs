//! String coercion and symbol helpers: `str name gensym`

use super::define_builtin;
use crate::env::Environment;
use crate::error::{HqlError, ARITY_ONE};
use crate::macros::gensym;
use crate::sexp::SExp;
use crate::value::Value;
use std::rc::Rc;

/// `str` coercion: strings render without quotes, nil renders as nothing,
/// everything else uses its display form.
fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Nil => String::new(),
        other => format!("{}", other),
    }
}

define_builtin! {
    builtin_str,
    name: "str",
    |args, _env, _interp| {
        let mut out = String::new();
        for arg in args {
            out.push_str(&coerce(arg));
        }
        Ok(Value::String(out))
    }
}

define_builtin! {
    builtin_name,
    name: "name",
    |args, _env, _interp| {
        if args.len() != 1 {
            return Err(HqlError::arity_error("name", ARITY_ONE, args.len()));
        }
        match &args[0] {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Gensym(n) => Ok(Value::String(n.clone())),
            Value::SExp(SExp::Symbol { name, .. }) => Ok(Value::String(name.clone())),
            other => Err(HqlError::type_error(
                "name",
                "symbol or string",
                other.type_name(),
                0,
            )),
        }
    }
}

define_builtin! {
    builtin_gensym,
    name: "gensym",
    |args, _env, _interp| {
        let prefix = match args.first() {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::SExp(SExp::Symbol { name, .. })) => name.clone(),
            Some(other) => {
                return Err(HqlError::type_error(
                    "gensym",
                    "symbol or string",
                    other.type_name(),
                    0,
                ));
            }
        };
        Ok(Value::Gensym(gensym(&prefix)))
    }
}

/// Register all string builtins in the environment
pub fn register(env: &Rc<Environment>) {
    register_builtin_str(env);
    register_builtin_name(env);
    register_builtin_gensym(env);
}
