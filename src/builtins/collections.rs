//! Collection constructors: `vector list hash-map hash-set` plus the
//! `empty-array empty-map empty-set` conveniences macro bodies use when
//! building forms incrementally.

use super::define_builtin;
use crate::env::Environment;
use crate::error::HqlError;
use crate::sexp::SExp;
use crate::value::Value;
use indexmap::IndexMap;
use std::rc::Rc;

fn map_key(function: &str, value: &Value, position: usize) -> Result<String, HqlError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::SExp(SExp::Symbol { name, .. }) => Ok(name.clone()),
        Value::Number(n) => Ok(format!("{}", Value::Number(*n))),
        other => Err(HqlError::type_error(
            function,
            "string key",
            other.type_name(),
            position,
        )),
    }
}

define_builtin! {
    builtin_vector,
    name: "vector",
    |args, _env, _interp| Ok(Value::Array(args.to_vec()))
}

define_builtin! {
    builtin_list,
    name: "list",
    |args, _env, _interp| Ok(Value::Array(args.to_vec()))
}

define_builtin! {
    builtin_hash_map,
    name: "hash-map",
    |args, _env, _interp| {
        if args.len() % 2 != 0 {
            return Err(HqlError::arity_error(
                "hash-map",
                "an even number of",
                args.len(),
            ));
        }
        let mut map = IndexMap::new();
        for (i, pair) in args.chunks(2).enumerate() {
            map.insert(map_key("hash-map", &pair[0], i * 2)?, pair[1].clone());
        }
        Ok(Value::Map(map))
    }
}

define_builtin! {
    builtin_hash_set,
    name: "hash-set",
    |args, _env, _interp| {
        let mut items: Vec<Value> = Vec::with_capacity(args.len());
        for arg in args {
            if !items.iter().any(|existing| existing.equals(arg)) {
                items.push(arg.clone());
            }
        }
        Ok(Value::Set(items))
    }
}

define_builtin! {
    builtin_empty_array,
    name: "empty-array",
    |_args, _env, _interp| Ok(Value::Array(Vec::new()))
}

define_builtin! {
    builtin_empty_map,
    name: "empty-map",
    |_args, _env, _interp| Ok(Value::Map(IndexMap::new()))
}

define_builtin! {
    builtin_empty_set,
    name: "empty-set",
    |_args, _env, _interp| Ok(Value::Set(Vec::new()))
}

/// Register all collection builtins in the environment
pub fn register(env: &Rc<Environment>) {
    register_builtin_vector(env);
    register_builtin_list(env);
    register_builtin_hash_map(env);
    register_builtin_hash_set(env);
    register_builtin_empty_array(env);
    register_builtin_empty_map(env);
    register_builtin_empty_set(env);
}
