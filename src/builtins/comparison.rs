//! Comparison operations: `= == === != !== < > <= >=`
//!
//! Equality is structural (deep over arrays, maps, and sets); the three
//! equality spellings behave identically at macro time, as do the two
//! inequality spellings. Ordering comparisons are variadic chains over
//! numbers.

use super::define_builtin;
use crate::env::Environment;
use crate::error::{HqlError, ARITY_AT_LEAST_TWO};
use crate::value::Value;
use std::rc::Rc;

fn all_equal(args: &[Value]) -> bool {
    args.windows(2).all(|w| w[0].equals(&w[1]))
}

fn numeric_chain(
    function: &str,
    args: &[Value],
    cmp: fn(f64, f64) -> bool,
) -> Result<Value, HqlError> {
    if args.len() < 2 {
        return Err(HqlError::arity_error(function, ARITY_AT_LEAST_TWO, args.len()));
    }
    let mut prev = args[0]
        .as_number()
        .ok_or_else(|| HqlError::type_error(function, "number", args[0].type_name(), 0))?;
    for (i, arg) in args.iter().enumerate().skip(1) {
        let n = arg
            .as_number()
            .ok_or_else(|| HqlError::type_error(function, "number", arg.type_name(), i))?;
        if !cmp(prev, n) {
            return Ok(Value::Bool(false));
        }
        prev = n;
    }
    Ok(Value::Bool(true))
}

define_builtin! {
    builtin_eq,
    name: "=",
    |args, _env, _interp| {
        if args.len() < 2 {
            return Err(HqlError::arity_error("=", ARITY_AT_LEAST_TWO, args.len()));
        }
        Ok(Value::Bool(all_equal(args)))
    }
}

define_builtin! {
    builtin_eq2,
    name: "==",
    |args, _env, _interp| {
        if args.len() < 2 {
            return Err(HqlError::arity_error("==", ARITY_AT_LEAST_TWO, args.len()));
        }
        Ok(Value::Bool(all_equal(args)))
    }
}

define_builtin! {
    builtin_eq3,
    name: "===",
    |args, _env, _interp| {
        if args.len() < 2 {
            return Err(HqlError::arity_error("===", ARITY_AT_LEAST_TWO, args.len()));
        }
        Ok(Value::Bool(all_equal(args)))
    }
}

define_builtin! {
    builtin_ne,
    name: "!=",
    |args, _env, _interp| {
        if args.len() < 2 {
            return Err(HqlError::arity_error("!=", ARITY_AT_LEAST_TWO, args.len()));
        }
        Ok(Value::Bool(!all_equal(args)))
    }
}

define_builtin! {
    builtin_ne2,
    name: "!==",
    |args, _env, _interp| {
        if args.len() < 2 {
            return Err(HqlError::arity_error("!==", ARITY_AT_LEAST_TWO, args.len()));
        }
        Ok(Value::Bool(!all_equal(args)))
    }
}

define_builtin! {
    builtin_lt,
    name: "<",
    |args, _env, _interp| numeric_chain("<", args, |a, b| a < b)
}

define_builtin! {
    builtin_gt,
    name: ">",
    |args, _env, _interp| numeric_chain(">", args, |a, b| a > b)
}

define_builtin! {
    builtin_le,
    name: "<=",
    |args, _env, _interp| numeric_chain("<=", args, |a, b| a <= b)
}

define_builtin! {
    builtin_ge,
    name: ">=",
    |args, _env, _interp| numeric_chain(">=", args, |a, b| a >= b)
}

/// Register all comparison builtins in the environment
pub fn register(env: &Rc<Environment>) {
    register_builtin_eq(env);
    register_builtin_eq2(env);
    register_builtin_eq3(env);
    register_builtin_ne(env);
    register_builtin_ne2(env);
    register_builtin_lt(env);
    register_builtin_gt(env);
    register_builtin_le(env);
    register_builtin_ge(env);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::interp::Interpreter;

    fn call(f: crate::value::BuiltinFn, args: &[Value]) -> Value {
        let env = Environment::new();
        let interp = Interpreter::new(Limits::default());
        f(args, &env, &interp).unwrap()
    }

    #[test]
    fn test_equality_deep() {
        let a = Value::Array(vec![Value::Number(1.0)]);
        let b = Value::Array(vec![Value::Number(1.0)]);
        assert!(matches!(call(builtin_eq, &[a, b]), Value::Bool(true)));
    }

    #[test]
    fn test_inequality() {
        assert!(matches!(
            call(builtin_ne, &[Value::Number(1.0), Value::Number(2.0)]),
            Value::Bool(true)
        ));
    }

    #[test]
    fn test_ordering_chain() {
        let args = [Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)];
        assert!(matches!(call(builtin_lt, &args), Value::Bool(true)));

        let args = [Value::Number(1.0), Value::Number(3.0), Value::Number(2.0)];
        assert!(matches!(call(builtin_lt, &args), Value::Bool(false)));
    }

    #[test]
    fn test_ordering_type_error() {
        let env = Environment::new();
        let interp = Interpreter::new(Limits::default());
        let err = builtin_gt(&[Value::Number(1.0), Value::Nil], &env, &interp).unwrap_err();
        assert!(matches!(err, HqlError::Type { .. }));
    }
}
