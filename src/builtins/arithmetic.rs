//! Arithmetic operations: `+ - * / % mod`
//!
//! `%` is the remainder (sign of the dividend, matching JavaScript); `mod`
//! is the floored modulo (sign of the divisor).

use super::define_builtin;
use crate::env::Environment;
use crate::error::{HqlError, ARITY_AT_LEAST_ONE, ARITY_TWO};
use crate::value::Value;
use std::rc::Rc;

fn expect_number(function: &str, args: &[Value], index: usize) -> Result<f64, HqlError> {
    args[index]
        .as_number()
        .ok_or_else(|| HqlError::type_error(function, "number", args[index].type_name(), index))
}

define_builtin! {
    builtin_add,
    name: "+",
    |args, _env, _interp| {
        let mut sum = 0.0;
        for (i, _) in args.iter().enumerate() {
            sum += expect_number("+", args, i)?;
        }
        Ok(Value::Number(sum))
    }
}

define_builtin! {
    builtin_sub,
    name: "-",
    |args, _env, _interp| {
        if args.is_empty() {
            return Err(HqlError::arity_error("-", ARITY_AT_LEAST_ONE, 0));
        }
        let first = expect_number("-", args, 0)?;
        if args.len() == 1 {
            return Ok(Value::Number(-first));
        }
        let mut result = first;
        for (i, _) in args.iter().enumerate().skip(1) {
            result -= expect_number("-", args, i)?;
        }
        Ok(Value::Number(result))
    }
}

define_builtin! {
    builtin_mul,
    name: "*",
    |args, _env, _interp| {
        let mut product = 1.0;
        for (i, _) in args.iter().enumerate() {
            product *= expect_number("*", args, i)?;
        }
        Ok(Value::Number(product))
    }
}

define_builtin! {
    builtin_div,
    name: "/",
    |args, _env, _interp| {
        if args.is_empty() {
            return Err(HqlError::arity_error("/", ARITY_AT_LEAST_ONE, 0));
        }
        let first = expect_number("/", args, 0)?;
        if args.len() == 1 {
            return Ok(Value::Number(1.0 / first));
        }
        let mut result = first;
        for (i, _) in args.iter().enumerate().skip(1) {
            result /= expect_number("/", args, i)?;
        }
        Ok(Value::Number(result))
    }
}

define_builtin! {
    builtin_rem,
    name: "%",
    |args, _env, _interp| {
        if args.len() != 2 {
            return Err(HqlError::arity_error("%", ARITY_TWO, args.len()));
        }
        let a = expect_number("%", args, 0)?;
        let b = expect_number("%", args, 1)?;
        Ok(Value::Number(a % b))
    }
}

define_builtin! {
    builtin_mod,
    name: "mod",
    |args, _env, _interp| {
        if args.len() != 2 {
            return Err(HqlError::arity_error("mod", ARITY_TWO, args.len()));
        }
        let a = expect_number("mod", args, 0)?;
        let b = expect_number("mod", args, 1)?;
        Ok(Value::Number(((a % b) + b) % b))
    }
}

/// Register all arithmetic builtins in the environment
pub fn register(env: &Rc<Environment>) {
    register_builtin_add(env);
    register_builtin_sub(env);
    register_builtin_mul(env);
    register_builtin_div(env);
    register_builtin_rem(env);
    register_builtin_mod(env);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::interp::Interpreter;

    fn call(f: crate::value::BuiltinFn, args: &[Value]) -> Result<Value, HqlError> {
        let env = Environment::new();
        let interp = Interpreter::new(Limits::default());
        f(args, &env, &interp)
    }

    #[test]
    fn test_add_variadic() {
        let result = call(builtin_add, &[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        assert!(matches!(result, Ok(Value::Number(n)) if n == 6.0));
        assert!(matches!(call(builtin_add, &[]), Ok(Value::Number(n)) if n == 0.0));
    }

    #[test]
    fn test_sub_negates_single_arg() {
        assert!(matches!(
            call(builtin_sub, &[Value::Number(5.0)]),
            Ok(Value::Number(n)) if n == -5.0
        ));
    }

    #[test]
    fn test_rem_vs_mod_on_negatives() {
        let rem = call(builtin_rem, &[Value::Number(-7.0), Value::Number(3.0)]).unwrap();
        assert!(matches!(rem, Value::Number(n) if n == -1.0));

        let m = call(builtin_mod, &[Value::Number(-7.0), Value::Number(3.0)]).unwrap();
        assert!(matches!(m, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn test_type_error_context() {
        let err = call(builtin_add, &[Value::String("x".into())]).unwrap_err();
        match err {
            HqlError::Type { function, expected, actual, .. } => {
                assert_eq!(function, "+");
                assert_eq!(expected, "number");
                assert_eq!(actual, "string");
            }
            other => panic!("expected type error, got {:?}", other),
        }
    }
}
