//! Raw syntax accessors: `%first %rest %length %nth %empty?`
//!
//! These operate directly on SExp lists and vectors (the `vector` head of a
//! vector form is stripped) as well as on macro-time arrays, so macro bodies
//! can destructure the argument forms they receive.

use super::define_builtin;
use crate::env::Environment;
use crate::error::{HqlError, ARITY_ONE, ARITY_TWO};
use crate::sexp::{ListKind, SExp};
use crate::value::Value;
use std::rc::Rc;

/// View a value as a sequence of values. SExp list elements are lifted into
/// `Value::SExp` so macro code sees syntax, not evaluated results.
fn as_seq(function: &str, value: &Value) -> Result<Vec<Value>, HqlError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::SExp(SExp::List { elements, kind, .. }) => {
            let skip = usize::from(*kind != ListKind::List);
            Ok(elements[skip..].iter().cloned().map(Value::SExp).collect())
        }
        Value::Nil => Ok(Vec::new()),
        other => Err(HqlError::type_error(
            function,
            "a list or vector",
            other.type_name(),
            0,
        )),
    }
}

define_builtin! {
    builtin_first,
    name: "%first",
    |args, _env, _interp| {
        if args.len() != 1 {
            return Err(HqlError::arity_error("%first", ARITY_ONE, args.len()));
        }
        let seq = as_seq("%first", &args[0])?;
        Ok(seq.into_iter().next().unwrap_or(Value::Nil))
    }
}

define_builtin! {
    builtin_rest,
    name: "%rest",
    |args, _env, _interp| {
        if args.len() != 1 {
            return Err(HqlError::arity_error("%rest", ARITY_ONE, args.len()));
        }
        // Preserve the representation: syntax in, syntax out
        match &args[0] {
            Value::SExp(SExp::List { elements, kind, .. }) => {
                let skip = usize::from(*kind != ListKind::List);
                let rest: Vec<SExp> = elements[skip..].iter().skip(1).cloned().collect();
                Ok(Value::SExp(SExp::list(rest)))
            }
            Value::Array(items) => Ok(Value::Array(items.iter().skip(1).cloned().collect())),
            Value::Nil => Ok(Value::Array(Vec::new())),
            other => Err(HqlError::type_error(
                "%rest",
                "a list or vector",
                other.type_name(),
                0,
            )),
        }
    }
}

define_builtin! {
    builtin_length,
    name: "%length",
    |args, _env, _interp| {
        if args.len() != 1 {
            return Err(HqlError::arity_error("%length", ARITY_ONE, args.len()));
        }
        let seq = as_seq("%length", &args[0])?;
        Ok(Value::Number(seq.len() as f64))
    }
}

define_builtin! {
    builtin_nth,
    name: "%nth",
    |args, _env, _interp| {
        if args.len() != 2 {
            return Err(HqlError::arity_error("%nth", ARITY_TWO, args.len()));
        }
        let seq = as_seq("%nth", &args[0])?;
        let index = args[1].as_number().ok_or_else(|| {
            HqlError::type_error("%nth", "number", args[1].type_name(), 1)
        })?;
        if index < 0.0 {
            return Ok(Value::Nil);
        }
        Ok(seq.into_iter().nth(index as usize).unwrap_or(Value::Nil))
    }
}

define_builtin! {
    builtin_empty,
    name: "%empty?",
    |args, _env, _interp| {
        if args.len() != 1 {
            return Err(HqlError::arity_error("%empty?", ARITY_ONE, args.len()));
        }
        let seq = as_seq("%empty?", &args[0])?;
        Ok(Value::Bool(seq.is_empty()))
    }
}

/// Register all syntax accessors in the environment
pub fn register(env: &Rc<Environment>) {
    register_builtin_first(env);
    register_builtin_rest(env);
    register_builtin_length(env);
    register_builtin_nth(env);
    register_builtin_empty(env);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::interp::Interpreter;
    use crate::reader::read_one;

    fn call(f: crate::value::BuiltinFn, args: &[Value]) -> Result<Value, HqlError> {
        let env = Environment::new();
        let interp = Interpreter::new(Limits::default());
        f(args, &env, &interp)
    }

    fn syntax(src: &str) -> Value {
        Value::SExp(read_one(src).unwrap())
    }

    #[test]
    fn test_first_on_list_syntax() {
        let result = call(builtin_first, &[syntax("(a b c)")]).unwrap();
        match result {
            Value::SExp(s) => assert_eq!(s.as_symbol(), Some("a")),
            other => panic!("expected syntax, got {:?}", other),
        }
    }

    #[test]
    fn test_first_strips_vector_head() {
        let result = call(builtin_first, &[syntax("[x y]")]).unwrap();
        match result {
            Value::SExp(s) => assert_eq!(s.as_symbol(), Some("x")),
            other => panic!("expected syntax, got {:?}", other),
        }
    }

    #[test]
    fn test_rest_of_list() {
        let result = call(builtin_rest, &[syntax("(a b c)")]).unwrap();
        match result {
            Value::SExp(s) => assert_eq!(s.render(), "(b c)"),
            other => panic!("expected syntax, got {:?}", other),
        }
    }

    #[test]
    fn test_length_of_vector() {
        let result = call(builtin_length, &[syntax("[1 2 3]")]).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn test_nth_out_of_bounds_is_nil() {
        let result = call(
            builtin_nth,
            &[syntax("(a)"), Value::Number(5.0)],
        )
        .unwrap();
        assert!(matches!(result, Value::Nil));
    }

    #[test]
    fn test_empty_predicate() {
        assert!(matches!(
            call(builtin_empty, &[syntax("()")]).unwrap(),
            Value::Bool(true)
        ));
        assert!(matches!(
            call(builtin_empty, &[syntax("(a)")]).unwrap(),
            Value::Bool(false)
        ));
    }
}
