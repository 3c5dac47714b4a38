// ABOUTME: Runtime values for the macro-time interpreter

use crate::env::Environment;
use crate::error::HqlError;
use crate::interp::Interpreter;
use crate::sexp::{Scalar, SExp};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// A user function created by `fn` at macro time. The closure environment
/// is shared because sibling closures may capture the same parent scope.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub rest_param: Option<String>,
    pub body: Vec<SExp>,
    pub closure: Rc<Environment>,
}

pub type BuiltinFn = fn(&[Value], &Rc<Environment>, &Interpreter) -> Result<Value, HqlError>;

/// Callable split so the dispatcher picks the right calling convention:
/// builtins get `(args, env, interp)` directly, user functions get a child
/// environment bound from their parameter list.
#[derive(Clone)]
pub enum Callable {
    Builtin { name: &'static str, func: BuiltinFn },
    Lambda(Rc<Function>),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Builtin { name, .. } => write!(f, "Builtin({})", name),
            Callable::Lambda(func) => write!(
                f,
                "Lambda({})",
                func.name.as_deref().unwrap_or("<anonymous>")
            ),
        }
    }
}

/// Macro-time runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    Set(Vec<Value>),
    /// Macros receive and return AST nodes.
    SExp(SExp),
    Callable(Callable),
    /// A unique symbol minted by `gensym`.
    Gensym(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Array(_) => "array",
            Value::Map(_) => "hash-map",
            Value::Set(_) => "hash-set",
            Value::SExp(_) => "syntax",
            Value::Callable(_) => "function",
            Value::Gensym(_) => "symbol",
        }
    }

    /// Only `false` and `nil` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Structural equality used by the comparison builtins. Functions never
    /// compare equal to anything.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Gensym(a), Value::Gensym(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.equals(y)))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.equals(w)))
            }
            (Value::SExp(a), Value::SExp(b)) => a.render() == b.render(),
            _ => false,
        }
    }

    /// Convert a macro-time value back into syntax. This is how unquoted
    /// results are substituted into quasiquote templates and how a macro's
    /// return value becomes the expansion.
    pub fn into_sexp(self) -> Result<SExp, HqlError> {
        match self {
            Value::Number(n) => Ok(SExp::num(n)),
            Value::String(s) => Ok(SExp::string(s)),
            Value::Bool(b) => Ok(SExp::bool(b)),
            Value::Nil => Ok(SExp::nil()),
            Value::SExp(s) => Ok(s),
            Value::Gensym(name) => Ok(SExp::symbol(name)),
            Value::Array(items) => {
                let elements = items
                    .into_iter()
                    .map(Value::into_sexp)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SExp::vector(elements))
            }
            Value::Map(map) => {
                let mut elements = vec![SExp::symbol("hash-map")];
                for (k, v) in map {
                    elements.push(SExp::string(k));
                    elements.push(v.into_sexp()?);
                }
                Ok(SExp::list(elements))
            }
            Value::Set(items) => {
                let mut elements = vec![SExp::symbol("hash-set")];
                for v in items {
                    elements.push(v.into_sexp()?);
                }
                Ok(SExp::list(elements))
            }
            Value::Callable(_) => Err(HqlError::type_error(
                "macro expansion",
                "a value expressible as syntax",
                "function",
                0,
            )),
        }
    }

    /// Lift a literal AST node into its runtime value.
    pub fn from_scalar(scalar: &Scalar) -> Value {
        match scalar {
            Scalar::Number(n) => Value::Number(*n),
            Scalar::BigInt(digits) => Value::String(digits.clone()),
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Nil => Value::Nil,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "\"{}\" {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Set(items) => {
                write!(f, "#{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Value::SExp(s) => write!(f, "{}", s),
            Value::Callable(Callable::Builtin { name, .. }) => write!(f, "#<builtin {}>", name),
            Value::Callable(Callable::Lambda(func)) => write!(
                f,
                "#<fn {}>",
                func.name.as_deref().unwrap_or("<anonymous>")
            ),
            Value::Gensym(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn test_equals_deep() {
        let a = Value::Array(vec![Value::Number(1.0), Value::String("x".into())]);
        let b = Value::Array(vec![Value::Number(1.0), Value::String("x".into())]);
        assert!(a.equals(&b));

        let c = Value::Array(vec![Value::Number(2.0)]);
        assert!(!a.equals(&c));
    }

    #[test]
    fn test_into_sexp_array_becomes_vector() {
        let v = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
        let s = v.into_sexp().unwrap();
        assert_eq!(s.render(), "[1 2]");
    }

    #[test]
    fn test_into_sexp_gensym_becomes_symbol() {
        let v = Value::Gensym("tmp_7".into());
        let s = v.into_sexp().unwrap();
        assert_eq!(s.as_symbol(), Some("tmp_7"));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(format!("{}", Value::Number(42.0)), "42");
        assert_eq!(format!("{}", Value::Number(-2.5)), "-2.5");
    }
}
