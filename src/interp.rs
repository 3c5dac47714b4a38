// ABOUTME: Tree-walking evaluator for macro-time code

use crate::config::Limits;
use crate::env::Environment;
use crate::error::{HqlError, ARITY_AT_LEAST_ONE, ARITY_AT_LEAST_TWO, ARITY_ONE, ARITY_TWO_OR_THREE};
use crate::sexp::{ListKind, SExp};
use crate::value::{Callable, Function, Value};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

type SpecialForm = fn(&Interpreter, &[SExp], &Rc<Environment>) -> Result<Value, HqlError>;

/// Special forms are dispatched through a table built once; a form's head
/// symbol is handled here without evaluating its arguments the usual way.
fn special_forms() -> &'static HashMap<&'static str, SpecialForm> {
    static TABLE: OnceLock<HashMap<&'static str, SpecialForm>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: HashMap<&'static str, SpecialForm> = HashMap::new();
        table.insert("if", sf_if);
        table.insert("let", sf_let);
        table.insert("var", sf_var);
        table.insert("fn", sf_fn);
        table.insert("do", sf_do);
        table.insert("quote", sf_quote);
        table.insert("quasiquote", sf_quasiquote);
        table.insert("cond", sf_cond);
        table.insert("!", sf_not);
        table
    })
}

pub struct Interpreter {
    limits: Limits,
    depth: Cell<usize>,
}

impl Interpreter {
    pub fn new(limits: Limits) -> Self {
        Interpreter {
            limits,
            depth: Cell::new(0),
        }
    }

    /// Evaluate one expression. Dispatch order: literals, symbols, empty
    /// list, special forms, then function application.
    pub fn eval(&self, expr: &SExp, env: &Rc<Environment>) -> Result<Value, HqlError> {
        let depth = self.depth.get();
        if depth + 1 > self.limits.max_call_depth {
            return Err(HqlError::MaxCallDepth {
                limit: self.limits.max_call_depth,
            });
        }
        self.depth.set(depth + 1);
        let result = self.eval_inner(expr, env);
        self.depth.set(depth);
        result
    }

    fn eval_inner(&self, expr: &SExp, env: &Rc<Environment>) -> Result<Value, HqlError> {
        match expr {
            SExp::Literal { value, .. } => Ok(Value::from_scalar(value)),

            SExp::Symbol { name, span } => self
                .lookup(name, env)
                .map_err(|e| match e {
                    HqlError::UndefinedSymbol {
                        name, suggestion, ..
                    } => HqlError::UndefinedSymbol {
                        name,
                        pos: span.map(|s| s.start),
                        suggestion,
                    },
                    other => other,
                }),

            SExp::List { elements, .. } if elements.is_empty() => Ok(Value::Nil),

            SExp::List { elements, .. } => {
                if let Some(head) = elements[0].as_symbol() {
                    if let Some(handler) = special_forms().get(head) {
                        return handler(self, &elements[1..], env);
                    }
                }

                // Function application: head first, then arguments
                // left to right
                let func = self.eval(&elements[0], env)?;
                let mut args = Vec::with_capacity(elements.len() - 1);
                for arg in &elements[1..] {
                    args.push(self.eval(arg, env)?);
                }
                self.apply(&func, &args, env, elements[0].as_symbol())
            }
        }
    }

    fn lookup(&self, name: &str, env: &Rc<Environment>) -> Result<Value, HqlError> {
        env.lookup(name)
    }

    /// Call a value with already-evaluated arguments. Builtins get the
    /// caller's environment and the interpreter itself; user functions get
    /// a fresh child of their closure.
    pub fn apply(
        &self,
        func: &Value,
        args: &[Value],
        env: &Rc<Environment>,
        call_name: Option<&str>,
    ) -> Result<Value, HqlError> {
        match func {
            Value::Callable(Callable::Builtin { func, .. }) => func(args, env, self),
            Value::Callable(Callable::Lambda(f)) => self.call_function(f, args),
            other => Err(HqlError::type_error(
                call_name.unwrap_or("call"),
                "function",
                other.type_name(),
                0,
            )),
        }
    }

    pub fn call_function(&self, f: &Function, args: &[Value]) -> Result<Value, HqlError> {
        let name = f.name.as_deref().unwrap_or("<anonymous>");
        if f.rest_param.is_some() {
            if args.len() < f.params.len() {
                return Err(HqlError::arity_error(
                    name,
                    format!("at least {}", f.params.len()),
                    args.len(),
                ));
            }
        } else if args.len() != f.params.len() {
            return Err(HqlError::arity_error(
                name,
                f.params.len().to_string(),
                args.len(),
            ));
        }

        let call_env = f.closure.extend()?;
        for (param, arg) in f.params.iter().zip(args.iter()) {
            call_env.define(param.clone(), arg.clone());
        }
        if let Some(rest) = &f.rest_param {
            call_env.define(rest.clone(), Value::Array(args[f.params.len()..].to_vec()));
        }

        self.eval_body(&f.body, &call_env)
    }

    /// Evaluate forms in order, returning the last value (nil when empty).
    pub fn eval_body(&self, body: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
        let mut result = Value::Nil;
        for expr in body {
            result = self.eval(expr, env)?;
        }
        Ok(result)
    }
}

// ============================================================================
// Special forms
// ============================================================================

fn sf_if(interp: &Interpreter, args: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(HqlError::arity_error("if", ARITY_TWO_OR_THREE, args.len()));
    }
    let test = interp.eval(&args[0], env)?;
    if test.is_truthy() {
        interp.eval(&args[1], env)
    } else if let Some(alt) = args.get(2) {
        interp.eval(alt, env)
    } else {
        Ok(Value::Nil)
    }
}

/// Sequential binding semantics: each value is evaluated against the child
/// environment as it grows, so later bindings see earlier ones.
fn sf_let(interp: &Interpreter, args: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
    let bindings = args.first().ok_or_else(|| {
        HqlError::arity_error("let", ARITY_AT_LEAST_ONE, 0)
    })?;
    let pairs = bindings.seq_elements().ok_or_else(|| {
        HqlError::syntax("let: bindings must be a list or vector", bindings.span().map(|s| s.start))
    })?;
    if pairs.len() % 2 != 0 {
        return Err(HqlError::syntax(
            "let: bindings need an even number of forms",
            bindings.span().map(|s| s.start),
        ));
    }

    let child = env.extend()?;
    for pair in pairs.chunks(2) {
        let name = pair[0].as_symbol().ok_or_else(|| {
            HqlError::syntax("let: binding name must be a symbol", pair[0].span().map(|s| s.start))
        })?;
        let value = interp.eval(&pair[1], &child)?;
        child.define(name, value);
    }

    interp.eval_body(&args[1..], &child)
}

fn sf_var(interp: &Interpreter, args: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
    if args.len() != 2 {
        return Err(HqlError::arity_error("var", "2", args.len()));
    }
    let name = args[0].as_symbol().ok_or_else(|| {
        HqlError::syntax("var: name must be a symbol", args[0].span().map(|s| s.start))
    })?;
    let value = interp.eval(&args[1], env)?;
    env.define(name, value.clone());
    Ok(value)
}

/// `(fn [params] body…)` or `(fn name [params] body…)`. A named function is
/// bound in the current environment before returning, enabling recursion.
fn sf_fn(interp: &Interpreter, args: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
    let _ = interp;
    if args.is_empty() {
        return Err(HqlError::arity_error("fn", ARITY_AT_LEAST_TWO, 0));
    }

    let (name, params_idx) = match args[0].as_symbol() {
        Some(n) => (Some(n.to_string()), 1),
        None => (None, 0),
    };
    let params_form = args.get(params_idx).ok_or_else(|| {
        HqlError::syntax("fn: missing parameter list", args[0].span().map(|s| s.start))
    })?;
    let (params, rest_param) = parse_params(params_form)?;

    let function = Function {
        name: name.clone(),
        params,
        rest_param,
        body: args[params_idx + 1..].to_vec(),
        closure: env.clone(),
    };
    let value = Value::Callable(Callable::Lambda(Rc::new(function)));
    if let Some(n) = name {
        env.define(n, value.clone());
    }
    Ok(value)
}

/// Split a parameter vector into positional names and an optional `& rest`.
pub fn parse_params(form: &SExp) -> Result<(Vec<String>, Option<String>), HqlError> {
    let entries = form.seq_elements().ok_or_else(|| {
        HqlError::syntax("parameter list must be a vector", form.span().map(|s| s.start))
    })?;

    let mut params = Vec::new();
    let mut rest = None;
    let mut iter = entries.iter();
    while let Some(entry) = iter.next() {
        let name = entry.as_symbol().ok_or_else(|| {
            HqlError::syntax("parameter must be a symbol", entry.span().map(|s| s.start))
        })?;
        if name == "&" {
            let rest_entry = iter.next().ok_or_else(|| {
                HqlError::syntax("& must be followed by a rest parameter", form.span().map(|s| s.start))
            })?;
            let rest_name = rest_entry.as_symbol().ok_or_else(|| {
                HqlError::syntax("rest parameter must be a symbol", rest_entry.span().map(|s| s.start))
            })?;
            rest = Some(rest_name.to_string());
            if iter.next().is_some() {
                return Err(HqlError::syntax(
                    "rest parameter must be last",
                    form.span().map(|s| s.start),
                ));
            }
            break;
        }
        params.push(name.to_string());
    }
    Ok((params, rest))
}

fn sf_do(interp: &Interpreter, args: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
    interp.eval_body(args, env)
}

fn sf_quote(_interp: &Interpreter, args: &[SExp], _env: &Rc<Environment>) -> Result<Value, HqlError> {
    if args.len() != 1 {
        return Err(HqlError::arity_error("quote", ARITY_ONE, args.len()));
    }
    Ok(Value::SExp(args[0].clone()))
}

fn sf_quasiquote(
    interp: &Interpreter,
    args: &[SExp],
    env: &Rc<Environment>,
) -> Result<Value, HqlError> {
    if args.len() != 1 {
        return Err(HqlError::arity_error("quasiquote", ARITY_ONE, args.len()));
    }
    if args[0].head_symbol() == Some("unquote-splicing") {
        return Err(HqlError::syntax(
            "unquote-splicing outside of a list context",
            args[0].span().map(|s| s.start),
        ));
    }
    interp.quasiquote(&args[0], 1, env).map(Value::SExp)
}

fn sf_cond(interp: &Interpreter, args: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
    for clause in args {
        let items = clause.as_list().ok_or_else(|| {
            HqlError::syntax("cond: clause must be a list", clause.span().map(|s| s.start))
        })?;
        if items.is_empty() {
            return Err(HqlError::syntax(
                "cond: clause cannot be empty",
                clause.span().map(|s| s.start),
            ));
        }
        let matched = if items[0].is_symbol("else") {
            true
        } else {
            interp.eval(&items[0], env)?.is_truthy()
        };
        if matched {
            return interp.eval_body(&items[1..], env);
        }
    }
    Ok(Value::Nil)
}

fn sf_not(interp: &Interpreter, args: &[SExp], env: &Rc<Environment>) -> Result<Value, HqlError> {
    if args.len() != 1 {
        return Err(HqlError::arity_error("!", ARITY_ONE, args.len()));
    }
    let value = interp.eval(&args[0], env)?;
    Ok(Value::Bool(!value.is_truthy()))
}

// ============================================================================
// Quasiquote templating
// ============================================================================

impl Interpreter {
    /// Walk a quasiquote template. Depth increments under a nested
    /// quasiquote and decrements through unquote, so only unquotes at depth
    /// one evaluate.
    fn quasiquote(
        &self,
        expr: &SExp,
        depth: usize,
        env: &Rc<Environment>,
    ) -> Result<SExp, HqlError> {
        match expr {
            SExp::Literal { .. } | SExp::Symbol { .. } => Ok(expr.clone()),

            SExp::List { elements, kind, span } => {
                if let Some(head) = elements.first().and_then(SExp::as_symbol) {
                    if head == "unquote" && elements.len() == 2 {
                        if depth == 1 {
                            return self.eval(&elements[1], env)?.into_sexp();
                        }
                        let inner = self.quasiquote(&elements[1], depth - 1, env)?;
                        return Ok(SExp::list(vec![SExp::symbol("unquote"), inner]));
                    }
                    if head == "quasiquote" && elements.len() == 2 {
                        let inner = self.quasiquote(&elements[1], depth + 1, env)?;
                        return Ok(SExp::list(vec![SExp::symbol("quasiquote"), inner]));
                    }
                }

                let mut out = Vec::with_capacity(elements.len());
                for item in elements {
                    let is_splice = item.head_symbol() == Some("unquote-splicing")
                        && item.as_list().map(|l| l.len()) == Some(2);
                    if is_splice {
                        let inner = &item.as_list().unwrap()[1];
                        if depth == 1 {
                            let spliced = self.eval(inner, env)?;
                            splice_into(&mut out, spliced, item)?;
                        } else {
                            let kept = self.quasiquote(inner, depth - 1, env)?;
                            out.push(SExp::list(vec![
                                SExp::symbol("unquote-splicing"),
                                kept,
                            ]));
                        }
                    } else {
                        out.push(self.quasiquote(item, depth, env)?);
                    }
                }
                Ok(SExp::List {
                    elements: out,
                    kind: *kind,
                    span: *span,
                })
            }
        }
    }
}

/// Splice an iterable value's elements into the surrounding list.
fn splice_into(out: &mut Vec<SExp>, value: Value, site: &SExp) -> Result<(), HqlError> {
    match value {
        Value::Array(items) => {
            for v in items {
                out.push(v.into_sexp()?);
            }
            Ok(())
        }
        Value::SExp(SExp::List { elements, kind, .. }) => {
            let skip = usize::from(kind != ListKind::List);
            out.extend(elements.into_iter().skip(skip));
            Ok(())
        }
        Value::Nil => Ok(()),
        other => Err(HqlError::type_error(
            "unquote-splicing",
            "a sequence",
            other.type_name(),
            site.span().map(|s| s.start.line as usize).unwrap_or(0),
        )),
    }
}
