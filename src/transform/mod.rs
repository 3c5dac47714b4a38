//! # Syntax transformer
//!
//! Lowers the macro-expanded AST to the JavaScript-level IR. Organized by
//! form family:
//!
//! - **[functions]**: `fn` forms, parameter defaults/rest, `return`
//! - **[bindings]**: `const let var set! =`, deep-freeze, destructuring
//! - **[conditionals]**: `if cond when unless when-let if-let switch match`
//! - **[loops]**: `while loop recur for-of break continue`
//! - **[classes]**: `class enum`
//! - **[interop]**: `js-get js-set js-call new` dot paths, templates, modules
//! - **[threading]**: `-> ->> as->` rewrites (fully lowered here)
//!
//! The transformer is a recursive descent over list heads; each handler
//! destructures its argument forms and recurses.

pub mod bindings;
pub mod classes;
pub mod conditionals;
pub mod functions;
pub mod interop;
pub mod loops;
pub mod threading;

use crate::error::HqlError;
use crate::ir::{Ir, VarKind};
use crate::sexp::{ListKind, Scalar, SExp};
use crate::source::Position;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Loop context for `recur` target resolution.
pub(crate) struct LoopCtx {
    pub vars: Vec<String>,
}

pub struct Transformer {
    /// Innermost scope last; tracks binding kinds for const-assignment
    /// rejection.
    scopes: Vec<IndexMap<String, VarKind>>,
    /// How many generated closures (IIFEs, callbacks) we are inside,
    /// relative to the nearest user function body. Zero means a `return`
    /// lowers to a plain return statement.
    pub(crate) closure_depth: usize,
    pub(crate) loop_stack: Vec<LoopCtx>,
    /// Parameter lists of named functions, for named-argument call sites.
    pub(crate) fn_params: HashMap<String, Vec<String>>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform a whole expanded program into a statement list.
pub fn transform_program(forms: &[SExp]) -> Result<Vec<Ir>, HqlError> {
    let mut t = Transformer::new();
    forms.iter().map(|f| t.transform_stmt(f)).collect()
}

impl Transformer {
    pub fn new() -> Self {
        Transformer {
            scopes: vec![IndexMap::new()],
            closure_depth: 0,
            loop_stack: Vec::new(),
            fn_params: HashMap::new(),
        }
    }

    // ===== Scope tracking =====

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn declare(&mut self, name: &str, kind: VarKind) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), kind);
        }
    }

    pub(crate) fn binding_kind(&self, name: &str) -> Option<VarKind> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub(crate) fn at_top_level(&self) -> bool {
        self.scopes.len() == 1
    }

    // ===== Statement position =====

    pub fn transform_stmt(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        if let Some(head) = form.head_symbol() {
            match head {
                "fn" if form.as_list().map(|l| l.len() >= 3).unwrap_or(false)
                    && form.as_list().unwrap()[1].as_symbol().is_some() =>
                {
                    return self.fn_declaration(form);
                }
                "const" | "let" | "var" => return self.binding_stmt(form),
                "set!" | "=" => {
                    return Ok(Ir::expr_stmt(self.assignment(form)?));
                }
                "if" => return self.if_stmt(form),
                "do" => return self.do_stmt(form),
                "while" => return self.while_stmt(form),
                "for-of" => return Ok(Ir::expr_stmt(self.for_of(form)?)),
                "break" => {
                    return Ok(Ir::BreakStatement {
                        pos: start_pos(form),
                    });
                }
                "continue" => {
                    return Ok(Ir::ContinueStatement {
                        pos: start_pos(form),
                    });
                }
                "return" => return self.return_stmt(form),
                "throw" => {
                    let elements = form.as_list().unwrap();
                    let argument = match elements.get(1) {
                        Some(e) => self.transform_expr(e)?,
                        None => Ir::NullLiteral { pos: None },
                    };
                    return Ok(Ir::ThrowStatement {
                        argument: Box::new(argument),
                        pos: start_pos(form),
                    });
                }
                "class" => return self.class_declaration(form),
                "enum" => return self.enum_declaration(form),
                "import" => return self.import_declaration(form),
                "export" => return self.export_declaration(form),
                _ => {}
            }
        }
        Ok(Ir::ExpressionStatement {
            expression: Box::new(self.transform_expr(form)?),
            pos: start_pos(form),
        })
    }

    // ===== Expression position =====

    pub fn transform_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        match form {
            SExp::Literal { value, span } => Ok(literal_ir(value, span.map(|s| s.start))),
            SExp::Symbol { name, span } => self.symbol_expr(name, span.map(|s| s.start)),
            SExp::List { elements, .. } if elements.is_empty() => Ok(Ir::NullLiteral {
                pos: start_pos(form),
            }),
            SExp::List { elements, kind, .. } => self.list_expr(form, elements, *kind),
        }
    }

    fn list_expr(
        &mut self,
        form: &SExp,
        elements: &[SExp],
        _kind: ListKind,
    ) -> Result<Ir, HqlError> {
        // Method-call sugar: (obj .method args…)
        if elements.len() >= 2 {
            if let Some(name) = elements[1].as_symbol() {
                if name.starts_with('.') && name != "..." {
                    return self.method_call(form, elements);
                }
            }
        }

        let head = match elements[0].as_symbol() {
            Some(h) => h,
            None => return self.call_expr(form, elements),
        };

        match head {
            "vector" => self.array_literal(form, &elements[1..]),
            "hash-map" => self.map_literal(form, &elements[1..]),
            "hash-set" => self.set_literal(form, &elements[1..]),
            "quote" => {
                let inner = elements.get(1).ok_or_else(|| {
                    HqlError::arity_error("quote", crate::error::ARITY_ONE, 0)
                })?;
                self.quoted_data(inner)
            }
            "quasiquote" => {
                let inner = elements.get(1).ok_or_else(|| {
                    HqlError::arity_error("quasiquote", crate::error::ARITY_ONE, 0)
                })?;
                self.quasiquote_data(inner, 1)
            }
            "unquote" | "unquote-splicing" => Err(HqlError::syntax(
                format!("{} outside of quasiquote", head),
                start_pos(form),
            )),
            "if" => self.if_expr(form),
            "cond" => self.cond_expr(form),
            "when" | "unless" | "when-let" | "if-let" | "switch" => {
                let desugared = self.desugar_conditional(form)?;
                self.transform_expr(&desugared)
            }
            "match" => self.match_expr(form),
            "do" => self.do_expr(form),
            "let" if is_binding_block(elements) => self.let_block_expr(form),
            "fn" => self.fn_expression(form),
            "loop" => self.loop_expr(form),
            "for-of" => self.for_of(form),
            "while" => self.statement_iife(form),
            "set!" | "=" => self.assignment(form),
            "return" => {
                // Expression-position return still lowers as a statement
                // inside an IIFE
                self.statement_iife(form)
            }
            "recur" => Err(HqlError::syntax(
                "recur: only allowed in tail position of a loop",
                start_pos(form),
            )),
            "->" | "->>" | "as->" => {
                let rewritten = threading::rewrite_threading(form)?;
                self.transform_expr(&rewritten)
            }
            "js-get" => self.js_get(form),
            "js-set" => self.js_set(form),
            "js-call" => self.js_call(form),
            "js-template" => self.template_literal(form),
            "new" => self.new_expr(form),
            "and" => self.logical_chain(form, "&&"),
            "or" => self.logical_chain(form, "||"),
            "not" | "!" => self.unary_not(form),
            "..." => self.spread_form(form),
            "throw" => self.statement_iife(form),
            _ if binary_operator(head).is_some() => self.operator_call(form, elements),
            _ => self.call_expr(form, elements),
        }
    }

    /// `do` in expression position evaluates inside an IIFE.
    fn do_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() == 2 {
            return self.transform_expr(&elements[1]);
        }
        self.body_iife(&elements[1..], start_pos(form))
    }

    /// Wrap statement-only forms appearing in expression position.
    pub(crate) fn statement_iife(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        self.body_iife(std::slice::from_ref(form), start_pos(form))
    }

    /// `(function () { …tail body… })()` with closure depth tracked.
    pub(crate) fn body_iife(
        &mut self,
        body: &[SExp],
        pos: Option<Position>,
    ) -> Result<Ir, HqlError> {
        self.closure_depth += 1;
        self.push_scope();
        let statements = self.transform_body(body);
        self.pop_scope();
        self.closure_depth -= 1;
        let statements = statements?;

        Ok(Ir::CallExpression {
            callee: Box::new(Ir::FunctionExpression {
                name: None,
                params: vec![],
                body: Box::new(Ir::block(statements)),
                is_generator: false,
                is_async: false,
                pos: None,
            }),
            arguments: vec![],
            pos,
        })
    }

    /// Transform a body: every form as a statement except the last, which
    /// lands in tail position (returned).
    pub(crate) fn transform_body(&mut self, forms: &[SExp]) -> Result<Vec<Ir>, HqlError> {
        let mut out = Vec::new();
        if forms.is_empty() {
            return Ok(out);
        }
        for form in &forms[..forms.len() - 1] {
            out.push(self.transform_stmt(form)?);
        }
        out.extend(self.transform_tail(&forms[forms.len() - 1])?);
        Ok(out)
    }

    /// Lower a form in tail position into statements ending in `return`.
    /// `if`/`do`/`cond`/`let` keep their branch structure so the optimizer
    /// can recognize tail calls inside them.
    pub(crate) fn transform_tail(&mut self, form: &SExp) -> Result<Vec<Ir>, HqlError> {
        if let Some(head) = form.head_symbol() {
            let elements = form.as_list().unwrap();
            match head {
                "if" if elements.len() >= 3 => {
                    let test = self.transform_expr(&elements[1])?;
                    let consequent = self.transform_tail(&elements[2])?;
                    let alternate = match elements.get(3) {
                        Some(alt) => self.transform_tail(alt)?,
                        None => vec![Ir::ReturnStatement {
                            argument: Some(Box::new(Ir::NullLiteral { pos: None })),
                            pos: None,
                        }],
                    };
                    return Ok(vec![Ir::IfStatement {
                        test: Box::new(test),
                        consequent: Box::new(Ir::block(consequent)),
                        alternate: Some(Box::new(Ir::block(alternate))),
                        pos: start_pos(form),
                    }]);
                }
                "do" => {
                    return self.transform_body(&elements[1..]);
                }
                "cond" => {
                    return self.cond_tail(&elements[1..], start_pos(form));
                }
                "let" if is_binding_block(elements) => {
                    return self.let_block_tail(elements, start_pos(form));
                }
                "recur" => {
                    return self.recur_tail(form);
                }
                "return" => {
                    return Ok(vec![self.return_stmt(form)?]);
                }
                "throw" => {
                    return Ok(vec![self.transform_stmt(form)?]);
                }
                "while" | "for-of" => {
                    // Statement loops in tail position run, then return nil
                    let stmt = self.transform_stmt(form)?;
                    return Ok(vec![
                        stmt,
                        Ir::ReturnStatement {
                            argument: Some(Box::new(Ir::NullLiteral { pos: None })),
                            pos: None,
                        },
                    ]);
                }
                _ => {}
            }
        }
        let expr = self.transform_expr(form)?;
        Ok(vec![Ir::ReturnStatement {
            argument: Some(Box::new(expr)),
            pos: start_pos(form),
        }])
    }

    // ===== Symbols =====

    fn symbol_expr(&mut self, name: &str, pos: Option<Position>) -> Result<Ir, HqlError> {
        // A primitive operator in value position becomes a runtime lookup;
        // it must never escape as a raw operator token
        if value_position_operator(name) {
            return Ok(Ir::CallExpression {
                callee: Box::new(Ir::ident("__hql_get_op")),
                arguments: vec![Ir::string(name)],
                pos,
            });
        }
        if name.contains('.') && !name.starts_with('.') && name != "..." {
            return self.dot_path(name, pos);
        }
        Ok(identifier(name, pos))
    }

    // ===== Calls and operators =====

    fn call_expr(&mut self, form: &SExp, elements: &[SExp]) -> Result<Ir, HqlError> {
        let callee = self.transform_expr(&elements[0])?;
        let arguments = self.call_arguments(&elements[0], &elements[1..])?;
        Ok(Ir::CallExpression {
            callee: Box::new(callee),
            arguments,
            pos: start_pos(form),
        })
    }

    /// Arguments with spread handling, plus the named-argument reordering
    /// shim: when every argument is a `name:` / value pair and the callee's
    /// parameter list is known, arguments are reordered positionally using
    /// the precomputed parameter-index map.
    fn call_arguments(&mut self, callee: &SExp, args: &[SExp]) -> Result<Vec<Ir>, HqlError> {
        if let Some(fn_name) = callee.as_symbol() {
            if let Some(reordered) = self.reorder_named_arguments(fn_name, args)? {
                return Ok(reordered);
            }
        }
        self.transform_args(args)
    }

    fn reorder_named_arguments(
        &mut self,
        fn_name: &str,
        args: &[SExp],
    ) -> Result<Option<Vec<Ir>>, HqlError> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Ok(None);
        }
        let all_named = args.chunks(2).all(|pair| {
            pair[0]
                .as_symbol()
                .is_some_and(|s| s.ends_with(':') && s.len() > 1)
        });
        if !all_named {
            return Ok(None);
        }
        let params = match self.fn_params.get(fn_name) {
            Some(p) => p.clone(),
            None => return Ok(None),
        };

        // Index map: parameter name -> position
        let index: HashMap<&str, usize> = params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();
        let mut slots: Vec<Ir> = (0..params.len())
            .map(|_| Ir::ident("undefined"))
            .collect();
        for pair in args.chunks(2) {
            let label = pair[0].as_symbol().unwrap();
            let key = &label[..label.len() - 1];
            let slot = match index.get(key) {
                Some(i) => *i,
                None => {
                    return Err(HqlError::syntax(
                        format!("unknown named argument `{}` for `{}`", key, fn_name),
                        pair[0].span().map(|s| s.start),
                    ));
                }
            };
            slots[slot] = self.transform_expr(&pair[1])?;
        }
        Ok(Some(slots))
    }

    pub(crate) fn transform_args(&mut self, args: &[SExp]) -> Result<Vec<Ir>, HqlError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            if let Some(name) = arg.as_symbol() {
                if let Some(rest) = name.strip_prefix("...") {
                    if !rest.is_empty() {
                        out.push(Ir::SpreadElement {
                            argument: Box::new(identifier(rest, start_pos(arg))),
                            pos: start_pos(arg),
                        });
                        continue;
                    }
                }
            }
            if arg.head_symbol() == Some("...") {
                out.push(self.spread_form(arg)?);
                continue;
            }
            out.push(self.transform_expr(arg)?);
        }
        Ok(out)
    }

    fn spread_form(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() != 2 {
            return Err(HqlError::syntax(
                "...: expected a single expression",
                start_pos(form),
            ));
        }
        Ok(Ir::SpreadElement {
            argument: Box::new(self.transform_expr(&elements[1])?),
            pos: start_pos(form),
        })
    }

    /// An operator symbol in call position lowers directly to a binary
    /// expression tree.
    fn operator_call(&mut self, form: &SExp, elements: &[SExp]) -> Result<Ir, HqlError> {
        let name = elements[0].as_symbol().unwrap();
        let op = binary_operator(name).unwrap();
        let args = &elements[1..];
        let pos = start_pos(form);

        match (name, args.len()) {
            (_, 0) => Err(HqlError::arity_error(
                name,
                crate::error::ARITY_AT_LEAST_ONE,
                0,
            )),
            ("-", 1) => Ok(Ir::UnaryExpression {
                operator: "-".to_string(),
                argument: Box::new(self.transform_expr(&args[0])?),
                pos,
            }),
            ("+", 1) | ("*", 1) | ("/", 1) => self.transform_expr(&args[0]),
            _ if is_comparison(name) => {
                // (< a b c) chains into (a < b) && (b < c)
                if args.len() < 2 {
                    return Err(HqlError::arity_error(
                        name,
                        crate::error::ARITY_AT_LEAST_TWO,
                        args.len(),
                    ));
                }
                let mut exprs = Vec::with_capacity(args.len());
                for arg in args {
                    exprs.push(self.transform_expr(arg)?);
                }
                let mut chain: Option<Ir> = None;
                for pair in exprs.windows(2) {
                    let cmp = Ir::BinaryExpression {
                        operator: op.to_string(),
                        left: Box::new(pair[0].clone()),
                        right: Box::new(pair[1].clone()),
                        pos,
                    };
                    chain = Some(match chain {
                        None => cmp,
                        Some(prev) => Ir::BinaryExpression {
                            operator: "&&".to_string(),
                            left: Box::new(prev),
                            right: Box::new(cmp),
                            pos,
                        },
                    });
                }
                Ok(chain.unwrap())
            }
            ("mod", 2) => {
                // Floored modulo: ((a % b) + b) % b
                let a = self.transform_expr(&args[0])?;
                let b = self.transform_expr(&args[1])?;
                let rem = Ir::BinaryExpression {
                    operator: "%".to_string(),
                    left: Box::new(a),
                    right: Box::new(b.clone()),
                    pos,
                };
                let sum = Ir::BinaryExpression {
                    operator: "+".to_string(),
                    left: Box::new(rem),
                    right: Box::new(b.clone()),
                    pos,
                };
                Ok(Ir::BinaryExpression {
                    operator: "%".to_string(),
                    left: Box::new(sum),
                    right: Box::new(b),
                    pos,
                })
            }
            _ => {
                // Left-fold: (+ a b c) => (a + b) + c
                let mut acc = self.transform_expr(&args[0])?;
                for arg in &args[1..] {
                    acc = Ir::BinaryExpression {
                        operator: op.to_string(),
                        left: Box::new(acc),
                        right: Box::new(self.transform_expr(arg)?),
                        pos,
                    };
                }
                Ok(acc)
            }
        }
    }

    fn logical_chain(&mut self, form: &SExp, op: &str) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let args = &elements[1..];
        if args.is_empty() {
            return Ok(Ir::BoolLiteral {
                value: op == "&&",
                pos: start_pos(form),
            });
        }
        let mut acc = self.transform_expr(&args[0])?;
        for arg in &args[1..] {
            acc = Ir::BinaryExpression {
                operator: op.to_string(),
                left: Box::new(acc),
                right: Box::new(self.transform_expr(arg)?),
                pos: start_pos(form),
            };
        }
        Ok(acc)
    }

    fn unary_not(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() != 2 {
            return Err(HqlError::arity_error("not", crate::error::ARITY_ONE, elements.len() - 1));
        }
        Ok(Ir::UnaryExpression {
            operator: "!".to_string(),
            argument: Box::new(self.transform_expr(&elements[1])?),
            pos: start_pos(form),
        })
    }

    // ===== Collection literals =====

    pub(crate) fn array_literal(&mut self, form: &SExp, items: &[SExp]) -> Result<Ir, HqlError> {
        Ok(Ir::ArrayExpression {
            elements: self.transform_args(items)?,
            pos: start_pos(form),
        })
    }

    fn map_literal(&mut self, form: &SExp, items: &[SExp]) -> Result<Ir, HqlError> {
        if items.len() % 2 != 0 {
            return Err(HqlError::syntax(
                "hash-map: expected an even number of forms",
                start_pos(form),
            ));
        }

        let literal_keys = items
            .chunks(2)
            .all(|pair| matches!(
                &pair[0],
                SExp::Literal { value: Scalar::String(_), .. } | SExp::Symbol { .. }
            ) && pair[0].as_symbol() != Some("..."));

        if literal_keys {
            let mut properties = Vec::with_capacity(items.len() / 2);
            for pair in items.chunks(2) {
                let key = match &pair[0] {
                    SExp::Literal {
                        value: Scalar::String(s),
                        span,
                    } => Ir::StringLiteral {
                        value: s.clone(),
                        pos: span.map(|s| s.start),
                    },
                    SExp::Symbol { name, span } => Ir::StringLiteral {
                        value: name.clone(),
                        pos: span.map(|s| s.start),
                    },
                    _ => unreachable!("checked literal_keys"),
                };
                properties.push(Ir::ObjectProperty {
                    key: Box::new(key),
                    value: Box::new(self.transform_expr(&pair[1])?),
                    computed: false,
                    shorthand: false,
                    pos: start_pos(&pair[1]),
                });
            }
            return Ok(Ir::ObjectExpression {
                properties,
                pos: start_pos(form),
            });
        }

        // Dynamic keys go through the runtime constructor
        let arguments = self.transform_args(items)?;
        Ok(Ir::CallExpression {
            callee: Box::new(Ir::ident("__hql_hash_map")),
            arguments,
            pos: start_pos(form),
        })
    }

    fn set_literal(&mut self, form: &SExp, items: &[SExp]) -> Result<Ir, HqlError> {
        let elements = self.transform_args(items)?;
        Ok(Ir::NewExpression {
            callee: Box::new(Ir::ident("Set")),
            arguments: vec![Ir::ArrayExpression {
                elements,
                pos: start_pos(form),
            }],
            pos: start_pos(form),
        })
    }

    /// Quasiquoted data surviving to runtime. Without unquotes this is
    /// identical to `quote`; unquoted slots become live expressions and
    /// splices become array spreads.
    fn quasiquote_data(&mut self, form: &SExp, depth: usize) -> Result<Ir, HqlError> {
        match form {
            SExp::Literal { value, span } => Ok(literal_ir(value, span.map(|s| s.start))),
            SExp::Symbol { name, span } => Ok(Ir::StringLiteral {
                value: name.clone(),
                pos: span.map(|s| s.start),
            }),
            SExp::List { elements, kind, span } => {
                if let Some(head) = elements.first().and_then(SExp::as_symbol) {
                    if head == "unquote" && elements.len() == 2 {
                        if depth == 1 {
                            return self.transform_expr(&elements[1]);
                        }
                        return self.quasiquote_data(&elements[1], depth - 1);
                    }
                    if head == "quasiquote" && elements.len() == 2 {
                        return self.quasiquote_data(&elements[1], depth + 1);
                    }
                }
                let skip = usize::from(*kind != ListKind::List);
                let mut items = Vec::with_capacity(elements.len());
                for element in &elements[skip..] {
                    let is_splice = element.head_symbol() == Some("unquote-splicing")
                        && element.as_list().map(|l| l.len()) == Some(2);
                    if is_splice && depth == 1 {
                        let inner = &element.as_list().unwrap()[1];
                        items.push(Ir::SpreadElement {
                            argument: Box::new(self.transform_expr(inner)?),
                            pos: start_pos(element),
                        });
                    } else {
                        items.push(self.quasiquote_data(element, depth)?);
                    }
                }
                Ok(Ir::ArrayExpression {
                    elements: items,
                    pos: span.map(|s| s.start),
                })
            }
        }
    }

    /// Quoted data surviving to runtime becomes a plain data literal:
    /// symbols as strings, lists as arrays.
    fn quoted_data(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        match form {
            SExp::Literal { value, span } => Ok(literal_ir(value, span.map(|s| s.start))),
            SExp::Symbol { name, span } => Ok(Ir::StringLiteral {
                value: name.clone(),
                pos: span.map(|s| s.start),
            }),
            SExp::List { elements, kind, span } => {
                let skip = usize::from(*kind != ListKind::List);
                let items = elements[skip..]
                    .iter()
                    .map(|e| self.quoted_data(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Ir::ArrayExpression {
                    elements: items,
                    pos: span.map(|s| s.start),
                })
            }
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) fn start_pos(form: &SExp) -> Option<Position> {
    form.span().map(|s| s.start)
}

pub(crate) fn literal_ir(value: &Scalar, pos: Option<Position>) -> Ir {
    match value {
        Scalar::Number(n) => Ir::NumericLiteral { value: *n, pos },
        Scalar::BigInt(digits) => Ir::BigIntLiteral {
            digits: digits.clone(),
            pos,
        },
        Scalar::String(s) => Ir::StringLiteral {
            value: s.clone(),
            pos,
        },
        Scalar::Bool(b) => Ir::BoolLiteral { value: *b, pos },
        Scalar::Nil => Ir::NullLiteral { pos },
    }
}

/// Mangle an HQL name into a JavaScript identifier: hyphens become
/// underscores, any other non-identifier character does too.
pub(crate) fn mangle(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Identifier node preserving the original spelling when mangling changed
/// it (fed into source-map `names`).
pub(crate) fn identifier(name: &str, pos: Option<Position>) -> Ir {
    let mangled = mangle(name);
    let original = if mangled == name {
        None
    } else {
        Some(name.to_string())
    };
    Ir::Identifier {
        name: mangled,
        pos,
        original,
    }
}

/// Operators that lower to a JS binary operator when they appear in call
/// position. `=` is assignment, not equality, in the surface language.
pub(crate) fn binary_operator(name: &str) -> Option<&'static str> {
    Some(match name {
        "+" => "+",
        "-" => "-",
        "*" => "*",
        "/" => "/",
        "%" => "%",
        "mod" => "%",
        "==" => "===",
        "===" => "===",
        "!=" => "!==",
        "!==" => "!==",
        "<" => "<",
        ">" => ">",
        "<=" => "<=",
        ">=" => ">=",
        "instanceof" => "instanceof",
        _ => return None,
    })
}

fn is_comparison(name: &str) -> bool {
    matches!(name, "==" | "===" | "!=" | "!==" | "<" | ">" | "<=" | ">=")
}

/// Operators that must be replaced with a runtime lookup when used as
/// values (passed to higher-order functions).
pub(crate) fn value_position_operator(name: &str) -> bool {
    matches!(
        name,
        "+" | "-" | "*" | "/" | "%" | "mod" | "==" | "===" | "!=" | "!==" | "<" | ">" | "<=" | ">="
    )
}

/// `(let [n1 v1 …] body…)` vs the two-arg declaration form `(let x 1)`.
pub(crate) fn is_binding_block(elements: &[SExp]) -> bool {
    elements.len() >= 2 && elements[1].as_symbol().is_none() && elements[1].seq_elements().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_forms;

    pub(crate) fn transform_src(src: &str) -> Result<Vec<Ir>, HqlError> {
        let forms = read_forms(src).unwrap();
        transform_program(&forms)
    }

    #[test]
    fn test_operator_call_folds_left() {
        let out = transform_src("(+ 1 2 3)").unwrap();
        match &out[0] {
            Ir::ExpressionStatement { expression, .. } => match expression.as_ref() {
                Ir::BinaryExpression { operator, left, .. } => {
                    assert_eq!(operator, "+");
                    assert!(matches!(left.as_ref(), Ir::BinaryExpression { .. }));
                }
                other => panic!("expected binary, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_as_value_becomes_runtime_lookup() {
        let out = transform_src("(reduce + 0 [1 2 3])").unwrap();
        let found = out[0].any_node(&mut |n| {
            matches!(
                n,
                Ir::CallExpression { callee, arguments, .. }
                if matches!(callee.as_ref(), Ir::Identifier { name, .. } if name == "__hql_get_op")
                    && matches!(arguments.first(), Some(Ir::StringLiteral { value, .. }) if value == "+")
            )
        });
        assert!(found);
    }

    #[test]
    fn test_equality_spelling_maps_to_strict() {
        let out = transform_src("(== a b)").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::BinaryExpression { operator, .. } if operator == "==="
        )));
    }

    #[test]
    fn test_comparison_chain() {
        let out = transform_src("(< a b c)").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::BinaryExpression { operator, .. } if operator == "&&"
        )));
    }

    #[test]
    fn test_kebab_mangling_preserves_original() {
        let out = transform_src("my-helper").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::Identifier { name, original, .. }
            if name == "my_helper" && original.as_deref() == Some("my-helper")
        )));
    }

    #[test]
    fn test_vector_literal() {
        let out = transform_src("[1 2 3]").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::ArrayExpression { elements, .. } if elements.len() == 3
        )));
    }

    #[test]
    fn test_map_literal_static_keys() {
        let out = transform_src("{\"a\" 1 \"b\" 2}").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::ObjectExpression { properties, .. } if properties.len() == 2
        )));
    }

    #[test]
    fn test_map_literal_dynamic_keys_uses_runtime() {
        let out = transform_src("{(compute-key) 1}").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::CallExpression { callee, .. }
            if matches!(callee.as_ref(), Ir::Identifier { name, .. } if name == "__hql_hash_map")
        )));
    }

    #[test]
    fn test_spread_in_call() {
        let out = transform_src("(f ...xs)").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::SpreadElement { .. })));
    }

    #[test]
    fn test_empty_list_is_null() {
        let out = transform_src("()").unwrap();
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::NullLiteral { .. })));
    }
}
