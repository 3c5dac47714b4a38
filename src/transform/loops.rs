//! Loop forms: `while`, `loop`/`recur`, `for-of`.
//!
//! `loop` lowers to an IIFE holding mutable loop variables and a
//! `while (true)`; `recur` is only legal in tail position and becomes a
//! rebinding plus `continue`. `for-of` lowers to the `__hql_for_each`
//! runtime callback so host iterables and early returns both work.

use super::{identifier, start_pos, LoopCtx, Transformer};
use crate::error::HqlError;
use crate::ir::{Ir, VarKind};
use crate::macros::gensym;
use crate::sexp::SExp;

impl Transformer {
    pub(crate) fn while_stmt(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() < 2 {
            return Err(HqlError::syntax("while: expected a test", start_pos(form)));
        }
        let test = self.transform_expr(&elements[1])?;

        self.push_scope();
        let mut body = Vec::new();
        let mut err = None;
        for stmt in &elements[2..] {
            match self.transform_stmt(stmt) {
                Ok(s) => body.push(s),
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        self.pop_scope();
        if let Some(e) = err {
            return Err(e);
        }

        Ok(Ir::WhileStatement {
            test: Box::new(test),
            body: Box::new(Ir::block(body)),
            pos: start_pos(form),
        })
    }

    /// `(loop [v1 i1 …] body…)` — mutable bindings plus `while (true)`
    /// inside an IIFE so the loop has a value.
    pub(crate) fn loop_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let pairs = elements
            .get(1)
            .and_then(SExp::seq_elements)
            .ok_or_else(|| {
                HqlError::syntax("loop: expected a binding vector", start_pos(form))
            })?;
        if pairs.len() % 2 != 0 {
            return Err(HqlError::syntax(
                "loop: bindings need an even number of forms",
                start_pos(form),
            ));
        }

        self.closure_depth += 1;
        self.push_scope();

        let mut decls = Vec::new();
        let mut vars = Vec::new();
        let mut setup_err = None;
        for pair in pairs.chunks(2) {
            let name = match pair[0].as_symbol() {
                Some(n) => n,
                None => {
                    setup_err = Some(HqlError::syntax(
                        "loop: binding name must be a symbol",
                        start_pos(&pair[0]),
                    ));
                    break;
                }
            };
            match self.transform_expr(&pair[1]) {
                Ok(init) => {
                    self.declare(name, VarKind::Let);
                    decls.push(Ir::VariableDeclaration {
                        kind: VarKind::Let,
                        pattern: Box::new(identifier(name, start_pos(&pair[0]))),
                        init: Some(Box::new(init)),
                        pos: start_pos(&pair[0]),
                    });
                    vars.push(name.to_string());
                }
                Err(e) => {
                    setup_err = Some(e);
                    break;
                }
            }
        }

        let result = match setup_err {
            Some(e) => Err(e),
            None => {
                self.loop_stack.push(LoopCtx { vars });
                let body = self.transform_body(&elements[2..]);
                self.loop_stack.pop();
                body
            }
        };

        self.pop_scope();
        self.closure_depth -= 1;
        let body = result?;

        let mut statements = decls;
        statements.push(Ir::WhileStatement {
            test: Box::new(Ir::BoolLiteral {
                value: true,
                pos: None,
            }),
            body: Box::new(Ir::block(body)),
            pos: start_pos(form),
        });

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
            pos: start_pos(form),
        })
    }

    /// `recur` in tail position: evaluate every argument into a temporary
    /// first (argument order must not observe partially-updated loop vars),
    /// then rebind and continue.
    pub(crate) fn recur_tail(&mut self, form: &SExp) -> Result<Vec<Ir>, HqlError> {
        let elements = form.as_list().unwrap();
        let args = &elements[1..];
        let vars = match self.loop_stack.last() {
            Some(ctx) => ctx.vars.clone(),
            None => {
                return Err(HqlError::syntax(
                    "recur: no enclosing loop",
                    start_pos(form),
                ));
            }
        };
        if args.len() != vars.len() {
            return Err(HqlError::arity_error(
                "recur",
                vars.len().to_string(),
                args.len(),
            ));
        }

        let mut out = Vec::new();
        let mut temps = Vec::new();
        for arg in args {
            let temp = gensym("recur");
            let value = self.transform_expr(arg)?;
            out.push(Ir::VariableDeclaration {
                kind: VarKind::Const,
                pattern: Box::new(Ir::ident(temp.clone())),
                init: Some(Box::new(value)),
                pos: start_pos(arg),
            });
            temps.push(temp);
        }
        for (var, temp) in vars.iter().zip(temps) {
            out.push(Ir::expr_stmt(Ir::AssignmentExpression {
                target: Box::new(identifier(var, None)),
                value: Box::new(Ir::ident(temp)),
                pos: None,
            }));
        }
        out.push(Ir::ContinueStatement {
            pos: start_pos(form),
        });
        Ok(out)
    }

    /// `(for-of [x seq] body…)` lowers to `__hql_for_each(seq, (x) => …)`
    /// so iteration works over any host iterable; the callback counts as a
    /// closure for early-return lowering.
    pub(crate) fn for_of(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let pair = elements
            .get(1)
            .and_then(SExp::seq_elements)
            .filter(|p| p.len() == 2)
            .ok_or_else(|| {
                HqlError::syntax("for-of: expected [name sequence]", start_pos(form))
            })?;
        let name = pair[0].as_symbol().ok_or_else(|| {
            HqlError::syntax("for-of: binding name must be a symbol", start_pos(&pair[0]))
        })?;
        let seq = self.transform_expr(&pair[1])?;

        self.closure_depth += 1;
        self.push_scope();
        self.declare(name, VarKind::Let);
        let body = {
            let mut stmts = Vec::new();
            let mut err = None;
            for stmt in &elements[2..] {
                match self.transform_stmt(stmt) {
                    Ok(s) => stmts.push(s),
                    Err(e) => {
                        err = Some(e);
                        break;
                    }
                }
            }
            match err {
                Some(e) => Err(e),
                None => Ok(stmts),
            }
        };
        self.pop_scope();
        self.closure_depth -= 1;
        let body = body?;

        Ok(Ir::CallExpression {
            callee: Box::new(Ir::ident("__hql_for_each")),
            arguments: vec![
                seq,
                Ir::FunctionExpression {
                    name: None,
                    params: vec![identifier(name, start_pos(&pair[0]))],
                    body: Box::new(Ir::block(body)),
                    is_generator: false,
                    is_async: false,
                    pos: None,
                },
            ],
            pos: start_pos(form),
        })
    }
}
