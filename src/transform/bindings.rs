//! Binding forms: `const let var`, assignment via `set!`/`=`, deep-freeze
//! for top-level composite consts, and `let` binding blocks.

use super::{identifier, is_binding_block, start_pos, Transformer};
use crate::error::HqlError;
use crate::ir::{Ir, VarKind};
use crate::sexp::{ListKind, SExp};
use crate::source::Position;

impl Transformer {
    /// `(const name value)`, `(let name value)`, `(var name value)` and the
    /// `let` binding-block form in statement position.
    pub(crate) fn binding_stmt(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let head = elements[0].as_symbol().unwrap();

        if head == "let" && is_binding_block(elements) {
            return self.let_block_stmt(form);
        }

        if elements.len() != 3 {
            return Err(HqlError::syntax(
                format!("{}: expected a name and a value", head),
                start_pos(form),
            ));
        }
        let name = elements[1].as_symbol().ok_or_else(|| {
            HqlError::syntax(
                format!("{}: name must be a symbol", head),
                start_pos(&elements[1]),
            )
        })?;

        let kind = match head {
            "const" => VarKind::Const,
            "let" => VarKind::Let,
            _ => VarKind::Var,
        };

        let mut init = self.transform_expr(&elements[2])?;
        // Top-level composite consts are transitively frozen
        if kind == VarKind::Const && self.at_top_level() && is_composite(&elements[2]) {
            init = Ir::call(Ir::ident("__hql_deep_freeze"), vec![init]);
        }

        self.declare(name, kind);
        Ok(Ir::VariableDeclaration {
            kind,
            pattern: Box::new(identifier(name, start_pos(&elements[1]))),
            init: Some(Box::new(init)),
            pos: start_pos(form),
        })
    }

    /// `(set! target value)` / `(= target value)`. Assignment to a `const`
    /// binding is rejected at transform time.
    pub(crate) fn assignment(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let head = elements[0].as_symbol().unwrap();
        if elements.len() != 3 {
            return Err(HqlError::syntax(
                format!("{}: expected a target and a value", head),
                start_pos(form),
            ));
        }

        let target = &elements[1];
        if let Some(name) = target.as_symbol() {
            if !name.contains('.') {
                if self.binding_kind(name) == Some(VarKind::Const) {
                    return Err(HqlError::ImmutableAssignment {
                        name: name.to_string(),
                        pos: start_pos(target),
                    });
                }
            }
        }

        let target_ir = self.assignment_target(target)?;
        let value = self.transform_expr(&elements[2])?;
        Ok(Ir::AssignmentExpression {
            target: Box::new(target_ir),
            value: Box::new(value),
            pos: start_pos(form),
        })
    }

    fn assignment_target(&mut self, target: &SExp) -> Result<Ir, HqlError> {
        match target {
            SExp::Symbol { .. } => self.transform_expr(target),
            SExp::List { .. } if target.head_symbol() == Some("js-get") => self.js_get(target),
            _ => Err(HqlError::syntax(
                "assignment target must be a name, dot path, or js-get form",
                start_pos(target),
            )),
        }
    }

    // ===== let binding blocks =====

    /// Statement position: a plain block with const bindings.
    fn let_block_stmt(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        self.push_scope();
        let result: Result<Vec<Ir>, HqlError> = (|| {
            let (mut statements, _) = self.let_block_parts(elements, false)?;
            for form in &elements[2..] {
                statements.push(self.transform_stmt(form)?);
            }
            Ok(statements)
        })();
        self.pop_scope();
        Ok(Ir::BlockStatement {
            body: result?,
            pos: start_pos(form),
        })
    }

    /// Expression position: an IIFE returning the body's tail value.
    pub(crate) fn let_block_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        self.closure_depth += 1;
        self.push_scope();
        let result = self.let_block_with_tail(elements);
        self.pop_scope();
        self.closure_depth -= 1;
        let statements = result?;

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

    /// Tail position inside a function: a block whose last statement
    /// returns, keeping tail-call structure visible to the optimizer.
    pub(crate) fn let_block_tail(
        &mut self,
        elements: &[SExp],
        pos: Option<Position>,
    ) -> Result<Vec<Ir>, HqlError> {
        self.push_scope();
        let result = self.let_block_with_tail(elements);
        self.pop_scope();
        Ok(vec![Ir::BlockStatement {
            body: result?,
            pos,
        }])
    }

    fn let_block_with_tail(&mut self, elements: &[SExp]) -> Result<Vec<Ir>, HqlError> {
        let (mut statements, _) = self.let_block_parts(elements, true)?;
        statements.extend(self.transform_body(&elements[2..])?);
        Ok(statements)
    }

    /// The binding declarations of a `let` block. Bindings are sequential:
    /// each value expression sees the names bound before it.
    fn let_block_parts(
        &mut self,
        elements: &[SExp],
        _tail: bool,
    ) -> Result<(Vec<Ir>, Vec<String>), HqlError> {
        let pairs = elements[1].seq_elements().unwrap();
        if pairs.len() % 2 != 0 {
            return Err(HqlError::syntax(
                "let: bindings need an even number of forms",
                start_pos(&elements[1]),
            ));
        }

        let mut statements = Vec::new();
        let mut names = Vec::new();
        for pair in pairs.chunks(2) {
            let name = pair[0].as_symbol().ok_or_else(|| {
                HqlError::syntax("let: binding name must be a symbol", start_pos(&pair[0]))
            })?;
            let init = self.transform_expr(&pair[1])?;
            self.declare(name, VarKind::Const);
            statements.push(Ir::VariableDeclaration {
                kind: VarKind::Const,
                pattern: Box::new(identifier(name, start_pos(&pair[0]))),
                init: Some(Box::new(init)),
                pos: start_pos(&pair[0]),
            });
            names.push(name.to_string());
        }
        Ok((statements, names))
    }

    /// `do` in statement position is a plain block.
    pub(crate) fn do_stmt(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        self.push_scope();
        let mut body = Vec::new();
        let mut err = None;
        for form in &elements[1..] {
            match self.transform_stmt(form) {
                Ok(stmt) => body.push(stmt),
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
        Ok(Ir::BlockStatement {
            body,
            pos: start_pos(form),
        })
    }
}

/// Composite values (arrays, maps, sets) get the deep-freeze treatment when
/// bound by a top-level const.
fn is_composite(form: &SExp) -> bool {
    match form {
        SExp::List { kind, .. } if *kind != ListKind::List => true,
        SExp::List { .. } => matches!(
            form.head_symbol(),
            Some("vector") | Some("hash-map") | Some("hash-set")
        ),
        _ => false,
    }
}
