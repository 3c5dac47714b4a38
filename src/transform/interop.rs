//! JavaScript interop: `js-get js-set js-call new`, the `(obj .method …)`
//! call form, dot-path symbols, template literals, and module forms.

use super::{identifier, mangle, start_pos, Transformer};
use crate::error::HqlError;
use crate::ir::{ImportSpecifier, Ir, TemplatePiece};
use crate::sexp::{Scalar, SExp};
use crate::source::Position;

/// Property names that can render in dot form. Everything else goes through
/// computed access.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let body = name.strip_prefix('#').unwrap_or(name);
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl Transformer {
    /// `console.log` lexed as one symbol lowers to a member chain. The
    /// leading segment must be a plain identifier; computed receivers use
    /// `js-get` explicitly.
    pub(crate) fn dot_path(
        &mut self,
        name: &str,
        pos: Option<Position>,
    ) -> Result<Ir, HqlError> {
        let mut segments = name.split('.');
        let root = segments.next().unwrap_or_default();
        let mut node = identifier(root, pos);
        for segment in segments {
            node = Ir::MemberExpression {
                object: Box::new(node),
                property: Box::new(Ir::ident(segment)),
                computed: !is_plain_identifier(segment),
                pos,
            };
        }
        Ok(node)
    }

    /// `(js-get obj "prop")` / `(js-get obj key-expr)`.
    pub(crate) fn js_get(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() != 3 {
            return Err(HqlError::arity_error(
                "js-get",
                crate::error::ARITY_TWO,
                elements.len() - 1,
            ));
        }
        let object = self.transform_expr(&elements[1])?;
        self.member_access(object, &elements[2], start_pos(form))
    }

    /// `(js-set obj "prop" value)`.
    pub(crate) fn js_set(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() != 4 {
            return Err(HqlError::arity_error(
                "js-set",
                crate::error::ARITY_THREE,
                elements.len() - 1,
            ));
        }
        let object = self.transform_expr(&elements[1])?;
        let target = self.member_access(object, &elements[2], start_pos(form))?;
        let value = self.transform_expr(&elements[3])?;
        Ok(Ir::AssignmentExpression {
            target: Box::new(target),
            value: Box::new(value),
            pos: start_pos(form),
        })
    }

    /// `(js-call obj "method" args…)`.
    pub(crate) fn js_call(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() < 3 {
            return Err(HqlError::arity_error(
                "js-call",
                crate::error::ARITY_AT_LEAST_TWO,
                elements.len() - 1,
            ));
        }
        let object = self.transform_expr(&elements[1])?;
        let callee = self.member_access(object, &elements[2], start_pos(form))?;
        let arguments = self.transform_args(&elements[3..])?;
        Ok(Ir::CallExpression {
            callee: Box::new(callee),
            arguments,
            pos: start_pos(form),
        })
    }

    fn member_access(
        &mut self,
        object: Ir,
        key: &SExp,
        pos: Option<Position>,
    ) -> Result<Ir, HqlError> {
        match key {
            SExp::Literal {
                value: Scalar::String(s),
                ..
            } if is_plain_identifier(s) => Ok(Ir::MemberExpression {
                object: Box::new(object),
                property: Box::new(Ir::ident(s.clone())),
                computed: false,
                pos,
            }),
            SExp::Symbol { name, .. } if is_plain_identifier(name) => Ok(Ir::MemberExpression {
                object: Box::new(object),
                property: Box::new(Ir::ident(name.clone())),
                computed: false,
                pos,
            }),
            _ => Ok(Ir::MemberExpression {
                object: Box::new(object),
                property: Box::new(self.transform_expr(key)?),
                computed: true,
                pos,
            }),
        }
    }

    /// `(obj .method args…)` method-call sugar.
    pub(crate) fn method_call(&mut self, form: &SExp, elements: &[SExp]) -> Result<Ir, HqlError> {
        let object = self.transform_expr(&elements[0])?;
        let method = elements[1].as_symbol().unwrap();
        let name = &method[1..];
        if name.is_empty() {
            return Err(HqlError::syntax(
                "method call: missing method name",
                start_pos(&elements[1]),
            ));
        }
        let callee = Ir::MemberExpression {
            object: Box::new(object),
            property: Box::new(Ir::ident(mangle(name))),
            computed: !is_plain_identifier(name),
            pos: start_pos(&elements[1]),
        };
        let arguments = self.transform_args(&elements[2..])?;
        Ok(Ir::CallExpression {
            callee: Box::new(callee),
            arguments,
            pos: start_pos(form),
        })
    }

    /// `(new Class args…)`.
    pub(crate) fn new_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() < 2 {
            return Err(HqlError::syntax(
                "new: expected a constructor",
                start_pos(form),
            ));
        }
        let callee = self.transform_expr(&elements[1])?;
        let arguments = self.transform_args(&elements[2..])?;
        Ok(Ir::NewExpression {
            callee: Box::new(callee),
            arguments,
            pos: start_pos(form),
        })
    }

    /// `(js-template "text" expr "text" …)` from backtick templates.
    pub(crate) fn template_literal(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let mut parts = Vec::with_capacity(elements.len() - 1);
        for part in &elements[1..] {
            match part {
                SExp::Literal {
                    value: Scalar::String(s),
                    ..
                } => parts.push(TemplatePiece::Text(s.clone())),
                other => parts.push(TemplatePiece::Expr(self.transform_expr(other)?)),
            }
        }
        Ok(Ir::TemplateLiteral {
            parts,
            pos: start_pos(form),
        })
    }

    /// `(import [a b] from "path")`. The resolver has already compiled
    /// local targets; here the form becomes a plain import declaration.
    pub(crate) fn import_declaration(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let names = elements
            .get(1)
            .and_then(SExp::seq_elements)
            .ok_or_else(|| {
                HqlError::syntax("import: expected a binding vector", start_pos(form))
            })?;
        if elements.get(2).and_then(SExp::as_symbol) != Some("from") {
            return Err(HqlError::syntax(
                "import: expected (import [names…] from \"path\")",
                start_pos(form),
            ));
        }
        let source = match elements.get(3) {
            Some(SExp::Literal {
                value: Scalar::String(s),
                ..
            }) => s.clone(),
            _ => {
                return Err(HqlError::syntax(
                    "import: module path must be a string",
                    start_pos(form),
                ));
            }
        };

        let mut specifiers = Vec::with_capacity(names.len());
        for name in names {
            let symbol = name.as_symbol().ok_or_else(|| {
                HqlError::syntax("import: names must be symbols", start_pos(name))
            })?;
            specifiers.push(ImportSpecifier {
                imported: symbol.to_string(),
                local: mangle(symbol),
            });
        }
        Ok(Ir::ImportDeclaration {
            specifiers,
            source,
            pos: start_pos(form),
        })
    }

    /// `(export [a b])`.
    pub(crate) fn export_declaration(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let names = elements
            .get(1)
            .and_then(SExp::seq_elements)
            .ok_or_else(|| {
                HqlError::syntax("export: expected a binding vector", start_pos(form))
            })?;
        let mut pairs = Vec::with_capacity(names.len());
        for name in names {
            let symbol = name.as_symbol().ok_or_else(|| {
                HqlError::syntax("export: names must be symbols", start_pos(name))
            })?;
            pairs.push((mangle(symbol), symbol.to_string()));
        }
        Ok(Ir::ExportDeclaration {
            names: pairs,
            pos: start_pos(form),
        })
    }
}
