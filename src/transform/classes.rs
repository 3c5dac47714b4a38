//! `class` and `enum` declarations.
//!
//! A class body is a sequence of member lists: `(constructor [params] …)`
//! and `(method-name [params] …)`. An enum becomes a frozen object literal
//! whose case symbols map to their own names.

use super::{identifier, mangle, start_pos, Transformer};
use crate::error::HqlError;
use crate::ir::{ClassMethod, Ir, MethodKind, VarKind};
use crate::sexp::SExp;

impl Transformer {
    pub(crate) fn class_declaration(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let name = elements
            .get(1)
            .and_then(SExp::as_symbol)
            .ok_or_else(|| HqlError::syntax("class: expected a name", start_pos(form)))?;
        self.declare(name, VarKind::Const);

        // Optional `(extends Base)` before the members
        let mut member_start = 2;
        let mut superclass = None;
        if let Some(first) = elements.get(2) {
            if first.head_symbol() == Some("extends") {
                let base = first
                    .as_list()
                    .and_then(|l| l.get(1))
                    .ok_or_else(|| {
                        HqlError::syntax("class: extends needs a base class", start_pos(first))
                    })?;
                superclass = Some(Box::new(self.transform_expr(base)?));
                member_start = 3;
            }
        }

        let mut methods = Vec::new();
        for member in &elements[member_start..] {
            methods.push(self.class_method(member)?);
        }

        Ok(Ir::ClassDeclaration {
            name: mangle(name),
            superclass,
            methods,
            pos: start_pos(form),
        })
    }

    fn class_method(&mut self, member: &SExp) -> Result<ClassMethod, HqlError> {
        let items = member.as_list().ok_or_else(|| {
            HqlError::syntax("class: member must be a list", start_pos(member))
        })?;
        let (kind, name, rest) = match items.first().and_then(SExp::as_symbol) {
            Some("constructor") => (MethodKind::Constructor, "constructor".to_string(), &items[1..]),
            Some("static") => {
                let name = items.get(1).and_then(SExp::as_symbol).ok_or_else(|| {
                    HqlError::syntax("class: static member needs a name", start_pos(member))
                })?;
                (MethodKind::Static, mangle(name), &items[2..])
            }
            Some(n) => (MethodKind::Method, mangle(n), &items[1..]),
            None => {
                return Err(HqlError::syntax(
                    "class: member must start with a name",
                    start_pos(member),
                ));
            }
        };

        let params_form = rest.first().ok_or_else(|| {
            HqlError::syntax("class: member needs a parameter vector", start_pos(member))
        })?;
        let parsed = self.parse_fn_params(params_form)?;

        let saved_depth = std::mem::replace(&mut self.closure_depth, 0);
        self.push_scope();
        for p in &parsed.names {
            self.declare(p, VarKind::Let);
        }
        let body = if kind == MethodKind::Constructor {
            // Constructors have no return value; every form is a statement
            let mut stmts = Vec::new();
            let mut err = None;
            for stmt in &rest[1..] {
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
        } else {
            self.transform_body(&rest[1..])
        };
        self.pop_scope();
        self.closure_depth = saved_depth;
        let mut statements = parsed.prologue.clone();
        statements.extend(body?);

        Ok(ClassMethod {
            key: name,
            params: parsed.params,
            body: Box::new(Ir::block(statements)),
            kind,
            pos: start_pos(member),
        })
    }

    /// `(enum Color red green blue)` becomes a frozen object literal.
    pub(crate) fn enum_declaration(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let name = elements
            .get(1)
            .and_then(SExp::as_symbol)
            .ok_or_else(|| HqlError::syntax("enum: expected a name", start_pos(form)))?;
        self.declare(name, VarKind::Const);

        let mut properties = Vec::new();
        for case in &elements[2..] {
            let case_name = case.as_symbol().ok_or_else(|| {
                HqlError::syntax("enum: cases must be symbols", start_pos(case))
            })?;
            properties.push(Ir::ObjectProperty {
                key: Box::new(Ir::ident(mangle(case_name))),
                value: Box::new(Ir::string(case_name)),
                computed: false,
                shorthand: false,
                pos: start_pos(case),
            });
        }

        let frozen = Ir::call(
            Ir::MemberExpression {
                object: Box::new(Ir::ident("Object")),
                property: Box::new(Ir::ident("freeze")),
                computed: false,
                pos: None,
            },
            vec![Ir::ObjectExpression {
                properties,
                pos: start_pos(form),
            }],
        );

        Ok(Ir::VariableDeclaration {
            kind: VarKind::Const,
            pattern: Box::new(identifier(name, start_pos(form))),
            init: Some(Box::new(frozen)),
            pos: start_pos(form),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{Ir, MethodKind};
    use crate::reader::read_forms;
    use crate::transform::transform_program;

    fn transform_src(src: &str) -> Vec<Ir> {
        transform_program(&read_forms(src).unwrap()).unwrap()
    }

    #[test]
    fn test_class_with_constructor_and_method() {
        let out = transform_src(
            "(class Point (constructor [x y] (set! this.x x) (set! this.y y)) (norm [] (+ this.x this.y)))",
        );
        match &out[0] {
            Ir::ClassDeclaration { name, methods, .. } => {
                assert_eq!(name, "Point");
                assert_eq!(methods.len(), 2);
                assert_eq!(methods[0].kind, MethodKind::Constructor);
                assert_eq!(methods[1].key, "norm");
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_class_extends() {
        let out = transform_src("(class Dog (extends Animal) (speak [] \"woof\"))");
        match &out[0] {
            Ir::ClassDeclaration { superclass, .. } => assert!(superclass.is_some()),
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_method_body_returns_tail() {
        let out = transform_src("(class A (get-x [] this.x))");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ReturnStatement { .. })));
    }

    #[test]
    fn test_enum_is_frozen_object() {
        let out = transform_src("(enum Color red green blue)");
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::Identifier { name, .. } if name == "freeze"
        )));
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::ObjectExpression { properties, .. } if properties.len() == 3
        )));
    }
}
