//! Conditional forms: `if cond when unless when-let if-let switch match`.
//!
//! `when`/`unless`/`when-let`/`if-let`/`switch` desugar to `if`/`let`
//! combinations at the AST level and re-enter the transformer; `match`
//! lowers to an IIFE of guarded pattern checks.

use super::{identifier, start_pos, Transformer};
use crate::error::HqlError;
use crate::ir::{Ir, VarKind};
use crate::macros::gensym;
use crate::sexp::{ListKind, SExp};
use crate::source::Position;

impl Transformer {
    pub(crate) fn if_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() < 3 || elements.len() > 4 {
            return Err(HqlError::arity_error(
                "if",
                crate::error::ARITY_TWO_OR_THREE,
                elements.len() - 1,
            ));
        }
        let test = self.transform_expr(&elements[1])?;
        let consequent = self.transform_expr(&elements[2])?;
        let alternate = match elements.get(3) {
            Some(alt) => self.transform_expr(alt)?,
            None => Ir::NullLiteral { pos: None },
        };
        Ok(Ir::ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            pos: start_pos(form),
        })
    }

    pub(crate) fn if_stmt(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() < 3 || elements.len() > 4 {
            return Err(HqlError::arity_error(
                "if",
                crate::error::ARITY_TWO_OR_THREE,
                elements.len() - 1,
            ));
        }
        let test = self.transform_expr(&elements[1])?;
        let consequent = self.transform_stmt(&elements[2])?;
        let alternate = match elements.get(3) {
            Some(alt) => Some(Box::new(self.transform_stmt(alt)?)),
            None => None,
        };
        Ok(Ir::IfStatement {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate,
            pos: start_pos(form),
        })
    }

    /// `cond` in expression position nests conditional expressions.
    pub(crate) fn cond_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        self.cond_expr_clauses(&elements[1..], start_pos(form))
    }

    fn cond_expr_clauses(
        &mut self,
        clauses: &[SExp],
        pos: Option<Position>,
    ) -> Result<Ir, HqlError> {
        let clause = match clauses.first() {
            Some(c) => c,
            None => return Ok(Ir::NullLiteral { pos }),
        };
        let items = clause.as_list().ok_or_else(|| {
            HqlError::syntax("cond: clause must be a list", start_pos(clause))
        })?;
        if items.is_empty() {
            return Err(HqlError::syntax(
                "cond: clause cannot be empty",
                start_pos(clause),
            ));
        }

        let body = self.clause_value(&items[1..], start_pos(clause))?;
        if items[0].is_symbol("else") {
            return Ok(body);
        }
        let test = self.transform_expr(&items[0])?;
        let rest = self.cond_expr_clauses(&clauses[1..], pos)?;
        Ok(Ir::ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(body),
            alternate: Box::new(rest),
            pos,
        })
    }

    fn clause_value(&mut self, body: &[SExp], pos: Option<Position>) -> Result<Ir, HqlError> {
        match body.len() {
            0 => Ok(Ir::NullLiteral { pos }),
            1 => self.transform_expr(&body[0]),
            _ => self.body_iife(body, pos),
        }
    }

    /// `cond` in tail position stays statement-shaped so tail calls inside
    /// clauses remain visible.
    pub(crate) fn cond_tail(
        &mut self,
        clauses: &[SExp],
        pos: Option<Position>,
    ) -> Result<Vec<Ir>, HqlError> {
        let mut out = Vec::new();
        for clause in clauses {
            let items = clause.as_list().ok_or_else(|| {
                HqlError::syntax("cond: clause must be a list", start_pos(clause))
            })?;
            if items.is_empty() {
                return Err(HqlError::syntax(
                    "cond: clause cannot be empty",
                    start_pos(clause),
                ));
            }
            let mut body = Vec::new();
            if items.len() > 1 {
                for stmt in &items[1..items.len() - 1] {
                    body.push(self.transform_stmt(stmt)?);
                }
                body.extend(self.transform_tail(&items[items.len() - 1])?);
            } else {
                body.push(Ir::ReturnStatement {
                    argument: Some(Box::new(Ir::NullLiteral { pos: None })),
                    pos: None,
                });
            }

            if items[0].is_symbol("else") {
                out.extend(body);
                return Ok(out);
            }
            let test = self.transform_expr(&items[0])?;
            out.push(Ir::IfStatement {
                test: Box::new(test),
                consequent: Box::new(Ir::block(body)),
                alternate: None,
                pos,
            });
        }
        out.push(Ir::ReturnStatement {
            argument: Some(Box::new(Ir::NullLiteral { pos: None })),
            pos: None,
        });
        Ok(out)
    }

    /// Desugar `when`/`unless`/`when-let`/`if-let`/`switch` into `if`/`let`
    /// combinations, returning a form the transformer re-enters.
    pub(crate) fn desugar_conditional(&mut self, form: &SExp) -> Result<SExp, HqlError> {
        let elements = form.as_list().unwrap();
        let head = elements[0].as_symbol().unwrap();
        let pos = start_pos(form);

        match head {
            "when" => {
                if elements.len() < 3 {
                    return Err(HqlError::syntax("when: expected a test and a body", pos));
                }
                let mut body = vec![SExp::symbol("do")];
                body.extend_from_slice(&elements[2..]);
                Ok(SExp::list(vec![
                    SExp::symbol("if"),
                    elements[1].clone(),
                    SExp::list(body),
                ]))
            }
            "unless" => {
                if elements.len() < 3 {
                    return Err(HqlError::syntax("unless: expected a test and a body", pos));
                }
                let mut body = vec![SExp::symbol("do")];
                body.extend_from_slice(&elements[2..]);
                Ok(SExp::list(vec![
                    SExp::symbol("if"),
                    SExp::list(vec![SExp::symbol("not"), elements[1].clone()]),
                    SExp::list(body),
                ]))
            }
            "when-let" => {
                let (name, value) = binding_pair(form, &elements, "when-let")?;
                let mut body = vec![SExp::symbol("do")];
                body.extend_from_slice(&elements[2..]);
                Ok(SExp::list(vec![
                    SExp::symbol("let"),
                    SExp::vector(vec![name.clone(), value]),
                    SExp::list(vec![SExp::symbol("if"), name, SExp::list(body)]),
                ]))
            }
            "if-let" => {
                let (name, value) = binding_pair(form, &elements, "if-let")?;
                let mut branch = vec![
                    SExp::symbol("if"),
                    name.clone(),
                    elements
                        .get(2)
                        .cloned()
                        .ok_or_else(|| HqlError::syntax("if-let: missing then branch", pos))?,
                ];
                if let Some(alt) = elements.get(3) {
                    branch.push(alt.clone());
                }
                Ok(SExp::list(vec![
                    SExp::symbol("let"),
                    SExp::vector(vec![name, value]),
                    SExp::list(branch),
                ]))
            }
            "switch" => {
                if elements.len() < 2 {
                    return Err(HqlError::syntax("switch: expected a subject", pos));
                }
                let subject = SExp::symbol(gensym("switch"));
                let mut clauses = vec![SExp::symbol("cond")];
                for clause in &elements[2..] {
                    let items = clause.as_list().ok_or_else(|| {
                        HqlError::syntax("switch: clause must be a list", start_pos(clause))
                    })?;
                    match items.first().and_then(SExp::as_symbol) {
                        Some("case") if items.len() >= 2 => {
                            let mut c = vec![SExp::list(vec![
                                SExp::symbol("==="),
                                subject.clone(),
                                items[1].clone(),
                            ])];
                            c.extend_from_slice(&items[2..]);
                            clauses.push(SExp::list(c));
                        }
                        Some("default") => {
                            let mut c = vec![SExp::symbol("else")];
                            c.extend_from_slice(&items[1..]);
                            clauses.push(SExp::list(c));
                        }
                        _ => {
                            return Err(HqlError::syntax(
                                "switch: expected (case value …) or (default …)",
                                start_pos(clause),
                            ));
                        }
                    }
                }
                Ok(SExp::list(vec![
                    SExp::symbol("let"),
                    SExp::vector(vec![subject, elements[1].clone()]),
                    SExp::list(clauses),
                ]))
            }
            _ => unreachable!("desugar_conditional called for {}", head),
        }
    }

    // ===== match =====

    /// `(match subject (case pattern (if guard)? result…)… (default …)?)`
    /// lowers to a chain of guarded checks inside an IIFE taking the
    /// subject once.
    pub(crate) fn match_expr(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        if elements.len() < 2 {
            return Err(HqlError::syntax("match: expected a subject", start_pos(form)));
        }
        let subject_expr = self.transform_expr(&elements[1])?;
        let subject = gensym("match");

        self.closure_depth += 1;
        self.push_scope();
        let body = self.match_clauses(&subject, &elements[2..]);
        self.pop_scope();
        self.closure_depth -= 1;
        let body = body?;

        Ok(Ir::CallExpression {
            callee: Box::new(Ir::FunctionExpression {
                name: None,
                params: vec![Ir::ident(subject)],
                body: Box::new(Ir::block(body)),
                is_generator: false,
                is_async: false,
                pos: None,
            }),
            arguments: vec![subject_expr],
            pos: start_pos(form),
        })
    }

    fn match_clauses(&mut self, subject: &str, clauses: &[SExp]) -> Result<Vec<Ir>, HqlError> {
        let mut out = Vec::new();
        for clause in clauses {
            let items = clause.as_list().ok_or_else(|| {
                HqlError::syntax("match: clause must be a list", start_pos(clause))
            })?;
            match items.first().and_then(SExp::as_symbol) {
                Some("case") if items.len() >= 2 => {
                    out.extend(self.match_case(subject, &items[1], &items[2..])?);
                }
                Some("default") => {
                    out.extend(self.transform_body(&items[1..])?);
                    return Ok(out);
                }
                _ => {
                    return Err(HqlError::syntax(
                        "match: expected (case pattern …) or (default …)",
                        start_pos(clause),
                    ));
                }
            }
        }
        out.push(Ir::ReturnStatement {
            argument: Some(Box::new(Ir::NullLiteral { pos: None })),
            pos: None,
        });
        Ok(out)
    }

    fn match_case(
        &mut self,
        subject: &str,
        pattern: &SExp,
        rest: &[SExp],
    ) -> Result<Vec<Ir>, HqlError> {
        // A guard is exactly `(if expr)` right after the pattern
        let (guard, results) = match rest.first() {
            Some(first)
                if first.head_symbol() == Some("if")
                    && first.as_list().map(|l| l.len()) == Some(2) =>
            {
                let guard_expr = &first.as_list().unwrap()[1];
                (Some(guard_expr.clone()), &rest[1..])
            }
            _ => (None, rest),
        };

        let subject_ir = Ir::ident(subject);
        match pattern {
            // Literal pattern: strict equality
            SExp::Literal { .. } => {
                let lit = self.transform_expr(pattern)?;
                let test = Ir::BinaryExpression {
                    operator: "===".to_string(),
                    left: Box::new(subject_ir),
                    right: Box::new(lit),
                    pos: start_pos(pattern),
                };
                let body = self.guarded_body(guard.as_ref(), vec![], results)?;
                Ok(vec![Ir::IfStatement {
                    test: Box::new(test),
                    consequent: Box::new(Ir::block(body)),
                    alternate: None,
                    pos: start_pos(pattern),
                }])
            }

            // Binding pattern: always matches, subject bound to the name
            SExp::Symbol { name, .. } => {
                self.declare(name, VarKind::Const);
                let binding = Ir::VariableDeclaration {
                    kind: VarKind::Const,
                    pattern: Box::new(identifier(name, start_pos(pattern))),
                    init: Some(Box::new(subject_ir)),
                    pos: start_pos(pattern),
                };
                let body = self.guarded_body(guard.as_ref(), vec![binding], results)?;
                // Wrapped in a block so the const stays clause-scoped
                Ok(vec![Ir::BlockStatement {
                    body,
                    pos: start_pos(pattern),
                }])
            }

            // Array destructuring with optional rest
            SExp::List {
                kind: ListKind::Vector,
                elements,
                ..
            } => {
                let entries = &elements[1..];
                let (names, rest_name) = destructure_names(entries, pattern)?;
                let min_len = names.len();
                for n in names.iter().chain(rest_name.iter()) {
                    self.declare(n, VarKind::Const);
                }

                let mut test = Ir::call(
                    Ir::MemberExpression {
                        object: Box::new(Ir::ident("Array")),
                        property: Box::new(Ir::ident("isArray")),
                        computed: false,
                        pos: None,
                    },
                    vec![subject_ir.clone()],
                );
                let len_check = Ir::BinaryExpression {
                    operator: if rest_name.is_some() { ">=" } else { "===" }.to_string(),
                    left: Box::new(Ir::MemberExpression {
                        object: Box::new(subject_ir.clone()),
                        property: Box::new(Ir::ident("length")),
                        computed: false,
                        pos: None,
                    }),
                    right: Box::new(Ir::num(min_len as f64)),
                    pos: None,
                };
                test = Ir::BinaryExpression {
                    operator: "&&".to_string(),
                    left: Box::new(test),
                    right: Box::new(len_check),
                    pos: None,
                };

                let destructure = Ir::VariableDeclaration {
                    kind: VarKind::Const,
                    pattern: Box::new(Ir::ArrayPattern {
                        elements: names.iter().map(|n| identifier(n, None)).collect(),
                        rest: rest_name
                            .as_ref()
                            .map(|n| Box::new(identifier(n, None))),
                        pos: start_pos(pattern),
                    }),
                    init: Some(Box::new(subject_ir)),
                    pos: start_pos(pattern),
                };
                let body = self.guarded_body(guard.as_ref(), vec![destructure], results)?;
                Ok(vec![Ir::IfStatement {
                    test: Box::new(test),
                    consequent: Box::new(Ir::block(body)),
                    alternate: None,
                    pos: start_pos(pattern),
                }])
            }

            // Object destructuring: key/binding pairs, checked through the
            // runtime helper
            SExp::List {
                kind: ListKind::Map,
                elements,
                ..
            } => {
                let pairs = &elements[1..];
                let mut properties = Vec::new();
                let mut keys = Vec::new();
                for pair in pairs.chunks(2) {
                    let key = pair[0].as_symbol().ok_or_else(|| {
                        HqlError::syntax(
                            "match: object pattern key must be a symbol",
                            start_pos(&pair[0]),
                        )
                    })?;
                    let local = pair
                        .get(1)
                        .and_then(SExp::as_symbol)
                        .unwrap_or(key);
                    self.declare(local, VarKind::Const);
                    keys.push(Ir::string(key));
                    properties.push((key.to_string(), super::mangle(local)));
                }

                let test = Ir::call(
                    Ir::ident("__hql_match_obj"),
                    vec![
                        subject_ir.clone(),
                        Ir::ArrayExpression {
                            elements: keys,
                            pos: None,
                        },
                    ],
                );
                let destructure = Ir::VariableDeclaration {
                    kind: VarKind::Const,
                    pattern: Box::new(Ir::ObjectPattern {
                        properties,
                        rest: None,
                        pos: start_pos(pattern),
                    }),
                    init: Some(Box::new(subject_ir)),
                    pos: start_pos(pattern),
                };
                let body = self.guarded_body(guard.as_ref(), vec![destructure], results)?;
                Ok(vec![Ir::IfStatement {
                    test: Box::new(test),
                    consequent: Box::new(Ir::block(body)),
                    alternate: None,
                    pos: start_pos(pattern),
                }])
            }

            other => Err(HqlError::syntax(
                "match: unsupported pattern",
                start_pos(other),
            )),
        }
    }

    /// Bindings, then either an unconditional tail body or one nested under
    /// the guard (fall through to the next clause when the guard fails).
    fn guarded_body(
        &mut self,
        guard: Option<&SExp>,
        bindings: Vec<Ir>,
        results: &[SExp],
    ) -> Result<Vec<Ir>, HqlError> {
        let mut out = bindings;
        let result_stmts = self.transform_body(results)?;
        match guard {
            None => out.extend(result_stmts),
            Some(g) => {
                let test = self.transform_expr(g)?;
                out.push(Ir::IfStatement {
                    test: Box::new(test),
                    consequent: Box::new(Ir::block(result_stmts)),
                    alternate: None,
                    pos: None,
                });
            }
        }
        Ok(out)
    }
}

fn binding_pair(
    form: &SExp,
    elements: &[SExp],
    head: &str,
) -> Result<(SExp, SExp), HqlError> {
    let pair = elements
        .get(1)
        .and_then(SExp::seq_elements)
        .filter(|p| p.len() == 2)
        .ok_or_else(|| {
            HqlError::syntax(
                format!("{}: expected [name value] binding", head),
                start_pos(form),
            )
        })?;
    Ok((pair[0].clone(), pair[1].clone()))
}

fn destructure_names(
    entries: &[SExp],
    pattern: &SExp,
) -> Result<(Vec<String>, Option<String>), HqlError> {
    let mut names = Vec::new();
    let mut rest = None;
    let mut iter = entries.iter();
    while let Some(entry) = iter.next() {
        let name = entry.as_symbol().ok_or_else(|| {
            HqlError::syntax(
                "match: array pattern entries must be symbols",
                start_pos(pattern),
            )
        })?;
        if name == "&" {
            let r = iter.next().and_then(SExp::as_symbol).ok_or_else(|| {
                HqlError::syntax("match: & must be followed by a name", start_pos(pattern))
            })?;
            rest = Some(r.to_string());
            break;
        }
        names.push(name.to_string());
    }
    Ok((names, rest))
}

#[cfg(test)]
mod tests {
    use crate::ir::Ir;
    use crate::reader::read_forms;
    use crate::transform::transform_program;

    fn transform_src(src: &str) -> Vec<Ir> {
        transform_program(&read_forms(src).unwrap()).unwrap()
    }

    #[test]
    fn test_if_expression_is_conditional() {
        let out = transform_src("(f (if a 1 2))");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ConditionalExpression { .. })));
    }

    #[test]
    fn test_when_desugars_to_if() {
        let out = transform_src("(g (when a 1))");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ConditionalExpression { .. })));
    }

    #[test]
    fn test_unless_negates() {
        let out = transform_src("(g (unless a 1))");
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::UnaryExpression { operator, .. } if operator == "!"
        )));
    }

    #[test]
    fn test_if_let_binds_then_tests() {
        let out = transform_src("(g (if-let [x (lookup)] x 0))");
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::VariableDeclaration { pattern, .. }
            if matches!(pattern.as_ref(), Ir::Identifier { name, .. } if name == "x")
        )));
    }

    #[test]
    fn test_switch_desugars_to_strict_equality() {
        let out = transform_src("(g (switch n (case 1 \"one\") (default \"many\")))");
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::BinaryExpression { operator, .. } if operator == "==="
        )));
    }

    #[test]
    fn test_match_literal_and_guard() {
        let out = transform_src(
            "(match 10 (case x (if (> x 0)) \"positive\") (case x (if (< x 0)) \"negative\") (default \"zero\"))",
        );
        // IIFE with guard chains
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::FunctionExpression { .. })));
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::BinaryExpression { operator, .. } if operator == ">"
        )));
    }

    #[test]
    fn test_match_array_pattern() {
        let out = transform_src("(match v (case [a b] (+ a b)) (default 0))");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ArrayPattern { .. })));
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::Identifier { name, .. } if name == "isArray"
        )));
    }

    #[test]
    fn test_match_object_pattern_uses_runtime_helper() {
        let out = transform_src("(match v (case {x a y b} (+ a b)) (default 0))");
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::Identifier { name, .. } if name == "__hql_match_obj"
        )));
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ObjectPattern { .. })));
    }

    #[test]
    fn test_cond_in_expression() {
        let out = transform_src("(g (cond ((> a 1) \"big\") (else \"small\")))");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ConditionalExpression { .. })));
    }
}
