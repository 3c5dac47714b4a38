//! Function forms: declarations, expressions, parameter lowering, `return`.

use super::{identifier, mangle, start_pos, Transformer};
use crate::error::HqlError;
use crate::ir::{Ir, VarKind};
use crate::sexp::{ListKind, SExp};

/// Lowered parameter list: the IR params, a prologue of default-value
/// assignments, and the positional names (for the named-argument index map).
pub(crate) struct ParsedParams {
    pub params: Vec<Ir>,
    pub prologue: Vec<Ir>,
    pub names: Vec<String>,
}

impl Transformer {
    pub(crate) fn fn_declaration(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let name = elements[1].as_symbol().ok_or_else(|| {
            HqlError::syntax("fn: name must be a symbol", start_pos(form))
        })?;
        if elements.len() < 3 {
            return Err(HqlError::syntax(
                "fn: expected a parameter list and body",
                start_pos(form),
            ));
        }

        let parsed = self.parse_fn_params(&elements[2])?;
        self.fn_params.insert(name.to_string(), parsed.names.clone());
        self.declare(name, VarKind::Const);

        let body = self.function_body(&parsed, &elements[3..])?;
        Ok(Ir::FunctionDeclaration {
            name: mangle(name),
            params: parsed.params,
            body: Box::new(body),
            is_generator: false,
            is_async: false,
            pos: start_pos(form),
        })
    }

    pub(crate) fn fn_expression(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let (name, params_idx) = match elements.get(1).and_then(SExp::as_symbol) {
            Some(n) => (Some(n), 2),
            None => (None, 1),
        };
        let params_form = elements.get(params_idx).ok_or_else(|| {
            HqlError::syntax("fn: missing parameter list", start_pos(form))
        })?;

        let parsed = self.parse_fn_params(params_form)?;
        if let Some(n) = name {
            self.fn_params.insert(n.to_string(), parsed.names.clone());
        }

        let body = self.function_body(&parsed, &elements[params_idx + 1..])?;
        Ok(Ir::FunctionExpression {
            name: name.map(mangle),
            params: parsed.params,
            body: Box::new(body),
            is_generator: false,
            is_async: false,
            pos: start_pos(form),
        })
    }

    /// Transform a function body with a fresh scope and a reset closure
    /// depth (a `return` directly inside this function is a plain return).
    fn function_body(&mut self, parsed: &ParsedParams, body: &[SExp]) -> Result<Ir, HqlError> {
        let saved_depth = std::mem::replace(&mut self.closure_depth, 0);
        let saved_loops = std::mem::take(&mut self.loop_stack);
        self.push_scope();
        for name in &parsed.names {
            self.declare(name, VarKind::Let);
        }

        let result = self.transform_body(body);

        self.pop_scope();
        self.loop_stack = saved_loops;
        self.closure_depth = saved_depth;

        let mut statements = parsed.prologue.clone();
        statements.extend(result?);
        Ok(Ir::block(statements))
    }

    /// Parse `[a b = 1 & rest]` positional params or `{a 1 b 2}`
    /// config-object params.
    pub(crate) fn parse_fn_params(&mut self, form: &SExp) -> Result<ParsedParams, HqlError> {
        if matches!(
            form,
            SExp::List {
                kind: ListKind::Map,
                ..
            }
        ) || form.head_symbol() == Some("hash-map")
        {
            return self.parse_config_params(form);
        }

        let entries = form.seq_elements().ok_or_else(|| {
            HqlError::syntax("fn: parameter list must be a vector", start_pos(form))
        })?;

        let mut params = Vec::new();
        let mut prologue = Vec::new();
        let mut names = Vec::new();
        let mut i = 0;
        while i < entries.len() {
            let entry = &entries[i];
            let name = entry.as_symbol().ok_or_else(|| {
                HqlError::syntax("fn: parameter must be a symbol", start_pos(entry))
            })?;

            if name == "&" {
                let rest = entries.get(i + 1).and_then(SExp::as_symbol).ok_or_else(|| {
                    HqlError::syntax("fn: & must be followed by a rest parameter", start_pos(form))
                })?;
                params.push(Ir::SpreadElement {
                    argument: Box::new(identifier(rest, start_pos(&entries[i + 1]))),
                    pos: start_pos(&entries[i + 1]),
                });
                names.push(rest.to_string());
                if i + 2 != entries.len() {
                    return Err(HqlError::syntax(
                        "fn: rest parameter must be last",
                        start_pos(form),
                    ));
                }
                break;
            }

            // `name = default` consumes three entries
            if entries.get(i + 1).and_then(SExp::as_symbol) == Some("=") {
                let default = entries.get(i + 2).ok_or_else(|| {
                    HqlError::syntax("fn: missing default value", start_pos(entry))
                })?;
                prologue.push(default_assignment(name, self.transform_expr(default)?));
                i += 2;
            }

            params.push(identifier(name, start_pos(entry)));
            names.push(name.to_string());
            i += 1;
        }

        Ok(ParsedParams {
            params,
            prologue,
            names,
        })
    }

    /// `{k1 d1 k2 d2}` compiles to a function of one destructured object:
    /// the parameter is a fresh options object and each key becomes a
    /// defaulted const in the prologue.
    fn parse_config_params(&mut self, form: &SExp) -> Result<ParsedParams, HqlError> {
        let pairs = form.seq_elements().unwrap_or(&[]);
        if pairs.len() % 2 != 0 {
            return Err(HqlError::syntax(
                "fn: config parameters need key/default pairs",
                start_pos(form),
            ));
        }

        let opts = crate::macros::gensym("opts");
        let mut prologue = Vec::new();
        let mut names = Vec::new();
        for pair in pairs.chunks(2) {
            let key = pair[0].as_symbol().ok_or_else(|| {
                HqlError::syntax("fn: config parameter name must be a symbol", start_pos(&pair[0]))
            })?;
            let access = Ir::MemberExpression {
                object: Box::new(Ir::ident(opts.clone())),
                property: Box::new(Ir::ident(mangle(key))),
                computed: false,
                pos: start_pos(&pair[0]),
            };
            let default = self.transform_expr(&pair[1])?;
            prologue.push(Ir::VariableDeclaration {
                kind: VarKind::Const,
                pattern: Box::new(identifier(key, start_pos(&pair[0]))),
                init: Some(Box::new(null_guarded(access, default))),
                pos: start_pos(&pair[0]),
            });
            names.push(key.to_string());
        }

        Ok(ParsedParams {
            params: vec![Ir::ident(opts)],
            prologue,
            names,
        })
    }

    /// `(return expr?)`. Directly inside a function body this is a plain
    /// return; inside a generated closure it throws the early-return marker
    /// that the optimizer's trampoline catches.
    pub(crate) fn return_stmt(&mut self, form: &SExp) -> Result<Ir, HqlError> {
        let elements = form.as_list().unwrap();
        let value = match elements.get(1) {
            Some(e) => Some(self.transform_expr(e)?),
            None => None,
        };

        if self.closure_depth == 0 {
            return Ok(Ir::ReturnStatement {
                argument: value.map(Box::new),
                pos: start_pos(form),
            });
        }

        let marker = Ir::ObjectExpression {
            properties: vec![
                Ir::ObjectProperty {
                    key: Box::new(Ir::ident("__hql_early_return__")),
                    value: Box::new(Ir::BoolLiteral {
                        value: true,
                        pos: None,
                    }),
                    computed: false,
                    shorthand: false,
                    pos: None,
                },
                Ir::ObjectProperty {
                    key: Box::new(Ir::ident("value")),
                    value: Box::new(value.unwrap_or(Ir::NullLiteral { pos: None })),
                    computed: false,
                    shorthand: false,
                    pos: None,
                },
            ],
            pos: None,
        };
        Ok(Ir::ThrowStatement {
            argument: Box::new(marker),
            pos: start_pos(form),
        })
    }
}

/// `name = name != null ? name : default`
fn default_assignment(name: &str, default: Ir) -> Ir {
    let id = identifier(name, None);
    Ir::expr_stmt(Ir::AssignmentExpression {
        target: Box::new(id.clone()),
        value: Box::new(null_guarded(id, default)),
        pos: None,
    })
}

/// `expr != null ? expr : fallback`
fn null_guarded(expr: Ir, fallback: Ir) -> Ir {
    Ir::ConditionalExpression {
        test: Box::new(Ir::BinaryExpression {
            operator: "!=".to_string(),
            left: Box::new(expr.clone()),
            right: Box::new(Ir::NullLiteral { pos: None }),
            pos: None,
        }),
        consequent: Box::new(expr),
        alternate: Box::new(fallback),
        pos: None,
    }
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
    fn test_named_fn_is_declaration() {
        let out = transform_src("(fn add [a b] (+ a b))");
        match &out[0] {
            Ir::FunctionDeclaration { name, params, .. } => {
                assert_eq!(name, "add");
                assert_eq!(params.len(), 2);
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_anonymous_fn_is_expression() {
        let out = transform_src("((fn [x] x) 1)");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::FunctionExpression { .. })));
    }

    #[test]
    fn test_body_tail_is_returned() {
        let out = transform_src("(fn id [x] x)");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ReturnStatement { .. })));
    }

    #[test]
    fn test_default_param_prologue() {
        let out = transform_src("(fn greet [name = \"world\"] name)");
        // Prologue contains `name = name != null ? name : "world"`
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::AssignmentExpression { .. })));
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ConditionalExpression { .. })));
    }

    #[test]
    fn test_rest_param_is_spread() {
        let out = transform_src("(fn f [a & rest] rest)");
        match &out[0] {
            Ir::FunctionDeclaration { params, .. } => {
                assert_eq!(params.len(), 2);
                assert!(matches!(params[1], Ir::SpreadElement { .. }));
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_config_object_params() {
        let out = transform_src("(fn connect {host \"localhost\" port 80} host)");
        match &out[0] {
            Ir::FunctionDeclaration { params, body, .. } => {
                assert_eq!(params.len(), 1);
                // Prologue declares both config keys
                assert!(body.any_node(&mut |n| matches!(
                    n,
                    Ir::VariableDeclaration { pattern, .. }
                    if matches!(pattern.as_ref(), Ir::Identifier { name, .. } if name == "host")
                )));
                assert!(body.any_node(&mut |n| matches!(
                    n,
                    Ir::VariableDeclaration { pattern, .. }
                    if matches!(pattern.as_ref(), Ir::Identifier { name, .. } if name == "port")
                )));
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_named_argument_reordering() {
        let out = transform_src("(fn f [a b] a) (f b: 2 a: 1)");
        match &out[1] {
            Ir::ExpressionStatement { expression, .. } => match expression.as_ref() {
                Ir::CallExpression { arguments, .. } => {
                    assert!(matches!(&arguments[0], Ir::NumericLiteral { value, .. } if *value == 1.0));
                    assert!(matches!(&arguments[1], Ir::NumericLiteral { value, .. } if *value == 2.0));
                }
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_return_at_fn_top_level() {
        let out = transform_src("(fn f [x] (return x) nil)");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ReturnStatement { .. })));
        assert!(!out[0].any_node(&mut |n| matches!(n, Ir::ThrowStatement { .. })));
    }

    #[test]
    fn test_tail_if_keeps_statement_structure() {
        let out = transform_src("(fn f [n] (if (> n 0) 1 2))");
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::IfStatement { .. })));
    }
}
