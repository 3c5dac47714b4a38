// ABOUTME: IR optimizer: tail-call elimination and early-return lowering

use crate::config::CancelToken;
use crate::error::HqlError;
use crate::ir::Ir;
use crate::macros::gensym;

/// Run every pass over a program. Nested functions are processed bottom-up
/// so early-return trampolines land on the innermost function that owns
/// the marker.
pub fn optimize_program(program: Vec<Ir>, cancel: &CancelToken) -> Result<Vec<Ir>, HqlError> {
    verify_no_threading_residue(&program)?;
    program
        .into_iter()
        .map(|stmt| {
            if cancel.is_cancelled() {
                return Err(HqlError::Cancelled);
            }
            Ok(optimize_node(stmt))
        })
        .collect()
}

/// Threading forms are fully lowered by the transformer; any residue here
/// is a compiler bug, not a user error.
fn verify_no_threading_residue(program: &[Ir]) -> Result<(), HqlError> {
    for stmt in program {
        let found = stmt.any_node(&mut |n| {
            matches!(
                n,
                Ir::Identifier { original: Some(orig), .. }
                if orig == "->" || orig == "->>" || orig == "as->"
            )
        });
        if found {
            return Err(HqlError::internal(
                "optimizer",
                "threading form survived transformation",
            ));
        }
    }
    Ok(())
}

/// Rewrite one node, recursing into children first.
fn optimize_node(node: Ir) -> Ir {
    let node = map_children(node, optimize_node);
    match node {
        Ir::FunctionDeclaration {
            name,
            params,
            body,
            is_generator,
            is_async,
            pos,
        } => {
            // Bottom-up: optimize nested functions inside the body first
            let body = optimize_node(*body);
            let body = apply_tco(&name, &params, body);
            let body = apply_early_return(body);
            Ir::FunctionDeclaration {
                name,
                params,
                body: Box::new(body),
                is_generator,
                is_async,
                pos,
            }
        }
        Ir::FunctionExpression {
            name,
            params,
            body,
            is_generator,
            is_async,
            pos,
        } => {
            let body = optimize_node(*body);
            let body = match &name {
                Some(n) => apply_tco(n, &params, body),
                None => body,
            };
            let body = apply_early_return(body);
            Ir::FunctionExpression {
                name,
                params,
                body: Box::new(body),
                is_generator,
                is_async,
                pos,
            }
        }
        other => other,
    }
}

/// Rebuild a node with every child mapped.
fn map_children(node: Ir, f: fn(Ir) -> Ir) -> Ir {
    macro_rules! m {
        ($e:expr) => {
            Box::new(f(*$e))
        };
    }
    match node {
        Ir::ArrayExpression { elements, pos } => Ir::ArrayExpression {
            elements: elements.into_iter().map(f).collect(),
            pos,
        },
        Ir::ObjectExpression { properties, pos } => Ir::ObjectExpression {
            properties: properties.into_iter().map(f).collect(),
            pos,
        },
        Ir::ObjectProperty {
            key,
            value,
            computed,
            shorthand,
            pos,
        } => Ir::ObjectProperty {
            key: m!(key),
            value: m!(value),
            computed,
            shorthand,
            pos,
        },
        Ir::MemberExpression {
            object,
            property,
            computed,
            pos,
        } => Ir::MemberExpression {
            object: m!(object),
            property: m!(property),
            computed,
            pos,
        },
        Ir::CallExpression {
            callee,
            arguments,
            pos,
        } => Ir::CallExpression {
            callee: m!(callee),
            arguments: arguments.into_iter().map(f).collect(),
            pos,
        },
        Ir::NewExpression {
            callee,
            arguments,
            pos,
        } => Ir::NewExpression {
            callee: m!(callee),
            arguments: arguments.into_iter().map(f).collect(),
            pos,
        },
        Ir::BinaryExpression {
            operator,
            left,
            right,
            pos,
        } => Ir::BinaryExpression {
            operator,
            left: m!(left),
            right: m!(right),
            pos,
        },
        Ir::UnaryExpression {
            operator,
            argument,
            pos,
        } => Ir::UnaryExpression {
            operator,
            argument: m!(argument),
            pos,
        },
        Ir::AssignmentExpression { target, value, pos } => Ir::AssignmentExpression {
            target: m!(target),
            value: m!(value),
            pos,
        },
        Ir::ConditionalExpression {
            test,
            consequent,
            alternate,
            pos,
        } => Ir::ConditionalExpression {
            test: m!(test),
            consequent: m!(consequent),
            alternate: m!(alternate),
            pos,
        },
        Ir::IfStatement {
            test,
            consequent,
            alternate,
            pos,
        } => Ir::IfStatement {
            test: m!(test),
            consequent: m!(consequent),
            alternate: alternate.map(|a| Box::new(f(*a))),
            pos,
        },
        Ir::BlockStatement { body, pos } => Ir::BlockStatement {
            body: body.into_iter().map(f).collect(),
            pos,
        },
        Ir::ExpressionStatement { expression, pos } => Ir::ExpressionStatement {
            expression: m!(expression),
            pos,
        },
        Ir::ReturnStatement { argument, pos } => Ir::ReturnStatement {
            argument: argument.map(|a| Box::new(f(*a))),
            pos,
        },
        Ir::ThrowStatement { argument, pos } => Ir::ThrowStatement {
            argument: m!(argument),
            pos,
        },
        Ir::TryStatement {
            block,
            handler_param,
            handler,
            finalizer,
            pos,
        } => Ir::TryStatement {
            block: m!(block),
            handler_param,
            handler: handler.map(|h| Box::new(f(*h))),
            finalizer: finalizer.map(|h| Box::new(f(*h))),
            pos,
        },
        Ir::WhileStatement { test, body, pos } => Ir::WhileStatement {
            test: m!(test),
            body: m!(body),
            pos,
        },
        Ir::ForOfStatement {
            kind,
            pattern,
            right,
            body,
            pos,
        } => Ir::ForOfStatement {
            kind,
            pattern: m!(pattern),
            right: m!(right),
            body: m!(body),
            pos,
        },
        Ir::VariableDeclaration {
            kind,
            pattern,
            init,
            pos,
        } => Ir::VariableDeclaration {
            kind,
            pattern: m!(pattern),
            init: init.map(|i| Box::new(f(*i))),
            pos,
        },
        Ir::SpreadElement { argument, pos } => Ir::SpreadElement {
            argument: m!(argument),
            pos,
        },
        Ir::TemplateLiteral { parts, pos } => Ir::TemplateLiteral {
            parts: parts
                .into_iter()
                .map(|p| match p {
                    crate::ir::TemplatePiece::Expr(e) => crate::ir::TemplatePiece::Expr(f(e)),
                    text => text,
                })
                .collect(),
            pos,
        },
        Ir::ClassDeclaration {
            name,
            superclass,
            methods,
            pos,
        } => Ir::ClassDeclaration {
            name,
            superclass: superclass.map(|s| Box::new(f(*s))),
            methods: methods
                .into_iter()
                .map(|mut method| {
                    method.body = Box::new(f(*method.body));
                    method
                })
                .collect(),
            pos,
        },
        // Functions are handled by optimize_node after children; leaves
        // pass through
        other => other,
    }
}

// ============================================================================
// Tail-call elimination
// ============================================================================

/// Rewrite a self-tail-recursive function body into `while (true)` with
/// parameter rebinding. Functions where any recursive call is not in tail
/// position are left untouched.
fn apply_tco(name: &str, params: &[Ir], body: Ir) -> Ir {
    let param_names: Option<Vec<String>> = params
        .iter()
        .map(|p| match p {
            Ir::Identifier { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    // Rest or destructured params rule the rewrite out
    let param_names = match param_names {
        Some(n) => n,
        None => return body,
    };

    let total = count_self_calls(&body, name);
    if total == 0 {
        return body;
    }
    let tail = count_tail_calls(&body, name, param_names.len());
    if tail != total {
        return body;
    }

    let rewritten = rewrite_stmt(body, name, &param_names);
    Ir::block(vec![Ir::WhileStatement {
        test: Box::new(Ir::BoolLiteral {
            value: true,
            pos: None,
        }),
        body: Box::new(rewritten),
        pos: None,
    }])
}

fn is_self_call(node: &Ir, name: &str) -> bool {
    matches!(
        node,
        Ir::CallExpression { callee, .. }
        if matches!(callee.as_ref(), Ir::Identifier { name: n, .. } if n == name)
    )
}

fn count_self_calls(node: &Ir, name: &str) -> usize {
    let mut count = usize::from(is_self_call(node, name));
    node.for_each_child(&mut |child| {
        count += count_self_calls(child, name);
    });
    count
}

/// Count self-calls in rewritable tail position: `return f(…)` with
/// matching arity, reachable through block and if-statement structure only.
fn count_tail_calls(stmt: &Ir, name: &str, arity: usize) -> usize {
    match stmt {
        Ir::BlockStatement { body, .. } => {
            body.iter().map(|s| count_tail_calls(s, name, arity)).sum()
        }
        Ir::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            count_tail_calls(consequent, name, arity)
                + alternate
                    .as_ref()
                    .map(|a| count_tail_calls(a, name, arity))
                    .unwrap_or(0)
        }
        Ir::ReturnStatement {
            argument: Some(arg),
            ..
        } => match arg.as_ref() {
            Ir::CallExpression { arguments, .. }
                if is_self_call(arg, name) && arguments.len() == arity =>
            {
                1
            }
            _ => 0,
        },
        _ => 0,
    }
}

/// Replace `return f(a1, …, aN)` with temporaries, rebinding, `continue`.
/// Arguments evaluate into temporaries first so later assignments cannot
/// alias earlier parameters.
fn rewrite_stmt(stmt: Ir, name: &str, params: &[String]) -> Ir {
    match stmt {
        Ir::BlockStatement { body, pos } => {
            let mut out = Vec::with_capacity(body.len());
            for s in body {
                match try_rewrite_return(s, name, params) {
                    Ok(mut seq) => out.append(&mut seq),
                    Err(s) => out.push(rewrite_stmt(s, name, params)),
                }
            }
            Ir::BlockStatement { body: out, pos }
        }
        Ir::IfStatement {
            test,
            consequent,
            alternate,
            pos,
        } => Ir::IfStatement {
            test,
            consequent: Box::new(rewrite_stmt(*consequent, name, params)),
            alternate: alternate.map(|a| Box::new(rewrite_stmt(*a, name, params))),
            pos,
        },
        other => other,
    }
}

/// Ok(rewritten sequence) when the statement is a tail self-call return;
/// Err(original) otherwise.
fn try_rewrite_return(stmt: Ir, name: &str, params: &[String]) -> Result<Vec<Ir>, Ir> {
    let is_match = matches!(
        &stmt,
        Ir::ReturnStatement { argument: Some(arg), .. }
        if is_self_call(arg, name)
            && matches!(arg.as_ref(), Ir::CallExpression { arguments, .. } if arguments.len() == params.len())
    );
    if !is_match {
        return Err(stmt);
    }

    let arguments = match stmt {
        Ir::ReturnStatement {
            argument: Some(arg),
            ..
        } => match *arg {
            Ir::CallExpression { arguments, .. } => arguments,
            _ => unreachable!("checked above"),
        },
        _ => unreachable!("checked above"),
    };

    let mut out = Vec::with_capacity(params.len() * 2 + 1);
    let mut temps = Vec::with_capacity(params.len());
    for arg in arguments {
        let temp = gensym("tco");
        out.push(Ir::VariableDeclaration {
            kind: crate::ir::VarKind::Const,
            pattern: Box::new(Ir::ident(temp.clone())),
            init: Some(Box::new(arg)),
            pos: None,
        });
        temps.push(temp);
    }
    for (param, temp) in params.iter().zip(temps) {
        out.push(Ir::expr_stmt(Ir::AssignmentExpression {
            target: Box::new(Ir::ident(param.clone())),
            value: Box::new(Ir::ident(temp)),
            pos: None,
        }));
    }
    out.push(Ir::ContinueStatement { pos: None });
    Ok(out)
}

// ============================================================================
// Early-return lowering
// ============================================================================

fn is_marker_throw(node: &Ir) -> bool {
    matches!(
        node,
        Ir::ThrowStatement { argument, .. }
        if matches!(
            argument.as_ref(),
            Ir::ObjectExpression { properties, .. }
            if properties.iter().any(|p| matches!(
                p,
                Ir::ObjectProperty { key, .. }
                if matches!(key.as_ref(), Ir::Identifier { name, .. } if name == "__hql_early_return__")
            ))
        )
    )
}

/// Is this body already the trampoline wrap?
fn is_trampoline(body: &Ir) -> bool {
    matches!(
        body,
        Ir::BlockStatement { body, .. }
        if matches!(
            body.first(),
            Some(Ir::TryStatement { handler_param: Some(p), .. }) if p == "__hql_ret__"
        )
    )
}

/// Does this function body contain a marker throw inside a nested closure?
/// Closures that already carry their own trampoline absorb their markers.
fn needs_trampoline(body: &Ir) -> bool {
    fn search(node: &Ir, crossed_function: bool) -> bool {
        if crossed_function && is_marker_throw(node) {
            return true;
        }
        match node {
            Ir::FunctionExpression { body, .. } | Ir::FunctionDeclaration { body, .. } => {
                if is_trampoline(body) {
                    return false;
                }
                let mut found = false;
                node.for_each_child(&mut |child| {
                    if !found && search(child, true) {
                        found = true;
                    }
                });
                found
            }
            _ => {
                let mut found = false;
                node.for_each_child(&mut |child| {
                    if !found && search(child, crossed_function) {
                        found = true;
                    }
                });
                found
            }
        }
    }
    search(body, false)
}

/// Wrap a function body in the early-return trampoline:
///
/// ```text
/// try { <body> }
/// catch (__hql_ret__) {
///   if (__hql_ret__ && __hql_ret__.__hql_early_return__) return __hql_ret__.value;
///   else throw __hql_ret__;
/// }
/// ```
fn apply_early_return(body: Ir) -> Ir {
    if !needs_trampoline(&body) {
        return body;
    }

    let ret = Ir::ident("__hql_ret__");
    let marker_check = Ir::BinaryExpression {
        operator: "&&".to_string(),
        left: Box::new(ret.clone()),
        right: Box::new(Ir::MemberExpression {
            object: Box::new(ret.clone()),
            property: Box::new(Ir::ident("__hql_early_return__")),
            computed: false,
            pos: None,
        }),
        pos: None,
    };
    let handler = Ir::block(vec![Ir::IfStatement {
        test: Box::new(marker_check),
        consequent: Box::new(Ir::block(vec![Ir::ret(Ir::MemberExpression {
            object: Box::new(ret.clone()),
            property: Box::new(Ir::ident("value")),
            computed: false,
            pos: None,
        })])),
        alternate: Some(Box::new(Ir::block(vec![Ir::ThrowStatement {
            argument: Box::new(ret),
            pos: None,
        }]))),
        pos: None,
    }]);

    Ir::block(vec![Ir::TryStatement {
        block: Box::new(body),
        handler_param: Some("__hql_ret__".to_string()),
        handler: Some(Box::new(handler)),
        finalizer: None,
        pos: None,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_forms;
    use crate::transform::transform_program;

    fn optimize_src(src: &str) -> Vec<Ir> {
        let forms = read_forms(src).unwrap();
        let program = transform_program(&forms).unwrap();
        optimize_program(program, &CancelToken::new()).unwrap()
    }

    fn has_while_true(node: &Ir) -> bool {
        node.any_node(&mut |n| {
            matches!(
                n,
                Ir::WhileStatement { test, .. }
                if matches!(test.as_ref(), Ir::BoolLiteral { value: true, .. })
            )
        })
    }

    #[test]
    fn test_tco_rewrites_tail_recursion() {
        let out =
            optimize_src("(fn fact [n acc] (if (<= n 1) acc (fact (- n 1) (* n acc))))");
        assert!(has_while_true(&out[0]));
        assert!(out[0].any_node(&mut |n| matches!(n, Ir::ContinueStatement { .. })));
        // The recursive call itself is gone
        assert!(!out[0].any_node(&mut |n| is_self_call(n, "fact")));
    }

    #[test]
    fn test_tco_leaves_non_tail_recursion_alone() {
        let out = optimize_src("(fn fact [n] (if (<= n 1) 1 (* n (fact (- n 1)))))");
        assert!(!has_while_true(&out[0]));
        assert!(out[0].any_node(&mut |n| is_self_call(n, "fact")));
    }

    #[test]
    fn test_tco_preserves_argument_order_with_temps() {
        let out = optimize_src("(fn swap [a b] (if a (swap b a) b))");
        // Both arguments land in temporaries before either param updates
        let mut temp_count = 0;
        out[0].any_node(&mut |n| {
            if matches!(
                n,
                Ir::VariableDeclaration { pattern, .. }
                if matches!(pattern.as_ref(), Ir::Identifier { name, .. } if name.contains("tco"))
            ) {
                temp_count += 1;
            }
            false
        });
        assert_eq!(temp_count, 2);
    }

    #[test]
    fn test_tco_skips_arity_mismatch() {
        // Recursive call with the wrong arity cannot be rewritten
        let out = optimize_src("(fn f [a b] (if a (f a) b))");
        assert!(!has_while_true(&out[0]));
    }

    #[test]
    fn test_early_return_trampoline() {
        let out = optimize_src("(fn find [xs] (for-of [x xs] (if (> x 10) (return x))) nil)");
        assert!(out[0].any_node(&mut |n| matches!(
            n,
            Ir::TryStatement { handler_param: Some(p), .. } if p == "__hql_ret__"
        )));
    }

    #[test]
    fn test_no_trampoline_without_early_return() {
        let out = optimize_src("(fn add [a b] (+ a b))");
        assert!(!out[0].any_node(&mut |n| matches!(n, Ir::TryStatement { .. })));
    }

    #[test]
    fn test_trampoline_not_duplicated_on_outer_fn() {
        // The inner fn owns the early return; the outer fn must not wrap
        let out = optimize_src(
            "(fn outer [xs] (fn inner [ys] (for-of [y ys] (if y (return y))) nil) (inner xs))",
        );
        let mut try_count = 0;
        out[0].any_node(&mut |n| {
            if matches!(n, Ir::TryStatement { .. }) {
                try_count += 1;
            }
            false
        });
        assert_eq!(try_count, 1);
    }

    #[test]
    fn test_cancelled_optimize() {
        let forms = read_forms("(+ 1 2)").unwrap();
        let program = transform_program(&forms).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            optimize_program(program, &cancel),
            Err(HqlError::Cancelled)
        ));
    }
}
