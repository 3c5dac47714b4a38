// ABOUTME: End-to-end transpile scenarios exercising the whole pipeline

use hql::pipeline::CompilerContext;
use hql::resolver::MapLoader;
use hql::{transpile, transpile_with_context, HqlError, TranspileOptions};
use std::path::Path;

fn compile(src: &str) -> String {
    transpile(src, &TranspileOptions::default())
        .expect("transpile failed")
        .code
}

// ============================================================================
// Tail-call elimination
// ============================================================================

#[test]
fn factorial_tail_recursive_compiles_to_loop() {
    let code = compile(
        "(fn fact [n acc] (if (<= n 1) acc (fact (- n 1) (* n acc)))) (fact 10 1)",
    );
    assert!(code.contains("function fact(n, acc)"));
    assert!(code.contains("while (true)"));
    assert!(code.contains("continue;"));
    // The recursive call site is rewritten away; only the outer invocation
    // remains
    assert_eq!(code.matches("fact(").count(), 2);
}

#[test]
fn non_tail_recursion_is_left_alone() {
    let code = compile("(fn fact [n] (if (<= n 1) 1 (* n (fact (- n 1)))))");
    assert!(!code.contains("while (true)"));
    assert!(code.contains("n * fact(n - 1)"));
}

// ============================================================================
// Macros and quasiquote
// ============================================================================

#[test]
fn quasiquote_splicing_macro_builds_vector() {
    let code = compile("(macro my-list [& xs] `[~@xs]) (const v (my-list 1 2 3))");
    assert!(code.contains("const v = [1, 2, 3];"));
}

#[test]
fn macro_definitions_leave_no_trace_in_output() {
    let code = compile("(macro twice [x] `(do ~x ~x)) (twice (f))");
    assert!(!code.contains("twice"));
    assert!(!code.contains("macro"));
}

// ============================================================================
// Early return
// ============================================================================

#[test]
fn early_return_through_iteration_callback() {
    let code = compile(
        "(fn find [xs] (for-of [x xs] (if (> x 10) (return x))) nil) (find [1 20 3])",
    );
    // The callback throws the marker; the enclosing function traps it
    assert!(code.contains("__hql_for_each"));
    assert!(code.contains("throw {"));
    assert!(code.contains("try {"));
    assert!(code.contains("catch (__hql_ret__)"));
    assert!(code.contains("return __hql_ret__.value;"));
}

#[test]
fn function_without_early_return_has_no_trampoline() {
    let code = compile("(fn add [a b] (+ a b))");
    assert!(!code.contains("try"));
    assert!(!code.contains("__hql_ret__"));
}

// ============================================================================
// Pattern matching
// ============================================================================

#[test]
fn match_with_guards() {
    let code = compile(
        "(match 10 (case x (if (> x 0)) \"positive\") (case x (if (< x 0)) \"negative\") (default \"zero\"))",
    );
    assert!(code.contains("x > 0"));
    assert!(code.contains("\"positive\""));
    assert!(code.contains("\"zero\""));
    // No JS switch machinery
    assert!(!code.contains("switch"));
}

#[test]
fn match_object_pattern_uses_runtime_helper() {
    let code = compile("(match p (case {x a y b} (+ a b)) (default 0))");
    assert!(code.contains("__hql_match_obj"));
}

// ============================================================================
// Threading macros
// ============================================================================

#[test]
fn thread_last_lowers_to_nested_calls() {
    let code = compile("(->> [1 2 3 4 5] (filter even?) (map inc) (reduce + 0))");
    assert!(!code.contains("->"));
    // reduce(__hql_get_op("+"), 0, map(inc, filter(even_, [...])))
    assert!(code.contains("reduce("));
    assert!(code.contains("map(inc, filter(even_"));
    assert!(code.contains("__hql_get_op(\"+\")"));
}

#[test]
fn thread_first_inserts_as_first_argument() {
    let code = compile("(-> x (f 1) (g 2))");
    assert!(code.contains("g(f(x, 1), 2)"));
}

// ============================================================================
// Immutability
// ============================================================================

#[test]
fn const_reassignment_fails_compilation() {
    let err = transpile("(const x 1) (set! x 2)", &TranspileOptions::default()).unwrap_err();
    assert!(matches!(err, HqlError::ImmutableAssignment { name, .. } if name == "x"));
}

#[test]
fn top_level_composite_const_is_deep_frozen() {
    let code = compile("(const config {\"retries\" 3})");
    assert!(code.contains("__hql_deep_freeze"));
}

// ============================================================================
// Operators as values
// ============================================================================

#[test]
fn operator_argument_becomes_runtime_lookup() {
    let code = compile("(reduce + 0 [1 2 3])");
    assert!(code.contains("__hql_get_op(\"+\")"));
    // The operator is not inlined as a JS binary between the other args
    assert!(code.contains("reduce(__hql_get_op(\"+\"), 0, [1, 2, 3])"));
}

#[test]
fn operator_in_call_position_is_binary() {
    let code = compile("(+ 1 2)");
    assert!(code.contains("1 + 2"));
    assert!(!code.contains("__hql_get_op"));
}

// ============================================================================
// Modules
// ============================================================================

#[test]
fn circular_imports_compile_and_reference_by_name() {
    let mut loader = MapLoader::new();
    loader.insert(
        "/proj/a.hql",
        "(import [g] from \"./b.hql\") (fn f [n] (if (<= n 0) \"done\" (g (- n 1)))) (export [f])",
    );
    loader.insert(
        "/proj/b.hql",
        "(import [f] from \"./a.hql\") (fn g [n] (f n)) (export [g])",
    );
    let options = TranspileOptions {
        current_file: Some("/proj/main.hql".to_string()),
        ..Default::default()
    };
    let ctx = CompilerContext::with_loader(&options, Box::new(loader));
    let result =
        transpile_with_context("(import [f] from \"./a.hql\") (f 3)", &options, &ctx).unwrap();

    assert!(result.code.contains("import { f } from \"./a.hql\";"));
    assert!(!ctx.resolver.is_placeholder(Path::new("/proj/a.hql")));
    assert!(!ctx.resolver.is_placeholder(Path::new("/proj/b.hql")));
    assert_eq!(
        ctx.resolver.module_exports(Path::new("/proj/a.hql")),
        vec!["f".to_string()]
    );
    assert_eq!(
        ctx.resolver.module_exports(Path::new("/proj/b.hql")),
        vec!["g".to_string()]
    );
}

#[test]
fn missing_module_is_an_error() {
    let options = TranspileOptions {
        current_file: Some("/proj/main.hql".to_string()),
        ..Default::default()
    };
    let ctx = CompilerContext::with_loader(&options, Box::new(MapLoader::new()));
    let err = transpile_with_context(
        "(import [f] from \"./nope.hql\")",
        &options,
        &ctx,
    )
    .unwrap_err();
    assert!(matches!(err, HqlError::ModuleNotFound { .. }));
}

// ============================================================================
// Surface forms end to end
// ============================================================================

#[test]
fn loop_recur_compiles_to_rebinding_loop() {
    let code = compile("(loop [i 0 acc 0] (if (< i 10) (recur (+ i 1) (+ acc i)) acc))");
    assert!(code.contains("while (true)"));
    assert!(code.contains("continue;"));
    assert!(code.contains("let i = 0;"));
}

#[test]
fn class_and_enum() {
    let code = compile(
        "(class Point (constructor [x] (set! this.x x)) (double [] (* this.x 2))) (enum Status ok err)",
    );
    assert!(code.contains("class Point {"));
    assert!(code.contains("constructor(x)"));
    assert!(code.contains("double()"));
    assert!(code.contains("Object.freeze"));
    assert!(code.contains("ok: \"ok\""));
}

#[test]
fn template_strings_survive_the_pipeline() {
    let code = compile("(const msg `hello ${name}, you have ${(+ n 1)} items`)");
    assert!(code.contains("`hello ${name}, you have ${n + 1} items`"));
}

#[test]
fn named_arguments_reorder_at_call_site() {
    let code = compile("(fn connect [host port] host) (connect port: 80 host: \"local\")");
    assert!(code.contains("connect(\"local\", 80)"));
}

#[test]
fn dot_paths_become_member_chains() {
    let code = compile("(console.log \"hi\")");
    assert!(code.contains("console.log(\"hi\")"));
}

#[test]
fn method_call_sugar() {
    let code = compile("(items .push 42)");
    assert!(code.contains("items.push(42)"));
}

#[test]
fn spread_arguments() {
    let code = compile("(f ...xs)");
    assert!(code.contains("f(...xs)"));
}

#[test]
fn undefined_macro_time_symbol_reports_suggestion() {
    let err = transpile(
        "(macro m [] (undefined-helper)) (m)",
        &TranspileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, HqlError::UndefinedSymbol { .. }));
}
