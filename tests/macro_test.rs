// ABOUTME: Macro system integration tests: expansion, hygiene, limits

use hql::{transpile, HqlError, Limits, TranspileOptions};
use serial_test::serial;

fn compile(src: &str) -> String {
    transpile(src, &TranspileOptions::default())
        .expect("transpile failed")
        .code
}

#[test]
fn expansion_reaches_fixpoint() {
    let code = compile(
        "(macro inc-form [x] `(+ 1 ~x)) \
         (macro twice-inc [x] `(inc-form (inc-form ~x))) \
         (const n (twice-inc 5))",
    );
    assert!(code.contains("1 + (1 + 5)") || code.contains("1 + 1 + 5"));
    assert!(!code.contains("inc_form"));
}

#[test]
fn arguments_reach_macros_unevaluated() {
    // The macro quotes its argument, so the call form itself must survive
    // as data, not its value
    let code = compile("(macro keep [x] `(quote ~x)) (const q (keep (+ 1 2)))");
    assert!(code.contains("[\"+\", 1, 2]"));
}

#[test]
fn quasiquote_without_unquote_equals_quote() {
    let a = compile("(const q `(f x))");
    let b = compile("(const q '(f x))");
    assert_eq!(a, b);
}

#[test]
#[serial]
fn gensym_keeps_expansions_hygienic() {
    let code = compile(
        "(macro with-tmp [e] (let [t (gensym \"tmp\")] `(let [~t ~e] ~t))) \
         (const a (with-tmp 1)) \
         (const b (with-tmp 2))",
    );
    // Each expansion minted its own temporary
    let names: Vec<&str> = code
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| w.starts_with("__hql_tmp_"))
        .collect();
    assert!(names.len() >= 2);
    let first = names[0];
    assert!(names.iter().any(|n| *n != first));
}

#[test]
fn recursive_macro_hits_expansion_limit() {
    let err = transpile(
        "(macro forever [x] `(forever ~x)) (forever 1)",
        &TranspileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, HqlError::MacroExpansionLimit { .. }));
}

#[test]
fn iteration_limit_is_configurable() {
    let options = TranspileOptions {
        limits: Limits {
            iteration_limit: 3,
            ..Default::default()
        },
        ..Default::default()
    };
    // A handful of perfectly ordinary expansions blow a tiny budget
    let err = transpile(
        "(macro m [x] `(+ 1 ~x)) (m 1) (m 2) (m 3) (m 4)",
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, HqlError::MacroExpansionLimit { .. }));
}

#[test]
fn macro_time_interpreter_runs_real_code() {
    // The macro computes at compile time using let, if, and arithmetic
    let code = compile(
        "(macro pick [flag a b] (if (= (name flag) \"yes\") a b)) \
         (const x (pick yes 1 2)) \
         (const y (pick no 1 2))",
    );
    assert!(code.contains("const x = 1;"));
    assert!(code.contains("const y = 2;"));
}

#[test]
fn macro_arity_is_checked() {
    let err = transpile(
        "(macro pair [a b] `(~a ~b)) (pair 1)",
        &TranspileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, HqlError::Arity { function, .. } if function == "pair"));
}

#[test]
fn macro_time_call_depth_is_bounded() {
    let err = transpile(
        "(macro deep [] (do (fn spin [n] (spin (+ n 1))) (spin 0))) (deep)",
        &TranspileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, HqlError::MaxCallDepth { .. }));
}

#[test]
fn ast_accessors_destructure_argument_forms() {
    let code = compile(
        "(macro first-of [xs] (%first xs)) (const x (first-of (10 20 30)))",
    );
    assert!(code.contains("const x = 10;"));
}
