//! # Macro-time builtins
//!
//! Functions available to macro bodies during expansion, organized by
//! category:
//!
//! - **[arithmetic]**: `+ - * / % mod`
//! - **[comparison]**: `= == === != !== < > <= >=`
//! - **[logic]**: `not`
//! - **[strings]**: `str name gensym`
//! - **[ast]**: `%first %rest %length %nth %empty?` - raw syntax accessors
//! - **[collections]**: `vector list hash-map hash-set empty-array empty-map empty-set`
//!
//! Each category is a sub-module whose `register` function installs its
//! bindings into the macro-time environment.

use crate::env::Environment;
use std::rc::Rc;

/// Generates a builtin function plus its `register_*` helper. The generated
/// function has the `(args, env, interp)` calling convention the dispatcher
/// uses for builtins.
macro_rules! define_builtin {
    {
        $fn_ident:ident,
        name: $lisp_name:literal,
        $impl:expr
    } => {
        pub fn $fn_ident(
            args: &[crate::value::Value],
            env: &std::rc::Rc<crate::env::Environment>,
            interp: &crate::interp::Interpreter,
        ) -> Result<crate::value::Value, crate::error::HqlError> {
            let f: fn(
                &[crate::value::Value],
                &std::rc::Rc<crate::env::Environment>,
                &crate::interp::Interpreter,
            ) -> Result<crate::value::Value, crate::error::HqlError> = $impl;
            f(args, env, interp)
        }

        paste::paste! {
            pub fn [<register_ $fn_ident>](env: &std::rc::Rc<crate::env::Environment>) {
                env.define(
                    $lisp_name.to_string(),
                    crate::value::Value::Callable(crate::value::Callable::Builtin {
                        name: $lisp_name,
                        func: $fn_ident,
                    }),
                );
            }
        }
    };
}

pub(crate) use define_builtin;

pub mod arithmetic;
pub mod ast;
pub mod collections;
pub mod comparison;
pub mod logic;
pub mod strings;

/// Register every builtin category into the macro-time environment.
pub fn register_builtins(env: &Rc<Environment>) {
    arithmetic::register(env);
    comparison::register(env);
    logic::register(env);
    strings::register(env);
    ast::register(env);
    collections::register(env);
}
