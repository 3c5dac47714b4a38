// ABOUTME: Macro expansion driver walking the AST until no invocations remain

use crate::config::{CancelToken, Limits};
use crate::env::Environment;
use crate::error::HqlError;
use crate::interp::{parse_params, Interpreter};
use crate::macros::{MacroDefinition, MacroRegistry};
use crate::sexp::SExp;
use crate::value::Value;
use std::rc::Rc;

/// Drives macro expansion: outermost invocations are replaced first, their
/// results re-expanded, and arguments are handed to macros unevaluated and
/// unexpanded (the macro decides what to do with them).
pub struct Expander<'a> {
    interp: &'a Interpreter,
    env: Rc<Environment>,
    limits: Limits,
    cancel: CancelToken,
    iterations: usize,
}

impl<'a> Expander<'a> {
    pub fn new(
        interp: &'a Interpreter,
        env: Rc<Environment>,
        limits: Limits,
        cancel: CancelToken,
    ) -> Self {
        Expander {
            interp,
            env,
            limits,
            cancel,
            iterations: 0,
        }
    }

    /// Expand a whole program. `macro`/`defmacro` definition forms are
    /// consumed here: they register into `registry` and produce no output.
    pub fn expand_program(
        &mut self,
        forms: Vec<SExp>,
        registry: &mut MacroRegistry,
    ) -> Result<Vec<SExp>, HqlError> {
        let mut out = Vec::with_capacity(forms.len());
        for form in forms {
            if is_macro_definition(&form) {
                self.register_macro(&form, registry)?;
                continue;
            }
            out.push(self.expand(&form, registry, 0)?);
        }
        Ok(out)
    }

    /// Expand a single form to fixpoint.
    pub fn expand(
        &mut self,
        form: &SExp,
        registry: &MacroRegistry,
        depth: usize,
    ) -> Result<SExp, HqlError> {
        if depth > self.limits.max_expand_depth {
            return Err(HqlError::MacroExpansionLimit {
                limit: self.limits.max_expand_depth,
                unit: "nesting levels",
            });
        }
        if self.cancel.is_cancelled() {
            return Err(HqlError::Cancelled);
        }

        let elements = match form.as_list() {
            Some(es) if !es.is_empty() => es,
            _ => return Ok(form.clone()),
        };

        if let Some(head) = elements[0].as_symbol() {
            // Templates and quoted data are inert
            if head == "quote" || head == "quasiquote" {
                return Ok(form.clone());
            }
            if let Some(def) = registry.get(head) {
                self.iterations += 1;
                if self.iterations > self.limits.iteration_limit {
                    return Err(HqlError::MacroExpansionLimit {
                        limit: self.limits.iteration_limit,
                        unit: "iterations",
                    });
                }
                let replacement = self.invoke_macro(def, &elements[1..])?;
                return self.expand(&replacement, registry, depth + 1);
            }
        }

        // Not a macro call: expand each child at the same depth
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            out.push(self.expand(element, registry, depth)?);
        }
        match form {
            SExp::List { kind, span, .. } => Ok(SExp::List {
                elements: out,
                kind: *kind,
                span: *span,
            }),
            _ => unreachable!("as_list returned Some for a non-list"),
        }
    }

    /// Run one macro invocation: bind the unevaluated argument forms into a
    /// child of the expansion environment and evaluate the body.
    fn invoke_macro(&self, def: &MacroDefinition, args: &[SExp]) -> Result<SExp, HqlError> {
        if def.rest_param.is_some() {
            if args.len() < def.params.len() {
                return Err(HqlError::arity_error(
                    &def.name,
                    format!("at least {}", def.params.len()),
                    args.len(),
                ));
            }
        } else if args.len() != def.params.len() {
            return Err(HqlError::arity_error(
                &def.name,
                def.params.len().to_string(),
                args.len(),
            ));
        }

        let macro_env = self.env.extend()?;
        for (param, arg) in def.params.iter().zip(args.iter()) {
            macro_env.define(param.clone(), Value::SExp(arg.clone()));
        }
        if let Some(rest) = &def.rest_param {
            let tail: Vec<Value> = args[def.params.len()..]
                .iter()
                .cloned()
                .map(Value::SExp)
                .collect();
            macro_env.define(rest.clone(), Value::Array(tail));
        }

        self.interp.eval_body(&def.body, &macro_env)?.into_sexp()
    }

    fn register_macro(
        &mut self,
        form: &SExp,
        registry: &mut MacroRegistry,
    ) -> Result<(), HqlError> {
        let elements = form.as_list().unwrap_or(&[]);
        let pos = form.span().map(|s| s.start);
        if elements.len() < 4 {
            return Err(HqlError::syntax(
                "macro: expected name, parameter vector, and body",
                pos,
            ));
        }
        let name = elements[1].as_symbol().ok_or_else(|| {
            HqlError::syntax("macro: name must be a symbol", pos)
        })?;
        let (params, rest_param) = parse_params(&elements[2])?;

        registry.define(MacroDefinition {
            name: name.to_string(),
            params,
            rest_param,
            body: elements[3..].to_vec(),
            source: Some(form.render()),
            defined_at: pos,
        });
        Ok(())
    }
}

fn is_macro_definition(form: &SExp) -> bool {
    matches!(form.head_symbol(), Some("macro") | Some("defmacro"))
}
