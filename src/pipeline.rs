// ABOUTME: Top-level transpile pipeline: read, resolve imports, expand, transform, optimize, generate

use crate::builtins::register_builtins;
use crate::codegen::{generate, GenOptions};
use crate::config::{CancelToken, TranspileOptions};
use crate::env::Environment;
use crate::error::HqlError;
use crate::expander::Expander;
use crate::interp::Interpreter;
use crate::macros::MacroRegistry;
use crate::optimize::optimize_program;
use crate::reader::read_forms;
use crate::resolver::{
    classify_specifier, CompiledModule, FsLoader, ModuleLoader, ModuleResolver, Specifier,
};
use crate::sexp::{Scalar, SExp};
use crate::sourcemap::encode_source_map;
use crate::transform::transform_program;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, debug_span};

#[derive(Debug, Clone)]
pub struct TranspileResult {
    pub code: String,
    pub source_map: Option<String>,
}

/// Everything one compilation carries: the macro-time environment, the
/// macro registry, the module resolver, and the cancellation token. The
/// context is threaded explicitly; nothing here is global. REPL and LSP
/// collaborators construct one and reuse it across calls.
pub struct CompilerContext {
    pub env: Rc<Environment>,
    pub registry: RefCell<MacroRegistry>,
    pub resolver: ModuleResolver,
    pub interp: Interpreter,
    pub cancel: CancelToken,
}

impl CompilerContext {
    pub fn new(options: &TranspileOptions) -> Self {
        Self::with_loader(options, Box::new(FsLoader))
    }

    pub fn with_loader(options: &TranspileOptions, loader: Box<dyn ModuleLoader>) -> Self {
        let env = Environment::new();
        register_builtins(&env);
        CompilerContext {
            env,
            registry: RefCell::new(MacroRegistry::new()),
            resolver: ModuleResolver::new(loader),
            interp: Interpreter::new(options.limits),
            cancel: CancelToken::new(),
        }
    }
}

/// Compile HQL source text to JavaScript. Pure over its inputs: all
/// persistent state lives in the context, and a fresh context is created
/// here per call.
pub fn transpile(source: &str, options: &TranspileOptions) -> Result<TranspileResult, HqlError> {
    let ctx = CompilerContext::new(options);
    transpile_with_context(source, options, &ctx)
}

/// Compile with a caller-supplied context (dependency injection for REPL
/// and LSP collaborators: pre-registered macros, a shared module cache, an
/// external cancellation token).
pub fn transpile_with_context(
    source: &str,
    options: &TranspileOptions,
    ctx: &CompilerContext,
) -> Result<TranspileResult, HqlError> {
    let pipeline = Pipeline { ctx, options };
    pipeline.run(source)
}

struct Pipeline<'a> {
    ctx: &'a CompilerContext,
    options: &'a TranspileOptions,
}

impl<'a> Pipeline<'a> {
    fn run(&self, source: &str) -> Result<TranspileResult, HqlError> {
        let current_dir = self.current_dir();

        let forms = self.timed("read", || read_forms(source))?;

        self.check_cancelled()?;
        self.timed("resolve-imports", || {
            let mut registry = self.ctx.registry.borrow_mut();
            self.process_imports(&forms, current_dir.as_deref(), &mut registry)
        })?;

        let expanded = self.timed("expand", || {
            let mut registry = self.ctx.registry.borrow_mut();
            let mut expander = Expander::new(
                &self.ctx.interp,
                self.ctx.env.clone(),
                self.options.limits,
                self.ctx.cancel.clone(),
            );
            expander.expand_program(forms, &mut registry)
        })?;

        self.check_cancelled()?;
        let program = self.timed("transform", || transform_program(&expanded))?;

        let program = self.timed("optimize", || {
            optimize_program(program, &self.ctx.cancel)
        })?;

        self.check_cancelled()?;
        let gen_options = GenOptions {
            indent: self.options.indent_unit().to_string(),
            debug_comments: self.options.debug_comments,
            source_file: self.options.current_file.clone(),
        };
        let output = self.timed("generate", || Ok(generate(&program, &gen_options)))?;

        let source_map = if self.options.generate_source_map {
            let file = self
                .options
                .current_file
                .as_deref()
                .unwrap_or("<input>");
            Some(encode_source_map(
                &output.mappings,
                file,
                self.options.source_content.as_deref(),
            ))
        } else {
            None
        };

        for warning in self.ctx.resolver.warnings() {
            debug!(target: "hql::resolver", "{}", warning);
        }

        Ok(TranspileResult {
            code: output.code,
            source_map,
        })
    }

    fn current_dir(&self) -> Option<PathBuf> {
        if let Some(file) = &self.options.current_file {
            if let Some(parent) = Path::new(file).parent() {
                if parent.as_os_str().is_empty() {
                    return self.options.base_dir.clone();
                }
                return Some(parent.to_path_buf());
            }
        }
        self.options.base_dir.clone()
    }

    fn check_cancelled(&self) -> Result<(), HqlError> {
        if self.ctx.cancel.is_cancelled() {
            return Err(HqlError::Cancelled);
        }
        Ok(())
    }

    fn timed<T>(
        &self,
        stage: &'static str,
        f: impl FnOnce() -> Result<T, HqlError>,
    ) -> Result<T, HqlError> {
        let _span = debug_span!("stage", name = stage).entered();
        let start = Instant::now();
        let result = f();
        if self.options.show_timing {
            debug!(target: "hql::timing", stage, elapsed_us = start.elapsed().as_micros() as u64);
        }
        if self.options.verbose {
            debug!(target: "hql::pipeline", stage, ok = result.is_ok());
        }
        result
    }

    /// Walk top-level forms for `(import [names…] from "spec")`. Local
    /// specifiers compile their target module (placeholder-first, so
    /// cycles settle to runtime name resolution); the others pass through
    /// untouched.
    fn process_imports(
        &self,
        forms: &[SExp],
        current_dir: Option<&Path>,
        registry: &mut MacroRegistry,
    ) -> Result<(), HqlError> {
        for form in forms {
            if form.head_symbol() != Some("import") {
                continue;
            }
            let elements = form.as_list().unwrap();
            let spec = match elements.get(3) {
                Some(SExp::Literal {
                    value: Scalar::String(s),
                    ..
                }) => s.clone(),
                _ => continue, // malformed imports surface in the transformer
            };
            match classify_specifier(&spec) {
                Specifier::Local(path) => {
                    let resolved = self.ctx.resolver.resolve_path(&path, current_dir);
                    self.ensure_module(resolved.clone())?;
                    registry.absorb(&self.ctx.resolver.module_macros(&resolved));
                }
                // npm:/jsr:/https: imports are emitted as-is
                Specifier::Npm(_) | Specifier::Jsr(_) | Specifier::Https(_) => {}
            }
        }
        Ok(())
    }

    fn ensure_module(&self, path: PathBuf) -> Result<(), HqlError> {
        self.ctx
            .resolver
            .ensure(path, &mut |source, path| self.compile_module(source, path))
    }

    /// Compile one imported module: its own imports first (recursion bottoms
    /// out at the placeholder), then expansion with a module-local registry,
    /// then the back half of the pipeline.
    fn compile_module(&self, source: &str, path: &Path) -> Result<CompiledModule, HqlError> {
        let _span = debug_span!("module", path = %path.display()).entered();
        let forms = read_forms(source)?;

        let mut registry = MacroRegistry::new();
        self.process_imports(&forms, path.parent(), &mut registry)?;

        let module_env = self.ctx.env.extend()?;
        let mut expander = Expander::new(
            &self.ctx.interp,
            module_env,
            self.options.limits,
            self.ctx.cancel.clone(),
        );
        let expanded = expander.expand_program(forms, &mut registry)?;

        let mut exports = Vec::new();
        for form in &expanded {
            if form.head_symbol() == Some("export") {
                if let Some(names) = form.as_list().unwrap().get(1).and_then(SExp::seq_elements) {
                    for name in names {
                        if let Some(n) = name.as_symbol() {
                            exports.push(n.to_string());
                        }
                    }
                }
            }
        }

        let program = transform_program(&expanded)?;
        let program = optimize_program(program, &self.ctx.cancel)?;
        let gen_options = GenOptions {
            indent: self.options.indent_unit().to_string(),
            debug_comments: self.options.debug_comments,
            source_file: Some(path.display().to_string()),
        };
        let output = generate(&program, &gen_options);

        Ok(CompiledModule {
            path: path.to_path_buf(),
            exports,
            macros: registry,
            code: output.code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MapLoader;

    fn transpile_src(src: &str) -> Result<TranspileResult, HqlError> {
        transpile(src, &TranspileOptions::default())
    }

    #[test]
    fn test_basic_transpile() {
        let result = transpile_src("(const x (+ 1 2))").unwrap();
        assert!(result.code.contains("const x = 1 + 2;"));
        assert!(result.source_map.is_none());
    }

    #[test]
    fn test_source_map_generated_on_request() {
        let options = TranspileOptions {
            generate_source_map: true,
            current_file: Some("demo.hql".to_string()),
            source_content: Some("(const x 1)".to_string()),
            ..Default::default()
        };
        let result = transpile("(const x 1)", &options).unwrap();
        let map: serde_json::Value =
            serde_json::from_str(result.source_map.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["sources"][0], "demo.hql");
        assert_eq!(map["sourcesContent"][0], "(const x 1)");
    }

    #[test]
    fn test_macro_through_pipeline() {
        let result =
            transpile_src("(macro my-list [& xs] `[~@xs]) (const v (my-list 1 2 3))").unwrap();
        assert!(result.code.contains("[1, 2, 3]"));
    }

    #[test]
    fn test_error_propagates() {
        assert!(matches!(
            transpile_src("(const x 1) (set! x 2)"),
            Err(HqlError::ImmutableAssignment { .. })
        ));
    }

    #[test]
    fn test_cancellation_before_stage() {
        let options = TranspileOptions::default();
        let ctx = CompilerContext::new(&options);
        ctx.cancel.cancel();
        assert!(matches!(
            transpile_with_context("(+ 1 2)", &options, &ctx),
            Err(HqlError::Cancelled)
        ));
    }

    #[test]
    fn test_local_import_compiles_module() {
        let mut loader = MapLoader::new();
        loader.insert(
            "/proj/util.hql",
            "(fn helper [x] (* x 2)) (export [helper])",
        );
        let options = TranspileOptions {
            current_file: Some("/proj/main.hql".to_string()),
            ..Default::default()
        };
        let ctx = CompilerContext::with_loader(&options, Box::new(loader));
        let result = transpile_with_context(
            "(import [helper] from \"./util.hql\") (helper 21)",
            &options,
            &ctx,
        )
        .unwrap();
        assert!(result.code.contains("import { helper } from \"./util.hql\";"));
        assert_eq!(
            ctx.resolver.module_exports(Path::new("/proj/util.hql")),
            vec!["helper".to_string()]
        );
    }

    #[test]
    fn test_imported_macro_usable() {
        let mut loader = MapLoader::new();
        loader.insert(
            "/proj/macros.hql",
            "(macro double [x] `(* 2 ~x))",
        );
        let options = TranspileOptions {
            current_file: Some("/proj/main.hql".to_string()),
            ..Default::default()
        };
        let ctx = CompilerContext::with_loader(&options, Box::new(loader));
        let result = transpile_with_context(
            "(import [double] from \"./macros.hql\") (const x (double 4))",
            &options,
            &ctx,
        )
        .unwrap();
        assert!(result.code.contains("2 * 4"));
    }

    #[test]
    fn test_circular_import_succeeds() {
        let mut loader = MapLoader::new();
        loader.insert(
            "/proj/a.hql",
            "(import [g] from \"./b.hql\") (fn f [n] (if (<= n 0) 0 (g (- n 1)))) (export [f])",
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
        let result = transpile_with_context(
            "(import [f] from \"./a.hql\") (f 3)",
            &options,
            &ctx,
        )
        .unwrap();
        assert!(result.code.contains("f(3)"));
        assert!(!ctx.resolver.is_placeholder(Path::new("/proj/a.hql")));
        assert!(!ctx.resolver.is_placeholder(Path::new("/proj/b.hql")));
    }

    #[test]
    fn test_npm_import_passthrough() {
        let result = transpile_src("(import [merge] from \"npm:lodash\")").unwrap();
        assert!(result.code.contains("import { merge } from \"npm:lodash\";"));
    }
}
