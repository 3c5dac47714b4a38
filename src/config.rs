// ABOUTME: Limits, defaults, and the options struct accepted by transpile

pub const VERSION: &str = "1.0.0";

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag checked at stage and loop boundaries
/// (macro-expansion iterations, IR-tree walks). Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

pub const DEFAULT_MAX_EXPAND_DEPTH: usize = 100;
pub const DEFAULT_ITERATION_LIMIT: usize = 10_000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 500;
pub const DEFAULT_MAX_ENV_DEPTH: usize = 100;
pub const DEFAULT_INDENT: &str = "  ";

/// Deterministic resource bounds. These replace wall-clock timeouts: a
/// runaway macro or evaluation trips one of these counters instead of
/// hanging the host.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_expand_depth: usize,
    pub iteration_limit: usize,
    pub max_call_depth: usize,
    pub max_env_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expand_depth: DEFAULT_MAX_EXPAND_DEPTH,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_env_depth: DEFAULT_MAX_ENV_DEPTH,
        }
    }
}

/// Options accepted by the top-level `transpile` entry point.
#[derive(Debug, Clone, Default)]
pub struct TranspileOptions {
    pub verbose: bool,
    pub show_timing: bool,
    pub base_dir: Option<std::path::PathBuf>,
    pub source_dir: Option<std::path::PathBuf>,
    pub temp_dir: Option<std::path::PathBuf>,
    pub current_file: Option<String>,
    pub generate_source_map: bool,
    /// Embedded into the source map's `sourcesContent` when present.
    pub source_content: Option<String>,
    /// Emit `/* HQL:<line> */` hints next to significant statements.
    pub debug_comments: bool,
    /// Indentation unit for emitted JavaScript.
    pub indent: Option<String>,
    pub limits: Limits,
}

impl TranspileOptions {
    pub fn indent_unit(&self) -> &str {
        self.indent.as_deref().unwrap_or(DEFAULT_INDENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_expand_depth, 100);
        assert_eq!(limits.iteration_limit, 10_000);
        assert_eq!(limits.max_call_depth, 500);
    }

    #[test]
    fn test_default_indent() {
        let opts = TranspileOptions::default();
        assert_eq!(opts.indent_unit(), "  ");
    }

    #[test]
    fn test_cancel_token_shares_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
