// ABOUTME: Error taxonomy for every stage of the compiler pipeline

use crate::source::{snippet, Position};
use thiserror::Error;

// ===== Arity constant strings (eliminates allocations in error paths) =====
pub const ARITY_ONE: &str = "1";
pub const ARITY_TWO: &str = "2";
pub const ARITY_THREE: &str = "3";
pub const ARITY_AT_LEAST_ONE: &str = "at least 1";
pub const ARITY_AT_LEAST_TWO: &str = "at least 2";
pub const ARITY_ONE_OR_TWO: &str = "1-2";
pub const ARITY_TWO_OR_THREE: &str = "2-3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    Unterminated,
    InvalidEscape,
    InvalidNumber,
}

impl std::fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErrorKind::Unterminated => write!(f, "unterminated string"),
            LexErrorKind::InvalidEscape => write!(f, "invalid escape sequence"),
            LexErrorKind::InvalidNumber => write!(f, "invalid number literal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Unbalanced,
    EmptyInput,
    OddMapPayload,
    DotInvalid,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::Unbalanced => write!(f, "unbalanced delimiter"),
            ParseErrorKind::EmptyInput => write!(f, "nothing to read"),
            ParseErrorKind::OddMapPayload => write!(f, "map literal needs an even number of forms"),
            ParseErrorKind::DotInvalid => write!(f, "invalid dot syntax"),
        }
    }
}

/// All errors surfaced by `transpile` and the individual pipeline stages.
#[derive(Error, Debug, Clone)]
pub enum HqlError {
    #[error("{kind} at {pos}")]
    Lex { kind: LexErrorKind, pos: Position },

    #[error("{kind} at {pos}")]
    Parse { kind: ParseErrorKind, pos: Position },

    #[error("Undefined symbol: {name}")]
    UndefinedSymbol {
        name: String,
        pos: Option<Position>,
        suggestion: Option<String>,
    },

    /// Arity error with function name, expected count/range, and actual count
    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    Arity {
        function: String,
        expected: String, // "2", "1-3", "at least 1"
        actual: usize,
    },

    /// Type mismatch with function name, expected type, actual type, and argument index
    #[error("{function}: expected {expected}, got {actual} at argument {position}")]
    Type {
        function: String,
        expected: String,
        actual: String,
        position: usize,
    },

    #[error("{message}")]
    Syntax {
        message: String,
        pos: Option<Position>,
    },

    #[error("macro expansion exceeded {limit} {unit}")]
    MacroExpansionLimit { limit: usize, unit: &'static str },

    #[error("maximum call depth {limit} exceeded")]
    MaxCallDepth { limit: usize },

    #[error("cannot assign to const binding `{name}`")]
    ImmutableAssignment {
        name: String,
        pos: Option<Position>,
    },

    #[error("import cycle while resolving \"{specifier}\" (chain: {})", .chain.join(" -> "))]
    ImportCycle {
        specifier: String,
        chain: Vec<String>,
    },

    #[error("module not found: \"{specifier}\"")]
    ModuleNotFound {
        specifier: String,
        importer: Option<String>,
    },

    #[error("compilation cancelled")]
    Cancelled,

    #[error("internal compiler error in {stage}: {message}")]
    Internal {
        stage: &'static str,
        message: String,
    },
}

impl HqlError {
    /// Create a type mismatch error with full context
    pub fn type_error(
        function: &str,
        expected: &str,
        actual: impl Into<String>,
        position: usize,
    ) -> Self {
        HqlError::Type {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.into(),
            position,
        }
    }

    /// Create an arity error with expected and actual counts
    pub fn arity_error(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        HqlError::Arity {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn syntax(message: impl Into<String>, pos: Option<Position>) -> Self {
        HqlError::Syntax {
            message: message.into(),
            pos,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        HqlError::Internal {
            stage,
            message: message.into(),
        }
    }

    /// The source position this error points at, when it carries one.
    pub fn position(&self) -> Option<Position> {
        match self {
            HqlError::Lex { pos, .. } | HqlError::Parse { pos, .. } => Some(*pos),
            HqlError::UndefinedSymbol { pos, .. }
            | HqlError::Syntax { pos, .. }
            | HqlError::ImmutableAssignment { pos, .. } => *pos,
            _ => None,
        }
    }

    /// A one-line hint appended to the formatted message.
    pub fn hint(&self) -> Option<String> {
        match self {
            HqlError::UndefinedSymbol {
                suggestion: Some(s),
                ..
            } => Some(format!("Did you mean `{}`?", s)),
            HqlError::MacroExpansionLimit { .. } | HqlError::MaxCallDepth { .. } => {
                Some("Check for infinite recursion.".to_string())
            }
            HqlError::ImportCycle { .. } => {
                Some("Break the cycle by moving shared definitions into a third module.".to_string())
            }
            _ => None,
        }
    }
}

/// A non-fatal reader diagnostic. The reader returns these alongside a
/// best-effort partial tree so editor tooling can keep working; the compile
/// driver treats any soft error as fatal.
#[derive(Debug, Clone)]
pub struct SoftError {
    pub message: String,
    pub pos: Position,
}

/// Render a user-visible message: file, 1-based line/column, a caret
/// snippet, and a hint line when one applies.
pub fn format_error(err: &HqlError, source: &str, file: Option<&str>) -> String {
    let mut out = String::new();
    match err.position() {
        Some(pos) => {
            let file = file.unwrap_or("<input>");
            out.push_str(&format!("{}:{}: error: {}\n", file, pos, err));
            out.push_str(&snippet(source, pos));
        }
        None => {
            out.push_str(&format!("error: {}", err));
        }
    }
    if let Some(hint) = err.hint() {
        out.push('\n');
        out.push_str(&hint);
    }
    out
}

// ============================================================================
// Did-you-mean suggestions
// ============================================================================

/// Damerau-Levenshtein distance (optimal string alignment variant).
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev2 = vec![0usize; m + 1];
    let mut prev = (0..=m).collect::<Vec<_>>();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                curr[j] = curr[j].min(prev2[j - 2] + 1);
            }
        }
        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Pick the nearest candidate within an edit distance proportional to the
/// name's length. Returns `None` when nothing is plausibly close.
pub fn suggest<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let max_dist = match name.len() {
        0..=2 => 1,
        3..=5 => 2,
        _ => 3,
    };
    candidates
        .into_iter()
        .map(|c| (edit_distance(name, c), c))
        .filter(|(d, _)| *d > 0 && *d <= max_dist)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.to_string())
}
