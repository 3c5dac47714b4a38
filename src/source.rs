// ABOUTME: Source positions, spans, and the line index used for error snippets

use std::fmt;

/// A location in source text. Lines are 1-based, columns 0-based,
/// offsets are byte offsets into the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Position {
            line,
            column,
            offset,
        }
    }

    /// The position of the first byte of a source file.
    pub fn start() -> Self {
        Position {
            line: 1,
            column: 0,
            offset: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Columns are stored 0-based but shown 1-based
        write!(f, "{}:{}", self.line, self.column + 1)
    }
}

/// A half-open byte range in source text with resolved endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    pub fn point(pos: Position) -> Self {
        Span {
            start: pos,
            end: pos,
        }
    }
}

/// Precomputed table of line-start offsets for a source string.
///
/// Built once per compilation; `position_at` is a binary search so the
/// lexer can resolve byte offsets into line/column pairs cheaply.
#[derive(Debug)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        LineIndex { line_starts }
    }

    pub fn position_at(&self, offset: u32) -> Position {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Position {
            line: line_idx as u32 + 1,
            column: offset - self.line_starts[line_idx],
            offset,
        }
    }
}

/// Render the line containing `pos` with a caret marking the column.
///
/// Used when formatting user-visible errors:
///
/// ```text
///   (let [x 1)
///            ^
/// ```
pub fn snippet(source: &str, pos: Position) -> String {
    let line = source
        .lines()
        .nth(pos.line.saturating_sub(1) as usize)
        .unwrap_or("");
    let mut out = String::with_capacity(line.len() * 2 + 8);
    out.push_str("  ");
    out.push_str(line);
    out.push('\n');
    out.push_str("  ");
    for _ in 0..pos.column {
        out.push(' ');
    }
    out.push('^');
    out
}
