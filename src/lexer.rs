// ABOUTME: Lexer turning HQL source text into a token stream with source spans

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, hex_digit1, multispace1, satisfy},
    combinator::{opt, recognize, value},
    multi::many0,
    IResult, Parser,
};

use crate::error::{HqlError, LexErrorKind};
use crate::source::{LineIndex, Position, Span};

/// One piece of a backtick template string. Expression slots keep their raw
/// text; the reader parses them as embedded forms later.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    HashBrace,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    String(String),
    Template(Vec<TemplatePart>),
    Number(f64),
    BigInt(String),
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// ============================================================================
// Character classes
// ============================================================================

fn is_symbol_start(c: char) -> bool {
    c.is_alphabetic() || "+-*/<>=!?&%.:|_$".contains(c)
}

fn is_symbol_continue(c: char) -> bool {
    c.is_alphanumeric() || "+-*/<>=!?&%.:|_$^~".contains(c)
}

// ============================================================================
// nom recognizers (matched against the remaining input; the driving loop
// computes spans from remaining-length deltas)
// ============================================================================

fn line_comment(input: &str) -> IResult<&str, ()> {
    let (input, _) = char(';')(input)?;
    let (input, _) = take_while(|c| c != '\n')(input)?;
    Ok((input, ()))
}

/// Skip whitespace, commas (treated as whitespace), and `;` comments.
fn ws_and_comments(input: &str) -> IResult<&str, ()> {
    many0(alt((
        value((), multispace1),
        value((), take_while1(|c| c == ',')),
        line_comment,
    )))
    .map(|_| ())
    .parse(input)
}

fn punct_token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::UnquoteSplicing, tag("~@")),
        value(TokenKind::HashBrace, tag("#{")),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::LBrace, char('{')),
        value(TokenKind::RBrace, char('}')),
        value(TokenKind::Quote, char('\'')),
        value(TokenKind::Quasiquote, char('`')),
        value(TokenKind::Unquote, char('~')),
    ))
    .parse(input)
}

fn hex_number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, digits) = recognize((opt(char('-')), tag("0x"), hex_digit1)).parse(input)?;
    let (neg, hex) = match digits.strip_prefix('-') {
        Some(h) => (true, &h[2..]),
        None => (false, &digits[2..]),
    };
    // 16 hex digits always fit u64; longer literals are rejected upstream
    let n = u64::from_str_radix(hex, 16).unwrap_or(u64::MAX) as f64;
    Ok((rest, TokenKind::Number(if neg { -n } else { n })))
}

fn bigint_number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, matched) = recognize((opt(char('-')), digit1, char('n'))).parse(input)?;
    Ok((
        rest,
        TokenKind::BigInt(matched[..matched.len() - 1].to_string()),
    ))
}

fn float_number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, matched) =
        recognize((opt(char('-')), digit1, char('.'), digit1)).parse(input)?;
    let n: f64 = matched.parse().unwrap_or(f64::NAN);
    Ok((rest, TokenKind::Number(n)))
}

fn int_number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, matched) = recognize((opt(char('-')), digit1)).parse(input)?;
    let n: f64 = matched.parse().unwrap_or(f64::NAN);
    Ok((rest, TokenKind::Number(n)))
}

fn number_token(input: &str) -> IResult<&str, TokenKind> {
    alt((hex_number, bigint_number, float_number, int_number)).parse(input)
}

fn symbol_token(input: &str) -> IResult<&str, TokenKind> {
    let (rest, matched) =
        recognize((satisfy(is_symbol_start), take_while(is_symbol_continue))).parse(input)?;
    Ok((rest, TokenKind::Symbol(matched.to_string())))
}

// ============================================================================
// Hand scanners for strings and templates (escape handling needs absolute
// positions for error reporting, which nom combinators do not carry)
// ============================================================================

struct StringScan {
    kind: TokenKind,
    end: usize, // byte offset just past the closing delimiter
}

fn lex_error(kind: LexErrorKind, index: &LineIndex, offset: usize) -> HqlError {
    HqlError::Lex {
        kind,
        pos: index.position_at(offset as u32),
    }
}

/// Decode the escape sequence starting at `chars`' current position (the
/// backslash has been consumed). Returns the decoded char.
fn scan_escape(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    index: &LineIndex,
    esc_offset: usize,
) -> Result<char, HqlError> {
    let invalid = || lex_error(LexErrorKind::InvalidEscape, index, esc_offset);
    let (_, c) = chars.next().ok_or_else(invalid)?;
    let decoded = match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '"' => '"',
        '`' => '`',
        '$' => '$',
        '\\' => '\\',
        'x' => {
            let mut code = 0u32;
            for _ in 0..2 {
                let (_, h) = chars.next().ok_or_else(invalid)?;
                code = code * 16 + h.to_digit(16).ok_or_else(invalid)?;
            }
            char::from_u32(code).ok_or_else(invalid)?
        }
        'u' => {
            // \u{...} or \uNNNN
            if matches!(chars.peek(), Some((_, '{'))) {
                chars.next();
                let mut code = 0u32;
                let mut any = false;
                loop {
                    let (_, h) = chars.next().ok_or_else(invalid)?;
                    if h == '}' {
                        break;
                    }
                    code = code * 16 + h.to_digit(16).ok_or_else(invalid)?;
                    any = true;
                }
                if !any {
                    return Err(invalid());
                }
                char::from_u32(code).ok_or_else(invalid)?
            } else {
                let mut code = 0u32;
                for _ in 0..4 {
                    let (_, h) = chars.next().ok_or_else(invalid)?;
                    code = code * 16 + h.to_digit(16).ok_or_else(invalid)?;
                }
                char::from_u32(code).ok_or_else(invalid)?
            }
        }
        _ => return Err(invalid()),
    };
    Ok(decoded)
}

/// Scan a `"..."` string starting at `start` (which must point at the
/// opening quote).
fn scan_string(source: &str, start: usize, index: &LineIndex) -> Result<StringScan, HqlError> {
    let mut chars = source[start + 1..].char_indices().peekable();
    let mut out = String::new();

    while let Some((i, c)) = chars.next() {
        let abs = start + 1 + i;
        match c {
            '"' => {
                return Ok(StringScan {
                    kind: TokenKind::String(out),
                    end: abs + 1,
                });
            }
            '\\' => out.push(scan_escape(&mut chars, index, abs)?),
            _ => out.push(c),
        }
    }
    Err(lex_error(LexErrorKind::Unterminated, index, start))
}

/// Scan the `${...}` interpolation body. `start` points just past the `{`.
/// Returns (expression text, offset just past the closing `}`). Nested
/// braces and string literals inside the expression are skipped over.
fn scan_interpolation(
    source: &str,
    start: usize,
    index: &LineIndex,
) -> Result<(String, usize), HqlError> {
    let mut depth = 1usize;
    let mut chars = source[start..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let abs = start + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((source[start..abs].to_string(), abs + 1));
                }
            }
            '"' => {
                let scanned = scan_string(source, abs, index)?;
                // Fast-forward the iterator past the embedded string
                while let Some(&(j, _)) = chars.peek() {
                    if start + j >= scanned.end {
                        break;
                    }
                    chars.next();
                }
            }
            _ => {}
        }
    }
    Err(lex_error(LexErrorKind::Unterminated, index, start))
}

/// Scan a backtick template starting at `start` (the opening backtick).
fn scan_template(source: &str, start: usize, index: &LineIndex) -> Result<StringScan, HqlError> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut pos = start + 1;

    loop {
        let rest = &source[pos..];
        let mut chars = rest.char_indices().peekable();
        let (i, c) = match chars.next() {
            Some(ic) => ic,
            None => return Err(lex_error(LexErrorKind::Unterminated, index, start)),
        };
        let abs = pos + i;
        match c {
            '`' => {
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                return Ok(StringScan {
                    kind: TokenKind::Template(parts),
                    end: abs + 1,
                });
            }
            '\\' => {
                let decoded = scan_escape(&mut chars, index, abs)?;
                text.push(decoded);
                pos = match chars.peek() {
                    Some(&(j, _)) => pos + j,
                    None => source.len(),
                };
            }
            '$' if rest[c.len_utf8()..].starts_with('{') => {
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                let (expr, after) = scan_interpolation(source, abs + 2, index)?;
                parts.push(TemplatePart::Expr(expr));
                pos = after;
            }
            _ => {
                text.push(c);
                pos = abs + c.len_utf8();
            }
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

pub struct Lexer<'a> {
    source: &'a str,
    index: LineIndex,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            index: LineIndex::new(source),
        }
    }

    fn pos_at(&self, offset: usize) -> Position {
        self.index.position_at(offset as u32)
    }

    /// Tokenize the whole source. Comments and whitespace are discarded.
    pub fn tokenize(&self) -> Result<Vec<Token>, HqlError> {
        let mut tokens = Vec::new();
        let mut remaining = self.source;

        loop {
            remaining = match ws_and_comments(remaining) {
                Ok((rest, ())) => rest,
                Err(_) => remaining,
            };
            if remaining.is_empty() {
                break;
            }

            let start = self.source.len() - remaining.len();
            let first = remaining.chars().next().unwrap_or('\0');

            // Strings and templates are scanned by hand for absolute
            // error positions
            if first == '"' {
                let scanned = scan_string(self.source, start, &self.index)?;
                tokens.push(self.spanned(scanned.kind, start, scanned.end));
                remaining = &self.source[scanned.end..];
                continue;
            }
            if first == '`' {
                let scanned = scan_template(self.source, start, &self.index)?;
                tokens.push(self.spanned(scanned.kind, start, scanned.end));
                remaining = &self.source[scanned.end..];
                continue;
            }

            // Number before symbol so `-1` lexes as a number while `-` alone
            // falls through to a symbol. A number followed directly by a
            // symbol character is malformed (`12abc`, `1.2.3`).
            if first.is_ascii_digit()
                || (first == '-'
                    && remaining
                        .chars()
                        .nth(1)
                        .is_some_and(|c| c.is_ascii_digit()))
            {
                match number_token(remaining) {
                    Ok((rest, kind)) => {
                        if rest.chars().next().is_some_and(is_symbol_continue) {
                            let bad = self.source.len() - rest.len();
                            return Err(lex_error(LexErrorKind::InvalidNumber, &self.index, bad));
                        }
                        let end = self.source.len() - rest.len();
                        tokens.push(self.spanned(kind, start, end));
                        remaining = rest;
                        continue;
                    }
                    Err(_) => {
                        return Err(lex_error(LexErrorKind::InvalidNumber, &self.index, start));
                    }
                }
            }

            if let Ok((rest, kind)) = punct_token(remaining) {
                let end = self.source.len() - rest.len();
                tokens.push(self.spanned(kind, start, end));
                remaining = rest;
                continue;
            }

            match symbol_token(remaining) {
                Ok((rest, kind)) => {
                    let end = self.source.len() - rest.len();
                    tokens.push(self.spanned(kind, start, end));
                    remaining = rest;
                }
                Err(_) => {
                    return Err(lex_error(LexErrorKind::InvalidNumber, &self.index, start));
                }
            }
        }

        Ok(tokens)
    }

    fn spanned(&self, kind: TokenKind, start: usize, end: usize) -> Token {
        Token {
            kind,
            span: Span::new(self.pos_at(start), self.pos_at(end)),
        }
    }
}

/// Convenience wrapper used by the reader and tests.
pub fn tokenize(source: &str) -> Result<Vec<Token>, HqlError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("()[]{}#{"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::HashBrace,
            ]
        );
    }

    #[test]
    fn test_quote_family() {
        assert_eq!(
            kinds("' ` ~ ~@"),
            vec![
                TokenKind::Quote,
                TokenKind::Quasiquote,
                TokenKind::Unquote,
                TokenKind::UnquoteSplicing,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::Number(42.0)]);
        assert_eq!(kinds("-42"), vec![TokenKind::Number(-42.0)]);
        assert_eq!(kinds("3.25"), vec![TokenKind::Number(3.25)]);
        assert_eq!(kinds("0xff"), vec![TokenKind::Number(255.0)]);
        assert_eq!(kinds("123n"), vec![TokenKind::BigInt("123".to_string())]);
    }

    #[test]
    fn test_minus_is_a_symbol_when_not_followed_by_digit() {
        assert_eq!(kinds("-"), vec![TokenKind::Symbol("-".to_string())]);
        assert_eq!(
            kinds("(- 1 2)"),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol("-".to_string()),
                TokenKind::Number(1.0),
                TokenKind::Number(2.0),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_symbol_with_kebab_and_predicates() {
        assert_eq!(
            kinds("foo-bar even? set! a.b.c"),
            vec![
                TokenKind::Symbol("foo-bar".to_string()),
                TokenKind::Symbol("even?".to_string()),
                TokenKind::Symbol("set!".to_string()),
                TokenKind::Symbol("a.b.c".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\t\"c\"""#),
            vec![TokenKind::String("a\nb\t\"c\"".to_string())]
        );
        assert_eq!(
            kinds(r#""\x41B\u{43}""#),
            vec![TokenKind::String("ABC".to_string())]
        );
    }

    #[test]
    fn test_invalid_escape() {
        let err = tokenize(r#""\q""#).unwrap_err();
        assert!(matches!(
            err,
            HqlError::Lex {
                kind: LexErrorKind::InvalidEscape,
                ..
            }
        ));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize(r#""abc"#).unwrap_err();
        assert!(matches!(
            err,
            HqlError::Lex {
                kind: LexErrorKind::Unterminated,
                ..
            }
        ));
    }

    #[test]
    fn test_template_with_interpolation() {
        let toks = tokenize("`hello ${name}!`").unwrap();
        match &toks[0].kind {
            TokenKind::Template(parts) => {
                assert_eq!(
                    parts,
                    &vec![
                        TemplatePart::Text("hello ".to_string()),
                        TemplatePart::Expr("name".to_string()),
                        TemplatePart::Text("!".to_string()),
                    ]
                );
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_template_nested_braces() {
        let toks = tokenize("`${(hash-map \"a\" 1)}`").unwrap();
        match &toks[0].kind {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0], TemplatePart::Expr("(hash-map \"a\" 1)".to_string()));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_comments_discarded() {
        assert_eq!(
            kinds("; a comment\n42 ; trailing"),
            vec![TokenKind::Number(42.0)]
        );
    }

    #[test]
    fn test_positions() {
        let toks = tokenize("(foo\n  bar)").unwrap();
        assert_eq!(toks[0].span.start.line, 1);
        assert_eq!(toks[0].span.start.column, 0);
        // `bar` sits on line 2, column 2
        assert_eq!(toks[2].span.start.line, 2);
        assert_eq!(toks[2].span.start.column, 2);
    }

    #[test]
    fn test_invalid_number_trailing_garbage() {
        assert!(matches!(
            tokenize("12abc").unwrap_err(),
            HqlError::Lex {
                kind: LexErrorKind::InvalidNumber,
                ..
            }
        ));
    }
}
