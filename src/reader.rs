// ABOUTME: Reader converting the token stream into S-expression trees

use crate::error::{HqlError, ParseErrorKind, SoftError};
use crate::lexer::{tokenize, TemplatePart, Token, TokenKind};
use crate::sexp::{ListKind, Scalar, SExp};
use crate::source::{Position, Span};

/// Read every top-level form in source order.
pub fn read_forms(source: &str) -> Result<Vec<SExp>, HqlError> {
    let tokens = tokenize(source)?;
    check_balance(&tokens)?;
    let mut reader = Reader::new(tokens);
    reader.read_all()
}

/// Read a single form; errors with `EmptyInput` when there is nothing to
/// read. Used for template interpolations and by tooling.
pub fn read_one(source: &str) -> Result<SExp, HqlError> {
    let forms = read_forms(source)?;
    forms.into_iter().next().ok_or(HqlError::Parse {
        kind: ParseErrorKind::EmptyInput,
        pos: Position::start(),
    })
}

/// Best-effort read for tooling: returns whatever parsed plus the list of
/// diagnostics hit along the way. The compile driver treats a non-empty
/// soft-error list as fatal; editor collaborators keep the partial tree.
pub fn read_forms_partial(source: &str) -> (Vec<SExp>, Vec<SoftError>) {
    let tokens = match tokenize(source) {
        Ok(t) => t,
        Err(e) => {
            return (
                Vec::new(),
                vec![SoftError {
                    message: e.to_string(),
                    pos: e.position().unwrap_or(Position::start()),
                }],
            );
        }
    };

    let mut soft = Vec::new();
    if let Err(e) = check_balance(&tokens) {
        soft.push(SoftError {
            message: e.to_string(),
            pos: e.position().unwrap_or(Position::start()),
        });
    }

    let mut reader = Reader::new(tokens);
    let mut forms = Vec::new();
    while !reader.at_end() {
        match reader.read_form() {
            Ok(form) => forms.push(form),
            Err(e) => {
                soft.push(SoftError {
                    message: e.to_string(),
                    pos: e.position().unwrap_or(Position::start()),
                });
                // Skip the offending token and keep going
                reader.bump();
            }
        }
    }
    (forms, soft)
}

// ============================================================================
// Balance pre-pass
// ============================================================================

/// Check delimiter balance before parsing so the first mismatch is reported
/// with a precise position even when the parser would fail later.
fn check_balance(tokens: &[Token]) -> Result<(), HqlError> {
    let mut stack: Vec<(&TokenKind, Position)> = Vec::new();
    for tok in tokens {
        match &tok.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace | TokenKind::HashBrace => {
                stack.push((&tok.kind, tok.span.start));
            }
            TokenKind::RParen => match stack.pop() {
                Some((TokenKind::LParen, _)) => {}
                _ => return Err(unbalanced(tok.span.start)),
            },
            TokenKind::RBracket => match stack.pop() {
                Some((TokenKind::LBracket, _)) => {}
                _ => return Err(unbalanced(tok.span.start)),
            },
            TokenKind::RBrace => match stack.pop() {
                Some((TokenKind::LBrace, _)) | Some((TokenKind::HashBrace, _)) => {}
                _ => return Err(unbalanced(tok.span.start)),
            },
            _ => {}
        }
    }
    if let Some((_, pos)) = stack.pop() {
        return Err(unbalanced(pos));
    }
    Ok(())
}

fn unbalanced(pos: Position) -> HqlError {
    HqlError::Parse {
        kind: ParseErrorKind::Unbalanced,
        pos,
    }
}

// ============================================================================
// Reader
// ============================================================================

struct Reader {
    tokens: Vec<Token>,
    index: usize,
}

impl Reader {
    fn new(tokens: Vec<Token>) -> Self {
        Reader { tokens, index: 0 }
    }

    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.index).cloned();
        self.index += 1;
        tok
    }

    fn read_all(&mut self) -> Result<Vec<SExp>, HqlError> {
        let mut forms = Vec::new();
        while !self.at_end() {
            forms.push(self.read_form()?);
        }
        Ok(forms)
    }

    fn read_form(&mut self) -> Result<SExp, HqlError> {
        let tok = self.bump().ok_or(HqlError::Parse {
            kind: ParseErrorKind::EmptyInput,
            pos: Position::start(),
        })?;
        let span = tok.span;

        match tok.kind {
            TokenKind::Number(n) => Ok(SExp::Literal {
                value: Scalar::Number(n),
                span: Some(span),
            }),
            TokenKind::BigInt(digits) => Ok(SExp::Literal {
                value: Scalar::BigInt(digits),
                span: Some(span),
            }),
            TokenKind::String(s) => Ok(SExp::Literal {
                value: Scalar::String(s),
                span: Some(span),
            }),
            TokenKind::Symbol(name) => self.read_symbol(name, span),
            TokenKind::Template(parts) => self.read_template(parts, span),

            TokenKind::Quote => self.read_prefixed("quote", span),
            TokenKind::Quasiquote => self.read_prefixed("quasiquote", span),
            TokenKind::Unquote => self.read_prefixed("unquote", span),
            TokenKind::UnquoteSplicing => self.read_prefixed("unquote-splicing", span),

            TokenKind::LParen => {
                let (elements, end) = self.read_until(&TokenKind::RParen, span.start)?;
                Ok(SExp::List {
                    elements,
                    kind: ListKind::List,
                    span: Some(Span::new(span.start, end)),
                })
            }
            TokenKind::LBracket => {
                let (elements, end) = self.read_until(&TokenKind::RBracket, span.start)?;
                let mut all = Vec::with_capacity(elements.len() + 1);
                all.push(SExp::symbol("vector"));
                all.extend(elements);
                Ok(SExp::List {
                    elements: all,
                    kind: ListKind::Vector,
                    span: Some(Span::new(span.start, end)),
                })
            }
            TokenKind::LBrace => {
                let (elements, end) = self.read_until(&TokenKind::RBrace, span.start)?;
                if elements.len() % 2 != 0 {
                    return Err(HqlError::Parse {
                        kind: ParseErrorKind::OddMapPayload,
                        pos: span.start,
                    });
                }
                let mut all = Vec::with_capacity(elements.len() + 1);
                all.push(SExp::symbol("hash-map"));
                all.extend(elements);
                Ok(SExp::List {
                    elements: all,
                    kind: ListKind::Map,
                    span: Some(Span::new(span.start, end)),
                })
            }
            TokenKind::HashBrace => {
                let (elements, end) = self.read_until(&TokenKind::RBrace, span.start)?;
                let mut all = Vec::with_capacity(elements.len() + 1);
                all.push(SExp::symbol("hash-set"));
                all.extend(elements);
                Ok(SExp::List {
                    elements: all,
                    kind: ListKind::Set,
                    span: Some(Span::new(span.start, end)),
                })
            }

            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                Err(unbalanced(span.start))
            }
        }
    }

    fn read_symbol(&mut self, name: String, span: Span) -> Result<SExp, HqlError> {
        // The reader never produces nil/true/false as symbols
        let value = match name.as_str() {
            "nil" => Some(Scalar::Nil),
            "true" => Some(Scalar::Bool(true)),
            "false" => Some(Scalar::Bool(false)),
            _ => None,
        };
        if let Some(value) = value {
            return Ok(SExp::Literal {
                value,
                span: Some(span),
            });
        }

        if !valid_dot_usage(&name) {
            return Err(HqlError::Parse {
                kind: ParseErrorKind::DotInvalid,
                pos: span.start,
            });
        }

        Ok(SExp::Symbol {
            name,
            span: Some(span),
        })
    }

    fn read_prefixed(&mut self, head: &str, span: Span) -> Result<SExp, HqlError> {
        let inner = self.read_form()?;
        Ok(SExp::List {
            elements: vec![SExp::symbol(head), inner],
            kind: ListKind::List,
            span: Some(span),
        })
    }

    fn read_template(&mut self, parts: Vec<TemplatePart>, span: Span) -> Result<SExp, HqlError> {
        let mut elements = vec![SExp::symbol("js-template")];
        for part in parts {
            match part {
                TemplatePart::Text(t) => elements.push(SExp::string(t)),
                TemplatePart::Expr(src) => {
                    let forms = read_forms(&src)?;
                    match forms.len() {
                        0 => {
                            return Err(HqlError::Parse {
                                kind: ParseErrorKind::EmptyInput,
                                pos: span.start,
                            });
                        }
                        1 => elements.push(forms.into_iter().next().unwrap()),
                        _ => {
                            // A multi-form interpolation evaluates in order
                            let mut seq = vec![SExp::symbol("do")];
                            seq.extend(forms);
                            elements.push(SExp::list(seq));
                        }
                    }
                }
            }
        }
        Ok(SExp::List {
            elements,
            kind: ListKind::List,
            span: Some(span),
        })
    }

    fn read_until(
        &mut self,
        closer: &TokenKind,
        open_pos: Position,
    ) -> Result<(Vec<SExp>, Position), HqlError> {
        let mut elements = Vec::new();
        loop {
            match self.peek() {
                Some(tok) if &tok.kind == closer => {
                    let end = tok.span.end;
                    self.bump();
                    return Ok((elements, end));
                }
                Some(_) => elements.push(self.read_form()?),
                None => return Err(unbalanced(open_pos)),
            }
        }
    }
}

/// Dots are valid leading (`.method`), as the spread symbol `...`, or
/// separating non-empty identifier segments (`a.b.c`).
fn valid_dot_usage(name: &str) -> bool {
    if !name.contains('.') {
        return true;
    }
    if name == "..." {
        return true;
    }
    if name == "." || name == ".." {
        return false;
    }
    let body = name.strip_prefix('.').unwrap_or(name);
    !body.is_empty() && !body.ends_with('.') && !body.contains("..") && !body.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_literals() {
        let forms = read_forms("42 \"hi\" true false nil").unwrap();
        assert_eq!(forms.len(), 5);
        assert!(matches!(
            &forms[0],
            SExp::Literal {
                value: Scalar::Number(n),
                ..
            } if *n == 42.0
        ));
        assert!(matches!(
            &forms[2],
            SExp::Literal {
                value: Scalar::Bool(true),
                ..
            }
        ));
        assert!(forms[4].is_nil());
    }

    #[test]
    fn test_nil_is_never_a_symbol() {
        let forms = read_forms("nil").unwrap();
        assert!(forms[0].as_symbol().is_none());
    }

    #[test]
    fn test_read_list() {
        let forms = read_forms("(+ 1 2)").unwrap();
        let items = forms[0].as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_symbol("+"));
    }

    #[test]
    fn test_vector_sugar() {
        let forms = read_forms("[1 2 3]").unwrap();
        match &forms[0] {
            SExp::List { elements, kind, .. } => {
                assert_eq!(*kind, ListKind::Vector);
                assert!(elements[0].is_symbol("vector"));
                assert_eq!(elements.len(), 4);
            }
            other => panic!("expected vector, got {:?}", other),
        }
    }

    #[test]
    fn test_map_sugar_and_odd_payload() {
        let forms = read_forms("{\"a\" 1 \"b\" 2}").unwrap();
        match &forms[0] {
            SExp::List { elements, kind, .. } => {
                assert_eq!(*kind, ListKind::Map);
                assert!(elements[0].is_symbol("hash-map"));
                assert_eq!(elements.len(), 5);
            }
            other => panic!("expected map, got {:?}", other),
        }

        let err = read_forms("{\"a\" 1 \"b\"}").unwrap_err();
        assert!(matches!(
            err,
            HqlError::Parse {
                kind: ParseErrorKind::OddMapPayload,
                ..
            }
        ));
    }

    #[test]
    fn test_set_sugar() {
        let forms = read_forms("#{1 2}").unwrap();
        match &forms[0] {
            SExp::List { elements, kind, .. } => {
                assert_eq!(*kind, ListKind::Set);
                assert!(elements[0].is_symbol("hash-set"));
            }
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_quote_family_desugars() {
        let forms = read_forms("'x `y ~z ~@w").unwrap();
        assert_eq!(forms[0].head_symbol(), Some("quote"));
        assert_eq!(forms[1].head_symbol(), Some("quasiquote"));
        assert_eq!(forms[2].head_symbol(), Some("unquote"));
        assert_eq!(forms[3].head_symbol(), Some("unquote-splicing"));
    }

    #[test]
    fn test_unbalanced_reported_early() {
        let err = read_forms("(1 2").unwrap_err();
        assert!(matches!(
            err,
            HqlError::Parse {
                kind: ParseErrorKind::Unbalanced,
                ..
            }
        ));

        let err = read_forms(")").unwrap_err();
        assert!(matches!(
            err,
            HqlError::Parse {
                kind: ParseErrorKind::Unbalanced,
                ..
            }
        ));
    }

    #[test]
    fn test_template_reads_embedded_forms() {
        let forms = read_forms("`a ${(+ 1 2)} b`").unwrap();
        let items = forms[0].as_list().unwrap();
        assert!(items[0].is_symbol("js-template"));
        assert_eq!(items[2].head_symbol(), Some("+"));
    }

    #[test]
    fn test_dot_invalid() {
        assert!(matches!(
            read_forms("a..b").unwrap_err(),
            HqlError::Parse {
                kind: ParseErrorKind::DotInvalid,
                ..
            }
        ));
        assert!(read_forms("a.b.c").is_ok());
        assert!(read_forms(".method").is_ok());
        assert!(read_forms("...").is_ok());
    }

    #[test]
    fn test_round_trip_render() {
        let src = "(fn add [a b] (+ a b))";
        let forms = read_forms(src).unwrap();
        let rendered = forms[0].render();
        let reread = read_forms(&rendered).unwrap();
        // Structural equality modulo spans
        assert_eq!(reread[0].render(), rendered);
    }

    #[test]
    fn test_partial_read_keeps_going() {
        let (forms, soft) = read_forms_partial("(+ 1 2) )");
        assert_eq!(forms.len(), 1);
        assert!(!soft.is_empty());
    }

    #[test]
    fn test_spans_present_on_read_nodes() {
        let forms = read_forms("(foo)").unwrap();
        assert!(!forms[0].is_synthetic());
    }
}
