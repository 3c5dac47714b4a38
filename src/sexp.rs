// ABOUTME: S-expression AST nodes produced by the reader and consumed by the expander

use crate::source::Span;
use std::fmt;

/// Scalar payload of a literal node.
///
/// Numbers are f64 with integer subtyping: whole values render without a
/// decimal point. BigInts keep their digit string since they do not fit f64.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    BigInt(String),
    String(String),
    Bool(bool),
    Nil,
}

/// Surface form a list was read from. Vector/Map/Set are reader sugar that
/// lower to head-symbol lists; the kind preserves the original shape for
/// diagnostics and for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    List,
    Vector,
    Map,
    Set,
}

/// An S-expression node. Nodes without a span are synthetic (generated by
/// macro expansion or by the compiler itself).
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Literal { value: Scalar, span: Option<Span> },
    Symbol { name: String, span: Option<Span> },
    List {
        elements: Vec<SExp>,
        kind: ListKind,
        span: Option<Span>,
    },
}

impl SExp {
    // ===== Synthetic constructors =====

    pub fn symbol(name: impl Into<String>) -> Self {
        SExp::Symbol {
            name: name.into(),
            span: None,
        }
    }

    pub fn num(n: f64) -> Self {
        SExp::Literal {
            value: Scalar::Number(n),
            span: None,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        SExp::Literal {
            value: Scalar::String(s.into()),
            span: None,
        }
    }

    pub fn bool(b: bool) -> Self {
        SExp::Literal {
            value: Scalar::Bool(b),
            span: None,
        }
    }

    pub fn nil() -> Self {
        SExp::Literal {
            value: Scalar::Nil,
            span: None,
        }
    }

    pub fn list(elements: Vec<SExp>) -> Self {
        SExp::List {
            elements,
            kind: ListKind::List,
            span: None,
        }
    }

    /// A vector form: `(vector e1 e2 ...)` tagged with `ListKind::Vector`.
    pub fn vector(elements: Vec<SExp>) -> Self {
        let mut all = Vec::with_capacity(elements.len() + 1);
        all.push(SExp::symbol("vector"));
        all.extend(elements);
        SExp::List {
            elements: all,
            kind: ListKind::Vector,
            span: None,
        }
    }

    // ===== Accessors =====

    pub fn span(&self) -> Option<Span> {
        match self {
            SExp::Literal { span, .. } | SExp::Symbol { span, .. } | SExp::List { span, .. } => {
                *span
            }
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.span().is_none()
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            SExp::Symbol { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List { elements, .. } => Some(elements),
            _ => None,
        }
    }

    /// The head symbol of a list form, if it has one.
    pub fn head_symbol(&self) -> Option<&str> {
        self.as_list().and_then(|es| es.first()).and_then(SExp::as_symbol)
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    pub fn is_nil(&self) -> bool {
        matches!(
            self,
            SExp::Literal {
                value: Scalar::Nil,
                ..
            }
        )
    }

    /// The payload of a vector form (elements after the `vector` head), or
    /// the raw elements of a plain list. Used by callers that accept either
    /// `(a b c)` or `[a b c]` in binding position.
    pub fn seq_elements(&self) -> Option<&[SExp]> {
        match self {
            SExp::List {
                elements,
                kind: ListKind::Vector,
                ..
            } => Some(&elements[1..]),
            SExp::List { elements, .. } => Some(elements),
            _ => None,
        }
    }

    /// Render back to readable surface syntax. Reader sugar is restored:
    /// vectors as `[...]`, maps as `{...}`, sets as `#{...}`, and the quote
    /// family back to its prefix characters.
    pub fn render(&self) -> String {
        format!("{}", self)
    }
}

fn write_spaced(f: &mut fmt::Formatter<'_>, items: &[SExp]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Literal { value, .. } => match value {
                Scalar::Number(n) => {
                    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                        write!(f, "{}", *n as i64)
                    } else {
                        write!(f, "{}", n)
                    }
                }
                Scalar::BigInt(digits) => write!(f, "{}n", digits),
                Scalar::String(s) => write!(f, "{:?}", s),
                Scalar::Bool(b) => write!(f, "{}", b),
                Scalar::Nil => write!(f, "nil"),
            },
            SExp::Symbol { name, .. } => write!(f, "{}", name),
            SExp::List { elements, kind, .. } => match kind {
                ListKind::Vector => {
                    write!(f, "[")?;
                    write_spaced(f, &elements[1..])?;
                    write!(f, "]")
                }
                ListKind::Map => {
                    write!(f, "{{")?;
                    write_spaced(f, &elements[1..])?;
                    write!(f, "}}")
                }
                ListKind::Set => {
                    write!(f, "#{{")?;
                    write_spaced(f, &elements[1..])?;
                    write!(f, "}}")
                }
                ListKind::List => {
                    // Quote family renders back to its sugar
                    if elements.len() == 2 {
                        if let Some(head) = elements[0].as_symbol() {
                            let prefix = match head {
                                "quote" => Some("'"),
                                "quasiquote" => Some("`"),
                                "unquote" => Some("~"),
                                "unquote-splicing" => Some("~@"),
                                _ => None,
                            };
                            if let Some(p) = prefix {
                                return write!(f, "{}{}", p, elements[1]);
                            }
                        }
                    }
                    write!(f, "(")?;
                    write_spaced(f, elements)?;
                    write!(f, ")")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(SExp::num(42.0).render(), "42");
        assert_eq!(SExp::num(-2.5).render(), "-2.5");
        assert_eq!(SExp::num(0.0).render(), "0");
    }

    #[test]
    fn test_string_display_escapes() {
        assert_eq!(SExp::string("hi").render(), "\"hi\"");
        assert_eq!(SExp::string("a\nb").render(), "\"a\\nb\"");
    }

    #[test]
    fn test_list_display() {
        let l = SExp::list(vec![SExp::symbol("+"), SExp::num(1.0), SExp::num(2.0)]);
        assert_eq!(l.render(), "(+ 1 2)");
    }

    #[test]
    fn test_vector_display_restores_sugar() {
        let v = SExp::vector(vec![SExp::num(1.0), SExp::num(2.0)]);
        assert_eq!(v.render(), "[1 2]");
    }

    #[test]
    fn test_quote_display_restores_sugar() {
        let q = SExp::list(vec![SExp::symbol("quote"), SExp::symbol("x")]);
        assert_eq!(q.render(), "'x");

        let uqs = SExp::list(vec![SExp::symbol("unquote-splicing"), SExp::symbol("xs")]);
        assert_eq!(uqs.render(), "~@xs");
    }

    #[test]
    fn test_head_symbol() {
        let l = SExp::list(vec![SExp::symbol("fn"), SExp::symbol("f")]);
        assert_eq!(l.head_symbol(), Some("fn"));
        assert_eq!(SExp::num(1.0).head_symbol(), None);
    }

    #[test]
    fn test_seq_elements_strips_vector_head() {
        let v = SExp::vector(vec![SExp::symbol("a"), SExp::symbol("b")]);
        let es = v.seq_elements().unwrap();
        assert_eq!(es.len(), 2);
        assert!(es[0].is_symbol("a"));
    }

    #[test]
    fn test_synthetic_nodes_have_no_span() {
        assert!(SExp::symbol("x").is_synthetic());
        assert!(SExp::nil().is_synthetic());
    }
}
