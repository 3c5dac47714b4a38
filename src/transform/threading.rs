//! Threading forms `->`, `->>`, `as->`.
//!
//! These lower completely at transform time into nested calls; nothing of
//! the pipeline shape survives into the IR. The optimizer double-checks
//! that no residue remains.

use super::start_pos;
use crate::error::HqlError;
use crate::sexp::SExp;

/// Rewrite a threading form into the equivalent nested call form.
pub(crate) fn rewrite_threading(form: &SExp) -> Result<SExp, HqlError> {
    let elements = form.as_list().unwrap();
    let head = elements[0].as_symbol().unwrap();
    if elements.len() < 2 {
        return Err(HqlError::syntax(
            format!("{}: expected an initial value", head),
            start_pos(form),
        ));
    }

    match head {
        "->" => Ok(thread_steps(&elements[1], &elements[2..], true)),
        "->>" => Ok(thread_steps(&elements[1], &elements[2..], false)),
        "as->" => {
            let name = elements.get(2).and_then(SExp::as_symbol).ok_or_else(|| {
                HqlError::syntax("as->: expected a placeholder symbol", start_pos(form))
            })?;
            let mut acc = elements[1].clone();
            for step in &elements[3..] {
                acc = substitute(step, name, &acc);
            }
            Ok(acc)
        }
        _ => unreachable!("rewrite_threading called for {}", head),
    }
}

/// `first` inserts the accumulator right after the head (`->`); otherwise
/// it is appended as the last argument (`->>`).
fn thread_steps(init: &SExp, steps: &[SExp], first: bool) -> SExp {
    let mut acc = init.clone();
    for step in steps {
        acc = match step.as_list() {
            Some(items) if !items.is_empty() => {
                let mut out = Vec::with_capacity(items.len() + 1);
                if first {
                    out.push(items[0].clone());
                    out.push(acc);
                    out.extend_from_slice(&items[1..]);
                } else {
                    out.extend_from_slice(items);
                    out.push(acc);
                }
                SExp::list(out)
            }
            // A bare symbol step is a one-argument call
            _ => SExp::list(vec![step.clone(), acc]),
        };
    }
    acc
}

/// Clone `form` with every occurrence of the placeholder symbol replaced.
fn substitute(form: &SExp, name: &str, replacement: &SExp) -> SExp {
    match form {
        SExp::Symbol { name: n, .. } if n == name => replacement.clone(),
        SExp::List {
            elements,
            kind,
            span,
        } => SExp::List {
            elements: elements
                .iter()
                .map(|e| substitute(e, name, replacement))
                .collect(),
            kind: *kind,
            span: *span,
        },
        other => other.clone(),
    }
}
