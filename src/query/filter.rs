//! Where clause: the list of predicates, implicitly ANDed.

use serde::Serialize;

use crate::ast::Term;
use crate::error::{RqlError, RqlResult};
use crate::schema::Backend;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Where {
    pub terms: Vec<Term>,
}

impl Where {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }

    /// Re-check every predicate against `backend`. The compilers rely on
    /// the argument shapes this guarantees.
    pub fn validate(&self, backend: Backend) -> RqlResult<()> {
        self.terms
            .iter()
            .try_for_each(|term| validate_predicate(term, backend))
    }

    /// All predicates as one term: the single predicate or an `and(...)`.
    pub fn to_term(&self) -> Option<Term> {
        match self.terms.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            terms => Some(Term::func("and", terms.iter().cloned())),
        }
    }

    /// Top-level predicates with `and` flattened.
    pub fn conjuncts(&self) -> Vec<&Term> {
        fn flatten<'a>(term: &'a Term, out: &mut Vec<&'a Term>) {
            if term.is_named("and") {
                for arg in term.args() {
                    flatten(arg, out);
                }
            } else {
                out.push(term);
            }
        }
        let mut out = Vec::new();
        for term in &self.terms {
            flatten(term, &mut out);
        }
        out
    }
}

/// Check that a predicate is accepted by `backend` and has a usable shape.
pub fn validate_predicate(term: &Term, backend: Backend) -> RqlResult<()> {
    let Term::Function { name, args } = term else {
        return Err(RqlError::validation(term, "expected a predicate"));
    };
    if !backend.accepts(name) {
        return Err(RqlError::syntax(
            term.to_string(),
            format!("'{}' is not a {} filter function", name, backend),
        ));
    }

    match name.as_str() {
        "and" | "or" => {
            if args.is_empty() || args.iter().any(|a| !a.is_function()) {
                return Err(RqlError::validation(term, "expects one or more predicates"));
            }
            for arg in args {
                validate_predicate(arg, backend)?;
            }
        }
        "not" => match args.as_slice() {
            [inner] if inner.is_function() => validate_predicate(inner, backend)?,
            _ => return Err(RqlError::validation(term, "expects exactly one predicate")),
        },
        "n" | "nn" | "emp" | "nemp" | "attribute_exists" | "attribute_not_exists" => {
            if args.is_empty() || args.iter().any(|a| !a.is_leaf()) {
                return Err(RqlError::validation(term, "expects one or more columns"));
            }
        }
        "lt" | "le" | "gt" | "ge" | "like" => {
            if args.len() != 2 {
                return Err(RqlError::validation(term, "expects a column and one value"));
            }
            column_and_values(term)?;
        }
        _ => {
            if args.len() < 2 {
                return Err(RqlError::validation(term, "expects a column and a value"));
            }
            column_and_values(term)?;
        }
    }
    Ok(())
}

fn column_and_values(term: &Term) -> RqlResult<()> {
    let args = term.args();
    if !args[0].is_leaf() {
        return Err(RqlError::validation(term, "first argument must be a column"));
    }
    if args[1..].iter().any(Term::is_function) {
        return Err(RqlError::validation(term, "values must be literals"));
    }
    Ok(())
}
