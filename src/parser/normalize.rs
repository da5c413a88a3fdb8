//! Post-parse literal classification.
//!
//! After parsing, every comparison has its column in identifier quotes and
//! its values either bare (numbers, `true`, `false`, `null`) or string
//! quoted. Compilers rely on this and never re-classify leaves.

use crate::ast::functions::{AGGREGATE, COMPARISON, IF, NULL_CHECKS};
use crate::ast::Term;

/// Classify the leaves of a parsed term.
pub fn normalize(term: Term) -> Term {
    let Term::Function { name, args } = term else {
        return term;
    };

    if name == "wo" {
        return Term::func("not", [normalize(Term::func("w", args))]);
    }

    let args = match name.as_str() {
        n if COMPARISON.contains(&n) => {
            let mut out = Vec::with_capacity(args.len());
            for (i, arg) in args.into_iter().enumerate() {
                if i == 0 {
                    out.push(identifier(arg));
                } else {
                    out.push(strip_wildcards(n, literal(arg)));
                }
            }
            out
        }
        n if NULL_CHECKS.contains(&n) => args.into_iter().map(identifier).collect(),
        n if AGGREGATE.contains(&n) => args
            .into_iter()
            .map(|arg| match arg {
                Term::Leaf { token, quote: None } if token == "*" => Term::leaf(token),
                leaf @ Term::Leaf { .. } => identifier(leaf),
                func => normalize(func),
            })
            .collect(),
        IF => args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| if i == 0 { normalize(arg) } else { literal(arg) })
            .collect(),
        _ => args
            .into_iter()
            .map(|arg| if arg.is_function() { normalize(arg) } else { arg })
            .collect(),
    };
    Term::Function { name, args }
}

/// Column position: bare names become identifiers.
fn identifier(term: Term) -> Term {
    match term {
        Term::Leaf { token, quote: None } if !crate::ast::is_number(&token) => Term::ident(token),
        Term::Function { .. } => normalize(term),
        other => other,
    }
}

/// Value position: everything that is not a number or keyword is a string.
fn literal(term: Term) -> Term {
    match term {
        Term::Leaf { token, quote: None } => {
            let lower = token.to_ascii_lowercase();
            if crate::ast::is_number(&token) {
                Term::leaf(token)
            } else if matches!(lower.as_str(), "true" | "false" | "null") {
                Term::leaf(lower)
            } else {
                Term::string(token)
            }
        }
        Term::Function { .. } => normalize(term),
        other => other,
    }
}

/// `sw`, `ew` and `w` imply their wildcards, so user supplied ones are
/// dropped to keep the compiled pattern from doubling them.
fn strip_wildcards(name: &str, term: Term) -> Term {
    let Term::Leaf {
        token,
        quote: Some(q),
    } = term
    else {
        return term;
    };
    if q == crate::ast::term::IDENT_QUOTE {
        return Term::Leaf {
            token,
            quote: Some(q),
        };
    }
    let stripped = match name {
        "sw" => token.trim_end_matches('*'),
        "ew" => token.trim_start_matches('*'),
        "w" => token.trim_matches('*'),
        _ => token.as_str(),
    };
    Term::quoted(stripped, q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_comparison_classification() {
        let term = parse("eq(name,Bob)").unwrap();
        assert_eq!(term.to_string(), "eq(`name`,'Bob')");

        let term = parse("in(id,1,2,TRUE,Null)").unwrap();
        assert_eq!(term.to_string(), "in(`id`,1,2,true,null)");
    }

    #[test]
    fn test_without_rewrite() {
        let term = parse("wo(name,*bob*)").unwrap();
        assert_eq!(term.to_string(), "not(w(`name`,'bob'))");
    }

    #[test]
    fn test_aggregate_arguments() {
        let term = parse("includes(count(*),sum(freight))").unwrap();
        assert_eq!(term.to_string(), "includes(count(*),sum(`freight`))");
    }

    #[test]
    fn test_structural_arguments_stay_bare() {
        let term = parse("sort(-orderid,+name)").unwrap();
        assert_eq!(term.to_string(), "sort(-orderid,+name)");
    }
}
