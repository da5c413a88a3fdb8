//! The parsed query term tree.

use std::fmt;

use serde::{Serialize, Serializer};

use super::value::is_number;

/// Quote used for identifiers (column references).
pub const IDENT_QUOTE: char = '`';
/// Quote used when the parser turns a bare value into a string literal.
pub const STRING_QUOTE: char = '\'';

/// A node of a parsed clause.
///
/// Argument order is significant: in `eq(col,val)` the first argument is
/// the column and the second the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A function call such as `eq(...)`, `and(...)` or `sort(...)`.
    Function { name: String, args: Vec<Term> },
    /// A literal or identifier, with the quote it was written in.
    Leaf { token: String, quote: Option<char> },
}

impl Term {
    /// Build a function term. Function names are case-insensitive.
    pub fn func(name: impl AsRef<str>, args: impl IntoIterator<Item = Term>) -> Self {
        Term::Function {
            name: super::functions::canonical(name.as_ref()),
            args: args.into_iter().collect(),
        }
    }

    /// Build an unquoted leaf.
    pub fn leaf(token: impl Into<String>) -> Self {
        Term::Leaf {
            token: token.into(),
            quote: None,
        }
    }

    /// Build a leaf written inside `quote`.
    pub fn quoted(token: impl Into<String>, quote: char) -> Self {
        Term::Leaf {
            token: token.into(),
            quote: Some(quote),
        }
    }

    /// Column reference leaf.
    pub fn ident(name: impl Into<String>) -> Self {
        Self::quoted(name, IDENT_QUOTE)
    }

    /// String literal leaf.
    pub fn string(value: impl Into<String>) -> Self {
        Self::quoted(value, STRING_QUOTE)
    }

    /// Function name or leaf text.
    pub fn token(&self) -> &str {
        match self {
            Term::Function { name, .. } => name,
            Term::Leaf { token, .. } => token,
        }
    }

    pub fn args(&self) -> &[Term] {
        match self {
            Term::Function { args, .. } => args,
            Term::Leaf { .. } => &[],
        }
    }

    pub fn arg(&self, index: usize) -> Option<&Term> {
        self.args().get(index)
    }

    pub fn quote(&self) -> Option<char> {
        match self {
            Term::Leaf { quote, .. } => *quote,
            Term::Function { .. } => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Term::Function { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Term::Leaf { .. })
    }

    /// True for a function term called `name`.
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Term::Function { name: n, .. } if n == name)
    }

    /// True for a function term whose name is in `names`.
    pub fn is_any_of(&self, names: &[&str]) -> bool {
        matches!(self, Term::Function { name, .. } if names.contains(&name.as_str()))
    }

    /// Backtick-quoted leaf naming a column.
    pub fn is_identifier(&self) -> bool {
        self.quote() == Some(IDENT_QUOTE)
    }

    /// Leaf written in single or double quotes.
    pub fn is_string(&self) -> bool {
        matches!(self.quote(), Some('\'') | Some('"'))
    }

    /// Unquoted numeric leaf.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Term::Leaf { token, quote: None } if is_number(token))
    }

    /// Unquoted `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Term::Leaf { token, quote: None } if token == "null")
    }

    /// Visit every node depth-first. The callback receives the node and its
    /// ancestors, nearest last, so `ancestors.last()` is the parent.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a Term, &[&'a Term]),
    {
        let mut ancestors = Vec::new();
        self.walk_inner(&mut ancestors, visit);
    }

    fn walk_inner<'a, F>(&'a self, ancestors: &mut Vec<&'a Term>, visit: &mut F)
    where
        F: FnMut(&'a Term, &[&'a Term]),
    {
        visit(self, ancestors);
        if let Term::Function { args, .. } = self {
            ancestors.push(self);
            for arg in args {
                arg.walk_inner(ancestors, visit);
            }
            ancestors.pop();
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, token: &str, specials: &[char]) -> fmt::Result {
    for c in token.chars() {
        if specials.contains(&c) {
            write!(f, "\\{}", c)?;
        } else {
            write!(f, "{}", c)?;
        }
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Term::Leaf {
                token,
                quote: Some(q),
            } => {
                write!(f, "{}", q)?;
                write_escaped(f, token, &['\\', *q])?;
                write!(f, "{}", q)
            }
            Term::Leaf { token, quote: None } => write_escaped(f, token, &['\\', ',', '=']),
        }
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_function() {
        let term = Term::func(
            "EQ",
            [Term::ident("orderid"), Term::leaf("10257")],
        );
        assert_eq!(term.to_string(), "eq(`orderid`,10257)");
    }

    #[test]
    fn test_display_escapes_separators() {
        assert_eq!(Term::leaf("c,d").to_string(), "c\\,d");
        assert_eq!(Term::string("c,d").to_string(), "'c,d'");
        assert_eq!(Term::string("a\\b").to_string(), "'a\\\\b'");
    }

    #[test]
    fn test_leaf_classification() {
        assert!(Term::leaf("-12.5").is_numeric());
        assert!(!Term::string("12").is_numeric());
        assert!(Term::leaf("null").is_null());
        assert!(Term::ident("a").is_identifier());
        assert!(Term::quoted("a", '"').is_string());
    }

    #[test]
    fn test_walk_reports_parent() {
        let term = Term::func(
            "and",
            [Term::func("eq", [Term::ident("a"), Term::leaf("1")])],
        );
        let mut parents = Vec::new();
        term.walk(&mut |node, ancestors| {
            if node.is_leaf() {
                parents.push(ancestors.last().map(|p| p.token().to_string()));
            }
        });
        assert_eq!(parents, vec![Some("eq".to_string()), Some("eq".to_string())]);
    }
}
