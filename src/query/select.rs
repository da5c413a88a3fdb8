//! Select clause: column restriction, aggregates and distinct.

use serde::Serialize;

use crate::ast::Term;

/// A computed column such as `sum(freight)` or `as(count(*),total)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub expr: Term,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Projection {
    pub fn new(expr: Term) -> Self {
        Self { expr, alias: None }
    }

    /// Output column name: the explicit alias, or the function names down
    /// the first argument, ending at the column (`sum_freight`,
    /// `count_distinct_shipcity`, `sum_if`).
    pub fn alias(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        let mut parts = vec![self.expr.token()];
        let mut next = self.expr.arg(0);
        while let Some(arg) = next {
            next = None;
            match arg {
                Term::Leaf { token, .. } if token != "*" => parts.push(token),
                Term::Leaf { .. } => {}
                Term::Function { name, .. } => {
                    parts.push(name);
                    if name == "distinct" {
                        next = arg.arg(0);
                    }
                }
            }
        }
        parts.join("_")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Select {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub distinct: bool,
    pub projections: Vec<Projection>,
}

fn path_matches(pattern: &str, property: &str) -> bool {
    if pattern == "*" || pattern.eq_ignore_ascii_case(property) {
        return true;
    }
    property.len() > pattern.len()
        && property.as_bytes()[pattern.len()] == b'.'
        && property[..pattern.len()].eq_ignore_ascii_case(pattern)
}

impl Select {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.projections.is_empty() && !self.distinct
    }

    /// Whether `property` (a name or dotted path) survives the
    /// includes/excludes lists.
    ///
    /// An explicit exclude always wins, `href` included. When includes are
    /// present `href` is kept even if it is not listed.
    pub fn is_included(&self, property: &str) -> bool {
        if self.excludes.iter().any(|e| path_matches(e, property)) {
            return false;
        }
        if self.includes.is_empty() {
            return true;
        }
        property.eq_ignore_ascii_case("href")
            || self.includes.iter().any(|i| path_matches(i, property))
    }
}
