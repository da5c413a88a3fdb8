//! Backend-agnostic query model.
//!
//! A [`Query`] groups parsed terms into clauses. It is built once per
//! request and consumed by exactly one compiler.

pub mod filter;
pub mod order;
pub mod page;
pub mod select;

use serde::Serialize;

use crate::ast::functions::{AGGREGATE, ROOT_ONLY};
use crate::ast::Term;
use crate::error::{RqlError, RqlResult};
use crate::parser;
use crate::schema::Backend;

pub use filter::{validate_predicate, Where};
pub use order::{Direction, Group, Order, Sort};
pub use page::{Page, PageWindow};
pub use select::{Projection, Select};

/// Parameters owned by other request collaborators.
const SKIPPED_PARAMS: &[&str] = &["expands"];

/// `join(table,alias,left,right[,left,right...])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub on: Vec<(String, String)>,
    /// Canonical term text, used to collapse duplicates.
    pub key: String,
}

impl Join {
    pub fn from_term(term: &Term) -> RqlResult<Self> {
        let args = term.args();
        if args.len() < 4 || args.len() % 2 != 0 || args.iter().any(|a| !a.is_leaf()) {
            return Err(RqlError::validation(
                term,
                "expected join(table,alias,leftColumn,rightColumn...)",
            ));
        }
        Ok(Join {
            table: args[0].token().to_string(),
            alias: args[1].token().to_string(),
            on: args[2..]
                .chunks(2)
                .map(|pair| (pair[0].token().to_string(), pair[1].token().to_string()))
                .collect(),
            key: term.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    pub backend: Backend,
    pub select: Select,
    pub filter: Where,
    pub group: Group,
    pub order: Order,
    pub page: Page,
    pub joins: Vec<Join>,
}

impl Query {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    /// Parse an `&` separated query string.
    pub fn parse(input: &str, backend: Backend) -> RqlResult<Self> {
        Self::from_terms(parser::parse_all(input)?, backend)
    }

    /// Build from raw query-string parameters.
    pub fn from_params<I, K, V>(params: I, backend: Backend) -> RqlResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::new(backend);
        for (key, value) in params {
            let key = key.as_ref();
            if SKIPPED_PARAMS.iter().any(|p| p.eq_ignore_ascii_case(key)) {
                continue;
            }
            query.with_term(parser::parse_param(key, value.as_ref())?)?;
        }
        Ok(query)
    }

    pub fn from_terms(terms: impl IntoIterator<Item = Term>, backend: Backend) -> RqlResult<Self> {
        let mut query = Self::new(backend);
        for term in terms {
            query.with_term(term)?;
        }
        Ok(query)
    }

    /// Route one root term into its clause.
    pub fn with_term(&mut self, term: Term) -> RqlResult<()> {
        check_nesting(&term)?;

        match term.token() {
            "includes" => {
                for arg in term.args() {
                    self.include(arg)?;
                }
            }
            "excludes" => {
                for arg in term.args() {
                    if !arg.is_leaf() {
                        return Err(RqlError::validation(&term, "excludes takes columns"));
                    }
                    self.select.excludes.push(arg.token().to_string());
                }
            }
            "distinct" => {
                self.select.distinct = true;
                for arg in term.args() {
                    self.include(arg)?;
                }
            }
            "sum" | "count" | "min" | "max" => self.include(&term)?,
            "as" => match term.args() {
                [expr, alias] if alias.is_leaf() => self.select.projections.push(Projection {
                    expr: expr.clone(),
                    alias: Some(alias.token().to_string()),
                }),
                _ => return Err(RqlError::validation(&term, "expected as(expression,alias)")),
            },
            "sort" | "order" => self.order.add(&term)?,
            "group" => self.group.add(&term)?,
            "limit" | "offset" | "page" | "pagesize" | "after" => self.page.set(&term)?,
            "join" => {
                let join = Join::from_term(&term)?;
                if !self.joins.iter().any(|j| j.key == join.key) {
                    self.joins.push(join);
                }
            }
            "if" => {
                return Err(RqlError::validation(&term, "if() is only valid inside an aggregate"));
            }
            _ => {
                validate_predicate(&term, self.backend)?;
                self.filter.push(term);
            }
        }
        Ok(())
    }

    fn include(&mut self, arg: &Term) -> RqlResult<()> {
        match arg {
            Term::Leaf { token, .. } => {
                if !self.select.includes.contains(token) {
                    self.select.includes.push(token.clone());
                }
            }
            func if func.is_any_of(AGGREGATE) => {
                if func.args().len() != 1 {
                    return Err(RqlError::validation(func, "aggregates take one argument"));
                }
                self.select.projections.push(Projection::new(func.clone()));
            }
            other => {
                return Err(RqlError::validation(other, "not a column or aggregate"));
            }
        }
        Ok(())
    }

    pub fn is_aggregate(&self) -> bool {
        !self.select.projections.is_empty() || !self.group.is_empty()
    }
}

/// Root-only functions may not be nested, and `distinct` nests only
/// directly inside another aggregate.
fn check_nesting(term: &Term) -> RqlResult<()> {
    let mut result = Ok(());
    term.walk(&mut |node, ancestors| {
        if result.is_err() || ancestors.is_empty() || !node.is_function() {
            return;
        }
        let name = node.token();
        if ROOT_ONLY.contains(&name) {
            result = Err(RqlError::validation(
                node,
                format!("{}() is only valid at the root of a clause", name),
            ));
        } else if name == "distinct"
            && !ancestors
                .last()
                .is_some_and(|p| p.is_any_of(&["sum", "count", "min", "max"]))
        {
            result = Err(RqlError::validation(
                node,
                "distinct() may only be nested inside an aggregate",
            ));
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_params() {
        let query = Query::from_params(
            [("sort", "-orderid"), ("limit", "2"), ("expands", "customer")],
            Backend::Relational,
        )
        .unwrap();
        assert_eq!(query.order.sorts, vec![Sort::desc("orderid")]);
        assert_eq!(query.page.limit, Some(2));
        assert!(query.filter.is_empty());
    }

    #[test]
    fn test_clause_routing() {
        let query = Query::parse(
            "eq(a,1)&includes(a,b,count(*))&excludes(c)&group(a)&page(2)&join(c,x,a,b)",
            Backend::Relational,
        )
        .unwrap();
        assert_eq!(query.filter.terms.len(), 1);
        assert_eq!(query.select.includes, vec!["a", "b"]);
        assert_eq!(query.select.excludes, vec!["c"]);
        assert_eq!(query.select.projections.len(), 1);
        assert_eq!(query.group.columns, vec!["a"]);
        assert_eq!(query.page.page, Some(2));
        assert_eq!(query.joins[0].on, vec![("a".to_string(), "b".to_string())]);
    }

    #[test]
    fn test_duplicate_joins_collapse() {
        let query = Query::parse(
            "join(customers,c,customerid,customerid)&join(customers,c,customerid,customerid)",
            Backend::Relational,
        )
        .unwrap();
        assert_eq!(query.joins.len(), 1);
    }

    #[test]
    fn test_nested_root_only_functions() {
        for bad in ["and(includes(a))", "or(eq(a,1),sort(b))", "sum(distinct(a))&and(distinct(a))"] {
            let err = Query::parse(bad, Backend::Relational).unwrap_err();
            assert!(matches!(err, RqlError::Validation { .. }), "{}", bad);
        }
        assert!(Query::parse("count(distinct(a))", Backend::Relational).is_ok());
    }

    #[test]
    fn test_unknown_where_function_for_backend() {
        let err = Query::parse("attribute_exists(a)", Backend::Search).unwrap_err();
        assert!(matches!(err, RqlError::Syntax { .. }));
    }
}
