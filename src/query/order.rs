//! Sort and group clauses.

use std::fmt;

use nom::{
    IResult,
    branch::alt,
    character::complete::char,
    combinator::{opt, rest},
    sequence::pair,
};
use serde::Serialize;

use crate::ast::Term;
use crate::error::{RqlError, RqlResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sort {
    pub column: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// `-col`, `+col` or `col`.
fn sort_spec(input: &str) -> IResult<&str, (Option<char>, &str)> {
    pair(opt(alt((char('-'), char('+')))), rest)(input)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Order {
    pub sorts: Vec<Sort>,
}

impl Order {
    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }

    /// Append the arguments of a `sort(...)` term.
    pub fn add(&mut self, term: &Term) -> RqlResult<()> {
        if term.args().is_empty() {
            return Err(RqlError::validation(term, "sort needs at least one column"));
        }
        for arg in term.args() {
            if !arg.is_leaf() {
                return Err(RqlError::validation(term, "sort arguments must be columns"));
            }
            let (_, (sign, column)) = sort_spec(arg.token())
                .map_err(|_| RqlError::validation(term, "malformed sort column"))?;
            let column = column.trim();
            if column.is_empty() {
                return Err(RqlError::validation(term, "empty sort column"));
            }
            self.sorts.push(Sort {
                column: column.to_string(),
                direction: if sign == Some('-') {
                    Direction::Desc
                } else {
                    Direction::Asc
                },
            });
        }
        Ok(())
    }

    pub fn first(&self) -> Option<&Sort> {
        self.sorts.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Group {
    pub columns: Vec<String>,
}

impl Group {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn add(&mut self, term: &Term) -> RqlResult<()> {
        if term.args().is_empty() {
            return Err(RqlError::validation(term, "group needs at least one column"));
        }
        for arg in term.args() {
            if !arg.is_leaf() {
                return Err(RqlError::validation(term, "group arguments must be columns"));
            }
            if !self.columns.iter().any(|c| c == arg.token()) {
                self.columns.push(arg.token().to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_sort_directions() {
        let mut order = Order::default();
        order.add(&parse("sort(-orderid,+name,city)").unwrap()).unwrap();
        assert_eq!(
            order.sorts,
            vec![Sort::desc("orderid"), Sort::asc("name"), Sort::asc("city")]
        );
    }

    #[test]
    fn test_sort_rejects_functions() {
        let mut order = Order::default();
        assert!(order.add(&parse("sort(count(*))").unwrap()).is_err());
        assert!(order.add(&parse("sort(-)").unwrap()).is_err());
    }

    #[test]
    fn test_group_dedupes() {
        let mut group = Group::default();
        group.add(&parse("group(a,b,a)").unwrap()).unwrap();
        assert_eq!(group.columns, vec!["a", "b"]);
    }
}
