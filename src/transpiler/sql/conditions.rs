//! Predicate and expression rendering for the relational compiler.

use crate::ast::{Term, Value};
use crate::error::{RqlError, RqlResult};
use crate::schema::Collection;
use crate::transpiler::traits::{qualified, SqlGenerator};
use crate::transpiler::wildcard;

/// Context for parameterized query building.
#[derive(Debug, Default)]
pub struct ParamContext {
    /// Current parameter index (1-based for Postgres $1, $2, etc.)
    pub index: usize,
    /// Collected parameter values in order
    pub params: Vec<Value>,
}

impl ParamContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return the placeholder for it.
    pub fn add_param(&mut self, value: Value, generator: &dyn SqlGenerator) -> String {
        self.index += 1;
        self.params.push(value);
        generator.placeholder(self.index)
    }
}

/// Wrap in parentheses unless the text already is one parenthesized group.
pub fn wrap(sql: &str) -> String {
    if sql.starts_with('(') && sql.ends_with(')') {
        let mut depth = 0i32;
        let mut in_quote = false;
        for (i, c) in sql.char_indices() {
            match c {
                '\'' => in_quote = !in_quote,
                '(' if !in_quote => depth += 1,
                ')' if !in_quote => {
                    depth -= 1;
                    if depth == 0 && i + 1 < sql.len() {
                        return format!("({})", sql);
                    }
                }
                _ => {}
            }
        }
        return sql.to_string();
    }
    format!("({})", sql)
}

fn join(parts: Vec<String>, op: &str) -> String {
    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", parts.join(op))
    }
}

/// Property name and value arguments of a comparison-style predicate.
fn split_predicate(term: &Term) -> RqlResult<(&str, &[Term])> {
    match term.args() {
        [column, values @ ..] if !values.is_empty() => Ok((column.token(), values)),
        _ => Err(RqlError::compile(term, "expects a column and a value")),
    }
}

/// Renders where-clause predicates and select expressions, collecting
/// bind values as it goes.
pub struct PredicateWriter<'a> {
    generator: &'a dyn SqlGenerator,
    collection: &'a Collection,
    qualifier: Option<&'a str>,
    pub params: ParamContext,
}

impl<'a> PredicateWriter<'a> {
    pub fn new(
        generator: &'a dyn SqlGenerator,
        collection: &'a Collection,
        qualifier: Option<&'a str>,
    ) -> Self {
        Self {
            generator,
            collection,
            qualifier,
            params: ParamContext::new(),
        }
    }

    /// Quoted column for a property name. `alias.column` refers to a
    /// joined table.
    pub fn column(&self, name: &str) -> String {
        match name.split_once('.') {
            Some((table, column)) => qualified(self.generator, Some(table), column),
            None => qualified(self.generator, self.qualifier, self.collection.column(name)),
        }
    }

    /// Placeholder for a literal compared against `property`, or the
    /// quoted column for a column reference.
    fn operand(&mut self, property: &str, term: &Term) -> RqlResult<String> {
        if term.is_identifier() {
            return Ok(self.column(term.token()));
        }
        let value = Value::from_term(term, self.collection.property_type(property))
            .map_err(|message| RqlError::validation(term, message))?;
        Ok(self.params.add_param(value, self.generator))
    }

    fn pattern(&mut self, column: &str, term: &Term, pattern: String, negated: bool) -> RqlResult<String> {
        if term.is_identifier() || term.is_function() {
            return Err(RqlError::validation(term, "a pattern must be a literal"));
        }
        let placeholder = self
            .params
            .add_param(Value::String(pattern), self.generator);
        Ok(self.generator.like(column, &placeholder, negated))
    }

    fn equals(&mut self, term: &Term) -> RqlResult<String> {
        let (property, values) = split_predicate(term)?;
        let column = self.column(property);
        let mut parts = Vec::new();
        for value in values {
            let sql = if value.is_null() {
                format!("{} IS NULL", column)
            } else if value.is_string() && wildcard::has_wildcard(value.token()) {
                let pattern = wildcard::to_like(value.token());
                self.pattern(&column, value, pattern, false)?
            } else {
                format!("{} = {}", column, self.operand(property, value)?)
            };
            parts.push(sql);
        }
        Ok(join(parts, " OR "))
    }

    fn comparison(&mut self, term: &Term, op: &str) -> RqlResult<String> {
        let (property, values) = split_predicate(term)?;
        let column = self.column(property);
        let value = self.operand(property, &values[0])?;
        Ok(format!("{} {} {}", column, op, value))
    }

    fn membership(&mut self, term: &Term, negated: bool) -> RqlResult<String> {
        let (property, operands) = split_predicate(term)?;
        let column = self.column(property);
        let mut values = Vec::new();
        for value in operands {
            values.push(self.operand(property, value)?);
        }
        let op = if negated { "NOT IN" } else { "IN" };
        Ok(format!("{} {} ({})", column, op, values.join(", ")))
    }

    fn contains(&mut self, term: &Term, prefix: &str, suffix: &str) -> RqlResult<String> {
        let (property, values) = split_predicate(term)?;
        let column = self.column(property);
        let mut parts = Vec::new();
        for value in values {
            let pattern = format!("{}{}{}", prefix, wildcard::to_like(value.token()), suffix);
            parts.push(self.pattern(&column, value, pattern, false)?);
        }
        Ok(join(parts, " OR "))
    }

    fn null_checks(&self, term: &Term, render: impl Fn(&str) -> String) -> String {
        let parts = term
            .args()
            .iter()
            .map(|arg| render(&self.column(arg.token())))
            .collect();
        join(parts, " AND ")
    }

    /// Render a where-clause predicate.
    pub fn predicate(&mut self, term: &Term) -> RqlResult<String> {
        match term.token() {
            "and" | "or" => {
                let op = if term.is_named("and") { " AND " } else { " OR " };
                let mut parts = Vec::new();
                for arg in term.args() {
                    parts.push(self.predicate(arg)?);
                }
                Ok(join(parts, op))
            }
            "not" => {
                let inner = term
                    .arg(0)
                    .ok_or_else(|| RqlError::compile(term, "not() needs a predicate"))?;
                Ok(format!("NOT {}", wrap(&self.predicate(inner)?)))
            }
            "eq" => self.equals(term),
            "ne" => Ok(format!("NOT {}", wrap(&self.equals(term)?))),
            "lt" => self.comparison(term, "<"),
            "le" => self.comparison(term, "<="),
            "gt" => self.comparison(term, ">"),
            "ge" => self.comparison(term, ">="),
            "in" => self.membership(term, false),
            "out" => self.membership(term, true),
            "w" => self.contains(term, "%", "%"),
            "sw" => self.contains(term, "", "%"),
            "ew" => self.contains(term, "%", ""),
            "like" => {
                let (property, values) = split_predicate(term)?;
                let column = self.column(property);
                let value = &values[0];
                self.pattern(&column, value, wildcard::to_like(value.token()), false)
            }
            "n" => Ok(self.null_checks(term, |c| format!("{} IS NULL", c))),
            "nn" => Ok(self.null_checks(term, |c| format!("{} IS NOT NULL", c))),
            "emp" => Ok(self.null_checks(term, |c| format!("({} IS NULL OR {} = '')", c, c))),
            "nemp" => Ok(self.null_checks(term, |c| {
                format!("({} IS NOT NULL AND {} <> '')", c, c)
            })),
            _ => Err(RqlError::compile(term, "unknown function")),
        }
    }

    /// Render a select-list expression.
    pub fn expression(&mut self, term: &Term) -> RqlResult<String> {
        match term {
            Term::Leaf { token, .. } if token == "*" => Ok("*".to_string()),
            leaf if leaf.is_numeric() => Ok(leaf.token().to_string()),
            Term::Leaf { token, .. } => Ok(self.column(token)),
            Term::Function { name, args } => match (name.as_str(), args.as_slice()) {
                ("sum" | "count" | "min" | "max", [arg]) => {
                    Ok(format!("{}({})", name.to_uppercase(), self.expression(arg)?))
                }
                ("distinct", [arg]) => Ok(format!("DISTINCT {}", self.expression(arg)?)),
                ("if", [cond, then, otherwise]) => {
                    let cond = self.predicate(cond)?;
                    let then = self.branch(then)?;
                    let otherwise = self.branch(otherwise)?;
                    Ok(self.generator.if_expr(&cond, &then, &otherwise))
                }
                _ => Err(RqlError::compile(term, "not a select expression")),
            },
        }
    }

    /// `if` branches inline numbers and bind everything else.
    fn branch(&mut self, term: &Term) -> RqlResult<String> {
        if term.is_numeric() {
            return Ok(term.token().to_string());
        }
        if term.is_identifier() {
            return Ok(self.column(term.token()));
        }
        let value = Value::from_term(term, None).map_err(|m| RqlError::validation(term, m))?;
        Ok(self.params.add_param(value, self.generator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schema::{Backend, Collection};
    use crate::transpiler::Dialect;

    #[test]
    fn test_missing_arguments_are_errors() {
        let generator = Dialect::Ansi.generator();
        let collection = Collection::new("orders", Backend::Relational);
        let mut writer = PredicateWriter::new(generator.as_ref(), &collection, None);
        for term in [
            Term::func("eq", Vec::<Term>::new()),
            Term::func("gt", [Term::ident("freight")]),
            Term::func("like", [Term::ident("name")]),
        ] {
            let err = writer.predicate(&term).unwrap_err();
            assert!(matches!(err, RqlError::Compile { .. }), "{:?}", err);
        }

        let expr = Term::func(
            "sum",
            [Term::func(
                "if",
                [Term::func("eq", Vec::<Term>::new()), Term::leaf("1"), Term::leaf("0")],
            )],
        );
        assert!(writer.expression(&expr).is_err());
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("a = 1"), "(a = 1)");
        assert_eq!(wrap("(a = 1 OR b = 2)"), "(a = 1 OR b = 2)");
        assert_eq!(wrap("(a) OR (b)"), "((a) OR (b))");
        assert_eq!(wrap("(c = ')')"), "(c = ')')");
    }
}
