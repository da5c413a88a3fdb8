//! Transpiler traits and utilities.

use serde::Serialize;

/// How the total row count is obtained for paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoundRowsStrategy {
    /// `SELECT count(1) FROM (<query>) AS q`.
    Subquery,
    /// `SQL_CALC_FOUND_ROWS` on the query, then `SELECT FOUND_ROWS()`.
    FoundRows,
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    /// Quote an identifier (table or column name).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Generate the parameter placeholder for a 1-based index.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Trailing LIMIT/OFFSET text, with a leading space.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        sql
    }

    /// Conditional expression used by `if(cond,then,else)`.
    fn if_expr(&self, cond: &str, then: &str, otherwise: &str) -> String {
        format!("CASE WHEN {} THEN {} ELSE {} END", cond, then, otherwise)
    }

    /// LIKE comparison against a pattern already escaped with `\`.
    fn like(&self, column: &str, pattern: &str, negated: bool) -> String {
        let op = if negated { "NOT LIKE" } else { "LIKE" };
        format!("{} {} {}", column, op, pattern)
    }

    fn found_rows(&self) -> FoundRowsStrategy {
        FoundRowsStrategy::Subquery
    }

    /// Name of the dialect for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Qualify a column with a table or alias.
pub fn qualified(generator: &dyn SqlGenerator, table: Option<&str>, column: &str) -> String {
    match table {
        Some(table) => format!(
            "{}.{}",
            generator.quote_identifier(table),
            generator.quote_identifier(column)
        ),
        None => generator.quote_identifier(column),
    }
}
