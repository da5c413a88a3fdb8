//! Relational compiler.
//!
//! Produces parameterized SQL plus the query that counts all matching rows:
//!
//! ```text
//! SELECT <columns> FROM <table>[, <joins>] [WHERE ...] [GROUP BY ...]
//!        [ORDER BY ...] [LIMIT ... OFFSET ...]
//! ```

pub mod ansi;
pub mod conditions;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use dashmap::DashMap;
use serde::Serialize;

use crate::ast::Value;
use crate::error::{RqlError, RqlResult};
use crate::parser::SqlClauses;
use crate::query::{PageWindow, Query};
use crate::schema::{Backend, Collection};
use crate::transpiler::traits::{FoundRowsStrategy, SqlGenerator};
use crate::transpiler::{CompileOptions, Compiler};
pub use conditions::{ParamContext, PredicateWriter};

/// Compiled relational query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Statement returning the total number of matching rows.
    pub count_sql: String,
    pub count_params: Vec<Value>,
    /// Identifies the count within one request so it runs only once.
    pub count_key: String,
    pub found_rows: FoundRowsStrategy,
    pub window: PageWindow,
}

/// Compiles queries against relational collections.
pub struct SqlCompiler {
    generator: Box<dyn SqlGenerator>,
    options: CompileOptions,
    /// Parsed `select_sql` per collection.
    base_queries: DashMap<String, SqlClauses>,
}

impl SqlCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            generator: options.dialect.generator(),
            options,
            base_queries: DashMap::new(),
        }
    }

    pub fn generator(&self) -> &dyn SqlGenerator {
        self.generator.as_ref()
    }

    fn base_query(&self, collection: &Collection) -> RqlResult<Option<SqlClauses>> {
        let Some(sql) = collection.select_sql.as_deref() else {
            return Ok(None);
        };
        if let Some(clauses) = self.base_queries.get(&collection.name) {
            return Ok(Some(clauses.clone()));
        }
        let clauses = SqlClauses::parse(sql)?;
        self.base_queries
            .insert(collection.name.clone(), clauses.clone());
        Ok(Some(clauses))
    }
}

impl Compiler for SqlCompiler {
    type Output = SqlQuery;

    fn backend(&self) -> Backend {
        Backend::Relational
    }

    fn compile(&self, query: &Query, collection: &Collection) -> RqlResult<SqlQuery> {
        if let Some(after) = &query.page.after {
            return Err(RqlError::unsupported(
                Backend::Relational,
                format!("{} (use offset or page)", after.token()),
            ));
        }
        query.filter.validate(Backend::Relational)?;

        let generator = self.generator();
        let base = self.base_query(collection)?;
        let table = collection.table_name();
        let qualifier = (!query.joins.is_empty()).then_some(table);
        let mut writer = PredicateWriter::new(generator, collection, qualifier);
        let primary = collection.primary_columns();

        // SELECT
        let mut columns = Vec::new();
        let mut selected: Option<Vec<String>> = None;
        if !query.select.includes.is_empty() {
            let mut names: Vec<String> = query.select.includes.clone();
            // Adding the key to a DISTINCT list would make every row distinct.
            if !query.is_aggregate() && !query.select.distinct {
                for pk in &primary {
                    if !names.iter().any(|n| n.eq_ignore_ascii_case(pk)) {
                        names.push(pk.to_string());
                    }
                }
            }
            columns.extend(names.iter().map(|n| writer.column(n)));
            selected = Some(names);
        } else if !query.group.is_empty() {
            columns.extend(query.group.columns.iter().map(|n| writer.column(n)));
            selected = Some(query.group.columns.clone());
        } else if !query.select.projections.is_empty() {
            selected = Some(Vec::new());
        }
        for projection in &query.select.projections {
            let expr = writer.expression(&projection.expr)?;
            columns.push(format!(
                "{} AS {}",
                expr,
                generator.quote_identifier(&projection.alias())
            ));
        }
        let column_list = if !columns.is_empty() {
            columns.join(", ")
        } else if let Some(base) = &base {
            base.select.clone()
        } else if qualifier.is_some() {
            format!("{}.*", generator.quote_identifier(table))
        } else {
            "*".to_string()
        };

        // FROM
        let mut from = match &base {
            Some(base) => base.from.clone(),
            None => generator.quote_identifier(table),
        };
        for join in &query.joins {
            from.push_str(&format!(
                ", {} {}",
                generator.quote_identifier(&join.table),
                generator.quote_identifier(&join.alias)
            ));
        }

        // WHERE
        let mut predicates = Vec::new();
        if let Some(base_where) = base.as_ref().and_then(|b| b.where_.as_deref()) {
            predicates.push(format!("({})", base_where));
        }
        for join in &query.joins {
            for (left, right) in &join.on {
                predicates.push(format!(
                    "{} = {}.{}",
                    writer.column(left),
                    generator.quote_identifier(&join.alias),
                    generator.quote_identifier(right)
                ));
            }
        }
        // Disjunctions render parenthesized, so plain AND joining is safe.
        for term in &query.filter.terms {
            predicates.push(writer.predicate(term)?);
        }

        let distinct = if query.select.distinct { "DISTINCT " } else { "" };
        let mut body = format!("{}{} FROM {}", distinct, column_list, from);
        if !predicates.is_empty() {
            body.push_str(" WHERE ");
            body.push_str(&predicates.join(" AND "));
        }

        // GROUP BY
        if !query.group.is_empty() {
            let cols: Vec<String> = query.group.columns.iter().map(|c| writer.column(c)).collect();
            body.push_str(&format!(" GROUP BY {}", cols.join(", ")));
        } else if let Some(group) = base.as_ref().and_then(|b| b.group.as_deref()) {
            body.push_str(&format!(" GROUP BY {}", group));
        }

        // ORDER BY
        let order = if !query.order.is_empty() {
            let sorts: Vec<String> = query
                .order
                .sorts
                .iter()
                .map(|s| format!("{} {}", writer.column(&s.column), s.direction))
                .collect();
            Some(sorts.join(", "))
        } else if let Some(order) = base.as_ref().and_then(|b| b.order.clone()) {
            Some(order)
        } else {
            default_order(&writer, &primary, selected.as_deref())
        };

        // LIMIT / OFFSET
        let window = query.page.window(&self.options)?;
        let mut paging = generator.limit_offset(window.limit, window.offset);
        if paging.is_empty() {
            if let Some(limit) = base.as_ref().and_then(|b| b.limit.as_deref()) {
                paging = format!(" LIMIT {}", limit);
            }
        }

        let found_rows = generator.found_rows();
        let params = writer.params.params;
        let mut sql = match found_rows {
            FoundRowsStrategy::FoundRows => format!("SELECT SQL_CALC_FOUND_ROWS {}", body),
            FoundRowsStrategy::Subquery => format!("SELECT {}", body),
        };
        if let Some(order) = &order {
            sql.push_str(&format!(" ORDER BY {}", order));
        }
        sql.push_str(&paging);

        let (count_sql, count_params) = match found_rows {
            FoundRowsStrategy::FoundRows => ("SELECT FOUND_ROWS()".to_string(), Vec::new()),
            FoundRowsStrategy::Subquery => (
                format!("SELECT count(1) FROM (SELECT {}) AS q", body),
                params.clone(),
            ),
        };
        let count_key = format!("{} {:?}", body, params);

        tracing::debug!(
            dialect = generator.name(),
            collection = %collection.name,
            sql = %sql,
            params = params.len(),
            "compiled relational query"
        );

        Ok(SqlQuery {
            sql,
            params,
            count_sql,
            count_params,
            count_key,
            found_rows,
            window,
        })
    }
}

/// Primary key order, applied only when every primary column is selected.
/// `selected` is `None` when all columns are.
fn default_order(
    writer: &PredicateWriter<'_>,
    primary: &[&str],
    selected: Option<&[String]>,
) -> Option<String> {
    if primary.is_empty() {
        return None;
    }
    if let Some(selected) = selected {
        let all_present = primary
            .iter()
            .all(|pk| selected.iter().any(|s| s.eq_ignore_ascii_case(pk)));
        if !all_present {
            return None;
        }
    }
    let sorts: Vec<String> = primary
        .iter()
        .map(|pk| format!("{} ASC", writer.column(pk)))
        .collect();
    Some(sorts.join(", "))
}
