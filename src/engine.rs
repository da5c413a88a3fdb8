//! Relational execution engine.
//!
//! [`RelationalEngine`] compiles a query, runs it through a [`SqlExecutor`]
//! and assembles the [`QueryResult`]: rows, found rows and the continuation.
//! The found-rows count is skipped when the first page already tells the
//! total, and runs at most once per distinct count query within a
//! [`RequestScope`].
//!
//! [`SqlxExecutor`] runs statements on PostgreSQL, MySQL or SQLite through
//! an sqlx `AnyPool`.

use std::collections::HashMap;
use std::future::Future;

use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query as SqlxQuery;
use sqlx::{Any, AnyConnection, AnyPool, Column, Row, TypeInfo};

use crate::ast::Value;
use crate::error::{RqlError, RqlResult};
use crate::query::Query;
use crate::result::{QueryResult, Row as ResultRow};
use crate::schema::Collection;
use crate::transpiler::{Compiler, FoundRowsStrategy, SqlCompiler, SqlQuery};

/// Runs compiled statements.
pub trait SqlExecutor: Send + Sync {
    fn fetch_rows(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = RqlResult<Vec<ResultRow>>> + Send;

    fn fetch_count(&self, sql: &str, params: &[Value]) -> impl Future<Output = RqlResult<u64>> + Send;

    /// Run the query and its `FOUND_ROWS()` count on one session. The count
    /// is skipped when the rows alone tell the total.
    fn fetch_rows_found(
        &self,
        query: &SqlQuery,
    ) -> impl Future<Output = RqlResult<(Vec<ResultRow>, u64)>> + Send;
}

/// Found-row counts already computed while serving one request.
#[derive(Debug, Default)]
pub struct RequestScope {
    found_rows: HashMap<String, u64>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found_rows(&self, count_key: &str) -> Option<u64> {
        self.found_rows.get(count_key).copied()
    }
}

pub struct RelationalEngine<E> {
    compiler: SqlCompiler,
    executor: E,
}

impl<E: SqlExecutor> RelationalEngine<E> {
    pub fn new(compiler: SqlCompiler, executor: E) -> Self {
        Self { compiler, executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn select(
        &self,
        query: &Query,
        collection: &Collection,
        scope: &mut RequestScope,
    ) -> RqlResult<QueryResult> {
        let compiled = self.compiler.compile(query, collection)?;
        let cached = scope.found_rows(&compiled.count_key);

        let (rows, found) = match (cached, compiled.found_rows) {
            (Some(found), _) => {
                let rows = self
                    .executor
                    .fetch_rows(&compiled.sql, &compiled.params)
                    .await?;
                (rows, found)
            }
            (None, FoundRowsStrategy::FoundRows) => self.executor.fetch_rows_found(&compiled).await?,
            (None, FoundRowsStrategy::Subquery) => {
                let rows = self
                    .executor
                    .fetch_rows(&compiled.sql, &compiled.params)
                    .await?;
                let found = match compiled.window.found_from_page(rows.len()) {
                    Some(found) => found,
                    None => {
                        self.executor
                            .fetch_count(&compiled.count_sql, &compiled.count_params)
                            .await?
                    }
                };
                (rows, found)
            }
        };
        scope.found_rows.insert(compiled.count_key.clone(), found);

        tracing::debug!(
            collection = %collection.name,
            rows = rows.len(),
            found_rows = found,
            cached = cached.is_some(),
            "relational query executed"
        );

        let next = compiled.window.next_terms(rows.len(), Some(found));
        let mut result = QueryResult {
            rows,
            next,
            found_rows: Some(found),
        };
        result.project(&query.select);
        Ok(result)
    }
}

const MAX_CONNECTIONS: u32 = 5;

/// [`SqlExecutor`] over an sqlx `AnyPool`.
#[derive(Clone)]
pub struct SqlxExecutor {
    pool: AnyPool,
}

fn db_error(e: sqlx::Error) -> RqlError {
    RqlError::Database(e.to_string())
}

impl SqlxExecutor {
    /// Connect using a `postgres://`, `mysql://` or `sqlite:` URL.
    pub async fn connect(url: &str) -> RqlResult<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(db_error)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn rows_on(conn: &mut AnyConnection, sql: &str, params: &[Value]) -> RqlResult<Vec<ResultRow>> {
        tracing::debug!(sql, params = params.len(), "executing");
        let rows: Vec<AnyRow> = bind(sql, params).fetch_all(conn).await.map_err(db_error)?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    async fn count_on(conn: &mut AnyConnection, sql: &str, params: &[Value]) -> RqlResult<u64> {
        tracing::debug!(sql, "counting");
        let row = bind(sql, params).fetch_one(conn).await.map_err(db_error)?;
        let count: i64 = row.try_get(0).map_err(db_error)?;
        u64::try_from(count).map_err(|_| RqlError::Database(format!("negative row count {}", count)))
    }
}

impl SqlExecutor for SqlxExecutor {
    async fn fetch_rows(&self, sql: &str, params: &[Value]) -> RqlResult<Vec<ResultRow>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        Self::rows_on(&mut conn, sql, params).await
    }

    async fn fetch_count(&self, sql: &str, params: &[Value]) -> RqlResult<u64> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        Self::count_on(&mut conn, sql, params).await
    }

    async fn fetch_rows_found(&self, query: &SqlQuery) -> RqlResult<(Vec<ResultRow>, u64)> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let rows = Self::rows_on(&mut conn, &query.sql, &query.params).await?;
        let found = match query.window.found_from_page(rows.len()) {
            Some(found) => found,
            None => Self::count_on(&mut conn, &query.count_sql, &query.count_params).await?,
        };
        Ok((rows, found))
    }
}

fn bind<'q>(sql: &'q str, params: &'q [Value]) -> SqlxQuery<'q, Any, AnyArguments<'q>> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::String(v) => query.bind(v.as_str()),
            Value::Date(_) | Value::Timestamp(_) => query.bind(value.to_string()),
        };
    }
    query
}

/// Convert an AnyRow to a JSON object.
fn row_to_map(row: &AnyRow) -> ResultRow {
    let mut map = ResultRow::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name().to_ascii_uppercase();

        let value: serde_json::Value = match type_name.as_str() {
            "BOOL" | "BOOLEAN" => row
                .try_get::<bool, _>(i)
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null),
            "INT2" | "INT4" | "INT8" | "INTEGER" | "BIGINT" | "SMALLINT" | "INT" => row
                .try_get::<i64, _>(i)
                .map(|v| serde_json::Value::Number(v.into()))
                .unwrap_or(serde_json::Value::Null),
            "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" | "FLOAT" => row
                .try_get::<f64, _>(i)
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            _ => row
                .try_get::<String, _>(i)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        };

        map.insert(name, value);
    }

    map
}
