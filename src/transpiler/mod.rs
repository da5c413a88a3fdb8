//! Query compilers.
//!
//! Each storage backend has one [`Compiler`] that turns a [`Query`] plus the
//! target [`Collection`] into an executable request:
//!
//! - `sql`: parameterized SQL and a found-rows count query
//! - `nosql::dynamo`: key-value access plan (Get / Query / Scan)
//! - `nosql::elastic`: search JSON DSL
//!
//! [`QueryCompiler`] picks the compiler from the collection's backend.

pub mod dialect;
pub mod nosql;
pub mod sql;
pub mod traits;
pub mod wildcard;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::error::{RqlError, RqlResult};
use crate::query::Query;
use crate::schema::{Backend, Collection};
pub use dialect::Dialect;
pub use nosql::dynamo::{AccessMode, DynamoCompiler, DynamoQuery};
pub use nosql::elastic::{ElasticCompiler, ElasticQuery};
pub use sql::{SqlCompiler, SqlQuery};
pub use traits::{FoundRowsStrategy, SqlGenerator};

/// Settings shared by all compilers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Limit applied when a request asks for none.
    pub default_limit: Option<u64>,
    /// Upper bound for any requested limit.
    pub max_limit: Option<u64>,
    /// Rows per page for `page(n)` without `pagesize`.
    pub page_size: u64,
    /// Offsets beyond this need a search-after cursor on search backends.
    pub deep_paging_threshold: u64,
    pub dialect: Dialect,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_limit: None,
            max_limit: None,
            page_size: 100,
            deep_paging_threshold: 10_000,
            dialect: Dialect::default(),
        }
    }
}

/// A backend-specific query compiler.
pub trait Compiler {
    type Output;

    fn backend(&self) -> Backend;

    fn compile(&self, query: &Query, collection: &Collection) -> RqlResult<Self::Output>;
}

/// Output of whichever compiler handled a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CompiledQuery {
    Sql(SqlQuery),
    Dynamo(DynamoQuery),
    Elastic(ElasticQuery),
}

impl CompiledQuery {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CompiledQuery::Sql(q) => serde_json::to_value(q).unwrap_or_default(),
            CompiledQuery::Dynamo(q) => q.to_request(),
            CompiledQuery::Elastic(q) => q.to_request(),
        }
    }
}

/// Dispatches to the compiler owning a collection's backend.
pub struct QueryCompiler {
    sql: SqlCompiler,
    dynamo: DynamoCompiler,
    elastic: ElasticCompiler,
}

impl QueryCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            sql: SqlCompiler::new(options.clone()),
            dynamo: DynamoCompiler::new(options.clone()),
            elastic: ElasticCompiler::new(options),
        }
    }

    /// Parse a query string for `collection` and compile it.
    pub fn compile_str(&self, input: &str, collection: &Collection) -> RqlResult<CompiledQuery> {
        let query = Query::parse(input, collection.backend)?;
        self.compile(&query, collection)
    }

    pub fn compile(&self, query: &Query, collection: &Collection) -> RqlResult<CompiledQuery> {
        if query.backend != collection.backend {
            return Err(RqlError::internal(format!(
                "query validated for {} compiled against {} collection '{}'",
                query.backend, collection.backend, collection.name
            )));
        }
        match collection.backend {
            Backend::Relational => self.sql.compile(query, collection).map(CompiledQuery::Sql),
            Backend::KeyValue => self.dynamo.compile(query, collection).map(CompiledQuery::Dynamo),
            Backend::Search => self.elastic.compile(query, collection).map(CompiledQuery::Elastic),
        }
    }

    pub fn sql(&self) -> &SqlCompiler {
        &self.sql
    }
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}
