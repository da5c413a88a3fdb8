//! # rqlc: Resource Query Language compiler
//!
//! rqlc parses RQL query strings (`eq(shipcity,Paris)&sort(-orderid)&limit(10)`)
//! into a typed term tree and compiles them for the storage engine that owns
//! the target collection.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rqlc::prelude::*;
//!
//! let orders = Collection::new("orders", Backend::Relational)
//!     .with_index(Index::primary(&["orderid"]));
//!
//! let compiled = QueryCompiler::default().compile_str("sort(-orderid)&limit(2)", &orders)?;
//! // => SELECT * FROM "orders" ORDER BY "orderid" DESC LIMIT 2
//! ```
//!
//! ## Backends
//!
//! | Backend      | Output                                              |
//! |--------------|-----------------------------------------------------|
//! | relational   | parameterized SQL, bind values, found-rows query    |
//! | key-value    | Get / Query / Scan plan with key and filter expressions |
//! | search       | JSON query DSL with search-after paging             |

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod query;
pub mod result;
pub mod schema;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::{Term, Value};
    pub use crate::error::*;
    pub use crate::parser::{parse, parse_all};
    pub use crate::query::Query;
    pub use crate::result::QueryResult;
    pub use crate::schema::{Backend, Collection, Index, IndexKind, Property, PropertyType};
    pub use crate::transpiler::{
        CompileOptions, CompiledQuery, Compiler, Dialect, QueryCompiler, SqlCompiler,
        SqlGenerator,
    };
}

/// Parse a single RQL clause into a term.
///
/// # Example
///
/// ```
/// use rqlc::parse;
///
/// let term = parse("age=gt=30").unwrap();
/// assert_eq!(term.to_string(), "gt(`age`,30)");
/// ```
pub fn parse(clause: &str) -> Result<ast::Term, error::RqlError> {
    parser::parse(clause)
}
