//! Transpiler test modules.
//!
//! Tests are organized by backend:
//! - `sql`: relational compiler with the default dialect
//! - `dialects`: Postgres, MySQL and SQLite differences
//! - `dynamo`: key-value access plans and expressions
//! - `elastic`: search DSL

mod dynamo;
mod sql;

use crate::query::Query;
use crate::schema::{Backend, Collection, Index, Property, PropertyType};

pub(crate) fn orders() -> Collection {
    Collection::new("orders", Backend::Relational)
        .with_property(Property::typed("orderid", PropertyType::Integer))
        .with_property(Property::typed("shipcity", PropertyType::String))
        .with_property(Property::typed("freight", PropertyType::Decimal))
        .with_property(Property::typed("orderdate", PropertyType::Date))
        .with_index(Index::primary(&["orderid"]))
}

pub(crate) fn items() -> Collection {
    Collection::new("items", Backend::KeyValue)
        .with_index(Index::primary(&["id", "type"]))
        .with_index(Index::global("gsi1", &["type", "date"]))
}

pub(crate) fn products() -> Collection {
    Collection::new("products", Backend::Search)
        .with_property(Property::typed("price", PropertyType::Decimal))
        .with_index(Index::primary(&["sku"]))
}

pub(crate) fn query(input: &str, collection: &Collection) -> Query {
    Query::parse(input, collection.backend).unwrap()
}
