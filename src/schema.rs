//! Collection metadata consumed by the compilers.
//!
//! A [`Collection`] describes one table, key-value table or search index:
//! its properties (with optional declared types) and its indexes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::functions::{WHERE_COMMON, WHERE_KEY_VALUE};

/// The storage engine family that owns a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Relational,
    KeyValue,
    Search,
}

impl Backend {
    /// Functions this backend accepts inside a where clause.
    pub fn where_functions(&self) -> Vec<&'static str> {
        let mut names = WHERE_COMMON.to_vec();
        if *self == Backend::KeyValue {
            names.extend_from_slice(WHERE_KEY_VALUE);
        }
        names
    }

    pub fn accepts(&self, name: &str) -> bool {
        WHERE_COMMON.contains(&name)
            || (*self == Backend::KeyValue && WHERE_KEY_VALUE.contains(&name))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Relational => write!(f, "relational"),
            Backend::KeyValue => write!(f, "key-value"),
            Backend::Search => write!(f, "search"),
        }
    }
}

/// Declared type of a property, used to cast bound literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    /// Physical column or attribute name when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<PropertyType>,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            ty: Some(ty),
            ..Self::new(name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Primary,
    LocalSecondary,
    GlobalSecondary,
    #[default]
    Other,
}

/// An ordered composite key. For key-value collections the first column is
/// the partition key and the optional second the sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    #[serde(default)]
    pub kind: IndexKind,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    pub fn new(name: impl Into<String>, kind: IndexKind, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: kind == IndexKind::Primary,
        }
    }

    pub fn primary(columns: &[&str]) -> Self {
        Self::new("primary", IndexKind::Primary, columns)
    }

    pub fn global(name: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(name, IndexKind::GlobalSecondary, columns)
    }

    pub fn local(name: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(name, IndexKind::LocalSecondary, columns)
    }

    pub fn is_primary(&self) -> bool {
        self.kind == IndexKind::Primary
    }

    pub fn partition_key(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.columns.get(1).map(String::as_str)
    }
}

/// A queryable table, key-value table or search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default)]
    pub backend: Backend,
    /// Base SELECT statement that generated clauses are merged into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_sql: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Collection {
    pub fn new(name: impl Into<String>, backend: Backend) -> Self {
        Self {
            name: name.into(),
            table: None,
            backend,
            select_sql: None,
            properties: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_select_sql(mut self, sql: impl Into<String>) -> Self {
        self.select_sql = Some(sql.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Physical table name.
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Physical column for a property name; unknown names pass through.
    pub fn column<'a>(&'a self, name: &'a str) -> &'a str {
        self.property(name)
            .and_then(|p| p.column.as_deref())
            .unwrap_or(name)
    }

    pub fn property_type(&self, name: &str) -> Option<PropertyType> {
        self.property(name).and_then(|p| p.ty)
    }

    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.is_primary())
    }

    /// Primary key columns, empty when no primary index is declared.
    pub fn primary_columns(&self) -> Vec<&str> {
        self.primary_index()
            .map(|i| i.columns.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Indexes with the primary index first, the rest in declaration order.
    pub fn indexes_by_priority(&self) -> Vec<&Index> {
        let mut ordered: Vec<&Index> = self.indexes.iter().filter(|i| i.is_primary()).collect();
        ordered.extend(self.indexes.iter().filter(|i| !i.is_primary()));
        ordered
    }
}
