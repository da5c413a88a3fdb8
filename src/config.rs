//! rqlc configuration
//!
//! Loaded from TOML. Lookup order: an explicit path, `./rqlc.toml`, then
//! `<config dir>/rqlc/config.toml`. Without any file the defaults apply.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RqlError, RqlResult};
use crate::schema::Collection;
use crate::transpiler::{CompileOptions, Dialect};

const LOCAL_FILE: &str = "rqlc.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection URL for `rqlc run`
    pub database_url: Option<String>,

    pub query: QuerySettings,

    pub sql: SqlSettings,

    /// Collection schemas queries are compiled against
    pub collections: Vec<Collection>,
}

/// Paging defaults shared by every backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub default_limit: Option<u64>,
    pub max_limit: Option<u64>,
    pub page_size: u64,
    pub deep_paging_threshold: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        let options = CompileOptions::default();
        Self {
            default_limit: options.default_limit,
            max_limit: options.max_limit,
            page_size: options.page_size,
            deep_paging_threshold: options.deep_paging_threshold,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SqlSettings {
    /// Falls back to the database URL scheme when unset.
    pub dialect: Option<Dialect>,
}

impl Config {
    /// Load the first configuration file found, or the defaults.
    pub fn load(explicit: Option<&Path>) -> RqlResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("rqlc").join("config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> RqlResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| RqlError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(
            path = %path.display(),
            collections = config.collections.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> RqlResult<Self> {
        toml::from_str(content).map_err(|e| RqlError::Config(e.to_string()))
    }

    /// Collection by name, case-insensitive.
    pub fn collection(&self, name: &str) -> RqlResult<&Collection> {
        self.collections
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| RqlError::Config(format!("unknown collection '{}'", name)))
    }

    /// Explicit dialect, else guessed from the database URL.
    pub fn dialect(&self) -> Dialect {
        self.sql
            .dialect
            .or_else(|| self.database_url.as_deref().map(Dialect::from_url))
            .unwrap_or_default()
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            default_limit: self.query.default_limit,
            max_limit: self.query.max_limit,
            page_size: self.query.page_size,
            deep_paging_threshold: self.query.deep_paging_threshold,
            dialect: self.dialect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Backend, IndexKind, PropertyType};
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
database_url = "postgres://localhost/northwind"

[query]
default_limit = 100
max_limit = 1000

[[collections]]
name = "orders"
backend = "relational"
select_sql = "SELECT * FROM orders WHERE deleted = 0"

[[collections.properties]]
name = "orderid"
type = "integer"

[[collections.properties]]
name = "shipCity"
column = "ship_city"

[[collections.indexes]]
name = "primary"
kind = "primary"
columns = ["orderid"]
unique = true

[[collections]]
name = "items"
table = "items-prod"
backend = "key_value"

[[collections.indexes]]
name = "gsi1"
kind = "global_secondary"
columns = ["type", "date"]
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.collections.len(), 2);

        let orders = config.collection("ORDERS").unwrap();
        assert_eq!(orders.backend, Backend::Relational);
        assert_eq!(orders.property_type("orderid"), Some(PropertyType::Integer));
        assert_eq!(orders.column("shipcity"), "ship_city");
        assert_eq!(orders.primary_columns(), vec!["orderid"]);

        let items = config.collection("items").unwrap();
        assert_eq!(items.backend, Backend::KeyValue);
        assert_eq!(items.table_name(), "items-prod");
        assert_eq!(items.indexes[0].kind, IndexKind::GlobalSecondary);
        assert!(!items.indexes[0].unique);

        assert!(config.collection("missing").is_err());
    }

    #[test]
    fn test_compile_options() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let options = config.compile_options();
        assert_eq!(options.default_limit, Some(100));
        assert_eq!(options.max_limit, Some(1000));
        assert_eq!(options.page_size, 100);
        assert_eq!(options.deep_paging_threshold, 10_000);
        assert_eq!(options.dialect, Dialect::Postgres);
    }

    #[test]
    fn test_explicit_dialect_wins() {
        let config = Config::from_toml(
            "database_url = \"postgres://x/y\"\n[sql]\ndialect = \"mariadb\"\n",
        )
        .unwrap();
        assert_eq!(config.dialect(), Dialect::MySql);
        assert_eq!(Config::default().dialect(), Dialect::Ansi);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[query]\npage_size = \"ten\"").unwrap_err();
        assert!(matches!(err, RqlError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/rqlc.toml"))).unwrap_err();
        assert!(matches!(err, RqlError::Io(_)));
    }
}
