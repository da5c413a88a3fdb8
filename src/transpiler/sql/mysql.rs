use crate::transpiler::traits::{FoundRowsStrategy, SqlGenerator};

/// MySQL has no OFFSET without LIMIT; this is the documented workaround.
const MAX_ROWS: u64 = 18446744073709551615;

/// MySQL Generator.
pub struct MysqlGenerator;

impl SqlGenerator for MysqlGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(n), Some(o)) => format!(" LIMIT {} OFFSET {}", n, o),
            (Some(n), None) => format!(" LIMIT {}", n),
            (None, Some(o)) => format!(" LIMIT {} OFFSET {}", MAX_ROWS, o),
            (None, None) => String::new(),
        }
    }

    fn if_expr(&self, cond: &str, then: &str, otherwise: &str) -> String {
        format!("IF({}, {}, {})", cond, then, otherwise)
    }

    fn found_rows(&self) -> FoundRowsStrategy {
        FoundRowsStrategy::FoundRows
    }

    fn name(&self) -> &'static str {
        "mysql"
    }
}
