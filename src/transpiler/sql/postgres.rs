use crate::transpiler::traits::SqlGenerator;

/// PostgreSQL Generator.
pub struct PostgresGenerator;

impl SqlGenerator for PostgresGenerator {
    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
