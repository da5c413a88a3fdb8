use crate::transpiler::traits::SqlGenerator;

/// Standard SQL: double-quoted identifiers, `?` placeholders.
pub struct AnsiGenerator;

impl SqlGenerator for AnsiGenerator {
    fn name(&self) -> &'static str {
        "ansi"
    }
}
