//! Reserved function names of the query language.

/// Predicates whose first argument is a column and the rest are values.
pub const COMPARISON: &[&str] = &[
    "eq", "ne", "lt", "le", "gt", "ge", "in", "out", "w", "sw", "ew", "wo", "like",
];

/// Predicates whose arguments are all columns.
pub const NULL_CHECKS: &[&str] = &[
    "n",
    "nn",
    "emp",
    "nemp",
    "attribute_exists",
    "attribute_not_exists",
];

/// Boolean composition.
pub const LOGICAL: &[&str] = &["and", "or", "not"];

/// Aggregates that wrap a single argument.
pub const AGGREGATE: &[&str] = &["sum", "count", "min", "max", "distinct"];

/// Functions that shape the select list.
pub const SELECT: &[&str] = &[
    "includes", "excludes", "distinct", "sum", "count", "min", "max", "as",
];

/// Sort functions.
pub const ORDER: &[&str] = &["sort", "order"];

/// Paging functions.
pub const PAGE: &[&str] = &["limit", "offset", "page", "pagesize", "after"];

pub const GROUP: &str = "group";
pub const JOIN: &str = "join";
pub const IF: &str = "if";

/// Functions that may only appear at the root of a clause.
pub const ROOT_ONLY: &[&str] = &[
    "includes", "excludes", "sort", "order", "limit", "offset", "page", "pagesize", "after",
    "group", "join", "as",
];

/// Predicates every backend accepts in a where clause.
pub const WHERE_COMMON: &[&str] = &[
    "eq", "ne", "lt", "le", "gt", "ge", "in", "out", "w", "sw", "ew", "wo", "like", "n", "nn",
    "emp", "nemp", "and", "or", "not",
];

/// Extra predicates accepted by the key-value backend.
pub const WHERE_KEY_VALUE: &[&str] = &["attribute_exists", "attribute_not_exists"];

/// True when `name` is a predicate usable in a where clause.
pub fn is_predicate(name: &str) -> bool {
    WHERE_COMMON.contains(&name) || WHERE_KEY_VALUE.contains(&name)
}

/// True when `name` is any function the parser understands.
pub fn is_known(name: &str) -> bool {
    is_predicate(name)
        || SELECT.contains(&name)
        || ORDER.contains(&name)
        || PAGE.contains(&name)
        || name == GROUP
        || name == JOIN
        || name == IF
}

/// True for functions that take structural arguments rather than a
/// column/value pair, so `name=value` means `name(value)`.
pub fn is_structural(name: &str) -> bool {
    is_known(name) && !is_predicate(name) && name != IF
}

/// Canonical spelling of a function token.
pub fn canonical(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
