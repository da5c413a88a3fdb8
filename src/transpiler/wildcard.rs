//! `*` wildcard patterns in values.

/// Where the wildcards of a value sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardShape {
    /// No wildcard.
    Exact,
    /// `abc*`
    Prefix,
    /// `*abc`
    Suffix,
    /// `*abc*`
    Contains,
    /// More than two wildcards, or one not anchored at either end.
    Complex,
}

pub fn has_wildcard(value: &str) -> bool {
    value.contains('*')
}

pub fn shape(value: &str) -> WildcardShape {
    let count = value.matches('*').count();
    let starts = value.starts_with('*');
    let ends = value.ends_with('*');
    match count {
        0 => WildcardShape::Exact,
        1 if ends => WildcardShape::Prefix,
        1 if starts => WildcardShape::Suffix,
        2 if starts && ends && value.len() > 1 => WildcardShape::Contains,
        _ => WildcardShape::Complex,
    }
}

/// The value with its anchoring wildcards removed.
pub fn core(value: &str) -> &str {
    value.trim_matches('*')
}

/// Convert to a SQL LIKE pattern: `*` becomes `%`, `_` and `%` are escaped.
pub fn to_like(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '*' => pattern.push('%'),
            '_' => pattern.push_str("\\_"),
            '%' => pattern.push_str("\\%"),
            '\\' => pattern.push_str("\\\\"),
            c => pattern.push(c),
        }
    }
    pattern
}
