//! Typed scalar values bound into compiled queries.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use nom::{
    IResult,
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    sequence::{pair, tuple},
};
use serde::Serialize;
use serde_json::json;

use super::term::{IDENT_QUOTE, Term};
use crate::schema::PropertyType;

/// A literal after it has been classified and cast.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

/// True when `token` is a plain decimal number such as `12`, `-3` or `4.50`.
pub fn is_number(token: &str) -> bool {
    all_consuming(number)(token).is_ok()
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl Value {
    /// Cast a literal leaf to a value.
    ///
    /// With a declared type the literal must be convertible to it; without
    /// one the literal form decides (numbers, `true`/`false`, `null`,
    /// everything else a string).
    pub fn from_term(term: &Term, ty: Option<PropertyType>) -> Result<Value, String> {
        let (text, quote) = match term {
            Term::Leaf { token, quote } => (token.as_str(), *quote),
            Term::Function { name, .. } => {
                return Err(format!("function '{}' used where a value is expected", name));
            }
        };
        if quote == Some(IDENT_QUOTE) {
            return Err(format!("column reference `{}` is not a value", text));
        }
        let bare = quote.is_none();
        if bare && text.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }

        match ty {
            None => Ok(Self::infer(text, bare)),
            Some(PropertyType::String) => Ok(Value::String(text.to_string())),
            Some(PropertyType::Integer) => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("'{}' is not an integer", text)),
            Some(PropertyType::Decimal) => text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("'{}' is not a number", text)),
            Some(PropertyType::Boolean) => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", text)),
            },
            Some(PropertyType::Date) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| format!("'{}' is not a date (YYYY-MM-DD)", text)),
            Some(PropertyType::Timestamp) => parse_timestamp(text)
                .map(Value::Timestamp)
                .ok_or_else(|| format!("'{}' is not a timestamp", text)),
        }
    }

    fn infer(text: &str, bare: bool) -> Value {
        if !bare {
            return Value::String(text.to_string());
        }
        if is_number(text) {
            if text.contains('.') {
                if let Ok(f) = text.parse() {
                    return Value::Float(f);
                }
            } else if let Ok(i) = text.parse() {
                return Value::Int(i);
            }
        }
        match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        }
    }

    /// Convert a JSON scalar (for example a returned key attribute).
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    /// Render back into a leaf term suitable for a continuation.
    pub fn to_term(&self) -> Term {
        match self {
            Value::Null => Term::leaf("null"),
            Value::Bool(b) => Term::leaf(b.to_string()),
            Value::Int(i) => Term::leaf(i.to_string()),
            Value::Float(f) => Term::leaf(f.to_string()),
            other => Term::string(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            other => json!(other.to_string()),
        }
    }

    /// DynamoDB attribute value (`{"S": ...}`, `{"N": ...}`).
    pub fn to_dynamo(&self) -> serde_json::Value {
        match self {
            Value::Null => json!({ "NULL": true }),
            Value::Bool(b) => json!({ "BOOL": b }),
            Value::Int(i) => json!({ "N": i.to_string() }),
            Value::Float(f) => json!({ "N": f.to_string() }),
            other => json!({ "S": other.to_string() }),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}
