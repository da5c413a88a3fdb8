//! Abstract syntax for resource queries.
//!
//! A parsed clause is a tree of [`Term`]s: named functions whose arguments
//! are either nested functions or literal/identifier leaves.

pub mod functions;
pub mod term;
pub mod value;

pub use self::term::Term;
pub use self::value::{is_number, Value};
