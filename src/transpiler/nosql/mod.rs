//! Compilers for non-relational backends.

pub mod dynamo;
pub mod elastic;
