//! # Database Module
//!
//! Query execution against DuckDB and the in-memory table the result is loaded into.
pub mod query;
pub mod table;
