//! Database schema compilers.
//!
//! Generates backend-specific DDL from the schema definitions.

pub mod sqlite;

pub use sqlite::SqliteCompiler;
