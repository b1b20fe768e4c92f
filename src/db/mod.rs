//! Database access.
//!
//! # Architecture
//!
//! - `backend.rs`: the [`Database`] trait, [`SqlValue`] and [`QueryResult`]
//! - `connection.rs`: the rusqlite implementation, including `REGEXP`
//! - `value.rs`: typed extraction from result cells
//! - `escape.rs`: literal quoting for generated SQL
//! - `schema/`: table definitions, DDL and seeding
//!
//! # Type Decisions
//!
//! Parameters are positional (`?`) and always bound; nothing above this
//! module formats caller-supplied values into SQL text except expression
//! literals, which go through [`escape::quote_sql_literal`].

mod backend;
mod connection;
pub mod escape;
pub mod schema;
mod value;

pub use backend::{Database, QueryResult, SqlValue};
pub use connection::{open_db, open_mem_db, SqliteDatabase};
pub use value::{extract_f64, extract_i64, extract_string, extract_string_or, DatabaseValue};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to open database '{path}': {message}")]
    OpenFailed { path: String, message: String },

    #[error("Query failed: {message}\n  SQL: {sql}")]
    QueryFailed { sql: String, message: String },

    #[error("Missing column in result: {name}")]
    MissingColumn { name: String },
}
