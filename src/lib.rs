//! agql_store library - annotation graph storage and AGQL query translation
//!
//! Stores linguistic annotation graphs (transcripts with time-aligned,
//! layered annotations) in SQLite, translates AGQL expressions into SQL
//! over that schema, and loads and saves whole graphs or fragments.
//!
//! - [`ids`]: encoded annotation, anchor and attribute ids
//! - [`layers`]: layer definitions and the schema snapshot
//! - [`agql`]: expression parsing
//! - [`queries`]: expression-to-SQL compilers
//! - [`graph`]: the in-memory graph with change tracking
//! - [`store`]: [`store::GraphStore`], loading and saving graphs
//! - [`db`]: the SQLite backend and relational schema

pub mod agql;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod graph;
pub mod ids;
pub mod layers;
pub mod output;
pub mod queries;
pub mod store;

#[macro_use]
pub mod test_macros;

#[cfg(test)]
pub mod fixtures;

#[cfg(test)]
pub mod test_utils;
