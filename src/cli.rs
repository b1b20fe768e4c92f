//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared types.
//! Individual command definitions are in the `commands` module.

use clap::Parser;
use std::path::PathBuf;

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the SQLite database file
    ///
    /// If not specified, uses the database named in .agql_store.json, or
    /// searches for one in:
    ///   1. .agql_store/store.sqlite (project-local)
    ///   2. ./store.sqlite (current directory)
    ///   3. ~/.agql_store/store.sqlite (user-global)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Resolve database path by checking multiple locations in order of preference
pub fn resolve_db_path(explicit_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit_path {
        return path;
    }

    let project_db = PathBuf::from(".agql_store/store.sqlite");
    if project_db.exists() {
        return project_db;
    }

    let local_db = PathBuf::from("./store.sqlite");
    if local_db.exists() {
        return local_db;
    }

    if let Some(home_dir) = home::home_dir() {
        let global_db = home_dir.join(".agql_store/store.sqlite");
        if global_db.exists() {
            return global_db;
        }
    }

    // Created on first use
    project_db
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_explicit_path_wins() {
        let path = PathBuf::from("/tmp/somewhere/else.sqlite");
        assert_eq!(resolve_db_path(Some(path.clone())), path);
    }

    #[rstest]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["agql_store", "layers", "--db", "x.sqlite", "-o", "json"])
                .unwrap();
        assert_eq!(args.db, Some(PathBuf::from("x.sqlite")));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[rstest]
    fn test_format_defaults_to_table() {
        let args = Args::try_parse_from(["agql_store", "layers"]).unwrap();
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.db.is_none());
    }
}
