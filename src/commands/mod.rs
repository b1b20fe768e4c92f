//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - `mod.rs`: the command struct with clap attributes for CLI parsing
//! - `execute.rs`: the [`Execute`] implementation and its result type
//! - `output.rs`: table formatting for the result
//! - `cli_tests.rs` / `execute_tests.rs`: parsing and execution tests

mod annotations;
mod delete;
mod import;
mod layers;
mod setup;
mod transcript;
mod transcripts;
mod translate;

pub use annotations::AnnotationsCmd;
pub use delete::DeleteCmd;
pub use import::ImportCmd;
pub use layers::LayersCmd;
pub use setup::SetupCmd;
pub use transcript::TranscriptCmd;
pub use transcripts::TranscriptsCmd;
pub use translate::TranslateCmd;

use clap::{Args, Subcommand};
use std::error::Error;

use crate::output::{OutputFormat, Outputable};
use crate::queries::Limit;
use crate::store::GraphStore;

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>>;
}

/// Paging options shared by the listing commands.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PageArgs {
    /// Number of matches to skip
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
    pub offset: i64,

    /// Maximum number of results to return (1-1000)
    #[arg(short, long, default_value_t = 100, value_parser = clap::value_parser!(i64).range(1..=1000))]
    pub limit: i64,
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

impl PageArgs {
    pub fn to_limit(&self) -> Limit {
        Limit::new(self.offset, self.limit)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema and default layers
    Setup(SetupCmd),

    /// List layer definitions, or show one layer
    Layers(LayersCmd),

    /// Translate an AGQL expression to SQL without running it
    Translate(TranslateCmd),

    /// Find annotations matching an AGQL expression
    Annotations(AnnotationsCmd),

    /// List transcripts, optionally filtered by an AGQL expression
    Transcripts(TranscriptsCmd),

    /// Load a transcript, or a fragment of one, as a graph
    Transcript(TranscriptCmd),

    /// Import a graph JSON file as a transcript
    Import(ImportCmd),

    /// Delete a transcript and its annotations
    Delete(DeleteCmd),

    /// Catch-all for unknown commands
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run(self, store: &mut GraphStore, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Setup(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Layers(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Translate(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Annotations(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Transcripts(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Transcript(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Import(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Delete(cmd) => Ok(cmd.execute(store)?.format(format)),
            Command::Unknown(args) => {
                Err(format!("Unknown command: {}", args.first().unwrap_or(&String::new())).into())
            }
        }
    }
}
