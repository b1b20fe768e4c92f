mod cli_tests;
mod execute;
mod output;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::commands::PageArgs;

/// What to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    /// Transcript names
    #[default]
    Transcripts,
    /// Corpus names
    Corpora,
    /// Participant names across all transcripts
    Participants,
}

/// List transcripts, optionally filtered by an AGQL expression
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store transcripts                                  # Every visible transcript
  agql_store transcripts \"/^inter.*/.test(id)\"            # Transcripts matching an expression
  agql_store transcripts \"labels('corpus').includes('demo')\" --count
  agql_store transcripts -k participants                  # Participant names")]
pub struct TranscriptsCmd {
    /// AGQL expression over transcripts
    pub expression: Option<String>,

    /// What to list
    #[arg(short, long, value_enum, default_value_t = ListKind::Transcripts)]
    pub kind: ListKind,

    /// Only count the matches
    #[arg(long, default_value_t = false)]
    pub count: bool,

    #[command(flatten)]
    pub page: PageArgs,
}
