mod execute;
mod output;

use clap::Args;

/// Delete a transcript and its annotations
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store delete interview.trs
  agql_store delete interview          # Name without extension")]
pub struct DeleteCmd {
    /// Transcript name, name without extension, or numeric id
    pub id: String,
}
