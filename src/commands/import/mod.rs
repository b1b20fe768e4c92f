mod execute;
mod execute_tests;
mod output;

use std::path::PathBuf;

use clap::Args;

fn validate_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("File not found: {}", path.display()))
    }
}

/// Import a graph JSON file as a transcript
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store import -f interview.json                  # Store a new transcript
  agql_store import -f interview.json --id other.trs   # Store under another name
  agql_store import -f interview.json --replace        # Delete the stored copy first

Objects without change tags are imported as new; a file carrying
create/update/destroy tags is applied as an edit of the stored transcript.")]
pub struct ImportCmd {
    /// Path to the graph JSON file
    #[arg(short, long, value_parser = validate_file_exists)]
    pub file: PathBuf,

    /// Transcript name to store the graph under
    #[arg(long)]
    pub id: Option<String>,

    /// Delete an existing transcript with the same name before importing
    #[arg(long, default_value_t = false)]
    pub replace: bool,
}
