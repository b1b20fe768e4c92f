mod execute;
mod output;

use clap::Args;

/// Create the database schema and default layers
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store setup --db ./store.sqlite                  # Create schema
  agql_store setup --dry-run                            # Show what would be created
  agql_store setup --corpus demo --language en          # Also register a corpus")]
pub struct SetupCmd {
    /// Show what would be created without doing it
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Register a corpus with this name
    #[arg(long)]
    pub corpus: Option<String>,

    /// Language of the registered corpus
    #[arg(long, requires = "corpus")]
    pub language: Option<String>,
}
