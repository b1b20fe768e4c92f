mod cli_tests;
mod execute;
mod output;

use clap::Args;

/// List layer definitions, or show one layer
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store layers                 # All layers, parents before children
  agql_store layers word            # One layer with its label vocabulary
  agql_store layers -o json         # Machine-readable listing")]
pub struct LayersCmd {
    /// Layer to show in full
    pub layer: Option<String>,
}
