mod cli_tests;
mod execute;
mod execute_tests;
mod output;

use clap::Args;

use crate::commands::PageArgs;

/// Find annotations matching an AGQL expression
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store annotations \"layer.id == 'word' && label == 'the'\"
  agql_store annotations \"layer.id == 'word' && my('turn').label == 'Bob'\" --count
  agql_store annotations \"layer.id == 'segment'\" --ids --offset 100 --limit 50")]
pub struct AnnotationsCmd {
    /// AGQL expression
    pub expression: String,

    /// Only count the matches
    #[arg(long, default_value_t = false, conflicts_with = "ids")]
    pub count: bool,

    /// Only list the matching ids
    #[arg(long, default_value_t = false)]
    pub ids: bool,

    #[command(flatten)]
    pub page: PageArgs,
}
