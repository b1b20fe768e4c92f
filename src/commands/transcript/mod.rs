mod execute;
mod output;

use clap::Args;

/// Load a transcript, or a fragment of one, as a graph
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store transcript interview.trs -l word                # Words and their ancestors
  agql_store transcript interview -l word -l pos -o json     # Graph as JSON
  agql_store transcript interview.trs --annotation ew_0_3    # Fragment inside one annotation
  agql_store transcript interview.trs --start 1.0 --end 2.5  # Fragment between two offsets")]
pub struct TranscriptCmd {
    /// Transcript name, name without extension, or numeric id
    pub id: String,

    /// Layer to load; ancestors are added automatically (repeatable)
    #[arg(short, long = "layer")]
    pub layers: Vec<String>,

    /// Load only the span of this annotation
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub annotation: Option<String>,

    /// Start offset of the fragment to load
    #[arg(long, requires = "end")]
    pub start: Option<f64>,

    /// End offset of the fragment to load
    #[arg(long, requires = "start")]
    pub end: Option<f64>,
}
