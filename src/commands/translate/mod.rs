mod cli_tests;
mod execute;
mod execute_tests;
mod output;

use clap::{Args, ValueEnum};

use crate::queries::Projection;
use crate::store::MatchTarget;

/// What the translated SELECT returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ProjectionArg {
    /// Full annotation rows
    #[default]
    Annotations,
    /// Encoded ids only
    Ids,
    /// A single count
    Count,
}

impl From<ProjectionArg> for Projection {
    fn from(arg: ProjectionArg) -> Self {
        match arg {
            ProjectionArg::Annotations => Projection::Annotations,
            ProjectionArg::Ids => Projection::Ids,
            ProjectionArg::Count => Projection::Count,
        }
    }
}

/// Translate an AGQL expression to SQL without running it
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  agql_store translate \"layer.id == 'word' && label == 'the'\"
  agql_store translate \"my('turn').label == 'Bob'\" -p count
  agql_store translate \"/^inter.*/.test(id)\" --transcripts")]
pub struct TranslateCmd {
    /// AGQL expression
    pub expression: String,

    /// Select list of the translated query
    #[arg(short, long, value_enum, default_value_t = ProjectionArg::Annotations)]
    pub projection: ProjectionArg,

    /// Match transcripts instead of annotations
    #[arg(long, default_value_t = false)]
    pub transcripts: bool,
}

impl TranslateCmd {
    fn target(&self) -> MatchTarget {
        if self.transcripts {
            MatchTarget::Transcripts
        } else {
            MatchTarget::Annotations
        }
    }
}
