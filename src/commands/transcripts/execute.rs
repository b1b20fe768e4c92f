use std::error::Error;

use serde::Serialize;

use super::{ListKind, TranscriptsCmd};
use crate::commands::Execute;
use crate::store::GraphStore;

/// Result of the transcripts command
#[derive(Debug, Serialize)]
pub struct TranscriptsResult {
    pub kind: ListKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Number of names before paging.
    pub total: i64,
    pub names: Vec<String>,
}

impl Execute for TranscriptsCmd {
    type Output = TranscriptsResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        let (total, names) = match (&self.expression, self.kind) {
            (Some(expression), ListKind::Transcripts) => {
                let total = store.count_matching_transcript_ids(expression)?;
                let names = if self.count {
                    Vec::new()
                } else {
                    store.get_matching_transcript_ids(expression, Some(self.page.to_limit()))?
                };
                (total, names)
            }
            (Some(_), kind) => {
                return Err(format!("An expression can only filter transcripts, not {:?}", kind)
                    .to_lowercase()
                    .into());
            }
            (None, kind) => {
                let all = match kind {
                    ListKind::Transcripts => store.get_transcript_ids()?,
                    ListKind::Corpora => store.get_corpus_ids()?,
                    ListKind::Participants => store.get_participant_ids()?,
                };
                let total = all.len() as i64;
                let names = if self.count {
                    Vec::new()
                } else {
                    all.into_iter()
                        .skip(self.page.offset as usize)
                        .take(self.page.limit as usize)
                        .collect()
                };
                (total, names)
            }
        };

        Ok(TranscriptsResult {
            kind: self.kind,
            expression: self.expression,
            total,
            names,
        })
    }
}
