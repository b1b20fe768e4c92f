use std::error::Error;
use std::fs;

use serde::Serialize;
use tracing::info;

use super::ImportCmd;
use crate::commands::Execute;
use crate::graph::Graph;
use crate::store::{GraphStore, SaveOutcome, StoreError};

/// Result of the import command
#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub transcript: String,
    pub replaced: bool,
    #[serde(flatten)]
    pub outcome: SaveOutcome,
}

impl Execute for ImportCmd {
    type Output = ImportResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        let content = fs::read_to_string(&self.file)
            .map_err(|e| format!("Failed to read {}: {}", self.file.display(), e))?;
        let mut graph: Graph = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid graph JSON in {}: {}", self.file.display(), e))?;
        if let Some(id) = self.id {
            graph.id = id;
        }
        if !graph.has_changes() {
            graph.mark_all_created();
        }

        let replaced = if self.replace {
            match store.delete_transcript(&graph.id) {
                Ok(()) => true,
                Err(StoreError::GraphNotFound(_)) => false,
                Err(e) => return Err(e.into()),
            }
        } else {
            false
        };

        let outcome = store.save_transcript(&mut graph)?;
        info!(transcript = %graph.id, file = %self.file.display(), replaced, "imported");
        Ok(ImportResult {
            transcript: graph.id,
            replaced,
            outcome,
        })
    }
}
