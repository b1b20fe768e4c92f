use std::error::Error;

use serde::Serialize;

use super::TranscriptCmd;
use crate::commands::Execute;
use crate::graph::Graph;
use crate::store::GraphStore;

/// Result of the transcript command
#[derive(Debug, Serialize)]
pub struct TranscriptResult {
    /// Layers present in the graph, parents first.
    pub layers: Vec<String>,
    pub graph: Graph,
}

impl Execute for TranscriptCmd {
    type Output = TranscriptResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        let graph = match (&self.annotation, self.start, self.end) {
            (Some(annotation), _, _) => store.get_fragment(&self.id, annotation, &self.layers)?,
            (None, Some(start), Some(end)) => {
                store.get_fragment_by_offsets(&self.id, start, end, &self.layers)?
            }
            _ => store.get_transcript(&self.id, &self.layers)?,
        };

        let schema = store.schema()?;
        let layers = schema
            .topological_order()
            .into_iter()
            .filter(|layer| !graph.layer_annotations(&layer.id).is_empty())
            .map(|layer| layer.id.clone())
            .collect();

        Ok(TranscriptResult { layers, graph })
    }
}
