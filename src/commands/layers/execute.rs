use std::collections::BTreeMap;
use std::error::Error;

use serde::Serialize;

use super::LayersCmd;
use crate::commands::Execute;
use crate::layers::{Alignment, Layer, LayerKind, Scope};
use crate::store::GraphStore;

/// One layer as listed.
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub id: String,
    pub parent_id: Option<String>,
    /// Storage class: `temporal`, `participant`, `transcript_attribute`, ...
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub alignment: Alignment,
    pub peers: bool,
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub valid_labels: BTreeMap<String, String>,
}

impl From<&Layer> for LayerSummary {
    fn from(layer: &Layer) -> Self {
        let kind = match &layer.kind {
            LayerKind::Temporal { .. } => "temporal",
            LayerKind::Participant => "participant",
            LayerKind::MainParticipant => "main_participant",
            LayerKind::Episode => "episode",
            LayerKind::Corpus => "corpus",
            LayerKind::TranscriptType => "transcript_type",
            LayerKind::TranscriptAttribute { .. } => "transcript_attribute",
            LayerKind::ParticipantAttribute { .. } => "participant_attribute",
        };
        Self {
            id: layer.id.clone(),
            parent_id: layer.parent_id.clone(),
            kind: kind.to_string(),
            numeric_id: layer.numeric_id(),
            scope: layer.scope(),
            alignment: layer.alignment,
            peers: layer.peers,
            description: layer.description.clone(),
            valid_labels: layer.valid_labels.clone(),
        }
    }
}

/// Result of the layers command
#[derive(Debug, Serialize)]
pub struct LayersResult {
    /// Set when a single layer was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<String>,
    pub layers: Vec<LayerSummary>,
}

impl Execute for LayersCmd {
    type Output = LayersResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        let layers = match &self.layer {
            Some(id) => vec![LayerSummary::from(&store.get_layer(id)?)],
            None => store
                .schema()?
                .topological_order()
                .into_iter()
                .map(LayerSummary::from)
                .collect(),
        };
        Ok(LayersResult {
            requested: self.layer,
            layers,
        })
    }
}
