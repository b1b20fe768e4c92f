use std::collections::{BTreeSet, HashMap};

use super::{
    Layer, CORPUS_LAYER_ID, EPISODE_LAYER_ID, MAIN_PARTICIPANT_LAYER_ID, PARTICIPANT_LAYER_ID,
    SEGMENT_LAYER_ID, TRANSCRIPT_TYPE_LAYER_ID, TURN_LAYER_ID, UTTERANCE_LAYER_ID, WORD_LAYER_ID,
};

/// Immutable set of layer definitions with well-known role assignments.
///
/// The store builds one snapshot per instance and shares it behind an `Rc`.
/// Code that needs to modify layers works on a `clone()`.
#[derive(Debug, Clone)]
pub struct Schema {
    layers: Vec<Layer>,
    index: HashMap<String, usize>,
    turn_layer_id: Option<String>,
    utterance_layer_id: Option<String>,
    word_layer_id: Option<String>,
    segment_layer_id: Option<String>,
    participant_layer_id: Option<String>,
    main_participant_layer_id: Option<String>,
    episode_layer_id: Option<String>,
    corpus_layer_id: Option<String>,
    transcript_type_layer_id: Option<String>,
}

impl Schema {
    /// Build a snapshot, assigning roles by numeric layer id.
    pub fn new(layers: Vec<Layer>) -> Self {
        let index = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (layer.id.clone(), i))
            .collect();
        let role = |numeric: i64| {
            layers
                .iter()
                .find(|layer| layer.numeric_id() == Some(numeric))
                .map(|layer| layer.id.clone())
        };
        Self {
            turn_layer_id: role(TURN_LAYER_ID),
            utterance_layer_id: role(UTTERANCE_LAYER_ID),
            word_layer_id: role(WORD_LAYER_ID),
            segment_layer_id: role(SEGMENT_LAYER_ID),
            participant_layer_id: role(PARTICIPANT_LAYER_ID),
            main_participant_layer_id: role(MAIN_PARTICIPANT_LAYER_ID),
            episode_layer_id: role(EPISODE_LAYER_ID),
            corpus_layer_id: role(CORPUS_LAYER_ID),
            transcript_type_layer_id: role(TRANSCRIPT_TYPE_LAYER_ID),
            layers,
            index,
        }
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.index.get(id).map(|&i| &self.layers[i])
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.id.clone()).collect()
    }

    /// Reverse lookup by the numeric id embedded in encoded ids.
    pub fn layer_by_numeric_id(&self, numeric: i64) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|layer| layer.numeric_id() == Some(numeric))
    }

    pub fn parent_of(&self, layer: &Layer) -> Option<&Layer> {
        layer.parent_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn children_of(&self, id: &str) -> Vec<&Layer> {
        self.layers
            .iter()
            .filter(|layer| layer.parent_id.as_deref() == Some(id))
            .collect()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<&Layer> {
        let mut ancestors = Vec::new();
        let mut current = self.layer(id).and_then(|layer| self.parent_of(layer));
        while let Some(layer) = current {
            // guard against cycles in hand-edited metadata
            if ancestors.iter().any(|a: &&Layer| a.id == layer.id) {
                break;
            }
            ancestors.push(layer);
            current = self.parent_of(layer);
        }
        ancestors
    }

    /// The requested layers plus all of their ancestors, parent before child.
    ///
    /// Fails with the first unknown layer id.
    pub fn closure_in_order(&self, ids: &[String]) -> Result<Vec<&Layer>, String> {
        let mut wanted = BTreeSet::new();
        for id in ids {
            if self.layer(id).is_none() {
                return Err(id.clone());
            }
            wanted.insert(id.as_str());
            for ancestor in self.ancestors(id) {
                wanted.insert(ancestor.id.as_str());
            }
        }
        Ok(self
            .topological_order()
            .into_iter()
            .filter(|layer| wanted.contains(layer.id.as_str()))
            .collect())
    }

    /// Every layer, parent before child, siblings in definition order.
    pub fn topological_order(&self) -> Vec<&Layer> {
        let mut ordered = Vec::with_capacity(self.layers.len());
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&Layer> = self
            .layers
            .iter()
            .filter(|layer| self.parent_of(layer).is_none())
            .rev()
            .collect();
        while let Some(layer) = stack.pop() {
            if !seen.insert(layer.id.as_str()) {
                continue;
            }
            ordered.push(layer);
            for child in self.children_of(&layer.id).into_iter().rev() {
                stack.push(child);
            }
        }
        ordered
    }

    /// Depth below the graph root; top-level layers are 1.
    pub fn depth(&self, id: &str) -> usize {
        self.ancestors(id).len() + 1
    }

    pub fn turn_layer(&self) -> Option<&Layer> {
        self.turn_layer_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn utterance_layer(&self) -> Option<&Layer> {
        self.utterance_layer_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn word_layer(&self) -> Option<&Layer> {
        self.word_layer_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn segment_layer(&self) -> Option<&Layer> {
        self.segment_layer_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn participant_layer(&self) -> Option<&Layer> {
        self.participant_layer_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn main_participant_layer(&self) -> Option<&Layer> {
        self.main_participant_layer_id
            .as_deref()
            .and_then(|id| self.layer(id))
    }

    pub fn episode_layer(&self) -> Option<&Layer> {
        self.episode_layer_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn corpus_layer(&self) -> Option<&Layer> {
        self.corpus_layer_id.as_deref().and_then(|id| self.layer(id))
    }

    pub fn transcript_type_layer(&self) -> Option<&Layer> {
        self.transcript_type_layer_id
            .as_deref()
            .and_then(|id| self.layer(id))
    }
}
