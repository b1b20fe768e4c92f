//! Layer definitions and the schema snapshot built from them.
//!
//! A layer is a named annotation type. Temporal layers live in their own
//! `annotation_layer_{N}` table whose shape depends on the layer's [`Scope`].
//! Structural layers (participants, corpus, episode, transcript type) and
//! attribute layers are backed by fixed tables instead.
//!
//! # Architecture
//!
//! - [`Layer`] describes one layer, [`LayerKind`] says where its rows live
//! - [`Schema`] is an immutable snapshot of all layers plus role assignments
//! - [`LayerResolver`] reads layer metadata from the database

mod resolver;
mod schema;

pub use resolver::{LayerError, LayerResolver};
pub use schema::Schema;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Numeric id of the word layer.
pub const WORD_LAYER_ID: i64 = 0;
/// Numeric id of the segment layer.
pub const SEGMENT_LAYER_ID: i64 = 1;
/// Numeric id of the turn layer.
pub const TURN_LAYER_ID: i64 = 11;
/// Numeric id of the utterance layer.
pub const UTTERANCE_LAYER_ID: i64 = 12;
pub const PARTICIPANT_LAYER_ID: i64 = -2;
pub const MAIN_PARTICIPANT_LAYER_ID: i64 = -3;
pub const EPISODE_LAYER_ID: i64 = -50;
pub const CORPUS_LAYER_ID: i64 = -100;
pub const TRANSCRIPT_TYPE_LAYER_ID: i64 = -200;

pub const PARTICIPANT_LAYER: &str = "participant";
pub const MAIN_PARTICIPANT_LAYER: &str = "main_participant";
pub const EPISODE_LAYER: &str = "episode";
pub const CORPUS_LAYER: &str = "corpus";
pub const TRANSCRIPT_TYPE_LAYER: &str = "transcript_type";

/// Prefix of layer ids backed by `annotation_transcript`.
pub const TRANSCRIPT_ATTRIBUTE_PREFIX: &str = "transcript_";
/// Prefix of layer ids backed by `annotation_participant`.
pub const PARTICIPANT_ATTRIBUTE_PREFIX: &str = "participant_";

/// Granularity class of a temporal layer.
///
/// Ordered from coarsest to finest so that `min` of two scopes yields the
/// granularity both layers share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Freeform,
    Episode,
    Meta,
    Word,
    Segment,
}

impl Scope {
    /// Storage code used in the `layer.scope` column.
    pub fn code(self) -> &'static str {
        match self {
            Scope::Freeform => "F",
            Scope::Episode => "E",
            Scope::Meta => "M",
            Scope::Word => "W",
            Scope::Segment => "S",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "F" => Some(Scope::Freeform),
            "E" => Some(Scope::Episode),
            "M" => Some(Scope::Meta),
            "W" => Some(Scope::Word),
            "S" => Some(Scope::Segment),
            _ => None,
        }
    }

    /// Token embedded in temporal annotation ids; empty for freeform.
    pub fn id_token(self) -> &'static str {
        match self {
            Scope::Freeform => "",
            Scope::Episode => "e",
            Scope::Meta => "m",
            Scope::Word => "w",
            Scope::Segment => "s",
        }
    }

    pub fn from_id_token(token: &str) -> Option<Self> {
        match token {
            "" => Some(Scope::Freeform),
            "e" => Some(Scope::Episode),
            "m" => Some(Scope::Meta),
            "w" => Some(Scope::Word),
            "s" => Some(Scope::Segment),
            _ => None,
        }
    }

    /// Denormalized key column shared by every table at or below this scope.
    ///
    /// `None` for freeform and episode layers, which share nothing finer than
    /// the transcript.
    pub fn join_key(self) -> Option<&'static str> {
        match self {
            Scope::Freeform | Scope::Episode => None,
            Scope::Meta => Some("turn_annotation_id"),
            Scope::Word => Some("word_annotation_id"),
            Scope::Segment => Some("segment_annotation_id"),
        }
    }
}

/// How annotations on a layer relate to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Tags: anchors are inherited from the parent.
    #[default]
    None,
    /// Point events: start and end share an offset.
    Instant,
    /// Spans with independent start and end.
    Interval,
}

impl Alignment {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Alignment::Instant,
            2 => Alignment::Interval,
            _ => Alignment::None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Alignment::None => 0,
            Alignment::Instant => 1,
            Alignment::Interval => 2,
        }
    }
}

/// Where a layer's annotations are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerKind {
    /// Rows in `annotation_layer_{layer_id}`.
    Temporal { layer_id: i64, scope: Scope },
    /// Rows in `speaker` joined through `transcript_speaker`.
    Participant,
    /// Rows in `transcript_speaker` with `main_speaker <> 0`.
    MainParticipant,
    /// The transcript's `transcript_family` row.
    Episode,
    /// The transcript's `corpus` row.
    Corpus,
    /// The transcript's `transcript_type` row.
    TranscriptType,
    /// Rows in `annotation_transcript` for one attribute.
    TranscriptAttribute { attribute: String },
    /// Rows in `annotation_participant` for one attribute.
    ParticipantAttribute { attribute: String },
}

/// Definition of a single annotation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Layer name, unique across the schema.
    pub id: String,
    /// Parent layer name; `None` when the parent is the graph itself.
    pub parent_id: Option<String>,
    pub description: String,
    pub kind: LayerKind,
    pub alignment: Alignment,
    /// Whether several annotations may share one parent.
    pub peers: bool,
    pub peers_overlap: bool,
    pub parent_includes: bool,
    pub saturated: bool,
    /// Label type: `string`, `number`, `ipa`, ...
    pub label_type: String,
    /// Closed vocabulary, label to description. Empty means open.
    pub valid_labels: BTreeMap<String, String>,
}

impl Layer {
    /// Skeleton of a layer; callers adjust the remaining fields.
    pub fn new(id: impl Into<String>, parent_id: Option<&str>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            description: String::new(),
            kind,
            alignment: Alignment::None,
            peers: false,
            peers_overlap: false,
            parent_includes: true,
            saturated: true,
            label_type: "string".to_string(),
            valid_labels: BTreeMap::new(),
        }
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_peers(mut self, peers: bool) -> Self {
        self.peers = peers;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Scope and numeric id for temporal layers.
    pub fn temporal(&self) -> Option<(i64, Scope)> {
        match self.kind {
            LayerKind::Temporal { layer_id, scope } => Some((layer_id, scope)),
            _ => None,
        }
    }

    pub fn scope(&self) -> Option<Scope> {
        self.temporal().map(|(_, scope)| scope)
    }

    /// Numeric id used in encoded ids and table names.
    pub fn numeric_id(&self) -> Option<i64> {
        match &self.kind {
            LayerKind::Temporal { layer_id, .. } => Some(*layer_id),
            LayerKind::Participant => Some(PARTICIPANT_LAYER_ID),
            LayerKind::MainParticipant => Some(MAIN_PARTICIPANT_LAYER_ID),
            LayerKind::Episode => Some(EPISODE_LAYER_ID),
            LayerKind::Corpus => Some(CORPUS_LAYER_ID),
            LayerKind::TranscriptType => Some(TRANSCRIPT_TYPE_LAYER_ID),
            LayerKind::TranscriptAttribute { .. } | LayerKind::ParticipantAttribute { .. } => None,
        }
    }

    /// Physical table holding a temporal layer's rows.
    pub fn table_name(&self) -> Option<String> {
        self.temporal().map(|(layer_id, _)| layer_table(layer_id))
    }

    /// Tag layers inherit their anchors from their parent.
    pub fn is_tag(&self) -> bool {
        self.alignment == Alignment::None
    }

    /// Whether turn and utterance labels hold participant numbers.
    pub fn labels_are_participants(&self) -> bool {
        matches!(
            self.temporal(),
            Some((TURN_LAYER_ID | UTTERANCE_LAYER_ID, _))
        )
    }
}

/// Name of the table holding rows for temporal layer `layer_id`.
pub fn layer_table(layer_id: i64) -> String {
    format!("annotation_layer_{}", layer_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Scope::Freeform, "F", "")]
    #[case(Scope::Episode, "E", "e")]
    #[case(Scope::Meta, "M", "m")]
    #[case(Scope::Word, "W", "w")]
    #[case(Scope::Segment, "S", "s")]
    fn test_scope_codes(#[case] scope: Scope, #[case] code: &str, #[case] token: &str) {
        assert_eq!(scope.code(), code);
        assert_eq!(Scope::from_code(code), Some(scope));
        assert_eq!(Scope::from_code(&code.to_lowercase()), Some(scope));
        assert_eq!(scope.id_token(), token);
        assert_eq!(Scope::from_id_token(token), Some(scope));
    }

    #[rstest]
    fn test_scope_ordering_coarse_to_fine() {
        assert!(Scope::Freeform < Scope::Meta);
        assert!(Scope::Meta < Scope::Word);
        assert!(Scope::Word < Scope::Segment);
        assert_eq!(Scope::Segment.min(Scope::Word), Scope::Word);
    }

    #[rstest]
    fn test_join_keys() {
        assert_eq!(Scope::Segment.join_key(), Some("segment_annotation_id"));
        assert_eq!(Scope::Word.join_key(), Some("word_annotation_id"));
        assert_eq!(Scope::Meta.join_key(), Some("turn_annotation_id"));
        assert_eq!(Scope::Freeform.join_key(), None);
    }

    #[rstest]
    fn test_layer_helpers() {
        let turn = Layer::new(
            "turn",
            Some(PARTICIPANT_LAYER),
            LayerKind::Temporal {
                layer_id: TURN_LAYER_ID,
                scope: Scope::Meta,
            },
        )
        .with_alignment(Alignment::Interval);
        assert_eq!(turn.table_name().as_deref(), Some("annotation_layer_11"));
        assert!(turn.labels_are_participants());
        assert!(!turn.is_tag());

        let corpus = Layer::new(CORPUS_LAYER, None, LayerKind::Corpus);
        assert_eq!(corpus.numeric_id(), Some(CORPUS_LAYER_ID));
        assert_eq!(corpus.table_name(), None);
        assert!(corpus.is_tag());
    }
}
