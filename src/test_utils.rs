//! Shared test utilities for unit, store and command tests.
//!
//! Two kinds of setup are provided:
//! - [`sample_schema`]: an in-memory layer set for compiler tests, no database
//! - [`seeded_db`] / [`seeded_store`]: an in-memory SQLite store with the
//!   default layers, a few extra layers and one imported transcript

use std::io::Write;

use tempfile::NamedTempFile;

use crate::db::schema::{
    create_attribute, create_corpus, create_layer, initialize, LayerDefinition,
};
use crate::db::{open_mem_db, Database};
use crate::fixtures;
use crate::graph::Graph;
use crate::layers::{
    Alignment, Layer, LayerKind, Schema, Scope, CORPUS_LAYER, EPISODE_LAYER,
    MAIN_PARTICIPANT_LAYER, PARTICIPANT_LAYER, TRANSCRIPT_TYPE_LAYER, WORD_LAYER_ID,
};
use crate::store::{GraphStore, StoreConfig};

/// Numeric id of the extra word-scope `pos` layer.
pub const POS_LAYER_ID: i64 = 30;
/// Numeric id of the extra freeform `topic` layer.
pub const TOPIC_LAYER_ID: i64 = 31;
/// Numeric id of the extra episode-scope `series_note` layer.
pub const SERIES_NOTE_LAYER_ID: i64 = 32;

fn temporal(id: &str, parent: Option<&str>, layer_id: i64, scope: Scope) -> Layer {
    Layer::new(id, parent, LayerKind::Temporal { layer_id, scope })
}

/// Layers mirroring [`seeded_db`], built without a database.
pub fn sample_schema() -> Schema {
    Schema::new(vec![
        Layer::new(PARTICIPANT_LAYER, None, LayerKind::Participant).with_peers(true),
        Layer::new(MAIN_PARTICIPANT_LAYER, Some(PARTICIPANT_LAYER), LayerKind::MainParticipant),
        Layer::new(EPISODE_LAYER, None, LayerKind::Episode),
        Layer::new(CORPUS_LAYER, None, LayerKind::Corpus),
        Layer::new(TRANSCRIPT_TYPE_LAYER, None, LayerKind::TranscriptType),
        Layer::new(
            "transcript_language",
            None,
            LayerKind::TranscriptAttribute {
                attribute: "language".into(),
            },
        ),
        Layer::new(
            "participant_gender",
            Some(PARTICIPANT_LAYER),
            LayerKind::ParticipantAttribute {
                attribute: "gender".into(),
            },
        ),
        temporal("word", Some("turn"), 0, Scope::Word)
            .with_alignment(Alignment::Interval)
            .with_peers(true),
        temporal("segment", Some("word"), 1, Scope::Segment)
            .with_alignment(Alignment::Interval)
            .with_peers(true),
        temporal("orthography", Some("word"), 2, Scope::Word),
        temporal("turn", Some(PARTICIPANT_LAYER), 11, Scope::Meta)
            .with_alignment(Alignment::Interval)
            .with_peers(true),
        temporal("utterance", Some("turn"), 12, Scope::Meta)
            .with_alignment(Alignment::Interval)
            .with_peers(true),
        temporal("pos", Some("word"), POS_LAYER_ID, Scope::Word),
        temporal("topic", None, TOPIC_LAYER_ID, Scope::Freeform)
            .with_alignment(Alignment::Interval)
            .with_peers(true),
        temporal("series_note", Some(EPISODE_LAYER), SERIES_NOTE_LAYER_ID, Scope::Episode)
            .with_peers(true),
    ])
}

/// Create a temporary file containing the given content.
pub fn create_temp_json_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file
}

/// Empty in-memory database with the default layers, the extra layers of
/// [`sample_schema`], the `language` and `gender` attributes and a corpus.
pub fn empty_db() -> Box<dyn Database> {
    let db = open_mem_db().expect("Failed to open in-memory database");
    initialize(db.as_ref()).expect("Failed to initialize schema");
    for layer in [
        LayerDefinition::new(POS_LAYER_ID, "pos", Some(WORD_LAYER_ID), Scope::Word),
        LayerDefinition::new(TOPIC_LAYER_ID, "topic", None, Scope::Freeform)
            .aligned(Alignment::Interval)
            .with_peers(),
        LayerDefinition::new(SERIES_NOTE_LAYER_ID, "series_note", Some(-50), Scope::Episode)
            .with_peers(),
    ] {
        create_layer(db.as_ref(), &layer).expect("Failed to create layer");
    }
    create_attribute(db.as_ref(), "transcript", "language", "string", false)
        .expect("Failed to create attribute");
    create_attribute(db.as_ref(), "speaker", "gender", "string", false)
        .expect("Failed to create attribute");
    create_corpus(db.as_ref(), "demo", Some("en")).expect("Failed to create corpus");
    db
}

/// Store over [`empty_db`] with default options.
pub fn empty_store() -> GraphStore {
    GraphStore::new(empty_db(), StoreConfig::default())
}

/// The fixture transcript, freshly deserialized.
pub fn fixture_graph() -> Graph {
    serde_json::from_str(fixtures::INTERVIEW).expect("Fixture should deserialize")
}

/// Store holding the fixture transcript `interview.trs`.
pub fn seeded_store() -> GraphStore {
    let mut store = empty_store();
    let mut graph = fixture_graph();
    graph.mark_all_created();
    store
        .save_transcript(&mut graph)
        .expect("Fixture should save");
    store
}
