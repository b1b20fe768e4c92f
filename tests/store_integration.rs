//! End-to-end tests against an in-memory SQLite store.
//!
//! Each test builds a fresh database with the default layers plus a `pos`
//! tag layer, a freeform `topic` layer and an episode-scope `series_note`
//! layer, then imports the interview fixture through the public API.

use agql_store::db::schema::{
    create_attribute, create_corpus, create_layer, initialize, LayerDefinition,
};
use agql_store::db::{extract_i64, extract_string, open_mem_db, Database};
use agql_store::graph::Graph;
use agql_store::layers::{Alignment, Scope};
use agql_store::queries::Projection;
use agql_store::store::{GraphStore, MatchTarget, SaveOutcome, StoreConfig, StoreError};
use rstest::{fixture, rstest};

const INTERVIEW: &str = include_str!("../src/fixtures/interview.json");

fn database() -> Box<dyn Database> {
    let db = open_mem_db().expect("Failed to open in-memory database");
    initialize(db.as_ref()).expect("Failed to initialize schema");
    for layer in [
        LayerDefinition::new(30, "pos", Some(0), Scope::Word),
        LayerDefinition::new(31, "topic", None, Scope::Freeform)
            .aligned(Alignment::Interval)
            .with_peers(),
        LayerDefinition::new(32, "series_note", Some(-50), Scope::Episode).with_peers(),
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

#[fixture]
fn store() -> GraphStore {
    let mut store = GraphStore::new(database(), StoreConfig::default());
    let mut graph: Graph = serde_json::from_str(INTERVIEW).expect("Fixture should deserialize");
    graph.mark_all_created();
    store.save_transcript(&mut graph).expect("Fixture should save");
    store
}

fn layers(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[rstest]
fn test_tag_layer_regex_query_needs_no_anchor_join(store: GraphStore) {
    let expression = "layer.id == 'orthography' && /th[aeiou].+/.test(label)";
    let query = store
        .compile(MatchTarget::Annotations, expression, Projection::Annotations, None)
        .unwrap();
    assert!(query.sql.contains("FROM annotation_layer_2 annotation"));
    assert!(query.sql.contains("annotation.label REGEXP"));
    assert!(!query.sql.contains("INNER JOIN anchor"));

    let labels: Vec<String> = store
        .get_matching_annotations(expression, None)
        .unwrap()
        .into_iter()
        .map(|a| a.label)
        .collect();
    assert_eq!(labels, vec!["thing"]);
}

#[rstest]
fn test_primary_layer_from_encoded_id(store: GraphStore) {
    let id = store
        .get_matching_annotation_ids("layer.id == 'word' && label == 'is'", None)
        .unwrap()
        .remove(0);
    let expression = format!("id == '{}'", id);
    let query = store
        .compile(MatchTarget::Annotations, &expression, Projection::Ids, None)
        .unwrap();
    assert!(query.sql.contains("'word' AS layer FROM annotation_layer_0 annotation"));
    assert!(query.sql.contains("CONCAT('ew_0_', annotation.annotation_id)"));
    assert_eq!(store.get_matching_annotation_ids(&expression, None).unwrap(), vec![id]);
}

#[rstest]
fn test_new_word_copies_turn_keys(mut store: GraphStore) {
    let mut graph = store
        .get_transcript("interview.trs", &layers(&["word"]))
        .unwrap();
    let turn = graph
        .layer_annotations("turn")
        .into_iter()
        .find(|t| t.label == "Bob")
        .map(|t| t.id.clone())
        .unwrap();
    let start = graph.add_anchor(Some(2.6));
    let end = graph.add_anchor(Some(2.9));
    let temporary = graph.add_annotation("word", "again", Some((&start, &end)), Some(&turn));
    assert_eq!(graph.annotation(&temporary).unwrap().ordinal, 3);

    let outcome = store.save_transcript(&mut graph).unwrap();
    let stored = outcome.created_id(&temporary).unwrap().to_string();
    let row: i64 = stored.strip_prefix("ew_0_").unwrap().parse().unwrap();
    let turn_row: i64 = turn.strip_prefix("em_11_").unwrap().parse().unwrap();

    let result = store
        .db()
        .query(
            "SELECT turn_annotation_id, ordinal_in_turn, word_annotation_id, label \
             FROM annotation_layer_0 WHERE annotation_id = ?",
            &[row.into()],
        )
        .unwrap();
    let stored_row = result.first_row().unwrap();
    assert_eq!(extract_i64(stored_row, 0), Some(turn_row));
    assert_eq!(extract_i64(stored_row, 1), Some(3));
    assert_eq!(extract_i64(stored_row, 2), Some(row));
    assert_eq!(extract_string(stored_row, 3).as_deref(), Some("again"));
    assert!(graph.annotation(&stored).is_some());
}

#[rstest]
fn test_language_falls_back_to_corpus(mut store: GraphStore) {
    let mut graph = Graph::new("foo.trs");
    graph.add_anchor(Some(0.0));
    store.save_transcript(&mut graph).unwrap();

    let found = store
        .get_matching_annotations("graph.id == 'foo.trs' && layer.id == 'transcript_language'", None)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].label, "en");
    assert_eq!(found[0].transcript_id, "foo.trs");
}

#[rstest]
fn test_anchor_in_use_elsewhere_is_kept(mut store: GraphStore) {
    let mut graph = store
        .get_transcript("interview.trs", &layers(&["topic"]))
        .unwrap();
    let topic = graph.layer_annotations("topic")[0].clone();
    let end = topic.end_id.clone().unwrap();
    graph.destroy_annotation(&topic.id);
    graph.destroy_anchor(&end);

    let SaveOutcome::Saved(summary) = store.save_transcript(&mut graph).unwrap() else {
        panic!("expected a save");
    };
    assert_eq!(summary.kept_anchors, vec![end.clone()]);
    assert_eq!(store.count_matching_annotations("layer.id == 'topic'").unwrap(), 0);

    let words = store
        .get_transcript("interview.trs", &layers(&["word"]))
        .unwrap();
    assert!(words.anchor(&end).is_some());
}

#[rstest]
fn test_relabel_round_trip(mut store: GraphStore) {
    let mut graph = store
        .get_transcript("interview.trs", &layers(&["word"]))
        .unwrap();
    let there = graph
        .layer_annotations("word")
        .into_iter()
        .find(|w| w.label == "there")
        .map(|w| w.id.clone())
        .unwrap();
    graph.set_label(&there, "here");
    store.save_transcript(&mut graph).unwrap();

    assert_eq!(
        store
            .count_matching_annotations("layer.id == 'word' && label == 'here'")
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .count_matching_annotations("layer.id == 'word' && label == 'there'")
            .unwrap(),
        0
    );
}

#[rstest]
fn test_fragment_of_a_word(store: GraphStore) {
    let thing = store
        .get_matching_annotation_ids("layer.id == 'word' && label == 'thing'", None)
        .unwrap()
        .remove(0);
    let fragment = store
        .get_fragment("interview.trs", &thing, &layers(&["word"]))
        .unwrap();
    let bounds = fragment.fragment.as_ref().unwrap();
    assert_eq!((bounds.start, bounds.end), (0.5, 1.0));
    assert_eq!(bounds.defined_by.as_deref(), Some(thing.as_str()));
    let words = fragment.layer_annotations("word");
    assert_eq!(words.len(), 1);
    assert_eq!(fragment.parent(words[0]).unwrap().layer_id, "turn");
}

#[rstest]
fn test_unknown_transcript(store: GraphStore) {
    assert!(matches!(
        store.get_transcript("nothing.trs", &[]),
        Err(StoreError::GraphNotFound(id)) if id == "nothing.trs"
    ));
}
