//! The save pipeline.
//!
//! Saving writes every tracked change of a graph inside one transaction:
//!
//! 1. the `transcript` row, for a graph not stored yet
//! 2. created and updated anchors, patching their new ids into the graph
//! 3. created and updated annotations, parents first
//! 4. destroyed annotations, children first
//! 5. unchanged annotations whose anchor ids were patched
//! 6. destroyed anchors no stored annotation still uses
//! 7. anchors of tag layers under words and segments, re-copied from their
//!    parents
//!
//! The graph is written from a working copy, so a failed save leaves the
//! caller's graph as it was.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::context::{SaveContext, TranscriptRow};
use super::load::find_transcript;
use super::{persist, StoreConfig, StoreError};
use crate::db::{extract_i64, extract_string, Database};
use crate::graph::{normalize, validate, Change, Graph};
use crate::layers::{Schema, Scope, CORPUS_LAYER, EPISODE_LAYER, TRANSCRIPT_TYPE_LAYER};

/// What a save did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Nothing was tracked; no statement was executed.
    NoChanges,
    Saved(SaveSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveSummary {
    pub ag_id: i64,
    /// Data-modifying statements executed.
    pub statements: usize,
    /// Temporary id to stored id, for every object created.
    pub created: BTreeMap<String, String>,
    /// Anchors flagged for deletion but kept because stored annotations
    /// still use them.
    pub kept_anchors: Vec<String>,
}

impl SaveOutcome {
    /// Stored id of an object created under temporary id `id`.
    pub fn created_id(&self, id: &str) -> Option<&str> {
        match self {
            SaveOutcome::NoChanges => None,
            SaveOutcome::Saved(summary) => summary.created.get(id).map(String::as_str),
        }
    }
}

pub(crate) fn save_transcript(
    db: &dyn Database,
    schema: &Schema,
    config: &StoreConfig,
    graph: &mut Graph,
) -> Result<SaveOutcome, StoreError> {
    if !graph.has_changes() {
        debug!(transcript = %graph.id, "nothing to save");
        return Ok(SaveOutcome::NoChanges);
    }

    let mut working = graph.clone();
    let existing = find_transcript(db, &working.id)?;
    if existing.is_none() {
        add_defaults(db, config, &mut working)?;
    }
    if !working.validated {
        let fixed = normalize(&mut working, schema);
        if fixed > 0 {
            debug!(transcript = %working.id, fixed, "graph normalized");
        }
        validate(&working, schema).map_err(|errors| StoreError::Validation {
            graph: working.id.clone(),
            errors,
        })?;
    }
    if let Some(censorship) = &config.censorship {
        let word_layer = schema.word_layer().map_or("word", |layer| layer.id.as_str());
        censorship.apply(&mut working, word_layer)?;
    }

    let before = db.statements_written();
    db.begin()?;
    let ctx = match write(db, schema, &mut working, existing) {
        Ok(ctx) => {
            db.commit()?;
            ctx
        }
        Err(e) => {
            if let Err(rollback) = db.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            return Err(e);
        }
    };

    working.commit();
    *graph = working;
    let summary = SaveSummary {
        ag_id: ctx.ag_id,
        statements: db.statements_written() - before,
        created: ctx.renamed,
        kept_anchors: ctx.kept_anchors,
    };
    info!(
        transcript = %graph.id,
        statements = summary.statements,
        created = summary.created.len(),
        "transcript saved"
    );
    Ok(SaveOutcome::Saved(summary))
}

/// Give a new transcript the corpus, episode and type it is missing.
fn add_defaults(
    db: &dyn Database,
    config: &StoreConfig,
    graph: &mut Graph,
) -> Result<(), StoreError> {
    let missing = |graph: &Graph, layer: &str| {
        graph
            .layer_annotations(layer)
            .iter()
            .all(|a| a.change == Change::Destroy)
    };

    if missing(graph, CORPUS_LAYER) {
        let corpus = match &config.default_corpus {
            Some(corpus) => Some(corpus.clone()),
            None => first_string(db, "SELECT corpus_name FROM corpus ORDER BY corpus_id LIMIT 1")?,
        };
        if let Some(corpus) = corpus {
            graph.add_annotation(CORPUS_LAYER, &corpus, None, None);
        }
    }
    if missing(graph, EPISODE_LAYER) {
        let episode = graph
            .id
            .rsplit_once('.')
            .map_or(graph.id.as_str(), |(stem, _)| stem)
            .to_string();
        graph.add_annotation(EPISODE_LAYER, &episode, None, None);
    }
    if missing(graph, TRANSCRIPT_TYPE_LAYER) {
        let transcript_type = match &config.default_transcript_type {
            Some(name) => name.clone(),
            None => first_string(
                db,
                "SELECT transcript_type FROM transcript_type ORDER BY type_id LIMIT 1",
            )?
            .unwrap_or_else(|| "interview".to_string()),
        };
        graph.add_annotation(TRANSCRIPT_TYPE_LAYER, &transcript_type, None, None);
    }
    Ok(())
}

fn first_string(db: &dyn Database, sql: &str) -> Result<Option<String>, StoreError> {
    let result = db.query(sql, &[])?;
    Ok(result.first_row().and_then(|row| extract_string(row, 0)))
}

fn write(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    existing: Option<TranscriptRow>,
) -> Result<SaveContext, StoreError> {
    let mut ctx = match existing {
        Some(transcript) => SaveContext::new(transcript.ag_id, transcript.family_id),
        None => {
            let ag_id = db.insert(
                "INSERT INTO transcript (transcript_id, update_date) VALUES (?, ?)",
                &[graph.id.as_str().into(), chrono::Utc::now().to_rfc3339().into()],
            )?;
            debug!(transcript = %graph.id, ag_id, "transcript row created");
            SaveContext::new(ag_id, None)
        }
    };
    load_participant_numbers(db, &mut ctx)?;

    persist::save_anchors(db, graph, &mut ctx)?;

    let order = schema.topological_order();
    for layer in &order {
        for id in changed_ids(graph, &layer.id, |c| matches!(c, Change::Create | Change::Update)) {
            persist::save_annotation(db, schema, graph, &mut ctx, layer, &id)?;
        }
    }
    for layer in order.iter().rev() {
        for id in changed_ids(graph, &layer.id, |c| c == Change::Destroy) {
            persist::destroy_annotation(db, graph, &mut ctx, layer, &id)?;
        }
    }

    let extra: Vec<String> = std::mem::take(&mut ctx.extra_updates).into_iter().collect();
    for id in extra {
        if ctx.processed.contains(&id) {
            continue;
        }
        let Some(layer) = graph
            .annotation(&id)
            .filter(|a| a.change == Change::NoChange)
            .and_then(|a| schema.layer(&a.layer_id))
        else {
            continue;
        };
        persist::save_annotation(db, schema, graph, &mut ctx, layer, &id)?;
    }

    persist::destroy_anchors(db, schema, graph, &mut ctx)?;

    if ctx.words_changed {
        repair_tag_anchors(db, schema, ctx.ag_id)?;
    }
    db.execute(
        "UPDATE transcript SET update_date = ? WHERE ag_id = ?",
        &[ctx.now.as_str().into(), ctx.ag_id.into()],
    )?;
    Ok(ctx)
}

fn changed_ids(graph: &Graph, layer: &str, wanted: impl Fn(Change) -> bool) -> Vec<String> {
    graph
        .layer_annotations(layer)
        .into_iter()
        .filter(|a| wanted(a.change))
        .map(|a| a.id.clone())
        .collect()
}

fn load_participant_numbers(db: &dyn Database, ctx: &mut SaveContext) -> Result<(), StoreError> {
    let result = db.query(
        "SELECT s.name, s.speaker_number FROM transcript_speaker ts \
         INNER JOIN speaker s ON s.speaker_number = ts.speaker_number WHERE ts.ag_id = ?",
        &[ctx.ag_id.into()],
    )?;
    for row in &result.rows {
        if let (Some(name), Some(number)) = (extract_string(row, 0), extract_i64(row, 1)) {
            ctx.participant_numbers.insert(name, number);
        }
    }
    Ok(())
}

/// Re-copy anchors onto tag rows under word and segment rows that may
/// have moved.
fn repair_tag_anchors(db: &dyn Database, schema: &Schema, ag_id: i64) -> Result<(), StoreError> {
    let fine = |scope: Option<Scope>| matches!(scope, Some(Scope::Word | Scope::Segment));
    for layer in schema.layers() {
        if !layer.is_tag() || !fine(layer.scope()) {
            continue;
        }
        let Some(parent) = schema.parent_of(layer) else {
            continue;
        };
        if !fine(parent.scope()) {
            continue;
        }
        let (Some(table), Some(parent_table)) = (layer.table_name(), parent.table_name()) else {
            continue;
        };
        let repaired = db.execute(
            &format!(
                "UPDATE {table} SET start_anchor_id = p.start_anchor_id, \
                 end_anchor_id = p.end_anchor_id FROM {parent_table} p \
                 WHERE p.annotation_id = {table}.parent_id AND {table}.ag_id = ? \
                 AND ({table}.start_anchor_id IS NOT p.start_anchor_id \
                 OR {table}.end_anchor_id IS NOT p.end_anchor_id)"
            ),
            &[ag_id.into()],
        )?;
        if repaired > 0 {
            debug!(layer = %layer.id, repaired, "tag anchors re-copied");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::PARTICIPANT_LAYER;
    use crate::store::{Censorship, GraphStore};
    use crate::test_utils::{empty_store, fixture_graph, seeded_store};
    use rstest::rstest;

    fn all_layers(store: &GraphStore) -> Vec<String> {
        store.schema().unwrap().layer_ids()
    }

    #[rstest]
    fn test_unchanged_graph_writes_nothing() {
        let mut store = seeded_store();
        let layers = all_layers(&store);
        let mut graph = store.get_transcript("interview.trs", &layers).unwrap();
        let before = store.db().statements_written();
        assert_eq!(store.save_transcript(&mut graph).unwrap(), SaveOutcome::NoChanges);
        assert_eq!(store.db().statements_written(), before);
    }

    #[rstest]
    fn test_round_trip_keeps_structure() {
        let store = seeded_store();
        let layers = all_layers(&store);
        let graph = store.get_transcript("interview.trs", &layers).unwrap();

        let words: Vec<_> = graph
            .layer_annotations("word")
            .iter()
            .map(|w| w.label.clone())
            .collect();
        assert_eq!(words, vec!["the", "thing", "is", "that", "there"]);
        assert_eq!(graph.layer_annotations("segment").len(), 2);
        assert_eq!(graph.layer_annotations("topic")[0].label, "greeting");
        assert_eq!(graph.layer_annotations("participant_gender")[0].label, "F");
        assert_eq!(graph.layer_annotations(EPISODE_LAYER)[0].label, "interview");
        assert_eq!(graph.layer_annotations(TRANSCRIPT_TYPE_LAYER)[0].label, "interview");

        let orthography = graph.layer_annotations("orthography");
        assert_eq!(orthography.len(), 2);
        for tag in orthography {
            let word = graph.parent(tag).unwrap();
            assert_eq!(tag.start_id, word.start_id);
            assert_eq!(tag.end_id, word.end_id);
        }
    }

    #[rstest]
    fn test_created_ids_are_reported() {
        let mut store = empty_store();
        let mut graph = fixture_graph();
        graph.mark_all_created();
        let outcome = store.save_transcript(&mut graph).unwrap();
        let SaveOutcome::Saved(summary) = &outcome else {
            panic!("expected a save");
        };
        assert_eq!(summary.created.get("ann").map(String::as_str), Some("m_-2_1"));
        assert!(outcome.created_id("w1").unwrap().starts_with("ew_0_"));
        assert!(outcome.created_id("a0").unwrap().starts_with("n_"));
        assert!(!graph.has_changes());
        assert!(graph.annotation("w1").is_none());
        assert!(graph.annotation(outcome.created_id("w1").unwrap()).is_some());
    }

    #[rstest]
    fn test_invalid_graph_is_rejected_without_writes() {
        let mut store = empty_store();
        let mut graph = fixture_graph();
        graph.mark_all_created();
        graph.annotation_mut("w1").unwrap().parent_id = Some("nowhere".into());
        let before = store.db().statements_written();
        assert!(matches!(
            store.save_transcript(&mut graph),
            Err(StoreError::Validation { graph, .. }) if graph == "interview.trs"
        ));
        assert_eq!(store.db().statements_written(), before);
        assert!(graph.has_changes());
    }

    #[rstest]
    fn test_new_transcript_gets_defaults() {
        let mut store = empty_store();
        let mut graph = Graph::new("lecture.wav.trs");
        graph.add_anchor(Some(0.0));
        store.save_transcript(&mut graph).unwrap();
        let loaded = store
            .get_transcript("lecture.wav.trs", &[CORPUS_LAYER.into(), EPISODE_LAYER.into()])
            .unwrap();
        assert_eq!(loaded.layer_annotations(CORPUS_LAYER)[0].label, "demo");
        assert_eq!(loaded.layer_annotations(EPISODE_LAYER)[0].label, "lecture.wav");
    }

    #[rstest]
    fn test_censorship_applies_on_save() {
        let mut store = GraphStore::new(
            crate::test_utils::empty_db(),
            StoreConfig {
                censorship: Some(Censorship::new("topic", "greeting", "***")),
                ..StoreConfig::default()
            },
        );
        let mut graph = fixture_graph();
        graph.mark_all_created();
        store.save_transcript(&mut graph).unwrap();
        let words = store
            .db()
            .query_i64("SELECT COUNT(*) FROM annotation_layer_0 WHERE label = '***'", &[])
            .unwrap();
        assert_eq!(words, Some(3));
    }

    #[rstest]
    fn test_participant_parent_is_kept() {
        let store = seeded_store();
        let graph = store
            .get_transcript("interview.trs", &[PARTICIPANT_LAYER.into(), "turn".into()])
            .unwrap();
        for turn in graph.layer_annotations("turn") {
            let participant = graph.parent(turn).unwrap();
            assert_eq!(participant.label, turn.label);
        }
    }
}
