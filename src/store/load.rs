//! Transcript resolution and per-layer-class loaders.

use tracing::debug;

use super::context::{LoadContext, TranscriptRow};
use super::StoreError;
use crate::db::escape::escape_regex;
use crate::db::{
    extract_f64, extract_i64, extract_string, extract_string_or, Database, QueryResult, SqlValue,
};
use crate::graph::{Anchor, Annotation, Graph};
use crate::ids::{AnchorId, AnnotationId, MetaId, ParticipantAttributeId, TranscriptAttributeId};
use crate::layers::{
    Layer, LayerKind, Schema, Scope, CORPUS_LAYER_ID, EPISODE_LAYER_ID,
    MAIN_PARTICIPANT_LAYER_ID, PARTICIPANT_LAYER_ID, TRANSCRIPT_TYPE_LAYER_ID,
};
use crate::queries::Clause;

const TRANSCRIPT_COLUMNS: &str = "ag_id, transcript_id, corpus_name, family_id, type_id";

/// Columns of a temporal row joined with both anchors, in the order
/// [`add_temporal_rows`] reads them.
const TEMPORAL_COLUMNS: &str = "a.annotation_id, a.label, a.label_status, a.start_anchor_id, \
     a.end_anchor_id, a.parent_id, a.ordinal, a.annotated_by, a.annotated_when, \
     s.offset, s.alignment_status, s.annotated_by, s.annotated_when, \
     e.offset, e.alignment_status, e.annotated_by, e.annotated_when";

fn transcript_row(result: &QueryResult) -> Option<TranscriptRow> {
    let row = result.first_row()?;
    Some(TranscriptRow {
        ag_id: extract_i64(row, 0)?,
        transcript_id: extract_string(row, 1)?,
        corpus_name: extract_string(row, 2),
        family_id: extract_i64(row, 3),
        type_id: extract_i64(row, 4),
    })
}

/// The row named exactly `id`, if any.
pub(crate) fn find_transcript(
    db: &dyn Database,
    id: &str,
) -> Result<Option<TranscriptRow>, StoreError> {
    let result = db.query(
        &format!("SELECT {TRANSCRIPT_COLUMNS} FROM transcript WHERE transcript_id = ?"),
        &[id.into()],
    )?;
    Ok(transcript_row(&result))
}

/// Find a transcript by exact name, then by name ignoring the extension,
/// then by numeric `ag_id`.
pub(crate) fn resolve_transcript(db: &dyn Database, id: &str) -> Result<TranscriptRow, StoreError> {
    if let Some(found) = find_transcript(db, id)? {
        return Ok(found);
    }

    let stem = id.rsplit_once('.').map_or(id, |(stem, _)| stem);
    let pattern = format!(r"^{}(\.[^.]+)?$", escape_regex(stem));
    let result = db.query(
        &format!(
            "SELECT {TRANSCRIPT_COLUMNS} FROM transcript WHERE transcript_id REGEXP ? \
             ORDER BY transcript_id LIMIT 1"
        ),
        &[pattern.into()],
    )?;
    if let Some(found) = transcript_row(&result) {
        debug!(requested = id, found = %found.transcript_id, "transcript matched by stem");
        return Ok(found);
    }

    if let Ok(ag_id) = id.parse::<i64>() {
        let result = db.query(
            &format!("SELECT {TRANSCRIPT_COLUMNS} FROM transcript WHERE ag_id = ?"),
            &[ag_id.into()],
        )?;
        if let Some(found) = transcript_row(&result) {
            return Ok(found);
        }
    }
    Err(StoreError::GraphNotFound(id.to_string()))
}

/// Fail unless the transcript satisfies the access clause.
pub(crate) fn check_access(
    db: &dyn Database,
    access: Option<&Clause>,
    transcript: &TranscriptRow,
) -> Result<(), StoreError> {
    let Some(access) = access else {
        return Ok(());
    };
    let mut params: Vec<SqlValue> = vec![transcript.ag_id.into()];
    params.extend(access.params.iter().cloned());
    let visible = db.query_i64(
        &format!(
            "SELECT COUNT(*) FROM transcript graph WHERE graph.ag_id = ? AND ({})",
            access.sql
        ),
        &params,
    )?;
    if visible.unwrap_or(0) == 0 {
        return Err(StoreError::PermissionDenied(transcript.transcript_id.clone()));
    }
    Ok(())
}

pub(crate) fn get_transcript(
    db: &dyn Database,
    schema: &Schema,
    access: Option<&Clause>,
    id: &str,
    layer_ids: &[String],
) -> Result<Graph, StoreError> {
    let transcript = resolve_transcript(db, id)?;
    check_access(db, access, &transcript)?;
    let layers = schema
        .closure_in_order(layer_ids)
        .map_err(StoreError::LayerNotFound)?;

    let mut graph = Graph::new(transcript.transcript_id.clone());
    let mut ctx = LoadContext::new(transcript, None);
    load_layers(db, schema, &mut graph, &mut ctx, &layers)?;
    span_graph_level(&mut graph);
    graph.commit();
    debug!(
        transcript = %graph.id,
        layers = layers.len(),
        annotations = graph.annotations().count(),
        "transcript loaded"
    );
    Ok(graph)
}

/// Run each layer's loader, parents first.
pub(crate) fn load_layers(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    ctx: &mut LoadContext,
    layers: &[&Layer],
) -> Result<(), StoreError> {
    for layer in layers {
        match &layer.kind {
            LayerKind::Participant => load_participants(db, graph, ctx, layer)?,
            LayerKind::MainParticipant => load_main_participants(graph, ctx, layer),
            LayerKind::Episode => load_episode(db, graph, ctx, layer)?,
            LayerKind::Corpus => load_corpus(graph, ctx, layer),
            LayerKind::TranscriptType => load_transcript_type(db, graph, ctx, layer)?,
            LayerKind::TranscriptAttribute { attribute } => {
                load_transcript_attribute(db, graph, ctx, layer, attribute)?
            }
            LayerKind::ParticipantAttribute { attribute } => {
                load_participant_attribute(db, graph, ctx, layer, attribute)?
            }
            LayerKind::Temporal { layer_id, scope: Scope::Episode } => {
                load_episode_tags(db, graph, ctx, layer, *layer_id)?
            }
            LayerKind::Temporal { .. } => {
                let mut condition = "a.ag_id = ?".to_string();
                let mut params: Vec<SqlValue> = vec![ctx.transcript.ag_id.into()];
                if let Some(bounds) = &ctx.bounds {
                    condition.push_str(" AND s.offset >= ? AND e.offset <= ?");
                    params.push(bounds.start.into());
                    params.push(bounds.end.into());
                }
                let rows = temporal_rows(db, layer, &condition, &params)?;
                add_temporal_rows(schema, graph, ctx, layer, &rows)?;
            }
        }
    }
    Ok(())
}

fn load_participants(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut LoadContext,
    layer: &Layer,
) -> Result<(), StoreError> {
    let result = db.query(
        "SELECT s.speaker_number, s.name, ts.main_speaker FROM transcript_speaker ts \
         INNER JOIN speaker s ON s.speaker_number = ts.speaker_number \
         WHERE ts.ag_id = ? ORDER BY s.speaker_number",
        &[ctx.transcript.ag_id.into()],
    )?;
    for (i, row) in result.rows.iter().enumerate() {
        let Some(number) = extract_i64(row, 0) else {
            continue;
        };
        let name = extract_string_or(row, 1, "");
        if extract_i64(row, 2).unwrap_or(0) != 0 {
            ctx.main_participants.insert(number);
        }
        graph.insert_annotation(
            Annotation::new(
                MetaId::new(PARTICIPANT_LAYER_ID, number.to_string()).to_string(),
                &layer.id,
                &name,
            )
            .with_ordinal(i as i64 + 1),
        );
        ctx.participant_names.insert(number, name);
    }
    Ok(())
}

fn load_main_participants(graph: &mut Graph, ctx: &LoadContext, layer: &Layer) {
    for number in &ctx.main_participants {
        let name = ctx
            .participant_names
            .get(number)
            .cloned()
            .unwrap_or_default();
        graph.insert_annotation(
            Annotation::new(
                MetaId::new(MAIN_PARTICIPANT_LAYER_ID, number.to_string()).to_string(),
                &layer.id,
                name,
            )
            .with_parent(MetaId::new(PARTICIPANT_LAYER_ID, number.to_string()).to_string()),
        );
    }
}

fn load_episode(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &LoadContext,
    layer: &Layer,
) -> Result<(), StoreError> {
    let Some(family_id) = ctx.transcript.family_id else {
        return Ok(());
    };
    let result = db.query(
        "SELECT name FROM transcript_family WHERE family_id = ?",
        &[family_id.into()],
    )?;
    if let Some(name) = result.first_row().and_then(|row| extract_string(row, 0)) {
        graph.insert_annotation(Annotation::new(
            MetaId::new(EPISODE_LAYER_ID, family_id.to_string()).to_string(),
            &layer.id,
            name,
        ));
    }
    Ok(())
}

fn load_corpus(graph: &mut Graph, ctx: &LoadContext, layer: &Layer) {
    if let Some(corpus) = &ctx.transcript.corpus_name {
        graph.insert_annotation(Annotation::new(
            MetaId::new(CORPUS_LAYER_ID, corpus.as_str()).to_string(),
            &layer.id,
            corpus.as_str(),
        ));
    }
}

fn load_transcript_type(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &LoadContext,
    layer: &Layer,
) -> Result<(), StoreError> {
    let Some(type_id) = ctx.transcript.type_id else {
        return Ok(());
    };
    let result = db.query(
        "SELECT transcript_type FROM transcript_type WHERE type_id = ?",
        &[type_id.into()],
    )?;
    if let Some(name) = result.first_row().and_then(|row| extract_string(row, 0)) {
        graph.insert_annotation(Annotation::new(
            MetaId::new(TRANSCRIPT_TYPE_LAYER_ID, type_id.to_string()).to_string(),
            &layer.id,
            name,
        ));
    }
    Ok(())
}

/// Annotation fields shared by both attribute tables: label, label_status,
/// annotated_by, annotated_when at `base..base + 4`.
fn attribute_annotation(id: String, layer: &Layer, row: &[SqlValue], base: usize) -> Annotation {
    let mut annotation = Annotation::new(id, &layer.id, extract_string_or(row, base, ""));
    annotation.confidence = extract_i64(row, base + 1).unwrap_or(0);
    annotation.annotator = extract_string(row, base + 2);
    annotation.when = extract_string(row, base + 3);
    annotation
}

fn load_transcript_attribute(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &LoadContext,
    layer: &Layer,
    attribute: &str,
) -> Result<(), StoreError> {
    let result = db.query(
        "SELECT annotation_id, label, label_status, annotated_by, annotated_when \
         FROM annotation_transcript WHERE ag_id = ? AND layer = ? ORDER BY annotation_id",
        &[ctx.transcript.ag_id.into(), attribute.into()],
    )?;
    for (i, row) in result.rows.iter().enumerate() {
        let row_id = extract_i64(row, 0).unwrap_or_default();
        let id = TranscriptAttributeId::new(attribute, row_id).to_string();
        graph.insert_annotation(
            attribute_annotation(id, layer, row, 1).with_ordinal(i as i64 + 1),
        );
    }

    if result.is_empty()
        && attribute == "language"
        && let Some(corpus) = &ctx.transcript.corpus_name
    {
        let language = db.query(
            "SELECT corpus_language FROM corpus WHERE corpus_name = ?",
            &[corpus.as_str().into()],
        )?;
        if let Some(language) = language.first_row().and_then(|row| extract_string(row, 0)) {
            debug!(corpus = %corpus, %language, "language taken from corpus");
            graph.insert_annotation(Annotation::new(
                TranscriptAttributeId::new(attribute, 0).to_string(),
                &layer.id,
                language,
            ));
        }
    }
    Ok(())
}

fn load_participant_attribute(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &LoadContext,
    layer: &Layer,
    attribute: &str,
) -> Result<(), StoreError> {
    let result = db.query(
        "SELECT a.annotation_id, a.speaker_number, a.label, a.label_status, a.annotated_by, \
         a.annotated_when FROM annotation_participant a \
         INNER JOIN transcript_speaker ts ON ts.speaker_number = a.speaker_number \
         WHERE ts.ag_id = ? AND a.layer = ? ORDER BY a.speaker_number, a.annotation_id",
        &[ctx.transcript.ag_id.into(), attribute.into()],
    )?;
    let mut previous = None;
    let mut ordinal = 0;
    for row in &result.rows {
        let row_id = extract_i64(row, 0).unwrap_or_default();
        let speaker = extract_i64(row, 1).unwrap_or_default();
        ordinal = if previous == Some(speaker) { ordinal + 1 } else { 1 };
        previous = Some(speaker);
        let id = ParticipantAttributeId::new(attribute, row_id).to_string();
        graph.insert_annotation(
            attribute_annotation(id, layer, row, 2)
                .with_parent(MetaId::new(PARTICIPANT_LAYER_ID, speaker.to_string()).to_string())
                .with_ordinal(ordinal),
        );
    }
    Ok(())
}

fn load_episode_tags(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &LoadContext,
    layer: &Layer,
    layer_id: i64,
) -> Result<(), StoreError> {
    let Some(family_id) = ctx.transcript.family_id else {
        return Ok(());
    };
    let result = db.query(
        &format!(
            "SELECT annotation_id, label, label_status, annotated_by, annotated_when, ordinal \
             FROM {} WHERE family_id = ? ORDER BY ordinal, annotation_id",
            crate::layers::layer_table(layer_id)
        ),
        &[family_id.into()],
    )?;
    for row in &result.rows {
        let row_id = extract_i64(row, 0).unwrap_or_default();
        let id = AnnotationId::new(Scope::Episode, layer_id, row_id).to_string();
        graph.insert_annotation(
            attribute_annotation(id, layer, row, 1)
                .with_parent(MetaId::new(EPISODE_LAYER_ID, family_id.to_string()).to_string())
                .with_ordinal(extract_i64(row, 5).unwrap_or(1)),
        );
    }
    Ok(())
}

/// Rows of a temporal layer matching `condition` (written against alias
/// `a`, start anchor `s` and end anchor `e`), in timeline order.
pub(crate) fn temporal_rows(
    db: &dyn Database,
    layer: &Layer,
    condition: &str,
    params: &[SqlValue],
) -> Result<QueryResult, StoreError> {
    let table = layer
        .table_name()
        .ok_or_else(|| StoreError::Schema(format!("'{}' has no layer table", layer.id)))?;
    Ok(db.query(
        &format!(
            "SELECT {TEMPORAL_COLUMNS} FROM {table} a \
             INNER JOIN anchor s ON s.anchor_id = a.start_anchor_id \
             INNER JOIN anchor e ON e.anchor_id = a.end_anchor_id \
             WHERE {condition} ORDER BY s.offset, a.parent_id, a.ordinal, a.annotation_id"
        ),
        params,
    )?)
}

fn anchor_from(row: &[SqlValue], id: i64, base: usize) -> Anchor {
    let mut anchor = Anchor::new(AnchorId(id).to_string(), extract_f64(row, base));
    anchor.confidence = extract_i64(row, base + 1).unwrap_or(0);
    anchor.annotator = extract_string(row, base + 2);
    anchor.when = extract_string(row, base + 3);
    anchor
}

/// Encoded id of the parent of a `layer` row whose `parent_id` is
/// `parent_row`.
pub(crate) fn parent_reference(schema: &Schema, layer: &Layer, parent_row: i64) -> Option<String> {
    let parent = schema.parent_of(layer)?;
    match &parent.kind {
        LayerKind::Temporal { layer_id, scope } => {
            Some(AnnotationId::new(*scope, *layer_id, parent_row).to_string())
        }
        LayerKind::TranscriptAttribute { .. } | LayerKind::ParticipantAttribute { .. } => None,
        _ => parent
            .numeric_id()
            .map(|numeric| MetaId::new(numeric, parent_row.to_string()).to_string()),
    }
}

/// Add rows from [`temporal_rows`] with their anchors. Rows already in the
/// graph are skipped. Returns the number added.
pub(crate) fn add_temporal_rows(
    schema: &Schema,
    graph: &mut Graph,
    ctx: &LoadContext,
    layer: &Layer,
    rows: &QueryResult,
) -> Result<usize, StoreError> {
    let (layer_id, scope) = layer
        .temporal()
        .ok_or_else(|| StoreError::Schema(format!("'{}' is not a temporal layer", layer.id)))?;
    let mut added = 0;
    for row in &rows.rows {
        let Some(row_id) = extract_i64(row, 0) else {
            continue;
        };
        let id = AnnotationId::new(scope, layer_id, row_id).to_string();
        if graph.annotation(&id).is_some() {
            continue;
        }
        let span = extract_i64(row, 3).zip(extract_i64(row, 4));
        if let Some((start, end)) = span {
            for (anchor_id, base) in [(start, 9), (end, 13)] {
                if graph.anchor(&AnchorId(anchor_id).to_string()).is_none() {
                    graph.insert_anchor(anchor_from(row, anchor_id, base));
                }
            }
        } else {
            debug!(annotation = %id, "row has no anchors, span left unset");
        }

        let stored = extract_string_or(row, 1, "");
        let label = if layer.labels_are_participants() {
            ctx.participant_label(&stored)
        } else {
            stored
        };
        let mut annotation =
            Annotation::new(id, &layer.id, label).with_ordinal(extract_i64(row, 6).unwrap_or(1));
        if let Some((start, end)) = span {
            annotation = annotation.spanning(AnchorId(start).to_string(), AnchorId(end).to_string());
        }
        annotation.parent_id =
            extract_i64(row, 5).and_then(|parent| parent_reference(schema, layer, parent));
        annotation.confidence = extract_i64(row, 2).unwrap_or(0);
        annotation.annotator = extract_string(row, 7);
        annotation.when = extract_string(row, 8);
        graph.insert_annotation(annotation);
        added += 1;
    }
    Ok(added)
}

/// Give anchorless annotations the graph's full span.
pub(crate) fn span_graph_level(graph: &mut Graph) {
    let Some((first, last)) = graph.extent().map(|(f, l)| (f.id.clone(), l.id.clone())) else {
        return;
    };
    for annotation in graph.annotations_mut() {
        if annotation.start_id.is_none() && annotation.end_id.is_none() {
            annotation.start_id = Some(first.clone());
            annotation.end_id = Some(last.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{CORPUS_LAYER, MAIN_PARTICIPANT_LAYER, PARTICIPANT_LAYER};
    use crate::test_utils::{sample_schema, seeded_store};
    use rstest::rstest;

    fn layers(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[rstest]
    #[case("interview.trs")]
    #[case("interview")]
    #[case("interview.eaf")]
    #[case("1")]
    fn test_resolve_transcript(#[case] id: &str) {
        let store = seeded_store();
        let found = resolve_transcript(store.db(), id).unwrap();
        assert_eq!(found.transcript_id, "interview.trs");
        assert_eq!(found.ag_id, 1);
    }

    #[rstest]
    fn test_resolve_unknown_transcript() {
        let store = seeded_store();
        assert!(matches!(
            resolve_transcript(store.db(), "nothing.trs"),
            Err(StoreError::GraphNotFound(id)) if id == "nothing.trs"
        ));
    }

    #[rstest]
    fn test_turn_labels_are_names() {
        let store = seeded_store();
        let graph = store.get_transcript("interview.trs", &layers(&["turn"])).unwrap();
        let labels: Vec<_> = graph
            .layer_annotations("turn")
            .iter()
            .map(|a| a.label.clone())
            .collect();
        assert_eq!(labels, vec!["Ann", "Bob"]);
        assert_eq!(graph.layer_annotations(PARTICIPANT_LAYER).len(), 2);
    }

    #[rstest]
    fn test_structural_layers() {
        let store = seeded_store();
        let graph = store
            .get_transcript(
                "interview.trs",
                &layers(&[CORPUS_LAYER, MAIN_PARTICIPANT_LAYER, "series_note"]),
            )
            .unwrap();
        let corpus = graph.layer_annotations(CORPUS_LAYER);
        assert_eq!(corpus[0].id, "m_-100_demo");
        let main = graph.layer_annotations(MAIN_PARTICIPANT_LAYER);
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].label, "Ann");
        let notes = graph.layer_annotations("series_note");
        assert_eq!(notes[0].label, "first session");
        assert!(notes[0].parent_id.as_deref().unwrap().starts_with("m_-50_"));
    }

    #[rstest]
    fn test_graph_level_annotations_span_the_graph() {
        let store = seeded_store();
        let graph = store
            .get_transcript("interview.trs", &layers(&["word"]))
            .unwrap();
        let (first, last) = graph.extent().unwrap();
        for participant in graph.layer_annotations(PARTICIPANT_LAYER) {
            assert_eq!(participant.start_id.as_deref(), Some(first.id.as_str()));
            assert_eq!(participant.end_id.as_deref(), Some(last.id.as_str()));
        }
        assert!(!graph.has_changes());
    }

    #[rstest]
    fn test_language_falls_back_to_corpus() {
        let store = seeded_store();
        let graph = store
            .get_transcript("interview.trs", &layers(&["transcript_language"]))
            .unwrap();
        let language = graph.layer_annotations("transcript_language");
        assert_eq!(language.len(), 1);
        assert_eq!(language[0].id, "t|language|0");
        assert_eq!(language[0].label, "en");
    }

    #[rstest]
    fn test_unknown_layer() {
        let store = seeded_store();
        assert!(matches!(
            store.get_transcript("interview.trs", &layers(&["nothing"])),
            Err(StoreError::LayerNotFound(id)) if id == "nothing"
        ));
    }

    #[rstest]
    fn test_row_without_anchors_has_no_span() {
        let schema = sample_schema();
        let layer = schema.layer("pos").unwrap();
        let ctx = LoadContext::new(
            TranscriptRow {
                ag_id: 1,
                transcript_id: "interview.trs".into(),
                corpus_name: None,
                family_id: None,
                type_id: None,
            },
            None,
        );
        let mut row = vec![
            SqlValue::Int(4),
            SqlValue::Text("DT".into()),
            SqlValue::Int(0),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Int(7),
            SqlValue::Int(1),
        ];
        row.resize(17, SqlValue::Null);
        let rows = QueryResult {
            headers: Vec::new(),
            rows: vec![row],
        };

        let mut graph = Graph::new("interview.trs");
        assert_eq!(add_temporal_rows(&schema, &mut graph, &ctx, layer, &rows).unwrap(), 1);
        let tag = graph.annotation("ew_30_4").unwrap();
        assert_eq!(tag.start_id, None);
        assert_eq!(tag.end_id, None);
        assert_eq!(tag.parent_id.as_deref(), Some("ew_0_7"));
        assert_eq!(graph.anchors().count(), 0);
    }
}
