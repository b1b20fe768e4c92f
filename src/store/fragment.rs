//! Time-bounded loads.
//!
//! A fragment holds every annotation of the requested layers that lies
//! inside the bounds, plus whatever ancestors are needed to keep the
//! hierarchy connected. Ancestors may extend past the bounds.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::context::{LoadContext, TranscriptRow};
use super::load::{
    add_temporal_rows, check_access, load_layers, resolve_transcript, span_graph_level,
    temporal_rows,
};
use super::StoreError;
use crate::db::{extract_f64, Database, SqlValue};
use crate::graph::{FragmentBounds, Graph};
use crate::ids::AnnotationId;
use crate::layers::{Layer, Schema};
use crate::queries::Clause;

pub(crate) fn get_fragment(
    db: &dyn Database,
    schema: &Schema,
    access: Option<&Clause>,
    transcript_id: &str,
    annotation_id: &str,
    layer_ids: &[String],
) -> Result<Graph, StoreError> {
    let transcript = resolve_transcript(db, transcript_id)?;
    check_access(db, access, &transcript)?;

    let defining: AnnotationId = annotation_id
        .parse()
        .map_err(StoreError::invalid_id(annotation_id, "fragment annotation"))?;
    let layer = temporal_layer(schema, defining.layer_id)?;
    let rows = temporal_rows(
        db,
        layer,
        "a.ag_id = ? AND a.annotation_id = ?",
        &[transcript.ag_id.into(), defining.row_id.into()],
    )?;
    let Some(row) = rows.first_row() else {
        return Err(StoreError::AnnotationNotFound(annotation_id.to_string()));
    };
    let bounds = FragmentBounds {
        start: extract_f64(row, 9).unwrap_or(f64::NEG_INFINITY),
        end: extract_f64(row, 13).unwrap_or(f64::INFINITY),
        defined_by: Some(annotation_id.to_string()),
    };

    let mut wanted = layer_ids.to_vec();
    if !wanted.contains(&layer.id) {
        wanted.push(layer.id.clone());
    }
    load_bounded(db, schema, transcript, bounds, &wanted, Some(annotation_id))
}

pub(crate) fn get_fragment_by_offsets(
    db: &dyn Database,
    schema: &Schema,
    access: Option<&Clause>,
    transcript_id: &str,
    start: f64,
    end: f64,
    layer_ids: &[String],
) -> Result<Graph, StoreError> {
    let transcript = resolve_transcript(db, transcript_id)?;
    check_access(db, access, &transcript)?;
    let bounds = FragmentBounds {
        start,
        end,
        defined_by: None,
    };
    load_bounded(db, schema, transcript, bounds, layer_ids, None)
}

fn temporal_layer(schema: &Schema, numeric: i64) -> Result<&Layer, StoreError> {
    schema
        .layer_by_numeric_id(numeric)
        .filter(|layer| layer.temporal().is_some())
        .ok_or_else(|| StoreError::LayerNotFound(numeric.to_string()))
}

fn load_bounded(
    db: &dyn Database,
    schema: &Schema,
    transcript: TranscriptRow,
    bounds: FragmentBounds,
    layer_ids: &[String],
    defined_by: Option<&str>,
) -> Result<Graph, StoreError> {
    let layers = schema
        .closure_in_order(layer_ids)
        .map_err(StoreError::LayerNotFound)?;
    let mut graph = Graph::new(transcript.transcript_id.clone());
    let mut ctx = LoadContext::new(transcript, Some(bounds.clone()));
    load_layers(db, schema, &mut graph, &mut ctx, &layers)?;

    if let Some(id) = defined_by {
        load_ancestor_chain(db, schema, &mut graph, &ctx, id)?;
    }
    let backfilled = backfill_parents(db, schema, &mut graph, &ctx)?;
    renumber_siblings(&mut graph);
    span_graph_level(&mut graph);
    graph.commit();
    graph.fragment = Some(bounds);
    debug!(
        transcript = %graph.id,
        annotations = graph.annotations().count(),
        backfilled,
        "fragment loaded"
    );
    Ok(graph)
}

/// Fetch one row of a temporal layer into the graph.
fn load_one(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    ctx: &LoadContext,
    id: AnnotationId,
) -> Result<bool, StoreError> {
    let layer = temporal_layer(schema, id.layer_id)?;
    let rows = temporal_rows(
        db,
        layer,
        "a.ag_id = ? AND a.annotation_id = ?",
        &[ctx.transcript.ag_id.into(), id.row_id.into()],
    )?;
    Ok(add_temporal_rows(schema, graph, ctx, layer, &rows)? > 0)
}

/// Walk up from the defining annotation until a parent is present or is
/// not a layer-table row.
fn load_ancestor_chain(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    ctx: &LoadContext,
    id: &str,
) -> Result<(), StoreError> {
    let mut next = graph.annotation(id).and_then(|a| a.parent_id.clone());
    while let Some(parent_id) = next.take() {
        if graph.annotation(&parent_id).is_some() {
            break;
        }
        let Ok(parent) = parent_id.parse::<AnnotationId>() else {
            break;
        };
        if !load_one(db, schema, graph, ctx, parent)? {
            break;
        }
        next = graph.annotation(&parent_id).and_then(|a| a.parent_id.clone());
    }
    Ok(())
}

/// Fetch missing layer-table parents in bulk, one query per layer, until
/// nothing more is missing. Returns the number of rows fetched.
fn backfill_parents(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    ctx: &LoadContext,
) -> Result<usize, StoreError> {
    let mut total = 0;
    loop {
        let mut missing: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for annotation in graph.annotations() {
            if let Some(parent_id) = &annotation.parent_id
                && graph.annotation(parent_id).is_none()
                && let Ok(parent) = parent_id.parse::<AnnotationId>()
            {
                missing.entry(parent.layer_id).or_default().insert(parent.row_id);
            }
        }
        if missing.is_empty() {
            return Ok(total);
        }

        let mut added = 0;
        for (layer_id, rows) in missing {
            let layer = temporal_layer(schema, layer_id)?;
            let placeholders = vec!["?"; rows.len()].join(", ");
            let mut params: Vec<SqlValue> = vec![ctx.transcript.ag_id.into()];
            params.extend(rows.iter().map(|&row| SqlValue::from(row)));
            let result = temporal_rows(
                db,
                layer,
                &format!("a.ag_id = ? AND a.annotation_id IN ({placeholders})"),
                &params,
            )?;
            added += add_temporal_rows(schema, graph, ctx, layer, &result)?;
        }
        if added == 0 {
            return Ok(total);
        }
        total += added;
    }
}

/// Give siblings consecutive ordinals in timeline order, starting from the
/// lowest stored ordinal of each group.
fn renumber_siblings(graph: &mut Graph) {
    let mut groups: BTreeMap<(String, Option<String>), Vec<(f64, i64, i64, String)>> =
        BTreeMap::new();
    for annotation in graph.annotations() {
        let Ok(id) = annotation.id.parse::<AnnotationId>() else {
            continue;
        };
        groups
            .entry((annotation.layer_id.clone(), annotation.parent_id.clone()))
            .or_default()
            .push((
                graph.start_offset(annotation),
                id.row_id,
                annotation.ordinal,
                annotation.id.clone(),
            ));
    }
    for mut siblings in groups.into_values() {
        let first = siblings.iter().map(|s| s.2).min().unwrap_or(1);
        siblings.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (i, (_, _, _, id)) in siblings.into_iter().enumerate() {
            if let Some(annotation) = graph.annotation_mut(&id) {
                annotation.ordinal = first + i as i64;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seeded_store;
    use rstest::rstest;

    fn layers(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn word_id(store: &crate::store::GraphStore, label: &str) -> String {
        let graph = store
            .get_transcript("interview.trs", &layers(&["word"]))
            .unwrap();
        graph
            .layer_annotations("word")
            .into_iter()
            .find(|w| w.label == label)
            .map(|w| w.id.clone())
            .unwrap()
    }

    #[rstest]
    fn test_fragment_of_word_loads_ancestors() {
        let store = seeded_store();
        let thing = word_id(&store, "thing");
        let graph = store
            .get_fragment("interview.trs", &thing, &layers(&["segment"]))
            .unwrap();

        let words = graph.layer_annotations("word");
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].label, "thing");
        assert!(graph.layer_annotations("segment").is_empty());

        let turns = graph.layer_annotations("turn");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].label, "Ann");
        assert_eq!(words[0].parent_id.as_ref(), Some(&turns[0].id));

        let bounds = graph.fragment.as_ref().unwrap();
        assert_eq!((bounds.start, bounds.end), (0.5, 1.0));
        assert_eq!(bounds.defined_by.as_deref(), Some(thing.as_str()));
    }

    #[rstest]
    fn test_fragment_by_offsets_renumbers_words() {
        let store = seeded_store();
        let graph = store
            .get_fragment_by_offsets("interview", 0.5, 1.5, &layers(&["word"]))
            .unwrap();
        let words: Vec<_> = graph
            .layer_annotations("word")
            .iter()
            .map(|w| (w.label.clone(), w.ordinal))
            .collect();
        assert_eq!(words, vec![("thing".to_string(), 2), ("is".to_string(), 3)]);
        assert_eq!(graph.layer_annotations("turn").len(), 1);
        assert!(!graph.has_changes());
    }

    #[rstest]
    fn test_fragment_of_unknown_annotation() {
        let store = seeded_store();
        assert!(matches!(
            store.get_fragment("interview.trs", "ew_0_999", &[]),
            Err(StoreError::AnnotationNotFound(id)) if id == "ew_0_999"
        ));
        assert!(matches!(
            store.get_fragment("interview.trs", "not-an-id", &[]),
            Err(StoreError::InvalidId { .. })
        ));
    }
}
