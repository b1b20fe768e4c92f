//! Rows of `annotation_layer_{N}` tables.
//!
//! Besides the base columns, each row carries denormalized keys of its
//! enclosing turn, word and segment rows. They are derived from the parent
//! row when an annotation is written:
//!
//! | Layer scope | Parent scope | Keys |
//! |-------------|--------------|------|
//! | meta | participant | turn = self |
//! | meta | meta | turn copied |
//! | word | meta | turn copied, ordinal in turn = own ordinal, word = self |
//! | word | word | turn, ordinal in turn and word copied |
//! | segment | word | word keys copied, ordinal in word = own ordinal, segment = self |
//! | segment | segment | all copied |

use tracing::debug;

use super::{annotated_when, rename};
use crate::db::{Database, SqlValue};
use crate::graph::{Annotation, Graph};
use crate::ids::{AnchorId, AnnotationId, EncodedId};
use crate::layers::{layer_table, Layer, Schema, Scope};
use crate::store::context::SaveContext;
use crate::store::StoreError;

const TURN: &str = "turn_annotation_id";
const ORDINAL_IN_TURN: &str = "ordinal_in_turn";
const WORD: &str = "word_annotation_id";
const ORDINAL_IN_WORD: &str = "ordinal_in_word";
const SEGMENT: &str = "segment_annotation_id";

/// Denormalized key values for one row.
#[derive(Debug, Default)]
struct Keys {
    copied: Vec<(&'static str, SqlValue)>,
    /// Key column that holds the row's own id.
    own: Option<&'static str>,
}

impl Keys {
    fn copy_from(
        db: &dyn Database,
        parent: &Layer,
        parent_row: i64,
        annotation: &Annotation,
        columns: &[&'static str],
    ) -> Result<Vec<(&'static str, SqlValue)>, StoreError> {
        let table = parent.table_name().ok_or_else(|| missing_parent(annotation))?;
        let result = db.query(
            &format!("SELECT {} FROM {table} WHERE annotation_id = ?", columns.join(", ")),
            &[parent_row.into()],
        )?;
        let row = result.first_row().ok_or_else(|| missing_parent(annotation))?;
        Ok(columns
            .iter()
            .zip(row)
            .map(|(column, value)| (*column, value.clone()))
            .collect())
    }
}

fn missing_parent(annotation: &Annotation) -> StoreError {
    StoreError::MissingParent {
        annotation: annotation.id.clone(),
        layer: annotation.layer_id.clone(),
    }
}

/// Stored label: turns and utterances hold the speaker number.
fn stored_label(
    db: &dyn Database,
    ctx: &SaveContext,
    layer: &Layer,
    label: &str,
) -> Result<String, StoreError> {
    if !layer.labels_are_participants() {
        return Ok(label.to_string());
    }
    if let Some(number) = ctx.participant_numbers.get(label) {
        return Ok(number.to_string());
    }
    db.query_i64("SELECT speaker_number FROM speaker WHERE name = ?", &[label.into()])?
        .map(|number| number.to_string())
        .ok_or_else(|| StoreError::ParticipantNotFound(label.to_string()))
}

fn anchor_row(id: Option<&str>, annotation: &Annotation) -> Result<Option<i64>, StoreError> {
    id.map(|id| {
        id.parse::<AnchorId>()
            .map(|anchor| anchor.0)
            .map_err(StoreError::invalid_id(id, format!("anchor of {}", annotation.id)))
    })
    .transpose()
}

/// Row id of the parent, or `None` for graph-level annotations.
fn parent_row(
    graph_id: &str,
    layer: &Layer,
    annotation: &Annotation,
) -> Result<Option<i64>, StoreError> {
    let parent_id = match annotation.parent_id.as_deref() {
        None if layer.parent_id.is_none() => return Ok(None),
        Some(id) if id == graph_id => return Ok(None),
        None => return Err(missing_parent(annotation)),
        Some(id) => id,
    };
    let context = format!("parent of {}", annotation.id);
    match EncodedId::parse(parent_id).map_err(StoreError::invalid_id(parent_id, &context))? {
        EncodedId::Annotation(id) => Ok(Some(id.row_id)),
        EncodedId::Meta(id) => Ok(Some(
            id.numeric_key()
                .map_err(StoreError::invalid_id(parent_id, &context))?,
        )),
        _ => Err(missing_parent(annotation)),
    }
}

fn derive_keys(
    db: &dyn Database,
    schema: &Schema,
    layer: &Layer,
    annotation: &Annotation,
    parent: Option<i64>,
) -> Result<Keys, StoreError> {
    let Some(scope) = layer.scope() else {
        return Err(missing_parent(annotation));
    };
    if scope == Scope::Freeform {
        return Ok(Keys::default());
    }
    let parent_layer = schema.parent_of(layer).ok_or_else(|| missing_parent(annotation))?;
    let parent = parent.ok_or_else(|| missing_parent(annotation))?;
    let own_ordinal: SqlValue = annotation.ordinal.into();

    let keys = match (scope, parent_layer.scope()) {
        (Scope::Meta, None) => Keys {
            copied: Vec::new(),
            own: Some(TURN),
        },
        (Scope::Meta, Some(Scope::Meta)) => Keys {
            copied: Keys::copy_from(db, parent_layer, parent, annotation, &[TURN])?,
            own: None,
        },
        (Scope::Word, Some(Scope::Meta)) => {
            let mut copied = Keys::copy_from(db, parent_layer, parent, annotation, &[TURN])?;
            copied.push((ORDINAL_IN_TURN, own_ordinal));
            Keys {
                copied,
                own: Some(WORD),
            }
        }
        (Scope::Word, Some(Scope::Word)) => Keys {
            copied: Keys::copy_from(
                db,
                parent_layer,
                parent,
                annotation,
                &[TURN, ORDINAL_IN_TURN, WORD],
            )?,
            own: None,
        },
        (Scope::Segment, Some(Scope::Word)) => {
            let mut copied = Keys::copy_from(
                db,
                parent_layer,
                parent,
                annotation,
                &[TURN, ORDINAL_IN_TURN, WORD],
            )?;
            copied.push((ORDINAL_IN_WORD, own_ordinal));
            Keys {
                copied,
                own: Some(SEGMENT),
            }
        }
        (Scope::Segment, Some(Scope::Segment)) => Keys {
            copied: Keys::copy_from(
                db,
                parent_layer,
                parent,
                annotation,
                &[TURN, ORDINAL_IN_TURN, WORD, ORDINAL_IN_WORD, SEGMENT],
            )?,
            own: None,
        },
        _ => return Err(missing_parent(annotation)),
    };
    Ok(keys)
}

/// Base column values in table order, after `ag_id`.
fn base_values(
    db: &dyn Database,
    graph_id: &str,
    ctx: &SaveContext,
    layer: &Layer,
    annotation: &Annotation,
) -> Result<(Vec<SqlValue>, Option<i64>), StoreError> {
    let parent = parent_row(graph_id, layer, annotation)?;
    let values = vec![
        stored_label(db, ctx, layer, &annotation.label)?.into(),
        annotation.confidence.into(),
        anchor_row(annotation.start_id.as_deref(), annotation)?.into(),
        anchor_row(annotation.end_id.as_deref(), annotation)?.into(),
        parent.into(),
        annotation.ordinal.into(),
        annotation.annotator.as_deref().into(),
        annotated_when(annotation, ctx).into(),
    ];
    Ok((values, parent))
}

const BASE_COLUMNS: [&str; 8] = [
    "label",
    "label_status",
    "start_anchor_id",
    "end_anchor_id",
    "parent_id",
    "ordinal",
    "annotated_by",
    "annotated_when",
];

pub(super) fn create(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    layer: &Layer,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let (layer_id, scope) = layer
        .temporal()
        .ok_or_else(|| StoreError::Schema(format!("'{}' is not a temporal layer", layer.id)))?;
    let table = layer_table(layer_id);
    let (values, parent) = base_values(db, &graph.id, ctx, layer, annotation)?;
    let keys = derive_keys(db, schema, layer, annotation, parent)?;

    let mut columns = vec!["ag_id"];
    columns.extend(BASE_COLUMNS);
    columns.extend(keys.copied.iter().map(|(column, _)| *column));
    let mut params: Vec<SqlValue> = vec![ctx.ag_id.into()];
    params.extend(values);
    params.extend(keys.copied.into_iter().map(|(_, value)| value));

    let row = db.insert(
        &format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        ),
        &params,
    )?;
    if let Some(own) = keys.own {
        db.execute(
            &format!("UPDATE {table} SET {own} = annotation_id WHERE annotation_id = ?"),
            &[row.into()],
        )?;
    }
    if matches!(scope, Scope::Word | Scope::Segment) {
        ctx.words_changed = true;
    }
    let id = AnnotationId::new(scope, layer_id, row).to_string();
    debug!(layer = %layer.id, id = %id, "annotation created");
    rename(graph, ctx, &annotation.id, &id);
    Ok(())
}

pub(super) fn update(
    db: &dyn Database,
    schema: &Schema,
    graph_id: &str,
    ctx: &mut SaveContext,
    layer: &Layer,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let id: AnnotationId = annotation
        .id
        .parse()
        .map_err(StoreError::invalid_id(&annotation.id, "annotation"))?;
    let (values, parent) = base_values(db, graph_id, ctx, layer, annotation)?;
    let keys = derive_keys(db, schema, layer, annotation, parent)?;

    let mut assignments: Vec<String> = BASE_COLUMNS.iter().map(|c| format!("{c} = ?")).collect();
    assignments.extend(keys.copied.iter().map(|(c, _)| format!("{c} = ?")));
    if let Some(own) = keys.own {
        assignments.push(format!("{own} = annotation_id"));
    }
    let mut params = values;
    params.extend(keys.copied.into_iter().map(|(_, value)| value));
    params.push(id.row_id.into());
    params.push(ctx.ag_id.into());

    db.execute(
        &format!(
            "UPDATE {} SET {} WHERE annotation_id = ? AND ag_id = ?",
            layer_table(id.layer_id),
            assignments.join(", ")
        ),
        &params,
    )?;
    if matches!(id.scope, Scope::Word | Scope::Segment) {
        ctx.words_changed = true;
    }
    Ok(())
}

pub(super) fn destroy(
    db: &dyn Database,
    ctx: &mut SaveContext,
    layer: &Layer,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let Ok(id) = annotation.id.parse::<AnnotationId>() else {
        debug!(id = %annotation.id, layer = %layer.id, "not a stored annotation");
        return Ok(());
    };
    if id.scope == Scope::Episode {
        db.execute(
            &format!("DELETE FROM {} WHERE annotation_id = ?", layer_table(id.layer_id)),
            &[id.row_id.into()],
        )?;
        return Ok(());
    }
    db.execute(
        &format!(
            "DELETE FROM {} WHERE annotation_id = ? AND ag_id = ?",
            layer_table(id.layer_id)
        ),
        &[id.row_id.into(), ctx.ag_id.into()],
    )?;
    if matches!(id.scope, Scope::Word | Scope::Segment) {
        ctx.words_changed = true;
    }
    Ok(())
}

/// Episode-scope annotations belong to the episode, not the transcript.
pub(super) fn create_episode_tag(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    layer_id: i64,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let family_id = ctx.family_id.ok_or_else(|| missing_parent(annotation))?;
    let row = db.insert(
        &format!(
            "INSERT INTO {} (family_id, label, label_status, parent_id, ordinal, annotated_by, \
             annotated_when) VALUES (?, ?, ?, ?, ?, ?, ?)",
            layer_table(layer_id)
        ),
        &[
            family_id.into(),
            annotation.label.as_str().into(),
            annotation.confidence.into(),
            family_id.into(),
            annotation.ordinal.into(),
            annotation.annotator.as_deref().into(),
            annotated_when(annotation, ctx).into(),
        ],
    )?;
    let id = AnnotationId::new(Scope::Episode, layer_id, row).to_string();
    rename(graph, ctx, &annotation.id, &id);
    Ok(())
}

pub(super) fn update_episode_tag(
    db: &dyn Database,
    ctx: &mut SaveContext,
    layer_id: i64,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let id: AnnotationId = annotation
        .id
        .parse()
        .map_err(StoreError::invalid_id(&annotation.id, "annotation"))?;
    let family_id = ctx.family_id.ok_or_else(|| missing_parent(annotation))?;
    db.execute(
        &format!(
            "UPDATE {} SET family_id = ?, parent_id = ?, label = ?, label_status = ?, \
             ordinal = ?, annotated_by = ?, annotated_when = ? WHERE annotation_id = ?",
            layer_table(layer_id)
        ),
        &[
            family_id.into(),
            family_id.into(),
            annotation.label.as_str().into(),
            annotation.confidence.into(),
            annotation.ordinal.into(),
            annotation.annotator.as_deref().into(),
            annotated_when(annotation, ctx).into(),
            id.row_id.into(),
        ],
    )?;
    Ok(())
}

/// Stored turn key of a meta, word or segment row.
#[cfg(test)]
pub(crate) fn turn_key(db: &dyn Database, id: &AnnotationId) -> Option<i64> {
    use crate::db::extract_i64;
    let result = db
        .query(
            &format!("SELECT {TURN} FROM {} WHERE annotation_id = ?", layer_table(id.layer_id)),
            &[id.row_id.into()],
        )
        .ok()?;
    result.first_row().and_then(|row| extract_i64(row, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::extract_i64;
    use crate::test_utils::seeded_store;
    use rstest::rstest;

    #[rstest]
    fn test_denormalized_keys_of_seeded_rows() {
        let store = seeded_store();
        let graph = store
            .get_transcript("interview.trs", &["segment".into(), "utterance".into()])
            .unwrap();
        let turn: AnnotationId = graph.layer_annotations("turn")[0].id.parse().unwrap();
        let utterance: AnnotationId = graph.layer_annotations("utterance")[0].id.parse().unwrap();
        let segment: AnnotationId = graph.layer_annotations("segment")[0].id.parse().unwrap();

        assert_eq!(turn_key(store.db(), &turn), Some(turn.row_id));
        assert_eq!(turn_key(store.db(), &utterance), Some(turn.row_id));
        assert_eq!(turn_key(store.db(), &segment), Some(turn.row_id));

        let result = store
            .db()
            .query(
                "SELECT ordinal_in_turn, word_annotation_id, ordinal_in_word, segment_annotation_id \
                 FROM annotation_layer_1 WHERE annotation_id = ?",
                &[segment.row_id.into()],
            )
            .unwrap();
        let row = result.first_row().unwrap();
        let word: AnnotationId = graph.layer_annotations("word")[0].id.parse().unwrap();
        assert_eq!(extract_i64(row, 0), Some(1));
        assert_eq!(extract_i64(row, 1), Some(word.row_id));
        assert_eq!(extract_i64(row, 2), Some(1));
        assert_eq!(extract_i64(row, 3), Some(segment.row_id));
    }
}
