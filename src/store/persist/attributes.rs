use super::{annotated_when, participant_number, rename, required_parent};
use crate::db::Database;
use crate::graph::{Annotation, Change, Graph};
use crate::ids::{ParticipantAttributeId, TranscriptAttributeId};
use crate::store::context::SaveContext;
use crate::store::StoreError;

/// Insert or update one transcript attribute value.
///
/// Row 0 stands for a value inherited from the corpus and is inserted
/// when first saved.
pub(super) fn save_transcript_attribute(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    attribute: &str,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let existing = match annotation.change {
        Change::Create => None,
        _ => {
            let id: TranscriptAttributeId = annotation
                .id
                .parse()
                .map_err(StoreError::invalid_id(&annotation.id, "transcript attribute"))?;
            (id.row_id != 0).then_some(id.row_id)
        }
    };

    match existing {
        Some(row) => {
            db.execute(
                "UPDATE annotation_transcript SET label = ?, label_status = ?, annotated_by = ?, \
                 annotated_when = ? WHERE annotation_id = ? AND ag_id = ?",
                &[
                    annotation.label.as_str().into(),
                    annotation.confidence.into(),
                    annotation.annotator.as_deref().into(),
                    annotated_when(annotation, ctx).into(),
                    row.into(),
                    ctx.ag_id.into(),
                ],
            )?;
        }
        None => {
            let row = db.insert(
                "INSERT INTO annotation_transcript (ag_id, layer, label, label_status, \
                 annotated_by, annotated_when) VALUES (?, ?, ?, ?, ?, ?)",
                &[
                    ctx.ag_id.into(),
                    attribute.into(),
                    annotation.label.as_str().into(),
                    annotation.confidence.into(),
                    annotation.annotator.as_deref().into(),
                    annotated_when(annotation, ctx).into(),
                ],
            )?;
            let id = TranscriptAttributeId::new(attribute, row).to_string();
            rename(graph, ctx, &annotation.id, &id);
        }
    }
    Ok(())
}

pub(super) fn destroy_transcript_attribute(
    db: &dyn Database,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let id: TranscriptAttributeId = annotation
        .id
        .parse()
        .map_err(StoreError::invalid_id(&annotation.id, "transcript attribute"))?;
    db.execute(
        "DELETE FROM annotation_transcript WHERE annotation_id = ? AND ag_id = ?",
        &[id.row_id.into(), ctx.ag_id.into()],
    )?;
    Ok(())
}

/// Insert or update one participant attribute value. The participant is
/// the annotation's parent.
pub(super) fn save_participant_attribute(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    attribute: &str,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let speaker = participant_number(required_parent(annotation)?, annotation)?;
    if annotation.change == Change::Create {
        let row = db.insert(
            "INSERT INTO annotation_participant (speaker_number, layer, label, label_status, \
             annotated_by, annotated_when) VALUES (?, ?, ?, ?, ?, ?)",
            &[
                speaker.into(),
                attribute.into(),
                annotation.label.as_str().into(),
                annotation.confidence.into(),
                annotation.annotator.as_deref().into(),
                annotated_when(annotation, ctx).into(),
            ],
        )?;
        let id = ParticipantAttributeId::new(attribute, row).to_string();
        rename(graph, ctx, &annotation.id, &id);
        return Ok(());
    }

    let id: ParticipantAttributeId = annotation
        .id
        .parse()
        .map_err(StoreError::invalid_id(&annotation.id, "participant attribute"))?;
    db.execute(
        "UPDATE annotation_participant SET speaker_number = ?, label = ?, label_status = ?, \
         annotated_by = ?, annotated_when = ? WHERE annotation_id = ?",
        &[
            speaker.into(),
            annotation.label.as_str().into(),
            annotation.confidence.into(),
            annotation.annotator.as_deref().into(),
            annotated_when(annotation, ctx).into(),
            id.row_id.into(),
        ],
    )?;
    Ok(())
}

pub(super) fn destroy_participant_attribute(
    db: &dyn Database,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let id: ParticipantAttributeId = annotation
        .id
        .parse()
        .map_err(StoreError::invalid_id(&annotation.id, "participant attribute"))?;
    db.execute(
        "DELETE FROM annotation_participant WHERE annotation_id = ?",
        &[id.row_id.into()],
    )?;
    Ok(())
}
