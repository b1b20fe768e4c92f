//! Participants, and the corpus, episode and type of the transcript.

use tracing::debug;

use super::{participant_number, rename, required_parent};
use crate::db::schema::{create_corpus, create_transcript_type};
use crate::db::Database;
use crate::graph::{Annotation, Graph};
use crate::ids::MetaId;
use crate::layers::{
    CORPUS_LAYER_ID, EPISODE_LAYER_ID, MAIN_PARTICIPANT_LAYER_ID, PARTICIPANT_LAYER_ID,
    TRANSCRIPT_TYPE_LAYER_ID,
};
use crate::store::context::SaveContext;
use crate::store::StoreError;

/// Speaker number for `name`, inserting a `speaker` row if needed.
fn find_or_create_speaker(db: &dyn Database, name: &str) -> Result<i64, StoreError> {
    if let Some(number) = db.query_i64(
        "SELECT speaker_number FROM speaker WHERE name = ?",
        &[name.into()],
    )? {
        return Ok(number);
    }
    let number = db.insert("INSERT INTO speaker (name) VALUES (?)", &[name.into()])?;
    debug!(name, number, "speaker created");
    Ok(number)
}

pub(super) fn create_participant(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let number = find_or_create_speaker(db, &annotation.label)?;
    db.execute(
        "INSERT OR IGNORE INTO transcript_speaker (ag_id, speaker_number, name) VALUES (?, ?, ?)",
        &[ctx.ag_id.into(), number.into(), annotation.label.as_str().into()],
    )?;
    ctx.participant_numbers.insert(annotation.label.clone(), number);
    let id = MetaId::new(PARTICIPANT_LAYER_ID, number.to_string()).to_string();
    rename(graph, ctx, &annotation.id, &id);
    Ok(())
}

/// A relabelled participant renames the speaker everywhere.
pub(super) fn update_participant(
    db: &dyn Database,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let number = participant_number(&annotation.id, annotation)?;
    db.execute(
        "UPDATE speaker SET name = ? WHERE speaker_number = ?",
        &[annotation.label.as_str().into(), number.into()],
    )?;
    db.execute(
        "UPDATE transcript_speaker SET name = ? WHERE speaker_number = ?",
        &[annotation.label.as_str().into(), number.into()],
    )?;
    ctx.participant_numbers.retain(|_, n| *n != number);
    ctx.participant_numbers.insert(annotation.label.clone(), number);
    Ok(())
}

pub(super) fn destroy_participant(
    db: &dyn Database,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let number = participant_number(&annotation.id, annotation)?;
    db.execute(
        "DELETE FROM transcript_speaker WHERE ag_id = ? AND speaker_number = ?",
        &[ctx.ag_id.into(), number.into()],
    )?;
    ctx.participant_numbers.retain(|_, n| *n != number);
    Ok(())
}

pub(super) fn save_main_participant(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let number = participant_number(required_parent(annotation)?, annotation)?;
    db.execute(
        "UPDATE transcript_speaker SET main_speaker = 1 WHERE ag_id = ? AND speaker_number = ?",
        &[ctx.ag_id.into(), number.into()],
    )?;
    let id = MetaId::new(MAIN_PARTICIPANT_LAYER_ID, number.to_string()).to_string();
    rename(graph, ctx, &annotation.id, &id);
    Ok(())
}

pub(super) fn destroy_main_participant(
    db: &dyn Database,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let number = participant_number(&annotation.id, annotation)?;
    db.execute(
        "UPDATE transcript_speaker SET main_speaker = 0 WHERE ag_id = ? AND speaker_number = ?",
        &[ctx.ag_id.into(), number.into()],
    )?;
    Ok(())
}

pub(super) fn save_corpus(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    create_corpus(db, &annotation.label, None)?;
    db.execute(
        "UPDATE transcript SET corpus_name = ? WHERE ag_id = ?",
        &[annotation.label.as_str().into(), ctx.ag_id.into()],
    )?;
    let id = MetaId::new(CORPUS_LAYER_ID, annotation.label.as_str()).to_string();
    rename(graph, ctx, &annotation.id, &id);
    Ok(())
}

pub(super) fn save_episode(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let family_id = match db.query_i64(
        "SELECT family_id FROM transcript_family WHERE name = ?",
        &[annotation.label.as_str().into()],
    )? {
        Some(id) => id,
        None => db.insert(
            "INSERT INTO transcript_family (name) VALUES (?)",
            &[annotation.label.as_str().into()],
        )?,
    };
    db.execute(
        "UPDATE transcript SET family_id = ? WHERE ag_id = ?",
        &[family_id.into(), ctx.ag_id.into()],
    )?;
    ctx.family_id = Some(family_id);
    let id = MetaId::new(EPISODE_LAYER_ID, family_id.to_string()).to_string();
    rename(graph, ctx, &annotation.id, &id);
    Ok(())
}

pub(super) fn save_transcript_type(
    db: &dyn Database,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    annotation: &Annotation,
) -> Result<(), StoreError> {
    let type_id = create_transcript_type(db, &annotation.label)?;
    db.execute(
        "UPDATE transcript SET type_id = ? WHERE ag_id = ?",
        &[type_id.into(), ctx.ag_id.into()],
    )?;
    let id = MetaId::new(TRANSCRIPT_TYPE_LAYER_ID, type_id.to_string()).to_string();
    rename(graph, ctx, &annotation.id, &id);
    Ok(())
}

/// Detach the transcript from its corpus, episode or type.
pub(super) fn clear_transcript_column(
    db: &dyn Database,
    ctx: &mut SaveContext,
    column: &str,
) -> Result<(), StoreError> {
    db.execute(
        &format!("UPDATE transcript SET {column} = NULL WHERE ag_id = ?"),
        &[ctx.ag_id.into()],
    )?;
    if column == "family_id" {
        ctx.family_id = None;
    }
    Ok(())
}
