//! Per-class writers used by the save pipeline.
//!
//! Each layer class stores its annotations differently, so creation,
//! update and deletion dispatch on [`LayerKind`]:
//!
//! | Class | Module | Storage |
//! |-------|--------|---------|
//! | Temporal | `temporal` | `annotation_layer_{N}` |
//! | Participant, main participant, corpus, episode, type | `structural` | `speaker`, `transcript_speaker`, `transcript` columns |
//! | Transcript and participant attributes | `attributes` | `annotation_transcript`, `annotation_participant` |
//!
//! Writers patch the stored id of each created object into the graph
//! through [`rename`] so later writers see the final ids.

mod anchors;
mod attributes;
mod structural;
mod temporal;

pub(crate) use anchors::{destroy_anchors, save_anchors};

use tracing::debug;

use super::context::SaveContext;
use super::StoreError;
use crate::db::Database;
use crate::graph::{Annotation, Change, Graph};
use crate::ids::{EncodedId, MetaId};
use crate::layers::{Layer, LayerKind, Schema, Scope};

/// Write one created, updated or anchor-patched annotation.
pub(crate) fn save_annotation(
    db: &dyn Database,
    schema: &Schema,
    graph: &mut Graph,
    ctx: &mut SaveContext,
    layer: &Layer,
    id: &str,
) -> Result<(), StoreError> {
    if !ctx.processed.insert(id.to_string()) {
        return Ok(());
    }
    let Some(annotation) = graph.annotation(id).cloned() else {
        return Err(StoreError::AnnotationNotFound(id.to_string()));
    };
    let create = annotation.change == Change::Create;

    match (&layer.kind, create) {
        (LayerKind::Participant, true) => structural::create_participant(db, graph, ctx, &annotation),
        (LayerKind::Participant, false) => structural::update_participant(db, ctx, &annotation),
        (LayerKind::MainParticipant, _) => {
            structural::save_main_participant(db, graph, ctx, &annotation)
        }
        (LayerKind::Corpus, _) => structural::save_corpus(db, graph, ctx, &annotation),
        (LayerKind::Episode, _) => structural::save_episode(db, graph, ctx, &annotation),
        (LayerKind::TranscriptType, _) => {
            structural::save_transcript_type(db, graph, ctx, &annotation)
        }
        (LayerKind::TranscriptAttribute { attribute }, _) => {
            attributes::save_transcript_attribute(db, graph, ctx, attribute, &annotation)
        }
        (LayerKind::ParticipantAttribute { attribute }, _) => {
            attributes::save_participant_attribute(db, graph, ctx, attribute, &annotation)
        }
        (LayerKind::Temporal { layer_id, scope: Scope::Episode }, true) => {
            temporal::create_episode_tag(db, graph, ctx, *layer_id, &annotation)
        }
        (LayerKind::Temporal { layer_id, scope: Scope::Episode }, false) => {
            temporal::update_episode_tag(db, ctx, *layer_id, &annotation)
        }
        (LayerKind::Temporal { .. }, true) => {
            temporal::create(db, schema, graph, ctx, layer, &annotation)
        }
        (LayerKind::Temporal { .. }, false) => {
            temporal::update(db, schema, &graph.id, ctx, layer, &annotation)
        }
    }
}

/// Delete one destroyed annotation.
pub(crate) fn destroy_annotation(
    db: &dyn Database,
    graph: &Graph,
    ctx: &mut SaveContext,
    layer: &Layer,
    id: &str,
) -> Result<(), StoreError> {
    if !ctx.processed.insert(id.to_string()) {
        return Ok(());
    }
    let Some(annotation) = graph.annotation(id) else {
        return Ok(());
    };
    // Objects that were never stored have nothing to delete.
    if EncodedId::parse(id).is_err() {
        debug!(id, layer = %layer.id, "destroyed before being stored");
        return Ok(());
    }

    match &layer.kind {
        LayerKind::Participant => structural::destroy_participant(db, ctx, annotation),
        LayerKind::MainParticipant => structural::destroy_main_participant(db, ctx, annotation),
        LayerKind::Corpus => structural::clear_transcript_column(db, ctx, "corpus_name"),
        LayerKind::Episode => structural::clear_transcript_column(db, ctx, "family_id"),
        LayerKind::TranscriptType => structural::clear_transcript_column(db, ctx, "type_id"),
        LayerKind::TranscriptAttribute { .. } => {
            attributes::destroy_transcript_attribute(db, ctx, annotation)
        }
        LayerKind::ParticipantAttribute { .. } => {
            attributes::destroy_participant_attribute(db, annotation)
        }
        LayerKind::Temporal { .. } => temporal::destroy(db, ctx, layer, annotation),
    }
}

/// Patch a created object's stored id into the graph.
fn rename(graph: &mut Graph, ctx: &mut SaveContext, old: &str, new: &str) {
    if old != new {
        graph.rename_annotation(old, new);
        ctx.rename(old, new);
    }
}

/// Numeric key of a participant annotation's id, or of the participant
/// `annotation` belongs to.
fn participant_number(id: &str, annotation: &Annotation) -> Result<i64, StoreError> {
    let meta: MetaId = id
        .parse()
        .map_err(StoreError::invalid_id(id, format!("participant of {}", annotation.id)))?;
    meta.numeric_key()
        .map_err(StoreError::invalid_id(id, format!("participant of {}", annotation.id)))
}

/// Parent id of `annotation`, which must have one.
fn required_parent(annotation: &Annotation) -> Result<&str, StoreError> {
    annotation
        .parent_id
        .as_deref()
        .ok_or_else(|| StoreError::MissingParent {
            annotation: annotation.id.clone(),
            layer: annotation.layer_id.clone(),
        })
}

fn annotated_when<'a>(annotation: &'a Annotation, ctx: &'a SaveContext) -> &'a str {
    annotation.when.as_deref().unwrap_or(&ctx.now)
}
