//! Reads layer definitions from the `layer`, `attribute_definition` and
//! `transcript_type` tables.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use super::{
    Alignment, Layer, LayerKind, Schema, Scope, CORPUS_LAYER, EPISODE_LAYER, EPISODE_LAYER_ID,
    MAIN_PARTICIPANT_LAYER, PARTICIPANT_ATTRIBUTE_PREFIX, PARTICIPANT_LAYER,
    PARTICIPANT_LAYER_ID, TRANSCRIPT_ATTRIBUTE_PREFIX, TRANSCRIPT_TYPE_LAYER,
};
use crate::db::{extract_i64, extract_string, extract_string_or, Database, DbError, SqlValue};

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Layer not found: {0}")]
    NotFound(String),

    #[error("Layer '{layer}' has unknown scope code '{code}'")]
    BadScope { layer: String, code: String },

    #[error(transparent)]
    Db(#[from] DbError),
}

const LAYER_COLUMNS: &str = "layer_id, short_description, description, parent_id, scope, \
     alignment, peers, peers_overlap, parent_includes, saturated, type";

/// Builds [`Layer`]s from layer metadata tables.
pub struct LayerResolver;

impl LayerResolver {
    /// Resolve one layer by name.
    ///
    /// Lookup order: the transcript type layer, the other structural layers,
    /// a `layer` row, a `transcript_{attr}` definition, then a
    /// `participant_{attr}` definition.
    pub fn get_layer(db: &dyn Database, id: &str) -> Result<Layer, LayerError> {
        if id == TRANSCRIPT_TYPE_LAYER {
            return Self::transcript_type_layer(db);
        }
        if let Some(layer) = Self::structural_layer(id) {
            return Ok(layer);
        }

        let result = db.query(
            &format!("SELECT {LAYER_COLUMNS} FROM layer WHERE short_description = ?"),
            &[id.into()],
        )?;
        if let Some(row) = result.first_row() {
            return Self::temporal_layer(db, row);
        }

        if let Some(attribute) = id.strip_prefix(TRANSCRIPT_ATTRIBUTE_PREFIX)
            && let Some(layer) = Self::attribute_layer(db, "transcript", attribute)?
        {
            return Ok(layer);
        }
        if let Some(attribute) = id.strip_prefix(PARTICIPANT_ATTRIBUTE_PREFIX)
            && let Some(layer) = Self::attribute_layer(db, "speaker", attribute)?
        {
            return Ok(layer);
        }
        Err(LayerError::NotFound(id.to_string()))
    }

    /// Build the complete schema snapshot.
    pub fn load_schema(db: &dyn Database) -> Result<Schema, LayerError> {
        let mut layers: Vec<Layer> = [
            PARTICIPANT_LAYER,
            MAIN_PARTICIPANT_LAYER,
            EPISODE_LAYER,
            CORPUS_LAYER,
        ]
        .into_iter()
        .filter_map(Self::structural_layer)
        .collect();
        layers.push(Self::transcript_type_layer(db)?);

        let definitions = db.query(
            "SELECT class_id, attribute FROM attribute_definition \
             ORDER BY class_id DESC, display_order, attribute",
            &[],
        )?;
        for row in &definitions.rows {
            let class_id = extract_string_or(row, 0, "");
            let attribute = extract_string_or(row, 1, "");
            if let Some(layer) = Self::attribute_layer(db, &class_id, &attribute)? {
                layers.push(layer);
            }
        }

        let temporal = db.query(
            &format!("SELECT {LAYER_COLUMNS} FROM layer ORDER BY layer_id"),
            &[],
        )?;
        for row in &temporal.rows {
            layers.push(Self::temporal_layer(db, row)?);
        }

        debug!(layers = layers.len(), "schema loaded");
        Ok(Schema::new(layers))
    }

    fn structural_layer(id: &str) -> Option<Layer> {
        let layer = match id {
            PARTICIPANT_LAYER => Layer::new(id, None, LayerKind::Participant)
                .with_peers(true)
                .with_description("Participants"),
            MAIN_PARTICIPANT_LAYER => {
                Layer::new(id, Some(PARTICIPANT_LAYER), LayerKind::MainParticipant)
                    .with_description("Main participants")
            }
            EPISODE_LAYER => Layer::new(id, None, LayerKind::Episode)
                .with_description("Series of transcripts recorded together"),
            CORPUS_LAYER => Layer::new(id, None, LayerKind::Corpus)
                .with_description("Corpus the transcript belongs to"),
            _ => return None,
        };
        Some(layer)
    }

    fn transcript_type_layer(db: &dyn Database) -> Result<Layer, LayerError> {
        let types = db.query(
            "SELECT transcript_type FROM transcript_type ORDER BY type_id",
            &[],
        )?;
        let mut layer = Layer::new(TRANSCRIPT_TYPE_LAYER, None, LayerKind::TranscriptType)
            .with_description("Type of transcript");
        layer.valid_labels = types
            .rows
            .iter()
            .filter_map(|row| extract_string(row, 0))
            .map(|t| (t.clone(), t))
            .collect();
        Ok(layer)
    }

    fn temporal_layer(db: &dyn Database, row: &[SqlValue]) -> Result<Layer, LayerError> {
        let layer_id = extract_i64(row, 0).unwrap_or_default();
        let name = extract_string_or(row, 1, "");
        let code = extract_string_or(row, 4, "");
        let scope = Scope::from_code(&code).ok_or_else(|| LayerError::BadScope {
            layer: name.clone(),
            code: code.clone(),
        })?;

        let parent = match extract_i64(row, 3) {
            None => None,
            Some(PARTICIPANT_LAYER_ID) => Some(PARTICIPANT_LAYER.to_string()),
            Some(EPISODE_LAYER_ID) => Some(EPISODE_LAYER.to_string()),
            Some(parent_id) => {
                let result = db.query(
                    "SELECT short_description FROM layer WHERE layer_id = ?",
                    &[parent_id.into()],
                )?;
                result.first_row().and_then(|r| extract_string(r, 0))
            }
        };

        let flag = |i: usize| extract_i64(row, i).unwrap_or(0) != 0;
        let mut layer = Layer::new(
            name,
            parent.as_deref(),
            LayerKind::Temporal { layer_id, scope },
        )
        .with_alignment(Alignment::from_code(extract_i64(row, 5).unwrap_or(0)))
        .with_peers(flag(6))
        .with_description(extract_string_or(row, 2, ""));
        layer.peers_overlap = flag(7);
        layer.parent_includes = flag(8);
        layer.saturated = flag(9);
        layer.label_type = extract_string_or(row, 10, "string");
        layer.valid_labels = Self::labels(
            db,
            "SELECT value, description FROM layer_label WHERE layer_id = ? ORDER BY value",
            &[layer_id.into()],
        )?;
        Ok(layer)
    }

    fn attribute_layer(
        db: &dyn Database,
        class_id: &str,
        attribute: &str,
    ) -> Result<Option<Layer>, LayerError> {
        let result = db.query(
            "SELECT description, type, peers FROM attribute_definition \
             WHERE class_id = ? AND attribute = ?",
            &[class_id.into(), attribute.into()],
        )?;
        let Some(row) = result.first_row() else {
            return Ok(None);
        };
        let (id, parent, kind) = if class_id == "speaker" {
            (
                format!("{PARTICIPANT_ATTRIBUTE_PREFIX}{attribute}"),
                Some(PARTICIPANT_LAYER),
                LayerKind::ParticipantAttribute {
                    attribute: attribute.to_string(),
                },
            )
        } else {
            (
                format!("{TRANSCRIPT_ATTRIBUTE_PREFIX}{attribute}"),
                None,
                LayerKind::TranscriptAttribute {
                    attribute: attribute.to_string(),
                },
            )
        };
        let mut layer = Layer::new(id, parent, kind)
            .with_peers(extract_i64(row, 2).unwrap_or(0) != 0)
            .with_description(extract_string_or(row, 0, ""));
        layer.label_type = extract_string_or(row, 1, "string");
        layer.valid_labels = Self::labels(
            db,
            "SELECT value, description FROM attribute_option \
             WHERE class_id = ? AND attribute = ? ORDER BY value",
            &[class_id.into(), attribute.into()],
        )?;
        Ok(Some(layer))
    }

    fn labels(
        db: &dyn Database,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<BTreeMap<String, String>, LayerError> {
        let result = db.query(sql, params)?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| Some((extract_string(row, 0)?, extract_string_or(row, 1, ""))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{
        create_attribute, create_attribute_option, create_layer, create_layer_label, initialize,
        LayerDefinition,
    };
    use crate::db::open_mem_db;
    use crate::layers::{TURN_LAYER_ID, WORD_LAYER_ID};
    use rstest::{fixture, rstest};

    #[fixture]
    fn db() -> Box<dyn Database> {
        let db = open_mem_db().unwrap();
        initialize(db.as_ref()).unwrap();
        create_attribute(db.as_ref(), "transcript", "language", "string", false).unwrap();
        create_attribute(db.as_ref(), "speaker", "gender", "select", false).unwrap();
        create_attribute_option(db.as_ref(), "speaker", "gender", "F").unwrap();
        create_attribute_option(db.as_ref(), "speaker", "gender", "M").unwrap();
        create_layer(
            db.as_ref(),
            &LayerDefinition::new(30, "pos", Some(WORD_LAYER_ID), Scope::Word),
        )
        .unwrap();
        create_layer_label(db.as_ref(), 30, "N", "noun").unwrap();
        db
    }

    #[rstest]
    fn test_transcript_type_layer_lists_types(db: Box<dyn Database>) {
        let layer = LayerResolver::get_layer(db.as_ref(), TRANSCRIPT_TYPE_LAYER).unwrap();
        assert_eq!(layer.kind, LayerKind::TranscriptType);
        assert!(layer.valid_labels.contains_key("interview"));
    }

    #[rstest]
    fn test_temporal_layer_row(db: Box<dyn Database>) {
        let turn = LayerResolver::get_layer(db.as_ref(), "turn").unwrap();
        assert_eq!(
            turn.kind,
            LayerKind::Temporal {
                layer_id: TURN_LAYER_ID,
                scope: Scope::Meta
            }
        );
        assert_eq!(turn.parent_id.as_deref(), Some(PARTICIPANT_LAYER));
        assert_eq!(turn.alignment, Alignment::Interval);

        let pos = LayerResolver::get_layer(db.as_ref(), "pos").unwrap();
        assert_eq!(pos.parent_id.as_deref(), Some("word"));
        assert_eq!(pos.valid_labels.get("N").map(String::as_str), Some("noun"));
        assert!(pos.is_tag());
    }

    #[rstest]
    fn test_attribute_layers(db: Box<dyn Database>) {
        let language = LayerResolver::get_layer(db.as_ref(), "transcript_language").unwrap();
        assert_eq!(
            language.kind,
            LayerKind::TranscriptAttribute {
                attribute: "language".into()
            }
        );
        assert_eq!(language.parent_id, None);

        let gender = LayerResolver::get_layer(db.as_ref(), "participant_gender").unwrap();
        assert_eq!(gender.parent_id.as_deref(), Some(PARTICIPANT_LAYER));
        assert_eq!(gender.valid_labels.len(), 2);
    }

    #[rstest]
    fn test_unknown_layer(db: Box<dyn Database>) {
        let err = LayerResolver::get_layer(db.as_ref(), "transcript_nothing").unwrap_err();
        assert!(matches!(err, LayerError::NotFound(id) if id == "transcript_nothing"));
    }

    #[rstest]
    fn test_load_schema_assigns_roles(db: Box<dyn Database>) {
        let schema = LayerResolver::load_schema(db.as_ref()).unwrap();
        assert_eq!(schema.word_layer().unwrap().id, "word");
        assert_eq!(schema.turn_layer().unwrap().id, "turn");
        assert_eq!(schema.utterance_layer().unwrap().id, "utterance");
        assert_eq!(schema.corpus_layer().unwrap().id, CORPUS_LAYER);
        assert_eq!(schema.episode_layer().unwrap().id, EPISODE_LAYER);
        assert!(schema.layer("transcript_language").is_some());
        assert!(schema.layer("participant_gender").is_some());
        assert!(schema.layer("pos").is_some());
        assert_eq!(
            schema.layer_by_numeric_id(WORD_LAYER_ID).map(|l| l.id.as_str()),
            Some("word")
        );
    }
}
