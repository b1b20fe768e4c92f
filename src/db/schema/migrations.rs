//! Schema creation and administrative seeding.
//!
//! - [`create_schema`] creates every fixed table (idempotent)
//! - [`create_layer`] registers a temporal layer and creates its table
//! - [`create_attribute`], [`create_corpus`], [`create_transcript_type`]
//!   register the remaining administrative rows

use tracing::{debug, info};

use crate::db::schema::compilers::SqliteCompiler;
use crate::db::schema::relations::ALL_RELATIONS;
use crate::db::{Database, DbError, SqlValue};
use crate::layers::{
    Alignment, Scope, PARTICIPANT_LAYER_ID, SEGMENT_LAYER_ID, TURN_LAYER_ID, UTTERANCE_LAYER_ID,
    WORD_LAYER_ID,
};

/// Outcome for one table.
#[derive(Debug, Clone)]
pub struct SchemaCreationResult {
    pub relation: String,
    pub created: bool,
}

/// Create all fixed tables that do not exist yet.
pub fn create_schema(db: &dyn Database) -> Result<Vec<SchemaCreationResult>, DbError> {
    let mut results = Vec::with_capacity(ALL_RELATIONS.len());
    for relation in ALL_RELATIONS {
        let ddl = SqliteCompiler::compile_relation(relation);
        let created = db.try_create_relation(relation.name, &ddl)?;
        debug!(relation = relation.name, created, "schema relation");
        results.push(SchemaCreationResult {
            relation: relation.name.to_string(),
            created,
        });
    }
    Ok(results)
}

/// Names of every fixed table.
pub fn relation_names() -> Vec<&'static str> {
    ALL_RELATIONS.iter().map(|r| r.name).collect()
}

/// A temporal layer to register.
#[derive(Debug, Clone)]
pub struct LayerDefinition {
    pub layer_id: i64,
    pub name: String,
    /// Numeric id of the parent layer; `None` for graph-level layers.
    pub parent_id: Option<i64>,
    pub scope: Scope,
    pub alignment: Alignment,
    pub peers: bool,
    pub description: String,
    pub label_type: String,
}

impl LayerDefinition {
    pub fn new(layer_id: i64, name: &str, parent_id: Option<i64>, scope: Scope) -> Self {
        Self {
            layer_id,
            name: name.to_string(),
            parent_id,
            scope,
            alignment: Alignment::None,
            peers: false,
            description: String::new(),
            label_type: "string".to_string(),
        }
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_peers(mut self) -> Self {
        self.peers = true;
        self
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// The layers every store starts with.
pub fn default_layers() -> Vec<LayerDefinition> {
    vec![
        LayerDefinition::new(TURN_LAYER_ID, "turn", Some(PARTICIPANT_LAYER_ID), Scope::Meta)
            .aligned(Alignment::Interval)
            .with_peers()
            .described("Speaker turns"),
        LayerDefinition::new(UTTERANCE_LAYER_ID, "utterance", Some(TURN_LAYER_ID), Scope::Meta)
            .aligned(Alignment::Interval)
            .with_peers()
            .described("Lines of transcript"),
        LayerDefinition::new(WORD_LAYER_ID, "word", Some(TURN_LAYER_ID), Scope::Word)
            .aligned(Alignment::Interval)
            .with_peers()
            .described("Transcribed words"),
        LayerDefinition::new(SEGMENT_LAYER_ID, "segment", Some(WORD_LAYER_ID), Scope::Segment)
            .aligned(Alignment::Interval)
            .with_peers()
            .described("Phone-level segments"),
        LayerDefinition::new(2, "orthography", Some(WORD_LAYER_ID), Scope::Word)
            .described("Normalized word spelling"),
    ]
}

/// Register a temporal layer and create its table.
///
/// Returns false if a layer with that numeric id was already registered.
pub fn create_layer(db: &dyn Database, layer: &LayerDefinition) -> Result<bool, DbError> {
    let existing = db.query_i64(
        "SELECT COUNT(*) FROM layer WHERE layer_id = ?",
        &[layer.layer_id.into()],
    )?;
    let created = existing.unwrap_or(0) == 0;
    if created {
        db.execute(
            "INSERT INTO layer (layer_id, short_description, description, parent_id, scope, \
             alignment, peers, type) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            &[
                layer.layer_id.into(),
                layer.name.as_str().into(),
                layer.description.as_str().into(),
                layer.parent_id.into(),
                layer.scope.code().into(),
                layer.alignment.code().into(),
                layer.peers.into(),
                layer.label_type.as_str().into(),
            ],
        )?;
        info!(layer = %layer.name, layer_id = layer.layer_id, "layer registered");
    }
    db.execute_batch(&SqliteCompiler::compile_layer_table(
        layer.layer_id,
        layer.scope,
    ))?;
    Ok(created)
}

/// Add a closed-vocabulary label to a temporal layer.
pub fn create_layer_label(
    db: &dyn Database,
    layer_id: i64,
    value: &str,
    description: &str,
) -> Result<(), DbError> {
    db.execute(
        "INSERT OR REPLACE INTO layer_label (layer_id, value, description) VALUES (?, ?, ?)",
        &[layer_id.into(), value.into(), description.into()],
    )?;
    Ok(())
}

/// Define a transcript (`class_id = "transcript"`) or participant
/// (`class_id = "speaker"`) attribute.
pub fn create_attribute(
    db: &dyn Database,
    class_id: &str,
    attribute: &str,
    label_type: &str,
    peers: bool,
) -> Result<(), DbError> {
    db.execute(
        "INSERT OR IGNORE INTO attribute_definition (class_id, attribute, label, type, peers) \
         VALUES (?, ?, ?, ?, ?)",
        &[
            class_id.into(),
            attribute.into(),
            attribute.into(),
            label_type.into(),
            peers.into(),
        ],
    )?;
    Ok(())
}

/// Add a closed-vocabulary value to an attribute.
pub fn create_attribute_option(
    db: &dyn Database,
    class_id: &str,
    attribute: &str,
    value: &str,
) -> Result<(), DbError> {
    db.execute(
        "INSERT OR IGNORE INTO attribute_option (class_id, attribute, value) VALUES (?, ?, ?)",
        &[class_id.into(), attribute.into(), value.into()],
    )?;
    Ok(())
}

/// Find or create a corpus, returning its id.
pub fn create_corpus(
    db: &dyn Database,
    name: &str,
    language: Option<&str>,
) -> Result<i64, DbError> {
    if let Some(id) = db.query_i64(
        "SELECT corpus_id FROM corpus WHERE corpus_name = ?",
        &[name.into()],
    )? {
        return Ok(id);
    }
    db.insert(
        "INSERT INTO corpus (corpus_name, corpus_language) VALUES (?, ?)",
        &[name.into(), SqlValue::from(language)],
    )
}

/// Find or create a transcript type, returning its id.
pub fn create_transcript_type(db: &dyn Database, name: &str) -> Result<i64, DbError> {
    if let Some(id) = db.query_i64(
        "SELECT type_id FROM transcript_type WHERE transcript_type = ?",
        &[name.into()],
    )? {
        return Ok(id);
    }
    db.insert(
        "INSERT INTO transcript_type (transcript_type) VALUES (?)",
        &[name.into()],
    )
}

/// Create the fixed tables plus the default layers and transcript type.
pub fn initialize(db: &dyn Database) -> Result<Vec<SchemaCreationResult>, DbError> {
    let mut results = create_schema(db)?;
    for layer in default_layers() {
        let created = create_layer(db, &layer)?;
        results.push(SchemaCreationResult {
            relation: format!("annotation_layer_{} ({})", layer.layer_id, layer.name),
            created,
        });
    }
    create_transcript_type(db, "interview")?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_mem_db;
    use rstest::rstest;

    #[rstest]
    fn test_create_schema_is_idempotent() {
        let db = open_mem_db().unwrap();
        let first = create_schema(db.as_ref()).unwrap();
        assert!(first.iter().all(|r| r.created));
        let second = create_schema(db.as_ref()).unwrap();
        assert!(second.iter().all(|r| !r.created));
        assert_eq!(first.len(), relation_names().len());
    }

    #[rstest]
    fn test_initialize_creates_default_layers() {
        let db = open_mem_db().unwrap();
        let results = initialize(db.as_ref()).unwrap();
        assert_eq!(results.len(), relation_names().len() + default_layers().len());
        for table in ["annotation_layer_0", "annotation_layer_1", "annotation_layer_11"] {
            assert!(db.relation_exists(table).unwrap(), "{} missing", table);
        }
        let again = initialize(db.as_ref()).unwrap();
        assert!(again.iter().all(|r| !r.created));
    }

    #[rstest]
    fn test_find_or_create_helpers() {
        let db = open_mem_db().unwrap();
        create_schema(db.as_ref()).unwrap();
        let a = create_corpus(db.as_ref(), "CC", Some("en")).unwrap();
        let b = create_corpus(db.as_ref(), "CC", None).unwrap();
        assert_eq!(a, b);
        let t1 = create_transcript_type(db.as_ref(), "interview").unwrap();
        let t2 = create_transcript_type(db.as_ref(), "wordlist").unwrap();
        assert_ne!(t1, t2);
    }
}
