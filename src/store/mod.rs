//! Graph Load/Save Engine.
//!
//! [`GraphStore`] owns one database connection and a lazily loaded
//! [`Schema`] snapshot. It turns stored rows into [`Graph`]s and writes
//! tracked changes back.
//!
//! # Architecture
//!
//! - `context.rs`: per-operation bookkeeping (`ag_id`, participant lookups,
//!   renamed ids) kept out of the graph itself
//! - `load.rs`: transcript resolution and one loader per layer class
//! - `fragment.rs`: time-bounded loads with ancestor backfill
//! - `save.rs`: the save pipeline; `persist/` holds the per-class writers
//! - `censor.rs`: label censorship applied before writing
//! - `matching.rs`: compiled-expression queries returning rows

mod censor;
mod context;
mod fragment;
mod load;
mod matching;
mod persist;
mod save;

pub use censor::Censorship;
pub use matching::{MatchTarget, MatchedAnnotation};
pub use save::{SaveOutcome, SaveSummary};

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::db::{extract_string, Database, DbError, SqlValue};
use crate::graph::{Graph, GraphError};
use crate::ids::IdError;
use crate::layers::{Layer, LayerError, LayerResolver, Schema, Scope};
use crate::queries::{Clause, CompileError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Annotation not found: {0}")]
    AnnotationNotFound(String),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("Annotation {annotation} on layer '{layer}' has no parent")]
    MissingParent { annotation: String, layer: String },

    #[error("Invalid ID '{id}' ({context}): {source}")]
    InvalidId {
        id: String,
        context: String,
        source: IdError,
    },

    #[error("Graph {graph} is invalid: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation {
        graph: String,
        errors: Vec<GraphError>,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid censorship pattern: {0}")]
    Censorship(#[from] regex::Error),

    #[error("Bad layer metadata: {0}")]
    Schema(String),
}

impl From<LayerError> for StoreError {
    fn from(e: LayerError) -> Self {
        match e {
            LayerError::NotFound(id) => StoreError::LayerNotFound(id),
            LayerError::Db(e) => StoreError::Db(e),
            other => StoreError::Schema(other.to_string()),
        }
    }
}

impl StoreError {
    /// Wrap an id parse failure with what was being decoded.
    pub(crate) fn invalid_id(id: &str, context: impl Into<String>) -> impl FnOnce(IdError) -> Self {
        let id = id.to_string();
        let context = context.into();
        move |source| StoreError::InvalidId {
            id,
            context,
            source,
        }
    }
}

/// Options a store is opened with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Corpus given to new transcripts that name none.
    #[serde(default)]
    pub default_corpus: Option<String>,
    /// Transcript type given to new transcripts that name none.
    #[serde(default)]
    pub default_transcript_type: Option<String>,
    #[serde(default)]
    pub censorship: Option<Censorship>,
    /// Condition on the `graph` (transcript) alias restricting what the
    /// caller may see.
    #[serde(skip)]
    pub access: Option<Clause>,
}

/// Loads and saves annotation graphs over one database connection.
pub struct GraphStore {
    db: Box<dyn Database>,
    config: StoreConfig,
    schema: RefCell<Option<Rc<Schema>>>,
}

impl GraphStore {
    pub fn new(db: Box<dyn Database>, config: StoreConfig) -> Self {
        Self {
            db,
            config,
            schema: RefCell::new(None),
        }
    }

    pub fn db(&self) -> &dyn Database {
        self.db.as_ref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Restrict every subsequent load and query to transcripts matching
    /// `access`.
    pub fn with_access(mut self, access: Option<Clause>) -> Self {
        self.config.access = access;
        self
    }

    /// The layer snapshot, read from the database on first use.
    pub fn schema(&self) -> Result<Rc<Schema>, StoreError> {
        if let Some(schema) = self.schema.borrow().as_ref() {
            return Ok(Rc::clone(schema));
        }
        let schema = Rc::new(LayerResolver::load_schema(self.db())?);
        *self.schema.borrow_mut() = Some(Rc::clone(&schema));
        Ok(schema)
    }

    /// Forget the cached snapshot, e.g. after registering a layer.
    pub fn refresh_schema(&self) {
        self.schema.borrow_mut().take();
    }

    /// One layer definition, straight from the metadata tables.
    pub fn get_layer(&self, id: &str) -> Result<Layer, StoreError> {
        Ok(LayerResolver::get_layer(self.db(), id)?)
    }

    /// Load a whole transcript with the given layers and their ancestors.
    pub fn get_transcript(&self, id: &str, layer_ids: &[String]) -> Result<Graph, StoreError> {
        let schema = self.schema()?;
        load::get_transcript(self.db(), &schema, self.config.access.as_ref(), id, layer_ids)
    }

    /// Load the part of a transcript inside one annotation's span.
    pub fn get_fragment(
        &self,
        transcript_id: &str,
        annotation_id: &str,
        layer_ids: &[String],
    ) -> Result<Graph, StoreError> {
        let schema = self.schema()?;
        fragment::get_fragment(
            self.db(),
            &schema,
            self.config.access.as_ref(),
            transcript_id,
            annotation_id,
            layer_ids,
        )
    }

    /// Load the part of a transcript between two offsets.
    pub fn get_fragment_by_offsets(
        &self,
        transcript_id: &str,
        start: f64,
        end: f64,
        layer_ids: &[String],
    ) -> Result<Graph, StoreError> {
        let schema = self.schema()?;
        fragment::get_fragment_by_offsets(
            self.db(),
            &schema,
            self.config.access.as_ref(),
            transcript_id,
            start,
            end,
            layer_ids,
        )
    }

    /// Write the graph's tracked changes, then clear them.
    pub fn save_transcript(&mut self, graph: &mut Graph) -> Result<SaveOutcome, StoreError> {
        let schema = self.schema()?;
        save::save_transcript(self.db.as_ref(), &schema, &self.config, graph)
    }

    /// Remove a transcript and everything stored against it.
    pub fn delete_transcript(&mut self, id: &str) -> Result<(), StoreError> {
        let schema = self.schema()?;
        let transcript = load::resolve_transcript(self.db(), id)?;
        load::check_access(self.db(), self.config.access.as_ref(), &transcript)?;
        let db = self.db.as_ref();
        db.begin()?;
        let result = (|| -> Result<(), StoreError> {
            let ag_id: SqlValue = transcript.ag_id.into();
            for layer in schema.layers() {
                if let Some(table) = layer.table_name()
                    && layer.scope() != Some(Scope::Episode)
                {
                    db.execute(
                        &format!("DELETE FROM {} WHERE ag_id = ?", table),
                        std::slice::from_ref(&ag_id),
                    )?;
                }
            }
            for table in ["anchor", "annotation_transcript", "transcript_speaker", "transcript"] {
                db.execute(
                    &format!("DELETE FROM {} WHERE ag_id = ?", table),
                    std::slice::from_ref(&ag_id),
                )?;
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                db.commit()?;
                info!(transcript = %transcript.transcript_id, "transcript deleted");
                Ok(())
            }
            Err(e) => {
                db.rollback()?;
                Err(e)
            }
        }
    }

    /// Names of the transcripts the caller may see.
    pub fn get_transcript_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut sql = "SELECT graph.transcript_id FROM transcript graph".to_string();
        let mut params = Vec::new();
        if let Some(access) = &self.config.access {
            sql.push_str(&format!(" WHERE ({})", access.sql));
            params.extend(access.params.iter().cloned());
        }
        sql.push_str(" ORDER BY graph.transcript_id");
        self.strings(&sql, &params)
    }

    pub fn get_corpus_ids(&self) -> Result<Vec<String>, StoreError> {
        self.strings("SELECT corpus_name FROM corpus ORDER BY corpus_name", &[])
    }

    /// Names of every known participant, across transcripts.
    pub fn get_participant_ids(&self) -> Result<Vec<String>, StoreError> {
        self.strings("SELECT name FROM speaker ORDER BY name", &[])
    }

    fn strings(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<String>, StoreError> {
        let result = self.db().query(sql, params)?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| extract_string(row, 0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{empty_store, seeded_store};
    use rstest::rstest;

    #[rstest]
    fn test_schema_is_cached() {
        let store = empty_store();
        let a = store.schema().unwrap();
        let b = store.schema().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        store.refresh_schema();
        assert!(!Rc::ptr_eq(&a, &store.schema().unwrap()));
    }

    #[rstest]
    fn test_get_layer_not_found() {
        let store = empty_store();
        assert!(matches!(
            store.get_layer("nothing"),
            Err(StoreError::LayerNotFound(id)) if id == "nothing"
        ));
        assert_eq!(store.get_layer("word").unwrap().id, "word");
    }

    #[rstest]
    fn test_id_listings() {
        let store = seeded_store();
        assert_eq!(store.get_transcript_ids().unwrap(), vec!["interview.trs"]);
        assert_eq!(store.get_corpus_ids().unwrap(), vec!["demo"]);
        assert_eq!(store.get_participant_ids().unwrap(), vec!["Ann", "Bob"]);
    }

    #[rstest]
    fn test_access_clause_hides_transcripts() {
        let store = seeded_store().with_access(Some(Clause::new(
            "graph.corpus_name = ?",
            vec!["other".into()],
        )));
        assert!(store.get_transcript_ids().unwrap().is_empty());
        assert!(matches!(
            store.get_transcript("interview.trs", &[]),
            Err(StoreError::PermissionDenied(_))
        ));
    }

    #[rstest]
    fn test_delete_transcript() {
        let mut store = seeded_store();
        store.delete_transcript("interview").unwrap();
        assert!(store.get_transcript_ids().unwrap().is_empty());
        let words = store
            .db()
            .query_i64("SELECT COUNT(*) FROM annotation_layer_0", &[])
            .unwrap();
        assert_eq!(words, Some(0));
        assert!(matches!(
            store.get_transcript("interview.trs", &[]),
            Err(StoreError::GraphNotFound(_))
        ));
    }
}
