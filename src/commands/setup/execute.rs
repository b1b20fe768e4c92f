use std::error::Error;

use serde::Serialize;

use super::SetupCmd;
use crate::commands::Execute;
use crate::db::schema::{create_corpus, default_layers, initialize, relation_names};
use crate::store::GraphStore;

/// Status of a database relation (table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RelationState {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "exists")]
    AlreadyExists,
    #[serde(rename = "would_create")]
    WouldCreate,
}

/// Status information for a single database relation
#[derive(Debug, Clone, Serialize)]
pub struct RelationStatus {
    pub name: String,
    pub status: RelationState,
}

/// Result of the setup command execution
#[derive(Debug, Serialize)]
pub struct SetupResult {
    pub relations: Vec<RelationStatus>,
    pub created_new: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<String>,
}

impl Execute for SetupCmd {
    type Output = SetupResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        if self.dry_run {
            let relations = relation_names()
                .into_iter()
                .map(str::to_string)
                .chain(
                    default_layers()
                        .into_iter()
                        .map(|l| format!("annotation_layer_{} ({})", l.layer_id, l.name)),
                )
                .map(|name| RelationStatus {
                    name,
                    status: RelationState::WouldCreate,
                })
                .collect();
            return Ok(SetupResult {
                relations,
                created_new: false,
                dry_run: true,
                corpus: self.corpus,
            });
        }

        let relations: Vec<RelationStatus> = initialize(store.db())?
            .into_iter()
            .map(|r| RelationStatus {
                name: r.relation,
                status: if r.created {
                    RelationState::Created
                } else {
                    RelationState::AlreadyExists
                },
            })
            .collect();

        if let Some(corpus) = &self.corpus {
            create_corpus(store.db(), corpus, self.language.as_deref())?;
        }
        store.refresh_schema();

        let created_new = relations
            .iter()
            .any(|r| r.status == RelationState::Created);

        Ok(SetupResult {
            relations,
            created_new,
            dry_run: false,
            corpus: self.corpus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_mem_db;
    use crate::store::StoreConfig;
    use rstest::{fixture, rstest};

    #[fixture]
    fn blank_store() -> GraphStore {
        GraphStore::new(open_mem_db().unwrap(), StoreConfig::default())
    }

    fn setup(dry_run: bool, corpus: Option<&str>) -> SetupCmd {
        SetupCmd {
            dry_run,
            corpus: corpus.map(str::to_string),
            language: corpus.map(|_| "en".to_string()),
        }
    }

    #[rstest]
    fn test_setup_creates_schema_and_default_layers(mut blank_store: GraphStore) {
        let result = setup(false, None).execute(&mut blank_store).unwrap();
        assert!(result.created_new);
        assert!(result
            .relations
            .iter()
            .all(|r| r.status == RelationState::Created));
        assert!(result.relations.iter().any(|r| r.name.contains("(word)")));
        assert_eq!(blank_store.get_layer("word").unwrap().id, "word");
    }

    #[rstest]
    fn test_setup_idempotent(mut blank_store: GraphStore) {
        setup(false, None).execute(&mut blank_store).unwrap();
        let second = setup(false, None).execute(&mut blank_store).unwrap();
        assert!(!second.created_new);
        assert!(second
            .relations
            .iter()
            .all(|r| r.status == RelationState::AlreadyExists));
    }

    #[rstest]
    fn test_setup_dry_run_creates_nothing(mut blank_store: GraphStore) {
        let result = setup(true, None).execute(&mut blank_store).unwrap();
        assert!(result.dry_run);
        assert!(result
            .relations
            .iter()
            .all(|r| r.status == RelationState::WouldCreate));
        assert!(blank_store.get_layer("word").is_err());
    }

    #[rstest]
    fn test_setup_registers_corpus(mut blank_store: GraphStore) {
        setup(false, Some("demo")).execute(&mut blank_store).unwrap();
        assert_eq!(blank_store.get_corpus_ids().unwrap(), vec!["demo"]);
    }
}
