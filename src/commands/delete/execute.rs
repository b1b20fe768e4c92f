use std::error::Error;

use serde::Serialize;

use super::DeleteCmd;
use crate::commands::Execute;
use crate::store::GraphStore;

/// Result of the delete command
#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub transcript: String,
    pub deleted: bool,
}

impl Execute for DeleteCmd {
    type Output = DeleteResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        store.delete_transcript(&self.id)?;
        Ok(DeleteResult {
            transcript: self.id,
            deleted: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seeded_store;
    use rstest::rstest;

    #[rstest]
    fn test_delete_by_stem() {
        let mut store = seeded_store();
        let result = DeleteCmd {
            id: "interview".to_string(),
        }
        .execute(&mut store)
        .unwrap();
        assert!(result.deleted);
        assert!(store.get_transcript_ids().unwrap().is_empty());
    }

    #[rstest]
    fn test_delete_unknown() {
        let mut store = seeded_store();
        let err = DeleteCmd {
            id: "nothing".to_string(),
        }
        .execute(&mut store)
        .unwrap_err();
        assert!(err.to_string().contains("Graph not found"));
    }
}
