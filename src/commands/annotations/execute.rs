use std::error::Error;

use serde::Serialize;

use super::AnnotationsCmd;
use crate::commands::Execute;
use crate::store::{GraphStore, MatchedAnnotation};

/// Result of the annotations command
#[derive(Debug, Default, Serialize)]
pub struct AnnotationsResult {
    pub expression: String,
    /// Number of matches before paging.
    pub total: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<MatchedAnnotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
}

impl Execute for AnnotationsCmd {
    type Output = AnnotationsResult;

    fn execute(self, store: &mut GraphStore) -> Result<Self::Output, Box<dyn Error>> {
        let total = store.count_matching_annotations(&self.expression)?;
        let mut result = AnnotationsResult {
            total,
            ..AnnotationsResult::default()
        };
        let limit = Some(self.page.to_limit());
        if self.ids {
            result.ids = store.get_matching_annotation_ids(&self.expression, limit)?;
        } else if !self.count {
            result.annotations = store.get_matching_annotations(&self.expression, limit)?;
        }
        result.expression = self.expression;
        Ok(result)
    }
}
