//! Queries that return matching rows instead of graphs.

use serde::Serialize;
use tracing::debug;

use super::{GraphStore, StoreError};
use crate::db::{extract_i64, extract_string, QueryResult, SqlValue};
use crate::queries::{
    translate, translate_transcripts, CompiledQuery, Limit, Projection, QueryOptions,
};

/// What the rows of a compiled expression are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTarget {
    #[default]
    Annotations,
    Transcripts,
}

/// One row of an annotation-matching query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedAnnotation {
    pub id: String,
    pub layer: String,
    pub label: String,
    pub transcript_id: String,
    pub parent_id: Option<String>,
    pub ordinal: i64,
    pub start_anchor_id: Option<String>,
    pub end_anchor_id: Option<String>,
    pub confidence: i64,
    pub annotator: Option<String>,
}

impl MatchedAnnotation {
    fn from_rows(result: &QueryResult) -> Result<Vec<Self>, StoreError> {
        let column = |name| result.column(name);
        let (id, layer, label, status) = (
            column("annotation_id")?,
            column("layer")?,
            column("label")?,
            column("label_status")?,
        );
        let (start, end, parent, ordinal, by, transcript) = (
            column("start_anchor_id")?,
            column("end_anchor_id")?,
            column("parent_id")?,
            column("ordinal")?,
            column("annotated_by")?,
            column("transcript_id")?,
        );
        Ok(result
            .rows
            .iter()
            .map(|row| Self {
                id: extract_string(row, id).unwrap_or_default(),
                layer: extract_string(row, layer).unwrap_or_default(),
                label: extract_string(row, label).unwrap_or_default(),
                transcript_id: extract_string(row, transcript).unwrap_or_default(),
                parent_id: extract_string(row, parent),
                ordinal: extract_i64(row, ordinal).unwrap_or(0),
                start_anchor_id: extract_string(row, start),
                end_anchor_id: extract_string(row, end),
                confidence: extract_i64(row, status).unwrap_or(0),
                annotator: extract_string(row, by),
            })
            .collect())
    }
}

impl GraphStore {
    /// Translate `expression` against this store's schema and access
    /// clause without running it.
    pub fn compile(
        &self,
        target: MatchTarget,
        expression: &str,
        projection: Projection,
        limit: Option<Limit>,
    ) -> Result<CompiledQuery, StoreError> {
        let schema = self.schema()?;
        let options = QueryOptions::new(projection)
            .with_access(self.config.access.as_ref())
            .with_limit(limit);
        let query = match target {
            MatchTarget::Annotations => translate(&schema, expression, &options)?,
            MatchTarget::Transcripts => translate_transcripts(&schema, expression, &options)?,
        };
        debug!(expression, params = query.params.len(), "translated");
        Ok(query)
    }

    fn run(
        &self,
        target: MatchTarget,
        expression: &str,
        projection: Projection,
        limit: Option<Limit>,
    ) -> Result<QueryResult, StoreError> {
        let query = self.compile(target, expression, projection, limit)?;
        Ok(self.db().query(&query.sql, &query.params)?)
    }

    fn count(&self, target: MatchTarget, expression: &str) -> Result<i64, StoreError> {
        let result = self.run(target, expression, Projection::Count, None)?;
        Ok(result
            .first_row()
            .and_then(|row| extract_i64(row, 0))
            .unwrap_or(0))
    }

    /// Annotations matching `expression`, in transcript and timeline order.
    pub fn get_matching_annotations(
        &self,
        expression: &str,
        limit: Option<Limit>,
    ) -> Result<Vec<MatchedAnnotation>, StoreError> {
        let result = self.run(MatchTarget::Annotations, expression, Projection::Annotations, limit)?;
        MatchedAnnotation::from_rows(&result)
    }

    pub fn count_matching_annotations(&self, expression: &str) -> Result<i64, StoreError> {
        self.count(MatchTarget::Annotations, expression)
    }

    /// Ids of annotations matching `expression`.
    pub fn get_matching_annotation_ids(
        &self,
        expression: &str,
        limit: Option<Limit>,
    ) -> Result<Vec<String>, StoreError> {
        let result = self.run(MatchTarget::Annotations, expression, Projection::Ids, limit)?;
        Ok(first_column(&result))
    }

    /// Names of transcripts matching `expression`.
    pub fn get_matching_transcript_ids(
        &self,
        expression: &str,
        limit: Option<Limit>,
    ) -> Result<Vec<String>, StoreError> {
        let result = self.run(MatchTarget::Transcripts, expression, Projection::Ids, limit)?;
        Ok(first_column(&result))
    }

    pub fn count_matching_transcript_ids(&self, expression: &str) -> Result<i64, StoreError> {
        self.count(MatchTarget::Transcripts, expression)
    }
}

fn first_column(result: &QueryResult) -> Vec<String> {
    result
        .rows
        .iter()
        .filter_map(|row| row.first())
        .filter_map(|value| match value {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            other => Some(format!("{other:?}")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::MatchTarget;
    use crate::queries::{Clause, Limit, Projection};
    use crate::test_utils::seeded_store;
    use rstest::rstest;

    #[rstest]
    #[case("layer.id == 'word' && label == 'thing'", 1)]
    #[case("layer.id == 'word' && /th.*/.test(label)", 4)]
    #[case("layer.id == 'word' && my('turn').label == 'Bob'", 2)]
    #[case("layer.id == 'word' && graph.id == 'interview.trs'", 5)]
    #[case("layer.id == 'segment' && my('word').label == 'the'", 2)]
    fn test_count_matching_annotations(#[case] expression: &str, #[case] expected: i64) {
        let store = seeded_store();
        assert_eq!(store.count_matching_annotations(expression).unwrap(), expected);
    }

    #[rstest]
    fn test_matching_annotations_carry_transcript() {
        let store = seeded_store();
        let found = store
            .get_matching_annotations("layer.id == 'word' && label == 'there'", None)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].layer, "word");
        assert_eq!(found[0].transcript_id, "interview.trs");
        assert!(found[0].id.starts_with("ew_0_"));
        assert!(found[0].parent_id.as_deref().unwrap().starts_with("em_11_"));
        assert!(found[0].start_anchor_id.as_deref().unwrap().starts_with("n_"));
    }

    #[rstest]
    fn test_compile_without_running() {
        let store = seeded_store();
        let query = store
            .compile(
                MatchTarget::Annotations,
                "layer.id == 'word' && label == 'thing'",
                Projection::Count,
                None,
            )
            .unwrap();
        assert!(query.sql.starts_with("SELECT COUNT(*) AS count"));
        assert!(query.sql.contains("annotation.label = 'thing'"));
        assert!(query.params.is_empty());
    }

    #[rstest]
    fn test_limit_pages_results() {
        let store = seeded_store();
        let ids = store
            .get_matching_annotation_ids("layer.id == 'word'", Some(Limit::new(1, 2)))
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[rstest]
    fn test_matching_transcripts_respect_access() {
        let store = seeded_store();
        assert_eq!(
            store.get_matching_transcript_ids("/^inter.*/.test(id)", None).unwrap(),
            vec!["interview.trs"]
        );
        let store = store.with_access(Some(Clause::new("graph.corpus_name = ?", vec!["x".into()])));
        assert_eq!(store.count_matching_transcript_ids("/^inter.*/.test(id)").unwrap(), 0);
        assert_eq!(store.count_matching_annotations("layer.id == 'word'").unwrap(), 0);
    }
}
