//! Compiler for transcript-matching expressions.
//!
//! Rows are transcripts (`FROM transcript graph`). `id` and `label` are the
//! transcript name; everything else is a graph-level operand, so any layer
//! can be consulted through `labels()`, `list()` and friends.

use crate::agql::{Expression, Field, Operand};

use super::condition::{render_common, ConditionBuilder, OperandRenderer};
use super::operands::{graph_collection, graph_scalar};
use super::{CompileError, CompiledQuery, Fragment, Projection, QueryOptions};
use crate::layers::Schema;

const AG: &str = "graph.ag_id";

struct TranscriptRenderer<'s> {
    schema: &'s Schema,
}

impl TranscriptRenderer<'_> {
    fn collection(&self, operand: &Operand, count: bool) -> Result<Fragment, String> {
        let Operand::Collection { kind, layer } = operand else {
            return Err(format!("Unsupported expression: {}", operand));
        };
        let other = self
            .schema
            .layer(layer)
            .ok_or_else(|| format!("Invalid layer: {}", layer))?;
        graph_collection(other, *kind, count, AG)
    }
}

impl OperandRenderer for TranscriptRenderer<'_> {
    fn render(&mut self, operand: &Operand) -> Result<Fragment, String> {
        if let Some(common) = render_common(operand) {
            return common;
        }
        match operand {
            Operand::Own(Field::Id | Field::Label) | Operand::GraphId => {
                Ok(Fragment::new("graph.transcript_id"))
            }
            Operand::Own(_) => Err("Transcripts only have an id and a label".to_string()),
            Operand::LayerId => Err("layer.id cannot be used when matching transcripts".to_string()),
            Operand::Parent(_) => Err("Transcripts have no parent".to_string()),
            Operand::Other { layer, field } => {
                let other = self
                    .schema
                    .layer(layer)
                    .ok_or_else(|| format!("Invalid layer: {}", layer))?;
                graph_scalar(other, *field, AG).unwrap_or_else(|| {
                    Err(format!(
                        "Layer '{}' has several annotations per transcript; use labels('{}') or list('{}')",
                        layer, layer, layer
                    ))
                })
            }
            Operand::Collection { .. } => self.collection(operand, false),
            Operand::Length(inner) => match inner.as_ref() {
                collection @ Operand::Collection { .. } => self.collection(collection, true),
                scalar => {
                    let mut fragment = self.render(scalar)?;
                    fragment.sql = format!("LENGTH({})", fragment.sql);
                    Ok(fragment)
                }
            },
            other => Err(format!("Unsupported expression: {}", other)),
        }
    }
}

pub(super) fn compile(
    schema: &Schema,
    expression: &Expression,
    options: &QueryOptions<'_>,
) -> Result<CompiledQuery, CompileError> {
    let mut renderer = TranscriptRenderer { schema };
    let condition = ConditionBuilder::new(&mut renderer).build(&expression.text, &expression.root)?;

    let projection = match &options.projection {
        Projection::Annotations | Projection::Ids => {
            "graph.transcript_id AS transcript_id, graph.ag_id AS ag_id".to_string()
        }
        Projection::Count => "COUNT(*) AS count".to_string(),
        Projection::Columns(columns) => columns.clone(),
    };
    let mut sql = Fragment::new(format!(
        "SELECT {} FROM transcript graph WHERE ",
        projection
    ));
    sql.push(&condition);
    options.tail(&mut sql, "graph.transcript_id");
    Ok(sql.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agql::parse;
    use crate::queries::{Clause, Limit};
    use crate::test_utils::sample_schema;
    use rstest::rstest;

    fn compile_with(text: &str, options: &QueryOptions<'_>) -> Result<CompiledQuery, CompileError> {
        compile(&sample_schema(), &parse(text).unwrap(), options)
    }

    #[rstest]
    fn test_corpus_and_participants() {
        let query = compile_with(
            "my('corpus').label == 'demo' && labels('participant').includes('Ann')",
            &QueryOptions::default(),
        )
        .unwrap();
        assert_eq!(
            query.sql,
            "SELECT graph.transcript_id AS transcript_id, graph.ag_id AS ag_id \
             FROM transcript graph WHERE \
             (SELECT tx.corpus_name FROM transcript tx WHERE tx.ag_id = graph.ag_id) = 'demo' \
             AND 'Ann' IN (SELECT sp.name FROM transcript_speaker ts \
             INNER JOIN speaker sp ON sp.speaker_number = ts.speaker_number \
             WHERE ts.ag_id = graph.ag_id) ORDER BY graph.transcript_id"
        );
    }

    #[rstest]
    fn test_access_clause_and_limit_params_follow_condition() {
        let access = Clause::new("graph.corpus_name = ?", vec!["demo".into()]);
        let options = QueryOptions::new(Projection::Ids)
            .with_access(Some(&access))
            .with_limit(Some(Limit::new(10, 5)));
        let query = compile_with("my('transcript_language').label == 'en'", &options).unwrap();
        assert_eq!(
            query.params,
            vec!["language".into(), "demo".into(), 5_i64.into(), 10_i64.into()]
        );
        assert!(query.sql.ends_with(
            " AND (graph.corpus_name = ?) ORDER BY graph.transcript_id LIMIT ? OFFSET ?"
        ));
    }

    #[rstest]
    fn test_count_has_no_order() {
        let query = compile_with("/^a/.test(id)", &QueryOptions::new(Projection::Count)).unwrap();
        assert_eq!(
            query.sql,
            "SELECT COUNT(*) AS count FROM transcript graph WHERE graph.transcript_id REGEXP '^a'"
        );
    }

    #[rstest]
    fn test_layer_id_is_rejected() {
        let err = compile_with("layer.id == 'word'", &QueryOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Invalid { .. }));
    }
}
