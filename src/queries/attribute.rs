//! Compiler for transcript and participant attribute layers.
//!
//! Transcript attributes come from `annotation_transcript`, participant
//! attributes from `annotation_participant`; in both, the `layer` column
//! holds the attribute name. An unset `language` transcript attribute takes
//! the corpus language instead, so that layer always yields one row per
//! transcript whose corpus has a language.

use crate::agql::{Expression, Field, Operand};
use crate::db::escape::quote_sql_literal;
use crate::layers::{Layer, LayerKind, Schema};

use super::condition::{render_common, ConditionBuilder, OperandRenderer};
use super::operands::{graph_collection, graph_scalar, LANGUAGE_ATTRIBUTE};
use super::{CompileError, CompiledQuery, Fragment, Projection, QueryOptions};

const AG: &str = "graph.ag_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Transcript,
    /// `transcript_language` with its corpus fallback.
    Language,
    Participant,
}

struct AttributeRenderer<'s> {
    schema: &'s Schema,
    layer: &'s Layer,
    family: Family,
}

impl AttributeRenderer<'_> {
    fn own_id(&self) -> &'static str {
        match self.family {
            Family::Transcript => "'t|' || annotation.layer || '|' || annotation.annotation_id",
            Family::Language => "'t|language|' || COALESCE(annotation.annotation_id, 0)",
            Family::Participant => "'p|' || annotation.layer || '|' || annotation.annotation_id",
        }
    }

    fn own_label(&self) -> &'static str {
        match self.family {
            Family::Language => "COALESCE(annotation.label, corpus.corpus_language)",
            _ => "annotation.label",
        }
    }

    fn own_field(&self, field: Field) -> Result<Fragment, String> {
        let sql = match field {
            Field::Id => self.own_id(),
            Field::Label => self.own_label(),
            Field::Annotator => "annotation.annotated_by",
            Field::Confidence => "annotation.label_status",
            _ => {
                return Err(format!(
                    "Only id, label, annotator and confidence can be used with layer '{}'",
                    self.layer.id
                ));
            }
        };
        Ok(Fragment::new(sql))
    }

    fn parent_field(&self, field: Field) -> Result<Fragment, String> {
        match (self.family, field) {
            (Family::Participant, Field::Id) => Ok(Fragment::new("'m_-2_' || speaker.speaker_number")),
            (Family::Participant, Field::Label) => Ok(Fragment::new("speaker.name")),
            (_, Field::Id | Field::Label) => Ok(Fragment::new("graph.transcript_id")),
            _ => Err("Only parent.id and parent.label are supported".to_string()),
        }
    }

    fn other(&self, layer_name: &str, field: Field) -> Result<Fragment, String> {
        if layer_name == self.layer.id {
            return self.own_field(field);
        }
        let other = self
            .schema
            .layer(layer_name)
            .ok_or_else(|| format!("Invalid layer: {}", layer_name))?;
        if let Some(scalar) = graph_scalar(other, field, AG) {
            return scalar;
        }
        match (&other.kind, self.family) {
            (LayerKind::Participant, Family::Participant) => self.parent_field(field),
            _ => Err(format!(
                "Layer '{}' cannot be referenced from attribute queries",
                other.id
            )),
        }
    }
}

impl OperandRenderer for AttributeRenderer<'_> {
    fn render(&mut self, operand: &Operand) -> Result<Fragment, String> {
        if let Some(common) = render_common(operand) {
            return common;
        }
        match operand {
            Operand::Own(field) => self.own_field(*field),
            Operand::LayerId => Ok(Fragment::new(quote_sql_literal(&self.layer.id))),
            Operand::GraphId => Ok(Fragment::new("graph.transcript_id")),
            Operand::Parent(field) => self.parent_field(*field),
            Operand::Other { layer, field } => self.other(layer, *field),
            Operand::Collection { kind, layer } => {
                let other = self
                    .schema
                    .layer(layer)
                    .ok_or_else(|| format!("Invalid layer: {}", layer))?;
                graph_collection(other, *kind, false, AG)
            }
            Operand::Length(inner) => match inner.as_ref() {
                Operand::Collection { kind, layer } => {
                    let other = self
                        .schema
                        .layer(layer)
                        .ok_or_else(|| format!("Invalid layer: {}", layer))?;
                    graph_collection(other, *kind, true, AG)
                }
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
    layer: &Layer,
    expression: &Expression,
    options: &QueryOptions<'_>,
) -> Result<CompiledQuery, CompileError> {
    let (family, attribute) = match &layer.kind {
        LayerKind::TranscriptAttribute { attribute } if attribute == LANGUAGE_ATTRIBUTE => {
            (Family::Language, attribute)
        }
        LayerKind::TranscriptAttribute { attribute } => (Family::Transcript, attribute),
        LayerKind::ParticipantAttribute { attribute } => (Family::Participant, attribute),
        _ => {
            return Err(CompileError::UnsupportedPrimaryLayer {
                layer: layer.id.clone(),
            });
        }
    };
    let mut renderer = AttributeRenderer {
        schema,
        layer,
        family,
    };
    let condition = ConditionBuilder::new(&mut renderer).build(&expression.text, &expression.root)?;
    Ok(assemble(&renderer, attribute, &condition, options))
}

/// Values of transcript attribute `layer` for the transcript named
/// `graph_id`, or `None` if `layer` is not a transcript attribute.
pub(super) fn for_graph(
    schema: &Schema,
    layer: &Layer,
    graph_id: &str,
    options: &QueryOptions<'_>,
) -> Option<CompiledQuery> {
    let LayerKind::TranscriptAttribute { attribute } = &layer.kind else {
        return None;
    };
    let family = if attribute == LANGUAGE_ATTRIBUTE {
        Family::Language
    } else {
        Family::Transcript
    };
    let renderer = AttributeRenderer {
        schema,
        layer,
        family,
    };
    let condition = Fragment::with_params("graph.transcript_id = ?", vec![graph_id.into()]);
    Some(assemble(&renderer, attribute, &condition, options))
}

fn assemble(
    renderer: &AttributeRenderer<'_>,
    attribute: &str,
    condition: &Fragment,
    options: &QueryOptions<'_>,
) -> CompiledQuery {
    let family = renderer.family;
    let parent_id = renderer
        .parent_field(Field::Id)
        .map(|fragment| fragment.sql)
        .unwrap_or_default();
    let projection = match &options.projection {
        Projection::Annotations => format!(
            "{} AS annotation_id, {} AS label, annotation.label_status AS label_status, \
             NULL AS start_anchor_id, NULL AS end_anchor_id, {} AS parent_id, \
             annotation.annotation_id AS ordinal, annotation.annotated_by AS annotated_by, \
             annotation.annotated_when AS annotated_when, graph.transcript_id AS transcript_id",
            renderer.own_id(),
            renderer.own_label(),
            parent_id
        ),
        Projection::Ids => format!("{} AS annotation_id", renderer.own_id()),
        Projection::Count => "COUNT(*) AS count".to_string(),
        Projection::Columns(columns) => columns.clone(),
    };

    let from = match family {
        Family::Transcript => "FROM transcript graph \
             INNER JOIN annotation_transcript annotation \
             ON annotation.ag_id = graph.ag_id AND annotation.layer = ?",
        Family::Language => "FROM transcript graph \
             LEFT OUTER JOIN annotation_transcript annotation \
             ON annotation.ag_id = graph.ag_id AND annotation.layer = ? \
             LEFT OUTER JOIN corpus ON corpus.corpus_name = graph.corpus_name",
        Family::Participant => "FROM annotation_participant annotation \
             INNER JOIN speaker ON speaker.speaker_number = annotation.speaker_number \
             INNER JOIN transcript_speaker \
             ON transcript_speaker.speaker_number = speaker.speaker_number \
             INNER JOIN transcript graph ON graph.ag_id = transcript_speaker.ag_id",
    };

    let mut sql = Fragment::new(format!(
        "SELECT {}, {} AS layer {}",
        projection,
        quote_sql_literal(&renderer.layer.id),
        from
    ));
    if family != Family::Participant {
        sql.params.push(attribute.into());
    }
    sql.push_str(" WHERE ");
    if family == Family::Participant {
        sql.push(&Fragment::with_params(
            "annotation.layer = ? AND ",
            vec![attribute.into()],
        ));
    }
    if family == Family::Language {
        sql.push_str("COALESCE(annotation.label, corpus.corpus_language) IS NOT NULL AND ");
    }
    sql.push(condition);
    options.tail(&mut sql, "graph.transcript_id, annotation.annotation_id");
    sql.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agql::parse;
    use crate::test_utils::sample_schema;
    use rstest::rstest;

    fn compile_text(text: &str) -> CompiledQuery {
        let schema = sample_schema();
        let expression = parse(text).unwrap();
        let layer = crate::queries::deduce_primary_layer(&schema, &expression).unwrap();
        compile(&schema, layer, &expression, &QueryOptions::new(Projection::Ids)).unwrap()
    }

    #[rstest]
    fn test_language_falls_back_to_corpus() {
        let query = compile_text("graph.id == 'foo.trs' && layer.id == 'transcript_language'");
        assert!(query.sql.contains("LEFT OUTER JOIN corpus ON corpus.corpus_name = graph.corpus_name"));
        assert!(query.sql.starts_with(
            "SELECT 't|language|' || COALESCE(annotation.annotation_id, 0) AS annotation_id"
        ));
        assert_eq!(query.params, vec!["language".into()]);
    }

    #[rstest]
    fn test_participant_attribute() {
        let query = compile_text("layer.id == 'participant_gender' && label == 'F'");
        assert!(query.sql.contains("FROM annotation_participant annotation"));
        assert!(query.sql.contains("WHERE annotation.layer = ? AND 'participant_gender'"));
        assert!(query.sql.ends_with("annotation.label = 'F' ORDER BY graph.transcript_id, annotation.annotation_id"));
        assert_eq!(query.params, vec!["gender".into()]);
    }

    #[rstest]
    fn test_participant_attribute_parent() {
        let query =
            compile_text("layer.id == 'participant_gender' && parent.label == 'Ann'");
        assert!(query.sql.contains("speaker.name = 'Ann'"));
    }
}
