//! Compiler for the participant and main participant layers.
//!
//! Rows come from `speaker` joined through `transcript_speaker`, so one
//! speaker in two transcripts yields two rows. Only graph-level operands and
//! participant attributes can be referenced; temporal layers cannot.

use crate::agql::{CollectionKind, Expression, Field, Operand};
use crate::db::escape::quote_sql_literal;
use crate::ids::MetaId;
use crate::layers::{Layer, LayerKind, Schema, Scope};

use super::condition::{render_common, ConditionBuilder, OperandRenderer};
use super::operands::{finish_collection, graph_collection, graph_scalar, Subquery};
use super::{CompileError, CompiledQuery, Fragment, Projection, QueryOptions};

const AG: &str = "graph.ag_id";

struct ParticipantRenderer<'s> {
    schema: &'s Schema,
    layer: &'s Layer,
    layer_id: i64,
}

impl ParticipantRenderer<'_> {
    fn own_id(&self) -> String {
        format!(
            "{} || speaker.speaker_number",
            quote_sql_literal(&MetaId::prefix(self.layer_id))
        )
    }

    fn own_field(&self, field: Field) -> Result<Fragment, String> {
        match field {
            Field::Id => Ok(Fragment::new(self.own_id())),
            Field::Label => Ok(Fragment::new("speaker.name")),
            _ => Err(format!(
                "Only id and label can be used with layer '{}'",
                self.layer.id
            )),
        }
    }

    fn attribute(&self, attribute: &str, field: Field, kind: Option<CollectionKind>) -> Result<Fragment, String> {
        let select = match field {
            Field::Id => "'p|' || attr.layer || '|' || attr.annotation_id",
            Field::Label => "attr.label",
            Field::Annotator => "attr.annotated_by",
            Field::Confidence => "attr.label_status",
            _ => return Err(format!("Unsupported field of participant attribute '{}'", attribute)),
        };
        let query = Subquery::new(select, "annotation_participant attr")
            .condition("attr.speaker_number = speaker.speaker_number")
            .bound("attr.layer = ?", attribute);
        Ok(match kind {
            Some(kind) => finish_collection(query, kind, false),
            None => query.first("attr.annotation_id").render(),
        })
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
        match &other.kind {
            LayerKind::ParticipantAttribute { attribute } => self.attribute(attribute, field, None),
            LayerKind::Participant | LayerKind::MainParticipant => self.own_field(field),
            _ => Err(format!(
                "Layer '{}' cannot be referenced from participant queries",
                other.id
            )),
        }
    }

    fn collection(&self, kind: CollectionKind, layer_name: &str, count: bool) -> Result<Fragment, String> {
        let other = self
            .schema
            .layer(layer_name)
            .ok_or_else(|| format!("Invalid layer: {}", layer_name))?;
        match &other.kind {
            LayerKind::ParticipantAttribute { attribute } if !count => {
                let field = match kind {
                    CollectionKind::Labels => Field::Label,
                    CollectionKind::List => Field::Id,
                    CollectionKind::Annotators => Field::Annotator,
                };
                self.attribute(attribute, field, Some(kind))
            }
            LayerKind::Temporal { scope, .. } if *scope != Scope::Episode => Err(format!(
                "Layer '{}' cannot be referenced from participant queries",
                other.id
            )),
            _ => graph_collection(other, kind, count, AG),
        }
    }
}

impl OperandRenderer for ParticipantRenderer<'_> {
    fn render(&mut self, operand: &Operand) -> Result<Fragment, String> {
        if let Some(common) = render_common(operand) {
            return common;
        }
        match operand {
            Operand::Own(field) => self.own_field(*field),
            Operand::LayerId => Ok(Fragment::new(quote_sql_literal(&self.layer.id))),
            Operand::GraphId | Operand::Parent(Field::Id | Field::Label) => {
                Ok(Fragment::new("graph.transcript_id"))
            }
            Operand::Other { layer, field } => self.other(layer, *field),
            Operand::Collection { kind, layer } => self.collection(*kind, layer, false),
            Operand::Length(inner) => match inner.as_ref() {
                Operand::Collection { kind, layer } => self.collection(*kind, layer, true),
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
    let layer_id = layer.numeric_id().ok_or_else(|| CompileError::UnsupportedPrimaryLayer {
        layer: layer.id.clone(),
    })?;
    let mut renderer = ParticipantRenderer {
        schema,
        layer,
        layer_id,
    };
    let condition = ConditionBuilder::new(&mut renderer).build(&expression.text, &expression.root)?;

    let projection = match &options.projection {
        Projection::Annotations => format!(
            "{} AS annotation_id, speaker.name AS label, 0 AS label_status, \
             NULL AS start_anchor_id, NULL AS end_anchor_id, graph.transcript_id AS parent_id, \
             speaker.speaker_number AS ordinal, NULL AS annotated_by, NULL AS annotated_when, \
             graph.transcript_id AS transcript_id",
            renderer.own_id()
        ),
        Projection::Ids => format!("{} AS annotation_id", renderer.own_id()),
        Projection::Count => "COUNT(*) AS count".to_string(),
        Projection::Columns(columns) => columns.clone(),
    };

    let mut sql = Fragment::new(format!(
        "SELECT {}, {} AS layer FROM speaker \
         INNER JOIN transcript_speaker ON transcript_speaker.speaker_number = speaker.speaker_number \
         INNER JOIN transcript graph ON graph.ag_id = transcript_speaker.ag_id \
         WHERE ",
        projection,
        quote_sql_literal(&layer.id)
    ));
    sql.push(&condition);
    if layer.kind == LayerKind::MainParticipant {
        sql.push_str(" AND transcript_speaker.main_speaker <> 0");
    }
    options.tail(&mut sql, "graph.transcript_id, speaker.speaker_number");
    Ok(sql.into())
}
