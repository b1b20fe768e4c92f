//! Compiler for primary layers stored in `annotation_layer_{N}` tables.

use std::collections::BTreeMap;

use crate::agql::{AnchorField, CollectionKind, Expression, Field, Operand};
use crate::db::escape::quote_sql_literal;
use crate::ids::{AnnotationId, MetaId};
use crate::layers::{layer_table, Layer, LayerKind, Schema, Scope, PARTICIPANT_LAYER_ID};

use super::condition::{render_common, ConditionBuilder, OperandRenderer};
use super::joins::{anchor_joins, Relation};
use super::operands::{finish_collection, graph_collection, graph_scalar, temporal_select};
use super::{CompileError, CompiledQuery, Fragment, Projection, QueryOptions};

const AG: &str = "annotation.ag_id";

struct TemporalRenderer<'s> {
    schema: &'s Schema,
    layer: &'s Layer,
    layer_id: i64,
    scope: Scope,
    needs_transcript: bool,
    needs_anchors: bool,
    /// `my('x')` joins by layer name, in encounter order.
    joins: Vec<String>,
    join_aliases: BTreeMap<String, String>,
}

impl<'s> TemporalRenderer<'s> {
    fn new(schema: &'s Schema, layer: &'s Layer, layer_id: i64, scope: Scope) -> Self {
        Self {
            schema,
            layer,
            layer_id,
            scope,
            needs_transcript: false,
            needs_anchors: false,
            joins: Vec::new(),
            join_aliases: BTreeMap::new(),
        }
    }

    fn own_id(&self) -> String {
        format!(
            "CONCAT({}, annotation.annotation_id)",
            quote_sql_literal(&AnnotationId::prefix(self.scope, self.layer_id))
        )
    }

    fn own_field(&mut self, field: Field) -> Result<Fragment, String> {
        let sql = match field {
            Field::Id => self.own_id(),
            Field::Anchor(end, AnchorField::Id) => {
                format!("CONCAT('n_', annotation.{}_anchor_id)", end.name())
            }
            Field::Anchor(end, AnchorField::Offset) => {
                self.needs_anchors = true;
                format!("{}.offset", end.name())
            }
            Field::Anchor(end, AnchorField::Confidence) => {
                self.needs_anchors = true;
                format!("{}.alignment_status", end.name())
            }
            other => temporal_select(self.layer, self.scope, self.layer_id, other, "annotation")?,
        };
        Ok(Fragment::new(sql))
    }

    fn parent_field(&mut self, field: Field) -> Result<Fragment, String> {
        let parent = self.schema.parent_of(self.layer);
        let sql = match (parent.map(|p| &p.kind), field) {
            (None, Field::Id | Field::Label) => {
                self.needs_transcript = true;
                "graph.transcript_id".to_string()
            }
            (Some(LayerKind::Participant), Field::Id) => format!(
                "CONCAT({}, annotation.parent_id)",
                quote_sql_literal(&MetaId::prefix(PARTICIPANT_LAYER_ID))
            ),
            (Some(LayerKind::Participant), Field::Label) => {
                "(SELECT sp.name FROM speaker sp WHERE sp.speaker_number = annotation.parent_id)"
                    .to_string()
            }
            (Some(LayerKind::Temporal { layer_id, scope }), Field::Id) => format!(
                "CONCAT({}, annotation.parent_id)",
                quote_sql_literal(&AnnotationId::prefix(*scope, *layer_id))
            ),
            (Some(LayerKind::Temporal { layer_id, scope }), Field::Label) => {
                let parent = parent.ok_or_else(|| "parent layer missing".to_string())?;
                let label = temporal_select(parent, *scope, *layer_id, Field::Label, "parent")?;
                format!(
                    "(SELECT {} FROM {} parent WHERE parent.annotation_id = annotation.parent_id)",
                    label,
                    layer_table(*layer_id)
                )
            }
            _ => {
                return Err(format!(
                    "Only parent.id and parent.label are supported on layer '{}'",
                    self.layer.id
                ));
            }
        };
        Ok(Fragment::new(sql))
    }

    /// Speaker of the primary annotation, through its turn.
    fn participant(&mut self, select: &str, main_only: bool) -> Result<Fragment, String> {
        let turn = self
            .schema
            .turn_layer()
            .and_then(Layer::numeric_id)
            .ok_or_else(|| "No turn layer is defined".to_string())?;
        let mut sql = format!(
            "(SELECT {} FROM {} turn INNER JOIN speaker sp ON sp.speaker_number = turn.label",
            select,
            layer_table(turn)
        );
        if main_only {
            sql.push_str(
                " INNER JOIN transcript_speaker ts ON ts.ag_id = turn.ag_id \
                 AND ts.speaker_number = sp.speaker_number AND ts.main_speaker <> 0",
            );
        }
        if self.scope == Scope::Freeform {
            self.needs_anchors = true;
            sql.push_str(&anchor_joins("turn", "turn_start", "turn_end"));
            sql.push_str(
                " WHERE turn.ag_id = annotation.ag_id \
                 AND turn_start.offset <= end.offset AND start.offset <= turn_end.offset \
                 ORDER BY turn_start.offset LIMIT 1)",
            );
        } else {
            sql.push_str(" WHERE turn.annotation_id = annotation.turn_annotation_id)");
        }
        Ok(Fragment::new(sql))
    }

    fn other_field(&mut self, layer_name: &str, field: Field) -> Result<Fragment, String> {
        if layer_name == self.layer.id {
            return self.own_field(field);
        }
        let schema = self.schema;
        let other = schema
            .layer(layer_name)
            .ok_or_else(|| format!("Invalid layer: {}", layer_name))?;
        if let Some(scalar) = graph_scalar(other, field, AG) {
            return scalar;
        }
        match &other.kind {
            LayerKind::Participant | LayerKind::MainParticipant => {
                let main_only = other.kind == LayerKind::MainParticipant;
                let select = match field {
                    Field::Id => format!(
                        "CONCAT({}, sp.speaker_number)",
                        quote_sql_literal(&MetaId::prefix(
                            other.numeric_id().unwrap_or(PARTICIPANT_LAYER_ID)
                        ))
                    ),
                    Field::Label => "sp.name".to_string(),
                    _ => {
                        return Err(format!(
                            "Only id and label can be used with layer '{}'",
                            other.id
                        ));
                    }
                };
                self.participant(&select, main_only)
            }
            LayerKind::ParticipantAttribute { attribute } => {
                let select = match field {
                    Field::Id => "'p|' || attr.layer || '|' || attr.annotation_id",
                    Field::Label => "attr.label",
                    _ => {
                        return Err(format!(
                            "Only id and label can be used with layer '{}'",
                            other.id
                        ));
                    }
                };
                let speaker = self.participant("sp.speaker_number", false)?;
                let mut sql = Fragment::new(format!(
                    "(SELECT {} FROM annotation_participant attr WHERE attr.speaker_number = ",
                    select
                ));
                sql.push(&speaker);
                sql.push(&Fragment::with_params(
                    " AND attr.layer = ? ORDER BY attr.annotation_id LIMIT 1)",
                    vec![attribute.as_str().into()],
                ));
                Ok(sql)
            }
            LayerKind::Temporal { layer_id, scope } => {
                let alias = self.join_alias(*layer_id, *scope, &other.id);
                Ok(Fragment::new(temporal_select(
                    other, *scope, *layer_id, field, &alias,
                )?))
            }
            _ => Err(format!("Invalid layer: {}", layer_name)),
        }
    }

    /// Alias of the LEFT OUTER JOIN for `my(layer)`, added on first use.
    fn join_alias(&mut self, layer_id: i64, scope: Scope, name: &str) -> String {
        if let Some(alias) = self.join_aliases.get(name) {
            return alias.clone();
        }
        let alias = format!("layer_{}", layer_id);
        let relation = Relation::between(self.scope, scope);
        if relation.overlap {
            self.needs_anchors = true;
        }
        self.joins.push(relation.first_join(layer_id, &alias));
        self.join_aliases.insert(name.to_string(), alias.clone());
        alias
    }

    fn collection(
        &mut self,
        kind: CollectionKind,
        layer_name: &str,
        count: bool,
    ) -> Result<Fragment, String> {
        let schema = self.schema;
        let other = schema
            .layer(layer_name)
            .ok_or_else(|| format!("Invalid layer: {}", layer_name))?;
        match &other.kind {
            LayerKind::Temporal { layer_id, scope } if *scope != Scope::Episode => {
                let field = match kind {
                    CollectionKind::Labels => Field::Label,
                    CollectionKind::List => Field::Id,
                    CollectionKind::Annotators => Field::Annotator,
                };
                let relation = Relation::between(self.scope, *scope);
                if relation.overlap {
                    self.needs_anchors = true;
                }
                let select = temporal_select(other, *scope, *layer_id, field, "other")?;
                Ok(finish_collection(
                    relation.subquery(*layer_id, &select),
                    kind,
                    count,
                ))
            }
            LayerKind::Participant | LayerKind::MainParticipant if kind != CollectionKind::Annotators => {
                // the participant of this annotation, as a one-element set
                let field = if kind == CollectionKind::Labels {
                    Field::Label
                } else {
                    Field::Id
                };
                let single = self.other_field(layer_name, field)?;
                if count {
                    let mut counted = Fragment::new("(CASE WHEN ");
                    counted.push(&single);
                    counted.push_str(" IS NULL THEN 0 ELSE 1 END)");
                    Ok(counted)
                } else {
                    let mut set = Fragment::new("(SELECT ");
                    set.push(&single);
                    set.push_str(")");
                    Ok(set)
                }
            }
            _ => graph_collection(other, kind, count, AG),
        }
    }

    fn length(&mut self, inner: &Operand) -> Result<Fragment, String> {
        match inner {
            Operand::Collection { kind, layer } => self.collection(*kind, layer, true),
            scalar => {
                let mut fragment = self.render(scalar)?;
                fragment.sql = format!("LENGTH({})", fragment.sql);
                Ok(fragment)
            }
        }
    }
}

impl OperandRenderer for TemporalRenderer<'_> {
    fn render(&mut self, operand: &Operand) -> Result<Fragment, String> {
        if let Some(common) = render_common(operand) {
            return common;
        }
        match operand {
            Operand::Own(field) => self.own_field(*field),
            Operand::LayerId => Ok(Fragment::new(quote_sql_literal(&self.layer.id))),
            Operand::GraphId => {
                self.needs_transcript = true;
                Ok(Fragment::new("graph.transcript_id"))
            }
            Operand::Parent(field) => self.parent_field(*field),
            Operand::Other { layer, field } => self.other_field(layer, *field),
            Operand::Collection { kind, layer } => self.collection(*kind, layer, false),
            Operand::Length(inner) => self.length(inner),
            other => Err(format!("Unsupported expression: {}", other)),
        }
    }
}

/// Uniform annotation row for the primary layer.
fn annotation_columns(renderer: &mut TemporalRenderer<'_>) -> Result<String, String> {
    let id = renderer.own_id();
    let label = temporal_select(
        renderer.layer,
        renderer.scope,
        renderer.layer_id,
        Field::Label,
        "annotation",
    )?;
    let parent = renderer.parent_field(Field::Id)?.sql;
    renderer.needs_transcript = true;
    Ok(format!(
        "{id} AS annotation_id, {label} AS label, annotation.label_status AS label_status, \
         CONCAT('n_', annotation.start_anchor_id) AS start_anchor_id, \
         CONCAT('n_', annotation.end_anchor_id) AS end_anchor_id, \
         {parent} AS parent_id, annotation.ordinal AS ordinal, \
         annotation.annotated_by AS annotated_by, annotation.annotated_when AS annotated_when, \
         graph.transcript_id AS transcript_id"
    ))
}

fn projection_sql(
    renderer: &mut TemporalRenderer<'_>,
    projection: &Projection,
) -> Result<String, String> {
    Ok(match projection {
        Projection::Annotations => annotation_columns(renderer)?,
        Projection::Ids => format!("{} AS annotation_id", renderer.own_id()),
        Projection::Count => "COUNT(*) AS count".to_string(),
        Projection::Columns(columns) => columns.clone(),
    })
}

/// SELECT list of `projection` over `layer`, for hand-written queries that
/// join `transcript graph` unconditionally.
pub(super) fn select_list(schema: &Schema, layer: &Layer, projection: &Projection) -> Option<String> {
    let (layer_id, scope) = layer.temporal()?;
    let mut renderer = TemporalRenderer::new(schema, layer, layer_id, scope);
    projection_sql(&mut renderer, projection).ok()
}

pub(super) fn compile(
    schema: &Schema,
    layer: &Layer,
    expression: &Expression,
    options: &QueryOptions<'_>,
) -> Result<CompiledQuery, CompileError> {
    let (layer_id, scope) = match layer.kind {
        LayerKind::Temporal { layer_id, scope } if scope != Scope::Episode => (layer_id, scope),
        _ => {
            return Err(CompileError::UnsupportedPrimaryLayer {
                layer: layer.id.clone(),
            });
        }
    };
    let mut renderer = TemporalRenderer::new(schema, layer, layer_id, scope);
    renderer.needs_transcript = options.access.is_some();

    let condition = ConditionBuilder::new(&mut renderer).build(&expression.text, &expression.root)?;

    let projection =
        projection_sql(&mut renderer, &options.projection).map_err(|message| {
            CompileError::Invalid {
                expression: expression.text.clone(),
                messages: vec![message],
            }
        })?;

    let mut sql = Fragment::new(format!(
        "SELECT {}, {} AS layer FROM {} annotation",
        projection,
        quote_sql_literal(&layer.id),
        layer_table(layer_id)
    ));
    if renderer.needs_transcript {
        sql.push_str(" INNER JOIN transcript graph ON graph.ag_id = annotation.ag_id");
    }
    if renderer.needs_anchors {
        sql.push_str(&anchor_joins("annotation", "start", "end"));
    }
    for join in &renderer.joins {
        sql.push_str(join);
    }
    sql.push_str(" WHERE ");
    sql.push(&condition);

    let mut order_by = vec![if renderer.needs_transcript {
        "graph.transcript_id"
    } else {
        "annotation.ag_id"
    }];
    if renderer.needs_anchors {
        order_by.extend(["start.offset", "end.offset"]);
    }
    order_by.extend(["annotation.parent_id", "annotation.annotation_id"]);
    options.tail(&mut sql, &order_by.join(", "));
    Ok(sql.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agql::parse;
    use crate::queries::operands::LANGUAGE_ATTRIBUTE;
    use crate::test_utils::sample_schema;
    use rstest::rstest;

    fn compile_ids(text: &str) -> Result<CompiledQuery, CompileError> {
        let schema = sample_schema();
        let expression = parse(text).unwrap();
        let layer = crate::queries::deduce_primary_layer(&schema, &expression)?;
        compile(
            &schema,
            layer,
            &expression,
            &QueryOptions::new(Projection::Ids),
        )
    }

    #[rstest]
    fn test_turn_labels_are_speaker_names() {
        let query = compile_ids("layer.id == 'turn' && label == 'Ann'").unwrap();
        assert!(query
            .sql
            .contains("(SELECT sp.name FROM speaker sp WHERE sp.speaker_number = annotation.label) = 'Ann'"));
    }

    #[rstest]
    fn test_participant_of_word_uses_turn_key() {
        let query = compile_ids("layer.id == 'word' && my('participant').label == 'Ann'").unwrap();
        assert!(query.sql.contains("WHERE turn.annotation_id = annotation.turn_annotation_id)"));
        assert!(!query.sql.contains("INNER JOIN anchor start"));
    }

    #[rstest]
    fn test_participant_of_freeform_uses_overlap() {
        let query = compile_ids("layer.id == 'topic' && my('participant').label == 'Ann'").unwrap();
        assert!(query.sql.contains("turn_start.offset <= end.offset"));
        assert!(query.sql.contains("INNER JOIN anchor start"));
    }

    #[rstest]
    fn test_parent_id_of_word_is_turn_id() {
        let query = compile_ids("layer.id == 'word' && parent.id == 'em_11_3'").unwrap();
        assert!(query
            .sql
            .contains("CONCAT('em_11_', annotation.parent_id) = 'em_11_3'"));
    }

    #[rstest]
    fn test_anchor_of_other_layer_is_rejected() {
        let err = compile_ids("layer.id == 'word' && my('pos').start.offset > 1").unwrap_err();
        assert!(err.messages()[0].contains("anchors"));
    }

    #[rstest]
    fn test_attribute_operand_binds_name() {
        let query = compile_ids(&format!(
            "layer.id == 'word' && my('transcript_{}').label == 'en'",
            LANGUAGE_ATTRIBUTE
        ))
        .unwrap();
        assert!(query.sql.contains("attr.layer = ?"));
        assert_eq!(query.params, vec!["language".into()]);
    }

    #[rstest]
    fn test_episode_layer_is_not_primary() {
        let schema = sample_schema();
        let expression = parse("layer.id == 'series_note'").unwrap();
        let layer = schema.layer("series_note").unwrap();
        let err = compile(&schema, layer, &expression, &QueryOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedPrimaryLayer { .. }));
    }
}
