//! Operands that resolve against the transcript rather than the primary
//! annotation: corpus, episode, transcript type, transcript and participant
//! attributes, participants, and temporal layers seen from the whole graph.
//!
//! Each resolves to a correlated subquery keyed on an `ag_id` expression
//! supplied by the calling compiler (`annotation.ag_id`, `graph.ag_id`, ...).

use crate::agql::{CollectionKind, Field};
use crate::db::SqlValue;
use crate::ids::{AnnotationId, MetaId};
use crate::layers::{
    layer_table, Layer, LayerKind, Scope, CORPUS_LAYER_ID, EPISODE_LAYER_ID,
    MAIN_PARTICIPANT_LAYER_ID, PARTICIPANT_LAYER_ID, TRANSCRIPT_TYPE_LAYER_ID,
};

use super::Fragment;
use crate::db::escape::quote_sql_literal;

/// Attribute whose absence falls back to the corpus language.
pub(super) const LANGUAGE_ATTRIBUTE: &str = "language";

/// `(SELECT ... FROM ... WHERE ...)` under construction.
#[derive(Debug, Clone, Default)]
pub(super) struct Subquery {
    pub select: String,
    pub from: String,
    pub conditions: Vec<String>,
    pub params: Vec<SqlValue>,
    pub order_by: Option<String>,
    pub first_only: bool,
}

impl Subquery {
    pub fn new(select: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Condition with one bound value.
    pub fn bound(mut self, condition: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.conditions.push(condition.into());
        self.params.push(value.into());
        self
    }

    pub fn first(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self.first_only = true;
        self
    }

    /// Count the rows instead of listing them.
    pub fn counted(mut self, distinct: bool) -> Self {
        self.select = if distinct {
            format!("COUNT(DISTINCT {})", self.select)
        } else {
            "COUNT(*)".to_string()
        };
        self.order_by = None;
        self.first_only = false;
        self
    }

    pub fn render(&self) -> Fragment {
        let mut sql = format!("(SELECT {} FROM {}", self.select, self.from);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if self.first_only {
            sql.push_str(" LIMIT 1");
        }
        sql.push(')');
        Fragment::with_params(sql, self.params.clone())
    }
}

fn meta_id(layer_id: i64, key: &str) -> String {
    format!("{} || {}", quote_sql_literal(&MetaId::prefix(layer_id)), key)
}

fn id_or_label(layer: &Layer, field: Field) -> Result<bool, String> {
    match field {
        Field::Id => Ok(true),
        Field::Label => Ok(false),
        _ => Err(format!(
            "Only id and label can be used with layer '{}'",
            layer.id
        )),
    }
}

/// `transcript` row of the current graph, joined to `extra`.
fn transcript_subquery(select: &str, extra: &str, ag: &str) -> Subquery {
    Subquery::new(select, format!("transcript tx{}", extra)).condition(format!("tx.ag_id = {}", ag))
}

/// Transcript attribute value, including the corpus language fallback.
pub(super) fn transcript_attribute(attribute: &str, field: Field, ag: &str) -> Fragment {
    let select = match field {
        Field::Id => "'t|' || attr.layer || '|' || attr.annotation_id",
        Field::Annotator => "attr.annotated_by",
        Field::Confidence => "attr.label_status",
        _ => "attr.label",
    };
    let value = Subquery::new(select, "annotation_transcript attr")
        .condition(format!("attr.ag_id = {}", ag))
        .bound("attr.layer = ?", attribute)
        .first("attr.annotation_id")
        .render();
    if attribute != LANGUAGE_ATTRIBUTE || !matches!(field, Field::Id | Field::Label) {
        return value;
    }
    let fallback = if field == Field::Id {
        Fragment::new("'t|language|0'")
    } else {
        transcript_subquery(
            "c.corpus_language",
            " INNER JOIN corpus c ON c.corpus_name = tx.corpus_name",
            ag,
        )
        .render()
    };
    let mut coalesced = Fragment::new("COALESCE(");
    coalesced.push(&value);
    coalesced.push_str(", ");
    coalesced.push(&fallback);
    coalesced.push_str(")");
    coalesced
}

/// Scalar operand of a graph-level layer, or `None` if `layer` is not one.
pub(super) fn graph_scalar(layer: &Layer, field: Field, ag: &str) -> Option<Result<Fragment, String>> {
    let result = match &layer.kind {
        LayerKind::Corpus => id_or_label(layer, field).map(|is_id| {
            let select = if is_id {
                meta_id(CORPUS_LAYER_ID, "tx.corpus_name")
            } else {
                "tx.corpus_name".to_string()
            };
            transcript_subquery(&select, "", ag).render()
        }),
        LayerKind::Episode => id_or_label(layer, field).map(|is_id| {
            let select = if is_id {
                meta_id(EPISODE_LAYER_ID, "f.family_id")
            } else {
                "f.name".to_string()
            };
            transcript_subquery(
                &select,
                " INNER JOIN transcript_family f ON f.family_id = tx.family_id",
                ag,
            )
            .render()
        }),
        LayerKind::TranscriptType => id_or_label(layer, field).map(|is_id| {
            let select = if is_id {
                meta_id(TRANSCRIPT_TYPE_LAYER_ID, "tt.type_id")
            } else {
                "tt.transcript_type".to_string()
            };
            transcript_subquery(
                &select,
                " INNER JOIN transcript_type tt ON tt.type_id = tx.type_id",
                ag,
            )
            .render()
        }),
        LayerKind::TranscriptAttribute { attribute } => match field {
            Field::Anchor(..) | Field::Ordinal => Err(format!(
                "Only id, label, annotator and confidence can be used with layer '{}'",
                layer.id
            )),
            _ => Ok(transcript_attribute(attribute, field, ag)),
        },
        LayerKind::Temporal {
            layer_id,
            scope: Scope::Episode,
        } => episode_tag(layer, *layer_id, field, ag)
            .map(|query| query.first("other.ordinal").render()),
        _ => return None,
    };
    Some(result)
}

/// Annotations on an episode-scope layer belonging to the current graph's
/// episode.
fn episode_tag(layer: &Layer, layer_id: i64, field: Field, ag: &str) -> Result<Subquery, String> {
    let select = temporal_select(layer, Scope::Episode, layer_id, field, "other")?;
    Ok(Subquery::new(
        select,
        format!(
            "{} other INNER JOIN transcript tx ON tx.family_id = other.family_id",
            layer_table(layer_id)
        ),
    )
    .condition(format!("tx.ag_id = {}", ag)))
}

/// Column expression for `field` of a temporal annotation aliased `alias`.
pub(super) fn temporal_select(
    layer: &Layer,
    scope: Scope,
    layer_id: i64,
    field: Field,
    alias: &str,
) -> Result<String, String> {
    Ok(match field {
        Field::Id => format!(
            "CONCAT({}, {}.annotation_id)",
            quote_sql_literal(&AnnotationId::prefix(scope, layer_id)),
            alias
        ),
        Field::Label if layer.labels_are_participants() => format!(
            "(SELECT sp.name FROM speaker sp WHERE sp.speaker_number = {}.label)",
            alias
        ),
        Field::Label => format!("{}.label", alias),
        Field::Ordinal => format!("{}.ordinal", alias),
        Field::Annotator => format!("{}.annotated_by", alias),
        Field::Confidence => format!("{}.label_status", alias),
        Field::Anchor(..) => {
            return Err(format!(
                "Only the anchors of the matched annotation can be used, not those of '{}'",
                layer.id
            ));
        }
    })
}

fn collection_field(kind: CollectionKind) -> Field {
    match kind {
        CollectionKind::Labels => Field::Label,
        CollectionKind::List => Field::Id,
        CollectionKind::Annotators => Field::Annotator,
    }
}

/// Finish a collection subquery: list the values, or count them for
/// `.length`.
pub(super) fn finish_collection(mut query: Subquery, kind: CollectionKind, count: bool) -> Fragment {
    let distinct = kind == CollectionKind::Annotators;
    if count {
        return query.counted(distinct).render();
    }
    if distinct {
        query.select = format!("DISTINCT {}", query.select);
    }
    query.render()
}

/// Collection over a layer that hangs off the graph: participants,
/// attributes, corpus/episode/type, and temporal layers taken over the
/// whole transcript.
pub(super) fn graph_collection(
    layer: &Layer,
    kind: CollectionKind,
    count: bool,
    ag: &str,
) -> Result<Fragment, String> {
    let field = collection_field(kind);
    let query = match &layer.kind {
        LayerKind::Participant | LayerKind::MainParticipant => {
            let prefix_layer = if layer.kind == LayerKind::Participant {
                PARTICIPANT_LAYER_ID
            } else {
                MAIN_PARTICIPANT_LAYER_ID
            };
            let select = match field {
                Field::Id => meta_id(prefix_layer, "sp.speaker_number"),
                Field::Label => "sp.name".to_string(),
                _ => return Err(format!("annotators() is not available for layer '{}'", layer.id)),
            };
            let mut query = Subquery::new(
                select,
                "transcript_speaker ts INNER JOIN speaker sp ON sp.speaker_number = ts.speaker_number",
            )
            .condition(format!("ts.ag_id = {}", ag));
            if layer.kind == LayerKind::MainParticipant {
                query = query.condition("ts.main_speaker <> 0");
            }
            query
        }
        LayerKind::ParticipantAttribute { attribute } => {
            let select = match field {
                Field::Id => "'p|' || attr.layer || '|' || attr.annotation_id",
                Field::Label => "attr.label",
                _ => "attr.annotated_by",
            };
            Subquery::new(
                select,
                "annotation_participant attr INNER JOIN transcript_speaker ts \
                 ON ts.speaker_number = attr.speaker_number",
            )
            .condition(format!("ts.ag_id = {}", ag))
            .bound("attr.layer = ?", attribute.as_str())
        }
        LayerKind::TranscriptAttribute { attribute } => {
            let select = match field {
                Field::Id => "'t|' || attr.layer || '|' || attr.annotation_id",
                Field::Label => "attr.label",
                _ => "attr.annotated_by",
            };
            Subquery::new(select, "annotation_transcript attr")
                .condition(format!("attr.ag_id = {}", ag))
                .bound("attr.layer = ?", attribute.as_str())
        }
        LayerKind::Corpus | LayerKind::Episode | LayerKind::TranscriptType => {
            let scalar = graph_scalar(layer, field, ag).unwrap_or_else(|| {
                Err(format!("Unsupported collection over layer '{}'", layer.id))
            })?;
            if count {
                let mut counted = Fragment::new("(CASE WHEN ");
                counted.push(&scalar);
                counted.push_str(" IS NULL THEN 0 ELSE 1 END)");
                return Ok(counted);
            }
            return Ok(scalar);
        }
        LayerKind::Temporal {
            layer_id,
            scope: Scope::Episode,
        } => episode_tag(layer, *layer_id, field, ag)?,
        LayerKind::Temporal { layer_id, scope } => {
            let select = temporal_select(layer, *scope, *layer_id, field, "other")?;
            Subquery::new(select, format!("{} other", layer_table(*layer_id)))
                .condition(format!("other.ag_id = {}", ag))
        }
    };
    Ok(finish_collection(query, kind, count))
}
