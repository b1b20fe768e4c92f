//! Hand-written SQL for frequent expression shapes.
//!
//! These are matched on the raw text before parsing. Anything that does not
//! match exactly, or names a layer that does not fit, falls through to the
//! general compilers.

use std::sync::LazyLock;

use regex::Regex;

use crate::db::escape::{quote_sql_literal, unescape_literal};
use crate::ids::AnnotationId;
use crate::layers::{layer_table, Layer, Schema, Scope};

use super::annotation::select_list;
use super::attribute;
use super::joins::anchor_joins;
use super::{CompiledQuery, Fragment, QueryOptions};

static GRAPH_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*graph\.id\s*==?\s*['"](?P<graph>[^'"]+)['"]\s*&&\s*layer\.id\s*==?\s*['"](?P<layer>transcript_[^'"]+)['"]\s*$"#)
        .unwrap()
});
static ATTRIBUTE_GRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*layer\.id\s*==?\s*['"](?P<layer>transcript_[^'"]+)['"]\s*&&\s*graph\.id\s*==?\s*['"](?P<graph>[^'"]+)['"]\s*$"#)
        .unwrap()
});
static WORD_ANCHORED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*layer\.id\s*==?\s*['"](?P<layer>[^'"]+)['"]\s*&&\s*my\(\s*['"]word['"]\s*\)\.id\s*==?\s*['"](?P<word>ew_\d+_\d+)['"]\s*$"#)
        .unwrap()
});
static UTTERANCE_CONTAINING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*layer\.id\s*==?\s*['"]utterance['"]\s*&&\s*list\(\s*['"]word['"]\s*\)\.includes\(\s*['"](?P<word>ew_\d+_\d+)['"]\s*\)\s*$"#)
        .unwrap()
});

/// Hand-written query for `expression`, if it has one of the known shapes.
pub(super) fn try_shortcut(
    schema: &Schema,
    expression: &str,
    options: &QueryOptions<'_>,
) -> Option<CompiledQuery> {
    if let Some(caps) = GRAPH_ATTRIBUTE
        .captures(expression)
        .or_else(|| ATTRIBUTE_GRAPH.captures(expression))
    {
        let layer = schema.layer(&caps["layer"])?;
        return attribute::for_graph(schema, layer, &unescape_literal(&caps["graph"]), options);
    }
    if let Some(caps) = UTTERANCE_CONTAINING.captures(expression) {
        let word = word_row(schema, &caps["word"])?;
        return utterances_containing(schema, word, options);
    }
    if let Some(caps) = WORD_ANCHORED.captures(expression) {
        let word = word_row(schema, &caps["word"])?;
        let layer = schema.layer(&caps["layer"])?;
        return anchored_to_word(schema, layer, word, options);
    }
    None
}

/// Row id of an encoded word id, if it really is one.
fn word_row(schema: &Schema, id: &str) -> Option<i64> {
    let id: AnnotationId = id.parse().ok()?;
    let word = schema.word_layer()?.temporal()?;
    (id.scope == Scope::Word && id.layer_id == word.0).then_some(id.row_id)
}

/// Annotations of a word or segment scope layer sharing one word.
fn anchored_to_word(
    schema: &Schema,
    layer: &Layer,
    word_row: i64,
    options: &QueryOptions<'_>,
) -> Option<CompiledQuery> {
    let (layer_id, scope) = layer.temporal()?;
    if !matches!(scope, Scope::Word | Scope::Segment) {
        return None;
    }
    let projection = select_list(schema, layer, &options.projection)?;
    let mut sql = Fragment::new(format!(
        "SELECT {}, {} AS layer FROM {} annotation \
         INNER JOIN transcript graph ON graph.ag_id = annotation.ag_id \
         WHERE annotation.word_annotation_id = ?",
        projection,
        quote_sql_literal(&layer.id),
        layer_table(layer_id)
    ));
    sql.params.push(word_row.into());
    options.tail(
        &mut sql,
        "graph.transcript_id, annotation.parent_id, annotation.ordinal, annotation.annotation_id",
    );
    Some(sql.into())
}

/// Utterances in the same turn as one word that overlap it.
fn utterances_containing(
    schema: &Schema,
    word_row: i64,
    options: &QueryOptions<'_>,
) -> Option<CompiledQuery> {
    let utterance = schema.utterance_layer()?;
    let (utterance_id, _) = utterance.temporal()?;
    let (word_id, _) = schema.word_layer()?.temporal()?;
    let projection = select_list(schema, utterance, &options.projection)?;
    let mut sql = Fragment::new(format!(
        "SELECT {}, {} AS layer FROM {} word \
         INNER JOIN {} annotation ON annotation.turn_annotation_id = word.turn_annotation_id \
         INNER JOIN transcript graph ON graph.ag_id = annotation.ag_id{}{} \
         WHERE word.annotation_id = ? \
         AND word_start.offset <= end.offset AND start.offset <= word_end.offset",
        projection,
        quote_sql_literal(&utterance.id),
        layer_table(word_id),
        layer_table(utterance_id),
        anchor_joins("annotation", "start", "end"),
        anchor_joins("word", "word_start", "word_end"),
    ));
    sql.params.push(word_row.into());
    options.tail(
        &mut sql,
        "graph.transcript_id, start.offset, end.offset, annotation.parent_id, annotation.annotation_id",
    );
    Some(sql.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::Projection;
    use crate::test_utils::sample_schema;
    use rstest::rstest;

    fn shortcut(text: &str) -> Option<CompiledQuery> {
        try_shortcut(&sample_schema(), text, &QueryOptions::new(Projection::Ids))
    }

    #[rstest]
    #[case("graph.id == 'foo.trs' && layer.id == 'transcript_language'")]
    #[case("layer.id = \"transcript_language\" && graph.id = 'foo.trs'")]
    fn test_graph_attribute(#[case] text: &str) {
        let query = shortcut(text).unwrap();
        assert!(query.sql.contains("WHERE COALESCE(annotation.label, corpus.corpus_language) IS NOT NULL AND graph.transcript_id = ?"));
        assert_eq!(query.params, vec!["language".into(), "foo.trs".into()]);
    }

    #[rstest]
    fn test_word_anchored() {
        let query = shortcut("layer.id == 'pos' && my('word').id == 'ew_0_456'").unwrap();
        assert!(query.sql.starts_with("SELECT CONCAT('ew_30_', annotation.annotation_id) AS annotation_id, 'pos' AS layer FROM annotation_layer_30 annotation"));
        assert!(query.sql.contains("WHERE annotation.word_annotation_id = ?"));
        assert_eq!(query.params, vec![456_i64.into()]);
    }

    #[rstest]
    fn test_utterance_containing_word() {
        let query =
            shortcut("layer.id == 'utterance' && list('word').includes('ew_0_9')").unwrap();
        assert!(query.sql.contains("FROM annotation_layer_0 word INNER JOIN annotation_layer_12 annotation"));
        assert_eq!(query.params, vec![9_i64.into()]);
    }

    #[rstest]
    #[case("layer.id == 'turn' && my('word').id == 'ew_0_456'")]
    #[case("layer.id == 'pos' && my('word').id == 'es_1_456'")]
    #[case("layer.id == 'pos' && my('word').label == 'x'")]
    #[case("graph.id == 'a' && layer.id == 'transcript_nothing'")]
    fn test_falls_through(#[case] text: &str) {
        assert!(shortcut(text).is_none());
    }
}
