//! How an annotation on the primary layer finds related annotations on
//! another temporal layer.
//!
//! The two layers share the denormalized key of the coarser of their scopes:
//!
//! | Coarser scope | Shared key |
//! |---------------|------------|
//! | Segment | `segment_annotation_id` |
//! | Word | `word_annotation_id` |
//! | Meta | `turn_annotation_id` |
//! | Freeform / Episode | none (same transcript only) |
//!
//! A word-level key pins the relation down exactly. A turn-level key or no
//! key only narrows it, so when the scopes differ the annotations must also
//! overlap in time, which needs the primary annotation's anchors. Only then
//! are the related annotations ordered by offset; otherwise they are peers
//! under one word or turn and ordinal order applies.

use crate::layers::{layer_table, Scope};

use super::operands::Subquery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Relation {
    /// Denormalized key column both tables carry.
    pub key: Option<&'static str>,
    /// Require temporal overlap with the primary annotation.
    pub overlap: bool,
}

impl Relation {
    pub fn between(primary: Scope, other: Scope) -> Self {
        let shared = primary.min(other);
        Self {
            key: shared.join_key(),
            overlap: primary != other
                && matches!(shared, Scope::Freeform | Scope::Episode | Scope::Meta),
        }
    }

    /// Ordering that picks the first related annotation: earliest start and,
    /// among equal starts, the longest span when matching by overlap;
    /// ordinal otherwise.
    pub fn first_order(&self) -> &'static str {
        if self.overlap {
            "other_start.offset ASC, other_end.offset DESC"
        } else {
            "other.ordinal"
        }
    }

    /// Annotations on layer `layer_id` related to the primary annotation
    /// aliased `annotation`, selecting `select` from alias `other`.
    pub fn subquery(&self, layer_id: i64, select: &str) -> Subquery {
        let mut from = format!("{} other", layer_table(layer_id));
        if self.overlap {
            from.push_str(&anchor_joins("other", "other_start", "other_end"));
        }
        let mut query = Subquery::new(select, from).condition("other.ag_id = annotation.ag_id");
        if let Some(key) = self.key {
            query = query.condition(format!("other.{key} = annotation.{key}"));
        }
        if self.overlap {
            query = query.condition(
                "other_start.offset <= end.offset AND start.offset <= other_end.offset",
            );
        }
        query
    }

    /// LEFT OUTER JOIN bringing in the first related annotation as `alias`.
    pub fn first_join(&self, layer_id: i64, alias: &str) -> String {
        let first = self
            .subquery(layer_id, "other.annotation_id")
            .first(self.first_order())
            .render();
        format!(
            " LEFT OUTER JOIN {} {} ON {}.annotation_id = {}",
            layer_table(layer_id),
            alias,
            alias,
            first.sql
        )
    }
}

/// `INNER JOIN anchor` pair for the start and end of `annotation_alias`.
pub(super) fn anchor_joins(annotation_alias: &str, start: &str, end: &str) -> String {
    format!(
        " INNER JOIN anchor {start} ON {start}.anchor_id = {a}.start_anchor_id \
         INNER JOIN anchor {end} ON {end}.anchor_id = {a}.end_anchor_id",
        a = annotation_alias
    )
}
