//! AGQL to SQL translation.
//!
//! # Architecture
//!
//! 1. **Shortcuts** (`shortcuts.rs`): a few frequent expression shapes are
//!    recognised on the raw text and mapped straight to hand-written SQL
//! 2. **Deduction** (`deducer.rs`): the primary layer, whose table goes in
//!    the FROM clause, is read off `id == ...` / `layer.id == ...` idioms
//! 3. **Compilation**: one compiler per primary-layer family walks the tree
//!    - `annotation.rs`: layers stored in `annotation_layer_{N}`
//!    - `participant.rs`: participant and main participant layers
//!    - `attribute.rs`: transcript and participant attribute layers
//!    - `transcript.rs`: whole transcripts
//!
//! All compilers share the operator handling in `condition.rs`, the
//! graph-level operands in `operands.rs` and the cross-layer join rules in
//! `joins.rs`.
//!
//! # Parameters
//!
//! Expression literals are re-quoted inline, so `label == "a"` and
//! `label = 'a'` produce identical SQL. Everything else that varies at run
//! time (attribute names, graph ids, the caller's access clause, limits) is a
//! positional `?` parameter, listed in [`CompiledQuery::params`] in the order
//! the placeholders appear.

mod annotation;
mod attribute;
mod condition;
mod deducer;
mod joins;
mod operands;
mod participant;
mod shortcuts;
mod transcript;


pub use deducer::deduce_primary_layer;

use thiserror::Error;
use tracing::debug;

use crate::agql::{parse, ParseError};
use crate::db::SqlValue;
use crate::layers::{LayerKind, Schema};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Could not identify the primary layer of '{0}'")]
    NoPrimaryLayer(String),

    #[error("Layer '{layer}' cannot be queried directly")]
    UnsupportedPrimaryLayer { layer: String },

    #[error("Invalid expression '{expression}': {}", .messages.join("; "))]
    Invalid {
        expression: String,
        messages: Vec<String>,
    },
}

impl CompileError {
    /// Individual problems reported by the compiler.
    pub fn messages(&self) -> Vec<String> {
        match self {
            CompileError::Invalid { messages, .. } => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Piece of SQL text with the values for its placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Append text and params.
    pub fn push(&mut self, other: &Fragment) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params.iter().cloned());
    }

    pub fn push_str(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }
}

/// What the SELECT list returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Uniform annotation rows: `annotation_id, label, label_status,
    /// start_anchor_id, end_anchor_id, parent_id, ordinal, annotated_by,
    /// annotated_when, transcript_id`.
    #[default]
    Annotations,
    /// Encoded ids only.
    Ids,
    /// `COUNT(*)`; no ORDER BY.
    Count,
    /// Caller-supplied select list.
    Columns(String),
}

/// Caller-supplied access-control condition, written against the `graph`
/// (transcript) alias.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clause {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Clause {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    fn fragment(&self) -> Fragment {
        Fragment::with_params(format!(" AND ({})", self.sql), self.params.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: i64,
    pub count: i64,
}

impl Limit {
    pub fn new(offset: i64, count: i64) -> Self {
        Self { offset, count }
    }

    fn fragment(&self) -> Fragment {
        Fragment::with_params(
            " LIMIT ? OFFSET ?",
            vec![self.count.into(), self.offset.into()],
        )
    }
}

/// A translated expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl From<Fragment> for CompiledQuery {
    fn from(fragment: Fragment) -> Self {
        Self {
            sql: fragment.sql,
            params: fragment.params,
        }
    }
}

/// Options shared by every compiler.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions<'a> {
    pub projection: Projection,
    pub access: Option<&'a Clause>,
    pub limit: Option<Limit>,
}

impl<'a> QueryOptions<'a> {
    pub fn new(projection: Projection) -> Self {
        Self {
            projection,
            access: None,
            limit: None,
        }
    }

    pub fn with_access(mut self, access: Option<&'a Clause>) -> Self {
        self.access = access;
        self
    }

    pub fn with_limit(mut self, limit: Option<Limit>) -> Self {
        self.limit = limit;
        self
    }

    /// Access clause, limit and ORDER BY tail shared by all compilers.
    fn tail(&self, where_sql: &mut Fragment, order_by: &str) {
        if let Some(access) = self.access {
            where_sql.push(&access.fragment());
        }
        if self.projection != Projection::Count {
            where_sql.push_str(" ORDER BY ");
            where_sql.push_str(order_by);
            if let Some(limit) = self.limit {
                where_sql.push(&limit.fragment());
            }
        }
    }
}

/// Translate an annotation-matching expression.
///
/// The primary layer is deduced from the expression; see
/// [`deduce_primary_layer`].
pub fn translate(
    schema: &Schema,
    expression: &str,
    options: &QueryOptions<'_>,
) -> Result<CompiledQuery, CompileError> {
    if let Some(query) = shortcuts::try_shortcut(schema, expression, options) {
        debug!(expression, sql = %query.sql, "shortcut query");
        return Ok(query);
    }

    let parsed = parse(expression)?;
    let primary = deduce_primary_layer(schema, &parsed)?;
    let query = match &primary.kind {
        LayerKind::Temporal { .. } => annotation::compile(schema, primary, &parsed, options)?,
        LayerKind::Participant | LayerKind::MainParticipant => {
            participant::compile(schema, primary, &parsed, options)?
        }
        LayerKind::TranscriptAttribute { .. } | LayerKind::ParticipantAttribute { .. } => {
            attribute::compile(schema, primary, &parsed, options)?
        }
        LayerKind::Episode | LayerKind::Corpus | LayerKind::TranscriptType => {
            return Err(CompileError::UnsupportedPrimaryLayer {
                layer: primary.id.clone(),
            });
        }
    };
    debug!(expression, layer = %primary.id, sql = %query.sql, "compiled query");
    Ok(query)
}

/// Translate a transcript-matching expression. Rows are transcripts; no
/// primary layer is involved.
pub fn translate_transcripts(
    schema: &Schema,
    expression: &str,
    options: &QueryOptions<'_>,
) -> Result<CompiledQuery, CompileError> {
    let parsed = parse(expression)?;
    let query = transcript::compile(schema, &parsed, options)?;
    debug!(expression, sql = %query.sql, "compiled transcript query");
    Ok(query)
}
