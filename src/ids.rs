//! Composite identifier codec.
//!
//! Every object the store hands out carries a string identifier that packs
//! the storage coordinates of its row:
//!
//! | Object | Format | Example |
//! |--------|--------|---------|
//! | Temporal annotation | `e{scope}_{layerId}_{rowId}` | `ew_0_456` |
//! | Anchor | `n_{rowId}` | `n_17` |
//! | Meta entity | `m_{layerId}_{key}` | `m_-2_3`, `m_-100_CC` |
//! | Transcript attribute | `t\|{attribute}\|{rowId}` | `t\|language\|12` |
//! | Participant attribute | `p\|{attribute}\|{rowId}` | `p\|gender\|5` |
//!
//! The scope token of a temporal annotation is empty for freeform layers and
//! the lowercase scope code otherwise.
//!
//! # Type Decisions
//!
//! Row ids are `i64` because that is SQLite's rowid type. Meta entity keys
//! stay strings since corpora are keyed by name.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::layers::Scope;

static ANNOTATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^e([emws]?)_(\d+)_(\d+)$").unwrap());
static ANCHOR_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^n_(\d+)$").unwrap());
static META_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^m_(-?\d+)_(.+)$").unwrap());
static TRANSCRIPT_ATTRIBUTE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^t\|([^|]+)\|(\d+)$").unwrap());
static PARTICIPANT_ATTRIBUTE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^p\|([^|]+)\|(\d+)$").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("'{id}' is not a valid {kind} ID")]
    InvalidFormat { kind: &'static str, id: String },
}

fn invalid(kind: &'static str, id: &str) -> IdError {
    IdError::InvalidFormat {
        kind,
        id: id.to_string(),
    }
}

fn parse_number(kind: &'static str, id: &str, digits: &str) -> Result<i64, IdError> {
    digits.parse().map_err(|_| invalid(kind, id))
}

/// Identifier of a row in an `annotation_layer_{layerId}` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationId {
    pub scope: Scope,
    pub layer_id: i64,
    pub row_id: i64,
}

impl AnnotationId {
    pub fn new(scope: Scope, layer_id: i64, row_id: i64) -> Self {
        Self {
            scope,
            layer_id,
            row_id,
        }
    }

    /// The constant part of the id, everything before the row id.
    ///
    /// Query compilers concatenate this with `annotation_id` to rebuild ids
    /// inside SQL.
    pub fn prefix(scope: Scope, layer_id: i64) -> String {
        format!("e{}_{}_", scope.id_token(), layer_id)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::prefix(self.scope, self.layer_id), self.row_id)
    }
}

impl FromStr for AnnotationId {
    type Err = IdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        const KIND: &str = "annotation";
        let caps = ANNOTATION_ID.captures(id).ok_or_else(|| invalid(KIND, id))?;
        let scope = Scope::from_id_token(&caps[1]).ok_or_else(|| invalid(KIND, id))?;
        Ok(Self {
            scope,
            layer_id: parse_number(KIND, id, &caps[2])?,
            row_id: parse_number(KIND, id, &caps[3])?,
        })
    }
}

/// Identifier of a row in the `anchor` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub i64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n_{}", self.0)
    }
}

impl FromStr for AnchorId {
    type Err = IdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let caps = ANCHOR_ID.captures(id).ok_or_else(|| invalid("anchor", id))?;
        Ok(Self(parse_number("anchor", id, &caps[1])?))
    }
}

/// Identifier of a structural entity: participant, corpus, episode or
/// transcript type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaId {
    pub layer_id: i64,
    pub key: String,
}

impl MetaId {
    pub fn new(layer_id: i64, key: impl Into<String>) -> Self {
        Self {
            layer_id,
            key: key.into(),
        }
    }

    pub fn prefix(layer_id: i64) -> String {
        format!("m_{}_", layer_id)
    }

    /// The key as a numeric row id, for entities keyed by number.
    pub fn numeric_key(&self) -> Result<i64, IdError> {
        self.key.parse().map_err(|_| invalid("meta", &self.to_string()))
    }
}

impl fmt::Display for MetaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::prefix(self.layer_id), self.key)
    }
}

impl FromStr for MetaId {
    type Err = IdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let caps = META_ID.captures(id).ok_or_else(|| invalid("meta", id))?;
        Ok(Self {
            layer_id: parse_number("meta", id, &caps[1])?,
            key: caps[2].to_string(),
        })
    }
}

/// Identifier of a row in `annotation_transcript`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranscriptAttributeId {
    pub attribute: String,
    pub row_id: i64,
}

impl TranscriptAttributeId {
    pub fn new(attribute: impl Into<String>, row_id: i64) -> Self {
        Self {
            attribute: attribute.into(),
            row_id,
        }
    }

    pub fn prefix(attribute: &str) -> String {
        format!("t|{}|", attribute)
    }
}

impl fmt::Display for TranscriptAttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::prefix(&self.attribute), self.row_id)
    }
}

impl FromStr for TranscriptAttributeId {
    type Err = IdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        const KIND: &str = "transcript attribute";
        let caps = TRANSCRIPT_ATTRIBUTE_ID
            .captures(id)
            .ok_or_else(|| invalid(KIND, id))?;
        Ok(Self {
            attribute: caps[1].to_string(),
            row_id: parse_number(KIND, id, &caps[2])?,
        })
    }
}

/// Identifier of a row in `annotation_participant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantAttributeId {
    pub attribute: String,
    pub row_id: i64,
}

impl ParticipantAttributeId {
    pub fn new(attribute: impl Into<String>, row_id: i64) -> Self {
        Self {
            attribute: attribute.into(),
            row_id,
        }
    }

    pub fn prefix(attribute: &str) -> String {
        format!("p|{}|", attribute)
    }
}

impl fmt::Display for ParticipantAttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::prefix(&self.attribute), self.row_id)
    }
}

impl FromStr for ParticipantAttributeId {
    type Err = IdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        const KIND: &str = "participant attribute";
        let caps = PARTICIPANT_ATTRIBUTE_ID
            .captures(id)
            .ok_or_else(|| invalid(KIND, id))?;
        Ok(Self {
            attribute: caps[1].to_string(),
            row_id: parse_number(KIND, id, &caps[2])?,
        })
    }
}

/// Any of the five identifier formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedId {
    Annotation(AnnotationId),
    Anchor(AnchorId),
    Meta(MetaId),
    TranscriptAttribute(TranscriptAttributeId),
    ParticipantAttribute(ParticipantAttributeId),
}

impl EncodedId {
    /// Decode `id` by trying each format in turn.
    pub fn parse(id: &str) -> Result<Self, IdError> {
        if let Ok(annotation) = id.parse() {
            return Ok(Self::Annotation(annotation));
        }
        if let Ok(anchor) = id.parse() {
            return Ok(Self::Anchor(anchor));
        }
        if let Ok(meta) = id.parse() {
            return Ok(Self::Meta(meta));
        }
        if let Ok(attribute) = id.parse() {
            return Ok(Self::TranscriptAttribute(attribute));
        }
        if let Ok(attribute) = id.parse() {
            return Ok(Self::ParticipantAttribute(attribute));
        }
        Err(invalid("encoded", id))
    }
}

impl fmt::Display for EncodedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodedId::Annotation(id) => id.fmt(f),
            EncodedId::Anchor(id) => id.fmt(f),
            EncodedId::Meta(id) => id.fmt(f),
            EncodedId::TranscriptAttribute(id) => id.fmt(f),
            EncodedId::ParticipantAttribute(id) => id.fmt(f),
        }
    }
}
