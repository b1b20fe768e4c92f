//! Table definitions for the annotation store.
//!
//! The fixed tables are constants; per-layer `annotation_layer_{N}` tables
//! are assembled from the field groups at the bottom according to scope.

use super::definition::{DataType, SchemaField, SchemaRelation};
use crate::layers::Scope;

/// Layer metadata, one row per temporal layer.
pub const LAYER: SchemaRelation = SchemaRelation {
    name: "layer",
    key_fields: &[SchemaField::required("layer_id", DataType::Int)],
    value_fields: &[
        SchemaField::required("short_description", DataType::String),
        SchemaField::defaulted("description", DataType::String, "''"),
        SchemaField::optional("parent_id", DataType::Int),
        SchemaField::required("scope", DataType::String),
        SchemaField::defaulted("alignment", DataType::Int, "0"),
        SchemaField::defaulted("peers", DataType::Bool, "0"),
        SchemaField::defaulted("peers_overlap", DataType::Bool, "0"),
        SchemaField::defaulted("parent_includes", DataType::Bool, "1"),
        SchemaField::defaulted("saturated", DataType::Bool, "1"),
        SchemaField::defaulted("type", DataType::String, "'string'"),
    ],
    autoincrement: false,
    unique: &["short_description"],
};

/// Closed vocabularies of temporal layers.
pub const LAYER_LABEL: SchemaRelation = SchemaRelation {
    name: "layer_label",
    key_fields: &[
        SchemaField::required("layer_id", DataType::Int),
        SchemaField::required("value", DataType::String),
    ],
    value_fields: &[SchemaField::defaulted("description", DataType::String, "''")],
    autoincrement: false,
    unique: &[],
};

/// Transcript and participant attribute definitions.
///
/// `class_id` is `transcript` or `speaker`.
pub const ATTRIBUTE_DEFINITION: SchemaRelation = SchemaRelation {
    name: "attribute_definition",
    key_fields: &[
        SchemaField::required("class_id", DataType::String),
        SchemaField::required("attribute", DataType::String),
    ],
    value_fields: &[
        SchemaField::defaulted("label", DataType::String, "''"),
        SchemaField::defaulted("description", DataType::String, "''"),
        SchemaField::defaulted("type", DataType::String, "'string'"),
        SchemaField::defaulted("peers", DataType::Bool, "0"),
        SchemaField::defaulted("display_order", DataType::Int, "0"),
    ],
    autoincrement: false,
    unique: &[],
};

/// Closed vocabularies of attributes.
pub const ATTRIBUTE_OPTION: SchemaRelation = SchemaRelation {
    name: "attribute_option",
    key_fields: &[
        SchemaField::required("class_id", DataType::String),
        SchemaField::required("attribute", DataType::String),
        SchemaField::required("value", DataType::String),
    ],
    value_fields: &[SchemaField::defaulted("description", DataType::String, "''")],
    autoincrement: false,
    unique: &[],
};

pub const CORPUS: SchemaRelation = SchemaRelation {
    name: "corpus",
    key_fields: &[SchemaField::required("corpus_id", DataType::Int)],
    value_fields: &[
        SchemaField::required("corpus_name", DataType::String),
        SchemaField::optional("corpus_language", DataType::String),
        SchemaField::defaulted("corpus_description", DataType::String, "''"),
    ],
    autoincrement: true,
    unique: &["corpus_name"],
};

/// Episodes: groups of transcripts recorded together.
pub const TRANSCRIPT_FAMILY: SchemaRelation = SchemaRelation {
    name: "transcript_family",
    key_fields: &[SchemaField::required("family_id", DataType::Int)],
    value_fields: &[SchemaField::required("name", DataType::String)],
    autoincrement: true,
    unique: &["name"],
};

pub const TRANSCRIPT_TYPE: SchemaRelation = SchemaRelation {
    name: "transcript_type",
    key_fields: &[SchemaField::required("type_id", DataType::Int)],
    value_fields: &[SchemaField::required("transcript_type", DataType::String)],
    autoincrement: true,
    unique: &["transcript_type"],
};

/// Transcripts. `ag_id` is the numeric key every layer table refers to.
pub const TRANSCRIPT: SchemaRelation = SchemaRelation {
    name: "transcript",
    key_fields: &[SchemaField::required("ag_id", DataType::Int)],
    value_fields: &[
        SchemaField::required("transcript_id", DataType::String),
        SchemaField::optional("corpus_name", DataType::String),
        SchemaField::optional("family_id", DataType::Int),
        SchemaField::optional("type_id", DataType::Int),
        SchemaField::defaulted("family_sequence", DataType::Int, "0"),
        SchemaField::defaulted("family_offset", DataType::Float, "0"),
        SchemaField::optional("annotated_by", DataType::String),
        SchemaField::optional("update_date", DataType::String),
    ],
    autoincrement: true,
    unique: &["transcript_id"],
};

pub const SPEAKER: SchemaRelation = SchemaRelation {
    name: "speaker",
    key_fields: &[SchemaField::required("speaker_number", DataType::Int)],
    value_fields: &[SchemaField::required("name", DataType::String)],
    autoincrement: true,
    unique: &["name"],
};

/// Participants of each transcript.
pub const TRANSCRIPT_SPEAKER: SchemaRelation = SchemaRelation {
    name: "transcript_speaker",
    key_fields: &[
        SchemaField::required("ag_id", DataType::Int),
        SchemaField::required("speaker_number", DataType::Int),
    ],
    value_fields: &[
        SchemaField::defaulted("name", DataType::String, "''"),
        SchemaField::defaulted("main_speaker", DataType::Bool, "0"),
    ],
    autoincrement: false,
    unique: &[],
};

/// Timeline points shared by annotations.
pub const ANCHOR: SchemaRelation = SchemaRelation {
    name: "anchor",
    key_fields: &[SchemaField::required("anchor_id", DataType::Int)],
    value_fields: &[
        SchemaField::required("ag_id", DataType::Int),
        SchemaField::optional("offset", DataType::Float),
        SchemaField::defaulted("alignment_status", DataType::Int, "0"),
        SchemaField::optional("annotated_by", DataType::String),
        SchemaField::optional("annotated_when", DataType::String),
    ],
    autoincrement: true,
    unique: &[],
};

/// Transcript attribute values; `layer` holds the attribute name.
pub const ANNOTATION_TRANSCRIPT: SchemaRelation = SchemaRelation {
    name: "annotation_transcript",
    key_fields: &[SchemaField::required("annotation_id", DataType::Int)],
    value_fields: &[
        SchemaField::required("ag_id", DataType::Int),
        SchemaField::required("layer", DataType::String),
        SchemaField::defaulted("label", DataType::String, "''"),
        SchemaField::defaulted("label_status", DataType::Int, "0"),
        SchemaField::optional("annotated_by", DataType::String),
        SchemaField::optional("annotated_when", DataType::String),
    ],
    autoincrement: true,
    unique: &[],
};

/// Participant attribute values; `layer` holds the attribute name.
pub const ANNOTATION_PARTICIPANT: SchemaRelation = SchemaRelation {
    name: "annotation_participant",
    key_fields: &[SchemaField::required("annotation_id", DataType::Int)],
    value_fields: &[
        SchemaField::required("speaker_number", DataType::Int),
        SchemaField::required("layer", DataType::String),
        SchemaField::defaulted("label", DataType::String, "''"),
        SchemaField::defaulted("label_status", DataType::Int, "0"),
        SchemaField::optional("annotated_by", DataType::String),
        SchemaField::optional("annotated_when", DataType::String),
    ],
    autoincrement: true,
    unique: &[],
};

/// Every fixed table, in creation order.
pub const ALL_RELATIONS: &[&SchemaRelation] = &[
    &LAYER,
    &LAYER_LABEL,
    &ATTRIBUTE_DEFINITION,
    &ATTRIBUTE_OPTION,
    &CORPUS,
    &TRANSCRIPT_FAMILY,
    &TRANSCRIPT_TYPE,
    &TRANSCRIPT,
    &SPEAKER,
    &TRANSCRIPT_SPEAKER,
    &ANCHOR,
    &ANNOTATION_TRANSCRIPT,
    &ANNOTATION_PARTICIPANT,
];

pub const LAYER_KEY_FIELDS: &[SchemaField] = &[SchemaField::required("annotation_id", DataType::Int)];

/// Columns every `annotation_layer_{N}` table carries.
pub const LAYER_BASE_FIELDS: &[SchemaField] = &[
    SchemaField::optional("ag_id", DataType::Int),
    SchemaField::defaulted("label", DataType::String, "''"),
    SchemaField::defaulted("label_status", DataType::Int, "0"),
    SchemaField::optional("start_anchor_id", DataType::Int),
    SchemaField::optional("end_anchor_id", DataType::Int),
    SchemaField::optional("parent_id", DataType::Int),
    SchemaField::defaulted("ordinal", DataType::Int, "1"),
    SchemaField::optional("annotated_by", DataType::String),
    SchemaField::optional("annotated_when", DataType::String),
];

const EPISODE_FIELDS: &[SchemaField] = &[SchemaField::optional("family_id", DataType::Int)];

const META_FIELDS: &[SchemaField] = &[SchemaField::optional("turn_annotation_id", DataType::Int)];

const WORD_FIELDS: &[SchemaField] = &[
    SchemaField::optional("ordinal_in_turn", DataType::Int),
    SchemaField::optional("word_annotation_id", DataType::Int),
];

const SEGMENT_FIELDS: &[SchemaField] = &[
    SchemaField::optional("ordinal_in_word", DataType::Int),
    SchemaField::optional("segment_annotation_id", DataType::Int),
];

/// Value columns of a layer table at `scope`.
///
/// Each finer scope adds to the denormalized keys of the coarser one.
pub fn layer_value_fields(scope: Scope) -> Vec<&'static SchemaField> {
    let extra: &[&'static [SchemaField]] = match scope {
        Scope::Freeform => &[],
        Scope::Episode => &[EPISODE_FIELDS],
        Scope::Meta => &[META_FIELDS],
        Scope::Word => &[META_FIELDS, WORD_FIELDS],
        Scope::Segment => &[META_FIELDS, WORD_FIELDS, SEGMENT_FIELDS],
    };
    LAYER_BASE_FIELDS
        .iter()
        .chain(extra.iter().copied().flatten())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Scope::Freeform, &[][..])]
    #[case(Scope::Meta, &["turn_annotation_id"][..])]
    #[case(Scope::Word, &["turn_annotation_id", "ordinal_in_turn", "word_annotation_id"][..])]
    #[case(
        Scope::Segment,
        &["turn_annotation_id", "ordinal_in_turn", "word_annotation_id", "ordinal_in_word", "segment_annotation_id"][..]
    )]
    #[case(Scope::Episode, &["family_id"][..])]
    fn test_layer_value_fields(#[case] scope: Scope, #[case] extra: &[&str]) {
        let names: Vec<_> = layer_value_fields(scope).iter().map(|f| f.name).collect();
        assert_eq!(&names[..LAYER_BASE_FIELDS.len()], &[
            "ag_id",
            "label",
            "label_status",
            "start_anchor_id",
            "end_anchor_id",
            "parent_id",
            "ordinal",
            "annotated_by",
            "annotated_when"
        ]);
        assert_eq!(&names[LAYER_BASE_FIELDS.len()..], extra);
    }

    #[rstest]
    fn test_all_relations_have_keys() {
        for relation in ALL_RELATIONS {
            assert!(!relation.key_fields.is_empty(), "{} has no key", relation.name);
        }
        assert_eq!(ALL_RELATIONS.len(), 13);
    }
}
