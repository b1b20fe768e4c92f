//! Relational schema of the annotation store.
//!
//! # Overview
//!
//! 1. **Core Types** (`definition.rs`): `DataType`, `SchemaField`,
//!    `SchemaRelation`
//! 2. **Relation Definitions** (`relations.rs`): the fixed tables plus the
//!    per-scope column groups of `annotation_layer_{N}` tables
//! 3. **Compilers** (`compilers/`): SQLite DDL generation
//! 4. **Migrations** (`migrations.rs`): table creation and seeding of
//!    default layers, attributes, corpora and transcript types
//!
//! # Layer tables
//!
//! | Scope | Extra columns |
//! |-------|---------------|
//! | Freeform | none |
//! | Episode | `family_id` |
//! | Meta | `turn_annotation_id` |
//! | Word | + `ordinal_in_turn`, `word_annotation_id` |
//! | Segment | + `ordinal_in_word`, `segment_annotation_id` |

pub mod compilers;
mod definition;
pub mod migrations;
mod relations;

pub use definition::{DataType, SchemaField, SchemaRelation};
pub use migrations::{
    create_attribute, create_attribute_option, create_corpus, create_layer, create_layer_label,
    create_schema, create_transcript_type, default_layers, initialize, relation_names,
    LayerDefinition, SchemaCreationResult,
};
pub use relations::{layer_value_fields, ALL_RELATIONS};
