//! SQLite DDL compiler.
//!
//! Generates `CREATE TABLE IF NOT EXISTS` statements from schema definitions.
//! Output is deterministic so it can be compared in tests.

use crate::db::schema::definition::{SchemaField, SchemaRelation};
use crate::db::schema::relations::{layer_value_fields, LAYER_KEY_FIELDS};
use crate::layers::{layer_table, Scope};

/// Compiler for generating SQLite DDL from schema definitions.
pub struct SqliteCompiler;

impl SqliteCompiler {
    fn compile_column(field: &SchemaField, primary: Option<&str>) -> String {
        let mut column = format!("    \"{}\" {}", field.name, field.data_type.sqlite_type());
        if let Some(primary) = primary {
            column.push(' ');
            column.push_str(primary);
            return column;
        }
        if !field.nullable {
            column.push_str(" NOT NULL");
        }
        if let Some(default) = field.default {
            column.push_str(" DEFAULT ");
            column.push_str(default);
        }
        column
    }

    fn compile_table<'a>(
        name: &str,
        key_fields: &[SchemaField],
        value_fields: impl Iterator<Item = &'a SchemaField>,
        autoincrement: bool,
        unique: &[&str],
    ) -> String {
        let mut columns = Vec::new();
        let single_key = key_fields.len() == 1;
        for field in key_fields {
            let primary = match (single_key, autoincrement) {
                (true, true) => Some("PRIMARY KEY AUTOINCREMENT"),
                (true, false) => Some("PRIMARY KEY"),
                _ => None,
            };
            columns.push(Self::compile_column(field, primary));
        }
        for field in value_fields {
            columns.push(Self::compile_column(field, None));
        }
        if !single_key {
            let keys: Vec<_> = key_fields
                .iter()
                .map(|f| format!("\"{}\"", f.name))
                .collect();
            columns.push(format!("    PRIMARY KEY ({})", keys.join(", ")));
        }
        for column in unique {
            columns.push(format!("    UNIQUE (\"{}\")", column));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            name,
            columns.join(",\n")
        )
    }

    /// DDL for one fixed relation.
    pub fn compile_relation(relation: &SchemaRelation) -> String {
        Self::compile_table(
            relation.name,
            relation.key_fields,
            relation.value_fields.iter(),
            relation.autoincrement,
            relation.unique,
        )
    }

    pub fn compile_all(relations: &[&SchemaRelation]) -> Vec<String> {
        relations
            .iter()
            .map(|rel| Self::compile_relation(rel))
            .collect()
    }

    /// DDL for the `annotation_layer_{layer_id}` table of a layer at `scope`,
    /// followed by its lookup indexes.
    pub fn compile_layer_table(layer_id: i64, scope: Scope) -> String {
        let name = layer_table(layer_id);
        let fields = layer_value_fields(scope);
        let mut ddl = Self::compile_table(
            &name,
            LAYER_KEY_FIELDS,
            fields.iter().copied(),
            true,
            &[],
        );
        ddl.push_str(";\n");
        let mut indexed = vec!["ag_id", "parent_id"];
        if scope == Scope::Episode {
            indexed.push("family_id");
        }
        if let Some(key) = scope.join_key() {
            indexed.push(key);
        }
        for column in indexed {
            ddl.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{name}_{column} ON {name} (\"{column}\");\n"
            ));
        }
        ddl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::relations::{ANCHOR, TRANSCRIPT_SPEAKER};
    use rstest::rstest;

    #[rstest]
    fn test_autoincrement_relation() {
        let ddl = SqliteCompiler::compile_relation(&ANCHOR);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS anchor (\n"));
        assert!(ddl.contains("\"anchor_id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(ddl.contains("\"offset\" REAL,"));
        assert!(ddl.contains("\"alignment_status\" INTEGER NOT NULL DEFAULT 0"));
    }

    #[rstest]
    fn test_composite_key_relation() {
        let ddl = SqliteCompiler::compile_relation(&TRANSCRIPT_SPEAKER);
        assert!(ddl.contains("PRIMARY KEY (\"ag_id\", \"speaker_number\")"));
        assert!(ddl.contains("\"ag_id\" INTEGER NOT NULL,"));
    }

    #[rstest]
    fn test_layer_table_word_scope() {
        let ddl = SqliteCompiler::compile_layer_table(0, Scope::Word);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS annotation_layer_0"));
        assert!(ddl.contains("\"word_annotation_id\" INTEGER"));
        assert!(!ddl.contains("segment_annotation_id"));
        assert!(ddl.contains("idx_annotation_layer_0_word_annotation_id"));
    }
}
