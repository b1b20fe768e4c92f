//! Core schema definition types.

/// Column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Int,
    Float,
    Bool,
}

impl DataType {
    /// SQLite type name (column affinity).
    pub fn sqlite_type(&self) -> &'static str {
        match self {
            DataType::String => "TEXT",
            DataType::Int => "INTEGER",
            DataType::Float => "REAL",
            DataType::Bool => "INTEGER",
        }
    }
}

/// A column in a relation.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: &'static str,
    pub data_type: DataType,
    /// Default as an SQL literal, e.g. `"0"` or `"''"`.
    pub default: Option<&'static str>,
    pub nullable: bool,
}

impl SchemaField {
    pub const fn required(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            default: None,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            default: None,
            nullable: true,
        }
    }

    pub const fn defaulted(name: &'static str, data_type: DataType, default: &'static str) -> Self {
        Self {
            name,
            data_type,
            default: Some(default),
            nullable: false,
        }
    }
}

/// A complete table.
#[derive(Debug, Clone)]
pub struct SchemaRelation {
    pub name: &'static str,
    /// Primary key columns.
    pub key_fields: &'static [SchemaField],
    pub value_fields: &'static [SchemaField],
    /// Single integer key allocated by the database.
    pub autoincrement: bool,
    /// Columns carrying a uniqueness constraint of their own.
    pub unique: &'static [&'static str],
}

impl SchemaRelation {
    pub fn all_fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.key_fields.iter().chain(self.value_fields.iter())
    }

    pub fn field_count(&self) -> usize {
        self.key_fields.len() + self.value_fields.len()
    }
}
