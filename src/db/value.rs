//! Typed extraction from result cells.
//!
//! SQLite is loosely typed, so a column declared INTEGER may come back as
//! text and a label may come back as a number. The [`DatabaseValue`] trait
//! normalises that at the edge.

use std::fmt::Debug;

use super::SqlValue;

/// Trait for database values that can be extracted to Rust types.
pub trait DatabaseValue: Clone + Debug {
    /// Extract as String. Numbers are rendered; null is `None`.
    fn as_string(&self) -> Option<String>;

    /// Extract as i64. Floats are truncated, numeric text is parsed.
    fn as_i64(&self) -> Option<i64>;

    /// Extract as f64.
    fn as_f64(&self) -> Option<f64>;
}

impl DatabaseValue for SqlValue {
    fn as_string(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Float(f) => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::Float(f) => Some(*f),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }
}

/// Cell `index` of `row` as a string.
pub fn extract_string(row: &[SqlValue], index: usize) -> Option<String> {
    row.get(index).and_then(DatabaseValue::as_string)
}

/// Cell `index` of `row` as a string, or `default` when null or absent.
pub fn extract_string_or(row: &[SqlValue], index: usize, default: &str) -> String {
    extract_string(row, index).unwrap_or_else(|| default.to_string())
}

pub fn extract_i64(row: &[SqlValue], index: usize) -> Option<i64> {
    row.get(index).and_then(DatabaseValue::as_i64)
}

pub fn extract_f64(row: &[SqlValue], index: usize) -> Option<f64> {
    row.get(index).and_then(DatabaseValue::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SqlValue::Int(5), Some("5"), Some(5), Some(5.0))]
    #[case(SqlValue::Float(1.5), Some("1.5"), Some(1), Some(1.5))]
    #[case(SqlValue::Text("7".into()), Some("7"), Some(7), Some(7.0))]
    #[case(SqlValue::Text("abc".into()), Some("abc"), None, None)]
    #[case(SqlValue::Null, None, None, None)]
    fn test_extraction(
        #[case] value: SqlValue,
        #[case] string: Option<&str>,
        #[case] int: Option<i64>,
        #[case] float: Option<f64>,
    ) {
        assert_eq!(value.as_string().as_deref(), string);
        assert_eq!(value.as_i64(), int);
        assert_eq!(value.as_f64(), float);
    }

    #[rstest]
    fn test_row_helpers() {
        let row = vec![SqlValue::Int(1), SqlValue::Null];
        assert_eq!(extract_i64(&row, 0), Some(1));
        assert_eq!(extract_string(&row, 1), None);
        assert_eq!(extract_string_or(&row, 1, "-"), "-");
        assert_eq!(extract_f64(&row, 5), None);
    }
}
