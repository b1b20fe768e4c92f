//! Database trait and the value type that crosses it.
//!
//! Everything above this module talks to the database through [`Database`],
//! passing positional parameters as [`SqlValue`]s and reading rows back as
//! [`QueryResult`]s. Driver types never leave the backend implementation.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};

use super::DbError;

/// A single bound parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Int(i),
            ValueRef::Real(f) => SqlValue::Float(f),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                SqlValue::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }
}

/// Rows returned by a query, with their column names.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column.
    pub fn column(&self, name: &str) -> Result<usize, DbError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DbError::MissingColumn {
                name: name.to_string(),
            })
    }

    pub fn first_row(&self) -> Option<&[SqlValue]> {
        self.rows.first().map(Vec::as_slice)
    }
}

/// Operations the store needs from a relational engine.
///
/// Implementations own their connection exclusively; the trait is not
/// `Sync` and a store instance is meant to serve one request at a time.
pub trait Database {
    /// Run a statement that returns rows.
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, DbError>;

    /// Run a data-modifying statement, returning the number of rows changed.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, DbError>;

    /// Run an INSERT and return the new row id.
    fn insert(&self, sql: &str, params: &[SqlValue]) -> Result<i64, DbError>;

    /// Run one or more parameterless statements.
    fn execute_batch(&self, sql: &str) -> Result<(), DbError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Whether a table exists.
    fn relation_exists(&self, name: &str) -> Result<bool, DbError>;

    /// Number of data-modifying statements executed so far.
    fn statements_written(&self) -> usize;

    /// Run `ddl` unless `name` already exists. Returns true if created.
    fn try_create_relation(&self, name: &str, ddl: &str) -> Result<bool, DbError> {
        if self.relation_exists(name)? {
            return Ok(false);
        }
        self.execute_batch(ddl)?;
        Ok(true)
    }

    fn begin(&self) -> Result<(), DbError> {
        self.execute_batch("BEGIN")
    }

    fn commit(&self) -> Result<(), DbError> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&self) -> Result<(), DbError> {
        self.execute_batch("ROLLBACK")
    }

    /// First column of the first row as an integer, if any.
    fn query_i64(&self, sql: &str, params: &[SqlValue]) -> Result<Option<i64>, DbError> {
        let result = self.query(sql, params)?;
        Ok(result.first_row().and_then(|row| match row.first() {
            Some(SqlValue::Int(i)) => Some(*i),
            Some(SqlValue::Float(f)) => Some(*f as i64),
            Some(SqlValue::Text(s)) => s.parse().ok(),
            _ => None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_sql_value_conversions() {
        assert_eq!(SqlValue::from(3_i64), SqlValue::Int(3));
        assert_eq!(SqlValue::from(true), SqlValue::Int(1));
        assert_eq!(SqlValue::from("a"), SqlValue::Text("a".into()));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(1.5)), SqlValue::Float(1.5));
    }

    #[rstest]
    fn test_missing_column() {
        let result = QueryResult {
            headers: vec!["a".into()],
            rows: vec![],
        };
        assert_eq!(result.column("a").unwrap(), 0);
        assert!(matches!(
            result.column("b"),
            Err(DbError::MissingColumn { name }) if name == "b"
        ));
        assert!(result.is_empty());
    }
}
