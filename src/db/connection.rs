//! SQLite implementation of [`Database`].

use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use super::{Database, DbError, QueryResult, SqlValue};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single owned SQLite connection.
pub struct SqliteDatabase {
    conn: Connection,
    writes: Cell<usize>,
}

impl SqliteDatabase {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        info!(path = %path.display(), "Opening SQLite database");
        let conn = Connection::open(path).map_err(|e| DbError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let db = Self::wrap(conn)?;
        db.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Ok(db)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::OpenFailed {
            path: ":memory:".to_string(),
            message: e.to_string(),
        })?;
        Self::wrap(conn)
    }

    fn wrap(conn: Connection) -> Result<Self, DbError> {
        register_regexp(&conn).map_err(|e| DbError::OpenFailed {
            path: conn.path().unwrap_or(":memory:").to_string(),
            message: format!("cannot register REGEXP: {}", e),
        })?;
        let db = Self {
            conn,
            writes: Cell::new(0),
        };
        db.execute_batch("PRAGMA temp_store = MEMORY;")?;
        Ok(db)
    }

    fn failed(sql: &str, e: rusqlite::Error) -> DbError {
        DbError::QueryFailed {
            sql: sql.to_string(),
            message: e.to_string(),
        }
    }
}

/// Provide `X REGEXP Y`, which SQLite parses but does not implement.
///
/// Patterns are compiled once per statement via auxiliary data. Null
/// subjects never match.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |pattern| -> Result<_, BoxError> {
                Ok(Regex::new(pattern.as_str()?)?)
            })?;
            let subject = match ctx.get_raw(1) {
                ValueRef::Null => return Ok(false),
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
            };
            Ok(regex.is_match(&subject))
        },
    )
}

impl Database for SqliteDatabase {
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, DbError> {
        debug!(sql, params = ?params, "query");
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| Self::failed(sql, e))?;
        let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = headers.len();
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|e| Self::failed(sql, e))?;

        let mut result = QueryResult {
            headers,
            rows: Vec::new(),
        };
        while let Some(row) = rows.next().map_err(|e| Self::failed(sql, e))? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let value = row.get_ref(i).map_err(|e| Self::failed(sql, e))?;
                values.push(SqlValue::from(value));
            }
            result.rows.push(values);
        }
        Ok(result)
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, DbError> {
        debug!(sql, params = ?params, "execute");
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| Self::failed(sql, e))?;
        let changed = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(|e| Self::failed(sql, e))?;
        self.writes.set(self.writes.get() + 1);
        Ok(changed)
    }

    fn insert(&self, sql: &str, params: &[SqlValue]) -> Result<i64, DbError> {
        self.execute(sql, params)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| Self::failed(sql, e))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn relation_exists(&self, name: &str) -> Result<bool, DbError> {
        let count = self.query_i64(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[SqlValue::from(name)],
        )?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn statements_written(&self) -> usize {
        self.writes.get()
    }
}

/// Open a database file behind the [`Database`] trait.
pub fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    Ok(Box::new(SqliteDatabase::open(path)?))
}

/// Open an in-memory database behind the [`Database`] trait.
pub fn open_mem_db() -> Result<Box<dyn Database>, DbError> {
    Ok(Box::new(SqliteDatabase::open_in_memory()?))
}
