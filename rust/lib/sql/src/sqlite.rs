use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLConn, SQLStore, Value};

const UNIQUE_FAILED: &str = "UNIQUE constraint failed: ";

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// A single connection sits behind a mutex, so statements and whole
/// transactions from concurrent requests are serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL keeps readers from blocking on the writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        debug!("opened sqlite database at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SQLError> {
        self.conn
            .lock()
            .map_err(|e| SQLError::Connection(format!("connection lock poisoned: {}", e)))
    }
}

impl SQLConn for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self.lock()?;
        run_query(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self.lock()?;
        run_exec(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn transaction(
        &self,
        body: &mut dyn FnMut(&dyn SQLConn) -> Result<(), SQLError>,
    ) -> Result<(), SQLError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let outcome = body(&InTransaction { conn: &*tx });

        match outcome {
            Ok(()) => tx
                .commit()
                .map_err(|e| SQLError::Execution(e.to_string())),
            Err(e) => {
                debug!("rolling back transaction: {}", e);
                tx.rollback()
                    .map_err(|re| SQLError::Execution(re.to_string()))?;
                Err(e)
            }
        }
    }
}

/// Handle given to a transaction body. Borrows the already-locked connection.
struct InTransaction<'a> {
    conn: &'a Connection,
}

impl SQLConn for InTransaction<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        run_query(self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        run_exec(self.conn, sql, params)
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<&dyn rusqlite::types::ToSql> {
    params
        .iter()
        .map(|v| -> &dyn rusqlite::types::ToSql {
            match v {
                Value::Null => &rusqlite::types::Null,
                Value::Integer(i) => i,
                Value::Real(f) => f,
                Value::Text(s) => s,
                Value::Blob(b) => b,
            }
        })
        .collect()
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(bind_params(params).as_slice(), |row| {
            let mut columns = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                columns.push((name.clone(), row_value_at(row, i)?));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| SQLError::Query(e.to_string()))
}

fn run_exec(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| SQLError::Execution(e.to_string()))?;
    let affected = stmt
        .execute(bind_params(params).as_slice())
        .map_err(exec_error)?;
    Ok(affected as u64)
}

/// Surface UNIQUE violations as their own variant so callers can translate
/// them into conflicts.
fn exec_error(e: rusqlite::Error) -> SQLError {
    let msg = e.to_string();
    match msg.find(UNIQUE_FAILED) {
        Some(pos) => SQLError::Unique(msg[pos + UNIQUE_FAILED.len()..].to_string()),
        None => SQLError::Execution(msg),
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}
