use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::error::SQLError;
use crate::traits::{Row, SQLExecutor, SQLStore, SQLTransaction, Value};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// It owns a fixed pool of connections. Each call checks one out, runs, and
/// releases it, so independent readers never share a connection.
pub struct SqliteStore {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path with a single connection.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        Self::open_pool(path, 1)
    }

    /// Open `size` connections to the database at `path`.
    pub fn open_pool(path: &Path, size: usize) -> Result<Self, SQLError> {
        if size == 0 {
            return Err(SQLError::Connection("pool size must be at least 1".into()));
        }
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path)
                .map_err(|e| SQLError::Connection(e.to_string()))?;

            // WAL lets pooled readers proceed while a writer is active.
            conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
                .map_err(|e| SQLError::Connection(e.to_string()))?;
            conn.busy_timeout(BUSY_TIMEOUT)
                .map_err(|e| SQLError::Connection(e.to_string()))?;
            conns.push(Mutex::new(conn));
        }
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    ///
    /// Every in-memory connection is a separate database, so the pool has
    /// exactly one connection.
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conns: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
        })
    }

    /// Take the first idle connection, starting from a rotating offset.
    /// Blocks on one connection when all are busy.
    fn checkout(&self) -> Result<MutexGuard<'_, Connection>, SQLError> {
        let n = self.conns.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;
        for i in 0..n {
            if let Ok(guard) = self.conns[(start + i) % n].try_lock() {
                return Ok(guard);
            }
        }
        self.conns[start]
            .lock()
            .map_err(|e| SQLError::Connection(e.to_string()))
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                columns.push((name.clone(), row_value_at(row, i)?));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn exec_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| SQLError::Execution(e.to_string()))?;

    Ok(affected as u64)
}

fn exec_batch_on(conn: &Connection, sql: &str) -> Result<(), SQLError> {
    conn.execute_batch(sql)
        .map_err(|e| SQLError::Execution(e.to_string()))
}

/// Extract a Value from a rusqlite row at a given column index,
/// following the storage class SQLite reports for the cell.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

impl SQLExecutor for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self.checkout()?;
        query_on(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self.checkout()?;
        exec_on(&conn, sql, params)
    }

    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        let conn = self.checkout()?;
        exec_batch_on(&conn, sql)
    }
}

impl SQLStore for SqliteStore {
    fn begin(&self) -> Result<Box<dyn SQLTransaction + '_>, SQLError> {
        let conn = self.checkout()?;
        conn.execute_batch("BEGIN")
            .map_err(|e| SQLError::Transaction(e.to_string()))?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    fn pool_size(&self) -> usize {
        self.conns.len()
    }
}

/// A transaction pinned to one pooled connection for its whole lifetime.
struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SQLExecutor for SqliteTransaction<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        query_on(&self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        exec_on(&self.conn, sql, params)
    }

    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        exec_batch_on(&self.conn, sql)
    }
}

impl SQLTransaction for SqliteTransaction<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), SQLError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| SQLError::Transaction(e.to_string()))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished || self.conn.is_autocommit() {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!(error = %e, "rollback failed");
        }
    }
}
