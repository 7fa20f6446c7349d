//! Session tuning and index maintenance around a bulk load.

use pcbtrace_records::schema::{SECONDARY_INDEXES, TABLE};
use pcbtrace_sql::{SQLError, SQLExecutor, Value};

/// Relax durability for the importing connection. Applies to this
/// session only.
pub fn tune_session<E: SQLExecutor + ?Sized>(sql: &E) -> Result<(), SQLError> {
    sql.exec_batch(
        "PRAGMA synchronous = OFF;
         PRAGMA temp_store = MEMORY;
         PRAGMA cache_size = -262144;",
    )
}

/// Names of every explicitly created index on the records table.
/// The primary key's automatic index is not included.
pub fn secondary_index_names<E: SQLExecutor + ?Sized>(sql: &E) -> Result<Vec<String>, SQLError> {
    let rows = sql.query(
        "SELECT name FROM sqlite_master
         WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL
         ORDER BY name",
        &[Value::from(TABLE)],
    )?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get_str("name").map(str::to_string))
        .collect())
}

/// Drop all secondary indexes before loading. Failures are logged and
/// the load proceeds. Returns the names actually dropped.
pub fn drop_secondary_indexes<E: SQLExecutor + ?Sized>(sql: &E) -> Vec<String> {
    let names = match secondary_index_names(sql) {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "could not list indexes, loading with indexes in place");
            return Vec::new();
        }
    };

    let mut dropped = Vec::with_capacity(names.len());
    for name in names {
        let stmt = format!("DROP INDEX IF EXISTS \"{}\"", name.replace('"', "\"\""));
        match sql.exec_batch(&stmt) {
            Ok(()) => {
                tracing::debug!(index = %name, "dropped index");
                dropped.push(name);
            }
            Err(e) => tracing::warn!(index = %name, error = %e, "could not drop index"),
        }
    }
    if !dropped.is_empty() {
        tracing::info!(count = dropped.len(), "dropped secondary indexes for bulk load");
    }
    dropped
}

/// Create the fixed secondary index set. Idempotent.
pub fn create_indexes<E: SQLExecutor + ?Sized>(sql: &E) -> Result<usize, SQLError> {
    for index in SECONDARY_INDEXES {
        sql.exec_batch(&index.create_sql())?;
        tracing::debug!(index = index.name, column = %index.field, "created index");
    }
    Ok(SECONDARY_INDEXES.len())
}

/// Reclaim space and refresh planner statistics. Must run outside a
/// transaction.
pub fn vacuum_analyze<E: SQLExecutor + ?Sized>(sql: &E) -> Result<(), SQLError> {
    sql.exec_batch("VACUUM")?;
    sql.exec_batch(&format!("ANALYZE {TABLE}"))
}
