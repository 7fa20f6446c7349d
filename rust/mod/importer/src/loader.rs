//! Batched insert-if-absent of cleaned records.

use std::time::{Duration, Instant};

use pcbtrace_records::NewRecord;
use pcbtrace_records::schema::{Field, TABLE};
use pcbtrace_sql::{SQLError, SQLExecutor, Value};

pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Upper bound on rows per INSERT statement. Larger batches are split.
pub const MAX_ROWS_PER_STATEMENT: usize = 1000;

/// Reported after each batch is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub batches: usize,
    /// Rows sent to the database so far.
    pub written: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub elapsed: Duration,
    /// Inserted rows per second.
    pub rate: f64,
    /// Share of the expected row count already written, when known.
    pub percent: Option<f64>,
}

impl Progress {
    pub fn log(&self) {
        match self.percent {
            Some(pct) => tracing::info!(
                batch = self.batches,
                inserted = self.inserted,
                duplicates = self.duplicates,
                elapsed_secs = self.elapsed.as_secs_f64(),
                rate = self.rate.round() as u64,
                "progress {:.1}%",
                pct
            ),
            None => tracing::info!(
                batch = self.batches,
                inserted = self.inserted,
                duplicates = self.duplicates,
                elapsed_secs = self.elapsed.as_secs_f64(),
                rate = self.rate.round() as u64,
                "progress"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadTotals {
    pub batches: usize,
    pub written: u64,
    pub inserted: u64,
    /// Rows rejected by the database because the key already existed.
    pub duplicates: u64,
}

/// Buffers records and writes them in batches with
/// `ON CONFLICT (pcb_sr_no) DO NOTHING`, so an existing key keeps its
/// first-written values.
pub struct BatchLoader<'a, E: SQLExecutor + ?Sized> {
    sql: &'a E,
    batch_size: usize,
    rows_per_statement: usize,
    expected_rows: Option<usize>,
    buffer: Vec<NewRecord>,
    totals: LoadTotals,
    started: Instant,
}

impl<'a, E: SQLExecutor + ?Sized> BatchLoader<'a, E> {
    /// `batch_size` of zero is treated as one.
    pub fn new(sql: &'a E, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sql,
            batch_size,
            rows_per_statement: MAX_ROWS_PER_STATEMENT,
            expected_rows: None,
            buffer: Vec::with_capacity(batch_size.min(MAX_ROWS_PER_STATEMENT * 10)),
            totals: LoadTotals::default(),
            started: Instant::now(),
        }
    }

    pub fn with_rows_per_statement(mut self, rows: usize) -> Self {
        self.rows_per_statement = rows.clamp(1, MAX_ROWS_PER_STATEMENT);
        self
    }

    pub fn with_expected_rows(mut self, rows: Option<usize>) -> Self {
        self.expected_rows = rows;
        self
    }

    /// Queue one record, writing a batch once the buffer is full.
    pub fn push(&mut self, record: NewRecord) -> Result<Option<Progress>, SQLError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            return self.flush();
        }
        Ok(None)
    }

    /// Write whatever is buffered. Returns `None` if the buffer was empty.
    pub fn flush(&mut self) -> Result<Option<Progress>, SQLError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let batch = std::mem::take(&mut self.buffer);
        let rows = batch.len() as u64;

        let mut inserted = 0;
        let mut pending = batch.into_iter().peekable();
        while pending.peek().is_some() {
            let chunk: Vec<NewRecord> = pending.by_ref().take(self.rows_per_statement).collect();
            inserted += insert_ignoring_existing(self.sql, chunk)?;
        }

        self.totals.batches += 1;
        self.totals.written += rows;
        self.totals.inserted += inserted;
        self.totals.duplicates += rows - inserted.min(rows);
        Ok(Some(self.progress()))
    }

    pub fn totals(&self) -> LoadTotals {
        self.totals
    }

    /// Flush the remainder and return the final totals.
    pub fn finish(mut self) -> Result<(LoadTotals, Option<Progress>), SQLError> {
        let last = self.flush()?;
        Ok((self.totals, last))
    }

    fn progress(&self) -> Progress {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        Progress {
            batches: self.totals.batches,
            written: self.totals.written,
            inserted: self.totals.inserted,
            duplicates: self.totals.duplicates,
            elapsed,
            rate: if secs > 0.0 { self.totals.inserted as f64 / secs } else { 0.0 },
            percent: self
                .expected_rows
                .filter(|n| *n > 0)
                .map(|n| (self.totals.written as f64 * 100.0 / n as f64).min(100.0)),
        }
    }
}

fn insert_sql(rows: usize) -> String {
    let columns: Vec<&str> = Field::ALL.iter().map(|f| f.column()).collect();
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![tuple.as_str(); rows].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT (pcb_sr_no) DO NOTHING",
        TABLE,
        columns.join(", "),
        values
    )
}

/// One multi-row INSERT. Returns the number of rows actually inserted.
fn insert_ignoring_existing<E: SQLExecutor + ?Sized>(
    sql: &E,
    records: Vec<NewRecord>,
) -> Result<u64, SQLError> {
    if records.is_empty() {
        return Ok(0);
    }
    let statement = insert_sql(records.len());
    let params: Vec<Value> = records.into_iter().flat_map(NewRecord::into_values).collect();
    sql.exec(&statement, &params)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use pcbtrace_records::schema::ensure_table;
    use pcbtrace_sql::{SQLStore, SqliteStore};

    use super::*;

    pub(crate) fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        ensure_table(&store).unwrap();
        store
    }

    fn record(pcb: &str, lot: &str) -> NewRecord {
        NewRecord {
            lot_no: Some(lot.into()),
            ..NewRecord::new(pcb)
        }
    }

    fn lot_of(store: &SqliteStore, pcb: &str) -> Option<String> {
        store
            .query(
                "SELECT lot_no FROM manufacturing_data WHERE pcb_sr_no = ?",
                &[Value::from(pcb)],
            )
            .unwrap()
            .first()
            .and_then(|r| r.get_str("lot_no").map(str::to_string))
    }

    #[test]
    fn statement_shape() {
        let sql = insert_sql(2);
        assert!(sql.starts_with("INSERT INTO manufacturing_data (sr_no, lot_no,"));
        assert!(sql.ends_with("ON CONFLICT (pcb_sr_no) DO NOTHING"));
        assert_eq!(sql.matches('?').count(), 28);
    }

    #[test]
    fn batches_flush_at_size() {
        let store = store();
        let mut loader = BatchLoader::new(&store, 2).with_expected_rows(Some(5));
        assert!(loader.push(record("A", "L")).unwrap().is_none());
        let p = loader.push(record("B", "L")).unwrap().unwrap();
        assert_eq!(p.batches, 1);
        assert_eq!(p.inserted, 2);
        assert_eq!(p.percent, Some(40.0));
        loader.push(record("C", "L")).unwrap();

        let (totals, last) = loader.finish().unwrap();
        assert_eq!(last.unwrap().batches, 2);
        assert_eq!(
            totals,
            LoadTotals { batches: 2, written: 3, inserted: 3, duplicates: 0 }
        );
    }

    #[test]
    fn existing_keys_keep_first_values() {
        let store = store();
        let mut loader = BatchLoader::new(&store, 10);
        loader.push(record("A", "first")).unwrap();
        loader.push(record("A", "second")).unwrap();
        loader.push(record("B", "only")).unwrap();
        let (totals, _) = loader.finish().unwrap();
        assert_eq!(totals.inserted, 2);
        assert_eq!(totals.duplicates, 1);
        assert_eq!(lot_of(&store, "A").as_deref(), Some("first"));

        let mut again = BatchLoader::new(&store, 10);
        again.push(record("A", "third")).unwrap();
        let (totals, _) = again.finish().unwrap();
        assert_eq!(totals.inserted, 0);
        assert_eq!(totals.duplicates, 1);
        assert_eq!(lot_of(&store, "A").as_deref(), Some("first"));
    }

    #[test]
    fn large_batch_split_into_statements() {
        let store = store();
        let mut loader = BatchLoader::new(&store, 2500).with_rows_per_statement(700);
        for i in 0..2500 {
            loader.push(record(&format!("PCB-{i:05}"), "L")).unwrap();
        }
        let (totals, _) = loader.finish().unwrap();
        assert_eq!(totals.batches, 1);
        assert_eq!(totals.inserted, 2500);
        let rows = store.query("SELECT COUNT(*) AS n FROM manufacturing_data", &[]).unwrap();
        assert_eq!(rows[0].get_i64("n"), Some(2500));
    }

    #[test]
    fn empty_finish_is_noop() {
        let store = store();
        let (totals, last) = BatchLoader::new(&store, 0).finish().unwrap();
        assert_eq!(totals, LoadTotals::default());
        assert!(last.is_none());
    }

    #[test]
    fn loader_runs_inside_transaction() {
        let store = store();
        {
            let tx = store.begin().unwrap();
            let mut loader = BatchLoader::new(tx.as_ref(), 1);
            loader.push(record("A", "L")).unwrap();
            loader.finish().unwrap();
        }
        assert_eq!(lot_of(&store, "A"), None);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged(progress: &Progress) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || progress.log());
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn progress_log_carries_counts_elapsed_and_rate() {
        let mut progress = Progress {
            batches: 3,
            written: 600,
            inserted: 300,
            duplicates: 300,
            elapsed: Duration::from_millis(1500),
            rate: 200.0,
            percent: Some(50.0),
        };
        let line = logged(&progress);
        assert!(line.contains("progress 50.0%"), "{line}");
        assert!(line.contains("inserted=300"), "{line}");
        assert!(line.contains("elapsed_secs=1.5"), "{line}");
        assert!(line.contains("rate=200"), "{line}");

        progress.percent = None;
        let line = logged(&progress);
        assert!(line.contains("inserted=300"), "{line}");
        assert!(line.contains("elapsed_secs=1.5"), "{line}");
    }
}
