//! Directory-level import run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pcbtrace_records::schema;
use pcbtrace_sql::SQLStore;

use crate::cleaner::{RowCleaner, SkipReason};
use crate::columns::ColumnNormalizer;
use crate::error::ImportError;
use crate::loader::{BatchLoader, DEFAULT_BATCH_SIZE, MAX_ROWS_PER_STATEMENT};
use crate::maintenance;
use crate::sheet::{self, Sheet};

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Records buffered before a write.
    pub batch_size: usize,
    /// Rows per INSERT statement within a batch.
    pub rows_per_statement: usize,
    /// Run VACUUM and ANALYZE after the indexes are rebuilt.
    pub vacuum: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            rows_per_statement: MAX_ROWS_PER_STATEMENT,
            vacuum: true,
        }
    }
}

/// Counters for one imported sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    /// Data rows read, excluding the header.
    pub rows_read: u64,
    pub inserted: u64,
    /// Rows whose key was already present.
    pub duplicates: u64,
    /// Rows dropped by cleaning.
    pub rejected: u64,
}

impl FileSummary {
    /// Rows that did not produce a new record.
    pub fn skipped(&self) -> u64 {
        self.duplicates + self.rejected
    }
}

#[derive(Debug)]
pub enum FileStatus {
    Imported(FileSummary),
    Failed(String),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Outcome of a whole directory run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
    pub totals: FileSummary,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn files_imported(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Imported(_)))
            .count()
    }

    pub fn files_failed(&self) -> usize {
        self.files.len() - self.files_imported()
    }

    /// Inserted records per second over the whole run.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.totals.inserted as f64 / secs } else { 0.0 }
    }

    fn record(&mut self, path: &Path, outcome: Result<FileSummary, ImportError>) {
        let status = match outcome {
            Ok(summary) => {
                self.totals.rows_read += summary.rows_read;
                self.totals.inserted += summary.inserted;
                self.totals.duplicates += summary.duplicates;
                self.totals.rejected += summary.rejected;
                FileStatus::Imported(summary)
            }
            Err(e) => FileStatus::Failed(e.to_string()),
        };
        self.files.push(FileReport {
            path: path.to_path_buf(),
            status,
        });
    }
}

/// Loads every workbook in a directory into the records table.
///
/// Session pragmas and index maintenance run on the store's connection
/// outside the per-file transactions, so the store must hold exactly one
/// connection ([`pcbtrace_sql::SqliteStore::open`]).
pub struct Importer {
    store: Arc<dyn SQLStore>,
    normalizer: ColumnNormalizer,
    options: ImportOptions,
}

impl Importer {
    pub fn new(
        store: Arc<dyn SQLStore>,
        normalizer: ColumnNormalizer,
        options: ImportOptions,
    ) -> Result<Self, ImportError> {
        if options.batch_size == 0 {
            return Err(ImportError::InvalidBatchSize);
        }
        let connections = store.pool_size();
        if connections != 1 {
            return Err(ImportError::PooledStore { connections });
        }
        Ok(Self {
            store,
            normalizer,
            options,
        })
    }

    /// Import all `.xlsx`/`.xls` files in `dir`, in path order.
    ///
    /// Secondary indexes are dropped before the first file and rebuilt
    /// after the last. A file that cannot be read or written is rolled
    /// back and reported; the run continues with the next file.
    pub fn import_directory(&self, dir: &Path) -> Result<RunSummary, ImportError> {
        let started = Instant::now();
        let files = sheet::discover(dir)?;
        if files.is_empty() {
            tracing::warn!(dir = %dir.display(), "no .xlsx or .xls files found");
            return Ok(RunSummary::default());
        }
        tracing::info!(dir = %dir.display(), files = files.len(), batch_size = self.options.batch_size, "starting import");

        let sql = self.store.as_ref();
        schema::ensure_table(sql)?;
        maintenance::tune_session(sql)?;
        maintenance::drop_secondary_indexes(sql);

        let mut summary = RunSummary::default();
        for (i, path) in files.iter().enumerate() {
            tracing::info!(file = %path.display(), "[{}/{}] importing", i + 1, files.len());
            match self.import_file(path) {
                Err(e) if e.is_fatal() => {
                    tracing::error!(file = %path.display(), error = %e, "aborting import");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "file skipped");
                    summary.record(path, Err(e));
                }
                Ok(file) => summary.record(path, Ok(file)),
            }
        }

        tracing::info!("rebuilding indexes");
        maintenance::create_indexes(sql)?;
        if self.options.vacuum {
            tracing::info!("running VACUUM ANALYZE");
            maintenance::vacuum_analyze(sql)?;
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            files = summary.files.len(),
            failed = summary.files_failed(),
            rows = summary.totals.rows_read,
            inserted = summary.totals.inserted,
            skipped = summary.totals.skipped(),
            elapsed_secs = summary.elapsed.as_secs_f64(),
            rate = summary.rate().round() as u64,
            "import complete"
        );
        Ok(summary)
    }

    pub fn import_file(&self, path: &Path) -> Result<FileSummary, ImportError> {
        let sheet = Sheet::open(path)?;
        if let Some(rows) = sheet.total_rows {
            tracing::info!(sheet = %sheet.name, rows, "read sheet");
        }
        self.import_sheet(sheet)
    }

    /// Load one sheet in a single transaction. On any storage error the
    /// sheet's rows are rolled back.
    pub fn import_sheet(&self, sheet: Sheet) -> Result<FileSummary, ImportError> {
        let columns = self.normalizer.map_columns(&sheet.headers)?;
        let cleaner = RowCleaner::new(columns);
        let expected = sheet.total_rows;

        let tx = self.store.begin()?;
        let mut loader = BatchLoader::new(tx.as_ref(), self.options.batch_size)
            .with_rows_per_statement(self.options.rows_per_statement)
            .with_expected_rows(expected);

        let mut summary = FileSummary::default();
        let mut read_error = None;
        let rows = sheet.into_rows().map_while(|row| match row {
            Ok(cells) => Some(cells),
            Err(e) => {
                read_error = Some(e);
                None
            }
        });
        for (line, outcome) in cleaner.clean_rows(rows) {
            summary.rows_read += 1;
            match outcome {
                Ok(record) => {
                    if let Some(progress) = loader.push(record)? {
                        progress.log();
                    }
                }
                Err(SkipReason::MissingKey) => {
                    summary.rejected += 1;
                    tracing::debug!(line, "row without pcb_sr_no skipped");
                }
                Err(reason) => {
                    summary.rejected += 1;
                    tracing::warn!(line, %reason, "row skipped");
                }
            }
        }

        if let Some(e) = read_error {
            return Err(e);
        }

        let (totals, last) = loader.finish()?;
        if let Some(progress) = last {
            progress.log();
        }
        tx.commit()?;

        summary.inserted = totals.inserted;
        summary.duplicates = totals.duplicates;
        tracing::info!(
            rows = summary.rows_read,
            inserted = summary.inserted,
            skipped = summary.skipped(),
            "sheet committed"
        );
        Ok(summary)
    }
}
