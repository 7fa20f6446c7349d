//! Bulk loader for spreadsheet exports of manufacturing test records.
//!
//! Pipeline: [`sheet`] reads rows, [`columns`] maps headers to canonical
//! fields, [`cleaner`] turns each row into a record or a skip reason,
//! [`loader`] writes batches, and [`maintenance`] drops and rebuilds
//! secondary indexes around the run. [`pipeline::Importer`] ties them together.

pub mod cleaner;
pub mod columns;
pub mod error;
pub mod loader;
pub mod maintenance;
pub mod pipeline;
pub mod sheet;

pub use columns::{ColumnMap, ColumnNormalizer, SynonymTable, UnknownHeaderPolicy};
pub use error::ImportError;
pub use pipeline::{FileStatus, FileSummary, ImportOptions, Importer, RunSummary};
pub use sheet::{Cell, Sheet};
