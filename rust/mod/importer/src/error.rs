use std::path::PathBuf;

use pcbtrace_sql::SQLError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read spreadsheet {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("spreadsheet {path} has no worksheet")]
    NoWorksheet { path: PathBuf },

    #[error("missing required column pcb_sr_no (available columns: {available:?})")]
    MissingKeyColumn { available: Vec<String> },

    #[error("invalid synonym table: {0}")]
    Synonyms(String),

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("importer needs a single-connection store, got a pool of {connections}")]
    PooledStore { connections: usize },

    #[error("storage error: {0}")]
    Sql(#[from] SQLError),
}

impl ImportError {
    /// Whether the error ends the whole run rather than just the current file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ImportError::Sql(SQLError::Connection(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_loss_is_fatal() {
        assert!(ImportError::Sql(SQLError::Connection("gone".into())).is_fatal());
        assert!(!ImportError::Sql(SQLError::Execution("constraint".into())).is_fatal());
        assert!(!ImportError::MissingKeyColumn { available: vec![] }.is_fatal());
    }
}
