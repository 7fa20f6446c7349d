//! `pcbtrace-import`: bulk-load a directory of spreadsheet exports.
//!
//! Usage:
//!   pcbtrace-import <DIR> [BATCH_SIZE] [--db <path>] [--synonyms <file>]
//!                   [--unknown-headers ignore|warn] [--sample <n>]

mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use pcbtrace_importer::loader::DEFAULT_BATCH_SIZE;
use pcbtrace_importer::{
    ColumnNormalizer, ImportOptions, Importer, RunSummary, SynonymTable, UnknownHeaderPolicy,
};
use pcbtrace_records::{RecordService, schema};
use pcbtrace_sql::{SQLStore, SqliteStore};
use tracing::info;

/// Manufacturing records importer.
#[derive(Parser, Debug)]
#[command(name = "pcbtrace-import", version, about = "Import .xlsx/.xls exports into the records database")]
struct Cli {
    /// Directory containing the spreadsheet files.
    dir: PathBuf,

    /// Records per batch.
    #[arg(default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// SQLite database path.
    #[arg(long = "db", env = "PCBTRACE_DB", default_value = "data.sqlite")]
    db: PathBuf,

    /// TOML file with extra header synonyms (`[synonyms] "header" = "column"`).
    #[arg(long = "synonyms")]
    synonyms: Option<PathBuf>,

    /// What to do with headers that match no known column.
    #[arg(long = "unknown-headers", default_value = "ignore")]
    unknown_headers: UnknownHeaderPolicy,

    /// Number of recent records to show after the import.
    #[arg(long = "sample", default_value_t = 5)]
    sample: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli.db)?;

    let mut synonyms = SynonymTable::builtin();
    if let Some(path) = &cli.synonyms {
        synonyms = synonyms.with_file(path)?;
        info!(file = %path.display(), entries = synonyms.len(), "loaded header synonyms");
    }

    let options = ImportOptions {
        batch_size: cli.batch_size,
        ..ImportOptions::default()
    };
    let importer = Importer::new(
        Arc::clone(&store),
        ColumnNormalizer::new(synonyms, cli.unknown_headers),
        options,
    )?;

    let summary = importer.import_directory(&cli.dir)?;
    print_report(&summary, RecordService::new(store), cli.sample)
}

/// Open the single importer connection and create the table if missing.
fn open_store(path: &Path) -> anyhow::Result<Arc<dyn SQLStore>> {
    let store = SqliteStore::open(path)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", path.display(), e))?;
    schema::ensure_table(&store)?;
    info!(path = %path.display(), "database ready");
    Ok(Arc::new(store))
}

fn print_report(summary: &RunSummary, svc: RecordService, sample: u64) -> anyhow::Result<()> {
    if !summary.files.is_empty() {
        report::print_summary(summary);
    }
    report::print_stats(&svc)?;
    report::print_sample(&svc, sample)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["pcbtrace-import", "./exports"]).unwrap();
        assert_eq!(cli.dir, PathBuf::from("./exports"));
        assert_eq!(cli.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cli.unknown_headers, UnknownHeaderPolicy::Ignore);
        assert_eq!(cli.sample, 5);

        let cli = Cli::try_parse_from([
            "pcbtrace-import",
            "in",
            "250",
            "--db",
            "x.sqlite",
            "--unknown-headers",
            "warn",
        ])
        .unwrap();
        assert_eq!(cli.batch_size, 250);
        assert_eq!(cli.db, PathBuf::from("x.sqlite"));
        assert_eq!(cli.unknown_headers, UnknownHeaderPolicy::Warn);

        assert!(Cli::try_parse_from(["pcbtrace-import", "in", "--unknown-headers", "loud"]).is_err());
    }

    #[test]
    fn file_store_gets_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("import.sqlite")).unwrap();
        let svc = RecordService::new(store);
        assert_eq!(svc.count().unwrap(), 0);
        print_report(&RunSummary::default(), svc, 3).unwrap();
    }
}
