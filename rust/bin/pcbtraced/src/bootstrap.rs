//! Bootstrap: config resolution and storage setup before the server starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pcbtrace_core::ServiceConfig;
use pcbtrace_records::schema;
use pcbtrace_sql::{SQLStore, SqliteStore};
use tracing::info;

/// Load the config file if one was given, then apply command-line overrides.
pub fn load_config(
    path: Option<&Path>,
    listen: Option<String>,
    db: Option<PathBuf>,
) -> anyhow::Result<ServiceConfig> {
    let mut config = match path {
        Some(p) => {
            info!("Loading configuration from {}", p.display());
            ServiceConfig::load(p)?
        }
        None => ServiceConfig::default(),
    };
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    if let Some(db) = db {
        config.storage.sqlite_path = Some(db);
    }
    Ok(config)
}

/// Open the connection pool and make sure the records table exists.
pub fn open_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn SQLStore>> {
    if let Some(dir) = &config.storage.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let path = config.resolve_sqlite_path();
    let store = SqliteStore::open_pool(&path, config.storage.pool_size)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", path.display(), e))?;
    schema::init_schema(&store)?;
    info!(
        path = %path.display(),
        pool_size = store.pool_size(),
        "Database ready"
    );
    Ok(Arc::new(store))
}
