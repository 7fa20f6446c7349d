use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Server configuration, loaded from a TOML file.
///
/// ```toml
/// [server]
/// listen = "0.0.0.0:5000"
/// request_timeout_secs = 10
/// cors_origins = ["http://localhost:5173"]
///
/// [storage]
/// data_dir = "/var/lib/pcbtrace"
/// pool_size = 8
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Listen address for the HTTP server.
    pub listen: String,

    /// Per-request deadline in seconds.
    pub request_timeout_secs: u64,

    /// Allowed CORS origins. Empty means no CORS layer.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 10,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding the database file.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Number of pooled connections for the query service.
    pub pool_size: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            pool_size: 8,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.pool_size == 0 {
            return Err(ConfigError::Invalid("storage.pool_size must be at least 1".into()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.storage.sqlite_path.clone().unwrap_or_else(|| {
            self.storage
                .data_dir
                .as_ref()
                .map(|d| d.join("data.sqlite"))
                .unwrap_or_else(|| PathBuf::from("data.sqlite"))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:5000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.storage.pool_size, 8);
        assert_eq!(config.resolve_sqlite_path(), PathBuf::from("data.sqlite"));
    }

    #[test]
    fn test_from_toml() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [server]
            listen = "127.0.0.1:9090"
            cors_origins = ["http://localhost:5173"]

            [storage]
            data_dir = "/data"
            pool_size = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9090");
        assert_eq!(config.server.request_timeout_secs, 10);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.storage.pool_size, 2);
        assert_eq!(config.resolve_sqlite_path(), PathBuf::from("/data/data.sqlite"));
    }

    #[test]
    fn test_explicit_sqlite_path_wins() {
        let config = ServiceConfig::from_toml_str(
            "[storage]\ndata_dir = \"/data\"\nsqlite_path = \"/other/mfg.db\"\n",
        )
        .unwrap();
        assert_eq!(config.resolve_sqlite_path(), PathBuf::from("/other/mfg.db"));
    }

    #[test]
    fn test_rejects_zero_pool() {
        let err = ServiceConfig::from_toml_str("[storage]\npool_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcbtraced.toml");
        std::fs::write(&path, "[server]\nrequest_timeout_secs = 3\n").unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(3));

        let missing = ServiceConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
