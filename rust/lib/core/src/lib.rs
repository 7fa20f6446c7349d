pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use config::{ConfigError, ServerSection, ServiceConfig, StorageSection};
pub use error::ServiceError;
pub use module::Module;
pub use types::{PageParams, Pagination};
