pub mod api;
pub mod model;
pub mod schema;
pub mod service;

use std::sync::Arc;

use axum::Router;
use pcbtrace_core::Module;

pub use model::{ManufacturingRecord, NewRecord, TableStats};
pub use service::RecordService;

/// Read-only query API over `manufacturing_data`.
pub struct RecordsModule {
    service: Arc<RecordService>,
}

impl RecordsModule {
    pub fn new(service: RecordService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl Module for RecordsModule {
    fn name(&self) -> &str {
        "records"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
