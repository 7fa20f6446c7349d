pub mod listing;
pub mod search;

use std::sync::Arc;

use axum::Router;

use pcbtrace_core::ServiceError;

use crate::service::RecordService;

/// Shared application state.
pub type AppState = Arc<RecordService>;

/// Build the records API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(search::routes())
        .merge(listing::routes())
}

/// Run a service call on the blocking pool. SQLite calls block the
/// calling thread, and a request deadline can only fire while the
/// handler is parked on an await point.
pub(crate) async fn blocking<T, F>(svc: &AppState, f: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce(&RecordService) -> Result<T, ServiceError> + Send + 'static,
{
    let svc = Arc::clone(svc);
    tokio::task::spawn_blocking(move || f(&svc))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "service task failed");
            ServiceError::Internal("Internal server error".into())
        })?
}
