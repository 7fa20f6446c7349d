use axum::Router;

/// A service module that contributes HTTP routes.
///
/// The server binary collects all modules and merges their routes into a
/// single Router.
pub trait Module: Send + Sync {
    /// Module name, used for logging.
    fn name(&self) -> &str;

    /// Return the module's routes with their state already applied.
    fn routes(&self) -> Router;
}
