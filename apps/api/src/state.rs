use std::sync::Arc;

use crate::config::Config;
use crate::store::TableStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable table store. Postgres in production, `MemoryStore` for local runs and tests.
    pub store: Arc<dyn TableStore>,
    pub config: Config,
}
