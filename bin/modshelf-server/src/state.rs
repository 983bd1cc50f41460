//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::db::sqlite::SqliteStore;
use crate::storage::BlobStore;

/// State shared across all HTTP handlers.
///
/// Constructed once at process start; there is no module-level mutable
/// state anywhere in the server.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Persistent catalog / history store.
    pub store: Arc<SqliteStore>,
    /// Physical storage for uploaded images and archives.
    pub blobs: Arc<BlobStore>,
}
