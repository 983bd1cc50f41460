//! Shared fixtures for the colocated route tests.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::config::Config;
use crate::db::sqlite::SqliteStore;
use crate::state::AppState;
use crate::storage::BlobStore;

/// A fully wired [`AppState`] backed by a throwaway directory: file-based
/// sqlite (so concurrent writers behave like production) and a blob store
/// rooted under the same tempdir.
pub(crate) async fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite://{}/catalog.db", dir.path().display());
    let store = SqliteStore::connect(&database_url).await.unwrap();

    let upload_dir = dir.path().join("uploads");
    let max_file_size = 8 * 1024 * 1024;
    let blobs = BlobStore::new(&upload_dir, max_file_size);
    blobs.ensure_layout().await.unwrap();

    let config = Config {
        bind_address: "127.0.0.1:0".to_owned(),
        database_url,
        upload_dir: upload_dir.display().to_string(),
        max_file_size,
        log_level: "info".to_owned(),
        log_json: false,
        cors_allowed_origins: None,
        admin_token: None,
        enable_swagger: false,
    };

    let state = Arc::new(AppState {
        config: Arc::new(config),
        store: Arc::new(store),
        blobs: Arc::new(blobs),
    });
    (state, dir)
}

/// Headers carrying the acting admin account, as the external
/// authenticator would set them.
pub(crate) fn admin_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-account-id", "acct-1".parse().unwrap());
    headers.insert("x-account-name", "steve".parse().unwrap());
    headers
}
