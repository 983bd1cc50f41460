//! Accounted file downloads.
//!
//! The hottest path in the system.  Counting and history are secondary
//! effects: the counter increment is a single relative UPDATE against the
//! store (so racing downloads never lose updates), and a history-append
//! failure is logged but never turns a successful transfer into an error.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi};

use crate::db::{CatalogStore, HistoryStore};
use crate::error::ServerError;
use crate::middleware::auth;
use crate::state::AppState;
use crate::storage::StorageError;

#[derive(OpenApi)]
#[openapi(paths(download_file))]
pub struct DownloadApi;

/// Register the download route.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/download/{file_id}", get(download_file))
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    /// Id of the item the file belongs to.
    pub item_id: String,
}

/// Stream one of an item's content files
/// (`GET /api/download/{file_id}?itemId={itemId}`).
///
/// The counter is incremented before the stream starts: a client that
/// disconnects mid-transfer keeps its single increment, and a failed
/// item/file/blob resolution never counts at all.
#[utoipa::path(
    get,
    path = "/api/download/{file_id}",
    tag = "download",
    params(
        ("file_id" = String, Path, description = "File descriptor id"),
        DownloadQuery,
    ),
    responses(
        (status = 200, description = "File bytes, Content-Disposition names the original filename"),
        (status = 404, description = "Item, file, or blob not found"),
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let item = state
        .store
        .get_item(&query.item_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("item {} not found", query.item_id)))?;

    let file = state
        .store
        .get_file(&item.id, &file_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("file {file_id} not found")))?;

    let absolute = match state.blobs.resolve(&file.storage_path).await {
        Ok(path) => path,
        Err(StorageError::NotFound(_)) | Err(StorageError::Traversal(_)) => {
            // Descriptor-without-blob is a catalog/storage inconsistency,
            // distinct from an unknown id; flag it loudly.
            error!(
                item_id = %item.id,
                file_id = %file.id,
                path = %file.storage_path,
                "file descriptor references a blob missing from storage"
            );
            return Err(ServerError::NotFound("file not found on server".to_owned()));
        }
        Err(e) => return Err(e.into()),
    };

    if !state.store.increment_downloads(&item.id).await? {
        // The item was deleted between resolution and accounting.
        return Err(ServerError::NotFound(format!(
            "item {} not found",
            query.item_id
        )));
    }

    if let Some(account) = auth::acting_account(&headers) {
        if let Err(e) = state.store.append_download(&account.id, &item.id).await {
            warn!(
                account_id = %account.id,
                item_id = %item.id,
                error = %e,
                "failed to append download history"
            );
        }
    }

    let file_handle = tokio::fs::File::open(&absolute).await?;
    let content_length = file_handle.metadata().await.ok().map(|m| m.len());

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&file.original_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    if let Some(length) = content_length {
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    info!(item_id = %item.id, file_id = %file.id, "download started");

    let stream = ReaderStream::new(file_handle);
    Ok((response_headers, Body::from_stream(stream)).into_response())
}

fn content_disposition(original_name: &str) -> String {
    let sanitized: String = original_name
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("attachment; filename=\"{sanitized}\"")
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;
    use http_body_util::BodyExt;

    use crate::db::{FileRecord, ItemRecord};
    use crate::storage::AssetClass;
    use crate::testutil::{admin_headers, test_state};

    fn item_record(id: &str, slug: &str) -> ItemRecord {
        let now = Utc::now();
        ItemRecord {
            id: id.to_owned(),
            title: "Epic Sword Mod".to_owned(),
            slug: slug.to_owned(),
            item_type: "mod".to_owned(),
            version: "1.0.0".to_owned(),
            game_version: "1.20".to_owned(),
            author: "steve".to_owned(),
            author_id: Some("acct-1".to_owned()),
            tags: Vec::new(),
            short_description: "A sword.".to_owned(),
            full_description: "A very epic sword.".to_owned(),
            install_instructions: String::new(),
            changelog: String::new(),
            thumbnail: "images/absent.png".to_owned(),
            screenshots: Vec::new(),
            downloads_count: 0,
            rating_average: 0.0,
            rating_count: 0,
            featured: false,
            status: "published".to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn download_streams_bytes_and_appends_history() {
        let (state, _dir) = test_state().await;
        let blob = state
            .blobs
            .store_bytes(AssetClass::ContentFile, "pack.zip", b"PK\x03\x04data")
            .await
            .unwrap();
        let file = FileRecord {
            id: "f1".to_owned(),
            item_id: "i1".to_owned(),
            filename: blob.filename.clone(),
            original_name: "pack.zip".to_owned(),
            size_bytes: 8,
            mime_type: "application/zip".to_owned(),
            storage_path: blob.storage_path,
            uploaded_at: Utc::now(),
        };
        state
            .store
            .insert_item(&item_record("i1", "epic-sword-mod"), &[file])
            .await
            .unwrap();

        let response = download_file(
            State(state.clone()),
            Path("f1".to_owned()),
            Query(DownloadQuery {
                item_id: "i1".to_owned(),
            }),
            admin_headers(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"PK\x03\x04data");

        let item = state.store.get_item("i1").await.unwrap().unwrap();
        assert_eq!(item.downloads_count, 1);
    }

    #[tokio::test]
    async fn file_id_from_another_item_is_not_found_and_not_counted() {
        let (state, _dir) = test_state().await;
        let blob = state
            .blobs
            .store_bytes(AssetClass::ContentFile, "pack.zip", b"PK")
            .await
            .unwrap();
        let file = FileRecord {
            id: "f1".to_owned(),
            item_id: "i1".to_owned(),
            filename: blob.filename.clone(),
            original_name: "pack.zip".to_owned(),
            size_bytes: 2,
            mime_type: "application/zip".to_owned(),
            storage_path: blob.storage_path,
            uploaded_at: Utc::now(),
        };
        state
            .store
            .insert_item(&item_record("i1", "one"), &[file])
            .await
            .unwrap();
        state
            .store
            .insert_item(&item_record("i2", "two"), &[])
            .await
            .unwrap();

        let err = download_file(
            State(state.clone()),
            Path("f1".to_owned()),
            Query(DownloadQuery {
                item_id: "i2".to_owned(),
            }),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));

        for id in ["i1", "i2"] {
            let item = state.store.get_item(id).await.unwrap().unwrap();
            assert_eq!(item.downloads_count, 0, "no increment for item {id}");
        }
    }

    #[tokio::test]
    async fn descriptor_without_blob_is_not_found_and_not_counted() {
        let (state, _dir) = test_state().await;
        let file = FileRecord {
            id: "f1".to_owned(),
            item_id: "i1".to_owned(),
            filename: "gone.zip".to_owned(),
            original_name: "gone.zip".to_owned(),
            size_bytes: 2,
            mime_type: "application/zip".to_owned(),
            storage_path: "files/gone.zip".to_owned(),
            uploaded_at: Utc::now(),
        };
        state
            .store
            .insert_item(&item_record("i1", "one"), &[file])
            .await
            .unwrap();

        let err = download_file(
            State(state.clone()),
            Path("f1".to_owned()),
            Query(DownloadQuery {
                item_id: "i1".to_owned(),
            }),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));

        let item = state.store.get_item("i1").await.unwrap().unwrap();
        assert_eq!(item.downloads_count, 0);
    }

    #[test]
    fn content_disposition_quotes_are_sanitized() {
        assert_eq!(
            content_disposition("epic\"sword\".zip"),
            "attachment; filename=\"epic_sword_.zip\""
        );
    }
}
