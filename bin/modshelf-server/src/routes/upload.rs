//! Multipart asset upload (admin only).
//!
//! Accepts up to one `thumbnail` image, ten `screenshots` images, and
//! five `files` archives in a single request.  Each file is streamed to
//! the blob store chunk-by-chunk; the first validation or storage failure
//! aborts the request and removes every sibling blob already stored, so
//! no catalog record can ever reference a half-uploaded batch.

use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{middleware, Json, Router};
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::auth;
use crate::routes::items::{MAX_CONTENT_FILES, MAX_SCREENSHOTS};
use crate::schemas::items::UploadedFileBody;
use crate::schemas::upload::{UploadForm, UploadResponse};
use crate::state::AppState;
use crate::storage::{AssetClass, BlobStore, StoredBlob};

#[derive(OpenApi)]
#[openapi(paths(upload_files), components(schemas(UploadForm, UploadResponse)))]
pub struct UploadApi;

/// Register the upload route with its own (much larger) body limit.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Envelope for a full batch: every file slot at the per-file cap,
    // plus multipart framing overhead.
    let body_limit = (state.config.max_file_size as usize)
        .saturating_mul(1 + MAX_SCREENSHOTS + MAX_CONTENT_FILES)
        .saturating_add(1024 * 1024);

    Router::new()
        .route("/api/upload", post(upload_files))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::check_admin_auth,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
}

#[derive(Default)]
struct UploadBatch {
    thumbnail: Option<StoredBlob>,
    screenshots: Vec<StoredBlob>,
    files: Vec<UploadedFileBody>,
}

impl UploadBatch {
    fn stored_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(thumbnail) = &self.thumbnail {
            paths.push(thumbnail.storage_path.clone());
        }
        paths.extend(self.screenshots.iter().map(|b| b.storage_path.clone()));
        paths.extend(self.files.iter().map(|f| f.storage_url.clone()));
        paths
    }
}

/// Upload a batch of assets (`POST /api/upload`).
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored descriptors for every file", body = UploadResponse),
        (status = 400, description = "Invalid field, disallowed extension, or malformed multipart"),
        (status = 401, description = "Unauthorised (admin token required)"),
        (status = 413, description = "A file exceeds the configured maximum size"),
    )
)]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let mut batch = UploadBatch::default();

    if let Err(e) = ingest_fields(&state.blobs, &mut multipart, &mut batch).await {
        cleanup_batch(&state.blobs, &batch).await;
        return Err(e);
    }

    if batch.files.is_empty() {
        cleanup_batch(&state.blobs, &batch).await;
        return Err(ServerError::Validation(
            "at least one content file is required".to_owned(),
        ));
    }

    info!(
        thumbnails = batch.thumbnail.is_some() as usize,
        screenshots = batch.screenshots.len(),
        files = batch.files.len(),
        "upload batch stored"
    );

    Ok(Json(UploadResponse {
        message: "files uploaded successfully".to_owned(),
        thumbnail: batch.thumbnail.map(|b| b.storage_path),
        screenshots: batch
            .screenshots
            .into_iter()
            .map(|b| b.storage_path)
            .collect(),
        files: batch.files,
    }))
}

async fn ingest_fields(
    blobs: &BlobStore,
    multipart: &mut Multipart,
    batch: &mut UploadBatch,
) -> Result<(), ServerError> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        ServerError::Validation(format!("failed to read multipart field: {e}"))
    })? {
        let field_name = field.name().unwrap_or("").to_owned();
        let class = match field_name.as_str() {
            "thumbnail" => {
                if batch.thumbnail.is_some() {
                    return Err(ServerError::Validation(
                        "only one thumbnail is allowed".to_owned(),
                    ));
                }
                AssetClass::Thumbnail
            }
            "screenshots" => {
                if batch.screenshots.len() >= MAX_SCREENSHOTS {
                    return Err(ServerError::Validation(format!(
                        "at most {MAX_SCREENSHOTS} screenshots are allowed"
                    )));
                }
                AssetClass::Screenshot
            }
            "files" => {
                if batch.files.len() >= MAX_CONTENT_FILES {
                    return Err(ServerError::Validation(format!(
                        "at most {MAX_CONTENT_FILES} content files are allowed"
                    )));
                }
                AssetClass::ContentFile
            }
            // Unknown fields are ignored, not stored.
            _ => continue,
        };

        let original_name = field
            .file_name()
            .map(str::to_owned)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ServerError::Validation(format!("field '{field_name}' must be a file"))
            })?;
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();

        let (blob, size) = store_field(blobs, class, &original_name, &mut field).await?;
        match class {
            AssetClass::Thumbnail => batch.thumbnail = Some(blob),
            AssetClass::Screenshot => batch.screenshots.push(blob),
            AssetClass::ContentFile => batch.files.push(UploadedFileBody {
                filename: blob.filename.clone(),
                original_name,
                size: size as i64,
                file_type: content_type,
                storage_url: blob.storage_path,
            }),
        }
    }
    Ok(())
}

/// Stream one multipart field into the blob store with the size cap
/// enforced per chunk.
async fn store_field(
    blobs: &BlobStore,
    class: AssetClass,
    original_name: &str,
    field: &mut Field<'_>,
) -> Result<(StoredBlob, u64), ServerError> {
    let mut writer = blobs.create(class, original_name).await?;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = writer.write_chunk(&chunk).await {
                    writer.discard().await;
                    return Err(e.into());
                }
            }
            Ok(None) => break,
            Err(e) => {
                writer.discard().await;
                return Err(ServerError::Validation(format!(
                    "failed to read upload: {e}"
                )));
            }
        }
    }
    let size = writer.written();
    let blob = writer.finish().await?;
    Ok((blob, size))
}

/// Remove every blob stored for an aborted batch.
async fn cleanup_batch(blobs: &BlobStore, batch: &UploadBatch) {
    for path in batch.stored_paths() {
        if let Err(e) = blobs.remove(&path).await {
            warn!(path = %path, error = %e, "failed to remove blob of aborted upload");
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
