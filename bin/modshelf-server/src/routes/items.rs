//! Catalog item routes: public reads plus admin create / update / delete.
//!
//! This module owns the item lifecycle: slug minting with collision
//! resolution, required-field validation, and the delete path that keeps
//! catalog records and blob-store artifacts consistent (every referenced
//! blob is swept before the record is purged).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::db::{
    CatalogStore, FileRecord, ItemFilter, ItemRecord, ItemSort, PageRequest, ITEM_STATUSES,
    ITEM_TYPES,
};
use crate::db::sqlite::SqliteStore;
use crate::error::ServerError;
use crate::middleware::auth;
use crate::schemas::items::{
    CreateItemBody, FileDescriptorResponse, ItemResponse, ListItemsQuery, PagedItemsResponse,
    RatingResponse, UpdateItemBody, UploadedFileBody,
};
use crate::slug;
use crate::state::AppState;
use crate::storage::BlobStore;

/// Caps mirrored from the upload contract.
pub(crate) const MAX_SCREENSHOTS: usize = 10;
pub(crate) const MAX_CONTENT_FILES: usize = 5;

const FEATURED_LIMIT: i64 = 6;
const TRENDING_LIMIT: i64 = 8;
const DEFAULT_PAGE_SIZE: i64 = 12;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_items,
        featured_items,
        trending_items,
        items_by_type,
        item_by_slug,
        create_item,
        update_item,
        delete_item,
    ),
    components(schemas(
        CreateItemBody,
        UpdateItemBody,
        UploadedFileBody,
        ItemResponse,
        FileDescriptorResponse,
        RatingResponse,
        PagedItemsResponse,
    ))
)]
pub struct ItemsApi;

/// Register item routes.  The mutating routes carry the admin guard; the
/// read routes are public.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/", get(list_items))
        .route("/featured", get(featured_items))
        .route("/trending", get(trending_items))
        .route("/type/{item_type}", get(items_by_type))
        .route("/{slug}", get(item_by_slug));

    let admin = Router::new()
        .route("/", post(create_item))
        // Same literal segment name as the public fetch route – the router
        // requires one param name per position; the handlers read it as an
        // id.
        .route("/{slug}", put(update_item).delete(delete_item))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::check_admin_auth,
        ));

    public.merge(admin)
}

// ── Public reads ──────────────────────────────────────────────────────────────

/// Filtered, paginated listing of published items
/// (`GET /api/items`).
#[utoipa::path(
    get,
    path = "/api/items",
    tag = "items",
    params(ListItemsQuery),
    responses(
        (status = 200, description = "Page of published items", body = PagedItemsResponse),
    )
)]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<PagedItemsResponse>, ServerError> {
    let filter = ItemFilter {
        item_type: query.item_type.clone(),
        game_version: query.game_version.clone(),
        tags: query
            .tags
            .as_deref()
            .map(split_tags)
            .unwrap_or_default(),
        search: query.search.clone(),
        status: None,
        published_only: true,
    };
    let page = page_request(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let sort = parse_sort(query.sort.as_deref());

    let (records, total) = state.store.list_items(&filter, sort, page).await?;
    let items = items_with_files(&state.store, records).await?;

    Ok(Json(PagedItemsResponse {
        items,
        total_pages: total_pages(total, page.limit),
        current_page: page.page,
        total,
    }))
}

/// Featured picks for the landing page (`GET /api/items/featured`).
#[utoipa::path(
    get,
    path = "/api/items/featured",
    tag = "items",
    responses(
        (status = 200, description = "Up to six featured items", body = Vec<ItemResponse>),
    )
)]
pub async fn featured_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ItemResponse>>, ServerError> {
    let records = state.store.list_featured(FEATURED_LIMIT).await?;
    Ok(Json(items_with_files(&state.store, records).await?))
}

/// Most-downloaded published items (`GET /api/items/trending`).
#[utoipa::path(
    get,
    path = "/api/items/trending",
    tag = "items",
    responses(
        (status = 200, description = "Up to eight trending items", body = Vec<ItemResponse>),
    )
)]
pub async fn trending_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ItemResponse>>, ServerError> {
    let records = state.store.list_trending(TRENDING_LIMIT).await?;
    Ok(Json(items_with_files(&state.store, records).await?))
}

/// Paginated listing of one item type (`GET /api/items/type/{item_type}`).
#[utoipa::path(
    get,
    path = "/api/items/type/{item_type}",
    tag = "items",
    params(("item_type" = String, Path, description = "Catalog item type")),
    responses(
        (status = 200, description = "Page of published items of the type", body = PagedItemsResponse),
        (status = 400, description = "Unknown item type"),
    )
)]
pub async fn items_by_type(
    State(state): State<Arc<AppState>>,
    Path(item_type): Path<String>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<PagedItemsResponse>, ServerError> {
    validate_item_type(&item_type)?;
    let filter = ItemFilter {
        item_type: Some(item_type),
        published_only: true,
        ..Default::default()
    };
    let page = page_request(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let sort = parse_sort(query.sort.as_deref());

    let (records, total) = state.store.list_items(&filter, sort, page).await?;
    let items = items_with_files(&state.store, records).await?;

    Ok(Json(PagedItemsResponse {
        items,
        total_pages: total_pages(total, page.limit),
        current_page: page.page,
        total,
    }))
}

/// Single published item by slug (`GET /api/items/{slug}`).
#[utoipa::path(
    get,
    path = "/api/items/{slug}",
    tag = "items",
    params(("slug" = String, Path, description = "Item slug")),
    responses(
        (status = 200, description = "The item", body = ItemResponse),
        (status = 404, description = "No published item with this slug"),
    )
)]
pub async fn item_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ItemResponse>, ServerError> {
    let item = state
        .store
        .get_item_by_slug(&slug, true)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("item '{slug}' not found")))?;
    let files = state.store.files_for_item(&item.id).await?;
    Ok(Json(ItemResponse::from_record(item, files)))
}

// ── Admin mutations ───────────────────────────────────────────────────────────

/// Create a catalog item from already-uploaded blobs
/// (`POST /api/items`).
#[utoipa::path(
    post,
    path = "/api/items",
    tag = "items",
    request_body = CreateItemBody,
    responses(
        (status = 201, description = "Item created", body = ItemResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorised (admin token required)"),
    )
)]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateItemBody>,
) -> Result<(StatusCode, Json<ItemResponse>), ServerError> {
    validate_create(&body)?;
    verify_blob_refs(&state.blobs, &body.thumbnail, &body.screenshots, &body.files).await?;

    let account = auth::acting_account(&headers);
    let author = match body
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
    {
        Some(author) => author.to_owned(),
        None => account
            .as_ref()
            .and_then(|a| a.username.clone())
            .ok_or_else(|| {
                ServerError::Validation(
                    "author is required when no acting account is present".to_owned(),
                )
            })?,
    };

    let base_slug = slug::slugify(body.title.trim());
    if base_slug.is_empty() {
        return Err(ServerError::Validation(
            "title must contain at least one alphanumeric character".to_owned(),
        ));
    }
    let taken = state.store.slug_exists(&base_slug, None).await?;

    let now = Utc::now();
    let mut item = ItemRecord {
        id: Uuid::new_v4().to_string(),
        title: body.title.trim().to_owned(),
        slug: slug::with_collision_suffix(&base_slug, taken),
        item_type: body.item_type.clone(),
        version: body.version.trim().to_owned(),
        game_version: body.game_version.trim().to_owned(),
        author,
        author_id: account.map(|a| a.id),
        tags: split_tags(body.tags.as_deref().unwrap_or_default()),
        short_description: body.short_description.trim().to_owned(),
        full_description: body.full_description.clone(),
        install_instructions: body.install_instructions.clone().unwrap_or_default(),
        changelog: body.changelog.clone().unwrap_or_default(),
        thumbnail: body.thumbnail.clone(),
        screenshots: body.screenshots.clone(),
        downloads_count: 0,
        rating_average: 0.0,
        rating_count: 0,
        featured: false,
        status: body.status.clone().unwrap_or_else(|| "published".to_owned()),
        created_at: now,
        updated_at: now,
    };
    let files: Vec<FileRecord> = body
        .files
        .iter()
        .map(|f| FileRecord {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            filename: f.filename.clone(),
            original_name: f.original_name.clone(),
            size_bytes: f.size,
            mime_type: f.file_type.clone(),
            storage_path: f.storage_url.clone(),
            uploaded_at: now,
        })
        .collect();

    match state.store.insert_item(&item, &files).await {
        Ok(()) => {}
        // The UNIQUE index on slug is the backstop for identically-titled
        // items racing through collision resolution; retry once with a
        // time suffix.
        Err(e) if is_unique_violation(&e) => {
            item.slug = format!("{base_slug}-{}", Utc::now().timestamp_millis());
            state.store.insert_item(&item, &files).await?;
        }
        Err(e) => return Err(e.into()),
    }

    info!(item_id = %item.id, slug = %item.slug, "item created");
    Ok((
        StatusCode::CREATED,
        Json(ItemResponse::from_record(item, files)),
    ))
}

/// Partially update an item (`PUT /api/items/{id}`).
///
/// A changed title regenerates the slug (collision resolution excludes
/// the item itself); unspecified fields are left untouched.
#[utoipa::path(
    put,
    path = "/api/items/{id}",
    tag = "items",
    params(("id" = String, Path, description = "Item id")),
    request_body = UpdateItemBody,
    responses(
        (status = 200, description = "Updated item", body = ItemResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorised (admin token required)"),
        (status = 404, description = "Item not found"),
    )
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateItemBody>,
) -> Result<Json<ItemResponse>, ServerError> {
    let mut item = state
        .store
        .get_item(&id)
        .await?
        .ok_or_else(|| not_found_item(&id))?;

    let mut regenerated_slug_base = None;
    if let Some(title) = &body.title {
        let base_slug = slug::slugify(title.trim());
        if base_slug.is_empty() {
            return Err(ServerError::Validation(
                "title must contain at least one alphanumeric character".to_owned(),
            ));
        }
        let taken = state.store.slug_exists(&base_slug, Some(&id)).await?;
        item.slug = slug::with_collision_suffix(&base_slug, taken);
        item.title = title.trim().to_owned();
        regenerated_slug_base = Some(base_slug);
    }
    if let Some(item_type) = &body.item_type {
        validate_item_type(item_type)?;
        item.item_type = item_type.clone();
    }
    if let Some(version) = &body.version {
        if version.trim().is_empty() {
            return Err(ServerError::Validation("version is required".to_owned()));
        }
        item.version = version.trim().to_owned();
    }
    if let Some(game_version) = &body.game_version {
        if game_version.trim().is_empty() {
            return Err(ServerError::Validation("gameVersion is required".to_owned()));
        }
        item.game_version = game_version.trim().to_owned();
    }
    if let Some(author) = &body.author {
        if author.trim().is_empty() {
            return Err(ServerError::Validation("author is required".to_owned()));
        }
        item.author = author.trim().to_owned();
    }
    if let Some(tags) = &body.tags {
        item.tags = split_tags(tags);
    }
    if let Some(short_description) = &body.short_description {
        validate_short_description(short_description)?;
        item.short_description = short_description.trim().to_owned();
    }
    if let Some(full_description) = &body.full_description {
        if full_description.trim().is_empty() {
            return Err(ServerError::Validation(
                "fullDescription is required".to_owned(),
            ));
        }
        item.full_description = full_description.clone();
    }
    if let Some(install_instructions) = &body.install_instructions {
        item.install_instructions = install_instructions.clone();
    }
    if let Some(changelog) = &body.changelog {
        item.changelog = changelog.clone();
    }
    if let Some(thumbnail) = &body.thumbnail {
        if thumbnail.trim().is_empty() {
            return Err(ServerError::Validation("thumbnail is required".to_owned()));
        }
        verify_blob_refs(&state.blobs, thumbnail, &[], &[]).await?;
        item.thumbnail = thumbnail.clone();
    }
    if let Some(screenshots) = &body.screenshots {
        if screenshots.len() > MAX_SCREENSHOTS {
            return Err(ServerError::Validation(format!(
                "at most {MAX_SCREENSHOTS} screenshots are allowed"
            )));
        }
        verify_blob_refs(&state.blobs, &item.thumbnail, screenshots, &[]).await?;
        item.screenshots = screenshots.clone();
    }
    if let Some(status) = &body.status {
        validate_status(status)?;
        item.status = status.clone();
    }
    item.updated_at = Utc::now();

    match state.store.update_item(&item).await {
        Ok(true) => {}
        Ok(false) => return Err(not_found_item(&id)),
        Err(e) if is_unique_violation(&e) && regenerated_slug_base.is_some() => {
            let base_slug = regenerated_slug_base.unwrap_or_default();
            item.slug = format!("{base_slug}-{}", Utc::now().timestamp_millis());
            if !state.store.update_item(&item).await? {
                return Err(not_found_item(&id));
            }
        }
        Err(e) => return Err(e.into()),
    }

    let files = state.store.files_for_item(&item.id).await?;
    Ok(Json(ItemResponse::from_record(item, files)))
}

/// Delete an item and every blob it references
/// (`DELETE /api/items/{id}`).
///
/// Blob removals are attempted first and tolerated individually – an
/// orphaned blob is recoverable, a ghost catalog entry is not – then the
/// record is purged.
#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    tag = "items",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item deleted"),
        (status = 401, description = "Unauthorised (admin token required)"),
        (status = 404, description = "Item not found"),
    )
)]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let item = state
        .store
        .get_item(&id)
        .await?
        .ok_or_else(|| not_found_item(&id))?;
    let files = state.store.files_for_item(&id).await?;

    sweep_item_blobs(&state.blobs, &item, &files).await;

    if !state.store.delete_item(&id).await? {
        return Err(not_found_item(&id));
    }
    info!(item_id = %id, "item deleted");
    Ok(Json(json!({ "message": "item deleted successfully" })))
}

// ── Shared lifecycle helpers ──────────────────────────────────────────────────

/// Remove every blob an item references: thumbnail, screenshots, files.
/// Individual failures are logged and never abort the sweep.
pub(crate) async fn sweep_item_blobs(blobs: &BlobStore, item: &ItemRecord, files: &[FileRecord]) {
    let mut paths: Vec<&str> = Vec::with_capacity(1 + item.screenshots.len() + files.len());
    paths.push(item.thumbnail.as_str());
    paths.extend(item.screenshots.iter().map(String::as_str));
    paths.extend(files.iter().map(|f| f.storage_path.as_str()));

    for path in paths {
        match blobs.remove(path).await {
            Ok(true) => {}
            Ok(false) => {
                info!(item_id = %item.id, path = %path, "blob already absent during delete")
            }
            Err(e) => {
                warn!(item_id = %item.id, path = %path, error = %e, "failed to remove blob during delete")
            }
        }
    }
}

pub(crate) async fn items_with_files(
    store: &SqliteStore,
    records: Vec<ItemRecord>,
) -> Result<Vec<ItemResponse>, ServerError> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let files = store.files_for_item(&record.id).await?;
        out.push(ItemResponse::from_record(record, files));
    }
    Ok(out)
}

async fn verify_blob_refs(
    blobs: &BlobStore,
    thumbnail: &str,
    screenshots: &[String],
    files: &[UploadedFileBody],
) -> Result<(), ServerError> {
    let mut paths: Vec<&str> = vec![thumbnail];
    paths.extend(screenshots.iter().map(String::as_str));
    paths.extend(files.iter().map(|f| f.storage_url.as_str()));
    for path in paths {
        if blobs.resolve(path).await.is_err() {
            return Err(ServerError::Validation(format!(
                "'{path}' does not reference an uploaded file"
            )));
        }
    }
    Ok(())
}

fn validate_create(body: &CreateItemBody) -> Result<(), ServerError> {
    if body.title.trim().is_empty() {
        return Err(ServerError::Validation("title is required".to_owned()));
    }
    validate_item_type(&body.item_type)?;
    if body.version.trim().is_empty() {
        return Err(ServerError::Validation("version is required".to_owned()));
    }
    if body.game_version.trim().is_empty() {
        return Err(ServerError::Validation("gameVersion is required".to_owned()));
    }
    validate_short_description(&body.short_description)?;
    if body.full_description.trim().is_empty() {
        return Err(ServerError::Validation(
            "fullDescription is required".to_owned(),
        ));
    }
    if body.thumbnail.trim().is_empty() {
        return Err(ServerError::Validation("thumbnail is required".to_owned()));
    }
    if body.screenshots.len() > MAX_SCREENSHOTS {
        return Err(ServerError::Validation(format!(
            "at most {MAX_SCREENSHOTS} screenshots are allowed"
        )));
    }
    if body.files.is_empty() {
        return Err(ServerError::Validation(
            "at least one content file is required".to_owned(),
        ));
    }
    if body.files.len() > MAX_CONTENT_FILES {
        return Err(ServerError::Validation(format!(
            "at most {MAX_CONTENT_FILES} content files are allowed"
        )));
    }
    if let Some(status) = &body.status {
        validate_status(status)?;
    }
    Ok(())
}

pub(crate) fn validate_item_type(item_type: &str) -> Result<(), ServerError> {
    if ITEM_TYPES.contains(&item_type) {
        Ok(())
    } else {
        Err(ServerError::Validation(format!(
            "type must be one of: {}",
            ITEM_TYPES.join(", ")
        )))
    }
}

pub(crate) fn validate_status(status: &str) -> Result<(), ServerError> {
    if ITEM_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ServerError::Validation(format!(
            "status must be one of: {}",
            ITEM_STATUSES.join(", ")
        )))
    }
}

fn validate_short_description(short_description: &str) -> Result<(), ServerError> {
    if short_description.trim().is_empty() {
        return Err(ServerError::Validation(
            "shortDescription is required".to_owned(),
        ));
    }
    if short_description.chars().count() > 200 {
        return Err(ServerError::Validation(
            "shortDescription must be at most 200 characters".to_owned(),
        ));
    }
    Ok(())
}

/// Split a comma-separated tag list into a trimmed, de-duplicated set
/// that preserves first-seen order.
pub(crate) fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',') {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_owned());
        }
    }
    tags
}

pub(crate) fn parse_sort(raw: Option<&str>) -> ItemSort {
    match raw.unwrap_or("-createdAt") {
        "createdAt" => ItemSort::CreatedAsc,
        "-downloadsCount" | "downloads" => ItemSort::DownloadsDesc,
        "title" => ItemSort::TitleAsc,
        _ => ItemSort::CreatedDesc,
    }
}

pub(crate) fn page_request(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> PageRequest {
    PageRequest {
        page: page.unwrap_or(1).max(1),
        limit: limit.unwrap_or(default_limit).clamp(1, 100),
    }
}

pub(crate) fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn not_found_item(id: &str) -> ServerError {
    ServerError::NotFound(format!("item {id} not found"))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::download::{download_file, DownloadQuery};
    use crate::storage::AssetClass;
    use crate::testutil::{admin_headers, test_state};

    async fn uploaded_fixture(state: &AppState) -> (String, UploadedFileBody) {
        let thumb = state
            .blobs
            .store_bytes(AssetClass::Thumbnail, "cover.png", b"\x89PNG")
            .await
            .unwrap();
        let archive = state
            .blobs
            .store_bytes(AssetClass::ContentFile, "epic-sword.zip", b"PK\x03\x04")
            .await
            .unwrap();
        (
            thumb.storage_path,
            UploadedFileBody {
                filename: archive.filename.clone(),
                original_name: "epic-sword.zip".to_owned(),
                size: 4,
                file_type: "application/zip".to_owned(),
                storage_url: archive.storage_path,
            },
        )
    }

    fn create_body(title: &str, thumbnail: String, file: UploadedFileBody) -> CreateItemBody {
        CreateItemBody {
            title: title.to_owned(),
            item_type: "mod".to_owned(),
            version: "1.0.0".to_owned(),
            game_version: "1.20".to_owned(),
            author: None,
            tags: Some("weapons, swords, weapons".to_owned()),
            short_description: "A sword.".to_owned(),
            full_description: "A very epic sword.".to_owned(),
            install_instructions: None,
            changelog: None,
            thumbnail,
            screenshots: Vec::new(),
            files: vec![file],
            status: None,
        }
    }

    #[test]
    fn split_tags_trims_and_dedups_preserving_order() {
        assert_eq!(
            split_tags("weapons, swords ,weapons,, magic"),
            vec!["weapons", "swords", "magic"]
        );
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn sort_parsing_is_whitelisted() {
        assert_eq!(parse_sort(None), ItemSort::CreatedDesc);
        assert_eq!(parse_sort(Some("createdAt")), ItemSort::CreatedAsc);
        assert_eq!(parse_sort(Some("-downloadsCount")), ItemSort::DownloadsDesc);
        assert_eq!(parse_sort(Some("title")), ItemSort::TitleAsc);
        assert_eq!(parse_sort(Some("; DROP TABLE items")), ItemSort::CreatedDesc);
    }

    #[test]
    fn page_request_clamps_inputs() {
        let page = page_request(Some(-3), Some(1000), 12);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 100);
        assert_eq!(page_request(None, None, 12).limit, 12);
        assert_eq!(total_pages(25, 12), 3);
        assert_eq!(total_pages(0, 12), 0);
    }

    #[tokio::test]
    async fn create_rejects_missing_files_and_persists_nothing() {
        let (state, _dir) = test_state().await;
        let (thumb, file) = uploaded_fixture(&state).await;

        let mut body = create_body("Epic Sword Mod", thumb.clone(), file.clone());
        body.files.clear();
        let err = create_item(State(state.clone()), admin_headers(), Json(body))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Validation(_)));

        let mut body = create_body("Epic Sword Mod", thumb, file);
        body.thumbnail = String::new();
        let err = create_item(State(state.clone()), admin_headers(), Json(body))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Validation(ref m) if m.contains("thumbnail")));

        let (_, total) = state
            .store
            .list_items(
                &ItemFilter::default(),
                ItemSort::CreatedDesc,
                PageRequest { page: 1, limit: 10 },
            )
            .await
            .unwrap();
        assert_eq!(total, 0, "failed creation must persist nothing");
    }

    #[tokio::test]
    async fn create_rejects_bad_type_and_long_short_description() {
        let (state, _dir) = test_state().await;
        let (thumb, file) = uploaded_fixture(&state).await;

        let mut body = create_body("Epic Sword Mod", thumb.clone(), file.clone());
        body.item_type = "plugin".to_owned();
        let err = create_item(State(state.clone()), admin_headers(), Json(body))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Validation(ref m) if m.contains("type")));

        let mut body = create_body("Epic Sword Mod", thumb, file);
        body.short_description = "x".repeat(201);
        let err = create_item(State(state.clone()), admin_headers(), Json(body))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Validation(ref m) if m.contains("200")));
    }

    #[tokio::test]
    async fn create_rejects_unreferenced_blob_paths() {
        let (state, _dir) = test_state().await;
        let (_, file) = uploaded_fixture(&state).await;

        let body = create_body("Epic Sword Mod", "images/absent.png".to_owned(), file);
        let err = create_item(State(state.clone()), admin_headers(), Json(body))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Validation(ref m) if m.contains("absent.png")));
    }

    #[tokio::test]
    async fn epic_sword_mod_end_to_end() {
        let (state, _dir) = test_state().await;

        // Create: slug is minted from the title.
        let (thumb, file) = uploaded_fixture(&state).await;
        let (status, Json(created)) = create_item(
            State(state.clone()),
            admin_headers(),
            Json(create_body("Epic Sword Mod", thumb, file)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.slug, "epic-sword-mod");
        assert_eq!(created.author, "steve");
        assert_eq!(created.tags, vec!["weapons", "swords"]);

        // A second item with a colliding title gets a suffixed slug.
        let (thumb2, file2) = uploaded_fixture(&state).await;
        let (_, Json(second)) = create_item(
            State(state.clone()),
            admin_headers(),
            Json(create_body("Epic Sword Mod!!", thumb2, file2)),
        )
        .await
        .unwrap();
        assert!(second.slug.starts_with("epic-sword-mod-"));
        assert_ne!(second.slug, created.slug);

        // Public fetch by slug.
        let Json(fetched) = item_by_slug(State(state.clone()), Path("epic-sword-mod".to_owned()))
            .await
            .unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.files.len(), 1);

        // Download increments the counter from 0 to 1.
        let file_id = fetched.files[0].id.clone();
        let response = download_file(
            State(state.clone()),
            Path(file_id),
            axum::extract::Query(DownloadQuery {
                item_id: created.id.clone(),
            }),
            admin_headers(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(axum::http::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        assert!(disposition.contains("epic-sword.zip"));
        let after = state.store.get_item(&created.id).await.unwrap().unwrap();
        assert_eq!(after.downloads_count, 1);

        // Delete removes the archive and thumbnail from storage and the
        // record from the catalog.
        let thumbnail_path = fetched.thumbnail.clone();
        let archive_path = fetched.files[0].storage_url.clone();
        delete_item(State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap();
        assert!(state.blobs.resolve(&thumbnail_path).await.is_err());
        assert!(state.blobs.resolve(&archive_path).await.is_err());
        assert!(state
            .store
            .get_item_by_slug("epic-sword-mod", true)
            .await
            .unwrap()
            .is_none());

        let err = item_by_slug(State(state.clone()), Path("epic-sword-mod".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_unknown_item_is_not_found_without_side_effects() {
        let (state, _dir) = test_state().await;
        let err = delete_item(State(state.clone()), Path("absent".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_title_regenerates_slug_and_keeps_other_fields() {
        let (state, _dir) = test_state().await;
        let (thumb, file) = uploaded_fixture(&state).await;
        let (_, Json(created)) = create_item(
            State(state.clone()),
            admin_headers(),
            Json(create_body("Epic Sword Mod", thumb, file)),
        )
        .await
        .unwrap();

        let patch = UpdateItemBody {
            title: Some("Legendary Sword Mod".to_owned()),
            ..Default::default()
        };
        let Json(updated) = update_item(
            State(state.clone()),
            Path(created.id.clone()),
            Json(patch),
        )
        .await
        .unwrap();
        assert_eq!(updated.slug, "legendary-sword-mod");
        assert_eq!(updated.version, created.version);
        assert_eq!(updated.files.len(), 1);

        // Patching an unknown id is a 404.
        let err = update_item(
            State(state.clone()),
            Path("absent".to_owned()),
            Json(UpdateItemBody::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }
}
