//! Admin catalog management: list-all, bulk delete, featured toggle, and
//! dashboard aggregates.  Everything here sits behind the bearer-token
//! guard; the real role checks live in the external authorization service
//! in front of this API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::db::{CatalogStore, ItemFilter, ItemSort};
use crate::error::ServerError;
use crate::middleware::auth;
use crate::routes::items::{
    items_with_files, page_request, sweep_item_blobs, total_pages, validate_item_type,
    validate_status,
};
use crate::schemas::admin::{
    AdminListQuery, BulkDeleteBody, BulkDeleteResponse, RecentItemResponse, StatsResponse,
    TypeCountResponse,
};
use crate::schemas::items::{ItemResponse, PagedItemsResponse};
use crate::state::AppState;

const ADMIN_PAGE_SIZE: i64 = 20;

#[derive(OpenApi)]
#[openapi(
    paths(list_all_items, bulk_delete_items, toggle_featured, get_stats),
    components(schemas(
        BulkDeleteBody,
        BulkDeleteResponse,
        StatsResponse,
        TypeCountResponse,
        RecentItemResponse,
    ))
)]
pub struct AdminApi;

// Routes nested under `/api/admin`.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", get(list_all_items))
        .route("/items/bulk-delete", post(bulk_delete_items))
        .route("/items/{id}/featured", put(toggle_featured))
        .route("/stats", get(get_stats))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::check_admin_auth,
        ))
}

/// All items regardless of status (`GET /api/admin/items`).
#[utoipa::path(
    get,
    path = "/api/admin/items",
    tag = "admin",
    params(AdminListQuery),
    responses(
        (status = 200, description = "Page of items, drafts and archived included", body = PagedItemsResponse),
        (status = 401, description = "Unauthorised (admin token required)"),
    )
)]
pub async fn list_all_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<PagedItemsResponse>, ServerError> {
    if let Some(item_type) = &query.item_type {
        validate_item_type(item_type)?;
    }
    if let Some(status) = &query.status {
        validate_status(status)?;
    }
    let filter = ItemFilter {
        item_type: query.item_type.clone(),
        status: query.status.clone(),
        published_only: false,
        ..Default::default()
    };
    let page = page_request(query.page, query.limit, ADMIN_PAGE_SIZE);

    let (records, total) = state
        .store
        .list_items(&filter, ItemSort::CreatedDesc, page)
        .await?;
    let items = items_with_files(&state.store, records).await?;

    Ok(Json(PagedItemsResponse {
        items,
        total_pages: total_pages(total, page.limit),
        current_page: page.page,
        total,
    }))
}

/// Delete a set of items in one pass
/// (`POST /api/admin/items/bulk-delete`).
///
/// Best-effort per id: unknown ids are skipped, each existing item has
/// its blobs swept before its record is purged, and the response reports
/// the count actually deleted.
#[utoipa::path(
    post,
    path = "/api/admin/items/bulk-delete",
    tag = "admin",
    request_body = BulkDeleteBody,
    responses(
        (status = 200, description = "Count of deleted items", body = BulkDeleteResponse),
        (status = 400, description = "Empty id set"),
        (status = 401, description = "Unauthorised (admin token required)"),
    )
)]
pub async fn bulk_delete_items(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkDeleteBody>,
) -> Result<Json<BulkDeleteResponse>, ServerError> {
    if body.item_ids.is_empty() {
        return Err(ServerError::Validation(
            "itemIds must be a non-empty array".to_owned(),
        ));
    }

    let mut deleted = 0i64;
    for id in &body.item_ids {
        let Some(item) = state.store.get_item(id).await? else {
            continue;
        };
        let files = state.store.files_for_item(id).await?;
        sweep_item_blobs(&state.blobs, &item, &files).await;
        if state.store.delete_item(id).await? {
            deleted += 1;
        }
    }

    info!(requested = body.item_ids.len(), deleted, "bulk delete finished");
    Ok(Json(BulkDeleteResponse {
        deleted,
        message: format!("{deleted} items deleted successfully"),
    }))
}

/// Flip an item's featured flag (`PUT /api/admin/items/{id}/featured`).
#[utoipa::path(
    put,
    path = "/api/admin/items/{id}/featured",
    tag = "admin",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item with the flag flipped", body = ItemResponse),
        (status = 401, description = "Unauthorised (admin token required)"),
        (status = 404, description = "Item not found"),
    )
)]
pub async fn toggle_featured(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ServerError> {
    if !state.store.toggle_featured(&id).await? {
        return Err(ServerError::NotFound(format!("item {id} not found")));
    }
    let item = state
        .store
        .get_item(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("item {id} not found")))?;
    let files = state.store.files_for_item(&id).await?;
    Ok(Json(ItemResponse::from_record(item, files)))
}

/// Dashboard aggregates (`GET /api/admin/stats`).
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    responses(
        (status = 200, description = "Catalog totals", body = StatsResponse),
        (status = 401, description = "Unauthorised (admin token required)"),
    )
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ServerError> {
    let stats = state.store.stats().await?;
    Ok(Json(StatsResponse {
        total_items: stats.total_items,
        total_downloads: stats.total_downloads,
        items_by_type: stats
            .items_by_type
            .into_iter()
            .map(|(item_type, count)| TypeCountResponse { item_type, count })
            .collect(),
        recent_items: stats
            .recent_items
            .into_iter()
            .map(|item| RecentItemResponse {
                id: item.id,
                title: item.title,
                item_type: item.item_type,
                downloads_count: item.downloads_count,
                created_at: item.created_at.to_rfc3339(),
            })
            .collect(),
    }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::StatusCode;
    use axum::Json;

    use crate::routes::items::create_item;
    use crate::schemas::items::{CreateItemBody, UploadedFileBody};
    use crate::storage::AssetClass;
    use crate::testutil::{admin_headers, test_state};

    async fn seeded_item(state: &Arc<AppState>, title: &str) -> ItemResponse {
        let thumb = state
            .blobs
            .store_bytes(AssetClass::Thumbnail, "cover.png", b"\x89PNG")
            .await
            .unwrap();
        let archive = state
            .blobs
            .store_bytes(AssetClass::ContentFile, "pack.zip", b"PK\x03\x04")
            .await
            .unwrap();
        let body = CreateItemBody {
            title: title.to_owned(),
            item_type: "mod".to_owned(),
            version: "1.0.0".to_owned(),
            game_version: "1.20".to_owned(),
            author: Some("steve".to_owned()),
            tags: None,
            short_description: "Short.".to_owned(),
            full_description: "Long.".to_owned(),
            install_instructions: None,
            changelog: None,
            thumbnail: thumb.storage_path,
            screenshots: Vec::new(),
            files: vec![UploadedFileBody {
                filename: archive.filename.clone(),
                original_name: "pack.zip".to_owned(),
                size: 4,
                file_type: "application/zip".to_owned(),
                storage_url: archive.storage_path,
            }],
            status: None,
        };
        let (status, Json(item)) = create_item(State(state.clone()), admin_headers(), Json(body))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        item
    }

    #[tokio::test]
    async fn bulk_delete_skips_unknown_ids_and_reports_accurate_count() {
        let (state, _dir) = test_state().await;
        let a = seeded_item(&state, "Alpha Mod").await;
        let b = seeded_item(&state, "Beta Mod").await;

        let Json(response) = bulk_delete_items(
            State(state.clone()),
            Json(BulkDeleteBody {
                item_ids: vec![a.id.clone(), "absent".to_owned(), b.id.clone()],
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.deleted, 2);

        assert!(state.store.get_item(&a.id).await.unwrap().is_none());
        assert!(state.store.get_item(&b.id).await.unwrap().is_none());
        // Blob sweep applies to bulk deletion exactly as to single deletion.
        assert!(state.blobs.resolve(&a.thumbnail).await.is_err());
        assert!(state.blobs.resolve(&a.files[0].storage_url).await.is_err());
    }

    #[tokio::test]
    async fn bulk_delete_rejects_empty_id_set() {
        let (state, _dir) = test_state().await;
        let err = bulk_delete_items(
            State(state.clone()),
            Json(BulkDeleteBody {
                item_ids: Vec::new(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::Validation(_)));
    }

    #[tokio::test]
    async fn toggle_featured_round_trips() {
        let (state, _dir) = test_state().await;
        let item = seeded_item(&state, "Alpha Mod").await;

        let Json(toggled) = toggle_featured(State(state.clone()), Path(item.id.clone()))
            .await
            .unwrap();
        assert!(toggled.featured);

        let err = toggle_featured(State(state.clone()), Path("absent".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn admin_listing_includes_drafts() {
        let (state, _dir) = test_state().await;
        let item = seeded_item(&state, "Alpha Mod").await;
        // Demote to draft; it must still appear in the admin listing.
        crate::routes::items::update_item(
            State(state.clone()),
            Path(item.id.clone()),
            Json(crate::schemas::items::UpdateItemBody {
                status: Some("draft".to_owned()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        let Json(page) = list_all_items(
            State(state.clone()),
            Query(AdminListQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].status, "draft");
    }

    #[tokio::test]
    async fn stats_reflect_catalog_contents() {
        let (state, _dir) = test_state().await;
        seeded_item(&state, "Alpha Mod").await;
        seeded_item(&state, "Beta Mod").await;

        let Json(stats) = get_stats(State(state.clone())).await.unwrap();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.total_downloads, 0);
        assert_eq!(stats.recent_items.len(), 2);
    }
}
