use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body for `POST /api/admin/items/bulk-delete`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteBody {
    pub item_ids: Vec<String>,
}

/// Response for bulk deletion – `deleted` counts the records actually
/// purged, which can be lower than the requested set.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkDeleteResponse {
    pub deleted: i64,
    pub message: String,
}

/// Query parameters for the admin catalog listing (all statuses).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AdminListQuery {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeCountResponse {
    #[serde(rename = "type")]
    pub item_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentItemResponse {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub downloads_count: i64,
    pub created_at: String,
}

/// Read-only dashboard aggregates.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_items: i64,
    pub total_downloads: i64,
    pub items_by_type: Vec<TypeCountResponse>,
    pub recent_items: Vec<RecentItemResponse>,
}
