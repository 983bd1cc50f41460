use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::{FileRecord, ItemRecord};

/// Body for `POST /api/items`.
///
/// File and image fields reference storage paths previously returned by
/// the upload endpoint.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemBody {
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub version: String,
    pub game_version: String,
    /// Display name; defaults to the acting account's username.
    #[serde(default)]
    pub author: Option<String>,
    /// Comma-separated tag list, e.g. `"weapons, swords"`.
    #[serde(default)]
    pub tags: Option<String>,
    pub short_description: String,
    pub full_description: String,
    #[serde(default)]
    pub install_instructions: Option<String>,
    #[serde(default)]
    pub changelog: Option<String>,
    /// Storage path of the thumbnail image.
    pub thumbnail: String,
    #[serde(default)]
    pub screenshots: Vec<String>,
    pub files: Vec<UploadedFileBody>,
    /// Defaults to `"published"`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Explicit partial update for `PUT /api/items/{id}` – one optional field
/// per mutable attribute.  Unknown fields are rejected rather than being
/// silently merged into the record.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateItemBody {
    /// Changing the title regenerates the slug.
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub version: Option<String>,
    pub game_version: Option<String>,
    pub author: Option<String>,
    /// Comma-separated tag list.
    pub tags: Option<String>,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
    pub install_instructions: Option<String>,
    pub changelog: Option<String>,
    pub thumbnail: Option<String>,
    pub screenshots: Option<Vec<String>>,
    pub status: Option<String>,
}

/// One uploaded content file as echoed by the upload endpoint and
/// accepted back by item creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileBody {
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub file_type: String,
    pub storage_url: String,
}

/// Query parameters for the public catalog listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub game_version: Option<String>,
    /// Comma-separated tags; an item matches if it carries any of them.
    pub tags: Option<String>,
    pub search: Option<String>,
    /// One of `-createdAt` (default), `createdAt`, `-downloadsCount`,
    /// `title`.
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RatingResponse {
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptorResponse {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub file_type: String,
    pub storage_url: String,
    pub uploaded_at: String,
}

/// Full catalog item as served by every read path.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub version: String,
    pub game_version: String,
    pub author: String,
    pub author_id: Option<String>,
    pub tags: Vec<String>,
    pub short_description: String,
    pub full_description: String,
    pub install_instructions: String,
    pub changelog: String,
    pub thumbnail: String,
    pub screenshots: Vec<String>,
    pub files: Vec<FileDescriptorResponse>,
    pub downloads_count: i64,
    pub rating: RatingResponse,
    pub featured: bool,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ItemResponse {
    pub fn from_record(item: ItemRecord, files: Vec<FileRecord>) -> Self {
        Self {
            id: item.id,
            title: item.title,
            slug: item.slug,
            item_type: item.item_type,
            version: item.version,
            game_version: item.game_version,
            author: item.author,
            author_id: item.author_id,
            tags: item.tags,
            short_description: item.short_description,
            full_description: item.full_description,
            install_instructions: item.install_instructions,
            changelog: item.changelog,
            thumbnail: item.thumbnail,
            screenshots: item.screenshots,
            files: files
                .into_iter()
                .map(|f| FileDescriptorResponse {
                    id: f.id,
                    filename: f.filename,
                    original_name: f.original_name,
                    size: f.size_bytes,
                    file_type: f.mime_type,
                    storage_url: f.storage_path,
                    uploaded_at: f.uploaded_at.to_rfc3339(),
                })
                .collect(),
            downloads_count: item.downloads_count,
            rating: RatingResponse {
                average: item.rating_average,
                count: item.rating_count,
            },
            featured: item.featured,
            status: item.status,
            created_at: item.created_at.to_rfc3339(),
            updated_at: item.updated_at.to_rfc3339(),
        }
    }
}

/// Pagination envelope shared by all item listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagedItemsResponse {
    pub items: Vec<ItemResponse>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total: i64,
}
