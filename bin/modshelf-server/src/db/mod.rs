//! Database abstraction layer.
//!
//! [`CatalogStore`] and [`HistoryStore`] define the interfaces the handlers
//! depend on.  The default implementation is [`sqlite::SqliteStore`].  To
//! swap to another database (Postgres, MySQL, …), implement both traits for
//! your new type and change the concrete type in [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures (stable since
//! Rust 1.75) so no extra `async-trait` crate is required.

pub mod sqlite;

use chrono::{DateTime, Utc};

/// The fixed set of catalog item types.
pub const ITEM_TYPES: &[&str] = &[
    "mod",
    "texture-pack",
    "modpack",
    "shaderpack",
    "addon",
    "resource-pack",
    "tool",
];

/// The fixed set of item statuses.  Only `published` items are visible
/// through public read paths.
pub const ITEM_STATUSES: &[&str] = &["published", "draft", "archived"];

/// A row in the `items` table.
///
/// `tags` and `screenshots` are stored as JSON arrays in TEXT columns;
/// timestamps as RFC3339 TEXT.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub id: String,
    pub title: String,
    /// URL-safe unique identifier derived from `title`.
    pub slug: String,
    /// One of [`ITEM_TYPES`].
    pub item_type: String,
    pub version: String,
    pub game_version: String,
    /// Display name of the author.
    pub author: String,
    /// Owning-account reference, stamped once at creation.
    pub author_id: Option<String>,
    pub tags: Vec<String>,
    pub short_description: String,
    pub full_description: String,
    pub install_instructions: String,
    pub changelog: String,
    /// Storage path of the thumbnail image.
    pub thumbnail: String,
    /// Storage paths of up to ten screenshots, display order preserved.
    pub screenshots: Vec<String>,
    /// Mutated only by download accounting.
    pub downloads_count: i64,
    pub rating_average: f64,
    pub rating_count: i64,
    pub featured: bool,
    /// One of [`ITEM_STATUSES`].
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row in the `item_files` table – one downloadable archive.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: String,
    pub item_id: String,
    /// Generated on-disk filename.
    pub filename: String,
    /// Name the uploader gave the file; used for `Content-Disposition`.
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    /// Forward-slash relative path into the blob store.
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Filters for catalog listings.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub item_type: Option<String>,
    pub game_version: Option<String>,
    /// Any-match against the item's tag set.
    pub tags: Vec<String>,
    /// Free-text search over title, short description, and tags.
    pub search: Option<String>,
    /// Exact status filter (admin listings).
    pub status: Option<String>,
    /// Restrict to `status = 'published'` (public listings).
    pub published_only: bool,
}

/// Whitelisted sort orders for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSort {
    CreatedDesc,
    CreatedAsc,
    DownloadsDesc,
    TitleAsc,
}

impl ItemSort {
    pub fn to_sql(self) -> &'static str {
        match self {
            ItemSort::CreatedDesc => "created_at DESC",
            ItemSort::CreatedAsc => "created_at ASC",
            ItemSort::DownloadsDesc => "downloads_count DESC",
            ItemSort::TitleAsc => "title ASC",
        }
    }
}

/// 1-based page request for listings.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn offset(self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }
}

/// Condensed item row for the admin dashboard.
#[derive(Debug, Clone)]
pub struct ItemSummary {
    pub id: String,
    pub title: String,
    pub item_type: String,
    pub downloads_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Read-only aggregates for the admin dashboard.
#[derive(Debug, Clone)]
pub struct CatalogStats {
    pub total_items: i64,
    pub total_downloads: i64,
    pub items_by_type: Vec<(String, i64)>,
    pub recent_items: Vec<ItemSummary>,
}

/// Persistence interface for catalog records and their file descriptors.
pub trait CatalogStore: Send + Sync + 'static {
    /// Insert an item together with its file rows in one transaction.
    /// The record is committed only after every blob already exists.
    fn insert_item(
        &self,
        item: &ItemRecord,
        files: &[FileRecord],
    ) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_item(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ItemRecord>, sqlx::Error>> + Send;

    fn get_item_by_slug(
        &self,
        slug: &str,
        published_only: bool,
    ) -> impl std::future::Future<Output = Result<Option<ItemRecord>, sqlx::Error>> + Send;

    /// Does any item (other than `exclude_id`, when given) already hold
    /// this slug?
    fn slug_exists(
        &self,
        slug: &str,
        exclude_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Filtered, sorted, paginated listing.  Returns the page of records
    /// plus the total match count.
    fn list_items(
        &self,
        filter: &ItemFilter,
        sort: ItemSort,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<(Vec<ItemRecord>, i64), sqlx::Error>> + Send;

    fn list_featured(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ItemRecord>, sqlx::Error>> + Send;

    fn list_trending(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ItemRecord>, sqlx::Error>> + Send;

    /// Persist the mutable metadata columns of `item` (everything except
    /// `downloads_count`, `rating_*`, and `created_at`, which have their
    /// own write paths or none).
    fn update_item(
        &self,
        item: &ItemRecord,
    ) -> impl std::future::Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Flip the featured flag.  Returns `false` when the id is unknown.
    fn toggle_featured(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Purge the record and its file rows.  Returns `false` when the id is
    /// unknown.  Blob cleanup is the lifecycle layer's job and happens
    /// before this call.
    fn delete_item(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<bool, sqlx::Error>> + Send;

    fn files_for_item(
        &self,
        item_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<FileRecord>, sqlx::Error>> + Send;

    fn get_file(
        &self,
        item_id: &str,
        file_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<FileRecord>, sqlx::Error>> + Send;

    /// Atomically add one to `downloads_count` against the stored value –
    /// a relative UPDATE, never a read-modify-write round trip, so racing
    /// downloads cannot lose increments.  Returns `false` when the id is
    /// unknown.
    fn increment_downloads(
        &self,
        item_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, sqlx::Error>> + Send;

    fn stats(
        &self,
    ) -> impl std::future::Future<Output = Result<CatalogStats, sqlx::Error>> + Send;
}

/// Persistence interface for per-account download history.
pub trait HistoryStore: Send + Sync + 'static {
    /// Append one `{item_id, downloaded_at: now}` entry.  Callers treat
    /// failures as best-effort (logged, never surfaced to the client).
    fn append_download(
        &self,
        account_id: &str,
        item_id: &str,
    ) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;
}
