//! SQLite implementation of [`CatalogStore`] and [`HistoryStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature.  Migrations are run
//! automatically on startup via [`SqliteStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR` (the crate root), so the directory is
//! embedded into the binary.  The database file location is determined at
//! runtime by `MODSHELF_DATABASE_URL` and is **not** related to the
//! current working directory at runtime.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used deliberately so that
//! no `DATABASE_URL` environment variable is needed at compile time.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    CatalogStats, CatalogStore, FileRecord, HistoryStore, ItemFilter, ItemRecord, ItemSort,
    ItemSummary, PageRequest,
};

const ITEM_COLUMNS: &str = "id, title, slug, item_type, version, game_version, author, \
     author_id, tags, short_description, full_description, install_instructions, changelog, \
     thumbnail, screenshots, downloads_count, rating_average, rating_count, featured, status, \
     created_at, updated_at";

const FILE_COLUMNS: &str =
    "id, item_id, filename, original_name, size_bytes, mime_type, storage_path, uploaded_at";

/// SQLite-backed catalog store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending
    /// migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://modshelf.db"`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn parse_dt(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

fn parse_string_array(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn to_json_array(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_owned())
}

fn row_to_item(row: &SqliteRow) -> Result<ItemRecord, sqlx::Error> {
    Ok(ItemRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        item_type: row.try_get("item_type")?,
        version: row.try_get("version")?,
        game_version: row.try_get("game_version")?,
        author: row.try_get("author")?,
        author_id: row.try_get("author_id")?,
        tags: parse_string_array(row.try_get::<String, _>("tags")?.as_str()),
        short_description: row.try_get("short_description")?,
        full_description: row.try_get("full_description")?,
        install_instructions: row.try_get("install_instructions")?,
        changelog: row.try_get("changelog")?,
        thumbnail: row.try_get("thumbnail")?,
        screenshots: parse_string_array(row.try_get::<String, _>("screenshots")?.as_str()),
        downloads_count: row.try_get("downloads_count")?,
        rating_average: row.try_get("rating_average")?,
        rating_count: row.try_get("rating_count")?,
        featured: row.try_get::<i64, _>("featured")? != 0,
        status: row.try_get("status")?,
        created_at: parse_dt(row.try_get::<String, _>("created_at")?.as_str()),
        updated_at: parse_dt(row.try_get::<String, _>("updated_at")?.as_str()),
    })
}

type FileRow = (String, String, String, String, i64, String, String, String);

fn tuple_to_file(row: FileRow) -> FileRecord {
    let (id, item_id, filename, original_name, size_bytes, mime_type, storage_path, uploaded_at) =
        row;
    FileRecord {
        id,
        item_id,
        filename,
        original_name,
        size_bytes,
        mime_type,
        storage_path,
        uploaded_at: parse_dt(&uploaded_at),
    }
}

/// Assemble the `WHERE` clause and its positional binds for a listing.
fn build_where(filter: &ItemFilter) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if filter.published_only {
        clauses.push("status = 'published'".to_owned());
    } else if let Some(status) = &filter.status {
        clauses.push("status = ?".to_owned());
        binds.push(status.clone());
    }
    if let Some(item_type) = &filter.item_type {
        clauses.push("item_type = ?".to_owned());
        binds.push(item_type.clone());
    }
    if let Some(game_version) = &filter.game_version {
        clauses.push("game_version = ?".to_owned());
        binds.push(game_version.clone());
    }
    if !filter.tags.is_empty() {
        // Tags are a JSON array in TEXT; `%"tag"%` matches one element
        // exactly, quotes included.
        let ors = vec!["tags LIKE ?"; filter.tags.len()].join(" OR ");
        clauses.push(format!("({ors})"));
        for tag in &filter.tags {
            binds.push(format!("%\"{tag}\"%"));
        }
    }
    if let Some(search) = &filter.search {
        clauses.push("(title LIKE ? OR short_description LIKE ? OR tags LIKE ?)".to_owned());
        let like = format!("%{search}%");
        binds.push(like.clone());
        binds.push(like.clone());
        binds.push(like);
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_sql, binds)
}

impl CatalogStore for SqliteStore {
    async fn insert_item(
        &self,
        item: &ItemRecord,
        files: &[FileRecord],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO items (id, title, slug, item_type, version, game_version, author, \
             author_id, tags, short_description, full_description, install_instructions, \
             changelog, thumbnail, screenshots, downloads_count, rating_average, rating_count, \
             featured, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20, ?21, ?22)",
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.slug)
        .bind(&item.item_type)
        .bind(&item.version)
        .bind(&item.game_version)
        .bind(&item.author)
        .bind(&item.author_id)
        .bind(to_json_array(&item.tags))
        .bind(&item.short_description)
        .bind(&item.full_description)
        .bind(&item.install_instructions)
        .bind(&item.changelog)
        .bind(&item.thumbnail)
        .bind(to_json_array(&item.screenshots))
        .bind(item.downloads_count)
        .bind(item.rating_average)
        .bind(item.rating_count)
        .bind(item.featured as i64)
        .bind(&item.status)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for file in files {
            sqlx::query(
                "INSERT INTO item_files (id, item_id, filename, original_name, size_bytes, \
                 mime_type, storage_path, uploaded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&file.id)
            .bind(&item.id)
            .bind(&file.filename)
            .bind(&file.original_name)
            .bind(file.size_bytes)
            .bind(&file.mime_type)
            .bind(&file.storage_path)
            .bind(file.uploaded_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn get_item(&self, id: &str) -> Result<Option<ItemRecord>, sqlx::Error> {
        sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"))
            .bind(id)
            .try_map(|row: SqliteRow| row_to_item(&row))
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_item_by_slug(
        &self,
        slug: &str,
        published_only: bool,
    ) -> Result<Option<ItemRecord>, sqlx::Error> {
        let sql = if published_only {
            format!("SELECT {ITEM_COLUMNS} FROM items WHERE slug = ?1 AND status = 'published'")
        } else {
            format!("SELECT {ITEM_COLUMNS} FROM items WHERE slug = ?1")
        };
        sqlx::query(&sql)
            .bind(slug)
            .try_map(|row: SqliteRow| row_to_item(&row))
            .fetch_optional(&self.pool)
            .await
    }

    async fn slug_exists(
        &self,
        slug: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = match exclude_id {
            Some(id) => {
                sqlx::query_as("SELECT 1 FROM items WHERE slug = ?1 AND id != ?2 LIMIT 1")
                    .bind(slug)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT 1 FROM items WHERE slug = ?1 LIMIT 1")
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        Ok(row.is_some())
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        sort: ItemSort,
        page: PageRequest,
    ) -> Result<(Vec<ItemRecord>, i64), sqlx::Error> {
        let (where_sql, binds) = build_where(filter);

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items{where_sql} ORDER BY {} LIMIT ? OFFSET ?",
            sort.to_sql()
        );
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let items = query
            .bind(page.limit)
            .bind(page.offset())
            .try_map(|row: SqliteRow| row_to_item(&row))
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM items{where_sql}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let (total,) = count_query.fetch_one(&self.pool).await?;

        Ok((items, total))
    }

    async fn list_featured(&self, limit: i64) -> Result<Vec<ItemRecord>, sqlx::Error> {
        sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE featured = 1 AND status = 'published' \
             ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .try_map(|row: SqliteRow| row_to_item(&row))
        .fetch_all(&self.pool)
        .await
    }

    async fn list_trending(&self, limit: i64) -> Result<Vec<ItemRecord>, sqlx::Error> {
        sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE status = 'published' \
             ORDER BY downloads_count DESC LIMIT ?1"
        ))
        .bind(limit)
        .try_map(|row: SqliteRow| row_to_item(&row))
        .fetch_all(&self.pool)
        .await
    }

    async fn update_item(&self, item: &ItemRecord) -> Result<bool, sqlx::Error> {
        // `downloads_count` has its own atomic write path and `featured`
        // its own toggle; neither is touched here so a metadata edit can
        // never clobber a racing download or toggle.
        let result = sqlx::query(
            "UPDATE items SET title = ?1, slug = ?2, item_type = ?3, version = ?4, \
             game_version = ?5, author = ?6, tags = ?7, short_description = ?8, \
             full_description = ?9, install_instructions = ?10, changelog = ?11, \
             thumbnail = ?12, screenshots = ?13, status = ?14, updated_at = ?15 \
             WHERE id = ?16",
        )
        .bind(&item.title)
        .bind(&item.slug)
        .bind(&item.item_type)
        .bind(&item.version)
        .bind(&item.game_version)
        .bind(&item.author)
        .bind(to_json_array(&item.tags))
        .bind(&item.short_description)
        .bind(&item.full_description)
        .bind(&item.install_instructions)
        .bind(&item.changelog)
        .bind(&item.thumbnail)
        .bind(to_json_array(&item.screenshots))
        .bind(&item.status)
        .bind(item.updated_at.to_rfc3339())
        .bind(&item.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_featured(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE items SET featured = CASE featured WHEN 0 THEN 1 ELSE 0 END, \
             updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_item(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM item_files WHERE item_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn files_for_item(&self, item_id: &str) -> Result<Vec<FileRecord>, sqlx::Error> {
        let rows: Vec<FileRow> = sqlx::query_as(&format!(
            "SELECT {FILE_COLUMNS} FROM item_files WHERE item_id = ?1 ORDER BY uploaded_at, id"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(tuple_to_file).collect())
    }

    async fn get_file(
        &self,
        item_id: &str,
        file_id: &str,
    ) -> Result<Option<FileRecord>, sqlx::Error> {
        let row: Option<FileRow> = sqlx::query_as(&format!(
            "SELECT {FILE_COLUMNS} FROM item_files WHERE id = ?1 AND item_id = ?2"
        ))
        .bind(file_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(tuple_to_file))
    }

    async fn increment_downloads(&self, item_id: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE items SET downloads_count = downloads_count + 1 WHERE id = ?1")
                .bind(item_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<CatalogStats, sqlx::Error> {
        let (total_items,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        let (total_downloads,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(downloads_count), 0) FROM items")
                .fetch_one(&self.pool)
                .await?;
        let items_by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT item_type, COUNT(*) FROM items GROUP BY item_type ORDER BY item_type",
        )
        .fetch_all(&self.pool)
        .await?;
        let recent: Vec<(String, String, String, i64, String)> = sqlx::query_as(
            "SELECT id, title, item_type, downloads_count, created_at FROM items \
             ORDER BY created_at DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(CatalogStats {
            total_items,
            total_downloads,
            items_by_type,
            recent_items: recent
                .into_iter()
                .map(
                    |(id, title, item_type, downloads_count, created_at)| ItemSummary {
                        id,
                        title,
                        item_type,
                        downloads_count,
                        created_at: parse_dt(&created_at),
                    },
                )
                .collect(),
        })
    }
}

// ── HistoryStore ──────────────────────────────────────────────────────────────

impl HistoryStore for SqliteStore {
    async fn append_download(&self, account_id: &str, item_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO download_history (id, account_id, item_id, downloaded_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(account_id)
        .bind(item_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
