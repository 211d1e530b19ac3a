use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Artwork Repository
// ============================================================================

const ARTWORK_COLUMNS: &str =
    "id, owner_id, project_id, title, status, closed_at, created_at, updated_at";

fn map_artwork(r: &SqliteRow) -> AppResult<Artwork> {
    let status: String = r.get("status");
    Ok(Artwork {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        project_id: r.get("project_id"),
        title: r.get("title"),
        status: ArtworkStatus::try_from(status.as_str())
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
        closed_at: r.get("closed_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

pub struct ArtworkRepository;

impl ArtworkRepository {
    pub async fn create(
        pool: &SqlitePool,
        owner_id: &str,
        title: &str,
        project_id: Option<&str>,
    ) -> AppResult<Artwork> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO artworks (id, owner_id, project_id, title, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'open', ?, ?)
            RETURNING {ARTWORK_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(owner_id)
        .bind(project_id)
        .bind(title)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        map_artwork(&row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Artwork>> {
        let row = sqlx::query(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.as_ref().map(map_artwork).transpose()
    }

    pub async fn list_by_owner(pool: &SqlitePool, owner_id: &str) -> AppResult<Vec<Artwork>> {
        let rows = sqlx::query(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE owner_id = ? ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(map_artwork).collect()
    }

    pub async fn list_by_project(pool: &SqlitePool, project_id: &str) -> AppResult<Vec<Artwork>> {
        let rows = sqlx::query(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE project_id = ? ORDER BY created_at ASC"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(map_artwork).collect()
    }

    /// Close an open artwork. Returns `None` when the artwork was not open
    /// (already closed or approved), so concurrent closes only succeed once.
    pub async fn close(pool: &SqlitePool, id: &str) -> AppResult<Option<Artwork>> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            UPDATE artworks
            SET status = 'closed', closed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'open'
            RETURNING {ARTWORK_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.as_ref().map(map_artwork).transpose()
    }

    // ------------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------------

    /// Append a version. The version number is computed inside the INSERT so
    /// two concurrent uploads cannot claim the same number.
    pub async fn add_version(
        pool: &SqlitePool,
        artwork_id: &str,
        file_path: &str,
    ) -> AppResult<ArtworkVersion> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, ArtworkVersion>(
            r#"
            INSERT INTO artwork_versions (id, artwork_id, version_number, file_path, created_at)
            SELECT ?, ?, COALESCE(MAX(version_number), 0) + 1, ?, ?
            FROM artwork_versions
            WHERE artwork_id = ?
            RETURNING id, artwork_id, version_number, file_path, created_at
            "#,
        )
        .bind(&id)
        .bind(artwork_id)
        .bind(file_path)
        .bind(now)
        .bind(artwork_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_versions(
        pool: &SqlitePool,
        artwork_id: &str,
    ) -> AppResult<Vec<ArtworkVersion>> {
        sqlx::query_as::<_, ArtworkVersion>(
            r#"
            SELECT id, artwork_id, version_number, file_path, created_at
            FROM artwork_versions
            WHERE artwork_id = ?
            ORDER BY version_number ASC
            "#,
        )
        .bind(artwork_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn latest_version(
        pool: &SqlitePool,
        artwork_id: &str,
    ) -> AppResult<Option<ArtworkVersion>> {
        sqlx::query_as::<_, ArtworkVersion>(
            r#"
            SELECT id, artwork_id, version_number, file_path, created_at
            FROM artwork_versions
            WHERE artwork_id = ?
            ORDER BY version_number DESC
            LIMIT 1
            "#,
        )
        .bind(artwork_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_version(
        pool: &SqlitePool,
        version_id: &str,
    ) -> AppResult<Option<ArtworkVersion>> {
        sqlx::query_as::<_, ArtworkVersion>(
            r#"
            SELECT id, artwork_id, version_number, file_path, created_at
            FROM artwork_versions
            WHERE id = ?
            "#,
        )
        .bind(version_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}
