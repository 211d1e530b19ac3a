use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Shared Link Repository
// ============================================================================

const LINK_COLUMNS: &str = "id, owner_id, token, kind, target_id, expires_at, \
     read_only, can_comment, can_download, created_at";

fn map_link(r: &SqliteRow) -> AppResult<SharedLink> {
    let kind: String = r.get("kind");
    Ok(SharedLink {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        token: r.get("token"),
        kind: LinkKind::try_from(kind.as_str())
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
        target_id: r.get("target_id"),
        expires_at: r.get("expires_at"),
        read_only: r.get("read_only"),
        can_comment: r.get("can_comment"),
        can_download: r.get("can_download"),
        created_at: r.get("created_at"),
    })
}

pub struct SharedLinkRepository;

impl SharedLinkRepository {
    /// Create a new shared link (owner grants token holders access to a target).
    pub async fn create(pool: &SqlitePool, link: CreateSharedLink) -> AppResult<SharedLink> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO shared_links (
                id, owner_id, token, kind, target_id, expires_at,
                read_only, can_comment, can_download, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(&link.owner_id)
        .bind(&link.token)
        .bind(link.kind.as_str())
        .bind(&link.target_id)
        .bind(link.expires_at)
        .bind(link.read_only)
        .bind(link.can_comment)
        .bind(link.can_download)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        map_link(&row)
    }

    /// Look up a link by its token. Expiry is not checked here.
    pub async fn find_by_token(pool: &SqlitePool, token: &str) -> AppResult<Option<SharedLink>> {
        let row = sqlx::query(&format!(
            "SELECT {LINK_COLUMNS} FROM shared_links WHERE token = ? LIMIT 1"
        ))
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.as_ref().map(map_link).transpose()
    }

    pub async fn list_by_owner(pool: &SqlitePool, owner_id: &str) -> AppResult<Vec<SharedLink>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINK_COLUMNS} FROM shared_links WHERE owner_id = ? ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(map_link).collect()
    }

    /// Delete a link (revoke access). Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, owner_id: &str, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shared_links WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
