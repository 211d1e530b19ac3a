use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Feedback Repository
// ============================================================================

const FEEDBACK_COLUMNS: &str = "id, artwork_id, version_id, content, kind, attachment_path, \
     author_name, author_email, author_user_id, shared_link_id, status, created_at";

fn map_feedback(r: &SqliteRow) -> AppResult<Feedback> {
    let kind: String = r.get("kind");
    let status: String = r.get("status");
    Ok(Feedback {
        id: r.get("id"),
        artwork_id: r.get("artwork_id"),
        version_id: r.get("version_id"),
        content: r.get("content"),
        kind: FeedbackKind::from_str(&kind)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Invalid feedback kind: {}", kind)))?,
        attachment_path: r.get("attachment_path"),
        author_name: r.get("author_name"),
        author_email: r.get("author_email"),
        author_user_id: r.get("author_user_id"),
        shared_link_id: r.get("shared_link_id"),
        status: FeedbackStatus::from_str(&status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Invalid feedback status: {}", status))
        })?,
        created_at: r.get("created_at"),
    })
}

pub struct FeedbackRepository;

impl FeedbackRepository {
    /// Append a feedback row. Feedback content is never updated afterwards.
    pub async fn create(pool: &SqlitePool, feedback: CreateFeedback) -> AppResult<Feedback> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO feedbacks (
                id, artwork_id, version_id, content, kind, attachment_path,
                author_name, author_email, author_user_id, shared_link_id, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'open', ?)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(&feedback.artwork_id)
        .bind(&feedback.version_id)
        .bind(&feedback.content)
        .bind(feedback.kind.as_str())
        .bind(&feedback.attachment_path)
        .bind(&feedback.author_name)
        .bind(&feedback.author_email)
        .bind(&feedback.author_user_id)
        .bind(&feedback.shared_link_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        map_feedback(&row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Feedback>> {
        let row = sqlx::query(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedbacks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.as_ref().map(map_feedback).transpose()
    }

    /// All feedback for an artwork, oldest first. Ties on `created_at` are
    /// broken by rowid so insertion order is preserved.
    pub async fn list_by_artwork(pool: &SqlitePool, artwork_id: &str) -> AppResult<Vec<Feedback>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {FEEDBACK_COLUMNS}
            FROM feedbacks
            WHERE artwork_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#
        ))
        .bind(artwork_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(map_feedback).collect()
    }

    pub async fn count_by_artwork(pool: &SqlitePool, artwork_id: &str) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM feedbacks WHERE artwork_id = ?")
            .bind(artwork_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.get("total"))
    }

    /// The review status is the only mutable column on a feedback row.
    pub async fn update_status(
        pool: &SqlitePool,
        id: &str,
        status: FeedbackStatus,
    ) -> AppResult<Option<Feedback>> {
        let row = sqlx::query(&format!(
            "UPDATE feedbacks SET status = ? WHERE id = ? RETURNING {FEEDBACK_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.as_ref().map(map_feedback).transpose()
    }

    // ------------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------------

    pub async fn create_reply(
        pool: &SqlitePool,
        reply: CreateFeedbackReply,
    ) -> AppResult<FeedbackReply> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, FeedbackReply>(
            r#"
            INSERT INTO feedback_replies (
                id, feedback_id, content, author_name, author_user_id, shared_link_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, feedback_id, content, author_name, author_user_id, shared_link_id, created_at
            "#,
        )
        .bind(&id)
        .bind(&reply.feedback_id)
        .bind(&reply.content)
        .bind(&reply.author_name)
        .bind(&reply.author_user_id)
        .bind(&reply.shared_link_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_replies(
        pool: &SqlitePool,
        feedback_id: &str,
    ) -> AppResult<Vec<FeedbackReply>> {
        sqlx::query_as::<_, FeedbackReply>(
            r#"
            SELECT id, feedback_id, content, author_name, author_user_id, shared_link_id, created_at
            FROM feedback_replies
            WHERE feedback_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(feedback_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
