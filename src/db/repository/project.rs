use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::Project;
use crate::error::{AppError, AppResult};

pub struct ProjectRepository;

impl ProjectRepository {
    pub async fn create(pool: &SqlitePool, owner_id: &str, name: &str) -> AppResult<Project> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, owner_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, owner_id, name, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Project>> {
        sqlx::query_as::<_, Project>(
            "SELECT id, owner_id, name, created_at, updated_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_owner(pool: &SqlitePool, owner_id: &str) -> AppResult<Vec<Project>> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, owner_id, name, created_at, updated_at
            FROM projects
            WHERE owner_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
