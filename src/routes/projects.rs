use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::{Project, ProjectRepository};
use crate::error::AppError;
use crate::routes::auth::AuthUser;
use crate::services::artworks::{ArtworkService, ProjectDetail};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/:id", get(get_project))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = ArtworkService::create_project(&state, &user.id, &request.name).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(ProjectRepository::list_by_owner(&state.db, &user.id).await?))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetail>, AppError> {
    let project = ArtworkService::owned_project(&state, &user.id, &id).await?;
    Ok(Json(ArtworkService::project_detail(&state, project).await?))
}
