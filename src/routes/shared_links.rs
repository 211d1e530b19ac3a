use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{LinkKind, SharedLink};
use crate::error::AppError;
use crate::routes::auth::AuthUser;
use crate::services::links::{LinkService, NewLink};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_links).post(create_link))
        .route("/:id", delete(revoke_link))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub kind: String,
    pub target_id: String,
    pub expires_in_hours: Option<i64>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub can_comment: bool,
    #[serde(default)]
    pub can_download: bool,
}

async fn create_link(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<SharedLink>), AppError> {
    let kind = LinkKind::from_str(&request.kind).ok_or_else(|| {
        AppError::Validation(crate::i18n::t_with(
            "validation.kind",
            &[("kind", &request.kind)],
        ))
    })?;

    let link = LinkService::create(
        &state,
        &user.id,
        NewLink {
            kind,
            target_id: request.target_id,
            expires_in_hours: request.expires_in_hours,
            read_only: request.read_only,
            can_comment: request.can_comment,
            can_download: request.can_download,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(link)))
}

async fn list_links(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<SharedLink>>, AppError> {
    Ok(Json(LinkService::list(&state, &user.id).await?))
}

async fn revoke_link(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    LinkService::revoke(&state, &user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
