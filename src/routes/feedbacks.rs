use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{Feedback, FeedbackReply};
use crate::error::AppError;
use crate::routes::artworks::TokenQuery;
use crate::routes::auth::{AuthUser, MaybeAuthUser};
use crate::services::feedback::{FeedbackGateway, ReplyInput};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id/respostas", get(list_replies).post(create_reply))
        .route("/:id/status", patch(update_status))
}

#[derive(Debug, Deserialize)]
pub struct CreateReplyRequest {
    #[serde(default)]
    pub content: String,
    pub author_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

async fn list_replies(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<FeedbackReply>>, AppError> {
    let (feedback, _artwork, _access) =
        FeedbackGateway::access_feedback(&state, &id, query.token.as_deref(), user).await?;
    Ok(Json(FeedbackGateway::list_replies(&state, &feedback).await?))
}

async fn create_reply(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
    Json(request): Json<CreateReplyRequest>,
) -> Result<(StatusCode, Json<FeedbackReply>), AppError> {
    let (feedback, artwork, access) =
        FeedbackGateway::access_feedback(&state, &id, query.token.as_deref(), user).await?;

    let reply = FeedbackGateway::create_reply(
        &state,
        &feedback,
        &artwork,
        &access,
        ReplyInput {
            content: request.content,
            author_name: request.author_name,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// Owner marks a feedback as resolved (or reopens it).
async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Feedback>, AppError> {
    let feedback = FeedbackGateway::set_status(&state, &user, &id, &request.status).await?;
    Ok(Json(feedback))
}
