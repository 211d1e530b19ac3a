use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{
    ApprovalReminder, ApprovalRequest, Artwork, ArtworkRepository, ArtworkVersion, Feedback,
};
use crate::error::AppError;
use crate::routes::auth::{AuthUser, MaybeAuthUser};
use crate::services::approvals::{ApprovalService, ReminderRequest};
use crate::services::artworks::{ArtworkDetail, ArtworkService};
use crate::services::feedback::{FeedbackGateway, FeedbackInput};
use crate::services::storage::SignedUrl;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_artworks).post(create_artwork))
        .route("/:id", get(get_artwork))
        .route("/:id/versoes", post(add_version))
        .route("/:id/fechar", post(close_artwork))
        .route("/:id/feedbacks", get(list_feedbacks).post(create_feedback))
        .route("/:id/feedbacks/upload-url", post(audio_upload_url))
        .route("/:id/download", get(download))
        .route("/:id/lembrete", post(send_reminder))
        .route(
            "/:id/aprovacoes",
            get(list_approvals).post(request_approval),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// `?token=` on endpoints reachable through a shared link.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArtworkRequest {
    pub title: String,
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddVersionRequest {
    pub file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackRequest {
    #[serde(default)]
    pub content: String,
    pub kind: Option<String>,
    pub version_id: Option<String>,
    pub attachment_path: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderBody {
    #[serde(default)]
    pub approval_id: String,
    #[serde(default)]
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub cooldown_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub message: String,
    pub reminder: ApprovalReminder,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalBody {
    pub version_id: Option<String>,
    pub approver_id: String,
}

// ============================================================================
// Owner handlers
// ============================================================================

async fn create_artwork(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateArtworkRequest>,
) -> Result<(StatusCode, Json<Artwork>), AppError> {
    let artwork = ArtworkService::create_artwork(
        &state,
        &user.id,
        &request.title,
        request.project_id.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(artwork)))
}

async fn list_artworks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Artwork>>, AppError> {
    Ok(Json(ArtworkRepository::list_by_owner(&state.db, &user.id).await?))
}

async fn get_artwork(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ArtworkDetail>, AppError> {
    let artwork = ArtworkService::owned_artwork(&state, &user.id, &id).await?;
    Ok(Json(ArtworkService::artwork_detail(&state, artwork).await?))
}

async fn add_version(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<AddVersionRequest>,
) -> Result<(StatusCode, Json<ArtworkVersion>), AppError> {
    let version = ArtworkService::add_version(&state, &user.id, &id, &request.file_path).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// `POST /api/arte/{id}/fechar`: stop accepting feedback.
async fn close_artwork(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let artwork = ArtworkService::close(&state, &user.id, &id).await?;
    Ok(Json(serde_json::json!({
        "message": crate::i18n::t("artwork.closed"),
        "artwork": artwork,
    })))
}

// ============================================================================
// Token-gated handlers
// ============================================================================

async fn list_feedbacks(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<Feedback>>, AppError> {
    let (artwork, _access) =
        FeedbackGateway::access_artwork(&state, &id, query.token.as_deref(), user).await?;
    Ok(Json(FeedbackGateway::list(&state, &artwork).await?))
}

async fn create_feedback(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
    Json(request): Json<CreateFeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let (artwork, access) =
        FeedbackGateway::access_artwork(&state, &id, query.token.as_deref(), user).await?;

    let feedback = FeedbackGateway::create(
        &state,
        &artwork,
        &access,
        FeedbackInput {
            content: request.content,
            kind: request.kind,
            version_id: request.version_id,
            attachment_path: request.attachment_path,
            author_name: request.author_name,
            author_email: request.author_email,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(feedback)))
}

async fn audio_upload_url(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<SignedUrl>, AppError> {
    let (artwork, access) =
        FeedbackGateway::access_artwork(&state, &id, query.token.as_deref(), user).await?;
    Ok(Json(
        FeedbackGateway::audio_upload_url(&state, &artwork, &access).await?,
    ))
}

/// `GET /api/arte/{id}/download`: 307 to a signed URL of the latest version.
async fn download(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Redirect, AppError> {
    let (artwork, access) =
        FeedbackGateway::access_artwork(&state, &id, query.token.as_deref(), user).await?;
    let signed = FeedbackGateway::download_url(&state, &artwork, &access).await?;
    Ok(Redirect::temporary(&signed.url))
}

// ============================================================================
// Approvals
// ============================================================================

/// `POST /api/arte/{id}/lembrete`: remind the approver, once per cooldown.
async fn send_reminder(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<ReminderBody>,
) -> Result<Json<ReminderResponse>, AppError> {
    let reminder = ApprovalService::remind(
        &state,
        &user,
        &id,
        ReminderRequest {
            approval_id: body.approval_id,
            recipient_id: body.recipient_id,
            sender_id: body.sender_id,
            cooldown_hours: body.cooldown_hours,
        },
    )
    .await?;

    Ok(Json(ReminderResponse {
        message: crate::i18n::t("reminder.sent"),
        reminder,
    }))
}

async fn request_approval(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<ApprovalBody>,
) -> Result<(StatusCode, Json<ApprovalRequest>), AppError> {
    let approval = ApprovalService::request(
        &state,
        &user,
        &id,
        body.version_id.as_deref(),
        &body.approver_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(approval)))
}

async fn list_approvals(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ApprovalRequest>>, AppError> {
    Ok(Json(ApprovalService::list(&state, &user, &id).await?))
}
