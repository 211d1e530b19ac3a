use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::routes::artworks::TokenQuery;
use crate::routes::auth::MaybeAuthUser;
use crate::services::links::LinkService;
use crate::AppState;

/// Upstream transcription limit.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/tts", post(text_to_speech))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    pub voice: Option<String>,
}

/// Speech endpoints are open to signed-in users and to holders of a live link.
async fn require_caller(
    state: &Arc<AppState>,
    user: &MaybeAuthUser,
    query: &TokenQuery,
) -> Result<(), AppError> {
    if user.0.is_some() {
        return Ok(());
    }
    match query.token.as_deref() {
        Some(token) => LinkService::resolve(state, token).await.map(|_| ()),
        None => Err(AppError::Unauthorized),
    }
}

async fn transcribe(
    State(state): State<Arc<AppState>>,
    user: MaybeAuthUser,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscriptionResponse>, AppError> {
    require_caller(&state, &user, &query).await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/webm");

    if !content_type.starts_with("audio/") {
        return Err(AppError::BadRequest(format!(
            "Unsupported content type: {}",
            content_type
        )));
    }

    let text = state.speech.transcribe(body.to_vec(), content_type).await?;
    Ok(Json(TranscriptionResponse { text }))
}

async fn text_to_speech(
    State(state): State<Arc<AppState>>,
    user: MaybeAuthUser,
    Query(query): Query<TokenQuery>,
    Json(request): Json<TtsRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_caller(&state, &user, &query).await?;

    let audio = state
        .speech
        .synthesize(&request.text, request.voice.as_deref())
        .await?;

    Ok(([(header::CONTENT_TYPE, audio.content_type)], audio.bytes))
}
