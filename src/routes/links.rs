use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::LinkKind;
use crate::error::AppError;
use crate::services::links::{LinkService, LinkTarget};
use crate::AppState;

/// Public token endpoints. Mounted at the root so `/l/{token}` stays short.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/l/:token", get(redirect_to_viewer))
        .route("/api/l/:token", get(resolve_link))
}

#[derive(Debug, Serialize)]
pub struct ResolvedLinkResponse {
    pub kind: LinkKind,
    pub target_id: String,
    pub expires_at: Option<NaiveDateTime>,
    pub read_only: bool,
    pub can_comment: bool,
    pub can_download: bool,
    pub target: LinkTarget,
}

/// `GET /l/{token}`: 307 to the viewer page for the link's target.
async fn redirect_to_viewer(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Redirect, AppError> {
    let public_app_url = state
        .config
        .server
        .public_app_url
        .as_deref()
        .ok_or_else(|| {
            tracing::error!("PUBLIC_APP_URL is not configured; cannot redirect shared links");
            AppError::ServiceUnavailable(crate::i18n::t("unavailable.public_url"))
        })?;

    let link = LinkService::resolve(&state, &token).await?;
    let target = LinkService::viewer_url(public_app_url, &link);

    tracing::debug!("Redirecting shared link {} to viewer", link.id);
    Ok(Redirect::temporary(&target))
}

/// `GET /api/l/{token}`: link permissions plus the target it points at.
async fn resolve_link(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ResolvedLinkResponse>, AppError> {
    let link = LinkService::resolve(&state, &token).await?;
    let target = LinkService::load_target(&state, &link).await?;

    Ok(Json(ResolvedLinkResponse {
        kind: link.kind,
        target_id: link.target_id,
        expires_at: link.expires_at,
        read_only: link.read_only,
        can_comment: link.can_comment,
        can_download: link.can_download,
        target,
    }))
}
