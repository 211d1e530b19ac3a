use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::db::ApprovalRequest;
use crate::error::AppError;
use crate::routes::auth::AuthUser;
use crate::services::approvals::ApprovalService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:id/decisao", post(decide))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approved: bool,
    pub comment: Option<String>,
}

/// The designated approver accepts or rejects a pending request.
async fn decide(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ApprovalRequest>, AppError> {
    let approval = ApprovalService::decide(
        &state,
        &user,
        &id,
        request.approved,
        request.comment.as_deref(),
    )
    .await?;
    Ok(Json(approval))
}
