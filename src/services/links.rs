use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::db::{
    ArtworkRepository, CreateSharedLink, LinkKind, ProjectRepository, SharedLink,
    SharedLinkRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::artworks::{ArtworkDetail, ArtworkService, ProjectDetail};
use crate::services::auth::AuthService;
use crate::AppState;

pub const TOKEN_LENGTH: usize = 32;

/// Parameters for a new shared link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub kind: LinkKind,
    pub target_id: String,
    pub expires_in_hours: Option<i64>,
    pub read_only: bool,
    pub can_comment: bool,
    pub can_download: bool,
}

/// What a link points at, loaded for the viewer.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LinkTarget {
    Artwork(ArtworkDetail),
    Project(ProjectDetail),
}

pub struct LinkService;

impl LinkService {
    pub fn generate_token() -> String {
        AuthService::generate_random_string(TOKEN_LENGTH)
    }

    /// Resolve a token to a live link.
    ///
    /// Unknown and expired tokens are both reported as not found so a caller
    /// cannot tell them apart.
    pub async fn resolve(state: &Arc<AppState>, token: &str) -> AppResult<SharedLink> {
        Self::resolve_at(state, token, Utc::now().naive_utc()).await
    }

    pub async fn resolve_at(
        state: &Arc<AppState>,
        token: &str,
        now: NaiveDateTime,
    ) -> AppResult<SharedLink> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Validation(crate::i18n::t(
                "bad_request.token_required",
            )));
        }

        let link = SharedLinkRepository::find_by_token(&state.db, token)
            .await?
            .ok_or_else(|| {
                tracing::debug!("Shared link token not found");
                AppError::NotFound(crate::i18n::t("not_found.link"))
            })?;

        if link.is_expired_at(now) {
            tracing::debug!("Shared link {} expired at {:?}", link.id, link.expires_at);
            return Err(AppError::NotFound(crate::i18n::t("not_found.link")));
        }

        Ok(link)
    }

    /// Viewer URL a token redirects to.
    pub fn viewer_url(public_app_url: &str, link: &SharedLink) -> String {
        format!(
            "{}/view/{}/{}?token={}",
            public_app_url.trim_end_matches('/'),
            link.kind.viewer_segment(),
            urlencoding::encode(&link.target_id),
            urlencoding::encode(&link.token)
        )
    }

    /// Load the artwork or project a link points at.
    pub async fn load_target(state: &Arc<AppState>, link: &SharedLink) -> AppResult<LinkTarget> {
        match link.kind {
            LinkKind::Artwork => {
                let artwork = ArtworkRepository::find_by_id(&state.db, &link.target_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.artwork")))?;
                Ok(LinkTarget::Artwork(
                    ArtworkService::artwork_detail(state, artwork).await?,
                ))
            }
            LinkKind::Project => {
                let project = ProjectRepository::find_by_id(&state.db, &link.target_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.project")))?;
                Ok(LinkTarget::Project(
                    ArtworkService::project_detail(state, project).await?,
                ))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Owner management
    // ------------------------------------------------------------------------

    pub async fn create(
        state: &Arc<AppState>,
        owner_id: &str,
        new: NewLink,
    ) -> AppResult<SharedLink> {
        let expires_at = match new.expires_in_hours {
            Some(hours) if hours <= 0 => {
                return Err(AppError::Validation(crate::i18n::t("validation.expires_in")));
            }
            Some(hours) => Some(Utc::now().naive_utc() + Duration::hours(hours)),
            None => None,
        };

        match new.kind {
            LinkKind::Artwork => {
                ArtworkService::owned_artwork(state, owner_id, &new.target_id).await?;
            }
            LinkKind::Project => {
                ArtworkService::owned_project(state, owner_id, &new.target_id).await?;
            }
        }

        let link = SharedLinkRepository::create(
            &state.db,
            CreateSharedLink {
                owner_id: owner_id.to_string(),
                token: Self::generate_token(),
                kind: new.kind,
                target_id: new.target_id,
                expires_at,
                read_only: new.read_only,
                can_comment: new.can_comment,
                can_download: new.can_download,
            },
        )
        .await?;

        tracing::info!(
            "Created {} link {} for target {}",
            link.kind.as_str(),
            link.id,
            link.target_id
        );
        Ok(link)
    }

    pub async fn list(state: &Arc<AppState>, owner_id: &str) -> AppResult<Vec<SharedLink>> {
        SharedLinkRepository::list_by_owner(&state.db, owner_id).await
    }

    /// Revoke a link. Tokens of deleted links resolve as not found.
    pub async fn revoke(state: &Arc<AppState>, owner_id: &str, link_id: &str) -> AppResult<()> {
        if !SharedLinkRepository::delete(&state.db, owner_id, link_id).await? {
            return Err(AppError::NotFound(crate::i18n::t("not_found.shared_link")));
        }
        tracing::info!("Revoked shared link {}", link_id);
        Ok(())
    }
}
