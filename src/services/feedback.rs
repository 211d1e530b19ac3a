//! Access gate for everything reachable through a shared-link token.
//!
//! Every read or write of feedback, replies and artwork files resolves an
//! [`Access`] first. Link holders are checked in this order: token present,
//! link exists, link not expired, link covers the artwork, permission flag.
//! Signed-in owners may use their session instead of a token.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

use crate::db::{
    Artwork, ArtworkRepository, CreateFeedback, CreateFeedbackReply, Feedback, FeedbackKind,
    FeedbackReply, FeedbackRepository, FeedbackStatus, LinkKind, SharedLink, SharedLinkRepository,
    User,
};
use crate::error::{AppError, AppResult};
use crate::services::artworks::ArtworkService;
use crate::services::storage::{self, SignedMethod, SignedUrl};
use crate::AppState;

pub const MAX_CONTENT_CHARS: usize = 5000;
const MAX_AUTHOR_FIELD_CHARS: usize = 200;

/// Who is acting on an artwork.
#[derive(Debug, Clone)]
pub enum Access {
    Link(SharedLink),
    Owner(User),
}

impl Access {
    fn shared_link_id(&self) -> Option<String> {
        match self {
            Access::Link(link) => Some(link.id.clone()),
            Access::Owner(_) => None,
        }
    }

    fn require_comment(&self) -> AppResult<()> {
        match self {
            Access::Link(link) if !link.allows_comments() => {
                tracing::debug!("Shared link {} does not allow comments", link.id);
                Err(AppError::ForbiddenWithReason(crate::i18n::t(
                    "forbidden.no_comment",
                )))
            }
            _ => Ok(()),
        }
    }

    fn require_download(&self) -> AppResult<()> {
        match self {
            Access::Link(link) if !link.can_download => {
                tracing::debug!("Shared link {} does not allow downloads", link.id);
                Err(AppError::ForbiddenWithReason(crate::i18n::t(
                    "forbidden.no_download",
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Feedback submitted by a link holder or the owner.
#[derive(Debug, Clone, Default)]
pub struct FeedbackInput {
    pub content: String,
    pub kind: Option<String>,
    pub version_id: Option<String>,
    pub attachment_path: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplyInput {
    pub content: String,
    pub author_name: Option<String>,
}

/// Whether a link grants access to `artwork`.
pub fn link_covers(link: &SharedLink, artwork: &Artwork) -> bool {
    match link.kind {
        LinkKind::Artwork => link.target_id == artwork.id,
        LinkKind::Project => artwork.project_id.as_deref() == Some(link.target_id.as_str()),
    }
}

pub struct FeedbackGateway;

impl FeedbackGateway {
    /// Resolve who may act on `artwork_id`.
    ///
    /// A token always takes the link path, even when a session is present.
    pub async fn access_artwork(
        state: &Arc<AppState>,
        artwork_id: &str,
        token: Option<&str>,
        user: Option<User>,
    ) -> AppResult<(Artwork, Access)> {
        Self::access_artwork_at(state, artwork_id, token, user, Utc::now().naive_utc()).await
    }

    pub async fn access_artwork_at(
        state: &Arc<AppState>,
        artwork_id: &str,
        token: Option<&str>,
        user: Option<User>,
        now: NaiveDateTime,
    ) -> AppResult<(Artwork, Access)> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());

        match (token, user) {
            (Some(token), _) => {
                let link = Self::authorize_token(state, token, now).await?;
                let artwork = Self::covered_artwork(state, &link, artwork_id).await?;
                Ok((artwork, Access::Link(link)))
            }
            (None, Some(user)) => {
                let artwork = ArtworkService::owned_artwork(state, &user.id, artwork_id).await?;
                Ok((artwork, Access::Owner(user)))
            }
            (None, None) => Err(AppError::BadRequest(crate::i18n::t(
                "bad_request.token_required",
            ))),
        }
    }

    /// Load `artwork_id` if `link` covers it. Missing artworks are reported
    /// as out of scope so a link holder cannot enumerate ids.
    async fn covered_artwork(
        state: &Arc<AppState>,
        link: &SharedLink,
        artwork_id: &str,
    ) -> AppResult<Artwork> {
        match ArtworkRepository::find_by_id(&state.db, artwork_id).await? {
            Some(artwork) if link_covers(link, &artwork) => Ok(artwork),
            _ => {
                tracing::debug!(
                    "Shared link {} does not cover artwork {}",
                    link.id,
                    artwork_id
                );
                Err(scope_denied())
            }
        }
    }

    /// Look up a token and reject expired links. Scope is checked by the caller.
    async fn authorize_token(
        state: &Arc<AppState>,
        token: &str,
        now: NaiveDateTime,
    ) -> AppResult<SharedLink> {
        let link = SharedLinkRepository::find_by_token(&state.db, token)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.link")))?;

        if link.is_expired_at(now) {
            tracing::debug!("Rejected expired shared link {}", link.id);
            return Err(AppError::ForbiddenWithReason(crate::i18n::t(
                "forbidden.link_expired",
            )));
        }

        Ok(link)
    }

    /// Resolve access to the artwork a feedback belongs to.
    ///
    /// The token is validated before the feedback row is read.
    pub async fn access_feedback(
        state: &Arc<AppState>,
        feedback_id: &str,
        token: Option<&str>,
        user: Option<User>,
    ) -> AppResult<(Feedback, Artwork, Access)> {
        Self::access_feedback_at(state, feedback_id, token, user, Utc::now().naive_utc()).await
    }

    pub async fn access_feedback_at(
        state: &Arc<AppState>,
        feedback_id: &str,
        token: Option<&str>,
        user: Option<User>,
        now: NaiveDateTime,
    ) -> AppResult<(Feedback, Artwork, Access)> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());

        match (token, user) {
            (Some(token), _) => {
                let link = Self::authorize_token(state, token, now).await?;
                let feedback = FeedbackRepository::find_by_id(&state.db, feedback_id).await?;
                let Some(feedback) = feedback else {
                    tracing::debug!(
                        "Shared link {} used for unknown feedback {}",
                        link.id,
                        feedback_id
                    );
                    return Err(scope_denied());
                };
                let artwork = Self::covered_artwork(state, &link, &feedback.artwork_id).await?;
                Ok((feedback, artwork, Access::Link(link)))
            }
            (None, Some(user)) => {
                let feedback = FeedbackRepository::find_by_id(&state.db, feedback_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.feedback")))?;
                let artwork =
                    ArtworkService::owned_artwork(state, &user.id, &feedback.artwork_id).await?;
                Ok((feedback, artwork, Access::Owner(user)))
            }
            (None, None) => Err(AppError::BadRequest(crate::i18n::t(
                "bad_request.token_required",
            ))),
        }
    }

    // ------------------------------------------------------------------------
    // Feedback
    // ------------------------------------------------------------------------

    /// All feedback for an artwork, oldest first.
    pub async fn list(state: &Arc<AppState>, artwork: &Artwork) -> AppResult<Vec<Feedback>> {
        FeedbackRepository::list_by_artwork(&state.db, &artwork.id).await
    }

    /// Append a feedback row. Nothing is written unless every check passes.
    pub async fn create(
        state: &Arc<AppState>,
        artwork: &Artwork,
        access: &Access,
        input: FeedbackInput,
    ) -> AppResult<Feedback> {
        access.require_comment()?;
        Self::require_open(artwork)?;

        let kind = match input.kind.as_deref() {
            None | Some("") => FeedbackKind::Text,
            Some(k) => FeedbackKind::from_str(k).ok_or_else(|| {
                AppError::Validation(crate::i18n::t_with("validation.kind", &[("kind", k)]))
            })?,
        };

        let content = input.content.trim().to_string();
        validate_content(&content, kind)?;

        let attachment_path = match kind {
            FeedbackKind::Audio => {
                let path = input
                    .attachment_path
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| storage::is_feedback_audio_path(p, &artwork.id))
                    .ok_or_else(|| {
                        AppError::Validation(crate::i18n::t("validation.audio_attachment"))
                    })?;
                Some(path.to_string())
            }
            FeedbackKind::Text => None,
        };

        let version_id = match input.version_id.as_deref().filter(|v| !v.is_empty()) {
            Some(version_id) => {
                let version = ArtworkRepository::find_version(&state.db, version_id).await?;
                match version {
                    Some(v) if v.artwork_id == artwork.id => Some(v.id),
                    _ => {
                        return Err(AppError::Validation(crate::i18n::t("not_found.version")));
                    }
                }
            }
            None => None,
        };

        let (author_name, author_email, author_user_id) = match access {
            Access::Owner(user) => (
                Some(user.display_name.clone()),
                Some(user.email.clone()),
                Some(user.id.clone()),
            ),
            Access::Link(_) => (
                clean_author_field(input.author_name),
                clean_author_field(input.author_email),
                None,
            ),
        };

        let feedback = FeedbackRepository::create(
            &state.db,
            CreateFeedback {
                artwork_id: artwork.id.clone(),
                version_id,
                content,
                kind,
                attachment_path,
                author_name,
                author_email,
                author_user_id,
                shared_link_id: access.shared_link_id(),
            },
        )
        .await?;

        tracing::info!(
            "Recorded {} feedback {} on artwork {}",
            feedback.kind.as_str(),
            feedback.id,
            artwork.id
        );
        Ok(feedback)
    }

    /// Owner-only review status change.
    pub async fn set_status(
        state: &Arc<AppState>,
        owner: &User,
        feedback_id: &str,
        status: &str,
    ) -> AppResult<Feedback> {
        let status = FeedbackStatus::from_str(status).ok_or_else(|| {
            AppError::Validation(crate::i18n::t_with(
                "validation.status",
                &[("status", status)],
            ))
        })?;

        let feedback = FeedbackRepository::find_by_id(&state.db, feedback_id)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.feedback")))?;
        ArtworkService::owned_artwork(state, &owner.id, &feedback.artwork_id).await?;

        FeedbackRepository::update_status(&state.db, &feedback.id, status)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.feedback")))
    }

    // ------------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------------

    pub async fn list_replies(
        state: &Arc<AppState>,
        feedback: &Feedback,
    ) -> AppResult<Vec<FeedbackReply>> {
        FeedbackRepository::list_replies(&state.db, &feedback.id).await
    }

    pub async fn create_reply(
        state: &Arc<AppState>,
        feedback: &Feedback,
        artwork: &Artwork,
        access: &Access,
        input: ReplyInput,
    ) -> AppResult<FeedbackReply> {
        access.require_comment()?;
        Self::require_open(artwork)?;

        let content = input.content.trim().to_string();
        validate_content(&content, FeedbackKind::Text)?;

        let (author_name, author_user_id) = match access {
            Access::Owner(user) => (Some(user.display_name.clone()), Some(user.id.clone())),
            Access::Link(_) => (clean_author_field(input.author_name), None),
        };

        let reply = FeedbackRepository::create_reply(
            &state.db,
            CreateFeedbackReply {
                feedback_id: feedback.id.clone(),
                content,
                author_name,
                author_user_id,
                shared_link_id: access.shared_link_id(),
            },
        )
        .await?;

        tracing::debug!("Recorded reply {} on feedback {}", reply.id, feedback.id);
        Ok(reply)
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    /// Signed download URL for the latest version of an artwork.
    pub async fn download_url(
        state: &Arc<AppState>,
        artwork: &Artwork,
        access: &Access,
    ) -> AppResult<SignedUrl> {
        access.require_download()?;

        let signer = state.storage.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable(crate::i18n::t("unavailable.storage"))
        })?;

        let version = ArtworkRepository::latest_version(&state.db, &artwork.id)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.version")))?;

        signer.sign(SignedMethod::Get, &version.file_path, Utc::now())
    }

    /// Signed upload slot for an audio feedback recording.
    pub async fn audio_upload_url(
        state: &Arc<AppState>,
        artwork: &Artwork,
        access: &Access,
    ) -> AppResult<SignedUrl> {
        access.require_comment()?;
        Self::require_open(artwork)?;

        let signer = state.storage.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable(crate::i18n::t("unavailable.storage"))
        })?;

        signer.sign(
            SignedMethod::Put,
            &storage::feedback_audio_path(&artwork.id),
            Utc::now(),
        )
    }

    fn require_open(artwork: &Artwork) -> AppResult<()> {
        if !artwork.status.accepts_feedback() {
            return Err(AppError::Conflict(crate::i18n::t("conflict.artwork_closed")));
        }
        Ok(())
    }
}

fn scope_denied() -> AppError {
    AppError::ForbiddenWithReason(crate::i18n::t("forbidden.link_scope"))
}

/// Text feedback needs content; audio may carry an optional note.
fn validate_content(content: &str, kind: FeedbackKind) -> AppResult<()> {
    if kind == FeedbackKind::Text && content.is_empty() {
        return Err(AppError::Validation(crate::i18n::t("validation.content_empty")));
    }

    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(crate::i18n::t_with(
            "validation.content_too_long",
            &[("max", &MAX_CONTENT_CHARS.to_string())],
        )));
    }

    Ok(())
}

fn clean_author_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().chars().take(MAX_AUTHOR_FIELD_CHARS).collect::<String>())
        .filter(|v| !v.is_empty())
}
