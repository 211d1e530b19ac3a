use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};

use crate::db::{
    ApprovalReminder, ApprovalRepository, ApprovalRequest, ApprovalStatus, ArtworkRepository,
    ReminderOutcome, User, UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::artworks::ArtworkService;
use crate::AppState;

/// A reminder request from the artwork owner.
#[derive(Debug, Clone, Default)]
pub struct ReminderRequest {
    pub approval_id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub cooldown_hours: Option<i64>,
}

pub struct ApprovalService;

impl ApprovalService {
    /// Ask `approver_id` to approve a version of an artwork (latest by default).
    pub async fn request(
        state: &Arc<AppState>,
        owner: &User,
        artwork_id: &str,
        version_id: Option<&str>,
        approver_id: &str,
    ) -> AppResult<ApprovalRequest> {
        let artwork = ArtworkService::owned_artwork(state, &owner.id, artwork_id).await?;

        let approver_id = approver_id.trim();
        if approver_id.is_empty() {
            return Err(AppError::Validation(crate::i18n::t("validation.recipient_id")));
        }
        UserRepository::find_by_id(&state.db, approver_id)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.user")))?;

        let version = match version_id.filter(|v| !v.is_empty()) {
            Some(version_id) => ArtworkRepository::find_version(&state.db, version_id)
                .await?
                .filter(|v| v.artwork_id == artwork.id),
            None => ArtworkRepository::latest_version(&state.db, &artwork.id).await?,
        }
        .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.version")))?;

        let approval =
            ApprovalRepository::create(&state.db, &version.id, approver_id, &owner.id).await?;

        tracing::info!(
            "Requested approval {} of artwork {} v{} from {}",
            approval.id,
            artwork.id,
            version.version_number,
            approver_id
        );
        Ok(approval)
    }

    pub async fn list(
        state: &Arc<AppState>,
        owner: &User,
        artwork_id: &str,
    ) -> AppResult<Vec<ApprovalRequest>> {
        let artwork = ArtworkService::owned_artwork(state, &owner.id, artwork_id).await?;
        ApprovalRepository::list_by_artwork(&state.db, &artwork.id).await
    }

    /// Record the approver's decision. Only pending requests can be decided.
    pub async fn decide(
        state: &Arc<AppState>,
        user: &User,
        approval_id: &str,
        approved: bool,
        comment: Option<&str>,
    ) -> AppResult<ApprovalRequest> {
        let approval = ApprovalRepository::find_by_id(&state.db, approval_id)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.approval")))?;

        if approval.approver_id != user.id {
            return Err(AppError::ForbiddenWithReason(crate::i18n::t(
                "forbidden.not_approver",
            )));
        }

        if approval.status != ApprovalStatus::Pending {
            return Err(AppError::Conflict(crate::i18n::t("conflict.approval_decided")));
        }

        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        let decided = ApprovalRepository::decide(&state.db, &approval.id, approved, comment)
            .await?
            .ok_or_else(|| AppError::Conflict(crate::i18n::t("conflict.approval_decided")))?;

        tracing::info!(
            "Approval {} decided as {} by {}",
            decided.id,
            decided.status.as_str(),
            user.id
        );
        Ok(decided)
    }

    /// Send a reminder for a pending approval, at most once per cooldown window.
    pub async fn remind(
        state: &Arc<AppState>,
        owner: &User,
        artwork_id: &str,
        request: ReminderRequest,
    ) -> AppResult<ApprovalReminder> {
        Self::remind_at(state, owner, artwork_id, request, Utc::now().naive_utc()).await
    }

    pub async fn remind_at(
        state: &Arc<AppState>,
        owner: &User,
        artwork_id: &str,
        request: ReminderRequest,
        now: NaiveDateTime,
    ) -> AppResult<ApprovalReminder> {
        let approval_id = request.approval_id.trim();
        if approval_id.is_empty() {
            return Err(AppError::Validation(crate::i18n::t("validation.approval_id")));
        }

        let recipient_id = request.recipient_id.trim();
        if recipient_id.is_empty() {
            return Err(AppError::Validation(crate::i18n::t("validation.recipient_id")));
        }

        let cooldown_hours = request
            .cooldown_hours
            .unwrap_or(state.config.reminders.default_cooldown_hours);
        if cooldown_hours < 0 {
            return Err(AppError::Validation(crate::i18n::t("validation.cooldown")));
        }

        let artwork = ArtworkService::owned_artwork(state, &owner.id, artwork_id).await?;
        let sender_id = request
            .sender_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(owner.id.as_str());

        let outcome = ApprovalRepository::send_reminder(
            &state.db,
            &artwork.id,
            approval_id,
            recipient_id,
            sender_id,
            Duration::hours(cooldown_hours),
            now,
        )
        .await?;

        match outcome {
            ReminderOutcome::Sent(reminder) => {
                tracing::info!(
                    "Sent reminder {} for approval {} to {}",
                    reminder.id,
                    approval_id,
                    recipient_id
                );
                Ok(reminder)
            }
            ReminderOutcome::CoolingDown { remaining } => {
                tracing::debug!(
                    "Reminder for approval {} rejected; {}s of cooldown left",
                    approval_id,
                    remaining.num_seconds()
                );
                Err(AppError::BadRequest(cooldown_message(remaining)))
            }
            ReminderOutcome::NotPending => {
                Err(AppError::BadRequest(crate::i18n::t("reminder.not_pending")))
            }
            ReminderOutcome::RecipientMismatch => Err(AppError::Validation(crate::i18n::t(
                "validation.recipient_mismatch",
            ))),
            ReminderOutcome::NotFound => {
                Err(AppError::NotFound(crate::i18n::t("not_found.approval")))
            }
        }
    }
}

/// Cooldown message with the remaining time rounded up to whole hours.
fn cooldown_message(remaining: Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    let hours = ((minutes + 59) / 60).max(1);
    crate::i18n::t_with("reminder.cooldown", &[("hours", &hours.to_string())])
}
