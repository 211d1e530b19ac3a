use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Approval Repository
// ============================================================================

const APPROVAL_COLUMNS: &str = "a.id AS id, a.artwork_version_id AS artwork_version_id, \
     a.approver_id AS approver_id, a.sender_id AS sender_id, a.status AS status, \
     a.comment AS comment, a.sent_at AS sent_at, a.last_reminder_at AS last_reminder_at, \
     a.decided_at AS decided_at";

const RETURNING_COLUMNS: &str = "id, artwork_version_id, approver_id, sender_id, status, \
     comment, sent_at, last_reminder_at, decided_at";

fn map_approval(r: &SqliteRow) -> AppResult<ApprovalRequest> {
    let status: String = r.get("status");
    Ok(ApprovalRequest {
        id: r.get("id"),
        artwork_version_id: r.get("artwork_version_id"),
        approver_id: r.get("approver_id"),
        sender_id: r.get("sender_id"),
        status: ApprovalStatus::from_str(&status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Invalid approval status: {}", status))
        })?,
        comment: r.get("comment"),
        sent_at: r.get("sent_at"),
        last_reminder_at: r.get("last_reminder_at"),
        decided_at: r.get("decided_at"),
    })
}

/// Result of a reminder attempt.
#[derive(Debug)]
pub enum ReminderOutcome {
    Sent(ApprovalReminder),
    /// A previous reminder is still inside the cooldown window.
    CoolingDown { remaining: Duration },
    NotPending,
    RecipientMismatch,
    NotFound,
}

/// Why a reminder cannot be sent right now, if anything stops it.
fn reminder_blocked(
    approval: &ApprovalRequest,
    recipient_id: &str,
    cooldown: Duration,
    now: NaiveDateTime,
) -> Option<ReminderOutcome> {
    if approval.status != ApprovalStatus::Pending {
        return Some(ReminderOutcome::NotPending);
    }

    if approval.approver_id != recipient_id {
        return Some(ReminderOutcome::RecipientMismatch);
    }

    match approval.last_reminder_at {
        Some(last) if last + cooldown > now => Some(ReminderOutcome::CoolingDown {
            remaining: last + cooldown - now,
        }),
        _ => None,
    }
}

pub struct ApprovalRepository;

impl ApprovalRepository {
    pub async fn create(
        pool: &SqlitePool,
        artwork_version_id: &str,
        approver_id: &str,
        sender_id: &str,
    ) -> AppResult<ApprovalRequest> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO approval_requests (
                id, artwork_version_id, approver_id, sender_id, status, sent_at
            ) VALUES (?, ?, ?, ?, 'pending', ?)
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(artwork_version_id)
        .bind(approver_id)
        .bind(sender_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        map_approval(&row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<ApprovalRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_requests a WHERE a.id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.as_ref().map(map_approval).transpose()
    }

    /// Approval requests for every version of an artwork, newest first.
    pub async fn list_by_artwork(
        pool: &SqlitePool,
        artwork_id: &str,
    ) -> AppResult<Vec<ApprovalRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {APPROVAL_COLUMNS}
            FROM approval_requests a
            JOIN artwork_versions v ON v.id = a.artwork_version_id
            WHERE v.artwork_id = ?
            ORDER BY a.sent_at DESC
            "#
        ))
        .bind(artwork_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(map_approval).collect()
    }

    pub async fn list_reminders(
        pool: &SqlitePool,
        approval_id: &str,
    ) -> AppResult<Vec<ApprovalReminder>> {
        sqlx::query_as::<_, ApprovalReminder>(
            r#"
            SELECT id, approval_id, recipient_id, sender_id, sent_at
            FROM approval_reminders
            WHERE approval_id = ?
            ORDER BY sent_at ASC
            "#,
        )
        .bind(approval_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Approval `approval_id` if it belongs to a version of `artwork_id`.
    pub async fn find_for_artwork(
        pool: &SqlitePool,
        artwork_id: &str,
        approval_id: &str,
    ) -> AppResult<Option<ApprovalRequest>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {APPROVAL_COLUMNS}
            FROM approval_requests a
            JOIN artwork_versions v ON v.id = a.artwork_version_id
            WHERE a.id = ? AND v.artwork_id = ?
            "#
        ))
        .bind(approval_id)
        .bind(artwork_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.as_ref().map(map_approval).transpose()
    }

    /// Record a reminder for a pending approval, enforcing the cooldown.
    ///
    /// The approval is read and checked first. The write transaction then
    /// opens with a compare-and-swap of `last_reminder_at` against the value
    /// that was read, so its first statement takes the write lock. Losing
    /// the swap reports `CoolingDown`.
    pub async fn send_reminder(
        pool: &SqlitePool,
        artwork_id: &str,
        approval_id: &str,
        recipient_id: &str,
        sender_id: &str,
        cooldown: Duration,
        now: NaiveDateTime,
    ) -> AppResult<ReminderOutcome> {
        let approval = match Self::find_for_artwork(pool, artwork_id, approval_id).await? {
            Some(a) => a,
            None => return Ok(ReminderOutcome::NotFound),
        };

        if let Some(blocked) = reminder_blocked(&approval, recipient_id, cooldown, now) {
            return Ok(blocked);
        }

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let swapped = sqlx::query(
            r#"
            UPDATE approval_requests
            SET last_reminder_at = ?
            WHERE id = ? AND status = 'pending' AND last_reminder_at IS ?
            "#,
        )
        .bind(now)
        .bind(&approval.id)
        .bind(approval.last_reminder_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        if swapped.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::Database)?;

            // Someone else changed the approval in between; report what they left.
            let current = Self::find_by_id(pool, &approval.id).await?;
            return Ok(current
                .and_then(|a| reminder_blocked(&a, recipient_id, cooldown, now))
                .unwrap_or(ReminderOutcome::CoolingDown { remaining: cooldown }));
        }

        let reminder = sqlx::query_as::<_, ApprovalReminder>(
            r#"
            INSERT INTO approval_reminders (id, approval_id, recipient_id, sender_id, sent_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, approval_id, recipient_id, sender_id, sent_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&approval.id)
        .bind(recipient_id)
        .bind(sender_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(ReminderOutcome::Sent(reminder))
    }

    /// Settle a pending approval. Approving also marks the artwork approved.
    /// Returns `None` when the approval was no longer pending.
    pub async fn decide(
        pool: &SqlitePool,
        approval_id: &str,
        approved: bool,
        comment: Option<&str>,
    ) -> AppResult<Option<ApprovalRequest>> {
        let now = Utc::now().naive_utc();
        let status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE approval_requests
            SET status = ?, comment = ?, decided_at = ?
            WHERE id = ? AND status = 'pending'
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(status.as_str())
        .bind(comment)
        .bind(now)
        .bind(approval_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let approval = match row.as_ref().map(map_approval).transpose()? {
            Some(a) => a,
            None => return Ok(None),
        };

        if approved {
            sqlx::query(
                r#"
                UPDATE artworks
                SET status = 'approved', updated_at = ?
                WHERE id = (SELECT artwork_id FROM artwork_versions WHERE id = ?)
                "#,
            )
            .bind(now)
            .bind(&approval.artwork_version_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        }

        tx.commit().await.map_err(AppError::Database)?;

        Ok(Some(approval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ArtworkRepository, UserRepository};
    use crate::services::init::init_memory_db;

    async fn user(pool: &SqlitePool, email: &str) -> User {
        UserRepository::create(
            pool,
            CreateUser {
                email: email.to_string(),
                display_name: "Test".to_string(),
                password_hash: "x".to_string(),
            },
        )
        .await
        .unwrap()
    }

    async fn pending_approval(pool: &SqlitePool) -> (Artwork, ApprovalRequest) {
        let owner = user(pool, "owner@studio.com").await;
        let approver = user(pool, "client@corp.com").await;
        let artwork = ArtworkRepository::create(pool, &owner.id, "Poster", None)
            .await
            .unwrap();
        let version = ArtworkRepository::add_version(pool, &artwork.id, "art/v1.png")
            .await
            .unwrap();
        let approval = ApprovalRepository::create(pool, &version.id, &approver.id, &owner.id)
            .await
            .unwrap();
        (artwork, approval)
    }

    #[tokio::test]
    async fn reminder_cooldown_is_enforced_between_sends() {
        let pool = init_memory_db().await.unwrap();
        let (artwork, approval) = pending_approval(&pool).await;
        let cooldown = Duration::hours(24);
        let t0 = Utc::now().naive_utc();

        let send = |now| {
            ApprovalRepository::send_reminder(
                &pool,
                &artwork.id,
                &approval.id,
                &approval.approver_id,
                &approval.sender_id,
                cooldown,
                now,
            )
        };

        assert!(matches!(send(t0).await.unwrap(), ReminderOutcome::Sent(_)));

        match send(t0 + Duration::hours(1)).await.unwrap() {
            ReminderOutcome::CoolingDown { remaining } => {
                assert_eq!(remaining, Duration::hours(23))
            }
            other => panic!("expected cooldown, got {:?}", other),
        }

        assert!(matches!(
            send(t0 + Duration::hours(24)).await.unwrap(),
            ReminderOutcome::Sent(_)
        ));

        let reminders = ApprovalRepository::list_reminders(&pool, &approval.id)
            .await
            .unwrap();
        assert_eq!(reminders.len(), 2);

        let stored = ApprovalRepository::find_by_id(&pool, &approval.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_reminder_at, Some(t0 + Duration::hours(24)));
    }

    #[tokio::test]
    async fn reminder_rejects_wrong_recipient_and_decided_approvals() {
        let pool = init_memory_db().await.unwrap();
        let (artwork, approval) = pending_approval(&pool).await;
        let now = Utc::now().naive_utc();

        let outcome = ApprovalRepository::send_reminder(
            &pool,
            &artwork.id,
            &approval.id,
            "someone-else",
            &approval.sender_id,
            Duration::hours(24),
            now,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ReminderOutcome::RecipientMismatch));

        let outcome = ApprovalRepository::send_reminder(
            &pool,
            "other-artwork",
            &approval.id,
            &approval.approver_id,
            &approval.sender_id,
            Duration::hours(24),
            now,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ReminderOutcome::NotFound));

        ApprovalRepository::decide(&pool, &approval.id, false, Some("Não"))
            .await
            .unwrap()
            .unwrap();
        assert!(ApprovalRepository::decide(&pool, &approval.id, true, None)
            .await
            .unwrap()
            .is_none());

        let outcome = ApprovalRepository::send_reminder(
            &pool,
            &artwork.id,
            &approval.id,
            &approval.approver_id,
            &approval.sender_id,
            Duration::hours(24),
            now,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ReminderOutcome::NotPending));
        assert!(ApprovalRepository::list_reminders(&pool, &approval.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reminders_send_exactly_once() {
        let path = std::env::temp_dir().join(format!("arte-review-{}.db", Uuid::new_v4()));
        let mut config = crate::config::Config::default();
        config.database.url = format!("sqlite://{}", path.display());
        config.database.max_connections = 8;
        let pool = crate::services::init::init_db(&config).await.unwrap();

        let owner = user(&pool, "owner@studio.com").await;
        let approver = user(&pool, "client@corp.com").await;
        let now = Utc::now().naive_utc();

        for round in 0..10 {
            let artwork = ArtworkRepository::create(&pool, &owner.id, "Poster", None)
                .await
                .unwrap();
            let version =
                ArtworkRepository::add_version(&pool, &artwork.id, &format!("art/{}.png", round))
                    .await
                    .unwrap();
            let approval = ApprovalRepository::create(&pool, &version.id, &approver.id, &owner.id)
                .await
                .unwrap();

            let mut tasks = Vec::new();
            for _ in 0..4 {
                let pool = pool.clone();
                let artwork_id = artwork.id.clone();
                let approval_id = approval.id.clone();
                let approver_id = approver.id.clone();
                let owner_id = owner.id.clone();
                tasks.push(tokio::spawn(async move {
                    ApprovalRepository::send_reminder(
                        &pool,
                        &artwork_id,
                        &approval_id,
                        &approver_id,
                        &owner_id,
                        Duration::hours(24),
                        now,
                    )
                    .await
                }));
            }

            let mut sent = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(ReminderOutcome::Sent(_)) => sent += 1,
                    Ok(ReminderOutcome::CoolingDown { .. }) => {}
                    other => panic!("unexpected reminder outcome: {:?}", other),
                }
            }
            assert_eq!(sent, 1, "round {}", round);

            let reminders = ApprovalRepository::list_reminders(&pool, &approval.id)
                .await
                .unwrap();
            assert_eq!(reminders.len(), 1);
        }

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
