use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Feedback Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackKind {
    Text,
    Audio,
}

impl FeedbackKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TEXT" => Some(FeedbackKind::Text),
            "AUDIO" => Some(FeedbackKind::Audio),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Text => "TEXT",
            FeedbackKind::Audio => "AUDIO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Open,
    Resolved,
}

impl FeedbackStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(FeedbackStatus::Open),
            "resolved" => Some(FeedbackStatus::Resolved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStatus::Open => "open",
            FeedbackStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub artwork_id: String,
    pub version_id: Option<String>,
    pub content: String,
    pub kind: FeedbackKind,
    pub attachment_path: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_user_id: Option<String>,
    pub shared_link_id: Option<String>,
    pub status: FeedbackStatus,
    pub created_at: NaiveDateTime,
}

/// Insert payload for a feedback row. Rows are append-only.
#[derive(Debug, Clone)]
pub struct CreateFeedback {
    pub artwork_id: String,
    pub version_id: Option<String>,
    pub content: String,
    pub kind: FeedbackKind,
    pub attachment_path: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_user_id: Option<String>,
    pub shared_link_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct FeedbackReply {
    pub id: String,
    pub feedback_id: String,
    pub content: String,
    pub author_name: Option<String>,
    pub author_user_id: Option<String>,
    pub shared_link_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateFeedbackReply {
    pub feedback_id: String,
    pub content: String,
    pub author_name: Option<String>,
    pub author_user_id: Option<String>,
    pub shared_link_id: Option<String>,
}
