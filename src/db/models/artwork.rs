use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Artwork Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkStatus {
    Open,
    Closed,
    Approved,
}

impl ArtworkStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(ArtworkStatus::Open),
            "closed" => Some(ArtworkStatus::Closed),
            "approved" => Some(ArtworkStatus::Approved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtworkStatus::Open => "open",
            ArtworkStatus::Closed => "closed",
            ArtworkStatus::Approved => "approved",
        }
    }

    /// Only open artworks accept new feedback.
    pub fn accepts_feedback(self) -> bool {
        matches!(self, ArtworkStatus::Open)
    }
}

impl TryFrom<&str> for ArtworkStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid artwork status: {}", value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artwork {
    pub id: String,
    pub owner_id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub status: ArtworkStatus,
    pub closed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ArtworkVersion {
    pub id: String,
    pub artwork_id: String,
    pub version_number: i64,
    pub file_path: String,
    pub created_at: NaiveDateTime,
}
