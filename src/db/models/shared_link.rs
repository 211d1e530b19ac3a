use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Shared Link Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkKind {
    Artwork,
    Project,
}

impl LinkKind {
    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ARTWORK" => Some(LinkKind::Artwork),
            "PROJECT" => Some(LinkKind::Project),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Artwork => "ARTWORK",
            LinkKind::Project => "PROJECT",
        }
    }

    /// Viewer route segment for this kind of link.
    pub fn viewer_segment(self) -> &'static str {
        match self {
            LinkKind::Artwork => "arte",
            LinkKind::Project => "projeto",
        }
    }
}

impl TryFrom<&str> for LinkKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid link kind: {}", value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedLink {
    pub id: String,
    pub owner_id: String,
    pub token: String,
    pub kind: LinkKind,
    pub target_id: String,
    pub expires_at: Option<NaiveDateTime>,
    pub read_only: bool,
    pub can_comment: bool,
    pub can_download: bool,
    pub created_at: NaiveDateTime,
}

impl SharedLink {
    /// A link is expired once `expires_at` is at or before `now`. Links
    /// without an expiry never expire.
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }

    /// Writes need the comment flag and must not be blocked by `read_only`.
    pub fn allows_comments(&self) -> bool {
        self.can_comment && !self.read_only
    }
}

#[derive(Debug, Clone)]
pub struct CreateSharedLink {
    pub owner_id: String,
    pub token: String,
    pub kind: LinkKind,
    pub target_id: String,
    pub expires_at: Option<NaiveDateTime>,
    pub read_only: bool,
    pub can_comment: bool,
    pub can_download: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn link(expires_at: Option<NaiveDateTime>) -> SharedLink {
        let now = Utc::now().naive_utc();
        SharedLink {
            id: "l1".to_string(),
            owner_id: "u1".to_string(),
            token: "tok".to_string(),
            kind: LinkKind::Artwork,
            target_id: "a1".to_string(),
            expires_at,
            read_only: false,
            can_comment: true,
            can_download: true,
            created_at: now,
        }
    }

    #[test]
    fn expiry_boundaries() {
        let now = Utc::now().naive_utc();
        assert!(!link(None).is_expired_at(now));
        assert!(!link(Some(now + Duration::seconds(1))).is_expired_at(now));
        assert!(link(Some(now)).is_expired_at(now));
        assert!(link(Some(now - Duration::hours(1))).is_expired_at(now));
    }

    #[test]
    fn read_only_overrides_comment_flag() {
        let mut l = link(None);
        assert!(l.allows_comments());
        l.read_only = true;
        assert!(!l.allows_comments());
        l.read_only = false;
        l.can_comment = false;
        assert!(!l.allows_comments());
    }

    #[test]
    fn kind_parsing() {
        assert_eq!(LinkKind::from_str("artwork"), Some(LinkKind::Artwork));
        assert_eq!(LinkKind::from_str("PROJECT"), Some(LinkKind::Project));
        assert!(LinkKind::try_from("folder").is_err());
        assert_eq!(LinkKind::Project.viewer_segment(), "projeto");
    }
}
