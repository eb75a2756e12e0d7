use serde::{Deserialize, Serialize};

/// One playlist, regardless of which upstream produced it.
///
/// `id` is always non-empty; every other field falls back to a safe default
/// when the upstream record omits or mangles it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub privacy: PrivacyStatus,
    pub item_count: u64,
    /// Free-form display string ("Updated 3 days ago", an RFC 3339 stamp, ...).
    pub updated_at: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Private,
    Unlisted,
    Unknown,
}

impl PrivacyStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Self::Public,
            "private" => Self::Private,
            "unlisted" => Self::Unlisted,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
