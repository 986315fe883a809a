//! Profile records and the profile snapshot document.

use serde::{Deserialize, Serialize};

/// One academic profile found by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    /// `authorId` query parameter of the profile URL.
    pub author_id: Option<String>,

    /// Researcher name.
    pub name: String,

    /// Academic title (e.g. "PROFESÖR").
    pub title: String,

    /// Profile page URL; unique within one search session.
    pub profile_url: String,

    /// Photo URL or the default placeholder.
    pub photo_url: String,

    /// Raw descriptive text block of the result row.
    pub info: String,

    /// Institution / faculty / department path.
    pub education: String,

    /// First classification label.
    pub field: String,

    /// Second classification label.
    pub speciality: String,

    /// Keywords joined with `" ; "`; may be empty.
    pub keywords: String,

    /// Contact email; may be empty.
    pub email: String,
}

impl ProfileRecord {
    /// Whether the profile can be opened for collaborator scraping.
    #[must_use]
    pub fn has_profile_url(&self) -> bool {
        !self.profile_url.trim().is_empty()
    }
}

/// Lifecycle status of a profile snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    /// Pagination still running.
    #[default]
    Ongoing,
    /// Search finished.
    Completed,
    /// Placeholder used by readers for unreadable documents.
    Failed,
}

impl ProfileStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Durable state of one search (`main_profile.json`).
///
/// `total_profiles` always equals `profiles.len()` when the snapshot is
/// built through [`ProfileSnapshot::new`] and [`ProfileSnapshot::push`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSnapshot {
    pub session_id: String,
    pub total_profiles: usize,
    pub status: ProfileStatus,
    pub searched_name: String,
    pub profiles: Vec<ProfileRecord>,
}

impl ProfileSnapshot {
    /// Start an empty, ongoing snapshot.
    #[must_use]
    pub fn new(session_id: impl Into<String>, searched_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            total_profiles: 0,
            status: ProfileStatus::Ongoing,
            searched_name: searched_name.into(),
            profiles: Vec::new(),
        }
    }

    /// Shape substituted for an empty or corrupt document.
    #[must_use]
    pub fn unreadable() -> Self {
        Self { status: ProfileStatus::Failed, ..Self::default() }
    }

    /// Append a profile and keep the count in sync.
    pub fn push(&mut self, profile: ProfileRecord) {
        self.profiles.push(profile);
        self.total_profiles = self.profiles.len();
    }

    /// Mark the search as finished.
    pub fn complete(&mut self) {
        self.status = ProfileStatus::Completed;
        self.total_profiles = self.profiles.len();
    }

    /// Number of recorded profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no profile has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ProfileStatus::Completed
    }
}
