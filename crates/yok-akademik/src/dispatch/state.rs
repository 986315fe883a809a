//! Per-session state owned by the coordinator.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};
use crate::models::{ProfileRecord, ProfileSnapshot, SessionId};

/// Logical phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    ScrapingMain,
    AwaitingSelection,
    ScrapingCollabs,
    Completed,
    Failed,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::ScrapingMain => "scraping_main",
            Self::AwaitingSelection => "awaiting_selection",
            Self::ScrapingCollabs => "scraping_collabs",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// No transition leaves a terminal phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self → next` is an allowed transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SessionPhase::{
            AwaitingSelection, Completed, Failed, Initializing, ScrapingCollabs, ScrapingMain,
        };
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Initializing, ScrapingMain)
            | (ScrapingMain, AwaitingSelection | ScrapingCollabs | Completed)
            | (AwaitingSelection, ScrapingCollabs)
            | (ScrapingCollabs, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the coordinator knows about one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: SessionId,
    /// Name extracted from the query.
    pub searched_name: String,
    phase: SessionPhase,
    /// Latest observed profile list.
    pub profiles: Vec<ProfileRecord>,
    /// Profile count at the last observation; `None` before the first one.
    pub profile_count: Option<usize>,
    /// Collaborator count at the last observation; `None` before the first one.
    pub collaborator_count: Option<usize>,
    /// The single-result auto start has been evaluated.
    pub auto_start_checked: bool,
    /// A collaborator scan was started for this session.
    pub collaborators_started: bool,
    /// `collaborators_completed` was emitted.
    pub collaborators_reported: bool,
    pub selected_profile: Option<ProfileRecord>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Local>,
}

impl SessionState {
    #[must_use]
    pub fn new(id: SessionId, searched_name: impl Into<String>) -> Self {
        Self {
            id,
            searched_name: searched_name.into(),
            phase: SessionPhase::Initializing,
            profiles: Vec::new(),
            profile_count: None,
            collaborator_count: None,
            auto_start_checked: false,
            collaborators_started: false,
            collaborators_reported: false,
            selected_profile: None,
            error_message: None,
            created_at: Local::now(),
        }
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Move to `next`, validating the transition.
    pub fn transition(&mut self, next: SessionPhase) -> DispatchResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(DispatchError::InvalidTransition { from: self.phase, to: next });
        }
        tracing::debug!(session_id = %self.id, from = %self.phase, to = %next, "Session phase");
        self.phase = next;
        Ok(())
    }

    /// Record a failure; a session that already finished keeps its phase.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        if self.phase.can_transition_to(SessionPhase::Failed) {
            self.phase = SessionPhase::Failed;
        }
    }

    /// Completed snapshot of the profiles seen so far.
    #[must_use]
    pub fn observed_profiles(&self) -> ProfileSnapshot {
        let mut snapshot = ProfileSnapshot::new(self.id.as_str(), self.searched_name.as_str());
        for profile in &self.profiles {
            snapshot.push(profile.clone());
        }
        snapshot.complete();
        snapshot
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.to_string(),
            state: self.phase,
            profiles_count: self.profiles.len(),
            collaborators_count: self.collaborator_count.unwrap_or(0),
            selected_profile: self.selected_profile.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub state: SessionPhase,
    pub profiles_count: usize,
    pub collaborators_count: usize,
    pub selected_profile: Option<ProfileRecord>,
    pub error_message: Option<String>,
    pub created_at: String,
}
