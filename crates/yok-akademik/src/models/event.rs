//! Session events delivered to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{CollaboratorRecord, LogLevel, ProfileRecord, ProfileStatus};
use crate::config::limits;

/// Kind of a session event; serialized as the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    ProgressUpdate,
    ProfileUrlMissing,
    AutoCollaboratorStart,
    MultipleProfilesFound,
    NoResults,
    CollaboratorFound,
    NoCollaboratorsFound,
    CollaboratorsCompleted,
    LogMessage,
    Error,
    ProcessComplete,
    SessionClosed,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::ProgressUpdate => "progress_update",
            Self::ProfileUrlMissing => "profile_url_missing",
            Self::AutoCollaboratorStart => "auto_collaborator_start",
            Self::MultipleProfilesFound => "multiple_profiles_found",
            Self::NoResults => "no_results",
            Self::CollaboratorFound => "collaborator_found",
            Self::NoCollaboratorsFound => "no_collaborators_found",
            Self::CollaboratorsCompleted => "collaborators_completed",
            Self::LogMessage => "log_message",
            Self::Error => "error",
            Self::ProcessComplete => "process_complete",
            Self::SessionClosed => "session_closed",
        }
    }
}

/// Which run a forwarded log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    MainProfileScraping,
    CollaboratorScraping,
}

/// A single event for one session.
///
/// `data` always carries an RFC 3339 `timestamp`; the remaining fields depend
/// on `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: String,
    pub event: EventKind,
    pub data: Value,
}

fn now() -> String {
    chrono::Local::now().to_rfc3339()
}

impl SessionEvent {
    /// Build an event, stamping `data` with the current time.
    #[must_use]
    pub fn new(session_id: impl Into<String>, event: EventKind, mut data: Value) -> Self {
        if let Value::Object(ref mut map) = data {
            map.entry("timestamp").or_insert_with(|| Value::String(now()));
        }
        Self { session_id: session_id.into(), event, data }
    }

    #[must_use]
    pub fn session_started(session_id: &str, name: &str) -> Self {
        Self::new(
            session_id,
            EventKind::SessionStarted,
            json!({
                "message": "Akademisyen arama oturumu başlatıldı...",
                "user_info": { "name": name },
            }),
        )
    }

    #[must_use]
    pub fn progress_update(
        session_id: &str,
        profiles_found: usize,
        total_profiles: usize,
        status: ProfileStatus,
        searched_name: &str,
    ) -> Self {
        Self::new(
            session_id,
            EventKind::ProgressUpdate,
            json!({
                "profiles_found": profiles_found,
                "total_profiles": total_profiles,
                "status": status.as_str(),
                "searched_name": searched_name,
                "limit": limits::MAX_PROFILES,
            }),
        )
    }

    #[must_use]
    pub fn profile_url_missing(session_id: &str) -> Self {
        Self::new(
            session_id,
            EventKind::ProfileUrlMissing,
            json!({
                "message": "Seçilen profil için URL bulunamadı. İşbirlikçiler otomatik başlatılamadı.",
            }),
        )
    }

    #[must_use]
    pub fn auto_collaborator_start(session_id: &str, profile: &ProfileRecord) -> Self {
        Self::new(
            session_id,
            EventKind::AutoCollaboratorStart,
            json!({
                "message": "Tek bir eşleşme bulundu, işbirlikçi analizi otomatik başlatıldı",
                "profile": profile,
            }),
        )
    }

    #[must_use]
    pub fn multiple_profiles_found(session_id: &str, profiles: &[ProfileRecord]) -> Self {
        Self::new(
            session_id,
            EventKind::MultipleProfilesFound,
            json!({
                "message": "Birden fazla profil bulundu. Lütfen işbirlikçilerini görmek istediğiniz profili seçin.",
                "profiles": profiles,
            }),
        )
    }

    #[must_use]
    pub fn no_results(session_id: &str) -> Self {
        Self::new(
            session_id,
            EventKind::NoResults,
            json!({ "message": "Belirtilen kriterlere uygun akademisyen profili bulunamadı." }),
        )
    }

    #[must_use]
    pub fn collaborator_found(
        session_id: &str,
        collaborator: &CollaboratorRecord,
        total_count: usize,
    ) -> Self {
        Self::new(
            session_id,
            EventKind::CollaboratorFound,
            json!({ "collaborator": collaborator, "total_count": total_count }),
        )
    }

    #[must_use]
    pub fn no_collaborators_found(session_id: &str) -> Self {
        Self::new(
            session_id,
            EventKind::NoCollaboratorsFound,
            json!({
                "message": "Seçilen profilin hiç işbirlikçisi bulunamadı",
                "total_count": 0,
            }),
        )
    }

    #[must_use]
    pub fn collaborators_completed(session_id: &str, total_count: usize) -> Self {
        let message = if total_count == 0 {
            "İşbirlikçi taraması tamamlandı - hiç işbirlikçi bulunamadı".to_string()
        } else {
            format!("İşbirlikçi taraması tamamlandı ({total_count} işbirlikçi)")
        };
        Self::new(
            session_id,
            EventKind::CollaboratorsCompleted,
            json!({ "message": message, "total_count": total_count }),
        )
    }

    #[must_use]
    pub fn log_message(session_id: &str, source: LogSource, level: LogLevel, message: &str) -> Self {
        Self::new(
            session_id,
            EventKind::LogMessage,
            json!({ "source": source, "level": level, "message": message }),
        )
    }

    #[must_use]
    pub fn error(session_id: &str, message: &str) -> Self {
        Self::new(session_id, EventKind::Error, json!({ "message": message }))
    }

    #[must_use]
    pub fn process_complete(session_id: &str, total_collaborators: usize) -> Self {
        Self::new(
            session_id,
            EventKind::ProcessComplete,
            json!({
                "message": format!("Tarama tamamlandı. Toplam {total_collaborators} işbirlikçi bulundu."),
                "total_collaborators": total_collaborators,
                "results_path": format!("/collaborator-sessions/{session_id}/"),
            }),
        )
    }

    #[must_use]
    pub fn session_closed(session_id: &str) -> Self {
        Self::new(session_id, EventKind::SessionClosed, json!({ "message": "Oturum kapatıldı" }))
    }

    /// Whether no further events follow for this session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.event,
            EventKind::Error
                | EventKind::NoResults
                | EventKind::ProcessComplete
                | EventKind::SessionClosed
        )
    }
}
