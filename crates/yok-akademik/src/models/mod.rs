//! Data models for sessions, snapshots and events.
//!
//! Snapshot models use `#[serde(default)]` so that partially written or older
//! documents still deserialize, and keep the snake_case field names of the
//! on-disk format.

mod collaborator;
mod event;
mod profile;
mod progress;
mod session;

pub use collaborator::{CollaboratorRecord, CollaboratorSnapshot, CollaboratorStatus};
pub use event::{EventKind, LogSource, SessionEvent};
pub use profile::{ProfileRecord, ProfileSnapshot, ProfileStatus};
pub use progress::{LogLevel, ProgressRecord, ProgressSink, RunPhase, StdoutSink};
pub use session::SessionId;

/// Extract the `authorId` query parameter from a profile URL.
///
/// Works on absolute and relative URLs; returns `None` when the parameter is
/// absent or empty.
#[must_use]
pub fn author_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("authorId=")?;
    let id = rest.split(['&', '#']).next().unwrap_or_default();
    if id.is_empty() { None } else { Some(id.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_id_from_url() {
        assert_eq!(
            author_id_from_url(
                "https://akademik.yok.gov.tr/AkademikArama/AkademisyenGorevOgrenimBilgileri?sira=x&authorId=ABC123"
            ),
            Some("ABC123".to_string())
        );
        assert_eq!(
            author_id_from_url("/AkademikArama/view?authorId=F00D&pg=2"),
            Some("F00D".to_string())
        );
        assert_eq!(author_id_from_url("https://akademik.yok.gov.tr/"), None);
        assert_eq!(author_id_from_url("x?authorId=&y=1"), None);
        assert_eq!(author_id_from_url(""), None);
    }
}
