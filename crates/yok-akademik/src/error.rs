//! Error types for the YÖK Akademik scraper.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Each layer owns one enum: the browser driver, the session store, an extraction run
//! and the dispatcher.

use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::SessionPhase;

/// Errors from the browser automation layer.
#[derive(thiserror::Error, Debug)]
pub enum BrowserError {
    /// Chromium could not be started or configured.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// DevTools protocol error (navigation, evaluation, connection).
    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// A page or element did not become ready within the wait window.
    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Wait window that expired
        after: Duration,
    },

    /// An element required for the next step is missing.
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// CSS selector or link text that matched nothing
        selector: String,
    },

    /// Script result did not match the expected shape.
    #[error("Failed to decode script result: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BrowserError {
    /// Create a timeout error.
    #[must_use]
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout { what: what.into(), after }
    }

    /// Create an element-not-found error.
    #[must_use]
    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound { selector: selector.into() }
    }
}

/// Errors from the session store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Filesystem error on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Snapshot could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Atomic rename of the temporary file failed.
    #[error("Failed to replace {}: {source}", path.display())]
    Persist {
        /// Target path of the rename
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Session id would not map to a single directory under the sessions root.
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),
}

impl StoreError {
    /// Wrap an I/O error with the path it happened on.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Errors that abort an extraction run.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// Browser automation failed
    #[error("Automation error: {0}")]
    Browser(#[from] BrowserError),

    /// Snapshot or marker could not be written
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The requested profile is not part of the session's search results.
    #[error("Profile not found in session results: {0}")]
    ProfileNotFound(String),

    /// The selected profile has no URL to navigate to.
    #[error("Profile has no profile_url: {0}")]
    MissingProfileUrl(String),
}

impl ScrapeError {
    /// Process exit code reported to the orchestrator.
    ///
    /// `1` for automation and store failures, `2` when the requested profile
    /// cannot be used.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Browser(_) | Self::Store(_) => 1,
            Self::ProfileNotFound(_) | Self::MissingProfileUrl(_) => 2,
        }
    }
}

/// Errors from the dispatcher and its coordinator task.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// Session directory could not be prepared
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The filesystem watcher could not be installed.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// An extraction process could not be started.
    #[error("Failed to launch {what}: {message}")]
    Launch {
        /// Which run was being started
        what: String,
        /// Underlying failure
        message: String,
    },

    /// A phase change that the session state machine does not allow.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase
        from: SessionPhase,
        /// Requested phase
        to: SessionPhase,
    },

    /// No session with this id is known to the dispatcher.
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// A session with this id is already running.
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// The query holds no name to search for.
    #[error("Search query is empty")]
    EmptyQuery,

    /// Selection does not match any profile of the session.
    #[error("No profile matches selection {selection} ({available} available)")]
    SelectionOutOfRange {
        /// Selection as given by the caller
        selection: String,
        /// Number of profiles in the session
        available: usize,
    },

    /// The coordinator task has shut down.
    #[error("Dispatcher is not running")]
    CoordinatorClosed,
}

impl DispatchError {
    /// Create a launch error.
    #[must_use]
    pub fn launch(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Launch { what: what.into(), message: message.into() }
    }

    /// Convert to a message suitable for an `error` event.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::UnknownSession(id) => {
                format!("Session {id} was not found. Start a new search.")
            }
            Self::SelectionOutOfRange { selection, available } => {
                format!("Profile {selection} is not one of the {available} search results.")
            }
            Self::Launch { what, message } => {
                format!("Could not start {what} ({message}). Start a new search.")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for browser operations.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for extraction runs.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Result type alias for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_target() {
        let err = BrowserError::timeout("tr[id^='authorInfo_']", Duration::from_secs(10));
        let msg = err.to_string();
        assert!(msg.contains("authorInfo_"));
        assert!(msg.contains("10s"));
    }

    #[test]
    fn test_scrape_error_wraps_browser_error() {
        let err: ScrapeError = BrowserError::not_found("#aramaTerim").into();
        assert!(matches!(err, ScrapeError::Browser(BrowserError::ElementNotFound { .. })));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_dispatch_error_user_message() {
        let err = DispatchError::SelectionOutOfRange { selection: "#4".into(), available: 3 };
        assert!(err.to_user_message().contains("#4"));
        assert!(err.to_user_message().contains('3'));

        let err = DispatchError::UnknownSession("session_x".into());
        assert!(err.to_user_message().contains("session_x"));

        let err = DispatchError::launch("collaborator extraction", "refused");
        assert_eq!(
            err.to_user_message(),
            "Could not start collaborator extraction (refused). Start a new search."
        );
        assert_eq!(DispatchError::EmptyQuery.to_user_message(), "Search query is empty");
    }

    #[test]
    fn test_exit_codes() {
        let err: ScrapeError = StoreError::InvalidSessionId("../x".into()).into();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(ScrapeError::ProfileNotFound("A9".into()).exit_code(), 2);
        assert_eq!(ScrapeError::MissingProfileUrl("Linksiz".into()).exit_code(), 2);
    }
}
