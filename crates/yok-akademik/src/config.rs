//! Configuration for the YÖK Akademik scraper.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Registry site constants.
pub mod site {
    /// Base URL of the registry; relative photo paths are joined onto it.
    pub const BASE_URL: &str = "https://akademik.yok.gov.tr/";

    /// Entry point of the academic search flow.
    pub const SEARCH_URL: &str = "https://akademik.yok.gov.tr/AkademikArama/";

    /// Placeholder used when a record has no photo.
    pub const DEFAULT_PHOTO_URL: &str = "/default_photo.jpg";

    /// Fixed user agent for every browser session.
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

    /// Browser window size.
    pub const WINDOW_SIZE: (u32, u32) = (1920, 1080);

    /// Info text recorded for a collaborator without a resolvable profile.
    pub const PROFILE_NOT_FOUND: &str = "Profil bulunamadı";
}

/// Extraction limits and timings.
pub mod limits {
    use std::time::Duration;

    /// Hard cap on profiles collected by one search.
    pub const MAX_PROFILES: usize = 100;

    /// Wait window for page loads and element presence.
    pub const ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Wait window for the cookie-consent overlay.
    pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Interval between DOM polls while waiting.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

    /// Pause after each collaborator so consumers see steady progress.
    pub const COLLABORATOR_PACING: Duration = Duration::from_millis(500);

    /// Queue depth of one event subscriber.
    pub const SUBSCRIBER_CAPACITY: usize = 256;
}

/// File names inside a session directory.
pub mod files {
    /// Profile snapshot.
    pub const PROFILES: &str = "main_profile.json";

    /// Profile phase completion marker.
    pub const PROFILES_DONE: &str = "main_done.txt";

    /// Collaborator snapshot.
    pub const COLLABORATORS: &str = "collaborators.json";

    /// Collaborator phase completion marker.
    pub const COLLABORATORS_DONE: &str = "collaborators_done.txt";

    /// Marker file content.
    pub const DONE_CONTENT: &str = "done";
}

/// Default sessions root, relative to the working directory.
pub const DEFAULT_SESSIONS_DIR: &str = "public/collaborator-sessions";

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one sub-directory per session.
    pub sessions_dir: PathBuf,

    /// Chromium binary (auto-detected when `None`).
    pub chrome_bin: Option<PathBuf>,

    /// Run the browser without a window.
    pub headless: bool,

    /// Wait window for page loads and element presence.
    pub element_timeout: Duration,

    /// Wait window for the cookie-consent overlay.
    pub consent_timeout: Duration,

    /// Interval between DOM polls.
    pub poll_interval: Duration,

    /// Pause after each collaborator record.
    pub collaborator_pacing: Duration,

    /// Queue depth of one event subscriber.
    pub subscriber_capacity: usize,
}

impl Config {
    /// Create a configuration rooted at `sessions_dir`.
    #[must_use]
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            chrome_bin: None,
            headless: true,
            element_timeout: limits::ELEMENT_TIMEOUT,
            consent_timeout: limits::CONSENT_TIMEOUT,
            poll_interval: limits::POLL_INTERVAL,
            collaborator_pacing: limits::COLLABORATOR_PACING,
            subscriber_capacity: limits::SUBSCRIBER_CAPACITY,
        }
    }

    /// Create a test configuration: no pacing, short waits.
    #[must_use]
    pub fn for_testing(sessions_dir: &Path) -> Self {
        Self {
            sessions_dir: sessions_dir.to_path_buf(),
            chrome_bin: None,
            headless: true,
            element_timeout: Duration::from_millis(500),
            consent_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            collaborator_pacing: Duration::ZERO, // No pacing in tests
            subscriber_capacity: 64,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `YOK_SESSIONS_DIR` and `CHROME_BIN`.
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let sessions_dir = std::env::var("YOK_SESSIONS_DIR")
            .unwrap_or_else(|_| DEFAULT_SESSIONS_DIR.to_string());
        if sessions_dir.trim().is_empty() {
            anyhow::bail!("YOK_SESSIONS_DIR is set but empty");
        }

        let mut config = Self::new(sessions_dir);
        config.chrome_bin = std::env::var_os("CHROME_BIN").map(PathBuf::from);
        Ok(config)
    }

    /// Override the Chromium binary.
    #[must_use]
    pub fn with_chrome_bin(mut self, chrome_bin: Option<PathBuf>) -> Self {
        if chrome_bin.is_some() {
            self.chrome_bin = chrome_bin;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_SESSIONS_DIR)
    }
}
