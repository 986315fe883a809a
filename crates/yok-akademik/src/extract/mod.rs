//! Extraction runs: the profile search and the collaborator scan.
//!
//! Each run drives one [`RegistrySite`], writes its snapshots through a
//! [`SessionDir`](crate::store::SessionDir) and reports progress to a
//! [`ProgressSink`].

mod collaborators;
pub mod parse;
mod profiles;

pub use collaborators::{CollaboratorExtractor, CollaboratorRequest, ProfileTarget};
pub use profiles::ProfileExtractor;

use crate::browser::RegistrySite;
use crate::error::BrowserResult;
use crate::models::{LogLevel, ProgressRecord, ProgressSink, RunPhase};

/// Run a name search up to the academics result tab.
async fn search<S: RegistrySite + ?Sized>(site: &mut S, name: &str) -> BrowserResult<()> {
    site.open_search().await?;
    site.dismiss_consent().await;
    site.submit_search(name).await?;
    tracing::debug!(name, "Search submitted");
    site.open_academics_tab().await
}

/// Progress reporter bound to one run phase.
struct Reporter<'a> {
    phase: RunPhase,
    sink: &'a dyn ProgressSink,
}

impl Reporter<'_> {
    fn info(&self, message: impl Into<String>) {
        self.sink.report(ProgressRecord::new(self.phase, LogLevel::Info, message));
    }

    fn warn(&self, message: impl Into<String>) {
        self.sink.report(ProgressRecord::new(self.phase, LogLevel::Warning, message));
    }

    fn count(&self, message: impl Into<String>, count: usize) {
        self.sink
            .report(ProgressRecord::new(self.phase, LogLevel::Info, message).with_count(count));
    }
}
