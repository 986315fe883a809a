//! Profile search across result pages.

use std::collections::HashSet;
use std::sync::Arc;

use super::parse::build_profile;
use super::{search, Reporter};
use crate::browser::{PageTurn, RegistrySite};
use crate::config::limits;
use crate::error::ScrapeResult;
use crate::models::{ProfileSnapshot, ProgressSink, RunPhase};
use crate::store::SessionDir;

/// Collects up to [`limits::MAX_PROFILES`] profiles for one search.
pub struct ProfileExtractor<S> {
    site: S,
    dir: SessionDir,
    sink: Arc<dyn ProgressSink>,
}

impl<S: RegistrySite> ProfileExtractor<S> {
    #[must_use]
    pub fn new(site: S, dir: SessionDir, sink: Arc<dyn ProgressSink>) -> Self {
        Self { site, dir, sink }
    }

    /// Search `name`, writing the snapshot after every page.
    ///
    /// The browser is closed whether or not the run succeeds.
    pub async fn run(mut self, name: &str) -> ScrapeResult<ProfileSnapshot> {
        let result = self.collect(name).await;
        self.site.close().await;
        result
    }

    async fn collect(&mut self, name: &str) -> ScrapeResult<ProfileSnapshot> {
        let session_id = self.dir.id().clone();
        let report = Reporter { phase: RunPhase::Profiles, sink: self.sink.as_ref() };

        tracing::info!(session_id = %session_id, name, "Starting profile search");
        report.info(format!("Searching for {name}"));
        search(&mut self.site, name).await?;

        let mut snapshot = ProfileSnapshot::new(session_id.as_str(), name);
        let mut seen: HashSet<String> = HashSet::new();
        let mut page = 1usize;

        loop {
            report.info(format!("Loading page {page}"));
            let Some(rows) = self.site.result_rows().await? else {
                tracing::info!(session_id = %session_id, page, "No result rows");
                report.warn(format!("No result rows on page {page}"));
                break;
            };
            if rows.is_empty() {
                break;
            }
            tracing::debug!(session_id = %session_id, page, rows = rows.len(), "Result page loaded");

            for row in &rows {
                let profile = match build_profile(row) {
                    Ok(profile) => profile,
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Skipping result row");
                        report.warn(format!("Skipping row: {e}"));
                        continue;
                    }
                };
                if !seen.insert(profile.profile_url.clone()) {
                    tracing::debug!(url = %profile.profile_url, "Duplicate profile");
                    continue;
                }
                snapshot.push(profile);
                if snapshot.len() >= limits::MAX_PROFILES {
                    break;
                }
            }

            self.dir.write_profiles(&snapshot)?;
            report.count(format!("{} profiles after page {page}", snapshot.len()), snapshot.len());

            if snapshot.len() >= limits::MAX_PROFILES {
                tracing::info!(session_id = %session_id, limit = limits::MAX_PROFILES, "Profile limit reached");
                report.info(format!("Reached the limit of {} profiles", limits::MAX_PROFILES));
                break;
            }

            match self.site.next_page().await? {
                PageTurn::Advanced => page += 1,
                PageTurn::LastPage => {
                    tracing::debug!(session_id = %session_id, page, "Last result page");
                    break;
                }
                PageTurn::Unavailable => {
                    tracing::debug!(session_id = %session_id, page, "No next page");
                    break;
                }
            }
        }

        snapshot.complete();
        self.dir.write_profiles(&snapshot)?;
        if !snapshot.is_empty() {
            self.dir.mark_profiles_done()?;
        }

        tracing::info!(session_id = %session_id, count = snapshot.len(), "Profile search finished");
        report.count(format!("Search finished with {} profiles", snapshot.len()), snapshot.len());
        Ok(snapshot)
    }
}
