//! Collaborator scan of one profile's collaboration graph.

use std::sync::Arc;
use std::time::Duration;

use super::parse::build_collaborator;
use super::{search, Reporter};
use crate::browser::RegistrySite;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{CollaboratorSnapshot, ProgressSink, RunPhase};
use crate::store::SessionDir;

/// Which profile to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileTarget {
    /// Open this profile URL directly.
    Url(String),
    /// Profile of the session's search results with this `author_id`.
    AuthorId(String),
    /// 1-based position in the session's search results.
    Index(usize),
    /// Search the name again and open the first result.
    Search,
}

/// Input of one collaborator scan.
#[derive(Debug, Clone)]
pub struct CollaboratorRequest {
    /// Name of the researcher; used for the search fallback and logs.
    pub name: String,
    pub target: ProfileTarget,
}

/// Reads a profile's collaboration graph into `collaborators.json`.
pub struct CollaboratorExtractor<S> {
    site: S,
    dir: SessionDir,
    sink: Arc<dyn ProgressSink>,
    pacing: Duration,
}

impl<S: RegistrySite> CollaboratorExtractor<S> {
    #[must_use]
    pub fn new(site: S, dir: SessionDir, sink: Arc<dyn ProgressSink>, pacing: Duration) -> Self {
        Self { site, dir, sink, pacing }
    }

    /// Scan the target's graph, writing the snapshot after every collaborator.
    ///
    /// The browser is closed whether or not the run succeeds.
    pub async fn run(mut self, request: CollaboratorRequest) -> ScrapeResult<CollaboratorSnapshot> {
        let result = self.collect(&request).await;
        self.site.close().await;
        result
    }

    /// Resolve the target to a profile URL; `None` means the search fallback.
    fn resolve(&self, target: &ProfileTarget) -> ScrapeResult<Option<String>> {
        let profiles = || self.dir.read_profiles().map(|s| s.unwrap_or_default().profiles);
        let (label, found) = match target {
            ProfileTarget::Url(url) => return Ok(Some(url.clone())),
            ProfileTarget::Search => return Ok(None),
            ProfileTarget::AuthorId(id) => (
                format!("authorId {id}"),
                profiles()?.into_iter().find(|p| p.author_id.as_deref() == Some(id.as_str())),
            ),
            ProfileTarget::Index(index) => {
                let profiles = profiles()?;
                (format!("#{index}"), index.checked_sub(1).and_then(|i| profiles.into_iter().nth(i)))
            }
        };

        let profile = found.ok_or_else(|| ScrapeError::ProfileNotFound(label.clone()))?;
        if profile.has_profile_url() {
            Ok(Some(profile.profile_url))
        } else {
            Err(ScrapeError::MissingProfileUrl(label))
        }
    }

    async fn collect(&mut self, request: &CollaboratorRequest) -> ScrapeResult<CollaboratorSnapshot> {
        let session_id = self.dir.id().clone();
        let report = Reporter { phase: RunPhase::Collaborators, sink: self.sink.as_ref() };

        let profile_url = self.resolve(&request.target)?;
        let mut snapshot = CollaboratorSnapshot::new(profile_url.clone().unwrap_or_default());

        tracing::info!(
            session_id = %session_id,
            name = %request.name,
            profile_url = profile_url.as_deref().unwrap_or("<search>"),
            "Starting collaborator scan"
        );

        match &profile_url {
            Some(url) => {
                report.info(format!("Opening profile {url}"));
                self.site.open_profile(url).await?;
            }
            None => {
                report.info(format!("Searching for {} and opening the first result", request.name));
                search(&mut self.site, &request.name).await?;
                self.site.open_first_result().await?;
            }
        }

        self.site.open_collaboration_graph().await?;
        let nodes = self.site.collaborator_nodes().await?;
        report.count(format!("Collaboration graph has {} nodes", nodes.len()), nodes.len());

        for node in nodes {
            let record = build_collaborator(node);
            if record.is_unresolved() {
                tracing::debug!(name = %record.name, "Collaborator without profile link");
            }
            report.count(format!("Collaborator {}", record.name), snapshot.len() + 1);
            snapshot.push(record);
            self.dir.write_collaborators(&snapshot)?;
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        snapshot.complete();
        self.dir.write_collaborators(&snapshot)?;
        if !snapshot.is_empty() {
            self.dir.mark_collaborators_done()?;
        }

        tracing::info!(session_id = %session_id, count = snapshot.len(), "Collaborator scan finished");
        report.count(format!("Scan finished with {} collaborators", snapshot.len()), snapshot.len());
        Ok(snapshot)
    }
}
