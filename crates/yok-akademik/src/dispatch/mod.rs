//! Session orchestration.
//!
//! A single coordinator task owns every [`SessionState`] and the
//! [`SubscriberRegistry`]. Everything else talks to it through one message
//! channel: the [`DispatcherHandle`] sends commands, runs report progress and
//! exits through [`RunEvents`], and the per-session file watcher forwards
//! snapshot changes. Nothing outside the coordinator mutates session state.
//!
//! ```text
//! handle ──┐
//! runs ────┼──> coordinator ──> reconcile ──> registry ──> subscribers
//! watcher ─┘         │
//!                    └──> launcher (profile / collaborator runs)
//! ```

mod launcher;
pub mod reconcile;
mod registry;
mod state;
mod watcher;

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

pub use launcher::{Launcher, ProcessLauncher, RunEvents, RunExit, RunRequest};
pub use reconcile::Action;
pub use registry::{SubscriberId, SubscriberRegistry, Subscription};
pub use state::{SessionPhase, SessionState, SessionStatus};
pub use watcher::{changed_files, SessionWatcher, WatchedFile};

use crate::config::Config;
use crate::error::{DispatchError, DispatchResult};
use crate::models::{
    author_id_from_url, LogSource, ProfileRecord, ProgressRecord, RunPhase, SessionEvent, SessionId,
};
use crate::store::{SessionDir, SessionStore};

/// Name to search for: the first three words of a free-text query.
#[must_use]
pub fn extract_search_name(query: &str) -> String {
    query.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

/// Which search result to scan for collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelector {
    /// 1-based position in the result list.
    Index(usize),
    /// `authorId` of a result.
    AuthorId(String),
    /// Profile URL; need not be one of the results.
    Url(String),
}

impl ProfileSelector {
    /// Pick the profile among `profiles`.
    ///
    /// A URL that matches no result is scanned as a profile of `searched_name`.
    pub fn resolve(&self, profiles: &[ProfileRecord], searched_name: &str) -> DispatchResult<ProfileRecord> {
        let out_of_range = || DispatchError::SelectionOutOfRange {
            selection: self.to_string(),
            available: profiles.len(),
        };
        match self {
            Self::Index(index) => index
                .checked_sub(1)
                .and_then(|i| profiles.get(i))
                .cloned()
                .ok_or_else(out_of_range),
            Self::AuthorId(id) => profiles
                .iter()
                .find(|p| p.author_id.as_deref() == Some(id.as_str()))
                .cloned()
                .ok_or_else(out_of_range),
            Self::Url(url) => Ok(profiles.iter().find(|p| p.profile_url == *url).cloned().unwrap_or_else(
                || ProfileRecord {
                    author_id: author_id_from_url(url),
                    name: searched_name.to_string(),
                    profile_url: url.clone(),
                    ..Default::default()
                },
            )),
        }
    }
}

impl fmt::Display for ProfileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::AuthorId(id) => write!(f, "authorId {id}"),
            Self::Url(url) => f.write_str(url),
        }
    }
}

impl FromStr for ProfileSelector {
    type Err = Infallible;

    /// Digits are an index, anything URL-shaped a URL, the rest an author id.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(index) = raw.parse::<usize>() {
            return Ok(Self::Index(index));
        }
        if raw.contains("://") || raw.starts_with('/') {
            Ok(Self::Url(raw.to_string()))
        } else {
            Ok(Self::AuthorId(raw.to_string()))
        }
    }
}

/// Coordinator input.
#[derive(Debug)]
pub(crate) enum Message {
    Command(Command),
    File { session_id: SessionId, file: WatchedFile },
    Progress { session_id: SessionId, phase: RunPhase, record: ProgressRecord },
    Exited { session_id: SessionId, phase: RunPhase, exit: RunExit },
}

#[derive(Debug)]
pub(crate) enum Command {
    Start {
        query: String,
        session_id: Option<SessionId>,
        reply: oneshot::Sender<DispatchResult<SessionId>>,
    },
    Select {
        session_id: String,
        selector: ProfileSelector,
        reply: oneshot::Sender<DispatchResult<()>>,
    },
    Subscribe {
        session_id: String,
        reply: oneshot::Sender<Subscription>,
    },
    Unsubscribe {
        session_id: String,
        id: SubscriberId,
        reply: oneshot::Sender<bool>,
    },
    Status {
        session_id: String,
        reply: oneshot::Sender<Option<SessionStatus>>,
    },
    Cleanup {
        session_id: String,
        reply: oneshot::Sender<bool>,
    },
}

/// Builder for the coordinator task.
pub struct Dispatcher {
    config: Config,
    launcher: Arc<dyn Launcher>,
    watch_files: bool,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: Config, launcher: impl Launcher + 'static) -> Self {
        Self { config, launcher: Arc::new(launcher), watch_files: true }
    }

    /// Watch session directories for snapshot changes (on by default).
    ///
    /// Without the watcher the coordinator only learns about snapshots from
    /// [`RunEvents::file_changed`] and run exits.
    #[must_use]
    pub const fn with_file_watch(mut self, enabled: bool) -> Self {
        self.watch_files = enabled;
        self
    }

    /// Start the coordinator task.
    ///
    /// The task stops once every handle is dropped and no run is active.
    #[must_use]
    pub fn spawn(self) -> DispatcherHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator {
            store: SessionStore::new(&self.config.sessions_dir),
            launcher: self.launcher,
            registry: SubscriberRegistry::new(self.config.subscriber_capacity),
            sessions: HashMap::new(),
            tx: tx.downgrade(),
            watch_files: self.watch_files,
        };
        tokio::spawn(coordinator.run(rx));
        DispatcherHandle { tx }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sessions_dir", &self.config.sessions_dir)
            .field("watch_files", &self.watch_files)
            .finish_non_exhaustive()
    }
}

/// Cheap, cloneable access to the coordinator.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl DispatcherHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> DispatchResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Message::Command(command(reply)))
            .map_err(|_| DispatchError::CoordinatorClosed)?;
        rx.await.map_err(|_| DispatchError::CoordinatorClosed)
    }

    /// Start a session for a free-text query and launch the profile run.
    pub async fn start_session(&self, query: &str) -> DispatchResult<SessionId> {
        self.start_session_with_id(query, None).await
    }

    /// Like [`start_session`](Self::start_session) with a caller-chosen id,
    /// so the caller can subscribe before the first event.
    pub async fn start_session_with_id(
        &self,
        query: &str,
        session_id: Option<SessionId>,
    ) -> DispatchResult<SessionId> {
        let query = query.to_string();
        self.request(|reply| Command::Start { query, session_id, reply }).await?
    }

    /// Start collaborator scraping for a session awaiting a selection.
    pub async fn select_profile(&self, session_id: &str, selector: ProfileSelector) -> DispatchResult<()> {
        let session_id = session_id.to_string();
        self.request(|reply| Command::Select { session_id, selector, reply }).await?
    }

    /// Register a queue for the events of `session_id`.
    ///
    /// Allowed before the session exists.
    pub async fn subscribe(&self, session_id: &str) -> DispatchResult<Subscription> {
        let session_id = session_id.to_string();
        self.request(|reply| Command::Subscribe { session_id, reply }).await
    }

    pub async fn unsubscribe(&self, session_id: &str, id: SubscriberId) -> DispatchResult<bool> {
        let session_id = session_id.to_string();
        self.request(|reply| Command::Unsubscribe { session_id, id, reply }).await
    }

    pub async fn status(&self, session_id: &str) -> DispatchResult<Option<SessionStatus>> {
        let session_id = session_id.to_string();
        self.request(|reply| Command::Status { session_id, reply }).await
    }

    /// Stop watching a session and forget it; `false` if it was unknown.
    ///
    /// Subscribers receive `session_closed`, then their queues close. Files
    /// on disk are kept.
    pub async fn cleanup(&self, session_id: &str) -> DispatchResult<bool> {
        let session_id = session_id.to_string();
        self.request(|reply| Command::Cleanup { session_id, reply }).await
    }
}

struct Session {
    state: SessionState,
    dir: SessionDir,
    _watcher: Option<SessionWatcher>,
}

struct Coordinator {
    store: SessionStore,
    launcher: Arc<dyn Launcher>,
    registry: SubscriberRegistry,
    sessions: HashMap<String, Session>,
    tx: mpsc::WeakUnboundedSender<Message>,
    watch_files: bool,
}

impl Coordinator {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        tracing::debug!(root = %self.store.root().display(), "Coordinator started");
        while let Some(message) = rx.recv().await {
            match message {
                Message::Command(command) => self.handle(command).await,
                Message::File { session_id, file } => self.on_file(session_id.as_str(), file).await,
                Message::Progress { session_id, phase, record } => {
                    self.on_progress(session_id.as_str(), phase, &record);
                }
                Message::Exited { session_id, phase: RunPhase::Profiles, exit } => {
                    self.on_profiles_exit(session_id.as_str(), &exit).await;
                }
                Message::Exited { session_id, phase: RunPhase::Collaborators, exit } => {
                    self.on_collaborators_exit(session_id.as_str(), &exit);
                }
            }
        }
        tracing::debug!(sessions = self.sessions.len(), "Coordinator stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start { query, session_id, reply } => {
                let result = self.start(&query, session_id).await;
                let _ = reply.send(result);
            }
            Command::Select { session_id, selector, reply } => {
                let result = self.select(&session_id, &selector).await;
                let _ = reply.send(result);
            }
            Command::Subscribe { session_id, reply } => {
                let subscription = self.registry.subscribe(&session_id);
                tracing::debug!(
                    session_id,
                    subscribers = self.registry.subscriber_count(&session_id),
                    "Subscriber added"
                );
                let _ = reply.send(subscription);
            }
            Command::Unsubscribe { session_id, id, reply } => {
                let _ = reply.send(self.registry.unsubscribe(&session_id, id));
            }
            Command::Status { session_id, reply } => {
                let _ = reply.send(self.sessions.get(&session_id).map(|s| s.state.status()));
            }
            Command::Cleanup { session_id, reply } => {
                let _ = reply.send(self.cleanup(&session_id));
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn start(&mut self, query: &str, session_id: Option<SessionId>) -> DispatchResult<SessionId> {
        let name = extract_search_name(query);
        if name.is_empty() {
            return Err(DispatchError::EmptyQuery);
        }
        let id = session_id.unwrap_or_else(SessionId::generate);
        if self.sessions.contains_key(id.as_str()) {
            return Err(DispatchError::SessionExists(id.to_string()));
        }

        let dir = self.store.create(&id)?;
        let watcher = if self.watch_files { Some(self.watch(&dir)?) } else { None };

        let mut state = SessionState::new(id.clone(), &name);
        state.transition(SessionPhase::ScrapingMain)?;
        self.sessions.insert(id.to_string(), Session { state, dir, _watcher: watcher });

        tracing::info!(session_id = %id, name = %name, "Session started");
        self.publish(&SessionEvent::session_started(id.as_str(), &name));

        let run = RunRequest::Profiles { session_id: id.clone(), name };
        if let Err(e) = self.launch(run).await {
            self.fail(id.as_str(), &e.to_user_message());
            return Err(e);
        }
        Ok(id)
    }

    async fn select(&mut self, session_id: &str, selector: &ProfileSelector) -> DispatchResult<()> {
        let profile = {
            let session = self
                .sessions
                .get(session_id)
                .ok_or_else(|| DispatchError::UnknownSession(session_id.to_string()))?;
            let phase = session.state.phase();
            if phase != SessionPhase::AwaitingSelection {
                return Err(DispatchError::InvalidTransition {
                    from: phase,
                    to: SessionPhase::ScrapingCollabs,
                });
            }
            selector.resolve(&session.state.profiles, &session.state.searched_name)?
        };

        if !profile.has_profile_url() {
            self.publish(&SessionEvent::profile_url_missing(session_id));
            return Err(DispatchError::launch(
                "collaborator extraction",
                format!("profile {selector} has no profile_url"),
            ));
        }

        if let Some(session) = self.sessions.get_mut(session_id) {
            session.state.collaborators_started = true;
            session.state.selected_profile = Some(profile.clone());
        }
        tracing::info!(session_id, selection = %selector, profile_url = %profile.profile_url, "Profile selected");
        self.start_collaborators(session_id, profile).await
    }

    fn cleanup(&mut self, session_id: &str) -> bool {
        if self.sessions.remove(session_id).is_none() {
            return false;
        }
        self.publish(&SessionEvent::session_closed(session_id));
        let dropped = self.registry.remove_session(session_id);
        tracing::info!(session_id, subscribers = dropped, "Session cleaned up");
        true
    }

    // ========================================================================
    // Run and watcher messages
    // ========================================================================

    async fn on_file(&mut self, session_id: &str, file: WatchedFile) {
        let actions = {
            let Some(session) = self.sessions.get_mut(session_id) else {
                return;
            };
            if session.state.phase().is_terminal() {
                return;
            }
            match file {
                WatchedFile::Profiles | WatchedFile::ProfilesDone => {
                    let Some(snapshot) = session.dir.load_profiles() else {
                        return;
                    };
                    reconcile::profiles_changed(
                        &mut session.state,
                        &snapshot,
                        session.dir.profiles_done(),
                        session.dir.collaborators_done(),
                    )
                }
                WatchedFile::Collaborators | WatchedFile::CollaboratorsDone => {
                    let Some(snapshot) = session.dir.load_collaborators() else {
                        return;
                    };
                    reconcile::collaborators_changed(
                        &mut session.state,
                        &snapshot,
                        session.dir.collaborators_done(),
                    )
                    .into_iter()
                    .map(Action::Emit)
                    .collect()
                }
            }
        };
        self.apply(session_id, actions).await;
    }

    fn on_progress(&mut self, session_id: &str, phase: RunPhase, record: &ProgressRecord) {
        if !self.sessions.contains_key(session_id) {
            return;
        }
        let source = match phase {
            RunPhase::Profiles => LogSource::MainProfileScraping,
            RunPhase::Collaborators => LogSource::CollaboratorScraping,
        };
        self.publish(&SessionEvent::log_message(session_id, source, record.level, &record.message));
    }

    async fn on_profiles_exit(&mut self, session_id: &str, exit: &RunExit) {
        if !self.is_active(session_id) {
            return;
        }
        if !exit.is_success() {
            let message = format!(
                "Process failed with return code {}: {}",
                exit.code_or_signal(),
                exit.stderr.trim()
            );
            self.fail(session_id, &message);
            return;
        }

        let actions = {
            let Some(session) = self.sessions.get_mut(session_id) else {
                return;
            };
            // A snapshot that cannot be read at exit does not erase profiles already seen.
            let snapshot = match session.dir.read_profiles() {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => session.state.observed_profiles(),
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "Unreadable profile snapshot at exit");
                    session.state.observed_profiles()
                }
            };
            reconcile::profiles_finished(
                &mut session.state,
                &snapshot,
                session.dir.profiles_done(),
                session.dir.collaborators_done(),
            )
        };
        self.apply(session_id, actions).await;
    }

    fn on_collaborators_exit(&mut self, session_id: &str, exit: &RunExit) {
        if !self.is_active(session_id) {
            return;
        }
        if !exit.is_success() {
            let message = format!("Collaborator scraping failed: {}", exit.stderr.trim());
            self.fail(session_id, &message);
            return;
        }

        let events = {
            let Some(session) = self.sessions.get_mut(session_id) else {
                return;
            };
            // Watcher events may still be in flight; catch up from disk.
            let snapshot = session.dir.load_collaborators().unwrap_or_default();
            let state = &mut session.state;
            let mut events =
                reconcile::collaborators_changed(state, &snapshot, session.dir.collaborators_done());
            let total = state.collaborator_count.unwrap_or(0);
            if !state.collaborators_reported {
                state.collaborators_reported = true;
                events.push(SessionEvent::collaborators_completed(session_id, total));
            }
            events.push(SessionEvent::process_complete(session_id, total));
            if let Err(e) = state.transition(SessionPhase::Completed) {
                tracing::warn!(session_id, error = %e, "Cannot complete session");
            }
            events
        };
        for event in &events {
            self.publish(event);
        }
        tracing::info!(session_id, "Session completed");
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn apply(&mut self, session_id: &str, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Emit(event) => self.publish(&event),
                Action::Transition(phase) => {
                    if let Some(session) = self.sessions.get_mut(session_id) {
                        if let Err(e) = session.state.transition(phase) {
                            tracing::warn!(session_id, error = %e, "Transition rejected");
                        }
                    }
                }
                Action::StartCollaborators(profile) => {
                    tracing::info!(session_id, profile_url = %profile.profile_url, "Single result, starting collaborator scan");
                    if let Err(e) = self.start_collaborators(session_id, profile).await {
                        tracing::warn!(session_id, error = %e, "Collaborator scan not started");
                    }
                }
            }
        }
    }

    async fn start_collaborators(&mut self, session_id: &str, profile: ProfileRecord) -> DispatchResult<()> {
        let run = {
            let session = self
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| DispatchError::UnknownSession(session_id.to_string()))?;
            session.state.transition(SessionPhase::ScrapingCollabs)?;
            RunRequest::Collaborators {
                session_id: session.state.id.clone(),
                name: session.state.searched_name.clone(),
                profile_url: profile.profile_url,
            }
        };
        if let Err(e) = self.launch(run).await {
            self.fail(session_id, &e.to_user_message());
            return Err(e);
        }
        Ok(())
    }

    #[allow(clippy::needless_pass_by_ref_mut)]
    async fn launch(&mut self, run: RunRequest) -> DispatchResult<()> {
        let tx = self.tx.upgrade().ok_or(DispatchError::CoordinatorClosed)?;
        let events = RunEvents::new(run.session_id().clone(), run.phase(), tx);
        let launcher = Arc::clone(&self.launcher);
        launcher.launch(run, events).await
    }

    fn is_active(&self, session_id: &str) -> bool {
        self.sessions.get(session_id).is_some_and(|s| !s.state.phase().is_terminal())
    }

    fn watch(&self, dir: &SessionDir) -> DispatchResult<SessionWatcher> {
        let tx = self.tx.clone();
        let session_id = dir.id().clone();
        SessionWatcher::start(dir.path(), move |file| {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Message::File { session_id: session_id.clone(), file });
            }
        })
    }

    fn fail(&mut self, session_id: &str, message: &str) {
        tracing::error!(session_id, error = message, "Session failed");
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.state.fail(message);
        }
        self.publish(&SessionEvent::error(session_id, message));
    }

    fn publish(&mut self, event: &SessionEvent) {
        let delivered = self.registry.publish(event);
        tracing::debug!(
            session_id = %event.session_id,
            event = event.event.as_str(),
            delivered,
            "Event published"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(url: &str, author_id: Option<&str>) -> ProfileRecord {
        ProfileRecord {
            profile_url: url.to_string(),
            author_id: author_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_search_name() {
        assert_eq!(extract_search_name("  Ahmet Yılmaz  işbirlikçileri nelerdir"), "Ahmet Yılmaz işbirlikçileri");
        assert_eq!(extract_search_name("Ayşe"), "Ayşe");
        assert_eq!(extract_search_name("   "), "");
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!("2".parse::<ProfileSelector>().unwrap(), ProfileSelector::Index(2));
        assert_eq!(
            "https://akademik.yok.gov.tr/x?authorId=1".parse::<ProfileSelector>().unwrap(),
            ProfileSelector::Url("https://akademik.yok.gov.tr/x?authorId=1".into())
        );
        assert_eq!("ABC123".parse::<ProfileSelector>().unwrap(), ProfileSelector::AuthorId("ABC123".into()));
    }

    #[test]
    fn test_selector_resolve() {
        let profiles = vec![profile("https://a", Some("A")), profile("https://b", Some("B"))];

        assert_eq!(ProfileSelector::Index(2).resolve(&profiles, "x").unwrap().profile_url, "https://b");
        assert_eq!(ProfileSelector::AuthorId("A".into()).resolve(&profiles, "x").unwrap().profile_url, "https://a");

        let err = ProfileSelector::Index(0).resolve(&profiles, "x").unwrap_err();
        assert!(matches!(err, DispatchError::SelectionOutOfRange { available: 2, .. }));
        assert!(ProfileSelector::Index(3).resolve(&profiles, "x").is_err());
        assert!(ProfileSelector::AuthorId("C".into()).resolve(&profiles, "x").is_err());
    }

    #[test]
    fn test_selector_url_outside_results() {
        let selected = ProfileSelector::Url("https://c?authorId=C9".into()).resolve(&[], "Ayşe Kaya").unwrap();
        assert_eq!(selected.name, "Ayşe Kaya");
        assert_eq!(selected.author_id.as_deref(), Some("C9"));
        assert!(selected.has_profile_url());
    }
}
