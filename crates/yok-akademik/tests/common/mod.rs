//! Shared fixtures: a scripted registry site and a scripted launcher.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use yok_akademik::browser::{PageTurn, RawCollaboratorNode, RawProfileRow, RegistrySite};
use yok_akademik::config::files;
use yok_akademik::dispatch::{Launcher, RunEvents, RunExit, RunRequest, WatchedFile};
use yok_akademik::error::{BrowserError, BrowserResult, DispatchResult};
use yok_akademik::models::{
    CollaboratorRecord, CollaboratorSnapshot, LogLevel, ProfileRecord, ProfileSnapshot,
    ProgressRecord, RunPhase, SessionEvent,
};
use yok_akademik::SessionStore;

/// Pause between scripted writes so each one is observed on its own.
const STEP: Duration = Duration::from_millis(50);

pub const BASE: &str = "https://akademik.yok.gov.tr/AkademikArama/AkademisyenGorevOgrenimBilgileri";

pub fn profile_url(n: usize) -> String {
    format!("{BASE}?sira=x&authorId=A{n}")
}

/// A well-formed result row for profile `n`.
pub fn row(n: usize) -> RawProfileRow {
    RawProfileRow {
        row_id: format!("authorInfo_{n}"),
        profile_url: Some(profile_url(n)),
        link_text: format!("PROFESÖR Kişi {n}"),
        info_text: Some(format!(
            "PROFESÖR\nKişi {n}\nÖRNEK ÜNİVERSİTESİ/MÜHENDİSLİK FAKÜLTESİ\nMühendislik   Bilgisayar\nağlar; güvenlik"
        )),
        labels: vec!["Mühendislik".into(), "Bilgisayar".into()],
        photo_src: Some(format!("https://akademik.yok.gov.tr/photo/{n}.jpg")),
        email_text: Some(format!("kisi{n}[at]ornek.edu.tr")),
    }
}

pub fn node(name: &str, author_id: &str) -> RawCollaboratorNode {
    RawCollaboratorNode {
        name: name.to_string(),
        profile_url: format!("{BASE}?authorId={author_id}"),
        photo_url: format!("/photo/{author_id}.jpg"),
        info: format!("{name} ÜNİVERSİTESİ"),
    }
}

/// A graph node with no link, photo or detail text.
pub fn unresolved_node(name: &str) -> RawCollaboratorNode {
    RawCollaboratorNode { name: name.to_string(), ..Default::default() }
}

// =============================================================================
// Scripted registry site
// =============================================================================

/// In-memory [`RegistrySite`] that serves fixed result pages and graph nodes.
#[derive(Default)]
pub struct FakeSite {
    pages: Vec<Vec<RawProfileRow>>,
    current: usize,
    last_turn: Option<PageTurn>,
    nodes: Vec<RawCollaboratorNode>,
    graph_fails: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeSite {
    pub fn with_pages(pages: Vec<Vec<RawProfileRow>>) -> Self {
        Self { pages, ..Self::default() }
    }

    pub fn with_nodes(nodes: Vec<RawCollaboratorNode>) -> Self {
        Self { nodes, ..Self::default() }
    }

    /// What `next_page` answers on the last page (`LastPage` by default).
    pub fn ending_with(mut self, turn: PageTurn) -> Self {
        self.last_turn = Some(turn);
        self
    }

    pub fn failing_graph(mut self) -> Self {
        self.graph_fails = true;
        self
    }

    /// Log of the site operations performed so far.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait::async_trait]
impl RegistrySite for FakeSite {
    async fn open_search(&mut self) -> BrowserResult<()> {
        self.record("open_search");
        Ok(())
    }

    async fn dismiss_consent(&mut self) -> bool {
        self.record("dismiss_consent");
        false
    }

    async fn submit_search(&mut self, name: &str) -> BrowserResult<()> {
        self.record(format!("submit_search {name}"));
        Ok(())
    }

    async fn open_academics_tab(&mut self) -> BrowserResult<()> {
        self.record("open_academics_tab");
        Ok(())
    }

    async fn result_rows(&mut self) -> BrowserResult<Option<Vec<RawProfileRow>>> {
        Ok(self.pages.get(self.current).cloned())
    }

    async fn next_page(&mut self) -> BrowserResult<PageTurn> {
        if self.current + 1 < self.pages.len() {
            self.current += 1;
            self.record(format!("next_page {}", self.current + 1));
            Ok(PageTurn::Advanced)
        } else {
            Ok(self.last_turn.unwrap_or(PageTurn::LastPage))
        }
    }

    async fn open_profile(&mut self, url: &str) -> BrowserResult<()> {
        self.record(format!("open_profile {url}"));
        Ok(())
    }

    async fn open_first_result(&mut self) -> BrowserResult<()> {
        self.record("open_first_result");
        Ok(())
    }

    async fn open_collaboration_graph(&mut self) -> BrowserResult<()> {
        self.record("open_collaboration_graph");
        if self.graph_fails {
            return Err(BrowserError::timeout("svg g", Duration::from_secs(10)));
        }
        Ok(())
    }

    async fn collaborator_nodes(&mut self) -> BrowserResult<Vec<RawCollaboratorNode>> {
        Ok(self.nodes.clone())
    }

    async fn close(&mut self) {
        self.record("close");
    }
}

// =============================================================================
// Scripted launcher
// =============================================================================

/// What one session's runs produce.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Profile pages, written one snapshot per page.
    pub pages: Vec<Vec<ProfileRecord>>,
    /// Collaborators, written one snapshot per record.
    pub collaborators: Vec<CollaboratorRecord>,
    pub profile_exit: Option<RunExit>,
    pub collaborator_exit: Option<RunExit>,
    /// Overwrite the profile snapshot with broken JSON just before exiting.
    pub corrupt_profiles_at_exit: bool,
}

/// [`Launcher`] that writes scripted snapshots in-process and signals each
/// write through [`RunEvents::file_changed`].
#[derive(Clone)]
pub struct ScriptedLauncher {
    store: SessionStore,
    script: Script,
    runs: Arc<Mutex<Vec<RunRequest>>>,
    fail_collaborator_launch: bool,
    signal_files: bool,
    report_exits: bool,
}

impl ScriptedLauncher {
    pub fn new(store: SessionStore, script: Script) -> Self {
        Self {
            store,
            script,
            runs: Arc::default(),
            fail_collaborator_launch: false,
            signal_files: true,
            report_exits: true,
        }
    }

    pub fn refusing_collaborators(mut self) -> Self {
        self.fail_collaborator_launch = true;
        self
    }

    /// Write snapshots only; no file signals and no exit reports, so the
    /// directory watcher is the coordinator's only source.
    pub fn writing_only(mut self) -> Self {
        self.signal_files = false;
        self.report_exits = false;
        self
    }

    fn signal(&self, events: &RunEvents, file: WatchedFile) {
        if self.signal_files {
            events.file_changed(file);
        }
    }

    fn exit(&self, events: &RunEvents, exit: Option<&RunExit>) {
        if self.report_exits {
            events.exited(exit.cloned().unwrap_or_else(RunExit::success));
        }
    }

    /// Runs launched so far.
    pub fn runs(&self) -> Arc<Mutex<Vec<RunRequest>>> {
        Arc::clone(&self.runs)
    }

    async fn profile_run(&self, name: &str, events: &RunEvents) {
        let dir = self.store.open(events.session_id());
        let mut snapshot = ProfileSnapshot::new(events.session_id().as_str(), name);

        for (n, page) in self.script.pages.iter().enumerate() {
            for profile in page {
                snapshot.push(profile.clone());
            }
            dir.write_profiles(&snapshot).unwrap();
            events.progress(
                ProgressRecord::new(RunPhase::Profiles, LogLevel::Info, format!("page {}", n + 1))
                    .with_count(snapshot.len()),
            );
            self.signal(events, WatchedFile::Profiles);
            tokio::time::sleep(STEP).await;
        }

        snapshot.complete();
        dir.write_profiles(&snapshot).unwrap();
        self.signal(events, WatchedFile::Profiles);
        if !snapshot.is_empty() {
            dir.mark_profiles_done().unwrap();
            self.signal(events, WatchedFile::ProfilesDone);
        }
        if self.script.corrupt_profiles_at_exit {
            // let the coordinator read the good snapshot first
            tokio::time::sleep(STEP).await;
            std::fs::write(dir.file(files::PROFILES), "{\"profiles\": [").unwrap();
        }
        self.exit(events, self.script.profile_exit.as_ref());
    }

    async fn collaborator_run(&self, profile_url: &str, events: &RunEvents) {
        let dir = self.store.open(events.session_id());
        let mut snapshot = CollaboratorSnapshot::new(profile_url);

        for record in &self.script.collaborators {
            snapshot.push(record.clone());
            dir.write_collaborators(&snapshot).unwrap();
            self.signal(events, WatchedFile::Collaborators);
            tokio::time::sleep(STEP).await;
        }

        snapshot.complete();
        dir.write_collaborators(&snapshot).unwrap();
        self.signal(events, WatchedFile::Collaborators);
        if !snapshot.is_empty() {
            dir.mark_collaborators_done().unwrap();
            self.signal(events, WatchedFile::CollaboratorsDone);
        }
        self.exit(events, self.script.collaborator_exit.as_ref());
    }
}

#[async_trait::async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self, run: RunRequest, events: RunEvents) -> DispatchResult<()> {
        if self.fail_collaborator_launch && matches!(run, RunRequest::Collaborators { .. }) {
            return Err(yok_akademik::DispatchError::launch("collaborator extraction", "refused"));
        }
        self.runs.lock().unwrap().push(run.clone());

        let launcher = self.clone();
        tokio::spawn(async move {
            match run {
                RunRequest::Profiles { name, .. } => launcher.profile_run(&name, &events).await,
                RunRequest::Collaborators { profile_url, .. } => {
                    launcher.collaborator_run(&profile_url, &events).await;
                }
            }
        });
        Ok(())
    }
}

pub fn profile(n: usize) -> ProfileRecord {
    ProfileRecord {
        author_id: Some(format!("A{n}")),
        name: format!("Kişi {n}"),
        title: "PROFESÖR".into(),
        profile_url: profile_url(n),
        ..Default::default()
    }
}

pub fn collaborator(name: &str) -> CollaboratorRecord {
    CollaboratorRecord {
        author_id: name.to_string(),
        name: name.to_string(),
        info: format!("{name} ÜNİVERSİTESİ"),
        photo_url: "/default_photo.jpg".into(),
        profile_url: format!("{BASE}?authorId={name}"),
        status: CollaboratorRecord::COMPLETED.into(),
    }
}

/// Receive events until a terminal one (or until `stop` matches), with a timeout.
pub async fn collect_until(
    subscription: &mut yok_akademik::dispatch::Subscription,
    stop: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("timed out waiting for events")
            .expect("subscription closed");
        let done = event.is_terminal() || stop(&event);
        events.push(event);
        if done {
            return events;
        }
    }
}

pub fn kinds(events: &[SessionEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event.as_str()).collect()
}

