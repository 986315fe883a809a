//! Profile extraction against a scripted registry site.

mod common;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use common::{profile_url, row, FakeSite};
use yok_akademik::browser::{PageTurn, RawProfileRow};
use yok_akademik::config::{files, limits};
use yok_akademik::extract::ProfileExtractor;
use yok_akademik::models::{ProfileSnapshot, ProfileStatus, ProgressRecord, ProgressSink, SessionId};
use yok_akademik::{SessionDir, SessionStore};

fn session(root: &std::path::Path) -> SessionDir {
    SessionStore::new(root).create(&SessionId::parse("session_profiles").unwrap()).unwrap()
}

fn pages(sizes: &[usize]) -> Vec<Vec<RawProfileRow>> {
    let mut next = 0;
    sizes
        .iter()
        .map(|&size| {
            let page = (next..next + size).map(row).collect();
            next += size;
            page
        })
        .collect()
}

/// Sink that re-reads the snapshot on every progress record.
struct SnapshotProbe {
    dir: SessionDir,
    seen: Mutex<Vec<ProfileSnapshot>>,
}

impl ProgressSink for SnapshotProbe {
    fn report(&self, _record: ProgressRecord) {
        if let Some(snapshot) = self.dir.read_profiles().unwrap() {
            self.seen.lock().unwrap().push(snapshot);
        }
    }
}

// =============================================================================
// Paging
// =============================================================================

#[tokio::test]
async fn test_two_pages_three_profiles() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());
    let site = FakeSite::with_pages(pages(&[2, 1]));
    let calls = site.calls();

    let snapshot = ProfileExtractor::new(site, dir.clone(), Arc::new(())).run("Ayşe Kaya").await.unwrap();

    assert_eq!(snapshot.total_profiles, 3);
    assert_eq!(snapshot.status, ProfileStatus::Completed);
    assert_eq!(snapshot.searched_name, "Ayşe Kaya");
    assert_eq!(snapshot.session_id, "session_profiles");

    let on_disk = dir.read_profiles().unwrap().unwrap();
    assert_eq!(on_disk, snapshot);
    assert!(dir.profiles_done());
    assert_eq!(std::fs::read_to_string(dir.file(files::PROFILES_DONE)).unwrap(), "done");

    let calls = calls.lock().unwrap();
    assert!(calls.contains(&"submit_search Ayşe Kaya".to_string()));
    assert!(calls.contains(&"next_page 2".to_string()));
    assert_eq!(calls.last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_rows_become_full_records() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());

    let snapshot =
        ProfileExtractor::new(FakeSite::with_pages(pages(&[1])), dir, Arc::new(())).run("Kişi").await.unwrap();
    let profile = &snapshot.profiles[0];

    assert_eq!(profile.author_id.as_deref(), Some("A0"));
    assert_eq!(profile.title, "PROFESÖR");
    assert_eq!(profile.name, "Kişi 0");
    assert_eq!(profile.education, "ÖRNEK ÜNİVERSİTESİ/MÜHENDİSLİK FAKÜLTESİ");
    assert_eq!(profile.field, "Mühendislik");
    assert_eq!(profile.speciality, "Bilgisayar");
    assert_eq!(profile.keywords, "ağlar ; güvenlik");
    assert_eq!(profile.email, "kisi0@ornek.edu.tr");
    assert_eq!(profile.photo_url, "https://akademik.yok.gov.tr/photo/0.jpg");
}

#[tokio::test]
async fn test_duplicate_urls_across_pages_kept_once() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());
    let site = FakeSite::with_pages(vec![vec![row(1), row(2)], vec![row(2), row(3)]]);

    let snapshot = ProfileExtractor::new(site, dir, Arc::new(())).run("x").await.unwrap();

    let urls: Vec<_> = snapshot.profiles.iter().map(|p| p.profile_url.clone()).collect();
    assert_eq!(urls, [profile_url(1), profile_url(2), profile_url(3)]);
}

#[tokio::test]
async fn test_cap_stops_mid_page() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());
    let site = FakeSite::with_pages(pages(&[30, 30, 30, 30, 30]));
    let calls = site.calls();

    let snapshot = ProfileExtractor::new(site, dir.clone(), Arc::new(())).run("x").await.unwrap();

    assert_eq!(snapshot.len(), limits::MAX_PROFILES);
    assert_eq!(snapshot.total_profiles, limits::MAX_PROFILES);
    assert_eq!(snapshot.profiles.last().unwrap().profile_url, profile_url(99));
    assert!(dir.profiles_done());

    let calls = calls.lock().unwrap();
    assert!(calls.contains(&"next_page 4".to_string()));
    assert!(!calls.contains(&"next_page 5".to_string()));
}

#[tokio::test]
async fn test_unavailable_pagination_ends_run() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());
    let site = FakeSite::with_pages(pages(&[2])).ending_with(PageTurn::Unavailable);

    let snapshot = ProfileExtractor::new(site, dir, Arc::new(())).run("x").await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.is_completed());
}

#[tokio::test]
async fn test_unparseable_row_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());
    let broken = RawProfileRow { info_text: None, ..row(7) };
    let no_link = RawProfileRow { profile_url: None, ..row(8) };
    let site = FakeSite::with_pages(vec![vec![row(1), broken, no_link, row(2)]]);

    let snapshot = ProfileExtractor::new(site, dir, Arc::new(())).run("x").await.unwrap();
    assert_eq!(snapshot.len(), 2);
}

// =============================================================================
// Zero results
// =============================================================================

#[tokio::test]
async fn test_no_rows_completes_without_marker() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());

    let snapshot = ProfileExtractor::new(FakeSite::default(), dir.clone(), Arc::new(())).run("Yok Böyle").await.unwrap();

    assert!(snapshot.is_empty());
    let on_disk = dir.read_profiles().unwrap().unwrap();
    assert_eq!(on_disk.status, ProfileStatus::Completed);
    assert!(on_disk.profiles.is_empty());
    assert_eq!(on_disk.total_profiles, 0);
    assert!(!dir.profiles_done());
}

#[tokio::test]
async fn test_empty_page_completes_without_marker() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());

    let snapshot = ProfileExtractor::new(FakeSite::with_pages(vec![vec![]]), dir.clone(), Arc::new(()))
        .run("x")
        .await
        .unwrap();

    assert!(snapshot.is_completed());
    assert!(!dir.profiles_done());
}

// =============================================================================
// Snapshot history
// =============================================================================

#[tokio::test]
async fn test_intermediate_snapshots_are_prefixes_of_final() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());
    let probe = Arc::new(SnapshotProbe { dir: dir.clone(), seen: Mutex::new(Vec::new()) });

    let site = FakeSite::with_pages(vec![vec![row(1), row(2)], vec![row(2), row(3), row(4)], vec![row(5)]]);
    let final_snapshot = ProfileExtractor::new(site, dir, probe.clone()).run("x").await.unwrap();

    let seen = probe.seen.lock().unwrap();
    assert!(seen.len() >= 3, "one read per page at least");
    for snapshot in seen.iter() {
        assert_eq!(snapshot.total_profiles, snapshot.profiles.len());
        assert!(snapshot.profiles.len() <= final_snapshot.profiles.len());
        assert_eq!(snapshot.profiles[..], final_snapshot.profiles[..snapshot.profiles.len()]);
    }
    let ongoing: Vec<usize> = seen
        .iter()
        .filter(|s| s.status == ProfileStatus::Ongoing)
        .map(ProfileSnapshot::len)
        .collect();
    assert!(ongoing.windows(2).all(|w| w[0] <= w[1]));
    assert!(ongoing.contains(&2) && ongoing.contains(&4));
}

#[tokio::test]
async fn test_progress_records_carry_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = session(tmp.path());
    let (tx, mut rx) = mpsc::unbounded_channel();

    ProfileExtractor::new(FakeSite::with_pages(pages(&[2, 1])), dir, Arc::new(tx)).run("x").await.unwrap();

    let mut counts = Vec::new();
    while let Ok(record) = rx.try_recv() {
        if let Some(count) = record.count {
            counts.push(count);
        }
    }
    assert_eq!(counts, [2, 3, 3]);
}
