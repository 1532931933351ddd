use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeshell_core::{EditorSurface, HeadlessSurface, LocalFileSystem};
use codeshell_project::{
    BufferError, BufferSession, EvictionPolicy, SaveOutcome, SessionEvent, MAX_OPEN,
};
use tempfile::{tempdir, TempDir};

fn fixture(names: &[&str]) -> (TempDir, Vec<PathBuf>) {
    let temp = tempdir().expect("tempdir");
    let paths = names
        .iter()
        .map(|name| {
            let path = temp.path().join(name);
            fs::write(&path, format!("contents of {name}\n")).expect("write fixture");
            path
        })
        .collect();
    (temp, paths)
}

fn buffers(capacity: usize) -> BufferSession<HeadlessSurface> {
    BufferSession::with_limits(
        Arc::new(LocalFileSystem),
        HeadlessSurface::new(),
        capacity,
        EvictionPolicy::InsertionOrder,
    )
}

fn assert_single_active(session: &BufferSession<HeadlessSurface>) {
    let active = session.tabs().iter().filter(|tab| tab.active).count();
    if session.is_empty() {
        assert_eq!(active, 0);
        assert!(session.active_path().is_none());
        assert!(session.surface().bound().is_none());
    } else {
        assert_eq!(active, 1);
        let path = session.active_path().expect("active document");
        let handle = session.document(path).expect("active is open").handle();
        assert_eq!(session.surface().bound(), Some(handle));
    }
}

fn edit(session: &mut BufferSession<HeadlessSurface>, path: &Path, text: &str) {
    let handle = session.document(path).expect("open").handle();
    session.surface_mut().insert(handle, 0, text);
}

#[test]
fn opening_a_fourth_file_evicts_the_oldest() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt", "c.txt", "d.txt"]);
    let [a, b, c, d] = [&paths[0], &paths[1], &paths[2], &paths[3]];
    let mut session = buffers(3);
    for path in [a, b, c] {
        session.open(path, true).expect("open");
    }

    session.open(d, true).expect("open d");
    assert_eq!(
        session.open_paths(),
        vec![b.clone(), c.clone(), d.clone()]
    );
    assert_eq!(session.active_path(), Some(d.as_path()));
    assert_single_active(&session);
    assert_eq!(session.surface().document_count(), 3);
}

#[test]
fn eviction_takes_the_oldest_even_when_the_second_is_active() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt", "c.txt", "d.txt"]);
    let mut session = buffers(3);
    for path in &paths[..3] {
        session.open(path, true).expect("open");
    }
    session.switch_to(&paths[1]).expect("switch to b");

    session.open(&paths[3], true).expect("open d");
    assert_eq!(
        session.open_paths(),
        vec![paths[1].clone(), paths[2].clone(), paths[3].clone()]
    );
    assert!(session
        .take_events()
        .contains(&SessionEvent::Evicted(paths[0].clone())));
}

#[test]
fn active_head_of_queue_is_not_evicted() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt", "c.txt", "d.txt"]);
    let mut session = buffers(3);
    for path in &paths[..3] {
        session.open(path, true).expect("open");
    }
    session.switch_to(&paths[0]).expect("switch to a");

    session.open(&paths[3], false).expect("open d in background");
    assert_eq!(
        session.open_paths(),
        vec![paths[0].clone(), paths[2].clone(), paths[3].clone()]
    );
    assert_eq!(session.active_path(), Some(paths[0].as_path()));
    assert_single_active(&session);
}

#[test]
fn eleventh_file_keeps_size_at_the_default_limit() {
    let names: Vec<String> = (0..=MAX_OPEN).map(|i| format!("file{i}.txt")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (_temp, paths) = fixture(&refs);
    let mut session = BufferSession::new(Arc::new(LocalFileSystem), HeadlessSurface::new());

    for path in &paths {
        session.open(path, true).expect("open");
        assert!(session.len() <= MAX_OPEN);
        assert_single_active(&session);
    }

    assert_eq!(session.len(), MAX_OPEN);
    assert!(!session.open_paths().contains(&paths[0]));
    assert!(session.open_paths().contains(&paths[MAX_OPEN]));
}

#[test]
fn lru_policy_evicts_least_recently_activated() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt", "c.txt", "d.txt"]);
    let mut session = BufferSession::with_limits(
        Arc::new(LocalFileSystem),
        HeadlessSurface::new(),
        3,
        EvictionPolicy::LeastRecentlyActivated,
    );
    for path in &paths[..3] {
        session.open(path, true).expect("open");
    }
    session.switch_to(&paths[0]).expect("reactivate a");
    session.switch_to(&paths[2]).expect("reactivate c");

    session.open(&paths[3], true).expect("open d");
    assert_eq!(
        session.open_paths(),
        vec![paths[0].clone(), paths[2].clone(), paths[3].clone()]
    );
}

#[test]
fn capacity_of_one_replaces_the_active_document() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt"]);
    let mut session = buffers(1);
    session.open(&paths[0], true).expect("open a");
    session.open(&paths[1], false).expect("open b");

    assert_eq!(session.open_paths(), vec![paths[1].clone()]);
    assert_eq!(session.active_path(), Some(paths[1].as_path()));
    assert_single_active(&session);
}

#[test]
fn reopening_an_open_file_allocates_nothing() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt"]);
    let mut session = buffers(MAX_OPEN);
    session.open(&paths[0], true).expect("open a");
    session.open(&paths[1], true).expect("open b");
    let documents = session.surface().document_count();
    let subscriptions = session.surface().subscription_count();

    session.open(&paths[0], true).expect("reopen a");
    session.open(&paths[0], true).expect("reopen a again");
    assert_eq!(session.len(), 2);
    assert_eq!(session.surface().document_count(), documents);
    assert_eq!(session.surface().subscription_count(), subscriptions);
    assert_eq!(session.active_path(), Some(paths[0].as_path()));
}

#[test]
fn save_round_trips_through_disk() {
    let (_temp, paths) = fixture(&["notes.md"]);
    let path = &paths[0];
    let mut session = buffers(MAX_OPEN);
    session.open(path, true).expect("open");
    edit(&mut session, path, "# Title\n");
    assert!(session.has_unsaved_changes());

    assert_eq!(session.save(path).expect("save"), SaveOutcome::Written);
    assert!(!session.is_modified(path));
    assert!(!session.has_unsaved_changes());
    let document = session.document(path).expect("still open");
    assert_eq!(
        session.value(path).as_deref(),
        Some(document.original_content())
    );
    assert_eq!(
        fs::read_to_string(path).expect("read back"),
        "# Title\ncontents of notes.md\n"
    );
}

#[test]
fn failed_write_keeps_the_document_dirty() {
    let temp = tempdir().expect("tempdir");
    let nested = temp.path().join("nested");
    fs::create_dir(&nested).expect("mkdir");
    let path = nested.join("a.txt");
    fs::write(&path, "text").expect("write");

    let mut session = buffers(MAX_OPEN);
    session.open(&path, true).expect("open");
    edit(&mut session, &path, "more ");
    fs::remove_dir_all(&nested).expect("remove parent");

    let err = session.save(&path).expect_err("save should fail");
    assert!(matches!(err, BufferError::Write { .. }));
    assert!(session.is_modified(&path));
    assert!(session.has_unsaved_changes());
}

#[test]
fn save_all_reports_progress_before_the_failure() {
    let temp = tempdir().expect("tempdir");
    let ok = temp.path().join("ok.txt");
    let nested = temp.path().join("nested");
    fs::create_dir(&nested).expect("mkdir");
    let broken = nested.join("broken.txt");
    let later = temp.path().join("later.txt");
    for path in [&ok, &broken, &later] {
        fs::write(path, "x").expect("write");
    }

    let mut session = buffers(MAX_OPEN);
    for path in [&ok, &broken, &later] {
        session.open(path, true).expect("open");
        edit(&mut session, path, "y");
    }
    fs::remove_dir_all(&nested).expect("remove parent");

    let err = session.save_all().expect_err("save_all should stop");
    assert_eq!(err.saved, vec![ok.clone()]);
    assert_eq!(err.path, broken);
    assert!(!session.is_modified(&ok));
    assert!(session.is_modified(&later));
}

#[test]
fn closing_the_sole_dirty_document_discards_edits() {
    let (_temp, paths) = fixture(&["a.txt"]);
    let path = &paths[0];
    let mut session = buffers(MAX_OPEN);
    session.open(path, true).expect("open");
    edit(&mut session, path, "unsaved ");
    session.take_events();

    session.close(path).expect("close");
    assert!(!session.has_unsaved_changes());
    assert!(session.active_path().is_none());
    assert!(session.surface().bound().is_none());
    assert_eq!(session.surface().document_count(), 0);
    assert_eq!(
        session.take_events(),
        vec![
            SessionEvent::Closed {
                path: path.clone(),
                discarded: true
            },
            SessionEvent::Emptied
        ]
    );
    assert_eq!(
        fs::read_to_string(path).expect("read"),
        "contents of a.txt\n"
    );
}

#[test]
fn closing_the_active_document_activates_the_newest_remaining() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt", "c.txt"]);
    let mut session = buffers(MAX_OPEN);
    for path in &paths {
        session.open(path, true).expect("open");
    }
    session.switch_to(&paths[1]).expect("switch to b");

    session.close(&paths[1]).expect("close b");
    assert_eq!(session.active_path(), Some(paths[2].as_path()));
    assert_single_active(&session);
}

#[test]
fn operations_on_unknown_paths_fail_with_not_open() {
    let mut session = buffers(MAX_OPEN);
    let ghost = Path::new("/definitely/not/open.txt");
    assert!(matches!(
        session.switch_to(ghost),
        Err(BufferError::NotOpen(_))
    ));
    assert!(matches!(session.close(ghost), Err(BufferError::NotOpen(_))));
    assert!(matches!(session.save(ghost), Err(BufferError::NotOpen(_))));
}

#[test]
fn read_failure_leaves_the_working_set_unchanged() {
    let (temp, paths) = fixture(&["a.txt", "b.txt"]);
    let mut session = buffers(2);
    session.open(&paths[0], true).expect("open a");
    session.open(&paths[1], true).expect("open b");

    let err = session
        .open(&temp.path().join("missing.txt"), true)
        .expect_err("missing file");
    assert!(matches!(err, BufferError::Read { .. }));
    assert_eq!(session.open_paths(), paths);
    assert_eq!(session.active_path(), Some(paths[1].as_path()));
}

#[test]
fn evicted_documents_release_surface_resources() {
    let (_temp, paths) = fixture(&["a.txt", "b.txt", "c.txt"]);
    let mut session = buffers(2);
    session.open(&paths[0], true).expect("open a");
    let evicted = session.document(&paths[0]).expect("open").handle();
    session.open(&paths[1], true).expect("open b");
    session.open(&paths[2], true).expect("open c");

    assert!(!session.surface().is_alive(evicted));
    assert_eq!(session.surface().document_count(), 2);
    assert_eq!(session.surface().subscription_count(), 2);
}
