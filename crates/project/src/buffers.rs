use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeshell_core::catalog::{self, FileTypeInfo};
use codeshell_core::fs::{FileSystem, FsError};
use codeshell_core::surface::EditorSurface;
use codeshell_core::Document;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::SessionSnapshot;
use crate::working_set::{EvictionPolicy, WorkingSet, MAX_OPEN};

/// Errors surfaced by buffer operations.
/// 緩衝區操作的錯誤。
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("cannot open {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: FsError,
    },
    #[error("cannot save {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: FsError,
    },
    #[error("{0} is not open")]
    NotOpen(PathBuf),
    #[error("{0} has unsaved changes")]
    Unsaved(PathBuf),
}

/// `save_all` stopped at `path`; everything in `saved` was written first.
/// `save_all` 在 `path` 失敗；`saved` 內的文件已先行儲存。
#[derive(Debug, Error)]
#[error("saving stopped at {path} after {} document(s): {source}", .saved.len())]
pub struct SaveAllError {
    pub saved: Vec<PathBuf>,
    pub path: PathBuf,
    #[source]
    pub source: BufferError,
}

/// State changes recorded by [`BufferSession`], drained with [`BufferSession::take_events`].
/// [`BufferSession`] 記錄的狀態變化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened(PathBuf),
    Activated(PathBuf),
    Evicted(PathBuf),
    Closed { path: PathBuf, discarded: bool },
    Saved(PathBuf),
    /// The last document went away; the surface shows its placeholder.
    Emptied,
}

impl SessionEvent {
    /// Whether the persisted session snapshot is now stale.
    /// 工作階段快照是否需要重新寫入。
    pub fn affects_snapshot(&self) -> bool {
        !matches!(self, SessionEvent::Saved(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Unopened,
    Clean,
    Dirty,
}

/// What [`BufferSession::save`] ended up doing.
/// 儲存操作的結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to do.
    Clean,
    /// Text matched the last saved content; flag cleared without writing.
    Unchanged,
    Written,
}

/// Tab-bar view of an open document.
/// 分頁列顯示的文件資訊。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub path: PathBuf,
    pub title: String,
    pub info: FileTypeInfo,
    pub active: bool,
    pub modified: bool,
}

/// Outcome of [`BufferSession::restore_session`].
/// 還原工作階段的結果摘要。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub active: Option<PathBuf>,
}

/// Owns the working set and the single binding to the editor surface.
/// 管理工作集與唯一的編輯器綁定。
///
/// Every mutating call takes `&mut self`, so operations never interleave.
/// 所有變更操作皆需 `&mut self`，因此不會交錯執行。
pub struct BufferSession<S> {
    fs: Arc<dyn FileSystem>,
    surface: S,
    documents: WorkingSet,
    active: Option<PathBuf>,
    tick: u64,
    events: Vec<SessionEvent>,
}

impl<S: fmt::Debug> fmt::Debug for BufferSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSession")
            .field("surface", &self.surface)
            .field("documents", &self.documents.paths())
            .field("active", &self.active)
            .finish()
    }
}

impl<S: EditorSurface> BufferSession<S> {
    pub fn new(fs: Arc<dyn FileSystem>, surface: S) -> Self {
        Self::with_limits(fs, surface, MAX_OPEN, EvictionPolicy::default())
    }

    pub fn with_limits(
        fs: Arc<dyn FileSystem>,
        surface: S,
        capacity: usize,
        policy: EvictionPolicy,
    ) -> Self {
        Self {
            fs,
            surface,
            documents: WorkingSet::new(capacity, policy),
            active: None,
            tick: 0,
            events: Vec::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct access for hosts that forward keystrokes to the surface.
    /// 供宿主轉送編輯動作至編輯器。
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn capacity(&self) -> usize {
        self.documents.capacity()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    pub fn open_paths(&self) -> Vec<PathBuf> {
        self.documents.paths()
    }

    pub fn document(&self, path: &Path) -> Option<&Document> {
        self.documents.get(path)
    }

    /// Current text of an open document.
    /// 取得已開啟文件目前的文字。
    pub fn value(&self, path: &Path) -> Option<String> {
        self.documents
            .get(path)
            .and_then(|document| self.surface.value(document.handle()))
    }

    pub fn is_modified(&self, path: &Path) -> bool {
        self.documents
            .get(path)
            .is_some_and(|document| document.is_modified())
    }

    pub fn state_of(&self, path: &Path) -> DocumentState {
        match self.documents.get(path) {
            None => DocumentState::Unopened,
            Some(document) if document.is_modified() => DocumentState::Dirty,
            Some(_) => DocumentState::Clean,
        }
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.documents.iter().any(Document::is_modified)
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.documents
            .iter()
            .map(|document| Tab {
                path: document.path().to_path_buf(),
                title: document.title(),
                info: catalog::file_info(document.path()),
                active: self.active.as_deref() == Some(document.path()),
                modified: document.is_modified(),
            })
            .collect()
    }

    /// Drains the events recorded since the last call.
    /// 取出自上次呼叫以來記錄的事件。
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Opens `path`, or just switches to it when it is already open.
    /// 開啟 `path`；若已開啟則僅切換。
    ///
    /// A read failure leaves the working set untouched. When nothing is active
    /// afterwards the new document is activated even if `activate` is false.
    /// 讀取失敗時工作集不變；若開啟後沒有使用中的文件，新文件一律成為使用中。
    pub fn open(&mut self, path: &Path, activate: bool) -> Result<(), BufferError> {
        if self.documents.contains(path) {
            if activate {
                self.switch_to(path)?;
            }
            return Ok(());
        }

        let decoded = self.fs.read_file(path).map_err(|source| BufferError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if self.documents.is_full() {
            self.evict_for(path);
        }

        let language = catalog::language(path);
        let handle = self.surface.create_document(&decoded.text, language);
        let mut document = Document::new(path, handle, decoded.text, decoded.format, language);
        let subscription = self
            .surface
            .on_content_changed(handle, document.dirty_listener());
        document.track_subscription(subscription);
        self.documents.insert(document);
        debug!(path = %path.display(), language, "opened document");
        self.events.push(SessionEvent::Opened(path.to_path_buf()));

        if activate || self.active.is_none() {
            self.activate(path);
        }
        Ok(())
    }

    /// Binds an open document to the surface, restoring its view state.
    /// 將已開啟的文件綁定至編輯器並還原其檢視狀態。
    pub fn switch_to(&mut self, path: &Path) -> Result<(), BufferError> {
        if !self.documents.contains(path) {
            return Err(BufferError::NotOpen(path.to_path_buf()));
        }
        if self.active.as_deref() != Some(path) {
            self.activate(path);
        }
        Ok(())
    }

    /// Closes a document without saving; unsaved edits are discarded.
    /// 關閉文件但不儲存；未儲存的修改會被捨棄。
    pub fn close(&mut self, path: &Path) -> Result<(), BufferError> {
        if !self.documents.contains(path) {
            return Err(BufferError::NotOpen(path.to_path_buf()));
        }
        let was_active = self.active.as_deref() == Some(path);
        let discarded = self.release(path);
        if discarded {
            debug!(path = %path.display(), "discarding unsaved changes on close");
        }
        self.events.push(SessionEvent::Closed {
            path: path.to_path_buf(),
            discarded,
        });

        if was_active {
            match self.documents.last().map(|next| next.path().to_path_buf()) {
                Some(next) => self.activate(&next),
                None => self.events.push(SessionEvent::Emptied),
            }
        }
        Ok(())
    }

    /// Like [`close`](Self::close) but refuses to drop unsaved edits.
    /// 與 `close` 相同，但遇到未儲存的修改時拒絕關閉。
    pub fn try_close(&mut self, path: &Path) -> Result<(), BufferError> {
        if self.is_modified(path) {
            return Err(BufferError::Unsaved(path.to_path_buf()));
        }
        self.close(path)
    }

    /// Closes every document and leaves the surface unbound.
    /// 關閉所有文件並解除編輯器綁定。
    pub fn close_all(&mut self) {
        let paths = self.documents.paths();
        if paths.is_empty() {
            return;
        }
        for path in paths {
            let discarded = self.release(&path);
            self.events.push(SessionEvent::Closed { path, discarded });
        }
        self.events.push(SessionEvent::Emptied);
    }

    /// Writes a dirty document back using its original on-disk format.
    /// 以原始格式寫回已修改的文件。
    pub fn save(&mut self, path: &Path) -> Result<SaveOutcome, BufferError> {
        let document = self
            .documents
            .get_mut(path)
            .ok_or_else(|| BufferError::NotOpen(path.to_path_buf()))?;
        if !document.is_modified() {
            return Ok(SaveOutcome::Clean);
        }
        let current = self
            .surface
            .value(document.handle())
            .ok_or_else(|| BufferError::NotOpen(path.to_path_buf()))?;
        if current == document.original_content() {
            document.mark_clean();
            return Ok(SaveOutcome::Unchanged);
        }

        self.fs
            .write_file(path, &current, document.format())
            .map_err(|source| BufferError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        document.mark_saved(current);
        debug!(path = %path.display(), "saved document");
        self.events.push(SessionEvent::Saved(path.to_path_buf()));
        Ok(SaveOutcome::Written)
    }

    /// Saves every dirty document in queue order, stopping at the first failure.
    /// 依佇列順序儲存所有已修改文件，遇到第一個失敗即停止。
    pub fn save_all(&mut self) -> Result<Vec<PathBuf>, SaveAllError> {
        let dirty: Vec<PathBuf> = self
            .documents
            .iter()
            .filter(|document| document.is_modified())
            .map(|document| document.path().to_path_buf())
            .collect();
        let mut saved = Vec::with_capacity(dirty.len());
        for path in dirty {
            match self.save(&path) {
                Ok(_) => saved.push(path),
                Err(source) => return Err(SaveAllError { saved, path, source }),
            }
        }
        Ok(saved)
    }

    /// Replaces the open documents with those recorded in `snapshot`.
    /// 以快照內容取代目前開啟的文件。
    ///
    /// Missing files are dropped quietly and unreadable ones are logged; the
    /// call itself never fails.
    /// 不存在的檔案直接略過，無法讀取的檔案記錄後略過；本身不會失敗。
    pub fn restore_session(&mut self, snapshot: &SessionSnapshot) -> RestoreReport {
        self.close_all();

        let mut report = RestoreReport::default();
        let mut seen = HashSet::new();
        let candidates: Vec<&PathBuf> = snapshot
            .opened_files
            .iter()
            .filter(|path| seen.insert(path.as_path()))
            .take(self.capacity())
            .collect();

        for path in candidates {
            if !self.fs.exists(path) {
                debug!(path = %path.display(), "session file no longer exists");
                report.missing.push(path.clone());
                continue;
            }
            match self.open(path, false) {
                Ok(()) => report.restored.push(path.clone()),
                Err(err) => {
                    warn!(%err, "skipping unreadable session file");
                    report.failed.push(path.clone());
                }
            }
        }

        if let Some(last) = &snapshot.last_opened_file {
            if self.documents.contains(last) && self.active.as_ref() != Some(last) {
                self.activate(last);
            }
        }
        report.active = self.active.clone();
        info!(
            restored = report.restored.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "restored session"
        );
        report
    }

    fn activate(&mut self, path: &Path) {
        if let Some(previous) = self.active.take() {
            let view = self.surface.save_view_state();
            if let Some(document) = self.documents.get_mut(&previous) {
                document.set_view_state(view);
            }
            self.surface.unbind();
        }

        let Some(document) = self.documents.get_mut(path) else {
            return;
        };
        self.tick += 1;
        document.touch(self.tick);
        self.surface.bind(document.handle());
        if let Some(view) = document.view_state() {
            self.surface.restore_view_state(view);
        }
        self.active = Some(path.to_path_buf());
        self.events.push(SessionEvent::Activated(path.to_path_buf()));
    }

    fn evict_for(&mut self, opening: &Path) {
        let Some(victim) = self.documents.eviction_candidate(self.active.as_deref()) else {
            return;
        };
        debug_assert_ne!(
            victim.as_path(),
            opening,
            "the document being opened cannot be evicted"
        );
        let discarded = self.release(&victim);
        debug!(path = %victim.display(), discarded, "evicted document");
        self.events.push(SessionEvent::Evicted(victim));
    }

    /// Unbinds, unsubscribes and disposes before dropping the entry.
    /// Returns whether unsaved edits were thrown away.
    fn release(&mut self, path: &Path) -> bool {
        if self.active.as_deref() == Some(path) {
            self.surface.unbind();
            self.active = None;
        }
        let Some(document) = self.documents.get_mut(path) else {
            return false;
        };
        for subscription in document.take_subscriptions() {
            self.surface.unsubscribe(subscription);
        }
        self.surface.dispose_document(document.handle());
        let discarded = document.is_modified();
        self.documents.remove(path);
        discarded
    }
}
