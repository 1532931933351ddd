use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeshell_core::fs::FileSystem;
use codeshell_core::surface::EditorSurface;
use thiserror::Error;
use tracing::{debug, warn};

use crate::buffers::{
    BufferError, BufferSession, RestoreReport, SaveAllError, SaveOutcome, SessionEvent,
};
use crate::links::{self, LinkError};
use crate::persist::SnapshotPersister;
use crate::session::SessionSnapshot;
use crate::tree::{DirectoryTree, TreeError};
use crate::working_set::{EvictionPolicy, MAX_OPEN};

/// Theme used until the user picks one.
/// 使用者尚未選擇時的預設佈景主題。
pub const DEFAULT_THEME: &str = "vs-dark";

/// Errors surfaced by workspace actions.
/// 工作區操作的錯誤。
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    SaveAll(#[from] SaveAllError),
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Limits and defaults applied when building a [`Workspace`].
/// 建立工作區時使用的上限與預設值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceOptions {
    pub max_open_documents: usize,
    pub eviction: EvictionPolicy,
    pub theme: String,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            max_open_documents: MAX_OPEN,
            eviction: EvictionPolicy::default(),
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

/// Composition root owning the tree, the buffers and the selected theme.
/// 組合根：持有目錄樹、緩衝區與目前的佈景主題。
///
/// Every action that changes persisted state schedules a snapshot write on
/// the attached persister, if any.
/// 每個改變持久化狀態的動作都會排程寫入快照。
pub struct Workspace<S> {
    fs: Arc<dyn FileSystem>,
    tree: DirectoryTree,
    buffers: BufferSession<S>,
    theme: String,
    persister: Option<SnapshotPersister>,
    events: Vec<SessionEvent>,
}

impl<S: fmt::Debug> fmt::Debug for Workspace<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("tree", &self.tree)
            .field("buffers", &self.buffers)
            .field("theme", &self.theme)
            .field("persister", &self.persister)
            .finish()
    }
}

impl<S: EditorSurface> Workspace<S> {
    pub fn new(fs: Arc<dyn FileSystem>, surface: S, options: WorkspaceOptions) -> Self {
        Self {
            tree: DirectoryTree::new(Arc::clone(&fs)),
            buffers: BufferSession::with_limits(
                Arc::clone(&fs),
                surface,
                options.max_open_documents,
                options.eviction,
            ),
            fs,
            theme: options.theme,
            persister: None,
            events: Vec::new(),
        }
    }

    /// Attaches the background writer used for session snapshots.
    /// 設定負責寫入快照的背景寫入器。
    pub fn with_persister(mut self, persister: SnapshotPersister) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn buffers(&self) -> &BufferSession<S> {
        &self.buffers
    }

    /// Editor surface, for forwarding edits.
    /// 取得編輯器介面以轉送編輯動作。
    pub fn editor_mut(&mut self) -> &mut S {
        self.buffers.surface_mut()
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Buffer events observed since the last call.
    /// 取出自上次呼叫以來的緩衝區事件。
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Snapshot of the current state as it would be persisted.
    /// 目前狀態的快照。
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            last_opened_dir: self.tree.root().map(Path::to_path_buf),
            last_opened_file: self.buffers.active_path().map(Path::to_path_buf),
            opened_files: self.buffers.open_paths(),
            expanded_dirs: self.tree.expanded_dirs(),
            selected_theme: Some(self.theme.clone()),
        }
    }

    /// Opens `dir` as the workspace folder, closing every tab.
    /// 開啟資料夾並關閉所有分頁。
    pub fn open_folder(&mut self, dir: &Path) -> Result<(), WorkspaceError> {
        self.tree.open_root(dir)?;
        self.buffers.close_all();
        self.sync(true);
        Ok(())
    }

    pub fn expand(&mut self, dir: &Path) -> Result<(), WorkspaceError> {
        self.tree.expand(dir)?;
        self.sync(true);
        Ok(())
    }

    pub fn collapse(&mut self, dir: &Path) -> Result<(), WorkspaceError> {
        self.tree.collapse(dir)?;
        self.sync(true);
        Ok(())
    }

    pub fn open_file(&mut self, path: &Path, activate: bool) -> Result<(), WorkspaceError> {
        let result = self.buffers.open(path, activate);
        self.sync(false);
        result.map_err(Into::into)
    }

    /// Resolves a link clicked in the active document and opens the file it names.
    /// 解析目前文件中點擊的連結並開啟對應檔案。
    pub fn open_link(&mut self, link: &str) -> Result<PathBuf, WorkspaceError> {
        let active = self
            .buffers
            .active_path()
            .ok_or_else(|| LinkError::NoActiveDocument(link.to_string()))?;
        let current_dir = active.parent().unwrap_or(active).to_path_buf();
        let candidates = links::link_candidates(link, &current_dir, self.tree.root());
        let resolved = links::resolve_link(self.fs.as_ref(), &candidates)
            .ok_or_else(|| LinkError::NotFound(link.to_string()))?;
        debug!(link, path = %resolved.display(), "resolved link");
        self.open_file(&resolved, true)?;
        Ok(resolved)
    }

    pub fn switch_to(&mut self, path: &Path) -> Result<(), WorkspaceError> {
        let result = self.buffers.switch_to(path);
        self.sync(false);
        result.map_err(Into::into)
    }

    pub fn close(&mut self, path: &Path) -> Result<(), WorkspaceError> {
        let result = self.buffers.close(path);
        self.sync(false);
        result.map_err(Into::into)
    }

    pub fn try_close(&mut self, path: &Path) -> Result<(), WorkspaceError> {
        let result = self.buffers.try_close(path);
        self.sync(false);
        result.map_err(Into::into)
    }

    pub fn save(&mut self, path: &Path) -> Result<SaveOutcome, WorkspaceError> {
        let result = self.buffers.save(path);
        self.sync(false);
        result.map_err(Into::into)
    }

    pub fn save_all(&mut self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let result = self.buffers.save_all();
        self.sync(false);
        result.map_err(Into::into)
    }

    pub fn set_theme(&mut self, theme: impl Into<String>) {
        self.theme = theme.into();
        self.sync(true);
    }

    pub fn create_file(&mut self, parent: &Path, name: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.tree.create_file(parent, name)?;
        self.sync(true);
        Ok(path)
    }

    pub fn create_folder(&mut self, parent: &Path, name: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.tree.create_folder(parent, name)?;
        self.sync(true);
        Ok(path)
    }

    /// Deletes an item; open documents beneath it are closed without saving.
    /// 刪除項目；其下已開啟的文件直接關閉且不儲存。
    ///
    /// Documents are closed whenever the item is gone from disk, even if the
    /// tree refresh that follows the delete fails.
    pub fn delete_item(&mut self, path: &Path) -> Result<(), WorkspaceError> {
        let affected = self.affected_documents(path);
        let result = self.tree.delete_item(path);
        if result.is_ok() || !self.fs.exists(path) {
            for open in affected {
                self.buffers.close(&open)?;
            }
        }
        self.sync(true);
        result.map_err(Into::into)
    }

    /// Renames an item and reopens affected documents under their new paths.
    /// 重新命名項目，並以新路徑重新開啟受影響的文件。
    ///
    /// Fails with [`BufferError::Unsaved`] before touching the disk when an
    /// affected document has unsaved edits, and with an already-exists error
    /// when the new name is taken.
    /// 若受影響的文件有未儲存修改，或目標名稱已存在，會在變更磁碟前回傳錯誤。
    pub fn rename_item(&mut self, from: &Path, new_name: &str) -> Result<PathBuf, WorkspaceError> {
        let affected = self.affected_documents(from);
        if let Some(dirty) = affected.iter().find(|path| self.buffers.is_modified(path)) {
            return Err(BufferError::Unsaved(dirty.clone()).into());
        }

        let to = self.tree.rename_item(from, new_name)?;
        for old in affected {
            let was_active = self.buffers.active_path() == Some(old.as_path());
            let renamed = match old.strip_prefix(from) {
                Ok(rest) if !rest.as_os_str().is_empty() => to.join(rest),
                _ => to.clone(),
            };
            self.buffers.close(&old)?;
            self.buffers.open(&renamed, was_active)?;
            debug!(from = %old.display(), to = %renamed.display(), "reopened renamed document");
        }
        self.sync(true);
        Ok(to)
    }

    /// Rebuilds the workspace from a persisted snapshot. Never fails as a whole.
    /// 依快照重建工作區；整體不會失敗。
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> RestoreReport {
        if let Some(theme) = &snapshot.selected_theme {
            self.theme = theme.clone();
        }
        match &snapshot.last_opened_dir {
            Some(dir) => match self.tree.open_root(dir) {
                Ok(()) => self.tree.restore_expanded(&snapshot.expanded_dirs),
                Err(err) => warn!(%err, "cannot reopen last folder"),
            },
            None => self.tree.clear(),
        }
        let report = self.buffers.restore_session(snapshot);
        self.sync(true);
        report
    }

    /// Blocks until pending snapshot writes are done.
    /// 等待尚未完成的快照寫入。
    pub fn flush(&self) {
        if let Some(persister) = &self.persister {
            persister.flush();
        }
    }

    fn affected_documents(&self, root: &Path) -> Vec<PathBuf> {
        self.buffers
            .open_paths()
            .into_iter()
            .filter(|path| path.starts_with(root))
            .collect()
    }

    fn sync(&mut self, force: bool) {
        let events = self.buffers.take_events();
        let stale = force || events.iter().any(SessionEvent::affects_snapshot);
        self.events.extend(events);
        if !stale {
            return;
        }
        if let Some(persister) = &self.persister {
            persister.schedule(self.snapshot());
        }
    }
}
