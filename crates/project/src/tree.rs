use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeshell_core::catalog::{self, FOLDER_ICON};
use codeshell_core::fs::{DirEntry, FileSystem, FsError};
use indexmap::IndexSet;
use thiserror::Error;
use tracing::debug;

/// One materialised node of the directory tree.
/// 目錄樹中已載入的節點。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub expanded: bool,
    /// `None` until the directory has been listed once.
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    fn directory(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path: path.to_path_buf(),
            is_dir: true,
            expanded: false,
            children: None,
        }
    }

    fn from_entry(entry: DirEntry) -> Self {
        Self {
            name: entry.name,
            path: entry.path,
            is_dir: entry.is_dir,
            expanded: false,
            children: None,
        }
    }
}

/// Flattened, render-ready view of a visible node.
/// 供繪製使用的扁平化可見節點。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub expanded: bool,
    pub icon: &'static str,
}

/// Directory tree errors.
/// 目錄樹操作錯誤。
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("no folder is open")]
    NoRoot,
    #[error("{0} is not part of the tree")]
    UnknownPath(PathBuf),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("invalid item name {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Lazily listed view of the workspace folder.
/// 延遲載入的工作區資料夾樹。
///
/// Expanded directories are tracked in insertion order so they can be persisted
/// and replayed.
/// 展開的資料夾依加入順序記錄，以便保存與重播。
pub struct DirectoryTree {
    fs: Arc<dyn FileSystem>,
    root: Option<TreeNode>,
    expanded: IndexSet<PathBuf>,
}

impl std::fmt::Debug for DirectoryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryTree")
            .field("root", &self.root.as_ref().map(|node| &node.path))
            .field("expanded", &self.expanded)
            .finish()
    }
}

impl DirectoryTree {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            root: None,
            expanded: IndexSet::new(),
        }
    }

    /// Replaces the tree with `dir` as root and expands it.
    /// 以 `dir` 作為新的根節點並展開。
    pub fn open_root(&mut self, dir: &Path) -> Result<(), TreeError> {
        if !self.fs.is_directory(dir)? {
            return Err(TreeError::NotADirectory(dir.to_path_buf()));
        }
        self.root = Some(TreeNode::directory(dir));
        self.expanded.clear();
        self.expand(dir)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_ref().map(|node| node.path.as_path())
    }

    /// Closes the folder.
    /// 關閉目前的資料夾。
    pub fn clear(&mut self) {
        self.root = None;
        self.expanded.clear();
    }

    pub fn node(&self, path: &Path) -> Option<&TreeNode> {
        self.root.as_ref().and_then(|root| find(root, path))
    }

    /// Lists `dir`, replaces its children and marks it expanded. Repeating it refreshes.
    /// 列出 `dir` 的內容、更新子節點並標記為展開；重複呼叫即為重新整理。
    pub fn expand(&mut self, dir: &Path) -> Result<(), TreeError> {
        let root = self.root.as_mut().ok_or(TreeError::NoRoot)?;
        let node = find_mut(root, dir).ok_or_else(|| TreeError::UnknownPath(dir.to_path_buf()))?;
        if !node.is_dir {
            return Err(TreeError::NotADirectory(dir.to_path_buf()));
        }

        let mut entries = self.fs.read_directory(dir)?;
        entries.sort_by(compare_entries);

        let mut cached: HashMap<PathBuf, TreeNode> = node
            .children
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(|child| (child.path.clone(), child))
            .collect();
        let children: Vec<TreeNode> = entries
            .into_iter()
            .map(|entry| match cached.remove(&entry.path) {
                // Still a directory: keep its listed subtree.
                Some(mut previous) if previous.is_dir && entry.is_dir => {
                    previous.name = entry.name;
                    previous
                }
                _ => TreeNode::from_entry(entry),
            })
            .collect();
        debug!(dir = %dir.display(), children = children.len(), "expanded directory");
        node.children = Some(children);
        node.expanded = true;

        for (gone, previous) in cached {
            if previous.is_dir {
                self.expanded.retain(|path| !path.starts_with(&gone));
            }
        }
        self.expanded.insert(dir.to_path_buf());
        Ok(())
    }

    /// Marks `dir` collapsed; listed children stay cached.
    /// 收合 `dir`，保留已載入的子節點。
    pub fn collapse(&mut self, dir: &Path) -> Result<(), TreeError> {
        let root = self.root.as_mut().ok_or(TreeError::NoRoot)?;
        let node = find_mut(root, dir).ok_or_else(|| TreeError::UnknownPath(dir.to_path_buf()))?;
        if !node.is_dir {
            return Err(TreeError::NotADirectory(dir.to_path_buf()));
        }
        node.expanded = false;
        self.expanded.shift_remove(dir);
        Ok(())
    }

    pub fn is_expanded(&self, dir: &Path) -> bool {
        self.expanded.contains(dir)
    }

    /// Expanded directories in the order they were opened.
    /// 依展開順序列出的資料夾。
    pub fn expanded_dirs(&self) -> Vec<PathBuf> {
        self.expanded.iter().cloned().collect()
    }

    /// Replays persisted expansions in order, dropping paths that no longer resolve.
    /// 依序重播保存的展開狀態，無法解析的路徑直接略過。
    ///
    /// A directory is restored even when a collapsed ancestor precedes it in `dirs`
    /// or is missing from it.
    pub fn restore_expanded(&mut self, dirs: &[PathBuf]) {
        for dir in dirs {
            let restored = self.load_ancestors(dir).and_then(|()| self.expand(dir));
            if let Err(err) = restored {
                debug!(dir = %dir.display(), %err, "dropping stale expanded directory");
            }
        }
    }

    /// Depth-first list of every visible node, root included.
    /// 深度優先列出所有可見節點（含根節點）。
    pub fn rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if let Some(root) = &self.root {
            push_rows(root, 0, &mut rows);
        }
        rows
    }

    pub fn create_file(&mut self, parent: &Path, name: &str) -> Result<PathBuf, TreeError> {
        let path = self.vacant_child(parent, name)?;
        self.fs.create_file(&path)?;
        self.refresh(parent)?;
        Ok(path)
    }

    pub fn create_folder(&mut self, parent: &Path, name: &str) -> Result<PathBuf, TreeError> {
        let path = self.vacant_child(parent, name)?;
        self.fs.create_folder(&path)?;
        self.refresh(parent)?;
        Ok(path)
    }

    /// Deletes a file or folder and forgets expansions beneath it.
    /// 刪除檔案或資料夾，並移除其下的展開記錄。
    pub fn delete_item(&mut self, path: &Path) -> Result<(), TreeError> {
        self.fs.delete_item(path)?;
        self.expanded.retain(|dir| !dir.starts_with(path));
        if let Some(parent) = path.parent() {
            self.refresh(parent)?;
        }
        Ok(())
    }

    /// Renames an item in place and returns its new path. An existing target is
    /// never replaced.
    /// 就地重新命名項目並回傳新路徑；不會覆寫既有的目標。
    pub fn rename_item(&mut self, from: &Path, new_name: &str) -> Result<PathBuf, TreeError> {
        let parent = from
            .parent()
            .ok_or_else(|| TreeError::UnknownPath(from.to_path_buf()))?;
        let to = child_path(parent, new_name)?;
        if to == from {
            return Ok(to);
        }
        if self.fs.exists(&to) {
            return Err(FsError::AlreadyExists { path: to }.into());
        }
        self.fs.rename_item(from, &to)?;
        self.expanded.retain(|dir| !dir.starts_with(from));
        self.refresh(parent)?;
        Ok(to)
    }

    fn vacant_child(&self, parent: &Path, name: &str) -> Result<PathBuf, TreeError> {
        let path = child_path(parent, name)?;
        if self.fs.exists(&path) {
            return Err(FsError::AlreadyExists { path }.into());
        }
        Ok(path)
    }

    /// Lists every unlisted directory between the root and `dir` without expanding it.
    fn load_ancestors(&mut self, dir: &Path) -> Result<(), TreeError> {
        let root = self.root().ok_or(TreeError::NoRoot)?.to_path_buf();
        if !dir.starts_with(&root) {
            return Err(TreeError::UnknownPath(dir.to_path_buf()));
        }
        let mut ancestors: Vec<PathBuf> = dir
            .ancestors()
            .skip(1)
            .take_while(|ancestor| ancestor.starts_with(&root))
            .map(Path::to_path_buf)
            .collect();
        ancestors.reverse();
        for ancestor in ancestors {
            self.load(&ancestor)?;
        }
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<(), TreeError> {
        let root = self.root.as_mut().ok_or(TreeError::NoRoot)?;
        let node = find_mut(root, dir).ok_or_else(|| TreeError::UnknownPath(dir.to_path_buf()))?;
        if !node.is_dir {
            return Err(TreeError::NotADirectory(dir.to_path_buf()));
        }
        if node.children.is_some() {
            return Ok(());
        }
        let mut entries = self.fs.read_directory(dir)?;
        entries.sort_by(compare_entries);
        node.children = Some(entries.into_iter().map(TreeNode::from_entry).collect());
        Ok(())
    }

    fn refresh(&mut self, dir: &Path) -> Result<(), TreeError> {
        let relist = match self.root.as_mut().and_then(|root| find_mut(root, dir)) {
            Some(node) if node.expanded => true,
            Some(node) => {
                node.children = None;
                false
            }
            None => false,
        };
        if relist {
            self.expand(dir)
        } else {
            Ok(())
        }
    }
}

fn child_path(parent: &Path, name: &str) -> Result<PathBuf, TreeError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(parent.join(trimmed))
}

/// Directories first, then case-insensitive name, case-sensitive on ties.
fn compare_entries(a: &DirEntry, b: &DirEntry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

fn find<'a>(node: &'a TreeNode, path: &Path) -> Option<&'a TreeNode> {
    if node.path == path {
        return Some(node);
    }
    if !path.starts_with(&node.path) {
        return None;
    }
    node.children
        .as_deref()?
        .iter()
        .find_map(|child| find(child, path))
}

fn find_mut<'a>(node: &'a mut TreeNode, path: &Path) -> Option<&'a mut TreeNode> {
    if node.path == path {
        return Some(node);
    }
    if !path.starts_with(&node.path) {
        return None;
    }
    node.children
        .as_mut()?
        .iter_mut()
        .find_map(|child| find_mut(child, path))
}

fn push_rows(node: &TreeNode, depth: usize, rows: &mut Vec<TreeRow>) {
    rows.push(TreeRow {
        depth,
        name: node.name.clone(),
        path: node.path.clone(),
        is_dir: node.is_dir,
        expanded: node.expanded,
        icon: if node.is_dir {
            FOLDER_ICON
        } else {
            catalog::icon(&node.path)
        },
    });
    if !node.expanded {
        return;
    }
    for child in node.children.iter().flatten() {
        push_rows(child, depth + 1, rows);
    }
}
