use std::path::{Path, PathBuf};

use codeshell_core::Document;
use indexmap::IndexMap;

/// Default bound on simultaneously open documents.
/// 同時開啟文件數的預設上限。
pub const MAX_OPEN: usize = 10;

/// How the next eviction victim is chosen when the working set is full.
/// 工作集已滿時選擇淘汰對象的策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Oldest opened document first.
    #[default]
    InsertionOrder,
    /// Document activated longest ago first.
    LeastRecentlyActivated,
}

/// Insertion-ordered, capacity-bounded set of open documents.
/// 依開啟順序排列且有容量上限的文件集合。
#[derive(Debug)]
pub struct WorkingSet {
    documents: IndexMap<PathBuf, Document>,
    capacity: usize,
    policy: EvictionPolicy,
}

impl Default for WorkingSet {
    fn default() -> Self {
        Self::new(MAX_OPEN, EvictionPolicy::default())
    }
}

impl WorkingSet {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            documents: IndexMap::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.documents.len() >= self.capacity
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&Document> {
        self.documents.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Document> {
        self.documents.get_mut(path)
    }

    /// Appends a document at the back of the queue.
    /// 將文件加入佇列尾端。
    pub fn insert(&mut self, document: Document) {
        debug_assert!(
            !self.is_full(),
            "working set must make room before inserting"
        );
        self.documents
            .insert(document.path().to_path_buf(), document);
    }

    /// Removes a document, preserving the order of the rest.
    /// 移除文件並維持其餘文件的順序。
    pub fn remove(&mut self, path: &Path) -> Option<Document> {
        self.documents.shift_remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.documents.keys().cloned().collect()
    }

    /// Most recently opened document.
    /// 最近開啟的文件。
    pub fn last(&self) -> Option<&Document> {
        self.documents.last().map(|(_, document)| document)
    }

    /// Picks the document to evict, skipping `active` unless it is the only one.
    /// 選出要淘汰的文件；除非只剩使用中的文件，否則略過它。
    pub fn eviction_candidate(&self, active: Option<&Path>) -> Option<PathBuf> {
        let mut inactive = self
            .documents
            .values()
            .filter(|document| Some(document.path()) != active);
        let victim = match self.policy {
            EvictionPolicy::InsertionOrder => inactive.next(),
            EvictionPolicy::LeastRecentlyActivated => {
                inactive.min_by_key(|document| document.last_activated())
            }
        };
        victim
            .or_else(|| self.documents.values().next())
            .map(|document| document.path().to_path_buf())
    }
}
