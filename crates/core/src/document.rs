use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codec::TextFormat;
use crate::surface::{ChangeCallback, DocumentHandle, SubscriptionId, ViewState};

/// 已開啟文件的工作階段記錄。 / Session-side record of one open document.
///
/// 內容本身由編輯器介面持有，這裡只保留代號與比對所需的狀態。 / The text
/// lives in the editor surface; this keeps the handle plus what is needed to
/// reconcile it with the file on disk.
#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    handle: DocumentHandle,
    view_state: Option<ViewState>,
    modified: Arc<AtomicBool>,
    original_content: String,
    format: TextFormat,
    language: &'static str,
    subscriptions: Vec<SubscriptionId>,
    last_activated: u64,
}

impl Document {
    /// 以剛載入的內容建立乾淨的文件。 / Creates a clean document for freshly loaded content.
    pub fn new(
        path: impl Into<PathBuf>,
        handle: DocumentHandle,
        original_content: String,
        format: TextFormat,
        language: &'static str,
    ) -> Self {
        Self {
            path: path.into(),
            handle,
            view_state: None,
            modified: Arc::new(AtomicBool::new(false)),
            original_content,
            format,
            language,
            subscriptions: Vec::new(),
            last_activated: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 分頁顯示的標題（檔名）。 / Title shown on the tab: the file name.
    pub fn title(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn handle(&self) -> DocumentHandle {
        self.handle
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::SeqCst)
    }

    /// 產生在內容變更時標記為已修改的回呼。 / Builds a change callback that marks this document dirty.
    pub fn dirty_listener(&self) -> ChangeCallback {
        let flag = Arc::clone(&self.modified);
        Box::new(move || flag.store(true, Ordering::SeqCst))
    }

    /// 清除修改旗標，不改變原始內容。 / Clears the dirty flag without touching `original_content`.
    pub fn mark_clean(&self) {
        self.modified.store(false, Ordering::SeqCst);
    }

    /// 記錄成功儲存的內容。 / Records text that was just written to disk.
    pub fn mark_saved(&mut self, content: String) {
        self.original_content = content;
        self.mark_clean();
    }

    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    pub fn format(&self) -> TextFormat {
        self.format
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn view_state(&self) -> Option<&ViewState> {
        self.view_state.as_ref()
    }

    pub fn set_view_state(&mut self, state: Option<ViewState>) {
        self.view_state = state;
    }

    pub fn track_subscription(&mut self, subscription: SubscriptionId) {
        self.subscriptions.push(subscription);
    }

    /// 取出所有訂閱以便釋放。 / Takes every subscription so the caller can release them.
    pub fn take_subscriptions(&mut self) -> Vec<SubscriptionId> {
        std::mem::take(&mut self.subscriptions)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn last_activated(&self) -> u64 {
        self.last_activated
    }

    pub fn touch(&mut self, tick: u64) {
        self.last_activated = tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{EditorSurface, HeadlessSurface};

    fn open(surface: &mut HeadlessSurface, path: &str, text: &str) -> Document {
        let handle = surface.create_document(text, "plaintext");
        let mut document = Document::new(
            path,
            handle,
            text.to_string(),
            TextFormat::default(),
            "plaintext",
        );
        let subscription = surface.on_content_changed(handle, document.dirty_listener());
        document.track_subscription(subscription);
        document
    }

    #[test]
    fn edits_through_the_surface_mark_document_dirty() {
        let mut surface = HeadlessSurface::new();
        let document = open(&mut surface, "/tmp/a.txt", "alpha");
        assert!(!document.is_modified());

        surface.insert(document.handle(), 5, " beta");
        assert!(document.is_modified());
    }

    #[test]
    fn mark_saved_updates_baseline_and_clears_flag() {
        let mut surface = HeadlessSurface::new();
        let mut document = open(&mut surface, "/tmp/a.txt", "alpha");
        surface.set_value(document.handle(), "changed");

        document.mark_saved("changed".to_string());
        assert!(!document.is_modified());
        assert_eq!(document.original_content(), "changed");
    }

    #[test]
    fn take_subscriptions_empties_the_list() {
        let mut surface = HeadlessSurface::new();
        let mut document = open(&mut surface, "/work/notes.md", "");
        assert_eq!(document.title(), "notes.md");
        assert_eq!(document.take_subscriptions().len(), 1);
        assert_eq!(document.subscription_count(), 0);
    }
}
