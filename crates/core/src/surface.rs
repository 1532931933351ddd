use std::collections::HashMap;
use std::fmt;

use tracing::warn;

/// 編輯器內容的不透明代號。 / Opaque handle to a content model owned by the editor surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

/// 內容變更監聽器的代號。 / Identifier of a content-change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 游標、捲動與摺疊狀態。 / Cursor, scroll and fold position of the surface.
///
/// 對工作階段核心而言是不透明的。 / The session core only stores and hands it back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pub cursor_line: u32,
    pub cursor_column: u32,
    pub scroll_top: u32,
    pub folds: Vec<u32>,
}

/// 內容變更時呼叫的回呼。 / Callback invoked whenever a document's content changes.
pub type ChangeCallback = Box<dyn FnMut() + Send>;

/// 單一共用編輯器介面的能力。 / Capability of the single shared editor surface.
pub trait EditorSurface {
    /// 建立新的內容模型。 / Creates a content model seeded with `contents`.
    fn create_document(&mut self, contents: &str, language: &str) -> DocumentHandle;

    /// 釋放內容模型與其監聽器。 / Releases a content model and any listeners still attached to it.
    fn dispose_document(&mut self, handle: DocumentHandle);

    /// 將模型綁定至編輯器。 / Shows `handle` in the surface, resetting the view.
    fn bind(&mut self, handle: DocumentHandle);

    /// 解除綁定，顯示空白狀態。 / Detaches the current model; the surface shows its placeholder.
    fn unbind(&mut self);

    fn bound(&self) -> Option<DocumentHandle>;

    /// 擷取目前的檢視狀態。 / Captures the view state of the bound model, if any.
    fn save_view_state(&self) -> Option<ViewState>;

    fn restore_view_state(&mut self, state: &ViewState);

    /// 訂閱內容變更。 / Subscribes to content changes of `handle`.
    fn on_content_changed(&mut self, handle: DocumentHandle, callback: ChangeCallback)
        -> SubscriptionId;

    fn unsubscribe(&mut self, subscription: SubscriptionId);

    /// 取得模型目前的文字。 / Returns the current text of `handle`, `None` once disposed.
    fn value(&self, handle: DocumentHandle) -> Option<String>;
}

struct HeadlessDocument {
    text: String,
    language: String,
}

struct Subscription {
    handle: DocumentHandle,
    callback: ChangeCallback,
}

/// 無畫面的編輯器實作，供 CLI 與測試使用。 / In-memory surface used by the CLI and tests.
#[derive(Default)]
pub struct HeadlessSurface {
    next_id: u64,
    documents: HashMap<DocumentHandle, HeadlessDocument>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    bound: Option<DocumentHandle>,
    view: ViewState,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以新文字取代內容並通知監聽器。 / Replaces the text of `handle` and notifies listeners.
    pub fn set_value(&mut self, handle: DocumentHandle, text: impl Into<String>) -> bool {
        let text = text.into();
        let Some(document) = self.documents.get_mut(&handle) else {
            return false;
        };
        if document.text == text {
            return true;
        }
        document.text = text;
        self.notify(handle);
        true
    }

    /// 在位元組位置插入文字。 / Inserts `text` at byte `offset` (clamped to a char boundary).
    pub fn insert(&mut self, handle: DocumentHandle, offset: usize, text: &str) -> bool {
        let Some(document) = self.documents.get_mut(&handle) else {
            return false;
        };
        let mut at = offset.min(document.text.len());
        while !document.text.is_char_boundary(at) {
            at -= 1;
        }
        document.text.insert_str(at, text);
        self.notify(handle);
        true
    }

    /// 移動已綁定文件的游標。 / Moves the cursor of the bound document.
    pub fn move_cursor(&mut self, line: u32, column: u32) {
        self.view.cursor_line = line;
        self.view.cursor_column = column;
    }

    pub fn scroll_to(&mut self, top_line: u32) {
        self.view.scroll_top = top_line;
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn language(&self, handle: DocumentHandle) -> Option<&str> {
        self.documents
            .get(&handle)
            .map(|document| document.language.as_str())
    }

    pub fn is_alive(&self, handle: DocumentHandle) -> bool {
        self.documents.contains_key(&handle)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn notify(&mut self, handle: DocumentHandle) {
        for subscription in self
            .subscriptions
            .values_mut()
            .filter(|subscription| subscription.handle == handle)
        {
            (subscription.callback)();
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl fmt::Debug for HeadlessSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessSurface")
            .field("documents", &self.documents.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("bound", &self.bound)
            .field("view", &self.view)
            .finish()
    }
}

impl EditorSurface for HeadlessSurface {
    fn create_document(&mut self, contents: &str, language: &str) -> DocumentHandle {
        let handle = DocumentHandle(self.next_id());
        self.documents.insert(
            handle,
            HeadlessDocument {
                text: contents.to_string(),
                language: language.to_string(),
            },
        );
        handle
    }

    fn dispose_document(&mut self, handle: DocumentHandle) {
        if self.bound == Some(handle) {
            warn!(?handle, "disposing a document that is still bound");
            self.unbind();
        }
        self.subscriptions
            .retain(|_, subscription| subscription.handle != handle);
        self.documents.remove(&handle);
    }

    fn bind(&mut self, handle: DocumentHandle) {
        if !self.documents.contains_key(&handle) {
            warn!(?handle, "ignoring bind of unknown document");
            return;
        }
        self.bound = Some(handle);
        self.view = ViewState::default();
    }

    fn unbind(&mut self) {
        self.bound = None;
        self.view = ViewState::default();
    }

    fn bound(&self) -> Option<DocumentHandle> {
        self.bound
    }

    fn save_view_state(&self) -> Option<ViewState> {
        self.bound.map(|_| self.view.clone())
    }

    fn restore_view_state(&mut self, state: &ViewState) {
        if self.bound.is_some() {
            self.view = state.clone();
        }
    }

    fn on_content_changed(
        &mut self,
        handle: DocumentHandle,
        callback: ChangeCallback,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id());
        self.subscriptions
            .insert(id, Subscription { handle, callback });
        id
    }

    fn unsubscribe(&mut self, subscription: SubscriptionId) {
        self.subscriptions.remove(&subscription);
    }

    fn value(&self, handle: DocumentHandle) -> Option<String> {
        self.documents
            .get(&handle)
            .map(|document| document.text.clone())
    }
}
