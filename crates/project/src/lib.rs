//! Session, buffer and workspace management for the codeshell editor.
//! 管理 codeshell 的工作階段、緩衝區與工作區。

mod serde_path;

pub mod buffers;
pub mod links;
pub mod persist;
pub mod session;
pub mod store;
pub mod tree;
pub mod working_set;
pub mod workspace;

pub use buffers::{
    BufferError, BufferSession, DocumentState, RestoreReport, SaveAllError, SaveOutcome,
    SessionEvent, Tab,
};
pub use links::{link_candidates, resolve_link, LinkError, LINK_EXTENSIONS};
pub use persist::{SnapshotPersister, DEFAULT_DEBOUNCE};
pub use session::{SessionSnapshot, SessionStore};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
pub use tree::{DirectoryTree, TreeError, TreeNode, TreeRow};
pub use working_set::{EvictionPolicy, WorkingSet, MAX_OPEN};
pub use workspace::{Workspace, WorkspaceError, WorkspaceOptions, DEFAULT_THEME};
