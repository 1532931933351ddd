use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::serde_path;
use crate::store::{KeyValueStore, StoreError};

pub const KEY_LAST_OPENED_DIR: &str = "lastOpenedDir";
pub const KEY_LAST_OPENED_FILE: &str = "lastOpenedFile";
pub const KEY_OPENED_FILES: &str = "openedFiles";
pub const KEY_EXPANDED_DIRS: &str = "expandedDirs";
pub const KEY_SELECTED_THEME: &str = "selectedTheme";

/// Persisted shell state restored on the next launch.
/// 下次啟動時還原的工作階段狀態。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default, with = "serde_path::option")]
    pub last_opened_dir: Option<PathBuf>,
    #[serde(default, with = "serde_path::option")]
    pub last_opened_file: Option<PathBuf>,
    #[serde(default, with = "serde_path::vec")]
    pub opened_files: Vec<PathBuf>,
    #[serde(default, with = "serde_path::vec")]
    pub expanded_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub selected_theme: Option<String>,
}

impl SessionSnapshot {
    /// Returns `true` when nothing worth restoring was recorded.
    /// 若沒有任何可還原的內容則回傳 `true`。
    pub fn is_empty(&self) -> bool {
        self.last_opened_dir.is_none()
            && self.last_opened_file.is_none()
            && self.opened_files.is_empty()
            && self.expanded_dirs.is_empty()
            && self.selected_theme.is_none()
    }

    fn entries(&self) -> Vec<(String, Value)> {
        vec![
            (
                KEY_LAST_OPENED_DIR.to_string(),
                path_value(self.last_opened_dir.as_deref()),
            ),
            (
                KEY_LAST_OPENED_FILE.to_string(),
                path_value(self.last_opened_file.as_deref()),
            ),
            (
                KEY_OPENED_FILES.to_string(),
                paths_value(&self.opened_files),
            ),
            (
                KEY_EXPANDED_DIRS.to_string(),
                paths_value(&self.expanded_dirs),
            ),
            (
                KEY_SELECTED_THEME.to_string(),
                self.selected_theme
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
        ]
    }
}

/// Reads and writes [`SessionSnapshot`]s through a key/value store.
/// 透過鍵值存放區讀寫工作階段快照。
#[derive(Debug)]
pub struct SessionStore<K> {
    store: K,
}

impl<K: KeyValueStore> SessionStore<K> {
    pub fn new(store: K) -> Self {
        Self { store }
    }

    /// Loads the snapshot; `Ok(None)` on first run. Malformed fields are logged and defaulted.
    /// 載入快照；首次執行回傳 `Ok(None)`，格式錯誤的欄位記錄後改用預設值。
    pub fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let last_opened_dir = self.store.get(KEY_LAST_OPENED_DIR)?;
        let last_opened_file = self.store.get(KEY_LAST_OPENED_FILE)?;
        let opened_files = self.store.get(KEY_OPENED_FILES)?;
        let expanded_dirs = self.store.get(KEY_EXPANDED_DIRS)?;
        let selected_theme = self.store.get(KEY_SELECTED_THEME)?;

        if last_opened_dir.is_none()
            && last_opened_file.is_none()
            && opened_files.is_none()
            && expanded_dirs.is_none()
            && selected_theme.is_none()
        {
            return Ok(None);
        }

        Ok(Some(SessionSnapshot {
            last_opened_dir: field(KEY_LAST_OPENED_DIR, last_opened_dir, parse_path),
            last_opened_file: field(KEY_LAST_OPENED_FILE, last_opened_file, parse_path),
            opened_files: field(KEY_OPENED_FILES, opened_files, parse_paths),
            expanded_dirs: field(KEY_EXPANDED_DIRS, expanded_dirs, parse_paths),
            selected_theme: field(KEY_SELECTED_THEME, selected_theme, parse_theme),
        }))
    }

    /// Persists every field of `snapshot` in one batch.
    /// 以單一批次寫入快照的所有欄位。
    pub fn save(&mut self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.store.set_many(snapshot.entries())
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear()
    }
}

fn field<T: Default>(key: &str, value: Option<Value>, parse: fn(Value) -> Result<T, String>) -> T {
    let Some(value) = value else {
        return T::default();
    };
    parse(value).unwrap_or_else(|reason| {
        warn!(key, %reason, "ignoring malformed session field");
        T::default()
    })
}

fn parse_path(value: Value) -> Result<Option<PathBuf>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) if text.is_empty() => Ok(None),
        Value::String(text) => serde_path::decode(&text).map(Some),
        other => Err(format!("expected a path string, found {other}")),
    }
}

fn parse_paths(value: Value) -> Result<Vec<PathBuf>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => serde_path::decode(&text),
                other => Err(format!("expected a path string, found {other}")),
            })
            .collect(),
        other => Err(format!("expected a list of paths, found {other}")),
    }
}

fn parse_theme(value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(name) => Ok(Some(name)),
        other => Err(format!("expected a theme name, found {other}")),
    }
}

fn path_value(path: Option<&Path>) -> Value {
    path.map(|path| Value::String(serde_path::encode(path)))
        .unwrap_or(Value::Null)
}

fn paths_value(paths: &[PathBuf]) -> Value {
    Value::Array(
        paths
            .iter()
            .map(|path| Value::String(serde_path::encode(path)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> SessionSnapshot {
        SessionSnapshot {
            last_opened_dir: Some(PathBuf::from("/work")),
            last_opened_file: Some(PathBuf::from("/work/b.rs")),
            opened_files: vec![PathBuf::from("/work/a.rs"), PathBuf::from("/work/b.rs")],
            expanded_dirs: vec![PathBuf::from("/work"), PathBuf::from("/work/src")],
            selected_theme: Some("monokai".into()),
        }
    }

    #[test]
    fn first_run_loads_nothing() {
        let store = SessionStore::new(MemoryStore::new());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn snapshot_round_trips_through_store() {
        let mut store = SessionStore::new(MemoryStore::new());
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
    }

    #[test]
    fn json_file_uses_original_key_names() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("state.json");
        let mut store = SessionStore::new(JsonFileStore::new(&path));
        store.save(&sample()).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["lastOpenedFile"], json!("/work/b.rs"));
        assert_eq!(raw["openedFiles"], json!(["/work/a.rs", "/work/b.rs"]));
        assert_eq!(raw["selectedTheme"], json!("monokai"));
    }

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let mut backing = MemoryStore::new();
        backing
            .set_many(vec![
                (KEY_OPENED_FILES.into(), json!("not-a-list")),
                (KEY_EXPANDED_DIRS.into(), json!(["/work", 7])),
                (KEY_SELECTED_THEME.into(), json!("dracula")),
            ])
            .unwrap();

        let loaded = SessionStore::new(backing).load().unwrap().unwrap();
        assert!(loaded.opened_files.is_empty());
        assert!(loaded.expanded_dirs.is_empty());
        assert_eq!(loaded.selected_theme.as_deref(), Some("dracula"));
    }

    #[test]
    fn serialises_with_camel_case_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["lastOpenedDir"], json!("/work"));
        let back: SessionSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample());
    }
}
