use codeshell_core::fs::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::theme::{ThemeCatalog, DEFAULT_THEME};

const PREFERENCES_VERSION: u32 = 1;

/// 同時開啟文件數的允許範圍。 / Allowed range for the open-document limit.
pub const MAX_OPEN_RANGE: (usize, usize) = (1, 64);

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 工作區偏好設定。 / Workspace preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub session: SessionPreferences,
    #[serde(default)]
    pub ui: UiPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            session: SessionPreferences::default(),
            ui: UiPreferences::default(),
        }
    }
}

impl Preferences {
    /// 將超出範圍或未知的值修正為預設值。 / Replaces out-of-range or unknown values.
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.session.sanitize();
        self.ui.sanitize();
    }
}

/// 工作集淘汰策略。 / Working-set eviction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionMode {
    #[default]
    Insertion,
    Lru,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPreferences {
    #[serde(default = "default_max_open")]
    pub max_open_documents: usize,
    #[serde(default)]
    pub eviction: EvictionMode,
    #[serde(default = "default_debounce_ms")]
    pub persist_debounce_ms: u64,
}

fn default_max_open() -> usize {
    10
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for SessionPreferences {
    fn default() -> Self {
        Self {
            max_open_documents: default_max_open(),
            eviction: EvictionMode::default(),
            persist_debounce_ms: default_debounce_ms(),
        }
    }
}

impl SessionPreferences {
    fn sanitize(&mut self) {
        if self.max_open_documents == 0 {
            self.max_open_documents = default_max_open();
        }
        self.max_open_documents = self
            .max_open_documents
            .clamp(MAX_OPEN_RANGE.0, MAX_OPEN_RANGE.1);
        self.persist_debounce_ms = self.persist_debounce_ms.clamp(10, 60_000);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPreferences {
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

impl UiPreferences {
    fn sanitize(&mut self) {
        let catalog = ThemeCatalog::builtin();
        match catalog.find(&self.theme) {
            Some(theme) => self.theme = theme.id.to_string(),
            None => {
                if !self.theme.trim().is_empty() {
                    warn!(theme = %self.theme, "unknown theme in preferences, using default");
                }
                self.theme = default_theme();
            }
        }
    }
}

/// 以 JSON 檔案保存的偏好設定。 / Preferences persisted as a JSON file.
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        let mut data = preferences;
        data.sanitize();
        Self {
            path: path.into(),
            data,
        }
    }

    /// 載入設定；檔案不存在時使用預設值。 / Loads preferences, using defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self::new(path, Preferences::default()));
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let data: Preferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        Ok(Self::new(path, data))
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn update<F>(&mut self, op: F) -> Result<(), PreferencesError>
    where
        F: FnOnce(&mut Preferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            PreferencesError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;

        write_atomic(&self.path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
