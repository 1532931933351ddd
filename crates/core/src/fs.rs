use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::warn;

use crate::codec::{self, CodecError, DecodedText, TextFormat};

/// 目錄列舉中的單一項目。 / One entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// 檔案能力可能回傳的錯誤，皆附帶路徑。 / Errors raised by the file capability, always carrying the path.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("failed to list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to inspect {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} already exists")]
    AlreadyExists { path: PathBuf },
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

impl FsError {
    /// 是否為「檔案不存在」。 / Whether the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        let source = match self {
            FsError::List { source, .. }
            | FsError::Read { source, .. }
            | FsError::Write { source, .. }
            | FsError::Metadata { source, .. }
            | FsError::Create { source, .. }
            | FsError::Delete { source, .. }
            | FsError::Rename { source, .. } => source,
            FsError::AlreadyExists { .. } | FsError::Decode { .. } | FsError::Encode { .. } => {
                return false
            }
        };
        source.kind() == ErrorKind::NotFound
    }
}

/// 工作階段核心使用的檔案系統能力。 / File-system capability consumed by the session core.
///
/// 所有操作皆回傳具型別的錯誤而非 panic。 / Every operation reports failures as a typed
/// [`FsError`]; nothing here is allowed to panic on I/O.
pub trait FileSystem: Send + Sync {
    /// 列出目錄（不遞迴）。 / Lists a directory, non-recursively and unsorted.
    fn read_directory(&self, path: &Path) -> Result<Vec<DirEntry>, FsError>;

    /// 讀取並解碼文字檔。 / Reads and decodes a text file.
    fn read_file(&self, path: &Path) -> Result<DecodedText, FsError>;

    /// 以指定格式寫入文字檔。 / Writes a text file using the given on-disk format.
    fn write_file(&self, path: &Path, text: &str, format: TextFormat) -> Result<(), FsError>;

    /// 路徑是否為目錄；不存在時回傳 `false`。 / Whether `path` is a directory; `false` when missing.
    fn is_directory(&self, path: &Path) -> Result<bool, FsError>;

    fn exists(&self, path: &Path) -> bool;

    /// 建立空檔案（必要時建立上層資料夾）。 / Creates an empty file, creating parents as needed.
    ///
    /// 目標已存在時回傳 [`FsError::AlreadyExists`]。 / Fails with [`FsError::AlreadyExists`]
    /// instead of truncating an existing file.
    fn create_file(&self, path: &Path) -> Result<(), FsError>;

    fn create_folder(&self, path: &Path) -> Result<(), FsError>;

    /// 刪除檔案或整個資料夾。 / Deletes a file or a whole directory tree.
    fn delete_item(&self, path: &Path) -> Result<(), FsError>;

    /// 目標已存在時不覆寫。 / Never replaces an existing `to`.
    fn rename_item(&self, from: &Path, to: &Path) -> Result<(), FsError>;
}

/// 以 `std::fs` 實作的本機檔案系統。 / Local file system backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn read_directory(&self, path: &Path) -> Result<Vec<DirEntry>, FsError> {
        let list_err = |source| FsError::List {
            path: path.to_path_buf(),
            source,
        };
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            let entry_path = entry.path();
            // 跟隨符號連結，與 stat 行為一致。 / Follow symlinks, like `stat`.
            let metadata = match fs::metadata(&entry_path) {
                Ok(metadata) => metadata,
                // Dangling link: list the link itself as a plain file.
                Err(err) => match entry.metadata() {
                    Ok(metadata) => {
                        warn!(path = %entry_path.display(), %err, "listing unresolvable entry as a file");
                        metadata
                    }
                    Err(source) => {
                        warn!(path = %entry_path.display(), %source, "skipping unreadable entry");
                        continue;
                    }
                },
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry_path,
                is_dir: metadata.is_dir(),
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> Result<DecodedText, FsError> {
        let bytes = fs::read(path).map_err(|source| FsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        codec::decode(&bytes).map_err(|source| FsError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_file(&self, path: &Path, text: &str, format: TextFormat) -> Result<(), FsError> {
        let encoded = codec::encode(text, format).map_err(|source| FsError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &encoded).map_err(|source| FsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(FsError::Metadata {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_file(&self, path: &Path) -> Result<(), FsError> {
        let create_err = |source| FsError::Create {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(create_err)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(FsError::AlreadyExists {
                path: path.to_path_buf(),
            }),
            Err(source) => Err(create_err(source)),
        }
    }

    fn create_folder(&self, path: &Path) -> Result<(), FsError> {
        if fs::symlink_metadata(path).is_ok() {
            return Err(FsError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        fs::create_dir_all(path).map_err(|source| FsError::Create {
            path: path.to_path_buf(),
            source,
        })
    }

    fn delete_item(&self, path: &Path) -> Result<(), FsError> {
        let delete_err = |source| FsError::Delete {
            path: path.to_path_buf(),
            source,
        };
        let metadata = fs::symlink_metadata(path).map_err(delete_err)?;
        if metadata.is_dir() {
            fs::remove_dir_all(path).map_err(delete_err)
        } else {
            fs::remove_file(path).map_err(delete_err)
        }
    }

    fn rename_item(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        if from != to && fs::symlink_metadata(to).is_ok() {
            return Err(FsError::AlreadyExists {
                path: to.to_path_buf(),
            });
        }
        fs::rename(from, to).map_err(|source| FsError::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
    }
}

/// 先寫入同目錄的暫存檔，再以 rename 取代目標檔。 / Writes `bytes` through a sibling
/// temp file and renames it into place, so readers never see a partial file.
///
/// 上層資料夾必須已存在。 / The parent directory must already exist.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = sibling_tmp(path);
    {
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(bytes)?;
        tmp_file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
