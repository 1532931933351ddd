//! Resolution of file links clicked inside an open document.
//! 解析文件內點擊的檔案連結。

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use codeshell_core::fs::FileSystem;
use thiserror::Error;

/// Extensions tried, in order, when a link names no existing file as written.
/// 連結原樣找不到檔案時依序嘗試的副檔名。
pub const LINK_EXTENSIONS: [&str; 7] = [".js", ".jsx", ".ts", ".tsx", ".json", ".html", ".css"];

/// Link resolution errors.
/// 連結解析錯誤。
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no active document to resolve {0:?} against")]
    NoActiveDocument(String),
    #[error("file not found for link {0:?}")]
    NotFound(String),
}

/// Base paths a link may point at, most specific first.
/// 連結可能指向的基準路徑，依優先順序排列。
///
/// `./` and `../` links are relative to `current_dir`, `/` links to `root`. Bare
/// links try `current_dir`, then `root`, then `root/node_modules`. Every candidate
/// is lexically normalised and duplicates are dropped.
pub fn link_candidates(link: &str, current_dir: &Path, root: Option<&Path>) -> Vec<PathBuf> {
    let link = link.trim();
    if link.is_empty() {
        return Vec::new();
    }

    let bases: Vec<PathBuf> = if link.starts_with("./") || link.starts_with("../") {
        vec![current_dir.join(link)]
    } else if let Some(rooted) = link.strip_prefix('/') {
        vec![root.unwrap_or(current_dir).join(rooted.trim_start_matches('/'))]
    } else {
        let mut bases = vec![current_dir.join(link)];
        if let Some(root) = root {
            bases.push(root.join(link));
            bases.push(root.join("node_modules").join(link));
        }
        bases
    };

    let mut candidates: Vec<PathBuf> = Vec::with_capacity(bases.len());
    for base in bases.iter().map(|base| normalize(base)) {
        if !candidates.contains(&base) {
            candidates.push(base);
        }
    }
    candidates
}

/// First existing file among `candidates`, each tried as written and then with
/// every [`LINK_EXTENSIONS`] suffix. Directories never match.
/// 在候選路徑中找出第一個存在的檔案；資料夾不列入。
pub fn resolve_link(fs: &dyn FileSystem, candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find_map(|base| {
        if is_file(fs, base) {
            return Some(base.clone());
        }
        LINK_EXTENSIONS.iter().find_map(|ext| {
            let mut name: OsString = base.as_os_str().to_owned();
            name.push(ext);
            let path = PathBuf::from(name);
            is_file(fs, &path).then_some(path)
        })
    })
}

fn is_file(fs: &dyn FileSystem, path: &Path) -> bool {
    fs.exists(path) && !matches!(fs.is_directory(path), Ok(true))
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeshell_core::LocalFileSystem;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn relative_links_resolve_against_the_current_directory() {
        let candidates = link_candidates(
            "../lib/util",
            Path::new("/work/app/src"),
            Some(Path::new("/work/app")),
        );
        assert_eq!(candidates, vec![PathBuf::from("/work/app/lib/util")]);
    }

    #[test]
    fn rooted_and_bare_links_use_the_project_root() {
        let root = Path::new("/work/app");
        let current = Path::new("/work/app/src");
        assert_eq!(
            link_candidates("/index.html", current, Some(root)),
            vec![PathBuf::from("/work/app/index.html")]
        );
        assert_eq!(
            link_candidates("react", current, Some(root)),
            vec![
                PathBuf::from("/work/app/src/react"),
                PathBuf::from("/work/app/react"),
                PathBuf::from("/work/app/node_modules/react"),
            ]
        );
        assert_eq!(
            link_candidates("react", root, Some(root)).len(),
            2,
            "duplicate bases are dropped"
        );
        assert!(link_candidates("   ", current, Some(root)).is_empty());
    }

    #[test]
    fn resolve_tries_extensions_in_order_and_skips_directories() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("widget")).unwrap();
        fs::write(tmp.path().join("widget.ts"), "").unwrap();
        fs::write(tmp.path().join("widget.css"), "").unwrap();
        let fs_cap = LocalFileSystem;

        let found = resolve_link(&fs_cap, &[tmp.path().join("widget")]).unwrap();
        assert_eq!(found, tmp.path().join("widget.ts"));
        assert_eq!(resolve_link(&fs_cap, &[tmp.path().join("absent")]), None);
    }
}
