//! Media Protector - Directory Scan
//!
//! Lists protected containers or plain media below a root, the way a gallery
//! listing would: shallow, skipping hidden and system folders.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::classify::{classify_path, MediaKind};

/// Folder levels searched below the root
pub const MAX_SCAN_DEPTH: usize = 3;

/// Folders never descended into
const SYSTEM_FOLDERS: &[&str] = &[
    "proc", "sys", "dev", "system", "data/data", "cache", "obb", "apex", "vendor", "product", "odm",
];

/// Which files a scan is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Containers (`.mprot`)
    Protected,
    /// Recognized images and videos
    Plain,
}

impl ScanMode {
    pub fn matches(self, path: &Path) -> bool {
        let kind = classify_path(path);
        match self {
            ScanMode::Protected => kind == MediaKind::Container,
            ScanMode::Plain => kind.is_plain_media(),
        }
    }
}

/// All matching files below `root`, sorted by path
pub fn scan_media(root: &Path, mode: ScanMode) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = walk(root)
        .filter(|path| mode.matches(path))
        .collect();
    found.sort();
    log::debug!("Scan of {} found {} file(s)", root.display(), found.len());
    found
}

/// Whether anything below `dir` matches, stopping at the first hit
pub fn has_media(dir: &Path, mode: ScanMode) -> bool {
    walk(dir).any(|path| mode.matches(&path))
}

fn walk(root: &Path) -> impl Iterator<Item = PathBuf> {
    let skip_all = root.is_dir() && is_system_folder(root);

    WalkDir::new(root)
        .follow_links(false)
        .max_depth(MAX_SCAN_DEPTH + 1)
        .into_iter()
        .filter_entry(move |entry| !skip_all && !should_skip(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
}

fn should_skip(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let hidden = entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false);
    hidden || is_system_folder(entry.path())
}

fn is_system_folder(dir: &Path) -> bool {
    let path = dir.to_string_lossy().replace('\\', "/").to_lowercase();
    SYSTEM_FOLDERS
        .iter()
        .any(|folder| path.ends_with(&format!("/{}", folder)))
}
