//! Media Protector - Filesystem Helpers

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ProtectorResult;

/// Write a file atomically (temp file + rename), creating parent directories
pub fn write_atomic(path: &Path, data: &[u8]) -> ProtectorResult<()> {
    ensure_parent_dir(path)?;

    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)?;

    file.write_all(data)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Create the parent directory of `path` if it is missing
pub fn ensure_parent_dir(path: &Path) -> ProtectorResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// First free name among `name.ext`, `name(1).ext`, `name(2).ext`, …
pub fn unique_destination(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (base, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name.as_str(), ""),
    };

    let mut counter = 1u32;
    loop {
        let candidate = path.with_file_name(format!("{}({}){}", base, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Delete a file whose content already lives elsewhere.
///
/// A failure is logged, not returned. Returns whether the file is gone.
pub fn remove_after_transform(path: &Path, what: &str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Could not delete {} after {}: {} ({})", path.display(), what, e, e.kind());
            false
        }
    }
}
