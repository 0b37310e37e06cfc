//! Media Protector - File Classification
//!
//! Stateless, suffix-based classification. Never opens the file.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Suffix appended to a file's name when it becomes a container
pub const CONTAINER_SUFFIX: &str = ".mprot";

/// Recognized still-image suffixes
const IMAGE_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"];

/// Recognized video suffixes
const VIDEO_SUFFIXES: &[&str] = &[".mp4", ".mov", ".mkv", ".webm", ".3gp"];

/// What a path looks like from its name alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Container,
    Unknown,
}

impl MediaKind {
    pub fn is_plain_media(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

/// Classify a file name
pub fn classify(name: &str) -> MediaKind {
    if ends_with_ignore_case(name, CONTAINER_SUFFIX) {
        MediaKind::Container
    } else if IMAGE_SUFFIXES.iter().any(|s| ends_with_ignore_case(name, s)) {
        MediaKind::Image
    } else if VIDEO_SUFFIXES.iter().any(|s| ends_with_ignore_case(name, s)) {
        MediaKind::Video
    } else {
        MediaKind::Unknown
    }
}

/// Classify the final component of a path
pub fn classify_path(path: &Path) -> MediaKind {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(classify)
        .unwrap_or(MediaKind::Unknown)
}

/// Kind of the media a name carries, looking through the container suffix.
///
/// `clip.mp4.mprot` is a video; a bare `clip.mp4` is too.
pub fn content_kind(name: &str) -> MediaKind {
    match classify(name) {
        MediaKind::Container => classify(display_name(name)),
        kind => kind,
    }
}

/// Name a file gets once protected
pub fn container_name(name: &str) -> String {
    format!("{}{}", name, CONTAINER_SUFFIX)
}

/// Name a container is shown (and restored) under
pub fn display_name(name: &str) -> &str {
    if ends_with_ignore_case(name, CONTAINER_SUFFIX) {
        &name[..name.len() - CONTAINER_SUFFIX.len()]
    } else {
        name
    }
}

/// Sibling path a protected copy of `path` is written to
pub fn container_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(container_name(&name))
}

/// Sibling path a container is restored to when no original path is known
pub fn display_path_for(container: &Path) -> PathBuf {
    let name = container
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    container.with_file_name(display_name(&name))
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    let split = match name.len().checked_sub(suffix.len()) {
        Some(split) => split,
        None => return false,
    };
    name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("holiday.JPG"), MediaKind::Image);
        assert_eq!(classify("scan.png"), MediaKind::Image);
        assert_eq!(classify("clip.mp4"), MediaKind::Video);
        assert_eq!(classify("clip.mp4.mprot"), MediaKind::Container);
        assert_eq!(classify("CLIP.MP4.MPROT"), MediaKind::Container);
        assert_eq!(classify("notes.txt"), MediaKind::Unknown);
        assert_eq!(classify("mprot"), MediaKind::Unknown);
        assert_eq!(classify(""), MediaKind::Unknown);
    }

    #[test]
    fn test_content_kind_looks_through_suffix() {
        assert_eq!(content_kind("clip.mp4.mprot"), MediaKind::Video);
        assert_eq!(content_kind("photo.jpeg.mprot"), MediaKind::Image);
        assert_eq!(content_kind("blob.bin.mprot"), MediaKind::Unknown);
        assert_eq!(content_kind("photo.png"), MediaKind::Image);
    }

    #[test]
    fn test_name_mapping() {
        assert_eq!(container_name("a.jpg"), "a.jpg.mprot");
        assert_eq!(display_name("a.jpg.mprot"), "a.jpg");
        assert_eq!(display_name("a.jpg"), "a.jpg");
        assert_eq!(display_name("ünïcødé.png.mprot"), "ünïcødé.png");
    }

    #[test]
    fn test_path_mapping() {
        let original = Path::new("/media/DCIM/a.jpg");
        let container = container_path_for(original);
        assert_eq!(container, Path::new("/media/DCIM/a.jpg.mprot"));
        assert_eq!(display_path_for(&container), original);
    }
}
