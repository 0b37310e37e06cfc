//! Media Protector - Unified Public API
//!
//! Single entry point wiring the codec, the original-path table, the batch
//! pipeline and the preview cache from one [`ProtectorConfig`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::classify::{classify_path, content_kind, MediaKind};
use crate::codec::{read_container_nonce, Codec};
use crate::config::ProtectorConfig;
use crate::crypto::{ContainerKey, NONCE_LEN};
use crate::error::{ProtectorError, ProtectorResult};
use crate::path_store::{JsonPathStore, MemoryPathStore, OriginalPathStore};
use crate::pipeline::{BatchHandle, BatchOperation, BatchPipeline};
use crate::preview::{DisplaySlot, FrameExtractor, MediaDecoder, PreviewCache, PreviewDecoder, PreviewRequest};
use crate::reader::{open_media_source, MediaReader, MediaSource};
use crate::scan::{has_media, scan_media, ScanMode};

// ═══════════════════════════════════════════════════════════════════════════════
// MEDIA PROTECTOR API
// ═══════════════════════════════════════════════════════════════════════════════

/// Media Protector API
///
/// # Example
///
/// ```rust,ignore
/// use media_protector::api::MediaProtector;
///
/// let protector = MediaProtector::new()?;
///
/// // Hide everything under a folder
/// let photos = protector.list_plain("/sdcard/DCIM");
/// let summary = protector.protect_files(photos)?.wait()?;
/// println!("{} hidden, {} failed", summary.succeeded, summary.failed);
///
/// // Stream a protected video without unprotecting it
/// let mut source = protector.open_source("/sdcard/DCIM/clip.mp4.mprot")?;
/// ```
pub struct MediaProtector {
    config: ProtectorConfig,
    codec: Arc<Codec>,
    store: Arc<dyn OriginalPathStore>,
    pipeline: BatchPipeline,
    previews: PreviewCache,
}

impl MediaProtector {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Protector with default settings and the built-in key
    pub fn new() -> ProtectorResult<Self> {
        Self::from_config(ProtectorConfig::default())
    }

    pub fn from_config(config: ProtectorConfig) -> ProtectorResult<Self> {
        Self::build(config, None)
    }

    /// Like [`from_config`](Self::from_config), with a platform video frame extractor
    pub fn with_frame_extractor(
        config: ProtectorConfig,
        frames: Arc<dyn FrameExtractor>,
    ) -> ProtectorResult<Self> {
        Self::build(config, Some(frames))
    }

    fn build(config: ProtectorConfig, frames: Option<Arc<dyn FrameExtractor>>) -> ProtectorResult<Self> {
        config.validate()?;

        let key = match &config.key_passphrase {
            Some(passphrase) => {
                log::warn!("Using a passphrase-derived key; containers from the built-in key will not open");
                ContainerKey::from_passphrase(passphrase)?
            }
            None => ContainerKey::builtin(),
        };
        let codec = Arc::new(Codec::new(key));

        let store: Arc<dyn OriginalPathStore> = match &config.path_store {
            Some(path) => Arc::new(JsonPathStore::open(path)?),
            None => Arc::new(MemoryPathStore::new()),
        };

        let mut decoder = MediaDecoder::new(
            Arc::clone(&codec),
            config.preview_sample_factor,
            config.preview_max_decode_bytes,
        );
        if let Some(frames) = frames {
            decoder = decoder.with_frame_extractor(frames);
        }
        let decoder: Arc<dyn PreviewDecoder> = Arc::new(decoder);

        let pipeline = BatchPipeline::new(
            Arc::clone(&codec),
            Arc::clone(&store),
            config.restore_to_original,
        )?;
        let previews = PreviewCache::new(&config, decoder)?;

        log::info!("Media protector ready");

        Ok(Self {
            config,
            codec,
            store,
            pipeline,
            previews,
        })
    }

    pub fn config(&self) -> &ProtectorConfig {
        &self.config
    }

    pub fn codec(&self) -> &Arc<Codec> {
        &self.codec
    }

    pub fn path_store(&self) -> &Arc<dyn OriginalPathStore> {
        &self.store
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BATCH OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace each file with its container
    pub fn protect_files(&self, files: Vec<PathBuf>) -> ProtectorResult<BatchHandle> {
        self.pipeline.run(BatchOperation::Protect, files)
    }

    /// Replace each container with its plaintext
    pub fn unprotect_files(&self, files: Vec<PathBuf>) -> ProtectorResult<BatchHandle> {
        self.pipeline.run(BatchOperation::Unprotect, files)
    }

    /// Write plaintext copies of containers into `destination`
    pub fn export_files<P: AsRef<Path>>(&self, files: Vec<PathBuf>, destination: P) -> ProtectorResult<BatchHandle> {
        self.pipeline.run(
            BatchOperation::Export {
                destination: destination.as_ref().to_path_buf(),
            },
            files,
        )
    }

    pub fn is_busy(&self) -> bool {
        self.pipeline.is_busy()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LISTING
    // ═══════════════════════════════════════════════════════════════════════

    pub fn list_protected<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        scan_media(root.as_ref(), ScanMode::Protected)
    }

    pub fn list_plain<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        scan_media(root.as_ref(), ScanMode::Plain)
    }

    pub fn folder_has_media<P: AsRef<Path>>(&self, dir: P, mode: ScanMode) -> bool {
        has_media(dir.as_ref(), mode)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // READING
    // ═══════════════════════════════════════════════════════════════════════

    pub fn open_reader<P: AsRef<Path>>(&self, path: P) -> ProtectorResult<MediaReader> {
        self.codec.open_reader(path)
    }

    /// Random-access source for any file; containers are decrypted on the fly
    pub fn open_source<P: AsRef<Path>>(&self, path: P) -> ProtectorResult<Box<dyn MediaSource>> {
        let protected = classify_path(path.as_ref()) == MediaKind::Container;
        open_media_source(path, protected, self.codec.key())
    }

    /// Nonce, sizes and media kind of a container
    pub fn inspect<P: AsRef<Path>>(&self, path: P) -> ProtectorResult<ContainerInfo> {
        let path = path.as_ref();
        let nonce = read_container_nonce(path)?;
        let container_size = fs::metadata(path)?.len();
        let kind = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(content_kind)
            .unwrap_or(MediaKind::Unknown);

        Ok(ContainerInfo {
            path: path.to_path_buf(),
            nonce: hex::encode(nonce),
            container_size,
            logical_size: logical_size(path, container_size)?,
            kind,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PREVIEWS
    // ═══════════════════════════════════════════════════════════════════════

    /// Show a preview of `path` in `slot`; containers are detected by name
    pub fn request_preview<P: AsRef<Path>>(&self, path: P, slot: &Arc<DisplaySlot>) -> PreviewRequest {
        let path = path.as_ref();
        let protected = classify_path(path) == MediaKind::Container;
        self.previews.request(path, protected, slot)
    }

    pub fn previews(&self) -> &PreviewCache {
        &self.previews
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Stop both worker pools; unstarted work is dropped
    pub fn shutdown(&self) {
        self.pipeline.shutdown();
        self.previews.shutdown();
        log::info!("Media protector shut down");
    }
}

/// Container length minus the nonce; the file may have shrunk since its nonce was read
fn logical_size(path: &Path, container_size: u64) -> ProtectorResult<u64> {
    container_size.checked_sub(NONCE_LEN as u64).ok_or_else(|| {
        ProtectorError::Format(format!(
            "{} is too short to be a container ({} bytes)",
            path.display(),
            container_size
        ))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPORTING TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// What `inspect` reports about a container
#[derive(Debug, Clone, Serialize)]
pub struct ContainerInfo {
    pub path: PathBuf,
    /// Nonce, hex encoded
    pub nonce: String,
    pub container_size: u64,
    pub logical_size: u64,
    pub kind: MediaKind,
}
