//! Media Protector - Preview Cache
//!
//! Bounded LRU of decoded previews, filled by a fixed pool of decode workers.
//! A request is answered synchronously on a cache hit; otherwise the decode is
//! queued and its result is delivered to the requesting [`DisplaySlot`] only
//! if the slot still shows the same file.

mod decode;
mod slot;

pub use decode::{downsample, FrameExtractor, MediaDecoder, NoFrameExtractor, PreviewDecoder};
pub use slot::DisplaySlot;

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use image::{DynamicImage, GenericImageView};
use lru::LruCache;
use parking_lot::Mutex;

use crate::config::ProtectorConfig;
use crate::error::{ProtectorError, ProtectorResult};

/// A decoded, downsampled preview
#[derive(Debug)]
pub struct Preview {
    path: PathBuf,
    image: DynamicImage,
    cost: usize,
}

impl Preview {
    pub fn new(path: PathBuf, image: DynamicImage) -> Self {
        let cost = image.as_bytes().len();
        Self { path, image, cost }
    }

    /// File the preview was decoded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Approximate memory held by the pixels
    pub fn cost(&self) -> usize {
        self.cost
    }
}

/// Outcome of [`PreviewCache::request`]
#[derive(Debug, Clone)]
pub enum PreviewRequest {
    /// Cached; already delivered to the slot
    Ready(Arc<Preview>),
    /// Decode queued; the slot keeps its placeholder for now
    Pending,
}

impl PreviewRequest {
    pub fn is_ready(&self) -> bool {
        matches!(self, PreviewRequest::Ready(_))
    }
}

struct DecodeJob {
    path: PathBuf,
    is_protected: bool,
    slot: Arc<DisplaySlot>,
}

struct Shared {
    entries: Mutex<LruCache<PathBuf, Arc<Preview>>>,
    decoder: Arc<dyn PreviewDecoder>,
    closed: AtomicBool,
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

pub struct PreviewCache {
    shared: Arc<Shared>,
    jobs: Mutex<Option<Sender<DecodeJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PreviewCache {
    /// Start `config.preview_workers` decode threads
    pub fn new(config: &ProtectorConfig, decoder: Arc<dyn PreviewDecoder>) -> ProtectorResult<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.preview_cache_capacity)
            .ok_or_else(|| ProtectorError::Config("preview cache capacity is zero".into()))?;

        let shared = Arc::new(Shared {
            entries: Mutex::new(LruCache::new(capacity)),
            decoder,
            closed: AtomicBool::new(false),
        });

        let (jobs, queue) = crossbeam_channel::unbounded();
        let mut workers = Vec::with_capacity(config.preview_workers);
        for index in 0..config.preview_workers {
            let shared = Arc::clone(&shared);
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("mprot-preview-{}", index))
                .spawn(move || decode_loop(&shared, queue))?;
            workers.push(handle);
        }

        log::debug!(
            "Preview cache ready: {} worker(s), {} entries",
            config.preview_workers,
            capacity
        );

        Ok(Self {
            shared,
            jobs: Mutex::new(Some(jobs)),
            workers: Mutex::new(workers),
        })
    }

    /// Show the preview of `path` in `slot`, decoding in the background on a miss
    pub fn request(&self, path: &Path, is_protected: bool, slot: &Arc<DisplaySlot>) -> PreviewRequest {
        let path = cache_key(path);
        let path = path.as_path();
        slot.bind(path);

        if let Some(preview) = self.get(path) {
            slot.deliver(path, Arc::clone(&preview));
            return PreviewRequest::Ready(preview);
        }

        let job = DecodeJob {
            path: path.to_path_buf(),
            is_protected,
            slot: Arc::clone(slot),
        };
        let queued = match self.jobs.lock().as_ref() {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        };
        if !queued {
            log::debug!("Preview cache closed; {} keeps its placeholder", path.display());
        }

        PreviewRequest::Pending
    }

    /// Cached preview for `path`, marking it recently used
    pub fn get(&self, path: &Path) -> Option<Arc<Preview>> {
        self.shared.entries.lock().get(&cache_key(path)).cloned()
    }

    /// Whether `path` is cached, without touching its recency
    pub fn contains(&self, path: &Path) -> bool {
        self.shared.entries.lock().contains(&cache_key(path))
    }

    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summed pixel cost of every cached preview
    pub fn memory_cost(&self) -> usize {
        self.shared.entries.lock().iter().map(|(_, p)| p.cost()).sum()
    }

    /// Drop every cached preview
    pub fn clear(&self) {
        let mut entries = self.shared.entries.lock();
        log::debug!("Flushing {} cached preview(s)", entries.len());
        entries.clear();
    }

    /// Skip queued decodes and wait for the ones in progress
    pub fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.jobs.lock().take();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                log::error!("Preview worker panicked");
            }
        }
    }
}

impl Drop for PreviewCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// WORKER
// ═══════════════════════════════════════════════════════════════════════════

fn decode_loop(shared: &Shared, queue: Receiver<DecodeJob>) {
    for job in queue.iter() {
        if shared.closed.load(Ordering::Acquire) {
            continue;
        }
        // Slot already shows another file
        if job.slot.bound_path().as_deref() != Some(job.path.as_path()) {
            continue;
        }

        let cached = shared.entries.lock().get(&job.path).cloned();
        let preview = match cached {
            Some(preview) => preview,
            None => match decode_guarded(shared, &job) {
                Ok(image) => {
                    let preview = Arc::new(Preview::new(job.path.clone(), image));
                    shared
                        .entries
                        .lock()
                        .put(job.path.clone(), Arc::clone(&preview));
                    preview
                }
                Err(e) => {
                    log::debug!("No preview for {}: {}", job.path.display(), e);
                    continue;
                }
            },
        };

        if !job.slot.deliver(&job.path, preview) {
            log::debug!("Dropped stale preview of {}", job.path.display());
        }
    }
}

/// Run the decoder, turning a panic into an ordinary decode failure so the
/// worker survives it
fn decode_guarded(shared: &Shared, job: &DecodeJob) -> ProtectorResult<DynamicImage> {
    panic::catch_unwind(AssertUnwindSafe(|| shared.decoder.decode(&job.path, job.is_protected)))
        .unwrap_or_else(|_| Err(ProtectorError::PreviewFailed("decoder panicked".into())))
}

/// Entries and slots are keyed by absolute path
fn cache_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
