//! Media Protector - Batch Pipeline
//!
//! Applies protect / unprotect / export across a file list on one dedicated
//! worker thread. Files are handled one at a time, in list order; every file
//! succeeds or fails on its own and the batch always runs to the end.
//!
//! Callers get a [`BatchHandle`] streaming `Progress { done, total }` after
//! every file and a final `Completed(summary)`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::classify::{classify, container_path_for, display_name, display_path_for, MediaKind};
use crate::codec::Codec;
use crate::error::{ProtectorError, ProtectorResult};
use crate::files::{ensure_parent_dir, remove_after_transform, unique_destination};
use crate::path_store::OriginalPathStore;

/// What a batch does to each file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Replace each file with its container
    Protect,
    /// Replace each container with its plaintext
    Unprotect,
    /// Write plaintext copies into `destination`, keeping the containers
    Export { destination: PathBuf },
}

impl BatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::Protect => "protect",
            BatchOperation::Unprotect => "unprotect",
            BatchOperation::Export { .. } => "export",
        }
    }
}

/// Final tally of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Event stream of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEvent {
    Progress { done: usize, total: usize },
    Completed(BatchSummary),
}

/// Receiving end of a submitted batch
#[derive(Debug)]
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
}

impl BatchHandle {
    /// Raw event channel, for callers that multiplex it with `select!`
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Block until the batch completes
    pub fn wait(self) -> ProtectorResult<BatchSummary> {
        self.wait_with(|_, _| {})
    }

    /// Block until the batch completes, reporting each progress event
    pub fn wait_with<F: FnMut(usize, usize)>(self, mut on_progress: F) -> ProtectorResult<BatchSummary> {
        for event in self.events.iter() {
            match event {
                BatchEvent::Progress { done, total } => on_progress(done, total),
                BatchEvent::Completed(summary) => return Ok(summary),
            }
        }
        // Worker dropped the batch without completing it
        Err(ProtectorError::Cancelled)
    }
}

struct BatchJob {
    operation: BatchOperation,
    files: Vec<PathBuf>,
    events: Sender<BatchEvent>,
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════

/// Single-worker batch runner. At most one batch is in flight.
pub struct BatchPipeline {
    jobs: Mutex<Option<Sender<BatchJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    busy: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl BatchPipeline {
    /// Start the worker thread
    pub fn new(
        codec: Arc<Codec>,
        store: Arc<dyn OriginalPathStore>,
        restore_to_original: bool,
    ) -> ProtectorResult<Self> {
        let (jobs, queue) = crossbeam_channel::unbounded();
        let busy = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        let worker = BatchWorker {
            codec,
            store,
            restore_to_original,
            busy: Arc::clone(&busy),
            closed: Arc::clone(&closed),
        };

        let handle = thread::Builder::new()
            .name("mprot-batch".into())
            .spawn(move || worker.run(queue))?;

        Ok(Self {
            jobs: Mutex::new(Some(jobs)),
            worker: Mutex::new(Some(handle)),
            busy,
            closed,
        })
    }

    /// Submit a batch. Fails with `BatchInProgress` while another batch runs.
    pub fn run(&self, operation: BatchOperation, files: Vec<PathBuf>) -> ProtectorResult<BatchHandle> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProtectorError::WorkerClosed);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProtectorError::BatchInProgress);
        }

        let (events, receiver) = crossbeam_channel::unbounded();
        log::info!("Queued {} of {} file(s)", operation.name(), files.len());

        let job = BatchJob {
            operation,
            files,
            events,
        };

        let sent = match self.jobs.lock().as_ref() {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        };
        if !sent {
            self.busy.store(false, Ordering::Release);
            return Err(ProtectorError::WorkerClosed);
        }

        Ok(BatchHandle { events: receiver })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting work, drop files not yet started, and wait for the
    /// file in progress to finish.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.jobs.lock().take();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::error!("Batch worker panicked");
            }
        }
    }
}

impl Drop for BatchPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// WORKER
// ═══════════════════════════════════════════════════════════════════════════

struct BatchWorker {
    codec: Arc<Codec>,
    store: Arc<dyn OriginalPathStore>,
    restore_to_original: bool,
    busy: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl BatchWorker {
    fn run(self, queue: Receiver<BatchJob>) {
        for job in queue.iter() {
            self.process(job);
        }
        log::debug!("Batch worker stopped");
    }

    fn process(&self, job: BatchJob) {
        let BatchJob {
            operation,
            files,
            events,
        } = job;

        let total = files.len();
        let mut summary = BatchSummary::default();

        if let BatchOperation::Export { destination } = &operation {
            if let Err(e) = std::fs::create_dir_all(destination) {
                log::error!("Could not create export folder {}: {}", destination.display(), e);
            }
        }

        for (index, file) in files.iter().enumerate() {
            if self.closed.load(Ordering::Acquire) {
                log::info!(
                    "Pipeline shut down; {} of {} file(s) left unprocessed",
                    total - index,
                    total
                );
                self.busy.store(false, Ordering::Release);
                return;
            }

            match self.process_one(&operation, file) {
                Ok(output) => {
                    summary.succeeded += 1;
                    log::debug!("{} {} -> {}", operation.name(), file.display(), output.display());
                }
                Err(e) => {
                    summary.failed += 1;
                    log::error!("Failed to {} {}: {}", operation.name(), file.display(), e);
                }
            }

            // The caller may have dropped its handle; keep going regardless
            let _ = events.send(BatchEvent::Progress {
                done: index + 1,
                total,
            });
        }

        log::info!(
            "Batch {} finished: {} succeeded, {} failed",
            operation.name(),
            summary.succeeded,
            summary.failed
        );

        self.busy.store(false, Ordering::Release);
        let _ = events.send(BatchEvent::Completed(summary));
    }

    fn process_one(&self, operation: &BatchOperation, file: &Path) -> ProtectorResult<PathBuf> {
        match operation {
            BatchOperation::Protect => self.protect_in_place(file),
            BatchOperation::Unprotect => self.unprotect_in_place(file),
            BatchOperation::Export { destination } => self.export_copy(file, destination),
        }
    }

    fn protect_in_place(&self, file: &Path) -> ProtectorResult<PathBuf> {
        let name = file_name(file)?;
        if classify(&name) == MediaKind::Container {
            return Err(ProtectorError::Format(format!("{} is already protected", name)));
        }

        let original = std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
        let dest = container_path_for(file);

        self.codec.protect(file, &dest)?;

        let container_name = file_name(&dest)?;
        if let Err(e) = self.store.store(&container_name, &original) {
            log::warn!("Could not record original path of {}: {}", container_name, e);
        }

        // The container is complete; a stale original is tolerated
        remove_after_transform(file, "protect");

        Ok(dest)
    }

    fn unprotect_in_place(&self, file: &Path) -> ProtectorResult<PathBuf> {
        let name = container_file_name(file)?;
        let dest = self.restore_target(file, &name)?;

        self.codec.unprotect(file, &dest)?;

        if let Err(e) = self.store.remove(&name) {
            log::warn!("Could not drop original path record of {}: {}", name, e);
        }

        remove_after_transform(file, "unprotect");

        Ok(dest)
    }

    fn export_copy(&self, file: &Path, destination: &Path) -> ProtectorResult<PathBuf> {
        let name = container_file_name(file)?;
        let dest = unique_destination(&destination.join(display_name(&name)));

        self.codec.unprotect(file, &dest)?;

        Ok(dest)
    }

    fn restore_target(&self, file: &Path, name: &str) -> ProtectorResult<PathBuf> {
        if !self.restore_to_original {
            return Ok(display_path_for(file));
        }

        match self.store.lookup(name) {
            Ok(Some(original)) => {
                ensure_parent_dir(&original)?;
                Ok(original)
            }
            Ok(None) => Ok(display_path_for(file)),
            Err(e) => {
                log::warn!("Original path lookup failed for {}: {}", name, e);
                Ok(display_path_for(file))
            }
        }
    }
}

fn file_name(path: &Path) -> ProtectorResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ProtectorError::Format(format!("{} has no usable file name", path.display())))
}

fn container_file_name(path: &Path) -> ProtectorResult<String> {
    let name = file_name(path)?;
    if classify(&name) != MediaKind::Container {
        return Err(ProtectorError::Format(format!("{} is not a protected file", name)));
    }
    if display_name(&name).is_empty() {
        return Err(ProtectorError::Format(format!("{} has no name to restore", name)));
    }
    Ok(name)
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
