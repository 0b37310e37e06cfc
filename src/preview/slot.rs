//! Display slots: reusable preview targets whose bound file can change while
//! an older decode is still in flight.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::Preview;

#[derive(Default)]
struct SlotState {
    bound: Option<PathBuf>,
    preview: Option<Arc<Preview>>,
}

/// A placeholder that shows the preview of whichever file it is bound to
#[derive(Default)]
pub struct DisplaySlot {
    state: Mutex<SlotState>,
    delivered: Condvar,
}

impl DisplaySlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Point the slot at `path` and drop back to the placeholder
    pub fn bind(&self, path: &Path) {
        let mut state = self.state.lock();
        if state.bound.as_deref() != Some(path) {
            state.preview = None;
        }
        state.bound = Some(path.to_path_buf());
    }

    /// Detach the slot from any file
    pub fn unbind(&self) {
        let mut state = self.state.lock();
        state.bound = None;
        state.preview = None;
    }

    pub fn bound_path(&self) -> Option<PathBuf> {
        self.state.lock().bound.clone()
    }

    /// Current preview, `None` while the placeholder is showing
    pub fn preview(&self) -> Option<Arc<Preview>> {
        self.state.lock().preview.clone()
    }

    /// Show `preview` if the slot is still bound to `path`.
    ///
    /// Returns false when the slot has moved on and the result was dropped.
    pub fn deliver(&self, path: &Path, preview: Arc<Preview>) -> bool {
        let mut state = self.state.lock();
        if state.bound.as_deref() != Some(path) {
            return false;
        }
        state.preview = Some(preview);
        self.delivered.notify_all();
        true
    }

    /// Block until a preview is showing or `timeout` elapses
    pub fn wait_for_preview(&self, timeout: Duration) -> Option<Arc<Preview>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.preview.is_none() {
            if self.delivered.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.preview.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn preview_of(path: &str) -> Arc<Preview> {
        Arc::new(Preview::new(PathBuf::from(path), DynamicImage::new_rgb8(2, 2)))
    }

    #[test]
    fn test_deliver_requires_same_path() {
        let slot = DisplaySlot::new();
        slot.bind(Path::new("/a.jpg"));

        assert!(!slot.deliver(Path::new("/b.jpg"), preview_of("/b.jpg")));
        assert!(slot.preview().is_none());

        assert!(slot.deliver(Path::new("/a.jpg"), preview_of("/a.jpg")));
        assert_eq!(slot.preview().unwrap().path(), Path::new("/a.jpg"));
    }

    #[test]
    fn test_rebind_resets_placeholder() {
        let slot = DisplaySlot::new();
        slot.bind(Path::new("/a.jpg"));
        slot.deliver(Path::new("/a.jpg"), preview_of("/a.jpg"));

        // Same file keeps its preview
        slot.bind(Path::new("/a.jpg"));
        assert!(slot.preview().is_some());

        slot.bind(Path::new("/b.jpg"));
        assert!(slot.preview().is_none());

        slot.unbind();
        assert!(slot.bound_path().is_none());
        assert!(!slot.deliver(Path::new("/b.jpg"), preview_of("/b.jpg")));
    }

    #[test]
    fn test_wait_times_out_on_placeholder() {
        let slot = DisplaySlot::new();
        slot.bind(Path::new("/a.jpg"));
        assert!(slot.wait_for_preview(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_wait_wakes_on_delivery() {
        let slot = DisplaySlot::new();
        slot.bind(Path::new("/a.jpg"));

        let deliverer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                slot.deliver(Path::new("/a.jpg"), preview_of("/a.jpg"));
            })
        };

        assert!(slot.wait_for_preview(Duration::from_secs(10)).is_some());
        deliverer.join().unwrap();
    }
}
