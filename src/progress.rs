//! Progress-callback trait for processing events.
//!
//! Pass a `&dyn ProgressCallback` to [`crate::process_file`] (or
//! [`crate::OcrSession::process_file`]) to observe a run as it happens: the
//! CLI drives its progress bar from these events, and tests use them to
//! look at the temporary page directory while it still exists.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2md::ProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, block_count: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} blocks)", page_num, total_pages, block_count);
//!     }
//! }
//! ```

use crate::pipeline::input::InputKind;
use std::path::Path;

/// Called by the pipeline as it processes a file.
///
/// Pages are processed one at a time, so events arrive in order from a
/// single task. Implementations must still be `Send + Sync` because the
/// pipeline future may move between runtime threads. All methods have
/// no-op defaults.
pub trait ProgressCallback: Send + Sync {
    /// The input has been classified and validated.
    fn on_file_detected(&self, path: &Path, kind: InputKind) {
        let _ = (path, kind);
    }

    /// All PDF pages are saved as images in `dir`.
    fn on_pdf_rasterized(&self, dir: &Path, page_count: usize) {
        let _ = (dir, page_count);
    }

    /// Extraction of a page is about to start.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: 1 for image input
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// A page has been extracted.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: total pages
    /// * `block_count`: blocks returned for the page, including empty ones
    fn on_page_complete(&self, page_num: usize, total_pages: usize, block_count: usize) {
        let _ = (page_num, total_pages, block_count);
    }

    /// The Markdown report has been written to `path`.
    fn on_markdown_written(&self, path: &Path) {
        let _ = path;
    }

    /// A status line was added to the run's log. On failure the last line
    /// describes the error.
    fn on_status(&self, line: &str) {
        let _ = line;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        blocks: AtomicUsize,
        events: Mutex<Vec<String>>,
    }

    impl ProgressCallback for TrackingCallback {
        fn on_file_detected(&self, _path: &Path, kind: InputKind) {
            self.events.lock().unwrap().push(format!("detected {kind:?}"));
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, page_num: usize, total_pages: usize, block_count: usize) {
            self.blocks.fetch_add(block_count, Ordering::SeqCst);
            self.events
                .lock()
                .unwrap()
                .push(format!("page {page_num}/{total_pages}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_file_detected(Path::new("a.pdf"), InputKind::Pdf);
        cb.on_pdf_rasterized(Path::new("/tmp"), 3);
        cb.on_page_start(1, 3);
        cb.on_page_complete(1, 3, 7);
        cb.on_markdown_written(Path::new("output/a.md"));
        cb.on_status("File detected: a.pdf");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_file_detected(Path::new("a.pdf"), InputKind::Pdf);
        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 4);
        tracker.on_page_start(2, 2);
        tracker.on_page_complete(2, 2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.blocks.load(Ordering::SeqCst), 5);
        assert_eq!(
            *tracker.events.lock().unwrap(),
            vec!["detected Pdf", "page 1/2", "page 2/2"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_page_start(1, 10);
        cb.on_page_complete(1, 10, 0);
    }
}
