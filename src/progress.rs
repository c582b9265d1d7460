//! Progress-callback trait for per-frame scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive events
//! as the scanner walks the frames of a document.
//!
//! # Example
//!
//! ```rust
//! use qrscan::{ScanConfig, ScanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     scanned: Arc<AtomicUsize>,
//! }
//!
//! impl ScanProgressCallback for CountingCallback {
//!     fn on_frame_scanned(&self, page_num: usize, total_frames: usize, found: bool) {
//!         self.scanned.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("frame {}/{} found={}", page_num, total_frames, found);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     scanned: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the scanner as it processes each frame.
///
/// The scan loop runs on a blocking worker thread, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once, after the source is opened and before the first frame.
    ///
    /// # Arguments
    /// * `total_frames` — frames the source will produce at most
    fn on_scan_start(&self, total_frames: usize) {
        let _ = total_frames;
    }

    /// Called once a frame has been produced (rendered, for documents) and
    /// just before it is decoded.
    ///
    /// # Arguments
    /// * `page_num`     — 1-indexed page number
    /// * `total_frames` — frames in the sequence
    fn on_frame_start(&self, page_num: usize, total_frames: usize) {
        let _ = (page_num, total_frames);
    }

    /// Called after a frame has been run through the decoder.
    fn on_frame_scanned(&self, page_num: usize, total_frames: usize, found: bool) {
        let _ = (page_num, total_frames, found);
    }

    /// Called when a frame could not be rendered.
    fn on_frame_error(&self, page_num: usize, total_frames: usize, error: &str) {
        let _ = (page_num, total_frames, error);
    }

    /// Called once when the scan stops, whether by match, exhaustion or failure.
    ///
    /// # Arguments
    /// * `frames_scanned` — frames handed to the decoder
    /// * `found`          — whether a symbol was decoded
    fn on_scan_complete(&self, frames_scanned: usize, found: bool) {
        let _ = (frames_scanned, found);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;
