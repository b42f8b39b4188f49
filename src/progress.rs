//! Progress-callback trait for per-image batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::UploaderConfigBuilder::progress_callback`] to receive
//! events while a download or upload batch runs.
//!
//! # Example
//!
//! ```rust
//! use image_autoupload::{BatchProgressCallback, UploaderConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, index: usize, total: usize, target: &str) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} → {}", index + 1, total, target);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     done: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = UploaderConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch operations as they process each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Downloads fetch concurrently, so `on_image_start`
/// may fire for several images before any of them completes.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any image is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when work on an image begins.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the image in the batch
    /// * `total`: batch size
    /// * `source`: image path or URL as written in the note
    fn on_image_start(&self, index: usize, total: usize, source: &str) {
        let _ = (index, total, source);
    }

    /// Called when an image has been uploaded or stored.
    ///
    /// `target` is the new URL or note-relative path.
    fn on_image_complete(&self, index: usize, total: usize, target: &str) {
        let _ = (index, total, target);
    }

    /// Called when an image fails; the batch continues.
    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every image has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::UploaderConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
