//! Progress-callback trait for per-slide pipeline events.
//!
//! Attach an [`Arc<dyn ConversionProgressCallback>`] with
//! [`crate::service::SlideService::with_progress`] to receive events as a deck
//! moves through conversion and storage. The CLI uses it to drive a progress
//! bar; the HTTP server runs with the no-op default.
//!
//! # Example
//!
//! ```rust
//! use slide_relay::ConversionProgressCallback;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stored: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_slide_stored(&self, slide: usize, total_slides: usize, url: &str) {
//!         self.stored.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{} → {}", slide, total_slides, url);
//!     }
//! }
//!
//! let cb: Arc<dyn ConversionProgressCallback> = Arc::new(CountingCallback {
//!     stored: Arc::new(AtomicUsize::new(0)),
//! });
//! cb.on_slide_stored(1, 3, "http://localhost:5000/files/a/slide_a_1.jpg");
//! ```

use std::sync::Arc;

/// Called by [`crate::service::SlideService`] as it processes one upload.
///
/// Slides are stored concurrently, so `on_slide_stored` and `on_slide_error`
/// may be called from different tasks and in any order. All methods have
/// no-op defaults.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the PDF is stored and the slide count is known.
    ///
    /// # Arguments
    /// * `total_slides`: slides produced by the rasteriser plus slides it skipped
    fn on_conversion_start(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called when a slide image has been written to storage.
    ///
    /// # Arguments
    /// * `slide`       : 1-indexed slide number
    /// * `total_slides`: total slides in the deck
    /// * `url`         : public URL of the stored image
    fn on_slide_stored(&self, slide: usize, total_slides: usize, url: &str) {
        let _ = (slide, total_slides, url);
    }

    /// Called when a slide failed to render, download or store.
    fn on_slide_error(&self, slide: usize, total_slides: usize, error: &str) {
        let _ = (slide, total_slides, error);
    }

    /// Called once after every slide has been attempted.
    ///
    /// # Arguments
    /// * `total_slides`: total slides in the deck
    /// * `stored`      : slides that made it to storage
    fn on_conversion_complete(&self, total_slides: usize, stored: usize) {
        let _ = (total_slides, stored);
    }
}

/// Default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Shared handle held by the service.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        stored: AtomicUsize,
        errors: AtomicUsize,
        completed: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_slides: usize) {
            self.total.store(total_slides, Ordering::SeqCst);
        }

        fn on_slide_stored(&self, _slide: usize, _total: usize, _url: &str) {
            self.stored.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_error(&self, _slide: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total: usize, stored: usize) {
            self.completed.store(stored, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_slide_stored(1, 5, "http://x/1.jpg");
        cb.on_slide_error(2, 5, "render failed");
        cb.on_conversion_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_conversion_start(3);
        cb.on_slide_stored(1, 3, "u1");
        cb.on_slide_stored(2, 3, "u2");
        cb.on_slide_error(3, 3, "S3 timeout");
        cb.on_conversion_complete(3, 2);

        assert_eq!(tracker.total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.stored.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed.load(Ordering::SeqCst), 2);
    }
}
