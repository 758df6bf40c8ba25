//! Progress-callback trait for per-section generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each heading. The CLI forwards them
//! to an `indicatif` bar; a web shell could forward them to a socket.
//!
//! # Example
//!
//! ```rust
//! use pdfscribe::{GenerationConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_section_complete(&self, index: usize, total: usize, heading: &str, body_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: section {index}/{total} '{heading}' ({body_len} chars)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the generation pipeline as it processes each heading.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Indices are 1-based.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before the first completion request.
    fn on_generation_start(&self, total_sections: usize) {
        let _ = total_sections;
    }

    /// Called just before the completion request for a heading is sent.
    fn on_section_start(&self, index: usize, total: usize, heading: &str) {
        let _ = (index, total, heading);
    }

    /// Called when a section body came back.
    fn on_section_complete(&self, index: usize, total: usize, heading: &str, body_len: usize) {
        let _ = (index, total, heading, body_len);
    }

    /// Called when a section failed.
    fn on_section_error(&self, index: usize, total: usize, heading: &str, error: &str) {
        let _ = (index, total, heading, error);
    }

    /// Called once after all headings have been attempted (or the batch was abandoned).
    fn on_generation_complete(&self, total_sections: usize, success_count: usize) {
        let _ = (total_sections, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_generation_start(&self, total_sections: usize) {
            self.started_total.store(total_sections, Ordering::SeqCst);
        }

        fn on_section_start(&self, _index: usize, _total: usize, _heading: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_complete(&self, _index: usize, _total: usize, _heading: &str, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_error(&self, _index: usize, _total: usize, _heading: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_generation_complete(&self, _total_sections: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_generation_start(3);
        cb.on_section_start(1, 3, "Intro");
        cb.on_section_complete(1, 3, "Intro", 42);
        cb.on_section_error(2, 3, "Benefits", "boom");
        cb.on_generation_complete(3, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_generation_start(3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_section_start(1, 3, "Intro");
        tracker.on_section_complete(1, 3, "Intro", 100);
        tracker.on_section_start(2, 3, "Benefits");
        tracker.on_section_complete(2, 3, "Benefits", 200);
        tracker.on_section_start(3, 3, "Conclusion");
        tracker.on_section_error(3, 3, "Conclusion", "timeout");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);

        tracker.on_generation_complete(3, 2);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 2);
    }
}
