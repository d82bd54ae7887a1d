//! Progress-callback trait for download and extraction events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events while a PDF streams in or its pages are read. The library knows
//! nothing about terminals; the `manual-corpus` binary renders these events
//! with `indicatif`.
//!
//! # Example
//!
//! ```rust
//! use manual_corpus::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
//!
//! struct ByteCounter(AtomicU64);
//!
//! impl PipelineProgressCallback for ByteCounter {
//!     fn on_download_progress(&self, downloaded: u64) {
//!         self.0.store(downloaded, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(ByteCounter(AtomicU64::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the fetch and extract stages as they make progress.
///
/// All methods default to no-ops so implementors only override what they
/// render.
pub trait PipelineProgressCallback: Send + Sync {
    /// A download is about to stream its body.
    ///
    /// # Arguments
    /// * `label` — destination file name
    /// * `total_bytes` — `Content-Length`, when the server sent one
    fn on_download_start(&self, label: &str, total_bytes: Option<u64>) {
        let _ = (label, total_bytes);
    }

    /// Cumulative bytes written to the temporary file so far.
    fn on_download_progress(&self, downloaded: u64) {
        let _ = downloaded;
    }

    /// The temporary file was renamed onto the destination.
    fn on_download_complete(&self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Extraction is starting on a PDF with `total_pages` pages.
    fn on_extract_start(&self, label: &str, total_pages: usize) {
        let _ = (label, total_pages);
    }

    /// One page was read from the PDF (1-indexed). `chars` counts the raw
    /// text layer, before cleanup.
    fn on_page_extracted(&self, page_num: usize, total_pages: usize, chars: usize) {
        let _ = (page_num, total_pages, chars);
    }

    /// Every page has been cleaned; `extracted_pages` kept some text.
    fn on_extract_complete(&self, total_pages: usize, extracted_pages: usize) {
        let _ = (total_pages, extracted_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
