//! Progress-callback trait for extraction and batch events.
//!
//! Inject an [`Arc<dyn OperationProgress>`] via
//! [`crate::config::ConfigBuilder::progress`] to receive real-time events as
//! documents move through the pipeline.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a database record, or a
//! terminal progress bar without the library knowing anything about how the
//! host application communicates. The trait is `Send + Sync` because batch
//! runs fire events from concurrent worker tasks.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfops::{Config, OperationProgress};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: Arc<AtomicUsize>,
//! }
//!
//! impl OperationProgress for CountingCallback {
//!     fn on_document_finished(&self, path: &Path, partial: bool) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} done (partial: {partial})", path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     finished: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = Config::builder()
//!     .progress(counter as Arc<dyn OperationProgress>)
//!     .build()
//!     .unwrap();
//! ```

use crate::backend::BackendKind;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as documents are extracted and batches advance.
///
/// Implementations must be `Send + Sync`; batch workers fire these
/// concurrently, so shared mutable state needs its own synchronisation.
/// All methods have default no-op implementations so callers only override
/// what they care about. Callbacks run synchronously inside worker tasks and
/// must return quickly.
pub trait OperationProgress: Send + Sync {
    /// Called when a document enters the extraction pipeline.
    fn on_document_started(&self, path: &Path) {
        let _ = path;
    }

    /// Called after each backend attempt. `outcome` is a stable label:
    /// `"accepted"`, `"below-threshold"`, or `"open-failed"`.
    fn on_backend_attempt(&self, backend: BackendKind, outcome: &str) {
        let _ = (backend, outcome);
    }

    /// Called once per document when the final page assembly is ready.
    ///
    /// # Arguments
    /// * `passing`: pages whose quality score cleared the configured floor
    /// * `total`: pages in the assembled result
    fn on_pages_ready(&self, passing: usize, total: usize) {
        let _ = (passing, total);
    }

    /// Called when a document's result is assembled, partial or not.
    fn on_document_finished(&self, path: &Path, partial: bool) {
        let _ = (path, partial);
    }

    /// Called once before a batch run starts processing.
    fn on_batch_started(&self, total: usize) {
        let _ = total;
    }

    /// Called as each batch document completes, success or failure.
    ///
    /// # Arguments
    /// * `done`: documents finished so far, including this one
    /// * `total`: documents in the batch
    fn on_batch_item(&self, done: usize, total: usize, path: &Path) {
        let _ = (done, total, path);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl OperationProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::Config`].
pub type SharedProgress = Arc<dyn OperationProgress>;
