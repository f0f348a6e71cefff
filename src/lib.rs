//! # edgequake-pdfops
//!
//! Extract text from PDFs with quality scoring, and split, merge, convert and
//! inspect them without ever corrupting a file.
//!
//! ## Why this crate?
//!
//! No single PDF text extractor survives contact with real documents. One
//! chokes on an exotic font encoding, another silently returns replacement
//! characters, a third needs a system binary that may not be installed.
//! Instead of betting on one, this crate runs a cascade of backends, scores
//! every page each of them produces, and keeps the best text per page. Partial
//! text is a result with a warning, never an error. On the write side, every
//! mutation goes through an integrity guard: fresh targets only by default,
//! backups before any replacement, temp-file-and-rename commits so a crash
//! can never leave a half-written PDF behind.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve path, sniff %PDF magic, hash content
//!  ├─ 2. Backends   pdf-extract → lopdf → pdftotext (CPU-bound, spawn_blocking)
//!  ├─ 3. Score      per-page heuristics: replacement chars, gibberish, symbols
//!  ├─ 4. Merge      best page text across attempts, early exit at 0.7 aggregate
//!  ├─ 5. Structure  heading and paragraph hints for Markdown
//!  └─ 6. Output     text / markdown / json, guarded atomic writes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfops::extract;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = extract("document.pdf").await?;
//!     println!("{}", result.text());
//!     eprintln!("quality: {:.2} over {} pages ({} partial)",
//!         result.aggregate_quality,
//!         result.pages.len(),
//!         if result.partial { "yes" } else { "no" });
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfops` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdfops = { version = "0.3", default-features = false }
//! ```
//!
//! ## Choosing a Backend
//!
//! | Backend | Requires | Best at |
//! |---------|----------|---------|
//! | `pdf-extract` | nothing (pure Rust) | embedded fonts, ToUnicode CMaps |
//! | `lopdf`       | nothing (pure Rust) | speed, damaged files, metadata |
//! | `pdftotext`   | poppler-utils installed | multi-column layout fidelity |
//!
//! The default order is exactly that cascade; pass a preference to
//! [`extract_preferring`] to promote one to the front for a single call.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod guard;
pub mod input;
pub mod ops;
pub mod progress;
pub mod render;
pub mod score;
pub mod structure;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendKind, ExtractionBackend};
pub use batch::{batch_stream, run_batch, BatchOutcome, BatchRequest, DocumentReport};
pub use config::{Config, ConfigBuilder, PageSelection, PageSeparator};
pub use error::{PageError, PdfOpsError};
pub use extract::{
    extract, extract_preferring, extract_with_config, AttemptOutcome, AttemptReport,
    DocumentMetadata, ExtractionResult, Page,
};
pub use guard::{ConfirmationProvider, IntegrityGuard, IntegrityRecord, WriteAuthorization};
pub use ops::{
    convert, extract_pages, info, merge, search, split, ConvertReport, ConvertRequest,
    DocumentInfo, MergeRequest, MutationReport, PagesRequest, SearchHit, SearchRequest,
    SplitRequest, WritePolicy,
};
pub use progress::{NoopProgress, OperationProgress, SharedProgress};
pub use render::{render, OutputFormat};
pub use score::{DefectFlag, QualityScore};
pub use structure::{Heading, LayoutHints};
