//! Error types for the edgequake-pdfops library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfOpsError`] is **fatal**: the operation cannot proceed at all
//!   (unreadable document, page selection out of bounds, integrity guard
//!   refusal). Returned as `Err(PdfOpsError)` from the top-level entry points.
//!
//! * [`PageError`] is **non-fatal**: one page failed to decode but the rest of
//!   the document is fine. Stored inside [`crate::extract::Page`] so callers
//!   can inspect partial success rather than losing the whole document to one
//!   bad page.
//!
//! Low extraction quality is deliberately *not* an error: the orchestrator
//! returns its best assembly with a `partial` marker and per-page scores, and
//! callers decide their own tolerance.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfops library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::extract::Page`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PdfOpsError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every backend failed to open or parse the document.
    ///
    /// Low-quality extraction never produces this error; it is reserved for
    /// the case where no backend produced any structural result at all.
    #[error("No extraction backend could open '{path}' ({tried} tried)\nLast failure: {detail}\nThe file may be corrupt. Try repairing it with: qpdf --decrypt input.pdf output.pdf")]
    DocumentUnreadable {
        path: PathBuf,
        tried: usize,
        detail: String,
    },

    // ── Page-selection errors ─────────────────────────────────────────────
    /// Caller-specified page selection falls outside the document.
    ///
    /// Selections are never clamped; an out-of-bounds request is refused so
    /// the caller cannot silently receive fewer pages than asked for.
    #[error("Invalid page selection {detail}: document has {page_count} pages\nPages are 1-indexed; selections must be a non-empty subset of 1..={page_count}.")]
    InvalidPageRange { detail: String, page_count: u32 },

    /// Merge called with fewer than two inputs.
    #[error("Merge needs at least 2 input files, got {got}")]
    TooFewMergeInputs { got: usize },

    // ── Integrity guard refusals ──────────────────────────────────────────
    /// The target exists and overwrite was not requested.
    #[error("Destination already exists: '{path}'\nPass --overwrite to replace it (a backup will be kept).")]
    DestinationExists { path: PathBuf },

    /// The target exists with content this session cannot vouch for, and
    /// neither `force` nor the confirmation provider approved replacing it.
    #[error("Refusing to overwrite '{path}': its content differs from what this session last wrote\nPass --force to replace it anyway; the current file is backed up first.")]
    UnconfirmedOverwrite { path: PathBuf },

    /// A backup sidecar already exists with different content.
    ///
    /// Backups are never overwritten; losing the previous backup would defeat
    /// the protection it provides.
    #[error("A different backup already exists: '{backup}'\nMove it aside before replacing '{path}'; existing backups are never overwritten.")]
    BackupCollision { path: PathBuf, backup: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not stage or publish the output file. The previous content of
    /// the target path, if any, is intact.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Mutation errors ───────────────────────────────────────────────────
    /// Page-object assembly (split/merge/extract-pages) failed.
    #[error("Page assembly failed for '{path}': {detail}")]
    MutationFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::extract::Page`] when one page fails to decode.
/// The page keeps an empty text body (and therefore a zero quality score), so
/// the best-of merge across backends can still replace it with a better
/// attempt.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The backend opened the document but could not decode this page's text.
    #[error("Page {page}: text decoding failed: {detail}")]
    TextDecode { page: u32, detail: String },

    /// The backend reported fewer pages than the document declares; this
    /// index had no corresponding output.
    #[error("Page {page}: backend produced no text for this page")]
    MissingText { page: u32 },
}
