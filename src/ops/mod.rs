//! Document operations: the mutation pipeline and the read-only inspectors.
//!
//! Every mutating operation follows the same shape: validate the request,
//! transform in memory, then hand the finished bytes to the
//! [`crate::guard::IntegrityGuard`] which arbitrates the actual write. No
//! operation writes a file directly, and nothing touches the destination
//! until validation and transformation have fully succeeded.

use crate::error::PdfOpsError;
use crate::input::SourceDocument;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod convert;
pub mod info;
pub mod merge;
pub mod pages;
pub mod search;
pub mod split;

pub use convert::{convert, ConvertReport, ConvertRequest};
pub use info::{info, DocumentInfo, PageStats};
pub use merge::{merge, MergeRequest};
pub use pages::{extract_pages, PagesRequest};
pub use search::{search, SearchHit, SearchRequest};
pub use split::{split, SplitRequest};

/// Overwrite and force flags shared by every mutating request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePolicy {
    /// Allow replacing an existing destination (a backup is kept).
    pub overwrite: bool,
    /// Skip the confirmation step for content this session does not know.
    pub force: bool,
}

/// Which mutating operation produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Split,
    Merge,
    Pages,
    Convert,
}

/// One committed output file.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: usize,
    /// SHA-256 of the committed content.
    pub hash: String,
    /// Backup sibling holding the replaced content, when one was made.
    pub backup: Option<PathBuf>,
    /// Pages in this output (0 for non-PDF outputs).
    pub pages: u32,
}

/// Outcome of a PDF-to-PDF mutation.
#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    pub operation: OperationKind,
    pub sources: Vec<PathBuf>,
    pub written: Vec<WrittenFile>,
}

// ── lopdf surgery helpers ────────────────────────────────────────────────

/// Structural load for page surgery. A document lopdf cannot parse is
/// unreadable for mutation purposes even if a text backend could still
/// scrape it.
pub(crate) fn load_for_surgery(source: &SourceDocument) -> Result<Document, PdfOpsError> {
    Document::load_mem(&source.bytes).map_err(|e| PdfOpsError::DocumentUnreadable {
        path: source.path.clone(),
        tried: 1,
        detail: format!("structural parse failed: {e}"),
    })
}

/// Serialise a copy of `doc` containing only the pages in `keep`
/// (1-based, already validated against the page count).
pub(crate) fn retain_pages(
    doc: &Document,
    keep: &[u32],
    source_path: &Path,
) -> Result<Vec<u8>, PdfOpsError> {
    let mut doc = doc.clone();
    let delete: Vec<u32> = doc
        .get_pages()
        .keys()
        .copied()
        .filter(|p| !keep.contains(p))
        .collect();
    if !delete.is_empty() {
        doc.delete_pages(&delete);
    }
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| PdfOpsError::MutationFailed {
            path: source_path.to_path_buf(),
            detail: format!("serialising {} page(s): {e}", keep.len()),
        })?;
    Ok(buf)
}

// ── Derived output naming ────────────────────────────────────────────────

/// Split part name: `report.pdf` part 2 → `report_part_2.pdf`, placed next
/// to the source or in `output_dir` when given.
pub(crate) fn part_path(source: &Path, output_dir: Option<&Path>, part: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = format!("{stem}_part_{part}.pdf");
    match output_dir {
        Some(dir) => dir.join(name),
        None => source.with_file_name(name),
    }
}

/// Sibling of `source` named `<stem><suffix>.pdf`.
pub(crate) fn derived_sibling(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    source.with_file_name(format!("{stem}{suffix}.pdf"))
}

/// Propose a path that does not currently exist by appending `_1`, `_2`, …
/// to the stem, giving up after a bounded number of attempts. A proposal
/// only: the guard still arbitrates the actual write.
pub async fn propose_free_path(candidate: &Path) -> PathBuf {
    const MAX_VARIANTS: u32 = 9999;

    if !tokio::fs::try_exists(candidate).await.unwrap_or(false) {
        return candidate.to_path_buf();
    }

    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut last = candidate.to_path_buf();
    for n in 1..=MAX_VARIANTS {
        last = candidate.with_file_name(format!("{stem}_{n}{ext}"));
        if !tokio::fs::try_exists(&last).await.unwrap_or(false) {
            return last;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_paths_are_source_siblings() {
        assert_eq!(
            part_path(Path::new("/docs/report.pdf"), None, 3),
            Path::new("/docs/report_part_3.pdf")
        );
        assert_eq!(
            part_path(Path::new("/docs/report.pdf"), Some(Path::new("/out")), 1),
            Path::new("/out/report_part_1.pdf")
        );
    }

    #[test]
    fn derived_siblings_keep_the_directory() {
        assert_eq!(
            derived_sibling(Path::new("/docs/report.pdf"), "_pages"),
            Path::new("/docs/report_pages.pdf")
        );
    }

    #[tokio::test]
    async fn free_path_proposal_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("out.md");

        assert_eq!(propose_free_path(&candidate).await, candidate);

        tokio::fs::write(&candidate, b"taken").await.unwrap();
        assert_eq!(
            propose_free_path(&candidate).await,
            dir.path().join("out_1.md")
        );

        tokio::fs::write(dir.path().join("out_1.md"), b"also taken")
            .await
            .unwrap();
        assert_eq!(
            propose_free_path(&candidate).await,
            dir.path().join("out_2.md")
        );
    }

    #[test]
    fn retain_pages_drops_the_rest() {
        let bytes = crate::backend::fixtures::pdf_with_pages(&["one", "two", "three"]);
        let doc = Document::load_mem(&bytes).unwrap();
        let out = retain_pages(&doc, &[1, 3], Path::new("src.pdf")).unwrap();

        let trimmed = Document::load_mem(&out).unwrap();
        assert_eq!(trimmed.get_pages().len(), 2);
        let text = trimmed.extract_text(&[1, 2]).unwrap();
        assert!(text.contains("one"));
        assert!(text.contains("three"));
        assert!(!text.contains("two"));
    }
}
