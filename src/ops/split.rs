//! Split one PDF into several, one output per requested page range.

use super::{part_path, retain_pages, MutationReport, OperationKind, WritePolicy, WrittenFile};
use crate::config::PageSelection;
use crate::error::PdfOpsError;
use crate::guard::IntegrityGuard;
use crate::input;
use std::path::PathBuf;
use tracing::info;

/// Consumed by [`split`].
#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub source: PathBuf,
    /// One output per selection, in order; part numbers start at 1.
    pub ranges: Vec<PageSelection>,
    /// Where the parts go; next to the source when `None`.
    pub output_dir: Option<PathBuf>,
    pub policy: WritePolicy,
}

/// Split `request.source` into `<stem>_part_<n>.pdf` outputs.
///
/// Every range is validated against the real page count and every part is
/// assembled in memory before the first byte reaches disk; each part then
/// passes the guard individually.
pub async fn split(
    request: SplitRequest,
    guard: &IntegrityGuard,
) -> Result<MutationReport, PdfOpsError> {
    // Step 1: load and validate.
    let source = input::resolve_document(&request.source).await?;
    let ranges = request.ranges;
    if ranges.is_empty() {
        return Err(PdfOpsError::InvalidPageRange {
            detail: "no page ranges given".to_string(),
            page_count: 0,
        });
    }

    // Step 2: transform in memory (CPU-bound, off the async executor).
    let source_path = source.path.clone();
    let output_dir = request.output_dir.clone();
    let parts: Vec<(PathBuf, Vec<u8>, u32)> = tokio::task::spawn_blocking(move || {
        let doc = super::load_for_surgery(&source)?;
        let page_count = doc.get_pages().len() as u32;

        let mut parts = Vec::with_capacity(ranges.len());
        for (i, selection) in ranges.iter().enumerate() {
            let keep = selection.resolve(page_count)?;
            let bytes = retain_pages(&doc, &keep, &source.path)?;
            let path = part_path(&source.path, output_dir.as_deref(), i + 1);
            parts.push((path, bytes, keep.len() as u32));
        }
        Ok::<_, PdfOpsError>(parts)
    })
    .await
    .map_err(|e| PdfOpsError::Internal(format!("split task panicked: {e}")))??;

    // Step 3: write each part through the guard.
    let mut written = Vec::with_capacity(parts.len());
    for (path, bytes, pages) in parts {
        let record = guard
            .guarded_write(&path, &bytes, request.policy.overwrite, request.policy.force)
            .await?;
        written.push(WrittenFile {
            path: record.path,
            bytes: bytes.len(),
            hash: record.hash,
            backup: record.backup,
            pages,
        });
    }

    info!(
        source = %source_path.display(),
        parts = written.len(),
        "split complete"
    );
    Ok(MutationReport {
        operation: OperationKind::Split,
        sources: vec![source_path],
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::pdf_with_pages;

    async fn write_fixture(dir: &tempfile::TempDir, name: &str, pages: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, pdf_with_pages(pages)).await.unwrap();
        path
    }

    #[tokio::test]
    async fn splits_into_parts_next_to_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_fixture(&dir, "book.pdf", &["a", "b", "c", "d"]).await;
        let guard = IntegrityGuard::new();

        let report = split(
            SplitRequest {
                source: source.clone(),
                ranges: vec![PageSelection::Range(1, 2), PageSelection::Range(3, 4)],
                output_dir: None,
                policy: WritePolicy::default(),
            },
            &guard,
        )
        .await
        .unwrap();

        assert_eq!(report.operation, OperationKind::Split);
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.written[0].path, dir.path().join("book_part_1.pdf"));
        assert_eq!(report.written[0].pages, 2);

        let part = lopdf::Document::load(dir.path().join("book_part_2.pdf")).unwrap();
        assert_eq!(part.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn invalid_range_aborts_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_fixture(&dir, "book.pdf", &["a", "b"]).await;
        let guard = IntegrityGuard::new();

        let err = split(
            SplitRequest {
                source,
                ranges: vec![PageSelection::Range(1, 1), PageSelection::Range(2, 3)],
                output_dir: None,
                policy: WritePolicy::default(),
            },
            &guard,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PdfOpsError::InvalidPageRange { .. }));
        // The valid first part must not have been written either.
        assert!(!dir.path().join("book_part_1.pdf").exists());
    }
}
