//! Extract a page subset into a new PDF.

use super::{derived_sibling, retain_pages, MutationReport, OperationKind, WritePolicy, WrittenFile};
use crate::config::PageSelection;
use crate::error::PdfOpsError;
use crate::guard::IntegrityGuard;
use crate::input;
use std::path::PathBuf;
use tracing::info;

/// Consumed by [`extract_pages`].
#[derive(Debug, Clone)]
pub struct PagesRequest {
    pub source: PathBuf,
    pub selection: PageSelection,
    /// Output path; `<stem>_pages.pdf` next to the source when `None`.
    pub target: Option<PathBuf>,
    pub policy: WritePolicy,
}

/// Copy the selected pages of `request.source` into a new document.
pub async fn extract_pages(
    request: PagesRequest,
    guard: &IntegrityGuard,
) -> Result<MutationReport, PdfOpsError> {
    let source = input::resolve_document(&request.source).await?;
    let source_path = source.path.clone();
    let target = request
        .target
        .unwrap_or_else(|| derived_sibling(&source_path, "_pages"));
    let selection = request.selection;

    let (bytes, kept) = tokio::task::spawn_blocking(move || {
        let doc = super::load_for_surgery(&source)?;
        let page_count = doc.get_pages().len() as u32;
        let keep = selection.resolve(page_count)?;
        let bytes = retain_pages(&doc, &keep, &source.path)?;
        Ok::<_, PdfOpsError>((bytes, keep.len() as u32))
    })
    .await
    .map_err(|e| PdfOpsError::Internal(format!("page extraction task panicked: {e}")))??;

    let record = guard
        .guarded_write(
            &target,
            &bytes,
            request.policy.overwrite,
            request.policy.force,
        )
        .await?;

    info!(
        source = %source_path.display(),
        target = %record.path.display(),
        pages = kept,
        "page extraction complete"
    );
    Ok(MutationReport {
        operation: OperationKind::Pages,
        sources: vec![source_path],
        written: vec![WrittenFile {
            path: record.path,
            bytes: bytes.len(),
            hash: record.hash,
            backup: record.backup,
            pages: kept,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::pdf_with_pages;

    #[tokio::test]
    async fn extracts_selection_to_default_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("deck.pdf");
        tokio::fs::write(&source, pdf_with_pages(&["one", "two", "three"]))
            .await
            .unwrap();

        let report = extract_pages(
            PagesRequest {
                source: source.clone(),
                selection: PageSelection::Set(vec![1, 3]),
                target: None,
                policy: WritePolicy::default(),
            },
            &IntegrityGuard::new(),
        )
        .await
        .unwrap();

        let target = dir.path().join("deck_pages.pdf");
        assert_eq!(report.written[0].path, target);
        assert_eq!(report.written[0].pages, 2);
        let doc = lopdf::Document::load(&target).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn single_page_of_a_one_page_document_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("single.pdf");
        tokio::fs::write(&source, pdf_with_pages(&["only page"]))
            .await
            .unwrap();

        let report = extract_pages(
            PagesRequest {
                source,
                selection: PageSelection::Set(vec![1]),
                target: Some(dir.path().join("copy.pdf")),
                policy: WritePolicy::default(),
            },
            &IntegrityGuard::new(),
        )
        .await
        .unwrap();
        assert_eq!(report.written[0].pages, 1);
    }

    #[tokio::test]
    async fn out_of_bounds_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("two.pdf");
        tokio::fs::write(&source, pdf_with_pages(&["a", "b"]))
            .await
            .unwrap();

        for selection in [
            PageSelection::Single(0),
            PageSelection::Single(3),
            PageSelection::Range(1, 3),
        ] {
            let err = extract_pages(
                PagesRequest {
                    source: source.clone(),
                    selection,
                    target: None,
                    policy: WritePolicy::default(),
                },
                &IntegrityGuard::new(),
            )
            .await
            .unwrap_err();
            assert!(matches!(
                err,
                PdfOpsError::InvalidPageRange { page_count: 2, .. }
            ));
        }
        assert!(!dir.path().join("two_pages.pdf").exists());
    }
}
