//! Read-only document inspection. Never touches the guard.

use crate::backend;
use crate::error::PdfOpsError;
use crate::extract::DocumentMetadata;
use crate::input;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Per-page statistics for the verbose report.
#[derive(Debug, Clone, Serialize)]
pub struct PageStats {
    pub page: u32,
    /// Characters of extractable text (whitespace trimmed).
    pub characters: usize,
    pub empty: bool,
}

/// Everything `info` can tell about a document without mutating anything.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub file_size: u64,
    /// SHA-256 of the file content.
    pub hash: String,
    pub metadata: DocumentMetadata,
    pub encrypted: bool,
    /// Present when page statistics were requested.
    pub page_stats: Option<Vec<PageStats>>,
}

/// Inspect `path`. With `with_page_stats` the text of every page is decoded
/// to measure it, which costs a full extraction pass on large documents.
pub async fn info(path: &Path, with_page_stats: bool) -> Result<DocumentInfo, PdfOpsError> {
    let source = input::resolve_document(path).await?;
    let file_size = source.bytes.len() as u64;
    let hash = source.hash.clone();
    let display_path = source.path.clone();

    let (metadata, encrypted, page_stats) = tokio::task::spawn_blocking(move || {
        let doc = lopdf::Document::load_mem(&source.bytes).map_err(|e| {
            PdfOpsError::DocumentUnreadable {
                path: source.path.clone(),
                tried: 1,
                detail: format!("structural parse failed: {e}"),
            }
        })?;

        let encrypted = doc.is_encrypted();
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let metadata = backend::read_metadata(&doc, page_numbers.len() as u32);

        let page_stats = if with_page_stats && !encrypted {
            Some(
                page_numbers
                    .iter()
                    .map(|&page| {
                        let characters = doc
                            .extract_text(&[page])
                            .map(|t| t.trim().chars().count())
                            .unwrap_or(0);
                        PageStats {
                            page,
                            characters,
                            empty: characters == 0,
                        }
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok::<_, PdfOpsError>((metadata, encrypted, page_stats))
    })
    .await
    .map_err(|e| PdfOpsError::Internal(format!("info task panicked: {e}")))??;

    Ok(DocumentInfo {
        path: display_path,
        file_size,
        hash,
        metadata,
        encrypted,
        page_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::pdf_with_pages_titled;

    #[tokio::test]
    async fn reports_metadata_and_page_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        tokio::fs::write(
            &path,
            pdf_with_pages_titled(&["some body text", ""], Some("Annual Report")),
        )
        .await
        .unwrap();

        let info = info(&path, true).await.unwrap();
        assert_eq!(info.metadata.title.as_deref(), Some("Annual Report"));
        assert_eq!(info.metadata.page_count, 2);
        assert!(!info.encrypted);
        assert_eq!(info.hash.len(), 64);

        let stats = info.page_stats.unwrap();
        assert_eq!(stats.len(), 2);
        assert!(stats[0].characters > 0);
        assert!(stats[1].empty);
    }

    #[tokio::test]
    async fn skips_page_stats_when_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.pdf");
        tokio::fs::write(&path, pdf_with_pages_titled(&["text"], None))
            .await
            .unwrap();

        let info = info(&path, false).await.unwrap();
        assert!(info.page_stats.is_none());
        assert_eq!(info.metadata.page_count, 1);
    }
}
