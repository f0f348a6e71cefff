//! Input resolution: validate that a path names a readable PDF and load it.
//!
//! Loading happens exactly once per operation; everything downstream works on
//! the in-memory bytes and the content hash taken at load time, so a file
//! changing on disk mid-operation cannot produce a half-old half-new result.

use crate::error::PdfOpsError;
use crate::guard;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A loaded source document: path, raw bytes, and the SHA-256 content hash
/// computed at load time.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub hash: String,
}

/// Validate `path` and load its bytes.
///
/// Checks performed before any parsing: the path exists and is a regular
/// file, it is readable, and it starts with the `%PDF` magic bytes.
pub async fn resolve_document(path: &Path) -> Result<SourceDocument, PdfOpsError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| read_error(path, e))?;
    if !metadata.is_file() {
        return Err(PdfOpsError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
    check_magic(path, &bytes)?;

    let hash = guard::hash_bytes(&bytes);
    debug!(
        path = %path.display(),
        size = bytes.len(),
        hash = %&hash[..12.min(hash.len())],
        "document loaded"
    );

    Ok(SourceDocument {
        path: path.to_path_buf(),
        bytes,
        hash,
    })
}

fn read_error(path: &Path, e: std::io::Error) -> PdfOpsError {
    match e.kind() {
        ErrorKind::NotFound => PdfOpsError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => PdfOpsError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PdfOpsError::Internal(format!("reading '{}': {e}", path.display())),
    }
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), PdfOpsError> {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if &magic != b"%PDF" {
        return Err(PdfOpsError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::pdf_with_pages;

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = resolve_document(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PdfOpsError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn non_pdf_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        tokio::fs::write(&path, b"plain text pretending").await.unwrap();

        let err = resolve_document(&path).await.unwrap_err();
        match err {
            PdfOpsError::NotAPdf { magic, .. } => assert_eq!(&magic, b"plai"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn directory_is_not_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_document(dir.path()).await.unwrap_err();
        assert!(matches!(err, PdfOpsError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn valid_pdf_loads_with_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        tokio::fs::write(&path, pdf_with_pages(&["hello"])).await.unwrap();

        let doc = resolve_document(&path).await.unwrap();
        assert_eq!(doc.path, path);
        assert_eq!(doc.hash.len(), 64);
        assert!(doc.bytes.starts_with(b"%PDF"));
    }
}
