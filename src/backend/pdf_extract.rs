//! Extraction through the `pdf-extract` crate.
//!
//! The highest-fidelity backend: real font programs, CMaps, and encoding
//! tables. It extracts the whole document as one string with form feeds
//! between pages, so the output is re-split and normalised against the
//! structural page count.

use super::{
    normalise_page_texts, structural_view, BackendFailure, BackendKind, ExtractionBackend,
    RawExtraction,
};
use tracing::debug;

pub struct PdfExtractBackend;

impl ExtractionBackend for PdfExtractBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PdfExtract
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendFailure> {
        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            let detail = e.to_string();
            // Identity-H and similar CMap gaps are the classic reason this
            // backend gives up on a document another one can still read.
            let detail = if detail.contains("Identity-H") || detail.contains("Unimplemented") {
                format!("unsupported font encoding: {detail}")
            } else {
                format!("could not extract text: {detail}")
            };
            BackendFailure {
                kind: BackendKind::PdfExtract,
                detail,
            }
        })?;

        let (declared, metadata) = structural_view(bytes);
        let chunks: Vec<String> = text.split('\x0C').map(str::to_string).collect();
        debug!(
            chunks = chunks.len(),
            declared, "re-splitting flat extraction output"
        );

        Ok(RawExtraction {
            kind: BackendKind::PdfExtract,
            pages: normalise_page_texts(chunks, declared),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::{pdf_with_pages, pdf_with_pages_titled};

    #[test]
    fn splits_output_into_declared_pages() {
        let bytes = pdf_with_pages(&["first body", "second body", "third body"]);
        let raw = PdfExtractBackend.extract(&bytes).unwrap();
        assert_eq!(raw.pages.len(), 3);
        assert!(raw.pages[0].text.contains("first"));
        assert!(raw.pages[2].text.contains("third"));
    }

    #[test]
    fn carries_structural_metadata() {
        let bytes = pdf_with_pages_titled(&["body"], Some("Carried Title"));
        let raw = PdfExtractBackend.extract(&bytes).unwrap();
        let meta = raw.metadata.unwrap();
        assert_eq!(meta.title.as_deref(), Some("Carried Title"));
        assert_eq!(meta.page_count, 1);
    }

    #[test]
    fn garbage_bytes_are_a_hard_failure() {
        let err = PdfExtractBackend.extract(b"%NOTPDF").unwrap_err();
        assert_eq!(err.kind, BackendKind::PdfExtract);
    }
}
