//! Structural extraction through `lopdf`.
//!
//! Decodes one page at a time, so a single page with a broken font never
//! poisons the rest of the document. Also the only backend that can see the
//! Info dictionary, which makes it the source of document metadata.

use super::{BackendFailure, BackendKind, ExtractionBackend, RawExtraction, RawPage};
use crate::error::PageError;
use crate::extract::DocumentMetadata;
use lopdf::{Document, Object};
use tracing::debug;

pub struct LopdfBackend;

impl ExtractionBackend for LopdfBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Lopdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendFailure> {
        let doc = Document::load_mem(bytes).map_err(|e| BackendFailure {
            kind: BackendKind::Lopdf,
            detail: format!("could not parse document: {e}"),
        })?;

        if doc.is_encrypted() {
            return Err(BackendFailure {
                kind: BackendKind::Lopdf,
                detail: "document is encrypted".to_string(),
            });
        }

        let page_map = doc.get_pages();
        let mut pages = Vec::with_capacity(page_map.len());
        for (page_num, _object_id) in page_map {
            match doc.extract_text(&[page_num]) {
                Ok(text) => pages.push(RawPage { text, error: None }),
                Err(e) => {
                    debug!(page = page_num, error = %e, "page text extraction failed");
                    pages.push(RawPage {
                        text: String::new(),
                        error: Some(PageError::TextDecode {
                            page: page_num,
                            detail: e.to_string(),
                        }),
                    });
                }
            }
        }

        let metadata = read_metadata(&doc, pages.len() as u32);
        Ok(RawExtraction {
            kind: BackendKind::Lopdf,
            pages,
            metadata: Some(metadata),
        })
    }
}

/// Pull the standard Info-dictionary fields. Absent or non-UTF-8 entries
/// become `None` rather than failures.
pub(crate) fn read_metadata(doc: &Document, page_count: u32) -> DocumentMetadata {
    let mut metadata = DocumentMetadata {
        page_count,
        pdf_version: Some(doc.version.clone()),
        ..DocumentMetadata::default()
    };

    let info_dict = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| obj.as_dict().ok());

    if let Some(info) = info_dict {
        let field = |key: &[u8]| -> Option<String> {
            info.get(key)
                .ok()
                .and_then(|obj| obj.as_str().ok())
                .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        metadata.title = field(b"Title");
        metadata.author = field(b"Author");
        metadata.subject = field(b"Subject");
        metadata.creator = field(b"Creator");
        metadata.producer = field(b"Producer");
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::{pdf_with_pages, pdf_with_pages_titled};

    #[test]
    fn extracts_per_page_text() {
        let bytes = pdf_with_pages(&["alpha page", "beta page"]);
        let raw = LopdfBackend.extract(&bytes).unwrap();
        assert_eq!(raw.kind, BackendKind::Lopdf);
        assert_eq!(raw.pages.len(), 2);
        assert!(raw.pages[0].text.contains("alpha"));
        assert!(raw.pages[1].text.contains("beta"));
        assert!(raw.pages.iter().all(|p| p.error.is_none()));
    }

    #[test]
    fn reads_info_dictionary_metadata() {
        let bytes = pdf_with_pages_titled(&["content"], Some("Quarterly Report"));
        let raw = LopdfBackend.extract(&bytes).unwrap();
        let metadata = raw.metadata.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(metadata.page_count, 1);
        assert_eq!(metadata.pdf_version.as_deref(), Some("1.5"));
    }

    #[test]
    fn garbage_bytes_are_a_hard_failure() {
        let err = LopdfBackend.extract(b"not a pdf at all").unwrap_err();
        assert_eq!(err.kind, BackendKind::Lopdf);
        assert!(err.detail.contains("could not parse"));
    }
}
