//! Extraction backends: interchangeable providers of page-level text.
//!
//! ## Why an explicit capability trait?
//!
//! Different PDF libraries fail on different malformations, from broken xref
//! tables to exotic font encodings to nonstandard content streams. Modelling each
//! library as an [`ExtractionBackend`] behind one uniform contract lets the
//! orchestrator walk a static priority list and treat every variant
//! identically: structural success yields a [`RawExtraction`], a document the
//! backend cannot open at all yields a [`BackendFailure`]. New backends
//! register by implementing the trait, not by special-casing call sites.
//!
//! Backends are synchronous and CPU-bound; the orchestrator runs them on the
//! blocking thread pool. Anything softer than "could not open", such as a
//! page that would not decode, is reported through page text, page errors,
//! and quality scores, never through `BackendFailure`.

use crate::error::PageError;
use crate::extract::DocumentMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;

mod lopdf_text;
mod pdf_extract;
mod poppler;

pub use lopdf_text::LopdfBackend;
pub(crate) use lopdf_text::read_metadata;
pub use pdf_extract::PdfExtractBackend;
pub use poppler::PdftotextBackend;

/// Identifies an extraction backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// The `pdf-extract` crate: embedded-font and encoding handling, the
    /// most faithful text of the three.
    PdfExtract,
    /// `lopdf`'s structural extractor: tolerant of odd documents, simpler
    /// text decoding.
    Lopdf,
    /// External poppler `pdftotext`: most permissive, only available when
    /// the binary is installed.
    Pdftotext,
}

impl BackendKind {
    /// Fixed priority order: most capable first, most permissive last.
    pub fn default_order() -> Vec<BackendKind> {
        vec![
            BackendKind::PdfExtract,
            BackendKind::Lopdf,
            BackendKind::Pdftotext,
        ]
    }

    /// Stable name used in diagnostics, CLI flags, and serialised reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::PdfExtract => "pdf-extract",
            BackendKind::Lopdf => "lopdf",
            BackendKind::Pdftotext => "pdftotext",
        }
    }

    /// Instantiate the backend this variant names.
    pub fn instantiate(&self) -> Box<dyn ExtractionBackend> {
        match self {
            BackendKind::PdfExtract => Box::new(PdfExtractBackend),
            BackendKind::Lopdf => Box::new(LopdfBackend),
            BackendKind::Pdftotext => Box::new(PdftotextBackend),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform hard-failure signal: the backend could not open or parse the
/// document at all.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    pub kind: BackendKind,
    pub detail: String,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for BackendFailure {}

/// One page as a backend produced it: raw text plus an optional non-fatal
/// decode error. Empty text with an error still occupies its page slot so
/// results stay contiguous.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub text: String,
    pub error: Option<PageError>,
}

/// Everything a backend hands back on structural success.
///
/// `pages` is positional: index 0 holds page 1. Backends normalise their own
/// output to their view of the page count before returning, so the
/// orchestrator never sees ragged results.
#[derive(Debug, Clone)]
pub struct RawExtraction {
    pub kind: BackendKind,
    pub pages: Vec<RawPage>,
    pub metadata: Option<DocumentMetadata>,
}

/// An interchangeable PDF text/metadata extraction capability.
pub trait ExtractionBackend: Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> BackendKind;

    /// Whether this backend can run in this environment. In-process backends
    /// are always available; subprocess-backed ones probe for their binary.
    fn is_available(&self) -> bool {
        true
    }

    /// Extract page-level text (and metadata, when the backend can see it)
    /// from raw PDF bytes.
    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendFailure>;
}

/// Normalise flat page chunks to exactly `declared` entries.
///
/// Whole-document extractors split on form feeds, which can disagree with the
/// structural page count: trailing separators produce phantom empty chunks,
/// missing separators produce too few. Overflow is folded into the final page
/// (content is never dropped); missing pages are padded with empty text and a
/// [`PageError::MissingText`] marker. `declared == 0` means the structural
/// count is unknown and the chunks speak for themselves.
pub(crate) fn normalise_page_texts(mut texts: Vec<String>, declared: usize) -> Vec<RawPage> {
    let target = if declared == 0 {
        while texts.len() > 1 && texts.last().is_some_and(|t| t.trim().is_empty()) {
            texts.pop();
        }
        texts.len()
    } else {
        declared
    };

    while texts.len() > target && texts.last().is_some_and(|t| t.trim().is_empty()) {
        texts.pop();
    }

    if texts.len() > target && target > 0 {
        let overflow = texts.split_off(target);
        if let Some(last) = texts.last_mut() {
            for chunk in overflow {
                last.push('\n');
                last.push_str(&chunk);
            }
        }
    }

    let mut pages: Vec<RawPage> = texts
        .into_iter()
        .map(|text| RawPage { text, error: None })
        .collect();
    while pages.len() < target {
        let page = pages.len() as u32 + 1;
        pages.push(RawPage {
            text: String::new(),
            error: Some(PageError::MissingText { page }),
        });
    }
    pages
}

/// One structural pass over the raw bytes: the declared page count, used to
/// re-split flat text output, plus whatever Info-dictionary metadata the
/// document carries. `(0, None)` when lopdf cannot parse the bytes; the text
/// backends form their own opinion about readability.
pub(crate) fn structural_view(bytes: &[u8]) -> (usize, Option<DocumentMetadata>) {
    match lopdf::Document::load_mem(bytes) {
        Ok(doc) => {
            let pages = doc.get_pages().len();
            let metadata = read_metadata(&doc, pages as u32);
            (pages, Some(metadata))
        }
        Err(_) => (0, None),
    }
}

// ── Test fixtures ────────────────────────────────────────────────────────

/// Minimal but valid PDFs generated with lopdf, for unit and integration
/// tests. One content stream per page; Helvetica so every backend can decode
/// the text without embedded fonts.
#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Object, Stream};

    /// Build an n-page PDF whose page texts are the given strings.
    pub fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
        pdf_with_pages_titled(texts, None)
    }

    /// Same as [`pdf_with_pages`], with an optional Info-dict title.
    pub fn pdf_with_pages_titled(texts: &[&str], title: Option<&str>) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let media_box = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ];

        let mut page_ids = Vec::new();
        for text in texts {
            let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escape_pdf_text(text));
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "MediaBox" => media_box.clone(),
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => Object::Reference(font_id),
                    },
                },
            });
            page_ids.push(page_id);
        }

        let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_ids.len() as i64),
        });

        for page_id in &page_ids {
            if let Ok(page_obj) = doc.get_object_mut(*page_id) {
                if let Ok(dict) = page_obj.as_dict_mut() {
                    dict.set("Parent", Object::Reference(pages_id));
                }
            }
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title),
                "Producer" => Object::string_literal("edgequake-pdfops fixtures"),
            });
            doc.trailer.set("Info", Object::Reference(info_id));
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("fixture PDF should serialise");
        buf
    }

    fn escape_pdf_text(text: &str) -> String {
        text.replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)")
    }
}
