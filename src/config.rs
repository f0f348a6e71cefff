//! Configuration types for extraction and mutation operations.
//!
//! All behaviour is controlled through [`Config`], built via its
//! [`ConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share configs across tasks, serialise them for logging, and diff two runs
//! to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest. The built value is immutable and is
//! threaded by reference into the orchestrator, the integrity guard, and the
//! mutation operations. There is no global configuration state, so tests can
//! inject distinct configs without touching each other.

use crate::backend::BackendKind;
use crate::error::PdfOpsError;
use crate::progress::OperationProgress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for extraction and mutation operations.
///
/// Built via [`Config::builder()`] or using [`Config::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfops::Config;
///
/// let config = Config::builder()
///     .concurrency(2)
///     .accept_ratio(0.8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Config {
    /// Ordered backend candidates, most capable first. Default:
    /// pdf-extract, lopdf, pdftotext.
    ///
    /// The orchestrator walks this list until the merged result clears the
    /// acceptance threshold. A caller preference passed to
    /// [`crate::extract::extract_with_config`] promotes that backend to the
    /// front without editing this list.
    pub backend_order: Vec<BackendKind>,

    /// Minimum per-page quality score for a page to count as "passing".
    /// Range 0.0–1.0. Default: 0.5.
    ///
    /// Scores are deterministic heuristics (see [`crate::score`]); 0.5 sits
    /// between "some suspicious signals" and "clearly damaged". Lower it for
    /// documents that are legitimately sparse (forms, slide decks).
    pub page_score_floor: f64,

    /// Fraction of pages that must pass the floor for a result to be
    /// accepted without trying further backends. Range 0.0–1.0. Default: 0.7.
    ///
    /// 0.7 tolerates a few bad pages (scanned inserts, decorative pages)
    /// while still catching the common failure mode where one backend
    /// garbles half the document.
    pub accept_ratio: f64,

    /// Number of documents processed in parallel by batch runs. Default: 4.
    ///
    /// Extraction is CPU-bound, so there is no benefit past the physical
    /// core count; 4 keeps memory bounded on large batches.
    pub concurrency: usize,

    /// Detect paragraph boundaries and headings on each extracted page and
    /// attach them as layout hints. Default: true.
    pub layout_hints: bool,

    /// Page separator used when assembling text/markdown output. Default: None.
    pub separator: PageSeparator,

    /// Prepend YAML front-matter with document metadata to markdown output.
    /// Default: false.
    pub include_metadata: bool,

    /// Progress callback fired by extraction and batch runs. Default: none.
    pub progress: Option<Arc<dyn OperationProgress>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_order: BackendKind::default_order(),
            page_score_floor: 0.5,
            accept_ratio: 0.7,
            concurrency: 4,
            layout_hints: true,
            separator: PageSeparator::default(),
            include_metadata: false,
            progress: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend_order", &self.backend_order)
            .field("page_score_floor", &self.page_score_floor)
            .field("accept_ratio", &self.accept_ratio)
            .field("concurrency", &self.concurrency)
            .field("layout_hints", &self.layout_hints)
            .field("separator", &self.separator)
            .field("include_metadata", &self.include_metadata)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Config {
    /// Create a new builder for `Config`.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn backend_order(mut self, order: Vec<BackendKind>) -> Self {
        self.config.backend_order = order;
        self
    }

    pub fn page_score_floor(mut self, floor: f64) -> Self {
        self.config.page_score_floor = floor.clamp(0.0, 1.0);
        self
    }

    pub fn accept_ratio(mut self, ratio: f64) -> Self {
        self.config.accept_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn layout_hints(mut self, v: bool) -> Self {
        self.config.layout_hints = v;
        self
    }

    pub fn separator(mut self, sep: PageSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn progress(mut self, cb: Arc<dyn OperationProgress>) -> Self {
        self.config.progress = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<Config, PdfOpsError> {
        let c = &self.config;
        if c.backend_order.is_empty() {
            return Err(PdfOpsError::InvalidConfig(
                "Backend order must name at least one backend".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.page_score_floor) {
            return Err(PdfOpsError::InvalidConfig(format!(
                "page_score_floor must be 0.0–1.0, got {}",
                c.page_score_floor
            )));
        }
        if !(0.0..=1.0).contains(&c.accept_ratio) {
            return Err(PdfOpsError::InvalidConfig(format!(
                "accept_ratio must be 0.0–1.0, got {}",
                c.accept_ratio
            )));
        }
        if c.concurrency == 0 {
            return Err(PdfOpsError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of a document an operation applies to.
///
/// Resolution against a concrete page count is strict: selections outside
/// `1..=page_count` fail with [`PdfOpsError::InvalidPageRange`] instead of
/// being clamped. An agent asking for pages 3–15 of a 10-page document is
/// working from stale assumptions, and silently handing back 3–10 would let
/// that go unnoticed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(u32),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(u32, u32),
    /// Specific pages (1-indexed; deduplicated on resolve).
    Set(Vec<u32>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-indexed
    /// page numbers, verifying every page lies within `1..=page_count`.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>, PdfOpsError> {
        let out_of_range = |detail: String| PdfOpsError::InvalidPageRange {
            detail,
            page_count,
        };

        let mut pages: Vec<u32> = match self {
            PageSelection::All => (1..=page_count).collect(),
            PageSelection::Single(p) => {
                if *p < 1 || *p > page_count {
                    return Err(out_of_range(format!("page {p}")));
                }
                vec![*p]
            }
            PageSelection::Range(start, end) => {
                if *start < 1 || *start > *end || *end > page_count {
                    return Err(out_of_range(format!("range {start}-{end}")));
                }
                (*start..=*end).collect()
            }
            PageSelection::Set(set) => {
                if let Some(bad) = set.iter().find(|&&p| p < 1 || p > page_count) {
                    return Err(out_of_range(format!("page {bad}")));
                }
                set.clone()
            }
        };

        pages.sort_unstable();
        pages.dedup();
        if pages.is_empty() {
            return Err(out_of_range("empty selection".into()));
        }
        Ok(pages)
    }
}

/// How to separate pages in assembled text or markdown output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string for the given page number (1-indexed).
    pub fn render(&self, page_num: u32) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_out_of_range_values() {
        let config = Config::builder()
            .page_score_floor(3.0)
            .accept_ratio(-1.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(config.page_score_floor, 1.0);
        assert_eq!(config.accept_ratio, 0.0);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn empty_backend_order_rejected() {
        let err = Config::builder().backend_order(vec![]).build().unwrap_err();
        assert!(matches!(err, PdfOpsError::InvalidConfig(_)));
    }

    #[test]
    fn resolve_all_pages() {
        assert_eq!(
            PageSelection::All.resolve(3).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn resolve_rejects_zero_and_past_end() {
        assert!(PageSelection::Single(0).resolve(5).is_err());
        assert!(PageSelection::Single(6).resolve(5).is_err());
        assert!(PageSelection::Set(vec![1, 0]).resolve(5).is_err());
        assert!(PageSelection::Range(3, 6).resolve(5).is_err());
    }

    #[test]
    fn resolve_single_page_of_one_page_doc() {
        assert_eq!(PageSelection::Single(1).resolve(1).unwrap(), vec![1]);
        assert_eq!(PageSelection::Set(vec![1]).resolve(1).unwrap(), vec![1]);
    }

    #[test]
    fn resolve_sorts_and_dedupes() {
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3, 2]).resolve(5).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn resolve_never_clamps_ranges() {
        // A range reaching past the end is an error, not a shorter range.
        let err = PageSelection::Range(8, 12).resolve(10).unwrap_err();
        match err {
            PdfOpsError::InvalidPageRange { detail, page_count } => {
                assert_eq!(page_count, 10);
                assert!(detail.contains("8-12"));
            }
            other => panic!("expected InvalidPageRange, got {other:?}"),
        }
    }

    #[test]
    fn separator_renders() {
        assert_eq!(PageSeparator::None.render(2), "\n\n");
        assert_eq!(PageSeparator::HorizontalRule.render(2), "\n\n---\n\n");
        assert!(PageSeparator::Comment.render(7).contains("page 7"));
        assert_eq!(PageSeparator::Custom("***".into()).render(1), "\n\n***\n\n");
    }
}
