//! Full-text search over extracted pages. Read-only.

use crate::backend::BackendKind;
use crate::config::Config;
use crate::error::PdfOpsError;
use crate::extract;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Consumed by [`search`].
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub source: PathBuf,
    pub query: String,
    /// Case-insensitive unless set.
    pub case_sensitive: bool,
    /// Match whole words only.
    pub whole_word: bool,
    /// Characters of surrounding context on each side of a match.
    pub context: usize,
    pub backend: Option<BackendKind>,
}

/// One match, with enough context to judge it without opening the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub page: u32,
    pub matched: String,
    /// Surrounding text with newlines flattened for display.
    pub context: String,
}

/// Run `request.source` through the extraction orchestrator and scan every
/// page for the query.
pub async fn search(
    request: SearchRequest,
    config: &Config,
) -> Result<Vec<SearchHit>, PdfOpsError> {
    if request.query.is_empty() {
        return Err(PdfOpsError::InvalidConfig(
            "search query must not be empty".to_string(),
        ));
    }
    let pattern = build_pattern(&request.query, request.case_sensitive, request.whole_word)?;

    let result = extract::extract_preferring(&request.source, request.backend, config).await?;

    let mut hits = Vec::new();
    for page in &result.pages {
        for found in pattern.find_iter(&page.text) {
            hits.push(SearchHit {
                page: page.number,
                matched: found.as_str().to_string(),
                context: context_slice(&page.text, found.start(), found.end(), request.context),
            });
        }
    }

    debug!(
        source = %request.source.display(),
        query = %request.query,
        hits = hits.len(),
        "search finished"
    );
    Ok(hits)
}

fn build_pattern(
    query: &str,
    case_sensitive: bool,
    whole_word: bool,
) -> Result<Regex, PdfOpsError> {
    let mut pattern = regex::escape(query);
    if whole_word {
        pattern = format!(r"\b{pattern}\b");
    }
    if !case_sensitive {
        pattern = format!("(?i){pattern}");
    }
    Regex::new(&pattern)
        .map_err(|e| PdfOpsError::Internal(format!("building search pattern: {e}")))
}

/// Slice `±width` characters around a match, clamped to char boundaries so
/// multi-byte text never splits.
fn context_slice(text: &str, start: usize, end: usize, width: usize) -> String {
    let mut from = start.saturating_sub(width);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + width).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].replace(['\n', '\r'], " ").trim().to_string()
}
