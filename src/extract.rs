//! Extraction orchestrator: ordered backends, quality-gated fallback, and
//! per-page best-of merging.
//!
//! ## Why merge across backends instead of picking a winner?
//!
//! Real documents fail unevenly. One backend reads the typeset front half
//! perfectly and garbles the scanned appendix; another decodes the appendix
//! but mangles ligatures everywhere else. Treating each attempt as a page
//! source and keeping, per page, the attempt with the strictly higher score
//! assembles a better document than any single backend produced. Low quality
//! is never an error here: the orchestrator only fails when no backend can
//! open the document at all.
//!
//! The walk is deterministic: candidate order is fixed up front (caller
//! preference promoted to the front), ties in per-page score keep the earlier
//! attempt, and the loop exits early once the merged aggregate clears the
//! acceptance threshold.

use crate::backend::{BackendKind, ExtractionBackend};
use crate::config::Config;
use crate::error::{PageError, PdfOpsError};
use crate::input;
use crate::score::{passing_ratio, score_page, QualityScore};
use crate::structure::{analyze_layout, LayoutHints};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

// ── Result model ─────────────────────────────────────────────────────────

/// Standard document properties, mostly from the PDF Info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: u32,
    pub pdf_version: Option<String>,
}

/// One extracted page. Never mutated after assembly; a retry that beats it
/// produces a replacement instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
    /// Paragraph/heading hints, present when enabled in [`Config`].
    pub layout: Option<LayoutHints>,
    pub score: QualityScore,
    /// The backend this page's text came from.
    pub backend: BackendKind,
    /// Non-fatal problem the backend reported for this page, if any.
    pub error: Option<PageError>,
}

/// How one backend attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum AttemptOutcome {
    /// Structural success and the merged aggregate cleared the acceptance
    /// threshold; the walk stopped here.
    Accepted,
    /// Structural success below the acceptance threshold; pages were still
    /// merged into the running best.
    BelowThreshold,
    /// The backend could not open or parse the document at all.
    OpenFailed { detail: String },
    /// The backend cannot run in this environment (external binary missing).
    Unavailable,
}

/// Diagnostic record of one backend attempt, in attempt order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptReport {
    pub backend: BackendKind,
    /// Fraction of this attempt's own pages that passed the floor
    /// (0.0 for attempts that never produced pages).
    pub aggregate: f64,
    pub outcome: AttemptOutcome,
}

/// The assembled output of the orchestrator: contiguous pages from 1,
/// metadata, and the full attempt history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub pages: Vec<Page>,
    pub metadata: DocumentMetadata,
    /// Fraction of assembled pages whose score passes the configured floor.
    pub aggregate_quality: f64,
    /// True when the aggregate never reached the acceptance threshold or
    /// pages are missing; `partial_reason` says which.
    pub partial: bool,
    pub partial_reason: Option<String>,
    pub attempts: Vec<AttemptReport>,
}

impl ExtractionResult {
    /// All page text joined with blank lines, for callers that do not care
    /// about page boundaries (search, previews).
    pub fn text(&self) -> String {
        let texts: Vec<&str> = self.pages.iter().map(|p| p.text.as_str()).collect();
        texts.join("\n\n")
    }

    /// Distinct backends that contributed at least one page, in page order.
    pub fn backends_used(&self) -> Vec<BackendKind> {
        let mut seen = Vec::new();
        for page in &self.pages {
            if !seen.contains(&page.backend) {
                seen.push(page.backend);
            }
        }
        seen
    }
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Extract a PDF with the default configuration.
pub async fn extract(path: impl AsRef<Path>) -> Result<ExtractionResult, PdfOpsError> {
    extract_with_config(path, &Config::default()).await
}

/// Extract a PDF with an explicit configuration and optional backend
/// preference. A preference is promoted to the front of the candidate order;
/// the remaining candidates keep their configured order behind it.
pub async fn extract_with_config(
    path: impl AsRef<Path>,
    config: &Config,
) -> Result<ExtractionResult, PdfOpsError> {
    extract_preferring(path, None, config).await
}

/// See [`extract_with_config`].
pub async fn extract_preferring(
    path: impl AsRef<Path>,
    preference: Option<BackendKind>,
    config: &Config,
) -> Result<ExtractionResult, PdfOpsError> {
    let source = input::resolve_document(path.as_ref()).await?;
    let order = order_with_preference(&config.backend_order, preference);
    let config = config.clone();
    let document_path = source.path.clone();
    let progress = config.progress.clone();

    if let Some(progress) = &progress {
        progress.on_document_started(&document_path);
    }

    let result = tokio::task::spawn_blocking(move || {
        let backends: Vec<Box<dyn ExtractionBackend>> =
            order.iter().map(|kind| kind.instantiate()).collect();
        orchestrate(&source.bytes, &source.path, &backends, &config)
    })
    .await
    .map_err(|e| PdfOpsError::Internal(format!("extraction task panicked: {e}")))??;

    if let Some(progress) = &progress {
        progress.on_document_finished(&document_path, result.partial);
    }
    Ok(result)
}

/// Candidate order with an optional caller preference moved to the front.
pub(crate) fn order_with_preference(
    order: &[BackendKind],
    preference: Option<BackendKind>,
) -> Vec<BackendKind> {
    match preference {
        None => order.to_vec(),
        Some(preferred) => {
            let mut out = vec![preferred];
            out.extend(order.iter().copied().filter(|k| *k != preferred));
            out
        }
    }
}

// ── Core walk ────────────────────────────────────────────────────────────

/// Walk the candidate backends over already-loaded document bytes.
///
/// 1. Skip unavailable candidates; record hard open failures and advance.
/// 2. Score every page of a structural success and fold it into the running
///    per-page best (strictly higher score wins, ties keep the earlier
///    attempt).
/// 3. Stop early when the merged aggregate clears the acceptance threshold.
/// 4. Candidates exhausted: return the best assembly, marked partial, unless
///    nothing ever opened the document, which is [`PdfOpsError::DocumentUnreadable`].
pub(crate) fn orchestrate(
    bytes: &[u8],
    path: &Path,
    backends: &[Box<dyn ExtractionBackend>],
    config: &Config,
) -> Result<ExtractionResult, PdfOpsError> {
    let mut attempts: Vec<AttemptReport> = Vec::new();
    let mut best: Vec<Page> = Vec::new();
    let mut metadata: Option<DocumentMetadata> = None;
    let mut last_failure: Option<String> = None;
    let mut opened_any = false;
    let mut accepted = false;

    for backend in backends {
        let kind = backend.kind();

        if !backend.is_available() {
            debug!(backend = %kind, "backend unavailable, skipping");
            attempts.push(AttemptReport {
                backend: kind,
                aggregate: 0.0,
                outcome: AttemptOutcome::Unavailable,
            });
            continue;
        }

        info!(backend = %kind, path = %path.display(), "attempting extraction");
        let raw = match backend.extract(bytes) {
            Ok(raw) => raw,
            Err(failure) => {
                warn!(backend = %kind, detail = %failure.detail, "backend could not open document");
                last_failure = Some(failure.detail.clone());
                if let Some(progress) = &config.progress {
                    progress.on_backend_attempt(kind, "open-failed");
                }
                attempts.push(AttemptReport {
                    backend: kind,
                    aggregate: 0.0,
                    outcome: AttemptOutcome::OpenFailed {
                        detail: failure.detail,
                    },
                });
                continue;
            }
        };

        opened_any = true;
        if metadata.is_none() {
            metadata = raw.metadata.clone();
        }

        let scored: Vec<Page> = raw
            .pages
            .into_iter()
            .enumerate()
            .map(|(i, raw_page)| {
                let score = score_page(&raw_page.text);
                Page {
                    number: i as u32 + 1,
                    text: raw_page.text,
                    layout: None,
                    score,
                    backend: kind,
                    error: raw_page.error,
                }
            })
            .collect();

        let own_scores: Vec<f64> = scored.iter().map(|p| p.score.value).collect();
        let attempt_aggregate = passing_ratio(&own_scores, config.page_score_floor);
        merge_attempt(&mut best, scored);

        let merged_scores: Vec<f64> = best.iter().map(|p| p.score.value).collect();
        let merged_aggregate = passing_ratio(&merged_scores, config.page_score_floor);
        accepted = merged_aggregate >= config.accept_ratio;

        debug!(
            backend = %kind,
            attempt_aggregate,
            merged_aggregate,
            accepted,
            "attempt scored"
        );
        if let Some(progress) = &config.progress {
            progress.on_backend_attempt(kind, if accepted { "accepted" } else { "below-threshold" });
        }

        attempts.push(AttemptReport {
            backend: kind,
            aggregate: attempt_aggregate,
            outcome: if accepted {
                AttemptOutcome::Accepted
            } else {
                AttemptOutcome::BelowThreshold
            },
        });

        if accepted {
            break;
        }
    }

    if !opened_any {
        let tried = attempts
            .iter()
            .filter(|a| matches!(a.outcome, AttemptOutcome::OpenFailed { .. }))
            .count();
        return Err(PdfOpsError::DocumentUnreadable {
            path: path.to_path_buf(),
            tried,
            detail: last_failure
                .unwrap_or_else(|| "no extraction backend is available".to_string()),
        });
    }

    Ok(assemble(best, metadata, attempts, accepted, config))
}

/// Fold a scored attempt into the running per-page best. The candidate list
/// is positional; indexes beyond the current best extend it.
fn merge_attempt(best: &mut Vec<Page>, candidate: Vec<Page>) {
    for page in candidate {
        let idx = page.number as usize - 1;
        if idx < best.len() {
            if page.score.value > best[idx].score.value {
                best[idx] = page;
            }
        } else {
            best.push(page);
        }
    }
}

fn assemble(
    mut pages: Vec<Page>,
    metadata: Option<DocumentMetadata>,
    attempts: Vec<AttemptReport>,
    accepted: bool,
    config: &Config,
) -> ExtractionResult {
    let mut metadata = metadata.unwrap_or_default();

    // Results stay contiguous: if metadata declares more pages than any
    // backend produced, the gap is padded with explicitly-missing pages.
    let mut missing = 0usize;
    while (pages.len() as u32) < metadata.page_count {
        let number = pages.len() as u32 + 1;
        pages.push(Page {
            number,
            text: String::new(),
            layout: None,
            score: score_page(""),
            backend: attempts
                .last()
                .map(|a| a.backend)
                .unwrap_or(BackendKind::Lopdf),
            error: Some(PageError::MissingText { page: number }),
        });
        missing += 1;
    }
    metadata.page_count = pages.len() as u32;

    if config.layout_hints {
        for page in &mut pages {
            page.layout = Some(analyze_layout(&page.text));
        }
    }

    let scores: Vec<f64> = pages.iter().map(|p| p.score.value).collect();
    let aggregate_quality = passing_ratio(&scores, config.page_score_floor);
    let passing = pages
        .iter()
        .filter(|p| p.score.passes(config.page_score_floor))
        .count();
    if let Some(progress) = &config.progress {
        progress.on_pages_ready(passing, pages.len());
    }

    let partial_reason = if missing > 0 {
        Some(format!(
            "{missing} of {} declared pages produced no text in any backend",
            pages.len()
        ))
    } else if !accepted {
        Some(format!(
            "aggregate quality {:.2} never reached the acceptance threshold {:.2} \
             across {} attempt(s)",
            aggregate_quality,
            config.accept_ratio,
            attempts.len()
        ))
    } else {
        None
    };

    info!(
        pages = pages.len(),
        aggregate = aggregate_quality,
        partial = partial_reason.is_some(),
        attempts = attempts.len(),
        "extraction assembled"
    );

    ExtractionResult {
        pages,
        metadata,
        aggregate_quality,
        partial: partial_reason.is_some(),
        partial_reason,
        attempts,
    }
}
