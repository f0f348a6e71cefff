//! Convert a PDF to text, markdown, or JSON through the full pipeline:
//! orchestrated extraction, rendering, guarded write.

use super::WritePolicy;
use crate::backend::BackendKind;
use crate::config::Config;
use crate::error::PdfOpsError;
use crate::extract::{self, AttemptReport};
use crate::guard::IntegrityGuard;
use crate::render::{self, OutputFormat};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Consumed by [`convert`].
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Explicit format; inferred from the target extension when `None`,
    /// falling back to markdown.
    pub format: Option<OutputFormat>,
    /// Backend preference promoted to the front of the candidate order.
    pub backend: Option<BackendKind>,
    pub policy: WritePolicy,
}

/// Outcome of a conversion, including the extraction diagnostics a caller
/// needs to judge the output without re-reading it.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertReport {
    pub source: PathBuf,
    pub target: PathBuf,
    pub format: OutputFormat,
    pub bytes: usize,
    pub hash: String,
    pub backup: Option<PathBuf>,
    pub pages: u32,
    pub aggregate_quality: f64,
    pub partial: bool,
    pub partial_reason: Option<String>,
    /// Backend attempt history, in attempt order.
    pub attempts: Vec<AttemptReport>,
}

/// Extract `request.source`, render it, and write the result through the
/// guard. Low extraction quality does not fail the conversion; it is
/// reported through `partial` and the attempt history.
pub async fn convert(
    request: ConvertRequest,
    guard: &IntegrityGuard,
    config: &Config,
) -> Result<ConvertReport, PdfOpsError> {
    let format = request
        .format
        .or_else(|| OutputFormat::infer_from_path(&request.target))
        .unwrap_or(OutputFormat::Markdown);

    let result = extract::extract_preferring(&request.source, request.backend, config).await?;
    let rendered = render::render(&result, format, config)?;

    let record = guard
        .guarded_write(
            &request.target,
            rendered.as_bytes(),
            request.policy.overwrite,
            request.policy.force,
        )
        .await?;

    info!(
        source = %request.source.display(),
        target = %record.path.display(),
        format = %format,
        partial = result.partial,
        "conversion complete"
    );
    Ok(ConvertReport {
        source: request.source,
        target: record.path,
        format,
        bytes: rendered.len(),
        hash: record.hash,
        backup: record.backup,
        pages: result.pages.len() as u32,
        aggregate_quality: result.aggregate_quality,
        partial: result.partial,
        partial_reason: result.partial_reason,
        attempts: result.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::pdf_with_pages_titled;

    #[tokio::test]
    async fn converts_to_markdown_with_inferred_format() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.pdf");
        tokio::fs::write(
            &source,
            pdf_with_pages_titled(&["INTRODUCTION", "Plain body text on page two"], Some("Doc")),
        )
        .await
        .unwrap();
        let target = dir.path().join("doc.md");

        let report = convert(
            ConvertRequest {
                source,
                target: target.clone(),
                format: None,
                backend: None,
                policy: WritePolicy::default(),
            },
            &IntegrityGuard::new(),
            &Config::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.format, OutputFormat::Markdown);
        assert_eq!(report.pages, 2);
        assert!(!report.attempts.is_empty());
        let written = tokio::fs::read_to_string(&target).await.unwrap();
        assert!(written.contains("INTRODUCTION"));
    }

    #[tokio::test]
    async fn refuses_existing_target_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.pdf");
        tokio::fs::write(&source, pdf_with_pages_titled(&["text"], None))
            .await
            .unwrap();
        let target = dir.path().join("out.txt");
        tokio::fs::write(&target, b"keep me").await.unwrap();

        let err = convert(
            ConvertRequest {
                source,
                target: target.clone(),
                format: None,
                backend: None,
                policy: WritePolicy::default(),
            },
            &IntegrityGuard::new(),
            &Config::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PdfOpsError::DestinationExists { .. }));
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"keep me");
    }
}
