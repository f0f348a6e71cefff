//! Batch conversion: a bounded worker pool over many documents.
//!
//! One task per document, end to end. Tasks share nothing mutable except the
//! guard's lock-protected session memory; a failure in one document is
//! recorded in its report and never stops the others. The pool is
//! `buffer_unordered`, so at most `Config::concurrency` documents are in
//! flight and reports surface as they finish.

use crate::backend::BackendKind;
use crate::config::Config;
use crate::error::PdfOpsError;
use crate::guard::IntegrityGuard;
use crate::ops::{convert, ConvertRequest, WritePolicy};
use crate::render::OutputFormat;
use futures::stream::StreamExt;
use futures::Stream;
use serde::Serialize;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};

/// Consumed by [`run_batch`] / [`batch_stream`].
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub sources: Vec<PathBuf>,
    /// Every output lands here, named `<stem>.<ext>` for the format.
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub policy: WritePolicy,
}

/// Per-document outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum BatchOutcome {
    Converted {
        target: PathBuf,
        aggregate_quality: f64,
        partial: bool,
        backends: Vec<BackendKind>,
    },
    Failed {
        error: String,
    },
}

impl DocumentReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Converted { .. })
    }
}

/// Boxed stream of reports in completion order.
pub type DocumentReportStream = Pin<Box<dyn Stream<Item = DocumentReport> + Send>>;

/// Convert every source and collect the reports, sorted by source path for
/// stable output. Individual failures are isolated into their reports; the
/// run itself only fails when the output directory cannot be created.
pub async fn run_batch(
    request: BatchRequest,
    guard: Arc<IntegrityGuard>,
    config: &Config,
) -> Result<Vec<DocumentReport>, PdfOpsError> {
    let total = request.sources.len();
    let progress = config.progress.clone();
    if let Some(progress) = &progress {
        progress.on_batch_started(total);
    }

    let mut stream = batch_stream(request, guard, config).await?;
    let mut reports = Vec::with_capacity(total);
    while let Some(report) = stream.next().await {
        if let Some(progress) = &progress {
            progress.on_batch_item(reports.len() + 1, total, &report.source);
        }
        reports.push(report);
    }

    reports.sort_by(|a, b| a.source.cmp(&b.source));
    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    info!(total, failed, "batch finished");
    Ok(reports)
}

/// Streaming form of [`run_batch`]: yields each report as its document
/// finishes, in completion order.
pub async fn batch_stream(
    request: BatchRequest,
    guard: Arc<IntegrityGuard>,
    config: &Config,
) -> Result<DocumentReportStream, PdfOpsError> {
    let BatchRequest {
        sources,
        output_dir,
        format,
        policy,
    } = request;
    tokio::fs::create_dir_all(&output_dir)
        .await
        .map_err(|e| PdfOpsError::WriteFailure {
            path: output_dir.clone(),
            source: e,
        })?;

    let concurrency = config.concurrency.max(1);
    let config = config.clone();
    let tasks = sources.into_iter().map(move |source| {
        let guard = guard.clone();
        let config = config.clone();
        let output_dir = output_dir.clone();
        async move { process_one(source, output_dir, format, policy, guard, config).await }
    });

    Ok(Box::pin(tokio_stream::iter(tasks).buffer_unordered(concurrency)))
}

async fn process_one(
    source: PathBuf,
    output_dir: PathBuf,
    format: OutputFormat,
    policy: WritePolicy,
    guard: Arc<IntegrityGuard>,
    config: Config,
) -> DocumentReport {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let target = output_dir.join(format!("{stem}.{}", format.extension()));

    let outcome = match convert(
        ConvertRequest {
            source: source.clone(),
            target,
            format: Some(format),
            backend: None,
            policy,
        },
        &guard,
        &config,
    )
    .await
    {
        Ok(report) => BatchOutcome::Converted {
            target: report.target,
            aggregate_quality: report.aggregate_quality,
            partial: report.partial,
            backends: report
                .attempts
                .iter()
                .map(|a| a.backend)
                .collect(),
        },
        Err(e) => {
            warn!(source = %source.display(), error = %e, "batch document failed");
            BatchOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    DocumentReport { source, outcome }
}
