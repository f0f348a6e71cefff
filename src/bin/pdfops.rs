//! CLI binary for edgequake-pdfops.
//!
//! A thin shim over the library crate that maps subcommands and flags
//! to library calls and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_pdfops::{
    convert, extract_pages, extract_preferring, info, merge, render, run_batch, search, split,
    BackendKind, BatchOutcome, BatchRequest, Config, ConfirmationProvider, ConvertReport,
    ConvertRequest, ExtractionResult, IntegrityGuard, MergeRequest, MutationReport,
    OperationProgress, OutputFormat, PageSelection, PageSeparator, PagesRequest, SearchRequest,
    SharedProgress, SplitRequest, WritePolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner for single documents that becomes a
/// real progress bar once a batch announces its size. Batch workers fire
/// events concurrently, so everything goes through the one [`ProgressBar`],
/// which serialises rendering internally.
struct CliProgress {
    bar: ProgressBar,
    /// Print a log line per backend attempt. Off in batch mode, where
    /// interleaved attempt lines from parallel workers are just noise.
    attempt_lines: bool,
}

impl CliProgress {
    fn new(attempt_lines: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Working");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar, attempt_lines })
    }

    /// Switch to the full progress-bar style once the batch size is known.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl OperationProgress for CliProgress {
    fn on_document_started(&self, path: &Path) {
        self.bar.set_message(format!("reading {}", path.display()));
    }

    fn on_backend_attempt(&self, backend: BackendKind, outcome: &str) {
        if !self.attempt_lines {
            return;
        }
        let glyph = match outcome {
            "accepted" => green("✓"),
            "open-failed" => red("✗"),
            _ => cyan("⚠"),
        };
        self.bar
            .println(format!("  {glyph} {backend}  {}", dim(outcome)));
    }

    fn on_pages_ready(&self, passing: usize, total: usize) {
        self.bar
            .set_message(format!("{passing}/{total} pages passed the quality floor"));
    }

    fn on_batch_started(&self, total: usize) {
        self.activate_bar(total);
    }

    fn on_batch_item(&self, _done: usize, _total: usize, path: &Path) {
        if let Some(name) = path.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
        self.bar.inc(1);
    }
}

// ── Interactive overwrite confirmation ───────────────────────────────────────

/// Asks on the terminal before the guard replaces a file whose content this
/// session has never seen. Only installed when stdin and stderr are TTYs;
/// unattended runs keep the refusing default and must pass --force.
struct PromptConfirm;

impl ConfirmationProvider for PromptConfirm {
    fn confirm_overwrite(&self, path: &Path) -> bool {
        eprint!(
            "{} was not written by this run. Replace it? [y/N] ",
            bold(&path.display().to_string())
        );
        let _ = io::stderr().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text to stdout
  pdfops extract report.pdf

  # Convert to Markdown with YAML front-matter
  pdfops convert report.pdf -o report.md --metadata

  # Prefer the poppler backend for a scanned document
  pdfops extract scan.pdf --backend pdftotext

  # Split into two parts next to the source
  pdfops split book.pdf 1-120 121-240

  # Merge chapters in order
  pdfops merge ch1.pdf ch2.pdf ch3.pdf -o book.pdf

  # Pull three pages into a new file
  pdfops pages book.pdf 5,7,9 -o excerpt.pdf

  # Metadata, hashes, and per-page statistics
  pdfops info report.pdf --page-stats

  # Find a phrase with 60 characters of context
  pdfops search report.pdf "net revenue" --context 60

  # Convert a whole directory, four documents at a time
  pdfops batch docs/*.pdf -o out/ --format markdown

BACKENDS:
  Backend      Needs                    Best at
  ─────────    ──────────────────────   ──────────────────────────────
  pdf-extract  nothing (pure Rust)      embedded fonts, exotic CMaps
  lopdf        nothing (pure Rust)      speed, damaged files, metadata
  pdftotext    poppler-utils on PATH    multi-column layout fidelity

  The default cascade tries them in exactly that order, scores every page
  each backend produces, and keeps the best text per page.

SAFETY:
  Writes never touch an existing file unless --overwrite is given, and an
  overwrite always preserves the previous content in a <name>.backup
  sibling first. Replacing content this run has not itself written
  additionally requires confirmation (or --force). Every write goes
  through a temp file and an atomic rename.

ENVIRONMENT VARIABLES:
  PDFOPS_BACKEND      Preferred backend (pdf-extract, lopdf, pdftotext)
  PDFOPS_FORMAT       Output format (text, markdown, json)
  PDFOPS_SEPARATOR    Page separator (none, hr, comment, or custom text)
  PDFOPS_CONCURRENCY  Parallel documents in batch mode
  PDFOPS_QUIET        Suppress all output except errors
  PDFOPS_VERBOSE      Enable DEBUG-level logs
  RUST_LOG            Full tracing filter override (takes precedence)
"#;

/// Extract, convert, split, merge, and inspect PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdfops",
    version,
    about = "Extract, convert, split, merge, and inspect PDF documents",
    long_about = "Reliable PDF text extraction and safe document surgery. Extraction cascades \
over multiple backends and keeps the best-scoring text per page; every write is guarded by \
backups and atomic commits, so an interrupted run never corrupts a file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFOPS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFOPS_QUIET")]
    quiet: bool,

    /// Disable the progress display.
    #[arg(long, global = true, env = "PDFOPS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract text and print it, or write it to a file.
    Extract(ExtractArgs),
    /// Convert a PDF to text, Markdown, or JSON on disk.
    Convert(ConvertArgs),
    /// Split a PDF into parts along page ranges.
    Split(SplitArgs),
    /// Merge two or more PDFs into one.
    Merge(MergeArgs),
    /// Copy a page selection into a new PDF.
    Pages(PagesArgs),
    /// Print document metadata and integrity information.
    Info(InfoArgs),
    /// Search the extracted text for a phrase.
    Search(SearchArgs),
    /// Convert many PDFs into one output directory.
    Batch(BatchArgs),
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    /// PDF file to read.
    input: PathBuf,

    /// Write the output here instead of stdout (guarded write).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "text", env = "PDFOPS_FORMAT")]
    format: FormatArg,

    /// Backend to try first.
    #[arg(short, long, value_enum, env = "PDFOPS_BACKEND")]
    backend: Option<BackendArg>,

    /// Page separator: none, hr, comment, or a custom string.
    #[arg(long, default_value = "none", env = "PDFOPS_SEPARATOR")]
    separator: String,

    /// Prepend YAML front-matter with document metadata (markdown only).
    #[arg(long)]
    metadata: bool,

    /// Allow replacing an existing output file (a backup is kept).
    #[arg(long)]
    overwrite: bool,

    /// Overwrite even files this run has not itself written.
    #[arg(long)]
    force: bool,
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// PDF file to read.
    input: PathBuf,

    /// Output file. Format is inferred from its extension unless --format
    /// is given.
    #[arg(short, long)]
    output: PathBuf,

    /// Output format (otherwise inferred from the output extension).
    #[arg(short, long, value_enum, env = "PDFOPS_FORMAT")]
    format: Option<FormatArg>,

    /// Backend to try first.
    #[arg(short, long, value_enum, env = "PDFOPS_BACKEND")]
    backend: Option<BackendArg>,

    /// Page separator: none, hr, comment, or a custom string.
    #[arg(long, default_value = "none", env = "PDFOPS_SEPARATOR")]
    separator: String,

    /// Prepend YAML front-matter with document metadata (markdown only).
    #[arg(long)]
    metadata: bool,

    /// Allow replacing an existing output file (a backup is kept).
    #[arg(long)]
    overwrite: bool,

    /// Overwrite even files this run has not itself written.
    #[arg(long)]
    force: bool,

    /// Print the conversion report as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct SplitArgs {
    /// PDF file to split.
    input: PathBuf,

    /// Page ranges, one output file per range: 1-120 121-240, or 1,3,5.
    #[arg(required = true)]
    ranges: Vec<String>,

    /// Directory for the parts; next to the source when omitted.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Allow replacing existing part files (backups are kept).
    #[arg(long)]
    overwrite: bool,

    /// Overwrite even files this run has not itself written.
    #[arg(long)]
    force: bool,

    /// Print the mutation report as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct MergeArgs {
    /// PDF files to concatenate, in order.
    #[arg(required = true, num_args = 2..)]
    inputs: Vec<PathBuf>,

    /// The merged output file.
    #[arg(short, long)]
    output: PathBuf,

    /// Allow replacing an existing output file (a backup is kept).
    #[arg(long)]
    overwrite: bool,

    /// Overwrite even files this run has not itself written.
    #[arg(long)]
    force: bool,

    /// Print the mutation report as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct PagesArgs {
    /// PDF file to read.
    input: PathBuf,

    /// Pages to copy: all, 5, 3-15, or 1,3,5,7.
    pages: String,

    /// Output file; <stem>_pages.pdf next to the source when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Allow replacing an existing output file (a backup is kept).
    #[arg(long)]
    overwrite: bool,

    /// Overwrite even files this run has not itself written.
    #[arg(long)]
    force: bool,

    /// Print the mutation report as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct InfoArgs {
    /// PDF file to inspect.
    input: PathBuf,

    /// Also decode every page to report per-page text statistics.
    #[arg(long)]
    page_stats: bool,

    /// Print as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// PDF file to search.
    input: PathBuf,

    /// Text to look for (literal, not a regex).
    query: String,

    /// Match case exactly instead of ignoring it.
    #[arg(long)]
    case_sensitive: bool,

    /// Match whole words only.
    #[arg(short, long)]
    word: bool,

    /// Characters of context on each side of a match.
    #[arg(short, long, default_value_t = 40)]
    context: usize,

    /// Backend to try first.
    #[arg(short, long, value_enum, env = "PDFOPS_BACKEND")]
    backend: Option<BackendArg>,

    /// Print hits as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct BatchArgs {
    /// PDF files to convert.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the outputs are written into (created if missing).
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Output format for every document.
    #[arg(short, long, value_enum, default_value = "markdown", env = "PDFOPS_FORMAT")]
    format: FormatArg,

    /// Documents processed in parallel.
    #[arg(long, default_value_t = 4, env = "PDFOPS_CONCURRENCY")]
    concurrency: usize,

    /// Backend to try first.
    #[arg(short, long, value_enum, env = "PDFOPS_BACKEND")]
    backend: Option<BackendArg>,

    /// Allow replacing existing output files (backups are kept).
    #[arg(long)]
    overwrite: bool,

    /// Overwrite even files this run has not itself written.
    #[arg(long)]
    force: bool,

    /// Print the per-document reports as JSON instead of summary lines.
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    PdfExtract,
    Lopdf,
    Pdftotext,
}

impl From<BackendArg> for BackendKind {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::PdfExtract => BackendKind::PdfExtract,
            BackendArg::Lopdf => BackendKind::Lopdf,
            BackendArg::Pdftotext => BackendKind::Pdftotext,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Text,
    Markdown,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs would shred the progress display, so they are
    // reserved for --verbose runs; the bar and summaries carry the feedback.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.command.json_output();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // The interactive confirmer only makes sense on a terminal; everywhere
    // else the guard keeps its refusing default and --force is the answer.
    let guard = if io::stdin().is_terminal() && io::stderr().is_terminal() && !cli.quiet {
        Arc::new(IntegrityGuard::with_confirmer(Arc::new(PromptConfirm)))
    } else {
        Arc::new(IntegrityGuard::new())
    };

    let quiet = cli.quiet;
    match cli.command {
        Command::Extract(args) => cmd_extract(args, &guard, quiet, show_progress).await,
        Command::Convert(args) => cmd_convert(args, &guard, quiet, show_progress).await,
        Command::Split(args) => cmd_split(args, &guard, quiet).await,
        Command::Merge(args) => cmd_merge(args, &guard, quiet).await,
        Command::Pages(args) => cmd_pages(args, &guard, quiet).await,
        Command::Info(args) => cmd_info(args).await,
        Command::Search(args) => cmd_search(args, quiet, show_progress).await,
        Command::Batch(args) => cmd_batch(args, guard, quiet, show_progress).await,
    }
}

impl Command {
    /// True when the subcommand will print JSON to stdout, which must stay
    /// machine-clean.
    fn json_output(&self) -> bool {
        match self {
            Command::Extract(a) => a.output.is_none() && matches!(a.format, FormatArg::Json),
            Command::Convert(a) => a.json,
            Command::Split(a) => a.json,
            Command::Merge(a) => a.json,
            Command::Pages(a) => a.json,
            Command::Info(a) => a.json,
            Command::Search(a) => a.json,
            Command::Batch(a) => a.json,
        }
    }
}

// ── Subcommands ──────────────────────────────────────────────────────────────

async fn cmd_extract(
    args: ExtractArgs,
    guard: &IntegrityGuard,
    quiet: bool,
    show_progress: bool,
) -> Result<()> {
    let progress = show_progress.then(|| CliProgress::new(true));
    let config = build_config(&args.separator, args.metadata, progress.clone())?;
    let format: OutputFormat = args.format.into();

    if let Some(output) = args.output {
        let report = convert(
            ConvertRequest {
                source: args.input,
                target: output,
                format: Some(format),
                backend: args.backend.map(Into::into),
                policy: WritePolicy {
                    overwrite: args.overwrite,
                    force: args.force,
                },
            },
            guard,
            &config,
        )
        .await
        .context("Extraction failed")?;

        finish(&progress);
        if !quiet {
            print_convert_summary(&report);
        }
        return Ok(());
    }

    let result = extract_preferring(&args.input, args.backend.map(Into::into), &config)
        .await
        .context("Extraction failed")?;
    let rendered = render(&result, format, &config).context("Rendering failed")?;
    finish(&progress);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(rendered.as_bytes())
        .context("Failed to write to stdout")?;
    if !rendered.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }

    if !quiet {
        print_quality_summary(&result);
    }
    Ok(())
}

async fn cmd_convert(
    args: ConvertArgs,
    guard: &IntegrityGuard,
    quiet: bool,
    show_progress: bool,
) -> Result<()> {
    let progress = show_progress.then(|| CliProgress::new(true));
    let config = build_config(&args.separator, args.metadata, progress.clone())?;

    let report = convert(
        ConvertRequest {
            source: args.input,
            target: args.output,
            format: args.format.map(Into::into),
            backend: args.backend.map(Into::into),
            policy: WritePolicy {
                overwrite: args.overwrite,
                force: args.force,
            },
        },
        guard,
        &config,
    )
    .await
    .context("Conversion failed")?;

    finish(&progress);
    if args.json {
        print_json(&report)?;
    } else if !quiet {
        print_convert_summary(&report);
    }
    Ok(())
}

async fn cmd_split(args: SplitArgs, guard: &IntegrityGuard, quiet: bool) -> Result<()> {
    let ranges = args
        .ranges
        .iter()
        .map(|s| parse_selection(s))
        .collect::<Result<Vec<_>>>()?;

    let report = split(
        SplitRequest {
            source: args.input,
            ranges,
            output_dir: args.output_dir,
            policy: WritePolicy {
                overwrite: args.overwrite,
                force: args.force,
            },
        },
        guard,
    )
    .await
    .context("Split failed")?;

    if args.json {
        print_json(&report)?;
    } else if !quiet {
        print_mutation_summary(&report);
    }
    Ok(())
}

async fn cmd_merge(args: MergeArgs, guard: &IntegrityGuard, quiet: bool) -> Result<()> {
    let report = merge(
        MergeRequest {
            inputs: args.inputs,
            target: args.output,
            policy: WritePolicy {
                overwrite: args.overwrite,
                force: args.force,
            },
        },
        guard,
    )
    .await
    .context("Merge failed")?;

    if args.json {
        print_json(&report)?;
    } else if !quiet {
        print_mutation_summary(&report);
    }
    Ok(())
}

async fn cmd_pages(args: PagesArgs, guard: &IntegrityGuard, quiet: bool) -> Result<()> {
    let selection = parse_selection(&args.pages)?;

    let report = extract_pages(
        PagesRequest {
            source: args.input,
            selection,
            target: args.output,
            policy: WritePolicy {
                overwrite: args.overwrite,
                force: args.force,
            },
        },
        guard,
    )
    .await
    .context("Page extraction failed")?;

    if args.json {
        print_json(&report)?;
    } else if !quiet {
        print_mutation_summary(&report);
    }
    Ok(())
}

async fn cmd_info(args: InfoArgs) -> Result<()> {
    let doc = info(&args.input, args.page_stats)
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        return print_json(&doc);
    }

    println!("File:         {}", doc.path.display());
    println!("Size:         {} bytes", doc.file_size);
    println!("SHA-256:      {}", doc.hash);
    if let Some(ref t) = doc.metadata.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = doc.metadata.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = doc.metadata.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", doc.metadata.page_count);
    if let Some(ref v) = doc.metadata.pdf_version {
        println!("PDF Version:  {}", v);
    }
    println!("Encrypted:    {}", doc.encrypted);
    if let Some(ref p) = doc.metadata.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = doc.metadata.creator {
        println!("Creator:      {}", c);
    }

    if let Some(stats) = doc.page_stats {
        println!();
        println!("  page   characters");
        for s in stats {
            let note = if s.empty { dim("  (no text)") } else { String::new() };
            println!("  {:>4}   {:>10}{}", s.page, s.characters, note);
        }
    }
    Ok(())
}

async fn cmd_search(args: SearchArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress = show_progress.then(|| CliProgress::new(false));
    let config = build_config("none", false, progress.clone())?;

    let query = args.query.clone();
    let hits = search(
        SearchRequest {
            source: args.input,
            query: args.query,
            case_sensitive: args.case_sensitive,
            whole_word: args.word,
            context: args.context,
            backend: args.backend.map(Into::into),
        },
        &config,
    )
    .await
    .context("Search failed")?;
    finish(&progress);

    if args.json {
        return print_json(&hits);
    }

    for hit in &hits {
        println!("{}  {}", bold(&format!("p.{:>3}", hit.page)), hit.context);
    }
    if !quiet {
        eprintln!(
            "{} {} match(es) for \"{query}\"",
            if hits.is_empty() { cyan("⚠") } else { green("✔") },
            hits.len(),
        );
    }
    Ok(())
}

async fn cmd_batch(
    args: BatchArgs,
    guard: Arc<IntegrityGuard>,
    quiet: bool,
    show_progress: bool,
) -> Result<()> {
    let progress = show_progress.then(|| CliProgress::new(false));

    let mut builder = Config::builder().concurrency(args.concurrency);
    if let Some(pref) = args.backend {
        let pref: BackendKind = pref.into();
        let mut order = vec![pref];
        order.extend(
            BackendKind::default_order()
                .into_iter()
                .filter(|k| *k != pref),
        );
        builder = builder.backend_order(order);
    }
    if let Some(cb) = progress.clone() {
        builder = builder.progress(cb as SharedProgress);
    }
    let config = builder.build().context("Invalid configuration")?;

    let reports = run_batch(
        BatchRequest {
            sources: args.inputs,
            output_dir: args.output_dir,
            format: args.format.into(),
            policy: WritePolicy {
                overwrite: args.overwrite,
                force: args.force,
            },
        },
        guard,
        &config,
    )
    .await
    .context("Batch run failed")?;
    finish(&progress);

    if args.json {
        return print_json(&reports);
    }

    let mut failed = 0usize;
    for report in &reports {
        match &report.outcome {
            BatchOutcome::Converted {
                target,
                aggregate_quality,
                partial,
                ..
            } => {
                println!(
                    "{} {}  →  {}  {}",
                    if *partial { cyan("⚠") } else { green("✓") },
                    report.source.display(),
                    bold(&target.display().to_string()),
                    dim(&format!("quality {aggregate_quality:.2}")),
                );
            }
            BatchOutcome::Failed { error } => {
                failed += 1;
                println!(
                    "{} {}  {}",
                    red("✗"),
                    report.source.display(),
                    red(error)
                );
            }
        }
    }

    if !quiet {
        let converted = reports.len() - failed;
        if failed == 0 {
            eprintln!(
                "{} {} documents converted",
                green("✔"),
                bold(&converted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents converted  ({} failed)",
                if converted == 0 { red("✘") } else { cyan("⚠") },
                bold(&converted.to_string()),
                reports.len(),
                red(&failed.to_string()),
            );
        }
    }
    Ok(())
}

// ── Shared plumbing ──────────────────────────────────────────────────────────

/// Map shared CLI flags to a library `Config`.
fn build_config(
    separator: &str,
    metadata: bool,
    progress: Option<Arc<CliProgress>>,
) -> Result<Config> {
    let mut builder = Config::builder()
        .separator(parse_separator(separator))
        .include_metadata(metadata);
    if let Some(cb) = progress {
        builder = builder.progress(cb as SharedProgress);
    }
    builder.build().context("Invalid configuration")
}

fn finish(progress: &Option<Arc<CliProgress>>) {
    if let Some(p) = progress {
        p.finish();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

fn print_convert_summary(report: &ConvertReport) {
    eprintln!(
        "{} {}  →  {}  {}",
        if report.partial { cyan("⚠") } else { green("✔") },
        report.source.display(),
        bold(&report.target.display().to_string()),
        dim(&format!(
            "{} pages, quality {:.2}",
            report.pages, report.aggregate_quality
        )),
    );
    if let Some(reason) = &report.partial_reason {
        eprintln!("   {}", cyan(reason));
    }
    if let Some(backup) = &report.backup {
        eprintln!(
            "   previous content saved to {}",
            dim(&backup.display().to_string())
        );
    }
}

fn print_quality_summary(result: &ExtractionResult) {
    let backends: Vec<String> = result
        .backends_used()
        .iter()
        .map(|b| b.to_string())
        .collect();
    eprintln!(
        "{} {} pages, quality {:.2}  {}",
        if result.partial { cyan("⚠") } else { green("✔") },
        result.pages.len(),
        result.aggregate_quality,
        dim(&format!("via {}", backends.join(", "))),
    );
    if let Some(reason) = &result.partial_reason {
        eprintln!("   {}", cyan(reason));
    }
}

fn print_mutation_summary(report: &MutationReport) {
    for w in &report.written {
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(&w.path.display().to_string()),
            dim(&format!("{} pages, {} bytes", w.pages, w.bytes)),
        );
        if let Some(backup) = &w.backup {
            eprintln!(
                "   previous content saved to {}",
                dim(&backup.display().to_string())
            );
        }
    }
}

/// Parse a page-selection string into `PageSelection`.
fn parse_selection(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: u32 = start.trim().parse().context("Invalid start page in range")?;
        let end: u32 = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<u32> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<u32>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &pages {
            if p < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
            }
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: u32 = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

/// Parse `--separator` into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        custom => PageSeparator::Custom(custom.to_string()),
    }
}
