//! Output rendering: plain text, structured markdown, and JSON.
//!
//! Markdown rendering applies a fixed sequence of small, pure rewrite rules
//! to each page. Order matters and is part of the contract: hyphenation is
//! repaired before heading detection (a broken word can end a line), headings
//! are promoted before bullets are normalised, whitespace cleanup runs last.
//! Each rule is a standalone function with its own tests.

use crate::config::Config;
use crate::error::PdfOpsError;
use crate::extract::ExtractionResult;
use crate::structure::heading_level;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Rendered output flavour for `convert` and `extract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Page texts joined with the configured separator, nothing else.
    Text,
    /// Headings promoted, bullets normalised, whitespace cleaned.
    Markdown,
    /// The full extraction result, scores and attempt history included.
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        }
    }

    /// File extension used when this crate names the output itself.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }

    /// Infer a format from an output path's extension. `None` for unknown
    /// or absent extensions; callers decide the fallback.
    pub fn infer_from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(OutputFormat::Text),
            "md" | "markdown" => Some(OutputFormat::Markdown),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render an extraction result in the requested format.
pub fn render(
    result: &ExtractionResult,
    format: OutputFormat,
    config: &Config,
) -> Result<String, PdfOpsError> {
    match format {
        OutputFormat::Text => Ok(render_joined(result, config, false)),
        OutputFormat::Markdown => Ok(render_joined(result, config, true)),
        OutputFormat::Json => serde_json::to_string_pretty(result)
            .map_err(|e| PdfOpsError::Internal(format!("serialising result: {e}"))),
    }
}

fn render_joined(result: &ExtractionResult, config: &Config, markdown: bool) -> String {
    let mut out = String::new();

    if markdown && config.include_metadata {
        out.push_str(&front_matter(result));
    }

    let mut first = true;
    for page in &result.pages {
        if !first {
            out.push_str(&config.separator.render(page.number));
        }
        first = false;
        let body = if markdown {
            markdown_page(&page.text)
        } else {
            page.text.trim().to_string()
        };
        out.push_str(&body);
    }

    if !out.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// YAML front-matter from document metadata; absent fields are omitted.
fn front_matter(result: &ExtractionResult) -> String {
    let meta = &result.metadata;
    let mut out = String::from("---\n");
    let mut field = |key: &str, value: &Option<String>| {
        if let Some(v) = value {
            out.push_str(&format!("{key}: {v}\n"));
        }
    };
    field("title", &meta.title);
    field("author", &meta.author);
    field("subject", &meta.subject);
    field("producer", &meta.producer);
    out.push_str(&format!("pages: {}\n", meta.page_count));
    out.push_str("---\n\n");
    out
}

/// The fixed markdown rule chain for one page of extracted text.
pub(crate) fn markdown_page(text: &str) -> String {
    let text = normalize_line_endings(text);
    let text = fix_hyphenation(&text);
    let text = promote_headings(&text);
    let text = normalize_bullets(&text);
    let text = strip_trailing_page_number(&text);
    let text = trim_trailing_space(&text);
    let text = collapse_blank_lines(&text);
    text.trim().to_string()
}

// ── Rules ────────────────────────────────────────────────────────────────

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

static HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])-\n([a-z])").unwrap());

/// Rejoin words the extractor broke across lines: "exam-\nple" → "example".
/// Restricted to lowercase on both sides so real compound hyphens at line
/// ends ("state-\nOf-the-art" style caps) survive.
fn fix_hyphenation(text: &str) -> String {
    HYPHEN_BREAK.replace_all(text, "$1$2").into_owned()
}

/// Prefix heading-looking lines with `##`/`###`. Lines already marked with
/// `#` are left alone.
fn promote_headings(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }
            match heading_level(line) {
                Some(2) => format!("## {}", line.trim()),
                Some(3) => format!("### {}", line.trim()),
                _ => line.to_string(),
            }
        })
        .collect();
    lines.join("\n")
}

static BULLET_GLYPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)[•▪◦‣·*]\s+").unwrap());

/// Normalise the bullet glyph zoo to markdown's "- ".
fn normalize_bullets(text: &str) -> String {
    BULLET_GLYPH.replace_all(text, "${1}- ").into_owned()
}

static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\d{1,4}\s*$").unwrap());

/// Drop a bare page-number footer, the last line of a page that is only a
/// small integer. Numbers inside the body are untouched.
fn strip_trailing_page_number(text: &str) -> String {
    TRAILING_NUMBER.replace(text.trim_end(), "").into_owned()
}

static TRAILING_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());

fn trim_trailing_space(text: &str) -> String {
    TRAILING_SPACE.replace_all(text, "").into_owned()
}

static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUN.replace_all(text, "\n\n").into_owned()
}
