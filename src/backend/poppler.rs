//! Extraction through the external poppler `pdftotext` binary.
//!
//! Last in the priority order and the most forgiving of broken documents.
//! Bytes are spooled to a temp file because the binary wants a path; output
//! is requested on stdout where poppler separates pages with form feeds.

use super::{
    normalise_page_texts, structural_view, BackendFailure, BackendKind, ExtractionBackend,
    RawExtraction,
};
use std::io::Write;
use std::process::Command;
use tracing::debug;

pub struct PdftotextBackend;

impl PdftotextBackend {
    /// Probe for the binary. `-v` prints the version banner and exits, so a
    /// successful spawn is all the evidence needed.
    pub fn binary_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|out| out.status.success() || !out.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl ExtractionBackend for PdftotextBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Pdftotext
    }

    fn is_available(&self) -> bool {
        Self::binary_available()
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendFailure> {
        let fail = |detail: String| BackendFailure {
            kind: BackendKind::Pdftotext,
            detail,
        };

        let mut tmp = tempfile::NamedTempFile::new()
            .map_err(|e| fail(format!("could not create temp file: {e}")))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.flush())
            .map_err(|e| fail(format!("could not spool document to temp file: {e}")))?;

        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(tmp.path())
            .arg("-")
            .output()
            .map_err(|e| fail(format!("could not run pdftotext: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "pdftotext exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        let (declared, metadata) = structural_view(bytes);
        let chunks: Vec<String> = text.split('\x0C').map(str::to_string).collect();
        debug!(chunks = chunks.len(), declared, "pdftotext output re-split");

        Ok(RawExtraction {
            kind: BackendKind::Pdftotext,
            pages: normalise_page_texts(chunks, declared),
            metadata,
        })
    }
}
