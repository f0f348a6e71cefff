//! Deterministic quality scoring for extracted page text.
//!
//! ## Why score at all?
//!
//! Extraction backends fail quietly far more often than they fail loudly: a
//! document with broken font encodings "succeeds" and yields pages of U+FFFD
//! replacement runs, or a single column of a two-column layout, or nothing
//! at all. The orchestrator needs a cheap, text-only signal to decide whether
//! a backend's output is trustworthy or whether the next backend should get a
//! turn.
//!
//! Every heuristic here is a pure function of the page text, with no file
//! system or global state involved. Identical input always produces an
//! identical [`QualityScore`], which is what makes the orchestrator's
//! best-of-retry comparison across backends race-free and testable.
//!
//! Each heuristic contributes a [`DefectFlag`] plus a fixed penalty; the
//! final score is `1.0 − Σ penalties`, floored at zero. The constants were
//! lifted from the thresholds that held up in practice (empty and near-empty
//! pages, >10 % replacement characters, implausible mean token length) and
//! live in one place so they can be recalibrated against a corpus.

use serde::{Deserialize, Serialize};

/// Pages shorter than this (after trimming) are suspicious: real prose pages
/// rarely carry fewer than a sentence of text.
const NEAR_EMPTY_LIMIT: usize = 40;
const NEAR_EMPTY_PENALTY: f64 = 0.6;

/// Replacement-character ratio above which the encoding is considered broken.
const REPLACEMENT_RATIO_LIMIT: f64 = 0.10;
const REPLACEMENT_RATIO_PENALTY: f64 = 0.4;

/// A run of consecutive replacement/control characters this long signals a
/// decoder falling over mid-stream, even when the overall ratio stays low.
const BAD_RUN_LIMIT: usize = 3;
const BAD_RUN_PENALTY: f64 = 0.2;

/// Printable-to-total ratio below which the page is mostly junk bytes.
const PRINTABLE_RATIO_LIMIT: f64 = 0.90;
const PRINTABLE_RATIO_PENALTY: f64 = 0.3;

/// Mean token length outside this band is not natural-language text.
/// Applied only once there are enough tokens for the mean to be meaningful.
const TOKEN_LEN_MIN: f64 = 2.0;
const TOKEN_LEN_MAX: f64 = 12.0;
const TOKEN_SAMPLE_MIN: usize = 5;
const TOKEN_LEN_PENALTY: f64 = 0.25;

/// A defect detected by one scoring heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefectFlag {
    /// Page text is empty or whitespace-only.
    EmptyPage,
    /// Page text is shorter than a plausible sentence.
    SuspiciouslyShort,
    /// High ratio of U+FFFD replacement characters.
    GarbledEncoding,
    /// A long consecutive run of replacement/control characters.
    ReplacementRun,
    /// Low ratio of printable characters overall.
    NonPrintable,
    /// Mean token length outside natural-language bounds.
    ImplausibleTokens,
}

/// Heuristic confidence that a page's extracted text is faithful content.
///
/// `value` is bounded to `0.0..=1.0`; `flags` names every heuristic that
/// fired. Computed from text alone; see the module docs for why that
/// property matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub value: f64,
    pub flags: Vec<DefectFlag>,
}

impl QualityScore {
    /// Whether this score clears the given per-page floor.
    pub fn passes(&self, floor: f64) -> bool {
        self.value >= floor
    }
}

/// Score one page of extracted text.
pub fn score_page(text: &str) -> QualityScore {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return QualityScore {
            value: 0.0,
            flags: vec![DefectFlag::EmptyPage],
        };
    }

    let mut total = 0usize;
    let mut printable = 0usize;
    let mut replacements = 0usize;
    let mut run = 0usize;
    let mut longest_run = 0usize;

    for ch in trimmed.chars() {
        total += 1;
        let is_replacement = ch == '\u{FFFD}';
        let is_control = ch.is_control() && !matches!(ch, '\n' | '\r' | '\t');
        if is_replacement {
            replacements += 1;
        }
        if !is_control && !is_replacement {
            printable += 1;
        }
        if is_replacement || is_control {
            run += 1;
            longest_run = longest_run.max(run);
        } else {
            run = 0;
        }
    }

    let mut flags = Vec::new();
    let mut penalty = 0.0;

    if total < NEAR_EMPTY_LIMIT {
        flags.push(DefectFlag::SuspiciouslyShort);
        penalty += NEAR_EMPTY_PENALTY;
    }
    if replacements as f64 / total as f64 > REPLACEMENT_RATIO_LIMIT {
        flags.push(DefectFlag::GarbledEncoding);
        penalty += REPLACEMENT_RATIO_PENALTY;
    }
    if longest_run >= BAD_RUN_LIMIT {
        flags.push(DefectFlag::ReplacementRun);
        penalty += BAD_RUN_PENALTY;
    }
    if (printable as f64 / total as f64) < PRINTABLE_RATIO_LIMIT {
        flags.push(DefectFlag::NonPrintable);
        penalty += PRINTABLE_RATIO_PENALTY;
    }

    let token_lengths: Vec<usize> = trimmed
        .split_whitespace()
        .map(|t| t.chars().count())
        .collect();
    if token_lengths.len() >= TOKEN_SAMPLE_MIN {
        let mean = token_lengths.iter().sum::<usize>() as f64 / token_lengths.len() as f64;
        if !(TOKEN_LEN_MIN..=TOKEN_LEN_MAX).contains(&mean) {
            flags.push(DefectFlag::ImplausibleTokens);
            penalty += TOKEN_LEN_PENALTY;
        }
    }

    QualityScore {
        value: (1.0 - penalty).max(0.0),
        flags,
    }
}

/// Fraction of scores at or above `floor`. Empty input counts as zero so a
/// zero-page result is never mistaken for an accepted one.
pub fn passing_ratio(scores: &[f64], floor: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let passing = scores.iter().filter(|&&s| s >= floor).count();
    passing as f64 / scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_PAGE: &str = "The quarterly report covers revenue growth across all three \
        regions. Each section includes a comparison against the prior year and notes \
        the main drivers behind the change in operating margin.";

    #[test]
    fn clean_prose_scores_full() {
        let s = score_page(CLEAN_PAGE);
        assert_eq!(s.value, 1.0);
        assert!(s.flags.is_empty(), "unexpected flags: {:?}", s.flags);
    }

    #[test]
    fn empty_page_scores_zero() {
        for text in ["", "   ", "\n\t\n"] {
            let s = score_page(text);
            assert_eq!(s.value, 0.0);
            assert_eq!(s.flags, vec![DefectFlag::EmptyPage]);
        }
    }

    #[test]
    fn short_page_flagged() {
        let s = score_page("Page 4");
        assert!(s.flags.contains(&DefectFlag::SuspiciouslyShort));
        assert!(s.value < 1.0);
    }

    #[test]
    fn replacement_heavy_text_flagged() {
        let garbled = "\u{FFFD}\u{FFFD}\u{FFFD} broken \u{FFFD}\u{FFFD} stream \u{FFFD}\u{FFFD}\u{FFFD}";
        let s = score_page(garbled);
        assert!(s.flags.contains(&DefectFlag::GarbledEncoding));
        assert!(s.flags.contains(&DefectFlag::ReplacementRun));
        assert!(s.value < 0.5);
    }

    #[test]
    fn long_token_gibberish_flagged() {
        let glued = "abcdefghijklmnopqrst abcdefghijklmnopqrst abcdefghijklmnopqrst \
            abcdefghijklmnopqrst abcdefghijklmnopqrst abcdefghijklmnopqrst";
        let s = score_page(glued);
        assert!(s.flags.contains(&DefectFlag::ImplausibleTokens));
    }

    #[test]
    fn newlines_and_tabs_are_printable() {
        let text = "First paragraph of ordinary text here.\n\n\tIndented continuation \
            line that keeps the page comfortably above the short-page limit.";
        let s = score_page(text);
        assert!(!s.flags.contains(&DefectFlag::NonPrintable));
    }

    #[test]
    fn scoring_is_deterministic() {
        let garbled = "some \u{FFFD}\u{FFFD} partly \u{FFFD} broken page text";
        assert_eq!(score_page(garbled), score_page(garbled));
        assert_eq!(score_page(CLEAN_PAGE), score_page(CLEAN_PAGE));
    }

    #[test]
    fn penalties_floor_at_zero() {
        // Short + garbled + run + non-printable stacks past 1.0.
        let s = score_page("\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}");
        assert_eq!(s.value, 0.0);
    }

    #[test]
    fn passing_ratio_counts_floor_inclusive() {
        assert_eq!(passing_ratio(&[0.5, 0.4, 1.0, 0.9], 0.5), 0.75);
        assert_eq!(passing_ratio(&[], 0.5), 0.0);
    }

    #[test]
    fn passes_is_floor_inclusive() {
        let s = QualityScore {
            value: 0.5,
            flags: vec![],
        };
        assert!(s.passes(0.5));
        assert!(!s.passes(0.51));
    }
}
