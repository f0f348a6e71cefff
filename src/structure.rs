//! Text structure analysis: paragraph boundaries and heading detection over
//! extracted page text.
//!
//! Extraction strips typography, so structure has to be recovered from the
//! text itself. The heuristics here are deliberately conservative: a missed
//! heading degrades to a paragraph, a false positive rewrites body text as a
//! heading, and the second failure reads much worse. Used both for the layout
//! hints attached to [`crate::extract::Page`] and for markdown rendering.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structural hints recovered from one page of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutHints {
    /// Number of blank-line separated text blocks.
    pub paragraphs: usize,
    /// Heading-looking lines, in page order.
    pub headings: Vec<Heading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// Markdown depth this heading maps to: 2 for `##`, 3 for `###`.
    pub level: u8,
    pub text: String,
}

static NUMBERED_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)[.)]?\s+\S").unwrap()
});

/// One pass over a page of text.
pub fn analyze_layout(text: &str) -> LayoutHints {
    let paragraphs = text
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .count();

    let headings = text
        .lines()
        .filter_map(|line| {
            heading_level(line).map(|level| Heading {
                level,
                text: line.trim().to_string(),
            })
        })
        .collect();

    LayoutHints {
        paragraphs,
        headings,
    }
}

/// Heading classification for a single line, `None` for body text.
///
/// A line qualifies when it is short, free of sentence-ending punctuation,
/// and matches one of: `1.2`-style numbering (depth decides the level),
/// ALL CAPS, or Title Case with every word capitalised.
pub(crate) fn heading_level(line: &str) -> Option<u8> {
    let line = line.trim();
    if line.is_empty() || line.len() > 80 {
        return None;
    }
    if line.ends_with(['.', ',', ';', ':']) {
        return None;
    }
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ") {
        return None;
    }

    if let Some(caps) = NUMBERED_HEADING.captures(line) {
        let depth = caps[1].matches('.').count();
        return Some(if depth == 0 { 2 } else { 3 });
    }

    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }

    if line.len() <= 60 && letters.iter().all(|c| c.is_uppercase()) && letters.len() >= 3 {
        return Some(2);
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    if (1..=8).contains(&words.len())
        && words.iter().all(|w| {
            w.chars()
                .next()
                .map(|c| c.is_uppercase() || c.is_numeric())
                .unwrap_or(false)
        })
    {
        return Some(3);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_lines_are_headings() {
        assert_eq!(heading_level("1 Introduction"), Some(2));
        assert_eq!(heading_level("3) Results"), Some(2));
        assert_eq!(heading_level("2.4 Threat Model"), Some(3));
        assert_eq!(heading_level("1.2.3 Deep Nesting"), Some(3));
    }

    #[test]
    fn all_caps_lines_are_headings() {
        assert_eq!(heading_level("EXECUTIVE SUMMARY"), Some(2));
        assert_eq!(heading_level("APPENDIX B"), Some(2));
    }

    #[test]
    fn title_case_lines_are_headings() {
        assert_eq!(heading_level("Quality Assurance Report"), Some(3));
    }

    #[test]
    fn body_text_is_not_a_heading() {
        assert_eq!(heading_level("This sentence ends with a full stop."), None);
        assert_eq!(
            heading_level("a perfectly ordinary lowercase line of body text"),
            None
        );
        assert_eq!(heading_level("- A bullet item"), None);
        assert_eq!(heading_level(""), None);
        assert_eq!(heading_level("12345"), None);
    }

    #[test]
    fn long_lines_are_not_headings() {
        let long = "Word ".repeat(30);
        assert_eq!(heading_level(&long), None);
    }

    #[test]
    fn layout_counts_paragraphs_and_headings() {
        let text = "OVERVIEW\n\nFirst paragraph of prose.\n\nSecond paragraph,\nwrapped over two lines.\n\n1.1 Detail Section\n\nThird block.";
        let hints = analyze_layout(text);
        assert_eq!(hints.paragraphs, 5);
        assert_eq!(hints.headings.len(), 2);
        assert_eq!(hints.headings[0].text, "OVERVIEW");
        assert_eq!(hints.headings[0].level, 2);
        assert_eq!(hints.headings[1].level, 3);
    }

    #[test]
    fn empty_text_yields_empty_hints() {
        assert_eq!(analyze_layout(""), LayoutHints::default());
    }
}
