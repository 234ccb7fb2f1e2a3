//! Prose helpers shared by the splitter, ledger and context aggregator.

use std::sync::LazyLock;

use regex::Regex;

use super::markers::{TokenKind, tokenize};

/// Paragraphs of the narrative log shorter than this are treated as filler
/// (auto-generated "N words written" lines) when picking recent entries.
pub const MIN_SUMMARY_PARAGRAPH_WORDS: usize = 15;

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Count whitespace-separated words, ignoring every `INK` marker.
pub fn count_prose_words(text: &str) -> u32 {
    tokenize(text)
        .iter()
        .filter(|token| token.kind == TokenKind::Text)
        .map(|token| token.raw.split_whitespace().count() as u32)
        .sum()
}

/// Collapse runs of three or more newlines into a single blank line.
pub fn collapse_blank_runs(text: &str) -> String {
    BLANK_RUN_RE.replace_all(text, "\n\n").into_owned()
}

/// Keep the last `n` paragraphs of the narrative log.
///
/// Substantive paragraphs are preferred; when none qualify the last `n` of all
/// paragraphs are returned so a young book still gets some history.
pub fn truncate_summary(text: &str, n: usize) -> String {
    let all: Vec<&str> = paragraphs(text);
    let substantive: Vec<&str> = all
        .iter()
        .filter(|p| p.split_whitespace().count() >= MIN_SUMMARY_PARAGRAPH_WORDS)
        .copied()
        .collect();

    let pool = if substantive.is_empty() {
        &all
    } else {
        &substantive
    };
    let start = pool.len().saturating_sub(n);
    pool[start..].join("\n\n")
}

/// Keep the trailing paragraphs of `text` that fit in `max_words`.
///
/// The last paragraph is always kept, even when it alone exceeds the cap.
pub fn truncate_to_last_words(text: &str, max_words: u32) -> String {
    let paras = paragraphs(text);
    let mut accumulated: u32 = 0;
    let mut start_idx = paras.len();

    for (i, para) in paras.iter().enumerate().rev() {
        let words = count_prose_words(para);
        if accumulated + words > max_words && start_idx < paras.len() {
            break;
        }
        accumulated += words;
        start_idx = i;
    }

    paras[start_idx..].join("\n\n")
}

fn paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_skips_markers() {
        let text = "<!-- INK:NEW:START -->\nOne two three.\n<!-- INK: tighten -->\n<!-- INK:NEW:END -->";
        assert_eq!(count_prose_words(text), 3);
    }

    #[test]
    fn summary_prefers_substantive_paragraphs() {
        let long = "The keeper climbs the stair and finds the lamp already lit by someone who should not be there at all.";
        let text = format!("{long}\n\nSession 1 — 10 words written.\n\n{long} Again.");
        let truncated = truncate_summary(&text, 1);
        assert!(truncated.ends_with("Again."));
        assert!(!truncated.contains("Session 1"));
    }

    #[test]
    fn summary_falls_back_to_short_paragraphs() {
        let text = "a\n\nb\n\nc";
        assert_eq!(truncate_summary(text, 2), "b\n\nc");
    }

    #[test]
    fn last_words_keeps_trailing_paragraphs() {
        let text = "one two three\n\nfour five\n\nsix";
        assert_eq!(truncate_to_last_words(text, 3), "four five\n\nsix");
    }

    #[test]
    fn last_words_always_keeps_final_paragraph() {
        let text = "short\n\nthis final paragraph is long";
        assert_eq!(truncate_to_last_words(text, 2), "this final paragraph is long");
    }

    #[test]
    fn collapse_keeps_single_blank_lines() {
        assert_eq!(collapse_blank_runs("a\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
    }
}
