//! Marker tokenizer and instruction extractor for the rolling review document.
//!
//! Two kinds of inline comment share the `INK` tag:
//!
//! - author directives: `<!-- INK: make it tenser -->` (one space after the colon)
//! - structural markers written by the engine: `<!-- INK:NEW:START -->`,
//!   `<!-- INK:REWORKED:END -->`, `<!-- INK:PAGE:4 -->` (no space)
//!
//! The space is the only difference between the two, so every reader of the
//! document goes through [`tokenize`] rather than matching markers itself.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::text::collapse_blank_runs;

/// Upper bound (in chars) on the text captured before a directive.
pub const ANCHOR_CHAR_BUDGET: usize = 200;

/// Block kind the generator uses for rewritten pending sections.
pub const REWORKED_BLOCK: &str = "REWORKED";

/// Block kind the generator uses for fresh continuation.
pub const NEW_BLOCK: &str = "NEW";

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<!-- INK:(.*?) -->").unwrap());

/// Engine-authored marker, parsed from the label after `INK:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structural<'a> {
    BlockStart(&'a str),
    BlockEnd(&'a str),
    Page(u32),
    Other(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Text,
    /// Author directive; holds the trimmed free text.
    Directive(&'a str),
    Structural(Structural<'a>),
}

/// A slice of the document with its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub start: usize,
    pub raw: &'a str,
    pub kind: TokenKind<'a>,
}

impl Token<'_> {
    pub fn end(&self) -> usize {
        self.start + self.raw.len()
    }
}

/// An author directive together with the text it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// Trailing excerpt of the text before the marker, used to relocate it.
    pub anchor: String,
    pub directive: String,
}

/// Split `doc` into text runs and classified markers, in document order.
pub fn tokenize(doc: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in MARKER_RE.captures_iter(doc) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > cursor {
            tokens.push(Token {
                start: cursor,
                raw: &doc[cursor..whole.start()],
                kind: TokenKind::Text,
            });
        }
        tokens.push(Token {
            start: whole.start(),
            raw: whole.as_str(),
            kind: classify(label.as_str()),
        });
        cursor = whole.end();
    }

    if cursor < doc.len() {
        tokens.push(Token {
            start: cursor,
            raw: &doc[cursor..],
            kind: TokenKind::Text,
        });
    }
    tokens
}

fn classify(label: &str) -> TokenKind<'_> {
    if let Some(rest) = label.strip_prefix(' ') {
        let text = rest.trim();
        if text.is_empty() {
            return TokenKind::Text;
        }
        return TokenKind::Directive(text);
    }
    if label.is_empty() || label.starts_with(char::is_whitespace) {
        return TokenKind::Text;
    }

    let structural = match label.split(':').collect::<Vec<_>>().as_slice() {
        ["PAGE", n] => match n.parse() {
            Ok(page) => Structural::Page(page),
            Err(_) => Structural::Other(label),
        },
        [kind, "START"] => Structural::BlockStart(*kind),
        [kind, "END"] => Structural::BlockEnd(*kind),
        _ => Structural::Other(label),
    };
    TokenKind::Structural(structural)
}

/// Extract author directives in document order.
///
/// The anchor never reaches back past the previous marker of any kind, and is
/// capped at [`ANCHOR_CHAR_BUDGET`] chars before trimming.
pub fn extract_instructions(doc: &str) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut window_start = 0;

    for token in tokenize(doc) {
        match token.kind {
            TokenKind::Text => {}
            TokenKind::Directive(text) => {
                let preceding = &doc[window_start..token.start];
                instructions.push(Instruction {
                    anchor: tail_chars(preceding, ANCHOR_CHAR_BUDGET).trim().to_string(),
                    directive: text.to_string(),
                });
                window_start = token.end();
            }
            TokenKind::Structural(_) => window_start = token.end(),
        }
    }
    instructions
}

fn tail_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().rev().nth(budget.saturating_sub(1)) {
        Some((idx, _)) if budget > 0 => &text[idx..],
        _ if budget == 0 => "",
        _ => text,
    }
}

/// Remove author directives, keeping structural markers in place.
pub fn strip_directives(doc: &str) -> String {
    rebuild(doc, |kind| matches!(kind, TokenKind::Directive(_)))
}

/// Remove structural markers (including page markers), keeping directives.
pub fn strip_structural(doc: &str) -> String {
    rebuild(doc, |kind| matches!(kind, TokenKind::Structural(_)))
}

fn rebuild(doc: &str, drop: impl Fn(TokenKind<'_>) -> bool) -> String {
    let kept: String = tokenize(doc)
        .into_iter()
        .filter(|token| !drop(token.kind))
        .map(|token| token.raw)
        .collect();
    collapse_blank_runs(&kept)
}

/// Byte offset of the first author directive, if any.
pub fn first_directive_offset(doc: &str) -> Option<usize> {
    tokenize(doc)
        .into_iter()
        .find(|token| matches!(token.kind, TokenKind::Directive(_)))
        .map(|token| token.start)
}

/// Directive texts in document order.
pub fn directive_texts(doc: &str) -> Vec<&str> {
    tokenize(doc)
        .into_iter()
        .filter_map(|token| match token.kind {
            TokenKind::Directive(text) => Some(text),
            _ => None,
        })
        .collect()
}

/// Number of `<!-- INK:<kind>:START -->` markers.
pub fn count_blocks(doc: &str, kind: &str) -> usize {
    tokenize(doc)
        .iter()
        .filter(|token| token.kind == TokenKind::Structural(Structural::BlockStart(kind)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_after_colon_separates_directives_from_structure() {
        let doc = "<!-- INK:NEW:START -->\nText\n<!-- INK: fix this -->\n<!-- INK:NEW:END -->";
        let kinds: Vec<_> = tokenize(doc)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Text)
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Structural(Structural::BlockStart("NEW")),
                TokenKind::Directive("fix this"),
                TokenKind::Structural(Structural::BlockEnd("NEW")),
            ]
        );
    }

    #[test]
    fn tokens_cover_the_whole_document() {
        let doc = "a <!-- INK: b --> c <!-- INK:PAGE:3 --> d";
        let rebuilt: String = tokenize(doc).iter().map(|t| t.raw).collect();
        assert_eq!(rebuilt, doc);
        assert!(
            tokenize(doc)
                .iter()
                .any(|t| t.kind == TokenKind::Structural(Structural::Page(3)))
        );
    }

    #[test]
    fn blank_or_tab_labels_are_plain_text() {
        assert!(first_directive_offset("<!-- INK: -->").is_none());
        assert!(first_directive_offset("<!-- INK:\tnope -->").is_none());
        assert_eq!(count_blocks("<!-- INK:\tnope -->", "nope"), 0);
    }

    #[test]
    fn extracts_directive_with_anchor() {
        let doc = "Paragraph one.\n\n<!-- INK: make it tenser -->\n\nParagraph two.";
        let instructions = extract_instructions(doc);
        assert_eq!(
            instructions,
            vec![Instruction {
                anchor: "Paragraph one.".to_string(),
                directive: "make it tenser".to_string(),
            }]
        );
    }

    #[test]
    fn anchor_respects_char_budget() {
        let doc = format!("{}<!-- INK: shorten -->", "é".repeat(500));
        let instructions = extract_instructions(&doc);
        assert_eq!(instructions[0].anchor.chars().count(), ANCHOR_CHAR_BUDGET);
    }

    #[test]
    fn anchor_stops_at_structural_marker() {
        let doc = "Old text.\n<!-- INK:REWORKED:START -->\nNew text.<!-- INK: again -->";
        let instructions = extract_instructions(doc);
        assert_eq!(instructions[0].anchor, "New text.");
    }

    #[test]
    fn anchor_stops_at_previous_directive() {
        let doc = "First.<!-- INK: one -->Second.<!-- INK: two -->";
        let anchors: Vec<_> = extract_instructions(doc)
            .into_iter()
            .map(|i| i.anchor)
            .collect();
        assert_eq!(anchors, vec!["First.", "Second."]);
    }

    #[test]
    fn strip_directives_keeps_structural_markers() {
        let doc = "<!-- INK:NEW:START -->\nA.\n\n<!-- INK: cut -->\n\nB.\n<!-- INK:NEW:END -->";
        let stripped = strip_directives(doc);
        assert!(stripped.contains("<!-- INK:NEW:START -->"));
        assert!(stripped.contains("<!-- INK:NEW:END -->"));
        assert!(!stripped.contains("cut"));
        assert!(stripped.contains("A.\n\nB."));
    }

    #[test]
    fn counts_reworked_blocks() {
        let doc = "<!-- INK:REWORKED:START -->x<!-- INK:REWORKED:END --><!-- INK:NEW:START -->y<!-- INK:NEW:END -->";
        assert_eq!(count_blocks(doc, REWORKED_BLOCK), 1);
        assert_eq!(count_blocks(doc, NEW_BLOCK), 1);
    }
}
