//! Validated/pending split and manuscript pagination.
//!
//! Everything in the rolling document before the first author directive is
//! validated: the author read it and left no instruction. At close the
//! validated prefix moves to the permanent manuscript and the generator's new
//! content becomes the rolling document, behind any pending text whose
//! directive it did not answer.

use std::sync::LazyLock;

use regex::Regex;

use super::markers::{
    REWORKED_BLOCK, Structural, TokenKind, count_blocks, directive_texts, first_directive_offset,
    strip_structural, tokenize,
};
use super::text::count_prose_words;

static INNER_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n<!-- INK:PAGE:\d+ -->\n\n").unwrap());
static LEADING_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A<!-- INK:PAGE:\d+ -->\n\n").unwrap());

/// Rolling document cut at its first author directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    /// Prefix with structural markers removed, blank runs collapsed, trimmed.
    pub validated: String,
    /// Raw remainder starting at the first directive (empty when none).
    pub pending: &'a str,
}

pub fn split_validated(doc: &str) -> Split<'_> {
    let cut = first_directive_offset(doc).unwrap_or(doc.len());
    Split {
        validated: strip_structural(&doc[..cut]).trim().to_string(),
        pending: &doc[cut..],
    }
}

/// What close writes: the validated text for the manuscript and the next
/// rolling document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingUpdate {
    pub validated: String,
    pub rolling: String,
    /// True when part of the old pending section was kept because the new
    /// content did not rework it.
    pub carried_forward: bool,
}

/// Plan the rolling document transition for one close.
///
/// Each pending directive owns the text from its marker up to the next
/// directive. Reworked blocks in the new content answer pending directives in
/// document order; a directive the new content echoes back is never answered.
/// Unanswered directives keep their pending text ahead of the new content, and
/// echoed copies are dropped so each directive appears once. With every
/// directive answered the new content replaces the rolling document verbatim.
pub fn plan_rolling_update(old_doc: &str, new_content: &str) -> RollingUpdate {
    let split = split_validated(old_doc);
    let echoed = directive_texts(new_content);
    let mut reworked = count_blocks(new_content, REWORKED_BLOCK);

    let mut carried: Vec<PendingSegment<'_>> = Vec::new();
    for segment in pending_segments(split.pending) {
        if echoed.contains(&segment.directive) {
            carried.push(segment);
        } else if reworked > 0 {
            reworked -= 1;
        } else {
            carried.push(segment);
        }
    }

    if carried.is_empty() {
        return RollingUpdate {
            validated: split.validated,
            rolling: new_content.to_string(),
            carried_forward: false,
        };
    }

    let carried_directives: Vec<&str> = carried.iter().map(|s| s.directive).collect();
    let fresh = remove_directives(new_content, &carried_directives);
    let mut rolling = carried
        .iter()
        .map(|segment| segment.raw.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !fresh.trim().is_empty() {
        rolling.push_str("\n\n");
        rolling.push_str(fresh.trim());
    }
    rolling.push('\n');

    RollingUpdate {
        validated: split.validated,
        rolling,
        carried_forward: true,
    }
}

/// One pending directive and the raw text it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSegment<'a> {
    directive: &'a str,
    /// From the directive marker up to the next directive (or the end).
    raw: &'a str,
}

fn pending_segments(pending: &str) -> Vec<PendingSegment<'_>> {
    let starts: Vec<(usize, &str)> = tokenize(pending)
        .into_iter()
        .filter_map(|token| match token.kind {
            TokenKind::Directive(text) => Some((token.start, text)),
            _ => None,
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &(start, directive))| {
            let end = starts.get(i + 1).map_or(pending.len(), |&(next, _)| next);
            PendingSegment {
                directive,
                raw: &pending[start..end],
            }
        })
        .collect()
}

fn remove_directives(doc: &str, texts: &[&str]) -> String {
    let kept: String = tokenize(doc)
        .into_iter()
        .filter(|token| !matches!(token.kind, TokenKind::Directive(text) if texts.contains(&text)))
        .map(|token| token.raw)
        .collect();
    super::text::collapse_blank_runs(&kept)
}

/// Where the manuscript's pagination left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// Number the next page marker will carry.
    pub next_page: u32,
    /// Prose words already on the open page.
    pub words_on_page: u32,
}

/// Read the pagination cursor from the tail of the manuscript.
///
/// Page 1 starts with the book and carries no marker.
pub fn page_cursor(manuscript: &str) -> PageCursor {
    let last_page = tokenize(manuscript)
        .into_iter()
        .filter_map(|token| match token.kind {
            TokenKind::Structural(Structural::Page(n)) => Some((n, token.end())),
            _ => None,
        })
        .last();

    match last_page {
        Some((n, end)) => PageCursor {
            next_page: n + 1,
            words_on_page: count_prose_words(&manuscript[end..]),
        },
        None => PageCursor {
            next_page: 2,
            words_on_page: count_prose_words(manuscript),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginated {
    pub text: String,
    pub pages_added: u32,
}

/// Insert page markers at paragraph boundaries every `words_per_page` words.
///
/// A marker is emitted before a paragraph once the running count has reached
/// the page size. [`strip_page_markers`] undoes this exactly.
pub fn paginate(text: &str, cursor: PageCursor, words_per_page: u32) -> Paginated {
    if text.is_empty() {
        return Paginated {
            text: String::new(),
            pages_added: 0,
        };
    }

    let mut out = String::with_capacity(text.len());
    let mut running = cursor.words_on_page;
    let mut page = cursor.next_page;
    let mut pages_added = 0;

    for (i, paragraph) in text.split("\n\n").enumerate() {
        if words_per_page > 0 && running >= words_per_page {
            if i > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&format!("<!-- INK:PAGE:{page} -->\n\n"));
            page += 1;
            pages_added += 1;
            running = 0;
        } else if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(paragraph);
        running += count_prose_words(paragraph);
    }

    Paginated {
        text: out,
        pages_added,
    }
}

/// Remove page markers in exactly the forms [`paginate`] writes them.
pub fn strip_page_markers(text: &str) -> String {
    let inner = INNER_PAGE_RE.replace_all(text, "\n\n");
    LEADING_PAGE_RE.replace(&inner, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_before_first_directive_is_validated() {
        let doc = "Paragraph one.\n\n<!-- INK: make it tenser -->\n\nParagraph two.";
        let split = split_validated(doc);
        assert_eq!(split.validated, "Paragraph one.");
        assert!(split.pending.starts_with("<!-- INK: make it tenser -->"));
    }

    #[test]
    fn document_without_directives_is_fully_validated() {
        let doc = "<!-- INK:NEW:START -->\nOne.\n\nTwo.\n<!-- INK:NEW:END -->\n";
        let split = split_validated(doc);
        assert_eq!(split.validated, "One.\n\nTwo.");
        assert_eq!(split.pending, "");

        let again = split_validated(split.pending);
        assert_eq!(again.validated, "");
        assert_eq!(again.pending, "");
    }

    #[test]
    fn new_content_replaces_rolling_document_verbatim() {
        let old = "Kept.\n\n<!-- INK: darker -->\n\nRedo me.";
        let new = "<!-- INK:REWORKED:START -->\nRedone.\n<!-- INK:REWORKED:END -->\n";
        let update = plan_rolling_update(old, new);
        assert_eq!(update.validated, "Kept.");
        assert_eq!(update.rolling, new);
        assert!(!update.carried_forward);
    }

    #[test]
    fn unaddressed_pending_section_is_carried_forward() {
        let old = "Kept.\n\n<!-- INK: darker -->\n\nRedo me.";
        let new = "<!-- INK: darker -->\n\n<!-- INK:NEW:START -->\nMore.\n<!-- INK:NEW:END -->";
        let update = plan_rolling_update(old, new);

        assert_eq!(update.validated, "Kept.");
        assert!(update.carried_forward);
        assert!(update.rolling.starts_with("<!-- INK: darker -->\n\nRedo me."));
        assert_eq!(directive_texts(&update.rolling), vec!["darker"]);
        assert!(update.rolling.contains("More."));
    }

    /// One reworked block answers the first directive; the second is echoed
    /// back, so its pending text stays in review.
    #[test]
    fn partially_reworked_pending_section_keeps_unanswered_directive() {
        let old = "Kept.\n\n<!-- INK: darker -->\n\nFirst pending.\n\n\
<!-- INK: shorter -->\n\nSecond pending text.\n";
        let new = "<!-- INK:REWORKED:START -->\nFirst, darker.\n<!-- INK:REWORKED:END -->\n\n\
<!-- INK: shorter -->\n";
        let update = plan_rolling_update(old, new);

        assert_eq!(update.validated, "Kept.");
        assert!(update.carried_forward);
        assert!(update.rolling.starts_with("<!-- INK: shorter -->\n\nSecond pending text."));
        assert!(!update.rolling.contains("First pending."));
        assert!(update.rolling.contains("First, darker."));
        assert_eq!(directive_texts(&update.rolling), vec!["shorter"]);
    }

    #[test]
    fn fewer_reworked_blocks_than_directives_carries_the_rest() {
        let old = "<!-- INK: darker -->\n\nOne.\n\n<!-- INK: shorter -->\n\nTwo.";
        let new = "<!-- INK:REWORKED:START -->\nOne, darker.\n<!-- INK:REWORKED:END -->\n";
        let update = plan_rolling_update(old, new);

        assert!(update.carried_forward);
        assert_eq!(update.validated, "");
        assert_eq!(
            update.rolling,
            "<!-- INK: shorter -->\n\nTwo.\n\n<!-- INK:REWORKED:START -->\nOne, darker.\n<!-- INK:REWORKED:END -->\n"
        );
    }

    #[test]
    fn pagination_round_trips() {
        let text = "one two three\n\nfour five\n\nsix seven eight\n\n\nnine";
        let cursor = PageCursor {
            next_page: 4,
            words_on_page: 1,
        };
        let paginated = paginate(text, cursor, 3);
        assert!(paginated.text.contains("<!-- INK:PAGE:4 -->"));
        assert_eq!(strip_page_markers(&paginated.text), text);
    }

    #[test]
    fn full_page_carried_in_starts_chunk_with_marker() {
        let cursor = PageCursor {
            next_page: 7,
            words_on_page: 5,
        };
        let paginated = paginate("alpha beta", cursor, 5);
        assert_eq!(paginated.text, "<!-- INK:PAGE:7 -->\n\nalpha beta");
        assert_eq!(paginated.pages_added, 1);
        assert_eq!(strip_page_markers(&paginated.text), "alpha beta");
    }

    #[test]
    fn cursor_counts_words_after_last_page_marker() {
        let manuscript = "a b c\n\n<!-- INK:PAGE:2 -->\n\nd e";
        assert_eq!(
            page_cursor(manuscript),
            PageCursor {
                next_page: 3,
                words_on_page: 2,
            }
        );
        assert_eq!(
            page_cursor(""),
            PageCursor {
                next_page: 2,
                words_on_page: 0,
            }
        );
    }
}
