/// Page and section attribution for chunks.
///
/// Both are best-effort: page numbers come from an embedded page marker or
/// from substring containment of the chunk's opening characters, and a chunk
/// that straddles a page boundary may be attributed to either page.
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::document::find_page_marker;

pub const UNKNOWN_SECTION: &str = "Unknown Section";

/// Characters of a chunk's opening used for page containment lookup.
const PAGE_LOOKUP_CHARS: usize = 100;

/// Lines longer than this are body text, not headings.
const MAX_HEADING_CHARS: usize = 120;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[A-Z][A-Z0-9 ,&'/\-]{2,}|\d+\.\s+[A-Z].*|Article\s+\d+.*|Section\s+\d+.*)$",
    )
    .expect("valid heading regex")
});

/// Whether a trimmed line looks like a heading: a short all-caps line,
/// `"<n>. <Capitalized>"`, `"Article <n>"` or `"Section <n>"`.
#[must_use]
pub fn is_heading(line: &str) -> bool {
    !line.is_empty() && line.chars().count() <= MAX_HEADING_CHARS && HEADING_RE.is_match(line)
}

/// Page of a chunk: embedded marker first, then containment of its opening
/// characters in a page's text, then page 1.
#[must_use]
pub fn find_page(chunk_text: &str, pages: &BTreeMap<u32, String>) -> u32 {
    if let Some(page) = find_page_marker(chunk_text) {
        return page;
    }

    let needle: String = chunk_text.chars().take(PAGE_LOOKUP_CHARS).collect();
    if needle.is_empty() {
        return 1;
    }

    pages
        .iter()
        .find(|(_, text)| text.contains(needle.as_str()))
        .map(|(page, _)| *page)
        .unwrap_or(1)
}

/// Nearest heading line before byte offset `start` of `full_text`.
#[must_use]
pub fn find_section(full_text: &str, start: usize) -> String {
    let start = floor_char_boundary(full_text, start);
    full_text[..start]
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| is_heading(line))
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_SECTION.to_string())
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> BTreeMap<u32, String> {
        BTreeMap::from([
            (1, "Preamble between the parties.".to_string()),
            (2, "TERMINATION FOR CONVENIENCE\nEither party may terminate.".to_string()),
        ])
    }

    #[test]
    fn test_heading_patterns() {
        assert!(is_heading("TERMINATION FOR CONVENIENCE"));
        assert!(is_heading("NON-COMPETE, EXCLUSIVITY"));
        assert!(is_heading("12. Governing Law"));
        assert!(is_heading("Article 7"));
        assert!(is_heading("Section 4.2 Fees"));
        assert!(!is_heading("Either party may terminate."));
        assert!(!is_heading("--- Page 2 ---"));
        assert!(!is_heading("AB"));
        assert!(!is_heading(""));
        assert!(!is_heading(&"A".repeat(200)));
    }

    #[test]
    fn test_find_page_from_marker() {
        assert_eq!(find_page("--- Page 2 ---\nanything", &pages()), 2);
    }

    #[test]
    fn test_find_page_from_containment() {
        assert_eq!(find_page("Either party may terminate.", &pages()), 2);
    }

    #[test]
    fn test_find_page_default() {
        assert_eq!(find_page("text from nowhere", &pages()), 1);
        assert_eq!(find_page("", &pages()), 1);
    }

    #[test]
    fn test_find_section_nearest_preceding() {
        let text = "1. Definitions\nsome text\nTERMINATION FOR CONVENIENCE\nEither party may terminate.";
        let start = text.find("Either").unwrap();
        assert_eq!(find_section(text, start), "TERMINATION FOR CONVENIENCE");
        let start = text.find("some").unwrap();
        assert_eq!(find_section(text, start), "1. Definitions");
    }

    #[test]
    fn test_find_section_unknown() {
        let text = "plain text\nmore plain text";
        assert_eq!(find_section(text, text.len()), UNKNOWN_SECTION);
        assert_eq!(find_section(text, 0), UNKNOWN_SECTION);
    }
}
