/// Recursive character splitter over byte ranges of a source string.
///
/// Pieces are produced by the first separator (in priority order) that
/// occurs in the text; any piece still at or above the size budget is split
/// again with the remaining separators. Small pieces are then merged back
/// into chunks of at most `chunk_size` characters, carrying up to
/// `chunk_overlap` characters of trailing pieces into the next chunk.
///
/// Separators stay attached to the start of the piece that follows them, so
/// every emitted range is a contiguous, whitespace-trimmed slice of the
/// source.
use std::collections::VecDeque;
use std::ops::Range;

use tracing::debug;

/// Paragraph break, line break, sentence boundary, word boundary, character.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`.
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split the whole of `text`.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Range<usize>> {
        self.split_range(text, 0..text.len(), &SEPARATORS)
    }

    /// Split the sub-slice `range` of `text`; returned ranges index `text`.
    #[must_use]
    pub fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&str],
    ) -> Vec<Range<usize>> {
        let segment = &text[range.clone()];

        let (pos, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || segment.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len(), ""));
        let remaining = separators.get(pos + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut good = Vec::new();

        for piece in split_keep_start(segment, separator, range.start) {
            if char_len(text, &piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                chunks.extend(self.merge(text, &good));
                good.clear();
            }

            if remaining.is_empty() {
                chunks.extend(trim_range(text, piece));
            } else {
                chunks.extend(self.split_range(text, piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(text, &good));
        }

        chunks
    }

    fn merge(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut docs = Vec::new();
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(text, piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    debug!(
                        "created a chunk of {total} chars, larger than the {} budget",
                        self.chunk_size
                    );
                }
                docs.extend(join(text, &window));

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }

            window.push_back((piece.clone(), len));
            total += len;
        }

        docs.extend(join(text, &window));
        docs
    }
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}

/// Split `segment` at each occurrence of `separator`, keeping the separator
/// at the start of the following piece. An empty separator splits into
/// characters. Ranges are shifted by `offset`.
fn split_keep_start(segment: &str, separator: &str, offset: usize) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(i, c)| offset + i..offset + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in segment.match_indices(separator) {
        if idx > start {
            pieces.push(offset + start..offset + idx);
        }
        start = idx;
    }
    if start < segment.len() {
        pieces.push(offset + start..offset + segment.len());
    }
    pieces
}

fn join(text: &str, window: &VecDeque<(Range<usize>, usize)>) -> Option<Range<usize>> {
    let first = window.front()?;
    let last = window.back()?;
    trim_range(text, first.0.start..last.0.end)
}

/// Shrink `range` to exclude surrounding whitespace; `None` if nothing is left.
fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let lead = slice.len() - slice.trim_start().len();
    if lead == slice.len() {
        return None;
    }
    let trail = slice.len() - slice.trim_end().len();
    Some(range.start + lead..range.end - trail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(text: &'a str, ranges: &[Range<usize>]) -> Vec<&'a str> {
        ranges.iter().map(|r| &text[r.clone()]).collect()
    }

    #[test]
    fn test_split_keep_start() {
        let pieces = split_keep_start("a\n\nb\n\nc", "\n\n", 0);
        assert_eq!(pieces, vec![0..1, 1..4, 4..7]);
    }

    #[test]
    fn test_split_keep_start_leading_separator() {
        let text = "\n--- Page 1 ---\nabc";
        let pieces = split_keep_start(text, "\n", 0);
        assert_eq!(texts(text, &pieces), vec!["\n--- Page 1 ---", "\nabc"]);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = RecursiveSplitter::new(100, 10);
        let text = "  Short contract text.\n\nSecond paragraph.  ";
        let chunks = splitter.split(text);
        assert_eq!(
            texts(text, &chunks),
            vec!["Short contract text.\n\nSecond paragraph."]
        );
    }

    #[test]
    fn test_empty_and_whitespace() {
        let splitter = RecursiveSplitter::new(100, 10);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\n  \n").is_empty());
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let splitter = RecursiveSplitter::new(30, 0);
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = splitter.split(text);
        assert_eq!(
            texts(text, &chunks),
            vec!["First paragraph here.", "Second paragraph here."]
        );
    }

    #[test]
    fn test_chunks_respect_budget() {
        let splitter = RecursiveSplitter::new(50, 10);
        let text = "The Supplier shall deliver the goods. ".repeat(20);
        for chunk in texts(&text, &splitter.split(&text)) {
            assert!(chunk.chars().count() <= 50, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_overlap_carries_trailing_words() {
        let splitter = RecursiveSplitter::new(20, 8);
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = texts(text, &splitter.split(text));
        assert!(chunks.len() >= 2);
        // The last word of each chunk reappears at the start of the next
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].starts_with(last_word), "{pair:?}");
        }
    }

    #[test]
    fn test_character_fallback_for_unbroken_text() {
        let splitter = RecursiveSplitter::new(10, 0);
        let text = "x".repeat(35);
        let chunks = splitter.split(&text);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], 0..10);
        assert_eq!(chunks[3], 30..35);
    }

    #[test]
    fn test_multibyte_characters() {
        let splitter = RecursiveSplitter::new(5, 0);
        let text = "éééééééééé";
        let chunks = texts(text, &splitter.split(text));
        assert_eq!(chunks, vec!["ééééé", "ééééé"]);
    }

    #[test]
    fn test_split_range_offsets() {
        let splitter = RecursiveSplitter::new(100, 0);
        let text = "HEADER\nbody text";
        let ranges = splitter.split_range(text, 7..text.len(), &SEPARATORS);
        assert_eq!(texts(text, &ranges), vec!["body text"]);
    }

    #[test]
    fn test_overlap_clamped() {
        let splitter = RecursiveSplitter::new(4, 10);
        assert_eq!(splitter.chunk_overlap, 3);
    }
}
