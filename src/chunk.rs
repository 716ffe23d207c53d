//! Heading-aware text chunker.
//!
//! Splits extracted manual text into retrieval units. Markdown heading
//! lines (`#`–`######`) define the initial chunk boundaries so that a
//! chunk never merges content across sections; any section longer than
//! `max_chars` is re-split on blank-line paragraph boundaries with greedy
//! packing. The size bound is soft: a single paragraph over the limit is
//! kept whole rather than split mid-paragraph.
//!
//! Both passes are deterministic pure functions of their input, so the
//! size-bound re-splitting is testable independently of heading detection.
//! Lengths are measured in characters, not bytes, since manual text is
//! predominantly Korean.

use regex::Regex;
use std::sync::OnceLock;

/// Default soft upper bound on chunk length, in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6} .*$").expect("valid heading pattern"))
}

/// Split text into bounded retrieval units.
///
/// Output preserves document order and drops empty chunks at every stage.
/// Returns an empty vector for empty input.
pub fn chunk(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    for section in split_headings(text) {
        if char_len(&section) > max_chars {
            chunks.extend(split_oversized(&section, max_chars));
        } else {
            chunks.push(section);
        }
    }
    chunks
}

/// Split on markdown heading boundaries.
///
/// Text before the first heading (typically a title block) becomes the
/// first chunk; each later chunk spans one heading's start to the next.
/// With no headings at all, falls back to one chunk per blank-line
/// paragraph so headerless text still gets some granularity.
pub fn split_headings(text: &str) -> Vec<String> {
    let headings: Vec<_> = heading_re().find_iter(text).collect();

    if headings.is_empty() {
        return split_paragraphs(text);
    }

    let mut chunks = Vec::new();

    let preamble = text[..headings[0].start()].trim();
    if !preamble.is_empty() {
        chunks.push(preamble.to_string());
    }

    for (i, heading) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let section = text[heading.start()..end].trim();
        if !section.is_empty() {
            chunks.push(section.to_string());
        }
    }

    chunks
}

/// Split on blank-line-separated paragraph runs, trimming and dropping
/// empty results.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Re-split an oversized section by greedily packing paragraphs.
///
/// A sub-chunk is flushed when appending the next paragraph would exceed
/// `max_chars`; a lone paragraph over the limit is emitted intact.
fn split_oversized(section: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for para in split_paragraphs(section) {
        let para_len = char_len(&para);
        let would_be = if buf.is_empty() {
            para_len
        } else {
            buf_len + 2 + para_len // +2 for the \n\n separator
        };

        if would_be > max_chars && !buf.is_empty() {
            chunks.push(std::mem::take(&mut buf));
            buf_len = 0;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
            buf_len += 2;
        }
        buf.push_str(&para);
        buf_len += para_len;
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }

    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(chunk("", DEFAULT_MAX_CHARS).is_empty());
        assert!(chunk("  \n\n  ", DEFAULT_MAX_CHARS).is_empty());
    }

    #[test]
    fn test_headerless_fallback_one_chunk_per_paragraph() {
        let text = "First paragraph.\n\nSecond paragraph.\n\n\n\nThird paragraph.";
        let chunks = chunk(text, DEFAULT_MAX_CHARS);
        assert_eq!(
            chunks,
            vec!["First paragraph.", "Second paragraph.", "Third paragraph."]
        );
    }

    #[test]
    fn test_heading_boundaries() {
        let text = "# Safety\n\nWear a seat belt.\n\n## Checks\n\nInspect the ROPS.\n\n# Maintenance\n\nChange the oil.";
        let chunks = chunk(text, DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("# Safety"));
        assert!(chunks[0].contains("seat belt"));
        assert!(chunks[1].starts_with("## Checks"));
        assert!(chunks[2].starts_with("# Maintenance"));
    }

    #[test]
    fn test_preamble_before_first_heading() {
        let text = "Bobcat T590 Operating Manual\n\n# Introduction\n\nBody text.";
        let chunks = chunk(text, DEFAULT_MAX_CHARS);
        assert_eq!(chunks[0], "Bobcat T590 Operating Manual");
        assert!(chunks[1].starts_with("# Introduction"));
    }

    #[test]
    fn test_heading_only_line_is_own_chunk() {
        let text = "# Lonely Heading";
        let chunks = chunk(text, DEFAULT_MAX_CHARS);
        assert_eq!(chunks, vec!["# Lonely Heading"]);
    }

    #[test]
    fn test_hash_without_space_is_not_heading() {
        let text = "#1 ranked loader\n\nSecond paragraph.";
        let chunks = chunk(text, DEFAULT_MAX_CHARS);
        // No heading match, so paragraph fallback applies
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_oversized_section_resplit_on_paragraphs() {
        let body = "aaaa\n\nbbbb\n\ncccc\n\ndddd";
        let text = format!("# Section\n\n{}", body);
        // max 12 chars: the heading line alone will not pack with a paragraph
        let chunks = chunk(&text, 12);
        assert_eq!(chunks, vec!["# Section", "aaaa\n\nbbbb", "cccc\n\ndddd"]);
    }

    #[test]
    fn test_greedy_packing_respects_bound() {
        let text = "# S\n\naaaa\n\nbbbb\n\ncccc\n\ndddd\n\neeee";
        let max = 10;
        let chunks = chunk(text, max);
        for c in &chunks {
            assert!(
                c.chars().count() <= max,
                "chunk exceeds soft bound without lone oversized paragraph: {:?}",
                c
            );
        }
        assert_eq!(chunks, vec!["# S\n\naaaa", "bbbb\n\ncccc", "dddd\n\neeee"]);
    }

    #[test]
    fn test_single_oversized_paragraph_kept_whole() {
        let long = "x".repeat(50);
        let text = format!("short\n\n{}\n\ntail", long);
        let chunks = chunk(&text, 10);
        assert!(chunks.contains(&long));
    }

    #[test]
    fn test_no_merge_across_heading_boundary() {
        let text = "# A\n\nshort\n\n# B\n\nalso short";
        let chunks = chunk(text, DEFAULT_MAX_CHARS);
        // Small sections are never merged even though both would fit
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_coverage_no_content_lost() {
        let text = "Title block\n\n# One\n\nalpha\n\nbeta\n\n## Two\n\ngamma";
        let chunks = chunk(text, 12);
        let joined = chunks.join("\n\n");
        for needle in ["Title block", "# One", "alpha", "beta", "## Two", "gamma"] {
            assert!(joined.contains(needle), "missing {:?}", needle);
        }
        // Headings appear exactly once
        assert_eq!(joined.matches("# One").count(), 1);
        assert_eq!(joined.matches("## Two").count(), 1);
    }

    #[test]
    fn test_deterministic() {
        let text = "# A\n\nalpha\n\nbeta\n\n# B\n\ngamma";
        assert_eq!(chunk(text, 12), chunk(text, 12));
    }

    #[test]
    fn test_char_length_not_bytes() {
        // Ten Hangul syllables are 30 UTF-8 bytes but 10 characters
        let para = "가나다라마바사아자차";
        let text = format!("# 헤딩\n\n{}\n\n{}", para, para);
        let chunks = chunk(&text, 22);
        // The heading (4 chars) packs with the first paragraph only
        // because lengths are counted in characters, not bytes
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("# 헤딩"));
        assert!(chunks[0].contains(para));
    }
}
