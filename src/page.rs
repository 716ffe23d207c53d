//! Best-effort page attribution for chunks.
//!
//! Heading-based chunk boundaries do not line up with physical page
//! boundaries, and in-text page markers are unevenly distributed (manuals
//! commonly print the number once per physical page). Attribution therefore
//! works through a three-tier fallback, evaluated per chunk in document
//! order:
//!
//! 1. an in-text bracketed page marker (`[45]`) found in the chunk itself;
//! 2. the last marker seen in an earlier chunk (the chunk is inferred to be
//!    a continuation of that page);
//! 3. the page hint derived from the extracted text's physical page
//!    boundaries.
//!
//! Page `0` means unknown.

use regex::Regex;
use std::sync::OnceLock;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d{1,4})\]").expect("valid page marker pattern"))
}

/// Extract the first in-text page marker from a chunk, if any.
pub fn page_marker(text: &str) -> Option<u32> {
    marker_re()
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Attribute a page number to every chunk.
///
/// `hints` supplies the per-chunk physical-page fallback; a missing hint
/// resolves to `0` (unknown). Chunks must be in document order, otherwise
/// the last-known-marker inference is meaningless.
pub fn attribute_pages(chunks: &[String], hints: &[u32]) -> Vec<u32> {
    let mut last_known: Option<u32> = None;

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            if let Some(page) = page_marker(chunk) {
                last_known = Some(page);
                page
            } else if let Some(page) = last_known {
                page
            } else {
                hints.get(i).copied().unwrap_or(0)
            }
        })
        .collect()
}

/// Derive a physical-page hint for each chunk from form-feed page
/// boundaries (`\x0c`) in the extracted text stream.
///
/// Chunks are trimmed spans of `text` in document order; each is located
/// by its first line starting from a moving cursor, then mapped to the
/// 1-based page containing that offset. A chunk that cannot be located
/// inherits the cursor's page, keeping the hint best-effort rather than
/// failing the ingest.
pub fn page_hints(text: &str, chunks: &[String]) -> Vec<u32> {
    let mut page_starts = vec![0usize];
    for (offset, ch) in text.char_indices() {
        if ch == '\u{0c}' {
            page_starts.push(offset);
        }
    }

    let mut hints = Vec::with_capacity(chunks.len());
    let mut cursor = 0usize;

    for chunk in chunks {
        let key = chunk.lines().next().unwrap_or(chunk.as_str());
        let pos = if key.is_empty() {
            cursor
        } else {
            text[cursor..]
                .find(key)
                .map(|p| cursor + p)
                .unwrap_or(cursor)
        };

        let page = page_starts.iter().filter(|start| **start <= pos).count() as u32;
        hints.push(page);
        cursor = pos + key.len();
    }

    hints
}
