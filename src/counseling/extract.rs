//! Best-effort scraping of verse citations and the prayer section from
//! free-form model prose.
//!
//! Fixed regex patterns over Korean book-name `책이름 장:절` notation and the
//! literal `오늘의 기도` marker. This is not a structured output contract and
//! is brittle to phrasing drift in the model's responses.

use std::sync::LazyLock;

use regex::Regex;

use crate::verses::VerseRef;

static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([가-힣]+)\s*(\d+)\s*:\s*(\d+)").unwrap());

static PRAYER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"오늘의\s*기도\s*[:：]?\s*").unwrap());

/// Pull Korean verse citations (e.g. `마태복음 11:28`) out of prose,
/// deduplicated in first-seen order.
pub fn extract_verse_refs(text: &str) -> Vec<VerseRef> {
    let mut refs: Vec<VerseRef> = Vec::new();
    for caps in CITATION_RE.captures_iter(text) {
        let (Ok(chapter), Ok(verse)) = (caps[2].parse::<i32>(), caps[3].parse::<i32>()) else {
            continue;
        };
        let candidate = VerseRef {
            book: caps[1].to_string(),
            chapter,
            verse,
        };
        if !refs.contains(&candidate) {
            refs.push(candidate);
        }
    }
    refs
}

/// Everything after the `오늘의 기도` marker, trimmed. `None` when the marker
/// is absent or followed by nothing.
pub fn extract_prayer(text: &str) -> Option<String> {
    let m = PRAYER_RE.find(text)?;
    let prayer = text[m.end()..].trim();
    if prayer.is_empty() {
        None
    } else {
        Some(prayer.to_string())
    }
}
