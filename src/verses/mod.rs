//! Bible verse reference data and similarity search.

pub mod search;

pub use search::{VerseSearcher, cosine_similarity};

use serde::{Deserialize, Serialize};

/// A citation pointing at one verse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseRef {
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
}

impl std::fmt::Display for VerseRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)
    }
}

/// One stored verse. Immutable reference data; the embedding is computed by
/// the seeder and cached on the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerseRecord {
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
    pub text: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl VerseRecord {
    pub fn verse_ref(&self) -> VerseRef {
        VerseRef {
            book: self.book.clone(),
            chapter: self.chapter,
            verse: self.verse,
        }
    }
}

/// A search hit with its original similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct VerseMatch {
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
    pub text: String,
    pub similarity: f32,
}

impl VerseMatch {
    pub fn verse_ref(&self) -> VerseRef {
        VerseRef {
            book: self.book.clone(),
            chapter: self.chapter,
            verse: self.verse,
        }
    }
}
