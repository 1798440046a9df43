//! In-process persistence provider.
//!
//! Backs tests and environments without a database. State lives in plain
//! maps behind a mutex; everything is lost on process exit.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::counseling::CounselingState;
use crate::persistence::{ChatTurn, HistoryPage, HistoryQuery, PersistenceLayer, SessionMeta};
use crate::verses::VerseRecord;

#[derive(Debug, Default)]
struct Store {
    sessions: HashMap<String, SessionMeta>,
    turns: Vec<ChatTurn>,
    counseling: HashMap<String, CounselingState>,
    verses: Vec<VerseRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryProvider {
    store: Mutex<Store>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload verse records, e.g. for tests.
    pub fn with_verses(verses: Vec<VerseRecord>) -> Self {
        let provider = Self::new();
        provider.store.lock().unwrap().verses = verses;
        provider
    }
}

#[async_trait]
impl PersistenceLayer for MemoryProvider {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_session(&self, meta: &SessionMeta) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store
            .sessions
            .insert(meta.session_id.clone(), meta.clone());
        Ok(())
    }

    async fn append_turn(&self, turn: &ChatTurn) -> Result<()> {
        self.store.lock().unwrap().turns.push(turn.clone());
        Ok(())
    }

    async fn list_turns(&self, query: &HistoryQuery) -> Result<HistoryPage> {
        let store = self.store.lock().unwrap();
        let needle = query.substring.as_ref().map(|s| s.to_lowercase());

        let mut items: Vec<ChatTurn> = store
            .turns
            .iter()
            .filter(|t| t.session_id == query.session_id)
            .filter(|t| query.cursor.is_none_or(|c| t.created_at > c))
            .filter(|t| query.from.is_none_or(|f| t.created_at >= f))
            .filter(|t| query.to.is_none_or(|to| t.created_at <= to))
            .filter(|t| {
                needle
                    .as_ref()
                    .is_none_or(|n| t.content.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        items.sort_by_key(|t| t.created_at);

        let has_more = items.len() > query.limit;
        items.truncate(query.limit);
        let next_cursor = if has_more {
            items.last().map(|t| t.created_at)
        } else {
            None
        };

        Ok(HistoryPage { items, next_cursor })
    }

    async fn load_counseling(&self, session_id: &str) -> Result<Option<CounselingState>> {
        Ok(self.store.lock().unwrap().counseling.get(session_id).cloned())
    }

    async fn save_counseling(&self, state: &CounselingState) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store
            .counseling
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn delete_counseling_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut store = self.store.lock().unwrap();
        let before = store.counseling.len();
        store.counseling.retain(|_, s| s.created_at >= cutoff);
        Ok((before - store.counseling.len()) as u64)
    }

    async fn upsert_verse(&self, verse: &VerseRecord) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        if let Some(existing) = store.verses.iter_mut().find(|v| {
            v.translation == verse.translation
                && v.book == verse.book
                && v.chapter == verse.chapter
                && v.verse == verse.verse
        }) {
            *existing = verse.clone();
        } else {
            store.verses.push(verse.clone());
        }
        Ok(())
    }

    async fn load_embedded_verses(&self, limit: usize) -> Result<Vec<VerseRecord>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .verses
            .iter()
            .filter(|v| v.embedding.as_ref().is_some_and(|e| !e.is_empty()))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_unembedded_verses(&self) -> Result<Vec<VerseRecord>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .verses
            .iter()
            .filter(|v| v.embedding.is_none())
            .cloned()
            .collect())
    }

    async fn clear_verses(&self) -> Result<u64> {
        let mut store = self.store.lock().unwrap();
        let n = store.verses.len() as u64;
        store.verses.clear();
        Ok(n)
    }
}
