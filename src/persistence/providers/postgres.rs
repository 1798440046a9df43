//! Postgres persistence provider (sqlx + pgvector).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::counseling::{CounselingState, CounselingStep};
use crate::persistence::{
    ChatTurn, HistoryPage, HistoryQuery, PersistenceLayer, SessionMeta, TurnRole,
};
use crate::verses::{VerseRecord, VerseRef};

#[derive(Debug)]
pub struct PostgresProvider {
    pool: PgPool,
}

impl PostgresProvider {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    fn row_to_verse(row: &sqlx::postgres::PgRow) -> Result<VerseRecord> {
        let embedding: Option<Vector> = row.try_get("embedding")?;
        Ok(VerseRecord {
            book: row.try_get("book")?,
            chapter: row.try_get("chapter")?,
            verse: row.try_get("verse")?,
            text: row.try_get("text")?,
            translation: row.try_get("translation")?,
            embedding: embedding.map(|v| v.to_vec()),
        })
    }
}

#[async_trait]
impl PersistenceLayer for PostgresProvider {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_session(&self, meta: &SessionMeta) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_agent, locale, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (session_id) DO UPDATE SET
                user_agent = EXCLUDED.user_agent,
                locale = EXCLUDED.locale,
                updated_at = NOW()
            "#,
        )
        .bind(&meta.session_id)
        .bind(&meta.user_agent)
        .bind(&meta.locale)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_turn(&self, turn: &ChatTurn) -> Result<()> {
        let verses = serde_json::to_value(&turn.verses)?;

        sqlx::query(
            r#"
            INSERT INTO chat_turns (session_id, role, content, verses, prayer, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&turn.session_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(verses)
        .bind(&turn.prayer)
        .bind(turn.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_turns(&self, query: &HistoryQuery) -> Result<HistoryPage> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT session_id, role, content, verses, prayer, created_at \
             FROM chat_turns WHERE session_id = ",
        );
        qb.push_bind(&query.session_id);
        if let Some(cursor) = query.cursor {
            qb.push(" AND created_at > ").push_bind(cursor);
        }
        if let Some(from) = query.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        if let Some(s) = &query.substring {
            qb.push(" AND content ILIKE ")
                .push_bind(format!("%{s}%"));
        }
        // Fetch one extra row to decide whether a next page exists.
        qb.push(" ORDER BY created_at ASC LIMIT ")
            .push_bind((query.limit + 1) as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            let verses_val: serde_json::Value = row.try_get("verses")?;
            let verses: Vec<VerseRef> = serde_json::from_value(verses_val)?;
            items.push(ChatTurn {
                session_id: row.try_get("session_id")?,
                role: role.parse::<TurnRole>()?,
                content: row.try_get("content")?,
                verses,
                prayer: row.try_get("prayer")?,
                created_at: row.try_get("created_at")?,
            });
        }

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
        let row = sqlx::query(
            r#"
            SELECT session_id, step, initial_concern, questions, answers,
                   current_question_index, is_complete, created_at, updated_at
            FROM counseling_sessions WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let step: String = row.try_get("step")?;
        let questions: serde_json::Value = row.try_get("questions")?;
        let answers: serde_json::Value = row.try_get("answers")?;
        let index: i32 = row.try_get("current_question_index")?;

        Ok(Some(CounselingState {
            session_id: row.try_get("session_id")?,
            step: step.parse::<CounselingStep>()?,
            initial_concern: row.try_get("initial_concern")?,
            questions: serde_json::from_value(questions)?,
            answers: serde_json::from_value(answers)?,
            current_question_index: index as usize,
            is_complete: row.try_get("is_complete")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn save_counseling(&self, state: &CounselingState) -> Result<()> {
        let questions = serde_json::to_value(&state.questions)?;
        let answers = serde_json::to_value(&state.answers)?;

        sqlx::query(
            r#"
            INSERT INTO counseling_sessions
                (session_id, step, initial_concern, questions, answers,
                 current_question_index, is_complete, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (session_id) DO UPDATE SET
                step = EXCLUDED.step,
                initial_concern = EXCLUDED.initial_concern,
                questions = EXCLUDED.questions,
                answers = EXCLUDED.answers,
                current_question_index = EXCLUDED.current_question_index,
                is_complete = EXCLUDED.is_complete,
                updated_at = NOW()
            "#,
        )
        .bind(&state.session_id)
        .bind(state.step.as_str())
        .bind(&state.initial_concern)
        .bind(questions)
        .bind(answers)
        .bind(state.current_question_index as i32)
        .bind(state.is_complete)
        .bind(state.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_counseling_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM counseling_sessions WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_verse(&self, verse: &VerseRecord) -> Result<()> {
        let embedding = verse.embedding.as_ref().map(|e| Vector::from(e.clone()));

        sqlx::query(
            r#"
            INSERT INTO bible_verses (book, chapter, verse, text, translation, embedding, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (translation, book, chapter, verse) DO UPDATE SET
                text = EXCLUDED.text,
                embedding = COALESCE(EXCLUDED.embedding, bible_verses.embedding),
                updated_at = NOW()
            "#,
        )
        .bind(&verse.book)
        .bind(verse.chapter)
        .bind(verse.verse)
        .bind(&verse.text)
        .bind(&verse.translation)
        .bind(embedding)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_embedded_verses(&self, limit: usize) -> Result<Vec<VerseRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT book, chapter, verse, text, translation, embedding
            FROM bible_verses
            WHERE embedding IS NOT NULL
            ORDER BY book, chapter, verse
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_verse).collect()
    }

    async fn list_unembedded_verses(&self) -> Result<Vec<VerseRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT book, chapter, verse, text, translation, embedding
            FROM bible_verses
            WHERE embedding IS NULL
            ORDER BY book, chapter, verse
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_verse).collect()
    }

    async fn clear_verses(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bible_verses")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
