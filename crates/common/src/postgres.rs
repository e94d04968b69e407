use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::CrawlerResult;
use crate::models::{AuthorRecord, CommentRecord, StoryRecord, SummaryJob};
use crate::store::Store;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS stories (
        id BIGINT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL DEFAULT '',
        score BIGINT NOT NULL DEFAULT 0,
        by TEXT NOT NULL DEFAULT '',
        descendants BIGINT NOT NULL DEFAULT 0,
        posted_at TIMESTAMPTZ NOT NULL,
        hn_rank INTEGER,
        summary TEXT,
        topics TEXT[],
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS stories_hn_rank_idx ON stories (hn_rank)",
    "CREATE TABLE IF NOT EXISTS comments (
        id BIGINT PRIMARY KEY,
        story_id BIGINT NOT NULL,
        parent_id BIGINT,
        text TEXT NOT NULL DEFAULT '',
        by TEXT NOT NULL DEFAULT '',
        posted_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS comments_story_id_idx ON comments (story_id)",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        created BIGINT NOT NULL DEFAULT 0,
        karma BIGINT NOT NULL DEFAULT 0,
        about TEXT NOT NULL DEFAULT '',
        submitted BIGINT[] NOT NULL DEFAULT '{}',
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS saved_stories (
        user_id TEXT NOT NULL,
        story_id BIGINT NOT NULL,
        saved_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (user_id, story_id)
    )",
];

const STORY_COLUMNS: &str =
    "id, title, url, score, by, descendants, posted_at, hn_rank, summary, topics";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> CrawlerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates the pipeline's tables when they are missing.
    pub async fn migrate(&self) -> CrawlerResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }
}

fn story_from_row(row: &sqlx::postgres::PgRow) -> Result<StoryRecord, sqlx::Error> {
    Ok(StoryRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        score: row.try_get("score")?,
        author: row.try_get("by")?,
        descendant_count: row.try_get("descendants")?,
        posted_at: row.try_get("posted_at")?,
        rank: row.try_get("hn_rank")?,
        summary: row.try_get("summary")?,
        topics: row.try_get("topics")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_story(&self, story: &StoryRecord) -> CrawlerResult<()> {
        sqlx::query(
            "INSERT INTO stories (id, title, url, score, by, descendants, posted_at, hn_rank)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE
             SET title = EXCLUDED.title,
                 url = EXCLUDED.url,
                 score = EXCLUDED.score,
                 by = EXCLUDED.by,
                 descendants = EXCLUDED.descendants,
                 posted_at = EXCLUDED.posted_at,
                 hn_rank = EXCLUDED.hn_rank",
        )
        .bind(story.id)
        .bind(&story.title)
        .bind(&story.url)
        .bind(story.score)
        .bind(&story.author)
        .bind(story.descendant_count)
        .bind(story.posted_at)
        .bind(story.rank)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_comment(&self, comment: &CommentRecord) -> CrawlerResult<()> {
        sqlx::query(
            "INSERT INTO comments (id, story_id, parent_id, text, by, posted_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE
             SET text = EXCLUDED.text,
                 posted_at = EXCLUDED.posted_at",
        )
        .bind(comment.id)
        .bind(comment.story_id)
        .bind(comment.parent_id)
        .bind(&comment.text)
        .bind(&comment.author)
        .bind(comment.posted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, author: &AuthorRecord) -> CrawlerResult<()> {
        sqlx::query(
            "INSERT INTO users (id, created, karma, about, submitted, updated_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             ON CONFLICT (id) DO UPDATE
             SET karma = EXCLUDED.karma,
                 about = EXCLUDED.about,
                 submitted = EXCLUDED.submitted,
                 updated_at = NOW()",
        )
        .bind(&author.username)
        .bind(author.created_at)
        .bind(author.karma)
        .bind(&author.about)
        .bind(&author.submitted_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_story(&self, id: i64) -> CrawlerResult<Option<StoryRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM stories WHERE id = $1", STORY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(story_from_row).transpose()?)
    }

    async fn get_stories_status(&self, ids: &[i64]) -> CrawlerResult<HashMap<i64, bool>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT id, (summary IS NOT NULL AND btrim(summary) <> '') AS has_summary
             FROM stories WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut status = HashMap::with_capacity(rows.len());
        for row in rows {
            status.insert(row.try_get("id")?, row.try_get("has_summary")?);
        }
        Ok(status)
    }

    async fn clear_ranks_not_in(&self, ids: &[i64]) -> CrawlerResult<()> {
        sqlx::query("UPDATE stories SET hn_rank = NULL WHERE hn_rank IS NOT NULL AND id <> ALL($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_ranks(&self, ranks: &HashMap<i64, i32>) -> CrawlerResult<()> {
        if ranks.is_empty() {
            return Ok(());
        }
        let (ids, values): (Vec<i64>, Vec<i32>) = ranks.iter().map(|(id, r)| (*id, *r)).unzip();
        sqlx::query(
            "UPDATE stories AS s SET hn_rank = r.rank
             FROM UNNEST($1::BIGINT[], $2::INTEGER[]) AS r(id, rank)
             WHERE s.id = r.id",
        )
        .bind(&ids)
        .bind(&values)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_story_summary_and_topics(
        &self,
        id: i64,
        summary: &str,
        topics: &[String],
    ) -> CrawlerResult<()> {
        sqlx::query("UPDATE stories SET summary = $1, topics = $2 WHERE id = $3")
            .bind(summary)
            .bind(topics)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_stories(&self, keep: usize) -> CrawlerResult<u64> {
        let mut tx = self.pool.begin().await?;

        let doomed: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM (
                 SELECT id FROM stories
                 ORDER BY hn_rank ASC NULLS LAST, posted_at DESC, id DESC
                 OFFSET $1
             ) AS beyond
             WHERE id NOT IN (SELECT story_id FROM saved_stories)",
        )
        .bind(keep as i64)
        .fetch_all(&mut *tx)
        .await?;

        if doomed.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        sqlx::query("DELETE FROM comments WHERE story_id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM stories WHERE id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    async fn stories_needing_enrichment(&self, limit: usize) -> CrawlerResult<Vec<SummaryJob>> {
        let rows = sqlx::query(
            "SELECT id, title, url FROM stories
             WHERE url <> ''
               AND (summary IS NULL OR btrim(summary) = '')
             ORDER BY hn_rank ASC NULLS LAST, posted_at DESC
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(SummaryJob {
                story_id: row.try_get("id")?,
                title: row.try_get("title")?,
                url: row.try_get("url")?,
            });
        }
        Ok(jobs)
    }
}
