use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CrawlerResult;
use crate::models::{AuthorRecord, CommentRecord, StoryRecord, SummaryJob};

/// Persistence operations the ingestion pipeline relies on.
///
/// Implementations must tolerate concurrent calls from many workers, and every
/// upsert must leave the same state whether it is applied once or repeatedly.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or refresh a story. Mutable fields (score, descendants, rank) are
    /// overwritten; `summary` and `topics` are never touched by this call.
    async fn upsert_story(&self, story: &StoryRecord) -> CrawlerResult<()>;

    async fn upsert_comment(&self, comment: &CommentRecord) -> CrawlerResult<()>;

    async fn upsert_user(&self, author: &AuthorRecord) -> CrawlerResult<()>;

    async fn get_story(&self, id: i64) -> CrawlerResult<Option<StoryRecord>>;

    /// Maps each known id to whether it already carries a non-empty summary.
    /// Unknown ids are absent from the map.
    async fn get_stories_status(&self, ids: &[i64]) -> CrawlerResult<HashMap<i64, bool>>;

    /// Clears the rank of every ranked story whose id is not in `ids`; an
    /// empty slice clears every rank.
    async fn clear_ranks_not_in(&self, ids: &[i64]) -> CrawlerResult<()>;

    /// Sets ranks on stories that already exist; unknown ids are ignored.
    async fn update_ranks(&self, ranks: &HashMap<i64, i32>) -> CrawlerResult<()>;

    async fn update_story_summary_and_topics(
        &self,
        id: i64,
        summary: &str,
        topics: &[String],
    ) -> CrawlerResult<()>;

    /// Deletes stories beyond the first `keep` (rank ascending with nulls last,
    /// then newest first), skipping protected ones. Returns the number deleted.
    async fn prune_stories(&self, keep: usize) -> CrawlerResult<u64>;

    /// Stories with a url whose summary or topics are still missing, best
    /// ranked first.
    async fn stories_needing_enrichment(&self, limit: usize) -> CrawlerResult<Vec<SummaryJob>>;
}

/// Ordering used for retention and catch-up: ranked first, then newest.
pub(crate) fn retention_order(a: &StoryRecord, b: &StoryRecord) -> std::cmp::Ordering {
    match (a.rank, b.rank) {
        (Some(ra), Some(rb)) => ra.cmp(&rb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
    .then_with(|| b.posted_at.cmp(&a.posted_at))
    .then_with(|| b.id.cmp(&a.id))
}
