use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub score: i64,
    pub author: String,
    pub descendant_count: i64,
    #[serde(with = "time::serde::timestamp")]
    pub posted_at: OffsetDateTime,
    pub rank: Option<i32>,
    pub summary: Option<String>,
    pub topics: Option<Vec<String>>,
}

impl StoryRecord {
    /// A whitespace-only summary counts as missing.
    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub story_id: i64,
    /// `None` for top-level comments.
    pub parent_id: Option<i64>,
    pub text: String,
    pub author: String,
    #[serde(with = "time::serde::timestamp")]
    pub posted_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub username: String,
    pub created_at: i64,
    pub karma: i64,
    pub about: String,
    pub submitted_ids: Vec<i64>,
}

/// One pending "fetch article, summarize, persist" unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryJob {
    pub story_id: i64,
    pub url: String,
    pub title: String,
}

pub fn timestamp_to_datetime(unix: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(unix).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
