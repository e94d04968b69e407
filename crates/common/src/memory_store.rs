use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CrawlerResult;
use crate::models::{AuthorRecord, CommentRecord, StoryRecord, SummaryJob};
use crate::store::{retention_order, Store};

#[derive(Default)]
struct Tables {
    stories: HashMap<i64, StoryRecord>,
    comments: HashMap<i64, CommentRecord>,
    users: HashMap<String, AuthorRecord>,
    protected: HashSet<i64>,
}

/// Process-local [`Store`], used by tests and for dry runs without a database.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a story as saved by a user so pruning never removes it.
    pub async fn protect_story(&self, id: i64) {
        self.tables.write().await.protected.insert(id);
    }

    pub async fn stories(&self) -> Vec<StoryRecord> {
        let mut stories: Vec<_> = self.tables.read().await.stories.values().cloned().collect();
        stories.sort_by_key(|s| s.id);
        stories
    }

    pub async fn comments(&self) -> Vec<CommentRecord> {
        let mut comments: Vec<_> = self.tables.read().await.comments.values().cloned().collect();
        comments.sort_by_key(|c| c.id);
        comments
    }

    pub async fn user(&self, username: &str) -> Option<AuthorRecord> {
        self.tables.read().await.users.get(username).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_story(&self, story: &StoryRecord) -> CrawlerResult<()> {
        let mut tables = self.tables.write().await;
        match tables.stories.get_mut(&story.id) {
            Some(existing) => {
                existing.title = story.title.clone();
                existing.url = story.url.clone();
                existing.score = story.score;
                existing.author = story.author.clone();
                existing.descendant_count = story.descendant_count;
                existing.posted_at = story.posted_at;
                existing.rank = story.rank;
            }
            None => {
                let mut fresh = story.clone();
                fresh.summary = None;
                fresh.topics = None;
                tables.stories.insert(story.id, fresh);
            }
        }
        Ok(())
    }

    async fn upsert_comment(&self, comment: &CommentRecord) -> CrawlerResult<()> {
        let mut tables = self.tables.write().await;
        tables.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn upsert_user(&self, author: &AuthorRecord) -> CrawlerResult<()> {
        let mut tables = self.tables.write().await;
        tables.users.insert(author.username.clone(), author.clone());
        Ok(())
    }

    async fn get_story(&self, id: i64) -> CrawlerResult<Option<StoryRecord>> {
        Ok(self.tables.read().await.stories.get(&id).cloned())
    }

    async fn get_stories_status(&self, ids: &[i64]) -> CrawlerResult<HashMap<i64, bool>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.stories.get(id).map(|s| (*id, s.has_summary())))
            .collect())
    }

    async fn clear_ranks_not_in(&self, ids: &[i64]) -> CrawlerResult<()> {
        let keep: HashSet<i64> = ids.iter().copied().collect();
        let mut tables = self.tables.write().await;
        for story in tables.stories.values_mut() {
            if story.rank.is_some() && !keep.contains(&story.id) {
                story.rank = None;
            }
        }
        Ok(())
    }

    async fn update_ranks(&self, ranks: &HashMap<i64, i32>) -> CrawlerResult<()> {
        let mut tables = self.tables.write().await;
        for (id, rank) in ranks {
            if let Some(story) = tables.stories.get_mut(id) {
                story.rank = Some(*rank);
            }
        }
        Ok(())
    }

    async fn update_story_summary_and_topics(
        &self,
        id: i64,
        summary: &str,
        topics: &[String],
    ) -> CrawlerResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(story) = tables.stories.get_mut(&id) {
            story.summary = Some(summary.to_string());
            story.topics = Some(topics.to_vec());
        }
        Ok(())
    }

    async fn prune_stories(&self, keep: usize) -> CrawlerResult<u64> {
        let mut tables = self.tables.write().await;
        let mut ordered: Vec<&StoryRecord> = tables.stories.values().collect();
        ordered.sort_by(|a, b| retention_order(a, b));

        let doomed: Vec<i64> = ordered
            .iter()
            .skip(keep)
            .map(|s| s.id)
            .filter(|id| !tables.protected.contains(id))
            .collect();

        for id in &doomed {
            tables.stories.remove(id);
        }
        let doomed_set: HashSet<i64> = doomed.iter().copied().collect();
        tables.comments.retain(|_, c| !doomed_set.contains(&c.story_id));

        Ok(doomed.len() as u64)
    }

    async fn stories_needing_enrichment(&self, limit: usize) -> CrawlerResult<Vec<SummaryJob>> {
        let tables = self.tables.read().await;
        let mut candidates: Vec<&StoryRecord> = tables
            .stories
            .values()
            .filter(|s| !s.url.is_empty() && !s.has_summary())
            .collect();
        candidates.sort_by(|a, b| retention_order(a, b));

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|s| SummaryJob {
                story_id: s.id,
                url: s.url.clone(),
                title: s.title.clone(),
            })
            .collect())
    }
}
