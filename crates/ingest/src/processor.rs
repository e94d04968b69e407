use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::{CrawlerResult, Store, SummaryJob};
use hacker_news::{ContentSource, HNItem};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::authors::AuthorSync;
use crate::discovery::DiscoveryPlan;
use crate::summary_queue::SummaryQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryOutcome {
    Stored { comments: usize },
    Missing,
    NotAStory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Ingests one story at a time: the story row, its comment tree, its authors,
/// and a summary job when the story is worth enriching.
pub struct StoryProcessor {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn Store>,
    authors: AuthorSync,
    queue: Arc<SummaryQueue>,
    min_score_threshold: i64,
    cancel: CancellationToken,
}

impl StoryProcessor {
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn Store>,
        authors: AuthorSync,
        queue: Arc<SummaryQueue>,
        min_score_threshold: i64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            authors,
            queue,
            min_score_threshold,
            cancel,
        }
    }

    pub async fn process_story(&self, id: i64, rank: Option<i32>) -> CrawlerResult<StoryOutcome> {
        let Some(item) = self.source.fetch_item(id).await? else {
            debug!("Story {} no longer exists", id);
            return Ok(StoryOutcome::Missing);
        };
        if !item.is_story() {
            debug!("Item {} is not a story, skipping", id);
            return Ok(StoryOutcome::NotAStory);
        }

        self.store.upsert_story(&item.to_story_record(rank)).await?;
        self.authors.submit(&item.by);

        let comments = self.walk_comments(item.id, &item.kids).await;
        self.maybe_enqueue(&item).await;

        Ok(StoryOutcome::Stored { comments })
    }

    /// Depth-first walk over the reply tree, parents stored before children.
    /// Returns the number of comments persisted.
    pub async fn walk_comments(&self, story_id: i64, kids: &[i64]) -> usize {
        let mut stack: Vec<(i64, Option<i64>)> = kids.iter().rev().map(|kid| (*kid, None)).collect();
        let mut visited = HashSet::from([story_id]);
        let mut stored = 0;

        while let Some((id, parent_id)) = stack.pop() {
            if self.cancel.is_cancelled() {
                break;
            }
            if !visited.insert(id) {
                warn!("Comment {} already visited under story {}, skipping", id, story_id);
                continue;
            }

            let item = match self.source.fetch_item(id).await {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to fetch comment {}: {}", id, e);
                    continue;
                }
            };
            if !item.is_live_comment() {
                continue;
            }

            match self
                .store
                .upsert_comment(&item.to_comment_record(story_id, parent_id))
                .await
            {
                Ok(()) => stored += 1,
                Err(e) => warn!("Failed to save comment {}: {}", id, e),
            }
            self.authors.submit(&item.by);

            stack.extend(item.kids.iter().rev().map(|kid| (*kid, Some(item.id))));
        }

        stored
    }

    async fn maybe_enqueue(&self, item: &HNItem) {
        if item.url.is_empty() || item.score <= self.min_score_threshold {
            return;
        }

        match self.store.get_story(item.id).await {
            Ok(Some(story)) if !story.has_summary() => {
                self.queue.try_enqueue(SummaryJob {
                    story_id: item.id,
                    url: item.url.clone(),
                    title: item.title.clone(),
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to check summary state of story {}: {}", item.id, e),
        }
    }
}

/// True when a story already has a summary and sits off the front of the
/// top list, so its row and comments are left as they are this cycle.
pub fn should_skip(summarized: bool, rank: Option<i32>, freshness_rank: i32) -> bool {
    summarized && rank.map_or(true, |r| r > freshness_rank)
}

/// Processes every id in `plan` with `workers` concurrent tasks.
pub async fn run_story_pool(
    processor: Arc<StoryProcessor>,
    plan: Arc<DiscoveryPlan>,
    summarized: Arc<HashMap<i64, bool>>,
    workers: usize,
    freshness_rank: i32,
    cancel: CancellationToken,
) -> PoolStats {
    let (tx, rx) = mpsc::channel(plan.ids.len().max(1));
    for id in &plan.ids {
        if tx.try_send(*id).is_err() {
            break;
        }
    }
    drop(tx);

    let rx = Arc::new(Mutex::new(rx));
    let mut tasks = JoinSet::new();

    for _ in 0..workers.max(1) {
        let rx = rx.clone();
        let processor = processor.clone();
        let plan = plan.clone();
        let summarized = summarized.clone();
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let mut stats = PoolStats::default();
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let Some(id) = rx.lock().await.recv().await else {
                    break;
                };

                let rank = plan.rank_of(id);
                let has_summary = summarized.get(&id).copied().unwrap_or(false);
                if should_skip(has_summary, rank, freshness_rank) {
                    stats.skipped += 1;
                    continue;
                }

                match processor.process_story(id, rank).await {
                    Ok(StoryOutcome::Stored { .. }) => stats.stored += 1,
                    Ok(_) => stats.skipped += 1,
                    Err(e) => {
                        warn!("Failed to process story {}: {}", id, e);
                        stats.failed += 1;
                    }
                }
            }
            stats
        });
    }

    let mut total = PoolStats::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(stats) => {
                total.stored += stats.stored;
                total.skipped += stats.skipped;
                total.failed += stats.failed;
            }
            Err(e) => error!("Story worker panicked: {}", e),
        }
    }

    info!(
        "Processed {} stories ({} skipped, {} failed)",
        total.stored, total.skipped, total.failed
    );
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::build_plan;
    use crate::test_support::{eventually, FakeSource};
    use common::MemoryStore;
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;
    use tokio::sync::Notify;

    struct Harness {
        source: Arc<FakeSource>,
        store: Arc<MemoryStore>,
        processor: Arc<StoryProcessor>,
        jobs: Receiver<SummaryJob>,
    }

    fn harness(source: FakeSource) -> Harness {
        let source = Arc::new(source);
        let store = Arc::new(MemoryStore::new());
        let (queue, jobs) = SummaryQueue::bounded(10);
        let authors = AuthorSync::new(source.clone(), store.clone(), 4);
        let processor = Arc::new(StoryProcessor::new(
            source.clone(),
            store.clone(),
            authors,
            queue,
            10,
            CancellationToken::new(),
        ));
        Harness {
            source,
            store,
            processor,
            jobs,
        }
    }

    #[test]
    fn skip_rule() {
        assert!(should_skip(true, None, 50));
        assert!(should_skip(true, Some(51), 50));
        assert!(!should_skip(true, Some(50), 50));
        assert!(!should_skip(true, Some(1), 50));
        assert!(!should_skip(false, None, 50));
    }

    #[tokio::test]
    async fn comment_tree_keeps_parents_and_skips_dead_branches() {
        let source = FakeSource::new()
            .story(1, 100, "https://example.com/1", vec![2, 3])
            .comment(2, "bob", vec![4])
            .deleted_comment(3, vec![6])
            .comment(4, "carol", vec![5])
            .comment(5, "bob", vec![])
            .comment(6, "dave", vec![]);
        let h = harness(source);

        let outcome = h.processor.process_story(1, Some(1)).await.unwrap();

        assert_eq!(outcome, StoryOutcome::Stored { comments: 3 });
        let comments = h.store.comments().await;
        let parents: Vec<_> = comments.iter().map(|c| (c.id, c.parent_id)).collect();
        assert_eq!(parents, vec![(2, None), (4, Some(2)), (5, Some(4))]);
        assert!(comments.iter().all(|c| c.story_id == 1));
        assert_eq!(h.source.fetch_count(6), 0);
    }

    #[tokio::test]
    async fn cyclic_replies_are_visited_once() {
        let source = FakeSource::new()
            .story(1, 5, "", vec![2])
            .comment(2, "bob", vec![3, 1])
            .comment(3, "bob", vec![2]);
        let h = harness(source);

        let outcome = h.processor.process_story(1, None).await.unwrap();

        assert_eq!(outcome, StoryOutcome::Stored { comments: 2 });
        assert_eq!(h.source.fetch_count(1), 1);
        assert_eq!(h.source.fetch_count(2), 1);
        assert_eq!(h.source.fetch_count(3), 1);
    }

    #[tokio::test]
    async fn failed_comment_fetch_leaves_siblings_intact() {
        let source = FakeSource::new()
            .story(1, 5, "", vec![2, 3])
            .comment(2, "bob", vec![])
            .comment(3, "bob", vec![])
            .failing(2);
        let h = harness(source);

        let outcome = h.processor.process_story(1, None).await.unwrap();

        assert_eq!(outcome, StoryOutcome::Stored { comments: 1 });
        assert_eq!(h.store.comments().await[0].id, 3);
    }

    #[tokio::test]
    async fn enqueues_only_scored_stories_with_urls() {
        let source = FakeSource::new()
            .story(1, 100, "https://example.com/1", vec![])
            .story(2, 100, "", vec![])
            .story(3, 10, "https://example.com/3", vec![]);
        let mut h = harness(source);

        for id in 1..=3 {
            h.processor.process_story(id, None).await.unwrap();
        }

        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.story_id, 1);
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn summarized_story_is_not_enqueued_again() {
        let source = FakeSource::new().story(1, 100, "https://example.com/1", vec![]);
        let mut h = harness(source);
        h.processor.process_story(1, Some(3)).await.unwrap();
        h.jobs.try_recv().unwrap();
        h.store
            .update_story_summary_and_topics(1, "- done", &["rust".to_string()])
            .await
            .unwrap();

        h.processor.process_story(1, Some(3)).await.unwrap();

        assert!(h.jobs.try_recv().is_err());
        let story = h.store.get_story(1).await.unwrap().unwrap();
        assert_eq!(story.summary.as_deref(), Some("- done"));
    }

    #[tokio::test]
    async fn summary_without_topics_is_not_requeued() {
        let source = FakeSource::new().story(1, 100, "https://example.com/1", vec![]);
        let mut h = harness(source);
        h.processor.process_story(1, Some(3)).await.unwrap();
        h.jobs.try_recv().unwrap();
        h.store
            .update_story_summary_and_topics(1, "The article explains lifetimes.", &[])
            .await
            .unwrap();

        for _ in 0..3 {
            h.processor.process_story(1, Some(3)).await.unwrap();
        }

        assert!(h.jobs.try_recv().is_err());
        let story = h.store.get_story(1).await.unwrap().unwrap();
        assert_eq!(story.summary.as_deref(), Some("The article explains lifetimes."));
    }

    #[tokio::test]
    async fn slow_author_lookup_never_delays_the_story() {
        let gate = Arc::new(Notify::new());
        let source = FakeSource::new()
            .story(1, 5, "", vec![2])
            .comment(2, "bob", vec![])
            .user("alice")
            .user("bob")
            .gate_users(gate.clone());
        let h = harness(source);

        let outcome = tokio::time::timeout(Duration::from_secs(1), h.processor.process_story(1, Some(1)))
            .await
            .expect("story processing must not wait on author lookups")
            .unwrap();

        assert_eq!(outcome, StoryOutcome::Stored { comments: 1 });
        assert!(h.store.get_story(1).await.unwrap().is_some());
        assert_eq!(h.store.user_count().await, 0);

        let store = h.store.clone();
        eventually(|| {
            gate.notify_one();
            let store = store.clone();
            async move { store.user_count().await == 2 }
        })
        .await;
    }

    #[tokio::test]
    async fn non_story_items_are_ignored() {
        let source = FakeSource::new().comment(2, "bob", vec![]);
        let h = harness(source);

        assert_eq!(h.processor.process_story(2, None).await.unwrap(), StoryOutcome::NotAStory);
        assert_eq!(h.processor.process_story(99, None).await.unwrap(), StoryOutcome::Missing);
        assert!(h.store.stories().await.is_empty());
    }

    #[tokio::test]
    async fn pool_skips_fresh_summaries_and_survives_failures() {
        let source = FakeSource::new()
            .story(5, 20, "", vec![])
            .story(3, 20, "", vec![])
            .story(9, 20, "", vec![])
            .story(7, 20, "", vec![])
            .failing(3);
        let h = harness(source);
        let plan = Arc::new(build_plan(&[5, 3, 9], &[9, 7], 200));
        let summarized = Arc::new(HashMap::from([(7, true), (9, true)]));

        let stats = run_story_pool(
            h.processor.clone(),
            plan,
            summarized,
            4,
            2,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(
            stats,
            PoolStats {
                stored: 1,
                skipped: 2,
                failed: 1
            }
        );
        assert_eq!(h.source.fetch_count(9), 0);
        assert_eq!(h.source.fetch_count(7), 0);
        let stories = h.store.stories().await;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].rank, Some(1));
    }
}
