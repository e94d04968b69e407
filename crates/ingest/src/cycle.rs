use std::sync::Arc;

use async_trait::async_trait;
use common::{Crawler, CrawlerResult, HackerNewsConfig, Store};
use hacker_news::ContentSource;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::authors::AuthorSync;
use crate::discovery::discover;
use crate::processor::{run_story_pool, PoolStats, StoryProcessor};
use crate::pruner::prune;
use crate::summary_queue::SummaryQueue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub discovered: usize,
    pub stories: PoolStats,
    pub pruned: u64,
}

/// One full ingestion pass: discover, process, prune.
pub struct IngestCrawler {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn Store>,
    authors: AuthorSync,
    processor: Arc<StoryProcessor>,
    config: HackerNewsConfig,
    cancel: CancellationToken,
    running: Mutex<()>,
}

impl IngestCrawler {
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn Store>,
        authors: AuthorSync,
        queue: Arc<SummaryQueue>,
        config: HackerNewsConfig,
        cancel: CancellationToken,
    ) -> Self {
        let processor = Arc::new(StoryProcessor::new(
            source.clone(),
            store.clone(),
            authors.clone(),
            queue,
            config.min_score_threshold,
            cancel.clone(),
        ));
        Self {
            source,
            store,
            authors,
            processor,
            config,
            cancel,
            running: Mutex::new(()),
        }
    }

    /// Runs a cycle unless one is already in progress, in which case `None`.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("Previous ingestion cycle still running, skipping this tick");
            return None;
        };
        if self.cancel.is_cancelled() {
            return None;
        }

        info!("Starting ingestion cycle");
        self.authors.reset_cycle();

        let plan = discover(
            self.source.as_ref(),
            self.store.as_ref(),
            self.config.max_stories,
        )
        .await;
        let discovered = plan.ids.len();

        let summarized = match self.store.get_stories_status(&plan.ids).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to load summary status, processing every story: {}", e);
                Default::default()
            }
        };

        let stories = run_story_pool(
            self.processor.clone(),
            Arc::new(plan),
            Arc::new(summarized),
            self.config.worker_count,
            self.config.freshness_rank,
            self.cancel.clone(),
        )
        .await;

        let pruned = prune(self.store.as_ref(), self.config.retention).await;

        info!("Ingestion cycle finished");
        Some(CycleReport {
            discovered,
            stories,
            pruned,
        })
    }

    /// Resolves once no cycle is running.
    pub async fn wait_idle(&self) {
        let _idle = self.running.lock().await;
    }
}

#[async_trait]
impl Crawler for IngestCrawler {
    async fn run(&self) -> CrawlerResult<()> {
        self.run_cycle().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Hacker News ingest"
    }
}
