pub mod authors;
pub mod cycle;
pub mod discovery;
pub mod processor;
pub mod pruner;
pub mod summary_queue;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use common::{HackerNewsConfig, Store, SummaryConfig};
use content_fetcher::ArticleSource;
use hacker_news::ContentSource;
use summarizer::Summarizer;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub use authors::{AuthorSync, MAX_CONCURRENT_AUTHOR_FETCHES};
pub use cycle::{CycleReport, IngestCrawler};
pub use summary_queue::{EnqueueOutcome, JobOutcome, RateGate, SummaryJobRunner, SummaryQueue, SummaryWorkers};

/// External collaborators the pipeline is wired against.
pub struct PipelineDeps {
    pub source: Arc<dyn ContentSource>,
    pub store: Arc<dyn Store>,
    pub fetcher: Arc<dyn ArticleSource>,
    pub summarizer: Arc<dyn Summarizer>,
}

/// The ingestion crawler plus the background summary and author pools it feeds.
pub struct Pipeline {
    crawler: Arc<IngestCrawler>,
    queue: Arc<SummaryQueue>,
    workers: SummaryWorkers,
    authors: AuthorSync,
}

impl Pipeline {
    /// Spawns the summary workers. Must be called inside a Tokio runtime.
    pub fn start(
        hacker_news: HackerNewsConfig,
        summary: &SummaryConfig,
        deps: PipelineDeps,
        cancel: CancellationToken,
    ) -> Self {
        let (queue, receiver) = SummaryQueue::bounded(summary.queue_capacity);
        let runner = Arc::new(SummaryJobRunner::new(
            deps.fetcher,
            deps.summarizer,
            deps.store.clone(),
            summary,
        ));
        let workers = SummaryWorkers::spawn(
            summary.workers,
            receiver,
            Arc::new(RateGate::new(summary.interval)),
            runner,
            cancel.clone(),
        );
        let authors = AuthorSync::new(
            deps.source.clone(),
            deps.store.clone(),
            MAX_CONCURRENT_AUTHOR_FETCHES,
        );
        let crawler = Arc::new(IngestCrawler::new(
            deps.source,
            deps.store,
            authors.clone(),
            queue.clone(),
            hacker_news,
            cancel,
        ));

        Self {
            crawler,
            queue,
            workers,
            authors,
        }
    }

    pub fn crawler(&self) -> Arc<IngestCrawler> {
        self.crawler.clone()
    }

    /// Lets the running cycle finish, then drains queued summaries and
    /// pending author fetches. With a cancelled token the drain stops early.
    pub async fn shutdown(self) {
        self.crawler.wait_idle().await;
        self.queue.close();
        info!("Waiting for summary workers to drain...");
        self.workers.drain().await;
        self.authors.shutdown().await;
        info!("Pipeline stopped");
    }
}

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
