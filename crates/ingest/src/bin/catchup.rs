use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::{Config, PgStore, Store};
use content_fetcher::ArticleFetcher;
use ingest::{init_tracing, JobOutcome, SummaryJobRunner};
use summarizer::build_summarizer;
use tokio_util::sync::CancellationToken;
use tracing::info;

const PAUSE_BETWEEN_JOBS: Duration = Duration::from_secs(2);

/// Summarizes stories the live pipeline missed, one at a time.
#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    init_tracing()?;

    let config = Config::from_env().context("Invalid configuration")?;
    let store = PgStore::connect(&config.database)
        .await
        .context("Unable to connect to database")?;
    let store: Arc<dyn Store> = Arc::new(store);

    let runner = SummaryJobRunner::new(
        Arc::new(ArticleFetcher::new()?),
        build_summarizer(&config.ai)?,
        store.clone(),
        &config.summary,
    );

    let jobs = store
        .stories_needing_enrichment(config.summary.catchup_limit)
        .await
        .context("Failed to load stories needing summaries")?;
    info!("Found {} stories needing summaries", jobs.len());

    let cancel = CancellationToken::new();
    let mut saved = 0;
    for (index, job) in jobs.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(PAUSE_BETWEEN_JOBS).await;
        }
        if let JobOutcome::Saved { .. } = runner.run(job, &cancel).await {
            saved += 1;
        }
    }

    info!("Catch-up finished: {}/{} stories summarized", saved, jobs.len());
    Ok(())
}
