use std::sync::Arc;

use anyhow::{Context, Result};
use common::{Config, PgStore, Store};
use content_fetcher::ArticleFetcher;
use hacker_news::HackerNewsAPI;
use ingest::{init_tracing, Pipeline, PipelineDeps};
use scheduler::IntervalScheduler;
use summarizer::build_summarizer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    init_tracing()?;

    let config = Config::from_env().context("Invalid configuration")?;
    let one_shot = config.one_shot || std::env::args().any(|arg| arg == "--one-shot");

    let store = PgStore::connect(&config.database)
        .await
        .context("Unable to connect to database")?;
    store.migrate().await.context("Failed to prepare schema")?;
    let store: Arc<dyn Store> = Arc::new(store);

    let summarizer = build_summarizer(&config.ai)?;
    info!("Using {} for summaries", summarizer.name());

    let deps = PipelineDeps {
        source: Arc::new(HackerNewsAPI::with_base_url(&config.hacker_news.api_base_url)?),
        store,
        fetcher: Arc::new(ArticleFetcher::new()?),
        summarizer,
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let pipeline = Pipeline::start(config.hacker_news.clone(), &config.summary, deps, cancel.clone());
    let crawler = pipeline.crawler();

    // First cycle runs immediately, the scheduler takes over after one interval.
    crawler.run_cycle().await;

    if one_shot {
        info!("One-shot mode: waiting for background work to finish");
        pipeline.shutdown().await;
        return Ok(());
    }

    let mut scheduler = IntervalScheduler::new().await?;
    scheduler.add_crawler(config.interval, crawler).await?;
    scheduler.start().await?;
    info!("Ingesting every {:?}, press Ctrl+C to stop", config.interval);

    cancel.cancelled().await;
    if let Err(e) = scheduler.shutdown().await {
        error!("Failed to stop scheduler: {}", e);
    }
    pipeline.shutdown().await;
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping...");
    cancel.cancel();
}
