use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::Crawler;
use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Runs jobs on a fixed period, starting one period after `start`.
pub struct IntervalScheduler {
    scheduler: JobScheduler,
}

impl IntervalScheduler {
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self { scheduler })
    }

    pub async fn add_interval_job<F, Fut>(&mut self, period: Duration, job_fn: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        info!("Scheduling job every {:?}", period);

        let job_fn = Arc::new(job_fn);
        let job = Job::new_repeated_async(period, move |_uuid, _l| {
            let job_fn = job_fn.clone();
            Box::pin(async move {
                info!("Executing scheduled job at {}", OffsetDateTime::now_utc());
                match job_fn().await {
                    Ok(()) => info!("Scheduled job completed"),
                    Err(e) => error!("Scheduled job failed: {}", e),
                }
            })
        })?;

        self.scheduler.add(job).await?;
        Ok(())
    }

    pub async fn add_crawler(&mut self, period: Duration, crawler: Arc<dyn Crawler>) -> Result<()> {
        info!("Registering {} every {:?}", crawler.name(), period);
        self.add_interval_job(period, move || {
            let crawler = crawler.clone();
            async move { crawler.run().await.map_err(anyhow::Error::from) }
        })
        .await
    }

    pub async fn start(&self) -> Result<()> {
        info!("Starting scheduler...");
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down scheduler...");
        self.scheduler.shutdown().await?;
        Ok(())
    }
}
