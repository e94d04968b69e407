use async_trait::async_trait;
use crate::error::CrawlerResult;

/// A unit of periodic work the scheduler can drive.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn run(&self) -> CrawlerResult<()>;
    fn name(&self) -> &'static str;
}
