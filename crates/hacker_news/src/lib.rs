pub mod api;
pub mod models;

use async_trait::async_trait;
use common::CrawlerResult;

pub use api::HackerNewsAPI;
pub use models::{HNItem, HNUser, ItemKind};

/// Per-item lookups against the remote story/comment source.
///
/// Every call is a single bounded request; callers own any retry policy.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// `Ok(None)` when the id does not exist.
    async fn fetch_item(&self, id: i64) -> CrawlerResult<Option<HNItem>>;

    async fn fetch_user(&self, username: &str) -> CrawlerResult<Option<HNUser>>;

    /// Front-page ids, best ranked first.
    async fn fetch_top_ids(&self) -> CrawlerResult<Vec<i64>>;

    async fn fetch_new_ids(&self) -> CrawlerResult<Vec<i64>>;
}
