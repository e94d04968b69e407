use std::time::Duration;

use async_trait::async_trait;
use common::{CrawlerError, CrawlerResult};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::models::{HNItem, HNUser};
use crate::ContentSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HackerNewsAPI {
    client: Client,
    base_url: String,
}

impl HackerNewsAPI {
    pub fn with_base_url(base_url: &str) -> CrawlerResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The API answers `null` for ids and usernames it does not know.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CrawlerResult<Option<T>> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CrawlerError::Api(format!("GET {} returned {}", url, status)));
        }

        let body = resp.text().await?;
        serde_json::from_str::<Option<T>>(&body)
            .map_err(|e| CrawlerError::Parse(format!("Malformed payload from {}: {}", url, e)))
    }

    async fn get_id_list(&self, path: &str) -> CrawlerResult<Vec<i64>> {
        Ok(self.get_json::<Vec<i64>>(path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl ContentSource for HackerNewsAPI {
    async fn fetch_item(&self, id: i64) -> CrawlerResult<Option<HNItem>> {
        self.get_json(&format!("item/{}.json", id)).await
    }

    async fn fetch_user(&self, username: &str) -> CrawlerResult<Option<HNUser>> {
        self.get_json(&format!("user/{}.json", username)).await
    }

    async fn fetch_top_ids(&self) -> CrawlerResult<Vec<i64>> {
        self.get_id_list("topstories.json").await
    }

    async fn fetch_new_ids(&self) -> CrawlerResult<Vec<i64>> {
        self.get_id_list("newstories.json").await
    }
}
