use std::time::Duration;

use async_trait::async_trait;
use common::{CrawlerError, CrawlerResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{build_prompt, with_retry, RetryPolicy, Summarizer};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: String,
}

/// Hosted backend speaking the OpenAI-compatible chat completions protocol.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: Option<&str>,
        retry: RetryPolicy,
    ) -> CrawlerResult<Self> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            retry,
        })
    }

    async fn complete(&self, prompt: &str) -> CrawlerResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "messages": [{"role": "user", "content": prompt}],
            "model": self.model,
            "response_format": {"type": "json_object"}
        });

        let res = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = res.text().await.unwrap_or_default();
            return Err(CrawlerError::Quota(format!("{} - {}", status, text)));
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(CrawlerError::Api(format!("Request failed: {} - {}", status, text)));
        }

        let resp: ChatCompletionResponse = res
            .json()
            .await
            .map_err(|e| CrawlerError::Api(format!("Failed to decode completion: {}", e)))?;
        let content = resp
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(CrawlerError::Api("Empty completion from hosted backend".to_string()));
        }
        Ok(content)
    }
}

#[async_trait]
impl Summarizer for ChatCompletionsClient {
    async fn generate_summary(
        &self,
        title: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> CrawlerResult<String> {
        info!("Hosted model {}: summarizing {:?}", self.model, title);
        let prompt = build_prompt(title, text);
        with_retry(&self.retry, cancel, self.name(), || self.complete(&prompt)).await
    }

    fn name(&self) -> &'static str {
        "Hosted chat"
    }
}
