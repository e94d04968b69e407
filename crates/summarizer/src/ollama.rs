use std::time::Duration;

use async_trait::async_trait;
use common::{CrawlerError, CrawlerResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{build_prompt, with_retry, RetryPolicy, Summarizer};

const DEFAULT_MODEL: &str = "llama3:latest";
// CPU inference on long articles is slow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for a local Ollama server's `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    http_client: Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: Option<&str>, retry: RetryPolicy) -> CrawlerResult<Self> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            retry,
        })
    }

    async fn generate(&self, prompt: &str) -> CrawlerResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        let res = self.http_client.post(&url).json(&body).send().await?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = res.text().await.unwrap_or_default();
            return Err(CrawlerError::Quota(format!("{} - {}", status, text)));
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(CrawlerError::Api(format!("Ollama request failed: {} - {}", status, text)));
        }

        let resp: GenerateResponse = res
            .json()
            .await
            .map_err(|e| CrawlerError::Api(format!("Failed to decode Ollama response: {}", e)))?;
        if resp.response.trim().is_empty() {
            return Err(CrawlerError::Api("Empty generate response from Ollama".to_string()));
        }
        Ok(resp.response)
    }
}

#[async_trait]
impl Summarizer for OllamaClient {
    async fn generate_summary(
        &self,
        title: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> CrawlerResult<String> {
        info!(
            "Ollama: summarizing {:?} ({} chars of input)",
            title,
            text.chars().count()
        );
        let prompt = build_prompt(title, text);
        with_retry(&self.retry, cancel, self.name(), || self.generate(&prompt)).await
    }

    fn name(&self) -> &'static str {
        "Ollama"
    }
}
