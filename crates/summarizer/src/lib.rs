pub mod chat;
pub mod ollama;
pub mod response;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::{AiBackend, AiConfig};
use common::{CrawlerError, CrawlerResult};
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use chat::ChatCompletionsClient;
pub use ollama::OllamaClient;
pub use response::{parse_summary_response, LooseField, ParsedSummary};

/// Produces the raw model output for one article. Parsing is left to the caller.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn generate_summary(
        &self,
        title: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> CrawlerResult<String>;

    fn name(&self) -> &'static str;
}

pub fn build_prompt(title: &str, text: &str) -> String {
    format!(
        r#"Analyze this Hacker News story and provide a high-quality technical summary.
Return ONLY a JSON object with two keys:
1. "summary": A FLAT JSON array of exactly 5 strings (DO NOT use nested arrays or objects). Each string is a single key point.
2. "topics": A FLAT JSON array of 5 relevant tags (plain strings).

Title: {}
Text: {}"#,
        title, text
    )
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delays between attempts: base, 2×base, 4×base, ...
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        (0..self.max_attempts.saturating_sub(1) as u32).map(move |n| base * 2u32.pow(n))
    }
}

/// Runs `operation` under `policy`, retrying transient failures. Cancellation
/// wins over both the in-flight attempt and any pending backoff.
pub async fn with_retry<F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    backend: &str,
    operation: F,
) -> CrawlerResult<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CrawlerResult<String>>,
{
    let max_attempts = policy.max_attempts;
    let mut failures = 0usize;
    let condition = |e: &CrawlerError| {
        failures += 1;
        let retry = e.is_transient();
        if retry && failures < max_attempts {
            warn!(
                "{}: request failed (attempt {}/{}), backing off: {}",
                backend, failures, max_attempts, e
            );
        }
        retry
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(CrawlerError::Cancelled),
        result = RetryIf::spawn(policy.delays(), operation, condition) => result,
    }
}

pub fn build_summarizer(config: &AiConfig) -> CrawlerResult<Arc<dyn Summarizer>> {
    Ok(match config.backend {
        AiBackend::Ollama => Arc::new(OllamaClient::new(
            &config.base_url,
            config.model.as_deref(),
            RetryPolicy::default(),
        )?),
        AiBackend::OpenAi => {
            let api_key = config.require_api_key()?;
            Arc::new(ChatCompletionsClient::new(
                &config.base_url,
                api_key,
                config.model.as_deref(),
                RetryPolicy::default(),
            )?)
        }
    })
}
