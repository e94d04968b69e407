use std::env;
use std::time::Duration;
use anyhow::{Result, Context};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBackend {
    Ollama,
    OpenAi,
}

impl AiBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" | "local" => Ok(AiBackend::Ollama),
            "openai" | "hosted" => Ok(AiBackend::OpenAi),
            other => anyhow::bail!("Unknown AI_BACKEND '{}' (expected 'ollama' or 'openai')", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub backend: AiBackend,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl AiConfig {
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("AI_API_KEY must be set when AI_BACKEND=openai")
    }
}

#[derive(Debug, Clone)]
pub struct HackerNewsConfig {
    pub api_base_url: String,
    pub worker_count: usize,
    pub max_stories: usize,
    pub min_score_threshold: i64,
    pub freshness_rank: i32,
    pub retention: usize,
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://hacker-news.firebaseio.com/v0".to_string(),
            worker_count: 4,
            max_stories: 200,
            min_score_threshold: 10,
            freshness_rank: 50,
            retention: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    pub interval: Duration,
    pub min_content_chars: usize,
    pub max_content_chars: usize,
    pub catchup_limit: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 500,
            workers: 1,
            interval: Duration::from_secs(5),
            min_content_chars: 100,
            max_content_chars: 20_000,
            catchup_limit: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub interval: Duration,
    pub one_shot: bool,
    pub hacker_news: HackerNewsConfig,
    pub summary: SummaryConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;
        if database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL must not be empty");
        }

        let backend = match env::var("AI_BACKEND") {
            Ok(value) => AiBackend::parse(&value)?,
            Err(_) => AiBackend::Ollama,
        };
        let base_url = env::var("AI_BASE_URL")
            .or_else(|_| env::var("OLLAMA_URL"))
            .unwrap_or_else(|_| "http://ollama:11434".to_string());

        let hn_defaults = HackerNewsConfig::default();
        let hacker_news = HackerNewsConfig {
            api_base_url: env::var("HN_API_BASE_URL").unwrap_or(hn_defaults.api_base_url),
            worker_count: env_parse("HN_WORKER_COUNT")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(hn_defaults.worker_count),
            max_stories: env_parse("HN_MAX_STORIES").unwrap_or(hn_defaults.max_stories),
            min_score_threshold: env_parse("HN_MIN_SCORE_THRESHOLD")
                .unwrap_or(hn_defaults.min_score_threshold),
            freshness_rank: env_parse("HN_FRESHNESS_RANK").unwrap_or(hn_defaults.freshness_rank),
            retention: env_parse("HN_RETENTION").unwrap_or(hn_defaults.retention),
        };

        let summary_defaults = SummaryConfig::default();
        let summary = SummaryConfig {
            queue_capacity: env_parse("SUMMARY_QUEUE_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(summary_defaults.queue_capacity),
            workers: env_parse("SUMMARY_WORKERS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(summary_defaults.workers),
            interval: env_parse("SUMMARY_INTERVAL_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(summary_defaults.interval),
            min_content_chars: env_parse("SUMMARY_MIN_CONTENT_CHARS")
                .unwrap_or(summary_defaults.min_content_chars),
            max_content_chars: env_parse("SUMMARY_MAX_CONTENT_CHARS")
                .unwrap_or(summary_defaults.max_content_chars),
            catchup_limit: env_parse("CATCHUP_LIMIT").unwrap_or(summary_defaults.catchup_limit),
        };

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
            },
            ai: AiConfig {
                backend,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: env::var("AI_API_KEY").ok().filter(|k| !k.is_empty()),
                model: env::var("AI_MODEL").ok().filter(|m| !m.is_empty()),
            },
            interval: env_parse("INGEST_INTERVAL_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(60)),
            one_shot: env_flag("ONE_SHOT"),
            hacker_news,
            summary,
        })
    }
}
