pub mod embed;
pub mod github;
pub mod html;
pub mod pdf;

use std::time::Duration;

use async_trait::async_trait;
use common::{CrawlerError, CrawlerResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MIN_PDF_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArticle {
    pub content: String,
    pub title: String,
    pub can_embed: bool,
}

/// Anything that can turn a story URL into readable text.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_article(&self, url: &str) -> CrawlerResult<FetchedArticle>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_html_bytes: usize,
    pub max_pdf_bytes: usize,
    pub repository_host: String,
    pub raw_base_url: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_html_bytes: 2 * 1024 * 1024,
            max_pdf_bytes: 16 * 1024 * 1024,
            repository_host: "github.com".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ArticleFetcher {
    client: Client,
    config: FetcherConfig,
}

impl ArticleFetcher {
    pub fn new() -> CrawlerResult<Self> {
        Self::with_config(FetcherConfig::default())
    }

    pub fn with_config(config: FetcherConfig) -> CrawlerResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn fetch_readme(&self, repo: &github::RepoRoot) -> Option<String> {
        for branch in github::README_BRANCHES {
            let readme_url = repo.readme_url(&self.config.raw_base_url, branch);
            match self.client.get(&readme_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match read_capped(resp, self.config.max_html_bytes).await {
                        Ok(bytes) => return Some(String::from_utf8_lossy(&bytes).into_owned()),
                        Err(e) => warn!("Failed to read README {}: {}", readme_url, e),
                    }
                }
                Ok(resp) => debug!("No README at {} ({})", readme_url, resp.status()),
                Err(e) => debug!("README request {} failed: {}", readme_url, e),
            }
        }
        None
    }
}

/// Reads at most `cap` bytes of the body, dropping the rest.
async fn read_capped(mut resp: Response, cap: usize) -> CrawlerResult<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let remaining = cap - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[async_trait]
impl ArticleSource for ArticleFetcher {
    async fn fetch_article(&self, url: &str) -> CrawlerResult<FetchedArticle> {
        let parsed = Url::parse(url)
            .map_err(|e| CrawlerError::Parse(format!("Invalid article URL {}: {}", url, e)))?;

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CrawlerError::Api(format!("GET {} returned {}", url, status)));
        }

        let can_embed = embed::can_embed(resp.headers());

        if let Some(repo) = github::repo_root(&parsed, &self.config.repository_host) {
            if let Some(readme) = self.fetch_readme(&repo).await {
                info!("Using README for repository {}", repo);
                return Ok(FetchedArticle {
                    content: readme,
                    title: format!("GitHub README: {}", repo),
                    can_embed,
                });
            }
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let is_pdf = pdf::is_pdf(content_type.as_deref(), url);

        let cap = if is_pdf {
            self.config.max_pdf_bytes
        } else {
            self.config.max_html_bytes
        };
        let mut body = read_capped(resp, cap).await?;

        if is_pdf {
            info!("Detected PDF content for {}, extracting text", url);
            match pdf::extract_text(body.clone()).await {
                Ok(text) if text.chars().count() > MIN_PDF_CHARS => {
                    return Ok(FetchedArticle {
                        content: text,
                        title: format!("PDF Document: {}", url),
                        can_embed,
                    });
                }
                Ok(_) => warn!("PDF text for {} too short, falling back to HTML handling", url),
                Err(e) => warn!("PDF extraction failed for {}: {}", url, e),
            }
            body.truncate(self.config.max_html_bytes);
        }

        let raw = String::from_utf8_lossy(&body);
        if let Some((title, text)) = html::extract_readable(&raw, url) {
            let title = if title.trim().is_empty() {
                "Unknown Title".to_string()
            } else {
                title
            };
            return Ok(FetchedArticle { content: text, title, can_embed });
        }

        debug!("Readability found nothing in {}, stripping tags", url);
        Ok(FetchedArticle {
            content: html::strip_tags(&raw),
            title: "Unknown Title".to_string(),
            can_embed,
        })
    }
}
