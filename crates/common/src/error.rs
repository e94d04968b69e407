use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl CrawlerError {
    /// Errors worth another attempt against the same backend.
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlerError::HttpRequest(e) => {
                e.is_timeout() || e.is_connect() || e.status().map_or(true, |s| s.is_server_error())
            }
            CrawlerError::Quota(_) | CrawlerError::Api(_) => true,
            _ => false,
        }
    }
}

pub type CrawlerResult<T> = Result<T, CrawlerError>;
