use common::{CrawlerError, CrawlerResult};

pub const MAX_PDF_PAGES: usize = 20;

pub fn is_pdf(content_type: Option<&str>, url: &str) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
        .unwrap_or(false)
        || url.to_ascii_lowercase().ends_with(".pdf")
}

/// Text of the first [`MAX_PDF_PAGES`] pages, one page per line block.
pub async fn extract_text(bytes: Vec<u8>) -> CrawlerResult<String> {
    tokio::task::spawn_blocking(move || {
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| CrawlerError::Pdf(e.to_string()))?;
        Ok(pages
            .into_iter()
            .take(MAX_PDF_PAGES)
            .map(|page| page.trim().to_string())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    })
    .await
    .map_err(|e| CrawlerError::Pdf(format!("extraction task failed: {}", e)))?
}
