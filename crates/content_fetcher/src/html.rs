use dom_smoothie::Readability;
use scraper::Html;

/// Main article title and text via readability, if it finds anything.
pub fn extract_readable(html: &str, url: &str) -> Option<(String, String)> {
    let mut readability = Readability::new(html, Some(url), None).ok()?;
    let article = readability.parse().ok()?;
    let text = article.text_content.to_string();
    if text.trim().is_empty() {
        return None;
    }
    Some((article.title, text.trim().to_string()))
}

/// Last-resort text: every text node of the document, whitespace collapsed.
pub fn strip_tags(html: &str) -> String {
    let text = Html::parse_document(html)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
