use reqwest::header::{HeaderMap, CONTENT_SECURITY_POLICY, X_FRAME_OPTIONS};

/// Whether the page may be shown inside a frame on another origin.
pub fn can_embed(headers: &HeaderMap) -> bool {
    let frame_options = headers
        .get(X_FRAME_OPTIONS)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_uppercase());
    if matches!(frame_options.as_deref(), Some("DENY") | Some("SAMEORIGIN")) {
        return false;
    }

    let denies_ancestors = headers
        .get_all(CONTENT_SECURITY_POLICY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|csp| csp.to_ascii_lowercase().contains("frame-ancestors"));

    !denies_ancestors
}
