use url::Url;

/// Branch names tried, in order, when looking for a repository README.
pub const README_BRANCHES: [&str; 2] = ["master", "main"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRoot {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl RepoRoot {
    pub fn readme_url(&self, raw_base_url: &str, branch: &str) -> String {
        format!(
            "{}/{}/{}/{}/README.md",
            raw_base_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            branch
        )
    }
}

/// Returns the owner/repo pair when `url` is a repository's landing page on
/// `host` (no blob, tree, issues or other sub-path).
pub fn repo_root(url: &Url, host: &str) -> Option<RepoRoot> {
    let url_host = url.host_str()?.trim_start_matches("www.");
    if !url_host.eq_ignore_ascii_case(host) {
        return None;
    }

    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        [owner, repo] => Some(RepoRoot {
            owner: owner.to_string(),
            repo: repo.trim_end_matches(".git").to_string(),
        }),
        _ => None,
    }
}
