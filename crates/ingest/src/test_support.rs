use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::models::timestamp_to_datetime;
use common::{CrawlerError, CrawlerResult, StoryRecord};
use content_fetcher::{ArticleSource, FetchedArticle};
use hacker_news::{ContentSource, HNItem, HNUser, ItemKind};
use summarizer::Summarizer;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub fn stored_story(id: i64, rank: Option<i32>) -> StoryRecord {
    StoryRecord {
        id,
        title: format!("Story {id}"),
        url: format!("https://example.com/{id}"),
        score: 50,
        author: "alice".to_string(),
        descendant_count: 0,
        posted_at: timestamp_to_datetime(1_700_000_000 + id),
        rank,
        summary: None,
        topics: None,
    }
}

/// In-memory item source with a fetch log.
#[derive(Default)]
pub struct FakeSource {
    items: HashMap<i64, HNItem>,
    users: HashMap<String, HNUser>,
    top: Vec<i64>,
    new: Vec<i64>,
    failing: HashSet<i64>,
    failing_lists: bool,
    user_gate: Option<Arc<Notify>>,
    fetched: Mutex<Vec<i64>>,
    user_fetches: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lists(mut self, top: Vec<i64>, new: Vec<i64>) -> Self {
        self.top = top;
        self.new = new;
        self
    }

    pub fn failing_lists(mut self) -> Self {
        self.failing_lists = true;
        self
    }

    pub fn story(mut self, id: i64, score: i64, url: &str, kids: Vec<i64>) -> Self {
        self.items.insert(
            id,
            HNItem {
                id,
                kind: ItemKind::Story,
                by: "alice".to_string(),
                title: format!("Story {id}"),
                url: url.to_string(),
                score,
                descendants: kids.len() as i64,
                time: 1_700_000_000 + id,
                kids,
                ..Default::default()
            },
        );
        self
    }

    pub fn comment(mut self, id: i64, by: &str, kids: Vec<i64>) -> Self {
        self.items.insert(
            id,
            HNItem {
                id,
                kind: ItemKind::Comment,
                by: by.to_string(),
                text: format!("comment {id}"),
                time: 1_700_000_000 + id,
                kids,
                ..Default::default()
            },
        );
        self
    }

    pub fn deleted_comment(mut self, id: i64, kids: Vec<i64>) -> Self {
        self.items.insert(
            id,
            HNItem {
                id,
                kind: ItemKind::Comment,
                deleted: true,
                kids,
                ..Default::default()
            },
        );
        self
    }

    pub fn user(mut self, name: &str) -> Self {
        self.users.insert(
            name.to_string(),
            HNUser {
                id: name.to_string(),
                created: 1_600_000_000,
                karma: 42,
                about: String::new(),
                submitted: vec![1, 2],
            },
        );
        self
    }

    /// Every user lookup waits for a permit on `gate` before answering.
    pub fn gate_users(mut self, gate: Arc<Notify>) -> Self {
        self.user_gate = Some(gate);
        self
    }

    pub fn failing(mut self, id: i64) -> Self {
        self.failing.insert(id);
        self
    }

    pub fn fetch_count(&self, id: i64) -> usize {
        self.fetched.lock().unwrap().iter().filter(|f| **f == id).count()
    }

    pub fn user_fetch_count(&self, name: &str) -> usize {
        self.user_fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.as_str() == name)
            .count()
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_item(&self, id: i64) -> CrawlerResult<Option<HNItem>> {
        self.fetched.lock().unwrap().push(id);
        if self.failing.contains(&id) {
            return Err(CrawlerError::Api(format!("item {id} unavailable")));
        }
        Ok(self.items.get(&id).cloned())
    }

    async fn fetch_user(&self, username: &str) -> CrawlerResult<Option<HNUser>> {
        if let Some(gate) = &self.user_gate {
            gate.notified().await;
        }
        self.user_fetches.lock().unwrap().push(username.to_string());
        Ok(self.users.get(username).cloned())
    }

    async fn fetch_top_ids(&self) -> CrawlerResult<Vec<i64>> {
        if self.failing_lists {
            return Err(CrawlerError::Api("top list unavailable".to_string()));
        }
        Ok(self.top.clone())
    }

    async fn fetch_new_ids(&self) -> CrawlerResult<Vec<i64>> {
        if self.failing_lists {
            return Err(CrawlerError::Api("new list unavailable".to_string()));
        }
        Ok(self.new.clone())
    }
}

/// Returns the same body for every url.
pub struct FakeFetcher {
    content: Option<String>,
}

impl FakeFetcher {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    pub fn failing() -> Self {
        Self { content: None }
    }
}

#[async_trait]
impl ArticleSource for FakeFetcher {
    async fn fetch_article(&self, url: &str) -> CrawlerResult<FetchedArticle> {
        match &self.content {
            Some(content) => Ok(FetchedArticle {
                content: content.clone(),
                title: "Fetched".to_string(),
                can_embed: true,
            }),
            None => Err(CrawlerError::Api(format!("{url} returned 404"))),
        }
    }
}

/// Records when it was called and what text it received.
pub struct FakeSummarizer {
    response: String,
    calls: Mutex<Vec<(Instant, usize)>>,
}

impl FakeSummarizer {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    /// Character counts of the texts passed in, in call order.
    pub fn input_lengths(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|(_, len)| *len).collect()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn generate_summary(
        &self,
        _title: &str,
        text: &str,
        _cancel: &CancellationToken,
    ) -> CrawlerResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), text.chars().count()));
        Ok(self.response.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub const SUMMARY_RESPONSE: &str = r#"{"summary": ["a", "b"], "topics": ["rust"]}"#;

pub fn long_text() -> String {
    "word ".repeat(100)
}

/// Polls `check` until it holds, failing the test after five seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
