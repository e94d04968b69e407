use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use common::Store;
use hacker_news::ContentSource;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

pub const MAX_CONCURRENT_AUTHOR_FETCHES: usize = 8;

/// Background author profile refresh.
///
/// `submit` never blocks the caller: each author is fetched at most once per
/// cycle, on its own task, with at most `max_concurrent` fetches in flight.
#[derive(Clone)]
pub struct AuthorSync {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn Store>,
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl AuthorSync {
    pub fn new(source: Arc<dyn ContentSource>, store: Arc<dyn Store>, max_concurrent: usize) -> Self {
        Self {
            source,
            store,
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn submit(&self, username: &str) {
        if username.is_empty() || self.tracker.is_closed() {
            return;
        }
        {
            let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
            if !seen.insert(username.to_string()) {
                return;
            }
        }

        let source = self.source.clone();
        let store = self.store.clone();
        let permits = self.permits.clone();
        let username = username.to_string();

        self.tracker.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            sync_author(source.as_ref(), store.as_ref(), &username).await;
        });
    }

    /// Forgets which authors were seen so the next cycle refreshes them again.
    pub fn reset_cycle(&self) {
        self.seen.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    /// Waits for in-flight fetches and refuses new ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn sync_author(source: &dyn ContentSource, store: &dyn Store, username: &str) {
    let user = match source.fetch_user(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("Author {} not found", username);
            return;
        }
        Err(e) => {
            warn!("Failed to fetch author {}: {}", username, e);
            return;
        }
    };

    if let Err(e) = store.upsert_user(&user.into()).await {
        warn!("Failed to save author {}: {}", username, e);
    }
}
