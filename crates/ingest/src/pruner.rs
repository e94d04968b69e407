use common::Store;
use tracing::{info, warn};

/// Trims the story table to `retention` rows. Failures are logged, never
/// propagated: the next cycle tries again.
pub async fn prune(store: &dyn Store, retention: usize) -> u64 {
    match store.prune_stories(retention).await {
        Ok(0) => 0,
        Ok(deleted) => {
            info!("Pruned {} stories beyond the newest {}", deleted, retention);
            deleted
        }
        Err(e) => {
            warn!("Failed to prune stories: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stored_story;
    use common::MemoryStore;

    #[tokio::test]
    async fn keeps_ranked_then_newest() {
        let store = MemoryStore::new();
        for id in 1..=6 {
            store.upsert_story(&stored_story(id, None)).await.unwrap();
        }
        store.upsert_story(&stored_story(10, Some(2))).await.unwrap();
        store.upsert_story(&stored_story(11, Some(1))).await.unwrap();
        store.protect_story(1).await;

        let deleted = prune(&store, 4).await;

        let remaining: Vec<_> = store.stories().await.iter().map(|s| s.id).collect();
        assert_eq!(deleted, 3);
        assert_eq!(remaining, vec![1, 5, 6, 10, 11]);
    }

    #[tokio::test]
    async fn nothing_to_prune() {
        let store = MemoryStore::new();
        store.upsert_story(&stored_story(1, None)).await.unwrap();

        assert_eq!(prune(&store, 100).await, 0);
        assert_eq!(store.stories().await.len(), 1);
    }
}
