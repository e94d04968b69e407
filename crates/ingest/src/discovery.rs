use std::collections::{HashMap, HashSet};

use common::Store;
use hacker_news::ContentSource;
use tracing::{info, warn};

/// Per-cycle snapshot shared read-only with every story worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryPlan {
    /// Front-page position (1-based) of every id in the latest top list.
    pub rank_map: HashMap<i64, i32>,
    /// Ids to process this cycle, in dispatch order.
    pub ids: Vec<i64>,
}

impl DiscoveryPlan {
    pub fn rank_of(&self, id: i64) -> Option<i32> {
        self.rank_map.get(&id).copied()
    }
}

/// Merges the two lists: ranked ids by rank, then unranked ids newest first,
/// capped at `max_stories`.
pub fn build_plan(top_ids: &[i64], new_ids: &[i64], max_stories: usize) -> DiscoveryPlan {
    let mut rank_map = HashMap::with_capacity(top_ids.len());
    for (position, id) in top_ids.iter().enumerate() {
        rank_map.entry(*id).or_insert(position as i32 + 1);
    }

    let mut seen = HashSet::new();
    let mut ids: Vec<i64> = top_ids
        .iter()
        .chain(new_ids.iter())
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    ids.sort_by(|a, b| match (rank_map.get(a), rank_map.get(b)) {
        (Some(ra), Some(rb)) => ra.cmp(rb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.cmp(a),
    });
    ids.truncate(max_stories);

    DiscoveryPlan { rank_map, ids }
}

/// Fetches both id lists, moves stored ranks to match the top list and
/// returns the processing plan. Failures degrade to empty lists.
pub async fn discover(
    source: &dyn ContentSource,
    store: &dyn Store,
    max_stories: usize,
) -> DiscoveryPlan {
    info!("Fetching stories...");

    let top_ids = match source.fetch_top_ids().await {
        Ok(ids) => {
            info!("Fetched {} top stories", ids.len());
            ids
        }
        Err(e) => {
            warn!("Failed to fetch top stories: {}", e);
            Vec::new()
        }
    };

    let new_ids = match source.fetch_new_ids().await {
        Ok(ids) => {
            info!("Fetched {} new stories", ids.len());
            ids
        }
        Err(e) => {
            warn!("Failed to fetch new stories: {}", e);
            Vec::new()
        }
    };

    let plan = build_plan(&top_ids, &new_ids, max_stories);

    // An empty top list means the fetch failed; keep the ranks we have.
    if !top_ids.is_empty() {
        if let Err(e) = store.clear_ranks_not_in(&top_ids).await {
            warn!("Failed to clear stale ranks: {}", e);
        }
        if let Err(e) = store.update_ranks(&plan.rank_map).await {
            warn!("Failed to update ranks: {}", e);
        }
    }

    info!(
        "Queuing {} unique stories for ingestion (prioritizing by rank)",
        plan.ids.len()
    );
    plan
}
