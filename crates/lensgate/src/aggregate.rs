//! Aggregator: throttled fan-out over a user's friends and ranking of the results

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::compare::{compare, ComparisonResult};
use crate::config::AggregatorConfig;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::model::{AchievementComparison, OwnedItemSet, ProfileSummary, Relation};
use crate::throttle::Throttle;

/// What one friend's task produced
#[derive(Debug)]
pub enum RelationOutcome {
    /// Games fetched and scored
    Scored(ComparisonResult),
    /// Fetch failed; the friend is left out of the ranking
    Failed {
        /// Friend whose fetch failed
        related_id: String,
        /// Why it failed
        reason: Error,
    },
}

/// Ranks a user's friends by shared games
pub struct Aggregator {
    gateway: Arc<Gateway>,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Create an aggregator over a shared gateway
    pub fn new(gateway: Arc<Gateway>, config: AggregatorConfig) -> Self {
        Self { gateway, config }
    }

    /// Gateway this aggregator reads through
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Score every friend of `primary_id` and rank them, best first.
    ///
    /// Failure to load the primary's own games or friend list aborts the
    /// call. A friend whose games cannot be fetched is logged and left out.
    /// Equal scores keep friend-list order.
    pub async fn rank_relations(
        &self,
        primary_id: &str,
        include_lists: bool,
    ) -> Result<Vec<ComparisonResult>> {
        let primary = self.gateway.fetch_owned_items(primary_id).await?;
        let relations = self.gateway.fetch_relations(primary_id).await?.relations;

        if relations.is_empty() {
            debug!(steam_id = primary_id, "no friends to rank");
            return Ok(Vec::new());
        }

        let outcomes = self.fan_out(Arc::new(primary), relations, include_lists).await;

        let mut failed = 0usize;
        let mut ranked: Vec<ComparisonResult> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                RelationOutcome::Scored(result) => Some(result),
                RelationOutcome::Failed { .. } => {
                    failed += 1;
                    None
                }
            })
            .collect();

        // stable: ties stay in friend-list order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        for (idx, result) in ranked.iter_mut().enumerate() {
            result.rank = idx as u32 + 1;
        }

        info!(
            steam_id = primary_id,
            ranked = ranked.len(),
            failed,
            "friend ranking complete"
        );
        Ok(ranked)
    }

    /// One task per relation, paced by a shared throttle. Outcomes come back
    /// in relation order and only after every task has finished.
    async fn fan_out(
        &self,
        primary: Arc<OwnedItemSet>,
        relations: Vec<Relation>,
        include_lists: bool,
    ) -> Vec<RelationOutcome> {
        let interval = self.config.throttle.interval_for(relations.len());
        let throttle = Arc::new(Throttle::new(interval));
        debug!(
            relations = relations.len(),
            ?interval,
            "dispatching friend fetches"
        );

        let handles: Vec<_> = relations
            .into_iter()
            .map(|relation| {
                let gateway = Arc::clone(&self.gateway);
                let primary = Arc::clone(&primary);
                let throttle = Arc::clone(&throttle);
                let weights = self.config.weights;

                let related_id = relation.related_id.clone();
                let handle = tokio::spawn(async move {
                    throttle.acquire().await;
                    match gateway.fetch_owned_items(&relation.related_id).await {
                        Ok(items) => {
                            RelationOutcome::Scored(compare(&primary, &items, include_lists, weights))
                        }
                        Err(reason) => {
                            warn!(friend_id = %relation.related_id, error = %reason, "error getting games for friend");
                            RelationOutcome::Failed {
                                related_id: relation.related_id,
                                reason,
                            }
                        }
                    }
                });
                (related_id, handle)
            })
            .collect();

        let (ids, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, related_id)| {
                joined.unwrap_or_else(|e| {
                    warn!(friend_id = %related_id, error = %e, "friend task did not complete");
                    RelationOutcome::Failed {
                        related_id,
                        reason: Error::TaskAborted,
                    }
                })
            })
            .collect()
    }

    /// Score `related_id` against `primary_id` directly. The result is unranked.
    pub async fn compare_two(
        &self,
        primary_id: &str,
        related_id: &str,
        include_lists: bool,
    ) -> Result<ComparisonResult> {
        let primary = self.gateway.fetch_owned_items(primary_id).await?;
        let related = self.gateway.fetch_owned_items(related_id).await?;
        Ok(compare(&primary, &related, include_lists, self.config.weights))
    }

    /// Profile summaries of every friend of `primary_id`, sorted by id
    pub async fn relation_summaries(&self, primary_id: &str) -> Result<Vec<ProfileSummary>> {
        let ids = self.gateway.fetch_relations(primary_id).await?.related_ids();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.gateway.fetch_profile_summaries(&ids[..]).await
    }

    /// Achievements of both users in one game, side by side
    pub async fn compare_achievements(
        &self,
        primary_id: &str,
        related_id: &str,
        item_id: &str,
    ) -> Result<AchievementComparison> {
        debug!(primary_id, related_id, item_id, "comparing achievements");
        let primary = self.gateway.fetch_achievements(primary_id, item_id).await?;
        let related = self.gateway.fetch_achievements(related_id, item_id).await?;
        Ok(AchievementComparison { primary, related })
    }
}
