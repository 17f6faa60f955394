//! Owned-game overlap scoring

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{Item, OwnedItemSet};

/// Weights applied to the match count and the related-side match percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Multiplier for the raw number of shared games
    pub matches: f64,
    /// Multiplier for the related account's match percentage (0-100)
    pub percentage: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            matches: 0.6,
            percentage: 0.4,
        }
    }
}

impl ScoreWeights {
    /// Build weights; they need not sum to one
    pub fn new(matches: f64, percentage: f64) -> Self {
        Self {
            matches,
            percentage,
        }
    }
}

/// Overlap between a primary account and one related account.
///
/// `rank` is zero until the aggregator assigns 1-based ranks after sorting.
/// The item listings are `None` unless the caller asked for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Weighted overlap score, higher is closer
    pub score: f64,
    /// 1-based position in a ranking, 0 when unranked
    #[serde(rename = "ranking")]
    pub rank: u32,
    /// Account the comparison is made for
    #[serde(rename = "userID")]
    pub primary_id: String,
    /// Account compared against
    #[serde(rename = "friendID")]
    pub related_id: String,
    /// Percent of the primary's games that are shared
    #[serde(rename = "userPercentage")]
    pub primary_match_ratio: f64,
    /// Games the related account owns
    #[serde(rename = "friendGamesCount")]
    pub related_item_count: u32,
    /// Percent of the related account's games that are shared
    #[serde(rename = "friendPercentage")]
    pub related_match_ratio: f64,
    /// Games owned by both
    #[serde(rename = "matches")]
    pub match_count: u32,
    /// Shared games, when requested
    #[serde(rename = "matchingGames", skip_serializing_if = "Option::is_none", default)]
    pub matching_items: Option<Vec<Item>>,
    /// Games only the related account owns, when requested
    #[serde(rename = "friendOnlyGames", skip_serializing_if = "Option::is_none", default)]
    pub related_only_items: Option<Vec<Item>>,
}

/// Score `related` against `primary`.
///
/// An item matches when it is structurally equal to some item the primary
/// owns. Ratios divide by each side's reported total and are zero when that
/// total is zero.
pub fn compare(
    primary: &OwnedItemSet,
    related: &OwnedItemSet,
    include_lists: bool,
    weights: ScoreWeights,
) -> ComparisonResult {
    let owned: HashSet<&Item> = primary.items.iter().collect();
    let (matching, related_only): (Vec<&Item>, Vec<&Item>) =
        related.items.iter().partition(|item| owned.contains(item));

    let match_count = matching.len() as u32;
    let primary_match_ratio = ratio(match_count, primary.total_count);
    let related_match_ratio = ratio(match_count, related.total_count);
    let score =
        f64::from(match_count) * weights.matches + related_match_ratio * 100.0 * weights.percentage;

    let (matching_items, related_only_items) = if include_lists {
        (
            Some(matching.into_iter().cloned().collect()),
            Some(related_only.into_iter().cloned().collect()),
        )
    } else {
        (None, None)
    };

    ComparisonResult {
        score,
        rank: 0,
        primary_id: primary.owner_id.clone(),
        related_id: related.owner_id.clone(),
        primary_match_ratio,
        related_item_count: related.total_count,
        related_match_ratio,
        match_count,
        matching_items,
        related_only_items,
    }
}

fn ratio(matches: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(matches) / f64::from(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64) -> Item {
        Item {
            id,
            name: format!("game {id}"),
            icon_ref: format!("icon{id}"),
        }
    }

    fn set(owner: &str, ids: &[u64]) -> OwnedItemSet {
        OwnedItemSet {
            owner_id: owner.to_string(),
            total_count: ids.len() as u32,
            items: ids.iter().copied().map(item).collect(),
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_scores_with_default_weights() {
        let primary = set("me", &[1, 2, 3]);
        let friend = set("f1", &[1, 2]);

        let result = compare(&primary, &friend, false, ScoreWeights::default());

        assert_eq!(result.match_count, 2);
        assert_eq!(result.related_item_count, 2);
        assert_close(result.primary_match_ratio, 2.0 / 3.0);
        assert_close(result.related_match_ratio, 1.0);
        assert_close(result.score, 41.2);
        assert_eq!(result.primary_id, "me");
        assert_eq!(result.related_id, "f1");
        assert_eq!(result.rank, 0);
    }

    #[test]
    fn test_alternate_weights() {
        let primary = set("me", &[1, 2, 3]);
        let friend = set("f1", &[1, 4, 5, 6]);

        let result = compare(&primary, &friend, false, ScoreWeights::new(0.7, 0.3));

        // 1 * 0.7 + 25 * 0.3
        assert_close(result.score, 8.2);
    }

    #[test]
    fn test_lists_only_when_requested() {
        let primary = set("me", &[1, 2]);
        let friend = set("f1", &[2, 3]);

        let bare = compare(&primary, &friend, false, ScoreWeights::default());
        assert!(bare.matching_items.is_none());
        assert!(bare.related_only_items.is_none());

        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("matchingGames").is_none());

        let full = compare(&primary, &friend, true, ScoreWeights::default());
        assert_eq!(full.matching_items, Some(vec![item(2)]));
        assert_eq!(full.related_only_items, Some(vec![item(3)]));
    }

    #[test]
    fn test_requested_lists_can_be_empty() {
        let primary = set("me", &[1]);
        let friend = set("f1", &[]);

        let result = compare(&primary, &friend, true, ScoreWeights::default());

        assert_eq!(result.matching_items, Some(vec![]));
        assert_eq!(result.related_only_items, Some(vec![]));
        assert_close(result.related_match_ratio, 0.0);
        assert_close(result.score, 0.0);
    }

    #[test]
    fn test_zero_totals_give_zero_ratios() {
        let mut primary = set("me", &[1]);
        primary.total_count = 0;
        let mut friend = set("f1", &[1]);
        friend.total_count = 0;

        let result = compare(&primary, &friend, false, ScoreWeights::default());

        assert_eq!(result.match_count, 1);
        assert_close(result.primary_match_ratio, 0.0);
        assert_close(result.related_match_ratio, 0.0);
        assert_close(result.score, 0.6);
    }

    #[test]
    fn test_match_count_is_symmetric() {
        let a = set("a", &[1, 2, 3, 7, 9]);
        let b = set("b", &[2, 3, 4, 9]);

        let ab = compare(&a, &b, true, ScoreWeights::default());
        let ba = compare(&b, &a, true, ScoreWeights::default());

        assert_eq!(ab.match_count, ba.match_count);
        assert_eq!(ab.match_count, 3);
        assert_ne!(ab.score, ba.score);
    }

    #[test]
    fn test_same_id_different_icon_does_not_match() {
        let primary = set("me", &[1]);
        let mut friend = set("f1", &[1]);
        friend.items[0].icon_ref = "changed".to_string();

        let result = compare(&primary, &friend, false, ScoreWeights::default());
        assert_eq!(result.match_count, 0);
    }
}
