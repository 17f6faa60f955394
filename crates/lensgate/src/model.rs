//! Records fetched from the upstream provider.
//!
//! Fields deserialize from the provider's lowercase names and serialize to
//! callers in camelCase.

use serde::{Deserialize, Serialize};

/// Public profile of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    /// 64-bit Steam id
    #[serde(rename = "steamID", alias = "steamid")]
    pub steam_id: String,
    /// 1 private, 3 public
    #[serde(alias = "communityvisibilitystate", default)]
    pub community_visibility_state: i32,
    /// Display name
    #[serde(alias = "personaname", default)]
    pub persona_name: String,
    /// Small avatar URL
    #[serde(default)]
    pub avatar: String,
    /// Medium avatar URL
    #[serde(alias = "avatarmedium", default)]
    pub avatar_medium: String,
    /// Full-size avatar URL
    #[serde(alias = "avatarfull", default)]
    pub avatar_full: String,
}

/// One owned game. Two items are equal when every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// App id
    #[serde(rename = "appID", alias = "appid")]
    pub id: u64,
    /// Game title
    #[serde(default)]
    pub name: String,
    /// Icon image hash
    #[serde(rename = "img_icon_url", default)]
    pub icon_ref: String,
}

/// Games owned by one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnedItemSet {
    /// Account the games belong to
    #[serde(rename = "steamID", default)]
    pub owner_id: String,
    /// Count reported by the provider
    #[serde(rename = "game_count", default)]
    pub total_count: u32,
    /// Owned games
    #[serde(rename = "games", default)]
    pub items: Vec<Item>,
}

/// One friend of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Friend's Steam id
    #[serde(rename = "steamID", alias = "steamid")]
    pub related_id: String,
    /// Relationship kind, normally `friend`
    #[serde(rename = "relationship", default)]
    pub kind: String,
    /// Unix time the friendship started
    #[serde(rename = "friendSince", alias = "friend_since", default)]
    pub since: i64,
}

/// Friend list of an account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationList {
    /// Friends in provider order
    #[serde(rename = "friends", default)]
    pub relations: Vec<Relation>,
}

impl RelationList {
    /// Related ids in list order
    pub fn related_ids(&self) -> Vec<String> {
        self.relations.iter().map(|r| r.related_id.clone()).collect()
    }
}

/// Unlock state of one achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    /// Provider's achievement identifier
    #[serde(rename = "apiName")]
    pub api_name: String,
    /// Unlocked
    pub achieved: bool,
}

/// Achievements of one account in one game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementSet {
    /// Every achievement of the game
    pub achievements: Vec<Achievement>,
}

/// Achievements of two accounts in the same game, side by side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementComparison {
    /// Requesting account
    #[serde(rename = "player")]
    pub primary: AchievementSet,
    /// Account compared against
    #[serde(rename = "friend")]
    pub related: AchievementSet,
}
