//! Gateway: cached access to the upstream provider.
//!
//! Every fetch consults its cache first and only calls upstream on a miss.
//! Nothing is retried here; retry policy belongs to the caller.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use lenscache::{Clock, ExpiringCache, Sweeper, SystemClock};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{CacheTtls, GatewayConfig};
use crate::error::{Error, Result, UpstreamError};
use crate::model::{
    Achievement, AchievementSet, OwnedItemSet, ProfileSummary, RelationList,
};

struct Endpoint {
    name: &'static str,
    path: &'static str,
}

const PLAYER_SUMMARIES: Endpoint = Endpoint {
    name: "GetPlayerSummaries",
    path: "ISteamUser/GetPlayerSummaries/v0002/",
};

const OWNED_GAMES: Endpoint = Endpoint {
    name: "GetOwnedGames",
    path: "IPlayerService/GetOwnedGames/v0001/",
};

const FRIEND_LIST: Endpoint = Endpoint {
    name: "GetFriendList",
    path: "ISteamUser/GetFriendList/v0001/",
};

const PLAYER_ACHIEVEMENTS: Endpoint = Endpoint {
    name: "GetPlayerAchievements",
    path: "ISteamUserStats/GetPlayerAchievements/v0001/",
};

#[derive(Deserialize)]
struct SummariesEnvelope {
    response: Summaries,
}

#[derive(Deserialize)]
struct Summaries {
    #[serde(default)]
    players: Vec<ProfileSummary>,
}

#[derive(Deserialize)]
struct OwnedEnvelope {
    #[serde(default)]
    response: OwnedItemSet,
}

#[derive(Deserialize)]
struct RelationsEnvelope {
    friendslist: RelationList,
}

#[derive(Deserialize)]
struct AchievementsEnvelope {
    playerstats: PlayerStats,
}

#[derive(Deserialize)]
struct PlayerStats {
    #[serde(default)]
    achievements: Vec<RawAchievement>,
    success: Option<bool>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct RawAchievement {
    apiname: String,
    achieved: u8,
}

/// The four caches behind a [`Gateway`], shared by every caller
#[derive(Debug, Clone)]
pub struct GatewayCaches {
    /// Profile summaries by account id
    pub profiles: Arc<ExpiringCache<ProfileSummary>>,
    /// Friend lists by account id
    pub relations: Arc<ExpiringCache<RelationList>>,
    /// Owned games by account id
    pub owned_items: Arc<ExpiringCache<OwnedItemSet>>,
    /// Achievements by `owner-item` key
    pub achievements: Arc<ExpiringCache<AchievementSet>>,
}

/// Point-in-time view of one cache, for reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    /// Sweeper name of the cache
    pub name: &'static str,
    /// Entries currently held, stale ones included
    pub entries: usize,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
    /// Lookups served fresh
    pub hits: u64,
    /// Lookups that fell through
    pub misses: u64,
    /// Misses on entries past their lifetime
    pub stale: u64,
    /// Writes, counting overwrites
    pub inserts: u64,
    /// Entries removed by sweeps
    pub evictions: u64,
    /// Completed sweep passes
    pub sweeps: u64,
    /// hits / (hits + misses)
    pub hit_ratio: f64,
}

impl CacheSnapshot {
    fn capture<T: Clone>(name: &'static str, cache: &ExpiringCache<T>) -> Self {
        let stats = cache.stats().snapshot();
        Self {
            name,
            entries: cache.len(),
            ttl_secs: cache.ttl().as_secs(),
            hits: stats.hits,
            misses: stats.misses,
            stale: stats.stale,
            inserts: stats.inserts,
            evictions: stats.evictions,
            sweeps: stats.sweeps,
            hit_ratio: stats.hit_ratio(),
        }
    }
}

impl GatewayCaches {
    /// Empty caches stamped by the system clock
    pub fn new(ttls: CacheTtls) -> Self {
        Self::with_clock(ttls, Arc::new(SystemClock))
    }

    /// Empty caches stamped by `clock`
    pub fn with_clock(ttls: CacheTtls, clock: Arc<dyn Clock>) -> Self {
        Self {
            profiles: Arc::new(ExpiringCache::with_clock(ttls.profiles, clock.clone())),
            relations: Arc::new(ExpiringCache::with_clock(ttls.relations, clock.clone())),
            owned_items: Arc::new(ExpiringCache::with_clock(ttls.owned_items, clock.clone())),
            achievements: Arc::new(ExpiringCache::with_clock(ttls.achievements, clock)),
        }
    }

    /// Start one named sweeper per cache. Must be called inside a Tokio runtime.
    pub fn start_sweepers(&self, interval: Duration) -> Vec<Sweeper> {
        vec![
            Sweeper::start("PlayerCache", self.profiles.clone(), interval),
            Sweeper::start("FriendListCache", self.relations.clone(), interval),
            Sweeper::start("OwnedGamesCache", self.owned_items.clone(), interval),
            Sweeper::start("AchievementsCache", self.achievements.clone(), interval),
        ]
    }

    /// Statistics for every cache
    pub fn snapshot(&self) -> Vec<CacheSnapshot> {
        vec![
            CacheSnapshot::capture("PlayerCache", &self.profiles),
            CacheSnapshot::capture("FriendListCache", &self.relations),
            CacheSnapshot::capture("OwnedGamesCache", &self.owned_items),
            CacheSnapshot::capture("AchievementsCache", &self.achievements),
        ]
    }
}

/// Cached client for the upstream provider
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    caches: GatewayCaches,
}

impl Gateway {
    /// Build a gateway with fresh caches sized by `config.ttls`
    pub fn new(config: &GatewayConfig) -> std::result::Result<Self, reqwest::Error> {
        Self::with_caches(config, GatewayCaches::new(config.ttls))
    }

    /// Build a gateway over existing caches
    pub fn with_caches(
        config: &GatewayConfig,
        caches: GatewayCaches,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            caches,
        })
    }

    /// Caches backing this gateway
    pub fn caches(&self) -> &GatewayCaches {
        &self.caches
    }

    /// Profile summaries for `ids`, sorted by id.
    ///
    /// Cached ids are served locally; the rest go out in a single upstream
    /// call. Duplicate ids are fetched once.
    pub async fn fetch_profile_summaries<S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Result<Vec<ProfileSummary>> {
        if ids.is_empty() {
            return Err(Error::EmptyParameter("steamIDs"));
        }

        let mut seen = HashSet::new();
        let mut players = Vec::new();
        let mut uncached = Vec::new();

        for id in ids {
            let id = require(id.as_ref(), "steamIDs")?;
            if !seen.insert(id) {
                continue;
            }
            match self.caches.profiles.get(id) {
                Some(player) => {
                    debug!(steam_id = id, "profile cache hit");
                    players.push(player);
                }
                None => uncached.push(id),
            }
        }

        if !uncached.is_empty() {
            let joined = uncached.join(",");
            let envelope: SummariesEnvelope = self
                .get_json(&PLAYER_SUMMARIES, &[("steamids", joined.as_str())])
                .await?;

            for player in envelope.response.players {
                debug!(steam_id = %player.steam_id, "caching profile");
                self.caches
                    .profiles
                    .put(player.steam_id.clone(), player.clone());
                players.push(player);
            }
        }

        players.sort_by(|a, b| a.steam_id.cmp(&b.steam_id));
        Ok(players)
    }

    /// Games owned by `owner_id`, stamped with the owner's id
    pub async fn fetch_owned_items(&self, owner_id: &str) -> Result<OwnedItemSet> {
        let owner_id = require(owner_id, "steamID")?;
        if let Some(items) = self.caches.owned_items.get(owner_id) {
            debug!(steam_id = owner_id, "owned games cache hit");
            return Ok(items);
        }

        let envelope: OwnedEnvelope = self
            .get_json(
                &OWNED_GAMES,
                &[("steamid", owner_id), ("include_appinfo", "true")],
            )
            .await?;

        let mut items = envelope.response;
        items.owner_id = owner_id.to_string();
        self.caches.owned_items.put(owner_id, items.clone());
        Ok(items)
    }

    /// Friend list of `owner_id`
    pub async fn fetch_relations(&self, owner_id: &str) -> Result<RelationList> {
        let owner_id = require(owner_id, "steamID")?;
        if let Some(relations) = self.caches.relations.get(owner_id) {
            debug!(steam_id = owner_id, "friend list cache hit");
            return Ok(relations);
        }

        let envelope: RelationsEnvelope = self
            .get_json(
                &FRIEND_LIST,
                &[("steamid", owner_id), ("relationship", "friend")],
            )
            .await?;

        self.caches
            .relations
            .put(owner_id, envelope.friendslist.clone());
        Ok(envelope.friendslist)
    }

    /// Achievements of `owner_id` in game `item_id`, with unlock flags as booleans
    pub async fn fetch_achievements(&self, owner_id: &str, item_id: &str) -> Result<AchievementSet> {
        let owner_id = require(owner_id, "steamID")?;
        let item_id = require(item_id, "appID")?;
        let key = format!("{owner_id}-{item_id}");

        if let Some(achievements) = self.caches.achievements.get(&key) {
            debug!(key = %key, "achievements cache hit");
            return Ok(achievements);
        }

        let envelope: AchievementsEnvelope = self
            .get_json(
                &PLAYER_ACHIEVEMENTS,
                &[("appid", item_id), ("steamid", owner_id)],
            )
            .await?;

        let stats = envelope.playerstats;
        if stats.success == Some(false) {
            return Err(UpstreamError::Rejected {
                endpoint: PLAYER_ACHIEVEMENTS.name,
                message: stats.error.unwrap_or_else(|| "unknown error".to_string()),
            }
            .into());
        }

        let achievements = normalize(stats.achievements);
        self.caches.achievements.put(key, achievements.clone());
        Ok(achievements)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint.path);
        debug!(endpoint = endpoint.name, "calling upstream");

        let transport = |source| UpstreamError::Transport {
            endpoint: endpoint.name,
            source,
        };

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.starts_with("application/json") {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            warn!(endpoint = endpoint.name, %status, body = %preview, "unexpected response from upstream");
            return Err(UpstreamError::NotJson {
                endpoint: endpoint.name,
                content_type,
            }
            .into());
        }

        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            let err = match rejection_message(&body) {
                Some(message) => UpstreamError::Rejected {
                    endpoint: endpoint.name,
                    message,
                },
                None => UpstreamError::Status {
                    endpoint: endpoint.name,
                    status,
                },
            };
            return Err(err.into());
        }

        serde_json::from_slice(&body).map_err(|source| {
            UpstreamError::Decode {
                endpoint: endpoint.name,
                source,
            }
            .into()
        })
    }
}

fn require<'a>(value: &'a str, name: &'static str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::EmptyParameter(name))
    } else {
        Ok(value)
    }
}

fn normalize(raw: Vec<RawAchievement>) -> AchievementSet {
    AchievementSet {
        achievements: raw
            .into_iter()
            .map(|a| Achievement {
                api_name: a.apiname,
                achieved: a.achieved == 1,
            })
            .collect(),
    }
}

// Error payloads look like {"playerstats":{"error":"..."}} or {"error":"..."}.
fn rejection_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["/playerstats/error", "/error"]
        .iter()
        .find_map(|pointer| value.pointer(pointer)?.as_str())
        .map(str::to_string)
}
