//! Process-start configuration for the gateway and aggregator

use std::time::Duration;

use crate::compare::ScoreWeights;
use crate::throttle::ThrottlePolicy;

/// Default upstream base URL
pub const DEFAULT_BASE_URL: &str = "https://api.steampowered.com";

/// Time-to-live of each gateway cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Profile summaries
    pub profiles: Duration,
    /// Friend lists
    pub relations: Duration,
    /// Owned-game lists
    pub owned_items: Duration,
    /// Per-game achievements
    pub achievements: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            profiles: Duration::from_secs(24 * 60 * 60),
            relations: Duration::from_secs(10 * 60),
            owned_items: Duration::from_secs(60 * 60),
            achievements: Duration::from_secs(60 * 60),
        }
    }
}

/// Settings for [`Gateway`](crate::Gateway)
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Key sent with every upstream request
    pub api_key: String,
    /// Upstream base URL, without a trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Cache lifetimes
    pub ttls: CacheTtls,
    /// How often sweepers reclaim stale entries
    pub sweep_interval: Duration,
}

impl GatewayConfig {
    /// Defaults with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Point the gateway at another upstream
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            ttls: CacheTtls::default(),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Settings for [`Aggregator`](crate::Aggregator)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatorConfig {
    /// Score weights used for every comparison
    pub weights: ScoreWeights,
    /// How the fan-out is paced
    pub throttle: ThrottlePolicy,
}
