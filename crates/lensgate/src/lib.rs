//! # lensgate
//!
//! Cached access to the Steam Web API and friend ranking by shared games.
//!
//! ## Architecture
//! - **Gateway**: one fetch per record kind, each backed by an expiring cache
//! - **Compare**: pure overlap scoring between two owned-game sets
//! - **Aggregator**: throttled fan-out over a friend list, joined and ranked
//!
//! Failures of a single friend's fetch are absorbed; failures of the
//! requesting user's own records abort the call.

#![warn(missing_docs)]

mod aggregate;
mod compare;
mod config;
mod error;
mod gateway;
mod model;
mod throttle;

pub use aggregate::{Aggregator, RelationOutcome};
pub use compare::{compare, ComparisonResult, ScoreWeights};
pub use config::{AggregatorConfig, CacheTtls, GatewayConfig, DEFAULT_BASE_URL};
pub use error::{Error, Result, UpstreamError};
pub use gateway::{CacheSnapshot, Gateway, GatewayCaches};
pub use model::{
    Achievement, AchievementComparison, AchievementSet, Item, OwnedItemSet, ProfileSummary,
    Relation, RelationList,
};
pub use throttle::{Throttle, ThrottlePolicy, ThrottleTier};
