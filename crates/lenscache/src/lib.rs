//! # lenscache
//!
//! Expiring key-value cache for SteamLens.
//!
//! ## Architecture
//! - **HashMap**: AHash keyed by string identity, one entry per key
//! - **RwLock**: concurrent readers, exclusive `put` and `sweep`
//! - **Lazy expiry**: `get` hides stale entries without removing them
//! - **Sweeper**: background task that reclaims stale entries on an interval

#![warn(missing_docs)]

mod cache;
mod clock;
mod stats;
mod sweeper;

pub use cache::{CacheEntry, ExpiringCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use stats::{CacheStats, StatsSnapshot};
pub use sweeper::{Sweep, Sweeper};
