//! Pacing for upstream fan-out

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// One step of the budget function: more than `above` relations get `budget`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleTier {
    /// Relation count that must be exceeded
    pub above: usize,
    /// Total time to spread the fan-out over
    pub budget: Duration,
}

/// Step function from relation count to total fan-out budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlePolicy {
    base_budget: Duration,
    // sorted by `above`, largest first
    tiers: Vec<ThrottleTier>,
}

impl ThrottlePolicy {
    /// Build a policy; tiers may be given in any order
    pub fn new(base_budget: Duration, mut tiers: Vec<ThrottleTier>) -> Self {
        tiers.sort_by(|a, b| b.above.cmp(&a.above));
        Self { base_budget, tiers }
    }

    /// Total budget for `count` relations
    pub fn budget_for(&self, count: usize) -> Duration {
        self.tiers
            .iter()
            .find(|tier| count > tier.above)
            .map_or(self.base_budget, |tier| tier.budget)
    }

    /// Gap between consecutive upstream calls for `count` relations.
    ///
    /// Never zero, so it can drive a [`Throttle`].
    pub fn interval_for(&self, count: usize) -> Duration {
        let budget = self.budget_for(count);
        let nanos = budget.as_nanos() / count.max(1) as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)).max(Duration::from_nanos(1))
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(4),
            vec![
                ThrottleTier {
                    above: 100,
                    budget: Duration::from_secs(15),
                },
                ThrottleTier {
                    above: 50,
                    budget: Duration::from_secs(8),
                },
            ],
        )
    }
}

/// Shared ticker that releases at most one waiter per tick.
///
/// Waiters queue on a fair lock, so they are released in arrival order. The
/// first tick fires one full period after creation.
#[derive(Debug)]
pub struct Throttle {
    ticker: Mutex<Interval>,
}

impl Throttle {
    /// Create a throttle releasing one caller per `period`
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_nanos(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker: Mutex::new(ticker),
        }
    }

    /// Wait for this caller's tick
    pub async fn acquire(&self) {
        self.ticker.lock().await.tick().await;
    }
}
