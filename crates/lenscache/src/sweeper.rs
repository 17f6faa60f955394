//! Background reclamation of stale cache entries

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::ExpiringCache;

/// Something a [`Sweeper`] can periodically clean
pub trait Sweep: Send + Sync {
    /// Remove stale entries, returning how many were removed
    fn sweep(&self) -> usize;
}

impl<T: Clone + Send + Sync> Sweep for ExpiringCache<T> {
    fn sweep(&self) -> usize {
        ExpiringCache::sweep(self)
    }
}

/// Handle to a running sweep loop bound to one cache.
///
/// The loop ticks every `interval` until [`Sweeper::shutdown`] (or
/// [`Sweeper::cancel`]) is called. Dropping the handle detaches the loop,
/// which then lives as long as the runtime.
#[derive(Debug)]
pub struct Sweeper {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a sweep loop for `target`.
    ///
    /// The first pass runs one full `interval` after start. Must be called
    /// from within a Tokio runtime.
    pub fn start<S>(name: impl Into<String>, target: Arc<S>, interval: Duration) -> Self
    where
        S: Sweep + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        // tokio intervals reject a zero period
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(run_loop(name.clone(), target, interval, token.clone()));
        info!(cache = %name, ?interval, "cache sweeper started");

        Self {
            name,
            token,
            handle,
        }
    }

    /// Name of the swept cache
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the loop to stop without waiting for it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if the loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(cache = %self.name, error = %e, "cache sweeper task ended abnormally");
        }
    }
}

async fn run_loop<S: Sweep>(name: String, target: Arc<S>, interval: Duration, token: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(cache = %name, "cache sweeper stopped");
                return;
            }
            _ = ticker.tick() => sweep_once(&name, target.as_ref()),
        }
    }
}

fn sweep_once<S: Sweep>(name: &str, target: &S) {
    debug!(cache = %name, "sweeping expired entries");
    match panic::catch_unwind(AssertUnwindSafe(|| target.sweep())) {
        Ok(removed) => info!(cache = %name, removed, "removed expired entries"),
        Err(_) => error!(cache = %name, "sweep pass panicked, retrying next tick"),
    }
}
