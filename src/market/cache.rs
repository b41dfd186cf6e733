//! Single-slot spot-price cache.
//!
//! The only process-wide mutable state in the engine. The slot sits behind a
//! `tokio::sync::RwLock`; the handle is owned by the market-data client and
//! threaded down from app state rather than living in a global.

use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Entries younger than this are served without touching the upstream.
pub const SPOT_FRESH_TTL: Duration = Duration::from_secs(5 * 60);

/// When the upstream fails, entries up to this age may still be served.
pub const SPOT_STALE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy)]
struct SpotEntry {
    price: f64,
    fetched_at: Instant,
    /// Added to the measured age; nonzero only for entries seeded by tests.
    age_offset: Duration,
}

impl SpotEntry {
    fn age(&self) -> Duration {
        self.fetched_at.elapsed() + self.age_offset
    }
}

#[derive(Debug, Default)]
pub struct SpotCache {
    slot: RwLock<Option<SpotEntry>>,
}

impl SpotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached price if the entry is younger than `max_age`.
    pub async fn fresh_within(&self, max_age: Duration) -> Option<f64> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| entry.age() < max_age)
            .map(|entry| entry.price)
    }

    pub async fn put(&self, price: f64) {
        let mut slot = self.slot.write().await;
        *slot = Some(SpotEntry {
            price,
            fetched_at: Instant::now(),
            age_offset: Duration::ZERO,
        });
    }

    /// Test hook: insert an entry that is already `age` old.
    #[cfg(test)]
    pub(crate) async fn put_aged(&self, price: f64, age: Duration) {
        let mut slot = self.slot.write().await;
        *slot = Some(SpotEntry {
            price,
            fetched_at: Instant::now(),
            age_offset: age,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_cache_returns_nothing() {
        let cache = SpotCache::new();
        assert_eq!(cache.fresh_within(SPOT_FRESH_TTL).await, None);
    }

    #[tokio::test]
    async fn fresh_entry_is_served() {
        let cache = SpotCache::new();
        cache.put(2351.25).await;
        assert_eq!(cache.fresh_within(SPOT_FRESH_TTL).await, Some(2351.25));
    }

    #[tokio::test]
    async fn entry_older_than_fresh_ttl_is_skipped_but_stale_window_serves_it() {
        let cache = SpotCache::new();
        cache.put_aged(2340.0, Duration::from_secs(6 * 60)).await;
        assert_eq!(cache.fresh_within(SPOT_FRESH_TTL).await, None);
        assert_eq!(cache.fresh_within(SPOT_STALE_TTL).await, Some(2340.0));
    }

    #[tokio::test]
    async fn entry_older_than_stale_ttl_is_gone() {
        let cache = SpotCache::new();
        cache.put_aged(2340.0, Duration::from_secs(11 * 60)).await;
        assert_eq!(cache.fresh_within(SPOT_STALE_TTL).await, None);
    }
}
