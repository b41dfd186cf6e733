//! Market-data acquisition and caching.

pub mod cache;
pub mod client;
pub mod types;

pub use cache::{SpotCache, SPOT_FRESH_TTL, SPOT_STALE_TTL};
pub use client::MarketDataClient;
pub use types::{Candle, Interval, OutputSize, SYMBOL};
