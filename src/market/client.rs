//! Market-data client for XAU/USD spot and historical OHLC series.
//!
//! Talks to an Alpha-Vantage-shaped FX API. Spot quotes go through the
//! single-slot cache (fresh under 5 minutes; stale up to 10 minutes when the
//! upstream is down). Series payloads are normalized into ascending candles;
//! rows that fail to parse are skipped with a warning.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::MarketData as MarketDataSettings;
use crate::error::EngineError;
use crate::market::cache::{SpotCache, SPOT_FRESH_TTL, SPOT_STALE_TTL};
use crate::market::types::{Candle, Interval, OutputSize};

const INTRADAY_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DAILY_TS_FORMAT: &str = "%Y-%m-%d";

/// Substrings that mark an upstream throttle response. The payload comes back
/// as HTTP 200 with a prose note, so detection is by substring match.
const THROTTLE_MARKERS: [&str; 3] = ["call frequency", "rate limit", "requests per day"];

pub struct MarketDataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: SpotCache,
}

impl MarketDataClient {
    pub fn new(settings: &MarketDataSettings) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("market-data client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            cache: SpotCache::new(),
        })
    }

    /// Current XAU→USD rate. Serves the cache when it is fresh; on upstream
    /// failure falls back to a stale entry inside the 10-minute window.
    pub async fn spot(&self) -> Result<f64, EngineError> {
        self.spot_via(self.fetch_spot()).await
    }

    /// Cache logic, separated from the HTTP call so the staleness rules can
    /// be exercised against an arbitrary fetch future. The future is only
    /// awaited on a cache miss.
    async fn spot_via<Fut>(&self, fetch: Fut) -> Result<f64, EngineError>
    where
        Fut: std::future::Future<Output = Result<f64, EngineError>>,
    {
        if let Some(price) = self.cache.fresh_within(SPOT_FRESH_TTL).await {
            debug!(price, "serving cached spot price");
            return Ok(price);
        }

        match fetch.await {
            Ok(price) => {
                self.cache.put(price).await;
                Ok(price)
            }
            Err(err) => {
                if let Some(price) = self.cache.fresh_within(SPOT_STALE_TTL).await {
                    warn!(error = %err, price, "upstream spot fetch failed, serving stale cache");
                    return Ok(price);
                }
                Err(err)
            }
        }
    }

    async fn fetch_spot(&self) -> Result<f64, EngineError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", "XAU"),
                ("to_currency", "USD"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| EngineError::Upstream(format!("spot request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Upstream(format!(
                "spot request returned HTTP {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Upstream(format!("spot payload not JSON: {}", e)))?;

        parse_spot_payload(&payload)
    }

    /// Historical OHLC series, ascending by timestamp.
    pub async fn historical(
        &self,
        interval: Interval,
        size: OutputSize,
    ) -> Result<Vec<Candle>, EngineError> {
        let function = match interval {
            Interval::Daily => "FX_DAILY",
            Interval::Weekly => "FX_WEEKLY",
            Interval::Monthly => "FX_MONTHLY",
            _ => "FX_INTRADAY",
        };

        let mut query: Vec<(&str, &str)> = vec![
            ("function", function),
            ("from_symbol", "XAU"),
            ("to_symbol", "USD"),
            ("outputsize", size.as_str()),
            ("apikey", self.api_key.as_str()),
        ];
        if interval.is_intraday() {
            query.push(("interval", interval.upstream_param()));
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| EngineError::Upstream(format!("series request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Upstream(format!(
                "series request returned HTTP {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Upstream(format!("series payload not JSON: {}", e)))?;

        parse_series_payload(&payload, interval)
    }
}

/// Upstream throttle and error notes arrive as HTTP 200 payload members.
/// Throttling must surface as a retryable kind, distinct from parse errors.
fn check_throttle(payload: &Value) -> Result<(), EngineError> {
    for key in ["Note", "Information"] {
        if let Some(note) = payload.get(key).and_then(Value::as_str) {
            let lowered = note.to_lowercase();
            if THROTTLE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                return Err(EngineError::RateLimited(note.to_string()));
            }
        }
    }
    if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
        return Err(EngineError::Upstream(message.to_string()));
    }
    Ok(())
}

pub(crate) fn parse_spot_payload(payload: &Value) -> Result<f64, EngineError> {
    check_throttle(payload)?;

    payload
        .get("Realtime Currency Exchange Rate")
        .and_then(|rate| rate.get("5. Exchange Rate"))
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<f64>().ok())
        .ok_or_else(|| EngineError::Upstream("unexpected spot payload shape".to_string()))
}

pub(crate) fn parse_series_payload(
    payload: &Value,
    interval: Interval,
) -> Result<Vec<Candle>, EngineError> {
    check_throttle(payload)?;

    let series = payload
        .as_object()
        .and_then(|map| {
            map.iter()
                .find(|(key, _)| key.starts_with("Time Series"))
                .map(|(_, value)| value)
        })
        .and_then(Value::as_object)
        .ok_or_else(|| EngineError::Upstream("no time series in payload".to_string()))?;

    let mut candles = Vec::with_capacity(series.len());
    for (stamp, fields) in series {
        match parse_series_row(stamp, fields, interval) {
            Some(candle) => candles.push(candle),
            None => warn!(stamp = stamp.as_str(), "skipping unparseable candle row"),
        }
    }

    // Upstream returns newest-first; the engine contract is ascending.
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

fn parse_series_row(stamp: &str, fields: &Value, interval: Interval) -> Option<Candle> {
    let timestamp = if interval.is_intraday() {
        NaiveDateTime::parse_from_str(stamp, INTRADAY_TS_FORMAT)
            .ok()?
            .and_utc()
    } else {
        NaiveDate::parse_from_str(stamp, DAILY_TS_FORMAT)
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
    };

    let field = |name: &str| -> Option<f64> {
        fields.get(name)?.as_str()?.parse::<f64>().ok()
    };

    Some(Candle {
        timestamp,
        open: field("1. open")?,
        high: field("2. high")?,
        low: field("3. low")?,
        close: field("4. close")?,
        // FX intraday series carry no volume.
        volume: field("5. volume").unwrap_or(0.0),
    })
}
