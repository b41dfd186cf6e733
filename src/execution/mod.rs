//! Trade execution abstraction.
//!
//! One contract, two implementations: the ledger-backed simulator (default)
//! and the MetaTrader bridge. Providers are stateless; the factory hands out
//! an `Arc<dyn TradeExecutor>` chosen by configuration.

pub mod bridge;
pub mod simulated;

pub use bridge::BridgeExecutor;
pub use simulated::SimulatedExecutor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::config::Provider as ProviderSettings;
use crate::error::EngineError;
use crate::market::MarketDataClient;
use crate::store::Store;
use crate::strategy::TradeSide;

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub user_id: i64,
    pub account_id: i64,
    pub symbol: String,
    pub side: TradeSide,
    pub lot_size: f64,
    pub open_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub session_id: Option<i64>,
}

/// Successful order placement. `trade_id` is set when the provider itself
/// wrote the ledger row (the simulator); the bridge only returns a ticket.
#[derive(Debug, Clone, Serialize)]
pub struct OrderFill {
    pub trade_id: Option<i64>,
    pub ticket: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseOutcome {
    pub ticket: String,
    pub close_price: Option<f64>,
    pub profit: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenPosition {
    pub ticket: String,
    pub symbol: String,
    pub side: TradeSide,
    pub lot_size: f64,
    pub open_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub profit: Option<f64>,
    pub opened_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TradeExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute_order(&self, order: &OrderRequest) -> Result<OrderFill, EngineError>;

    async fn close_order(
        &self,
        ticket: &str,
        lots: Option<f64>,
    ) -> Result<CloseOutcome, EngineError>;

    async fn account_summary(
        &self,
        account_id: Option<i64>,
    ) -> Result<AccountSummary, EngineError>;

    async fn open_positions(
        &self,
        account_id: Option<i64>,
    ) -> Result<Vec<OpenPosition>, EngineError>;

    async fn server_time(&self) -> Result<DateTime<Utc>, EngineError>;
}

/// Provider selection by `TRADE_PROVIDER_TYPE`. METATRADER without a bridge
/// URL and API key falls back to the simulator with a warning.
pub fn create_executor(
    settings: &ProviderSettings,
    store: Store,
    market: Arc<MarketDataClient>,
) -> Result<Arc<dyn TradeExecutor>, EngineError> {
    match settings.provider_type.to_uppercase().as_str() {
        "METATRADER" => {
            let url = settings.bridge_url.as_deref().filter(|v| !v.is_empty());
            let key = settings.bridge_api_key.as_deref().filter(|v| !v.is_empty());
            match (url, key) {
                (Some(url), Some(key)) => Ok(Arc::new(BridgeExecutor::new(
                    url,
                    key,
                    settings.timeout_secs,
                    settings.magic_number,
                )?)),
                _ => {
                    warn!(
                        "TRADE_PROVIDER_TYPE=METATRADER but MT_BRIDGE_URL/MT_BRIDGE_API_KEY \
                         missing, falling back to simulated provider"
                    );
                    Ok(Arc::new(SimulatedExecutor::new(store, market)))
                }
            }
        }
        "SIMULATED" => Ok(Arc::new(SimulatedExecutor::new(store, market))),
        other => {
            warn!(provider = other, "unknown trade provider, using simulated");
            Ok(Arc::new(SimulatedExecutor::new(store, market)))
        }
    }
}
