//! Ledger-backed simulated execution provider. The default: orders become
//! open rows in the trade ledger, closes settle against the current spot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::execution::{
    AccountSummary, CloseOutcome, OpenPosition, OrderFill, OrderRequest, TradeExecutor,
};
use crate::market::MarketDataClient;
use crate::store::{NewTrade, Store};
use crate::strategy::TradeSide;

/// Balance reported when no trading account is on file.
const DEFAULT_BALANCE: Decimal = dec!(10000);

/// Lot-to-dollars factor for XAUUSD: 0.01 lot moves $1 per $1 of price.
pub(crate) const PIP_VALUE_PER_LOT: f64 = 100.0;

pub struct SimulatedExecutor {
    store: Store,
    market: Arc<MarketDataClient>,
}

impl SimulatedExecutor {
    pub fn new(store: Store, market: Arc<MarketDataClient>) -> Self {
        Self { store, market }
    }

    fn generate_ticket() -> String {
        format!("SIM-{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl TradeExecutor for SimulatedExecutor {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn execute_order(&self, order: &OrderRequest) -> Result<OrderFill, EngineError> {
        let trade = NewTrade {
            user_id: order.user_id,
            account_id: order.account_id,
            session_id: order.session_id,
            ticket: Self::generate_ticket(),
            symbol: order.symbol.clone(),
            side: order.side,
            lot_size: order.lot_size,
            open_price: order.open_price,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
        };

        // The guard doubles as the advisory lock for the one-open-per-session
        // rule: losing the race surfaces as a provider failure.
        let id = self
            .store
            .insert_trade_guarded(&trade)
            .await?
            .ok_or_else(|| {
                EngineError::provider("execute_order", "session already has an open trade")
            })?;

        info!(
            trade_id = id,
            ticket = trade.ticket.as_str(),
            side = %order.side,
            lot = order.lot_size,
            "simulated order executed"
        );

        Ok(OrderFill {
            trade_id: Some(id),
            ticket: trade.ticket,
        })
    }

    async fn close_order(
        &self,
        ticket: &str,
        _lots: Option<f64>,
    ) -> Result<CloseOutcome, EngineError> {
        let trade = self
            .store
            .open_trade_by_ticket(ticket)
            .await?
            .ok_or_else(|| {
                EngineError::provider("close_order", format!("no open trade for ticket {}", ticket))
            })?;

        let spot = self.market.spot().await?;
        let price_diff = match trade.side {
            TradeSide::Buy => spot - trade.open_price,
            TradeSide::Sell => trade.open_price - spot,
        };
        let profit = price_diff * trade.lot_size * PIP_VALUE_PER_LOT;

        self.store
            .close_trade(trade.id, spot, profit, Utc::now())
            .await?;

        info!(ticket, close_price = spot, profit, "simulated order closed");

        Ok(CloseOutcome {
            ticket: ticket.to_string(),
            close_price: Some(spot),
            profit: Some(profit),
        })
    }

    async fn account_summary(
        &self,
        account_id: Option<i64>,
    ) -> Result<AccountSummary, EngineError> {
        let (balance, currency) = match account_id {
            Some(id) => match self.store.trading_account(id).await? {
                Some(account) => (account.balance, account.currency),
                None => {
                    warn!(account_id = id, "trading account not found, using default balance");
                    (DEFAULT_BALANCE, "USD".to_string())
                }
            },
            None => (DEFAULT_BALANCE, "USD".to_string()),
        };

        Ok(AccountSummary {
            balance,
            equity: balance,
            margin: Decimal::ZERO,
            free_margin: balance,
            currency,
        })
    }

    async fn open_positions(
        &self,
        account_id: Option<i64>,
    ) -> Result<Vec<OpenPosition>, EngineError> {
        let trades = self.store.open_trades(account_id).await?;
        Ok(trades
            .into_iter()
            .map(|t| OpenPosition {
                ticket: t.ticket,
                symbol: t.symbol,
                side: t.side,
                lot_size: t.lot_size,
                open_price: t.open_price,
                stop_loss: Some(t.stop_loss),
                take_profit: t.take_profit,
                profit: None,
                opened_at: Some(t.opened_at),
            })
            .collect())
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, EngineError> {
        Ok(Utc::now())
    }
}
