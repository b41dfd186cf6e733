//! Live bot-session runner.
//!
//! One `run_bot_logic` invocation walks every active session sequentially.
//! Each session runs inside its own error boundary: a failure is logged,
//! recorded as a `bot_error` notification, and never blocks the remaining
//! sessions.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::execution::{OrderRequest, TradeExecutor};
use crate::indicators::atr;
use crate::market::{Interval, MarketDataClient, OutputSize, SYMBOL};
use crate::notify::EmailNotifier;
use crate::store::{notification_kind, BotSession, NewTrade, SessionStatus, Store};
use crate::strategy::{
    min_required_candles, Strategy, StrategyDispatcher, StrategyMode, StrategyParams,
};

/// Live evaluation runs on 15-minute candles.
const BOT_TIMEFRAME: Interval = Interval::Min15;

/// Candles a compact upstream fetch returns.
const COMPACT_SERIES_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionOutcome {
    Opened,
    NoSignal,
    Skipped,
    ProviderRejected,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct BotRunSummary {
    pub sessions: usize,
    pub trades_opened: usize,
    pub no_signal: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct BotRunner {
    store: Store,
    market: Arc<MarketDataClient>,
    executor: Arc<dyn TradeExecutor>,
    notifier: Arc<EmailNotifier>,
}

impl BotRunner {
    pub fn new(
        store: Store,
        market: Arc<MarketDataClient>,
        executor: Arc<dyn TradeExecutor>,
        notifier: Arc<EmailNotifier>,
    ) -> Self {
        Self {
            store,
            market,
            executor,
            notifier,
        }
    }

    /// Evaluate all active sessions once.
    pub async fn run_all(&self) -> Result<BotRunSummary, EngineError> {
        let sessions = self.store.active_sessions().await?;
        let mut summary = BotRunSummary {
            sessions: sessions.len(),
            ..BotRunSummary::default()
        };

        info!(sessions = sessions.len(), "running bot logic");

        for session in &sessions {
            match self.run_session(session).await {
                Ok(SessionOutcome::Opened) => summary.trades_opened += 1,
                Ok(SessionOutcome::NoSignal) => summary.no_signal += 1,
                Ok(SessionOutcome::Skipped) => summary.skipped += 1,
                Ok(SessionOutcome::ProviderRejected) => summary.errors += 1,
                Err(err) => {
                    summary.errors += 1;
                    error!(session_id = session.id, error = %err, "bot session failed");

                    // A malformed session configuration will never succeed on
                    // a retry; park it instead of failing every tick.
                    if matches!(err, EngineError::Validation(_)) {
                        if let Err(status_err) = self
                            .store
                            .set_session_status(session.id, SessionStatus::Error)
                            .await
                        {
                            warn!(session_id = session.id, error = %status_err, "failed to mark session errored");
                        }
                    }

                    if let Err(notify_err) = self
                        .store
                        .insert_notification(
                            session.user_id,
                            notification_kind::BOT_ERROR,
                            "Bot session error",
                            &format!("Session {}: {}", session.id, err),
                        )
                        .await
                    {
                        warn!(session_id = session.id, error = %notify_err, "failed to record bot_error notification");
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn run_session(&self, session: &BotSession) -> Result<SessionOutcome, EngineError> {
        // One open trade per session at a time.
        let open_count = self.store.count_open_session_trades(session.id).await?;
        if open_count >= 1 {
            debug!(session_id = session.id, "session already has an open trade, skipping");
            return Ok(SessionOutcome::Skipped);
        }

        let mode = StrategyMode::parse(&session.strategy_mode).ok_or_else(|| {
            EngineError::Validation(format!(
                "session {} has unknown strategy mode: {}",
                session.id, session.strategy_mode
            ))
        })?;

        let params: StrategyParams = match serde_json::from_value(session.strategy_params.clone())
        {
            Ok(params) => params,
            Err(err) => {
                warn!(session_id = session.id, error = %err, "bad strategy params, using defaults");
                StrategyParams::default()
            }
        };
        let risk = session.risk_level.params();

        let min_candles = min_required_candles(&params);
        let size = if min_candles + 1 > COMPACT_SERIES_LEN {
            OutputSize::Full
        } else {
            OutputSize::Compact
        };
        let history = self.market.historical(BOT_TIMEFRAME, size).await?;
        if history.len() < min_candles {
            info!(
                session_id = session.id,
                candles = history.len(),
                required = min_candles,
                "not enough history for a signal"
            );
            return Ok(SessionOutcome::NoSignal);
        }

        let spot = self.market.spot().await?;
        let current_atr = atr(&history, params.atr_period).last().copied().flatten();

        let dispatcher = StrategyDispatcher::new(mode);
        let Some(signal) = dispatcher.decide(&history, spot, &params, current_atr) else {
            info!(session_id = session.id, mode = mode.as_str(), "no trade signal");
            return Ok(SessionOutcome::NoSignal);
        };

        let order = OrderRequest {
            user_id: session.user_id,
            account_id: session.account_id,
            symbol: SYMBOL.to_string(),
            side: signal.side,
            lot_size: risk.max_lot_size,
            open_price: spot,
            stop_loss: signal.stop_loss,
            take_profit: Some(signal.take_profit),
            session_id: Some(session.id),
        };

        match self.executor.execute_order(&order).await {
            Ok(fill) => {
                info!(
                    session_id = session.id,
                    ticket = fill.ticket.as_str(),
                    side = %signal.side,
                    "bot trade executed"
                );

                // The bridge does not touch the ledger; record the row here so
                // the one-open-per-session pre-check sees it next tick.
                if fill.trade_id.is_none() {
                    let ledger_row = NewTrade {
                        user_id: session.user_id,
                        account_id: session.account_id,
                        session_id: Some(session.id),
                        ticket: fill.ticket.clone(),
                        symbol: order.symbol.clone(),
                        side: order.side,
                        lot_size: order.lot_size,
                        open_price: order.open_price,
                        stop_loss: order.stop_loss,
                        take_profit: order.take_profit,
                    };
                    match self.store.insert_trade_guarded(&ledger_row).await {
                        Ok(Some(_)) => {}
                        Ok(None) => warn!(
                            session_id = session.id,
                            "ledger row skipped: session already has an open trade"
                        ),
                        Err(err) => warn!(
                            session_id = session.id,
                            error = %err,
                            "failed to record bridge trade in ledger"
                        ),
                    }
                }

                self.store.record_session_trade(session.id).await?;
                self.store
                    .insert_notification(
                        session.user_id,
                        notification_kind::BOT_TRADE_EXECUTED,
                        "Bot trade executed",
                        &format!(
                            "{} {} {:.2} lots at {:.2} (SL {:.2}, TP {:.2}), ticket {}",
                            SYMBOL,
                            signal.side,
                            risk.max_lot_size,
                            spot,
                            signal.stop_loss,
                            signal.take_profit,
                            fill.ticket
                        ),
                    )
                    .await?;

                self.notifier
                    .send(
                        &format!("Bot trade: {} {}", signal.side, SYMBOL),
                        &format!(
                            "Session {} opened {} {} at {:.2} ({} lots)",
                            session.id, signal.side, SYMBOL, spot, risk.max_lot_size
                        ),
                    )
                    .await;

                Ok(SessionOutcome::Opened)
            }
            Err(err) => {
                warn!(session_id = session.id, error = %err, "provider rejected bot trade");
                self.store
                    .insert_notification(
                        session.user_id,
                        notification_kind::BOT_TRADE_ERROR,
                        "Bot trade failed",
                        &format!("Session {}: {}", session.id, err),
                    )
                    .await?;
                Ok(SessionOutcome::ProviderRejected)
            }
        }
    }
}
