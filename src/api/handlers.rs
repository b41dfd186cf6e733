//! Action handlers.
//!
//! `dispatch` is the single entrypoint: it matches the action name, parses
//! the per-action payload, runs the handler and returns its JSON. Errors
//! flow out as `EngineError` and become the `{ "error": ... }` envelope.

use axum::extract::State;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::api::types::*;
use crate::backtest::{BacktestRequest, BacktestRunner};
use crate::bot::BotRunner;
use crate::config::Settings;
use crate::error::EngineError;
use crate::execution::{OrderRequest, TradeExecutor};
use crate::market::{Interval, MarketDataClient, OutputSize, SYMBOL};
use crate::notify::EmailNotifier;
use crate::store::{notification_kind, Store, TradingAccountInput};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Store,
    pub market: Arc<MarketDataClient>,
    pub executor: Arc<dyn TradeExecutor>,
    pub notifier: Arc<EmailNotifier>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn dispatch(
    State(state): State<AppState>,
    Json(envelope): Json<ActionEnvelope>,
) -> Result<Json<Value>, EngineError> {
    match envelope.action.as_str() {
        "execute_trade" => execute_trade(&state, parse_data(envelope.data)?).await,
        "close_trade" => close_trade(&state, parse_data(envelope.data)?).await,
        "update_prices" => update_prices(&state, parse_data(envelope.data)?).await,
        "run_bot_logic" => run_bot_logic(&state).await,
        "get_current_price_action" => get_current_price(&state).await,
        "fetch_historical_data_action" => fetch_historical(&state, parse_data(envelope.data)?).await,
        "run_backtest_action" => run_backtest(&state, parse_data(envelope.data)?).await,
        "get_backtest_report_action" => get_backtest_report(&state, parse_data(envelope.data)?).await,
        "list_backtests_action" => list_backtests(&state, parse_data(envelope.data)?).await,
        "provider_close_order" => provider_close_order(&state, parse_data(envelope.data)?).await,
        "provider_get_account_summary" => {
            provider_account_summary(&state, parse_data(envelope.data)?).await
        }
        "provider_list_open_positions" => {
            provider_open_positions(&state, parse_data(envelope.data)?).await
        }
        "provider_get_server_time" => provider_server_time(&state).await,
        "upsert_trading_account_action" => {
            upsert_trading_account(&state, parse_data(envelope.data)?).await
        }
        "admin_get_env_variables_status" => admin_env_status(&state).await,
        "admin_list_users_overview" => admin_users_overview(&state).await,
        other => Err(EngineError::Validation(format!("unknown action: {}", other))),
    }
}

/// Parse the envelope's `data` into the action's input struct. A null/absent
/// body reads as an empty object so all-optional payloads stay optional.
fn parse_data<T: DeserializeOwned>(data: Value) -> Result<T, EngineError> {
    let data = if data.is_null() { json!({}) } else { data };
    serde_json::from_value(data)
        .map_err(|e| EngineError::Validation(format!("invalid request payload: {}", e)))
}

async fn execute_trade(
    state: &AppState,
    request: ExecuteTradeRequest,
) -> Result<Json<Value>, EngineError> {
    let open_price = match request.open_price {
        Some(price) => price,
        None => state.market.spot().await?,
    };

    let order = OrderRequest {
        user_id: request.user_id,
        account_id: request.account_id,
        symbol: request.symbol.clone(),
        side: request.side,
        lot_size: request.lot_size,
        open_price,
        stop_loss: request.stop_loss,
        take_profit: request.take_profit,
        session_id: request.session_id,
    };

    match state.executor.execute_order(&order).await {
        Ok(fill) => Ok(Json(json!({
            "ok": true,
            "trade_id": fill.trade_id,
            "ticket": fill.ticket,
        }))),
        Err(err) => {
            record_trade_error(state, Some(request.user_id), &err).await;
            Err(err)
        }
    }
}

async fn close_trade(
    state: &AppState,
    request: CloseTradeRequest,
) -> Result<Json<Value>, EngineError> {
    match state.executor.close_order(&request.ticket, request.lots).await {
        Ok(outcome) => Ok(Json(json!({
            "ok": true,
            "ticket": outcome.ticket,
            "close_price": outcome.close_price,
            "profit": outcome.profit,
        }))),
        Err(err) => {
            record_trade_error(state, request.user_id, &err).await;
            Err(err)
        }
    }
}

/// Provider failures on direct trade actions are also recorded as
/// notifications; failures of the recording itself only warn.
async fn record_trade_error(state: &AppState, user_id: Option<i64>, err: &EngineError) {
    let (Some(user_id), EngineError::Provider { .. }) = (user_id, err) else {
        return;
    };
    if let Err(notify_err) = state
        .store
        .insert_notification(
            user_id,
            notification_kind::BOT_TRADE_ERROR,
            "Trade failed",
            &err.to_string(),
        )
        .await
    {
        warn!(error = %notify_err, "failed to record trade error notification");
    }
}

async fn update_prices(
    state: &AppState,
    request: UpdatePricesRequest,
) -> Result<Json<Value>, EngineError> {
    let interval = parse_interval(&request.interval)?;
    let size = parse_outputsize(&request.outputsize)?;

    let candles = state.market.historical(interval, size).await?;
    let written = state
        .store
        .upsert_candles(SYMBOL, interval, &candles)
        .await?;

    Ok(Json(json!({
        "ok": true,
        "symbol": SYMBOL,
        "interval": interval.as_str(),
        "fetched": candles.len(),
        "upserted": written,
    })))
}

async fn run_bot_logic(state: &AppState) -> Result<Json<Value>, EngineError> {
    let runner = BotRunner::new(
        state.store.clone(),
        state.market.clone(),
        state.executor.clone(),
        state.notifier.clone(),
    );
    let summary = runner.run_all().await?;
    Ok(Json(json!({ "ok": true, "summary": summary })))
}

async fn get_current_price(state: &AppState) -> Result<Json<Value>, EngineError> {
    let price = state.market.spot().await?;
    Ok(Json(json!({ "ok": true, "symbol": SYMBOL, "price": price })))
}

async fn fetch_historical(
    state: &AppState,
    request: FetchHistoricalRequest,
) -> Result<Json<Value>, EngineError> {
    let interval = parse_interval(&request.interval)?;
    let size = parse_outputsize(&request.outputsize)?;
    let candles = state.market.historical(interval, size).await?;

    Ok(Json(json!({
        "ok": true,
        "symbol": SYMBOL,
        "interval": interval.as_str(),
        "candles": candles,
    })))
}

async fn run_backtest(
    state: &AppState,
    request: BacktestRequest,
) -> Result<Json<Value>, EngineError> {
    let runner = BacktestRunner::new(state.store.clone(), state.notifier.clone());
    let result = runner.run(request).await?;
    Ok(Json(json!({
        "ok": true,
        "report_id": result.report_id,
        "summary": result.summary,
    })))
}

async fn get_backtest_report(
    state: &AppState,
    request: ReportRequest,
) -> Result<Json<Value>, EngineError> {
    let report = state
        .store
        .backtest_report(request.report_id)
        .await?
        .ok_or_else(|| {
            EngineError::Validation(format!("backtest report {} not found", request.report_id))
        })?;
    let trades = state.store.simulated_trades(request.report_id).await?;

    Ok(Json(json!({ "ok": true, "report": report, "trades": trades })))
}

async fn list_backtests(
    state: &AppState,
    request: ListBacktestsRequest,
) -> Result<Json<Value>, EngineError> {
    let reports = state
        .store
        .list_backtest_reports(request.user_id, request.limit.clamp(1, 500))
        .await?;
    Ok(Json(json!({ "ok": true, "reports": reports })))
}

async fn provider_close_order(
    state: &AppState,
    request: CloseTradeRequest,
) -> Result<Json<Value>, EngineError> {
    let outcome = state
        .executor
        .close_order(&request.ticket, request.lots)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "ticket": outcome.ticket,
        "close_price": outcome.close_price,
        "profit": outcome.profit,
    })))
}

async fn provider_account_summary(
    state: &AppState,
    request: AccountScopedRequest,
) -> Result<Json<Value>, EngineError> {
    let summary = state.executor.account_summary(request.account_id).await?;
    Ok(Json(json!({ "ok": true, "summary": summary })))
}

async fn provider_open_positions(
    state: &AppState,
    request: AccountScopedRequest,
) -> Result<Json<Value>, EngineError> {
    let positions = state.executor.open_positions(request.account_id).await?;
    Ok(Json(json!({ "ok": true, "positions": positions })))
}

async fn provider_server_time(state: &AppState) -> Result<Json<Value>, EngineError> {
    let time = state.executor.server_time().await?;
    Ok(Json(json!({ "ok": true, "time": time.to_rfc3339() })))
}

async fn upsert_trading_account(
    state: &AppState,
    request: UpsertAccountRequest,
) -> Result<Json<Value>, EngineError> {
    let input = TradingAccountInput {
        user_id: request.user_id,
        account_number: request.account_number,
        broker: request.broker,
        currency: request.currency,
        balance: request.balance,
    };
    let account_id = state.store.upsert_trading_account(&input).await?;
    Ok(Json(json!({ "ok": true, "account_id": account_id })))
}

async fn admin_env_status(state: &AppState) -> Result<Json<Value>, EngineError> {
    Ok(Json(json!({
        "ok": true,
        "provider": state.executor.name(),
        "variables": state.settings.env_status(),
    })))
}

async fn admin_users_overview(state: &AppState) -> Result<Json<Value>, EngineError> {
    let users = state.store.users_overview().await?;
    Ok(Json(json!({ "ok": true, "users": users })))
}

fn parse_interval(raw: &str) -> Result<Interval, EngineError> {
    Interval::parse(raw)
        .ok_or_else(|| EngineError::Validation(format!("unknown interval: {}", raw)))
}

fn parse_outputsize(raw: &str) -> Result<OutputSize, EngineError> {
    OutputSize::parse(raw)
        .ok_or_else(|| EngineError::Validation(format!("unknown outputsize: {}", raw)))
}
