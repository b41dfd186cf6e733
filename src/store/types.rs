//! Row types for the store tables.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::risk::RiskLevel;
use crate::strategy::TradeSide;

/// Notification kinds emitted by the engine.
pub mod notification_kind {
    pub const BOT_TRADE_EXECUTED: &str = "bot_trade_executed";
    pub const BOT_TRADE_ERROR: &str = "bot_trade_error";
    pub const BOT_ERROR: &str = "bot_error";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(TradeStatus::Open),
            "closed" => Some(TradeStatus::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        }
    }
}

/// One ledger row. `close_price`, `profit_loss` and `closed_at` are set
/// together when the row transitions to `closed` and frozen afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub session_id: Option<i64>,
    pub ticket: String,
    pub symbol: String,
    pub side: TradeSide,
    pub lot_size: f64,
    pub open_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub close_price: Option<f64>,
    pub profit_loss: Option<f64>,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Insert payload for an open ledger row.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub user_id: i64,
    pub account_id: i64,
    pub session_id: Option<i64>,
    pub ticket: String,
    pub symbol: String,
    pub side: TradeSide,
    pub lot_size: f64,
    pub open_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Stopped,
    Error,
}

impl SessionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SessionStatus::Active),
            "stopped" => Some(SessionStatus::Stopped),
            "error" => Some(SessionStatus::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Error => "error",
        }
    }
}

/// A running bot configuration. The sole principal of bot-origin trades;
/// every trade it opens carries its id.
#[derive(Debug, Clone, Serialize)]
pub struct BotSession {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub risk_level: RiskLevel,
    pub strategy_mode: String,
    pub strategy_params: Value,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub trade_count: i32,
    pub last_trade_at: Option<DateTime<Utc>>,
}

/// Why a simulated backtest trade closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    #[serde(rename = "SL")]
    Sl,
    #[serde(rename = "TP")]
    Tp,
    Signal,
    EndOfTest,
}

impl CloseReason {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SL" => Some(CloseReason::Sl),
            "TP" => Some(CloseReason::Tp),
            "Signal" => Some(CloseReason::Signal),
            "EndOfTest" => Some(CloseReason::EndOfTest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Sl => "SL",
            CloseReason::Tp => "TP",
            CloseReason::Signal => "Signal",
            CloseReason::EndOfTest => "EndOfTest",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub id: i64,
    pub user_id: Option<i64>,
    pub symbol: String,
    pub timeframe: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub strategy_params: Value,
    pub risk_params: Value,
    pub total_trades: i32,
    pub total_pl: f64,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub win_rate: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBacktestReport {
    pub user_id: Option<i64>,
    pub symbol: String,
    pub timeframe: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub strategy_params: Value,
    pub risk_params: Value,
    pub total_trades: i32,
    pub total_pl: f64,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub win_rate: f64,
}

/// Simulated trade produced by a backtest replay; same shape as a closed
/// ledger row plus the close reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedTrade {
    pub symbol: String,
    pub side: TradeSide,
    pub lot_size: f64,
    pub open_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub close_price: f64,
    pub profit_loss: f64,
    pub close_reason: CloseReason,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradingAccount {
    pub id: i64,
    pub user_id: i64,
    pub account_number: String,
    pub broker: Option<String>,
    pub currency: String,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingAccountInput {
    pub user_id: i64,
    pub account_number: String,
    #[serde(default)]
    pub broker: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub balance: Option<Decimal>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Per-user aggregate for the admin overview action.
#[derive(Debug, Clone, Serialize)]
pub struct UserOverview {
    pub user_id: i64,
    pub session_count: i64,
    pub active_sessions: i64,
    pub total_trades: i64,
    pub open_trades: i64,
    pub realized_pl: f64,
}
