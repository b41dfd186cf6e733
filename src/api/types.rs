//! Request payloads for the action router.
//!
//! The router accepts one envelope shape; each action parses its own typed
//! struct out of `data` at the boundary, so handlers never dig through raw
//! JSON. Field names accept both camelCase and snake_case.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::market::SYMBOL;
use crate::strategy::TradeSide;

#[derive(Debug, Clone, Deserialize)]
pub struct ActionEnvelope {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTradeRequest {
    #[serde(alias = "user_id")]
    pub user_id: i64,
    #[serde(alias = "account_id")]
    pub account_id: i64,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    pub side: TradeSide,
    #[serde(alias = "lot_size")]
    pub lot_size: f64,
    /// Open at this price; defaults to the current spot.
    #[serde(default, alias = "open_price")]
    pub open_price: Option<f64>,
    #[serde(alias = "stop_loss")]
    pub stop_loss: f64,
    #[serde(default, alias = "take_profit")]
    pub take_profit: Option<f64>,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<i64>,
}

fn default_symbol() -> String {
    SYMBOL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTradeRequest {
    pub ticket: String,
    #[serde(default)]
    pub lots: Option<f64>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePricesRequest {
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_outputsize")]
    pub outputsize: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchHistoricalRequest {
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_outputsize")]
    pub outputsize: String,
}

fn default_interval() -> String {
    "15m".to_string()
}

fn default_outputsize() -> String {
    "compact".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(alias = "report_id")]
    pub report_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBacktestsRequest {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<i64>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountScopedRequest {
    #[serde(default, alias = "account_id")]
    pub account_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertAccountRequest {
    #[serde(alias = "user_id")]
    pub user_id: i64,
    #[serde(alias = "account_number")]
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_defaults_data_to_null() {
        let envelope: ActionEnvelope =
            serde_json::from_value(json!({ "action": "run_bot_logic" })).unwrap();
        assert_eq!(envelope.action, "run_bot_logic");
        assert!(envelope.data.is_null());
    }

    #[test]
    fn execute_trade_accepts_both_naming_styles() {
        let camel: ExecuteTradeRequest = serde_json::from_value(json!({
            "userId": 1, "accountId": 2, "side": "BUY",
            "lotSize": 0.05, "stopLoss": 2340.0
        }))
        .unwrap();
        assert_eq!(camel.lot_size, 0.05);
        assert_eq!(camel.symbol, SYMBOL);

        let snake: ExecuteTradeRequest = serde_json::from_value(json!({
            "user_id": 1, "account_id": 2, "side": "SELL",
            "lot_size": 0.01, "stop_loss": 2360.0
        }))
        .unwrap();
        assert_eq!(snake.side, TradeSide::Sell);
    }

    #[test]
    fn missing_required_fields_fail_to_parse() {
        let result: Result<ExecuteTradeRequest, _> =
            serde_json::from_value(json!({ "userId": 1 }));
        assert!(result.is_err());
    }
}
