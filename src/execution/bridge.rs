//! MetaTrader bridge execution provider.
//!
//! Every contract operation maps to one HTTP call against the configured
//! bridge. All requests carry the shared-secret header; non-2xx statuses,
//! unparseable bodies and `{"success": false}` payloads surface as provider
//! failures tagged with the endpoint name. 202/204 responses count as
//! success with an empty body. Tickets are always stringified.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::EngineError;
use crate::execution::{
    AccountSummary, CloseOutcome, OpenPosition, OrderFill, OrderRequest, TradeExecutor,
};
use crate::strategy::TradeSide;

const API_KEY_HEADER: &str = "X-MT-Bridge-API-Key";

pub struct BridgeExecutor {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    magic_number: i64,
}

impl BridgeExecutor {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
        magic_number: i64,
    ) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("bridge client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            magic_number,
        })
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, EngineError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, "bridge POST");
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::provider(endpoint, format!("request failed: {}", e)))?;

        decode_response(endpoint, response).await
    }

    async fn get(&self, endpoint: &str) -> Result<Value, EngineError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, "bridge GET");
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::provider(endpoint, format!("request failed: {}", e)))?;

        decode_response(endpoint, response).await
    }
}

async fn decode_response(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<Value, EngineError> {
    let status = response.status();

    // Accepted / no-content: success with nothing to parse.
    if status.as_u16() == 202 || status.as_u16() == 204 {
        return Ok(json!({ "success": true }));
    }

    let body = response
        .text()
        .await
        .map_err(|e| EngineError::provider(endpoint, format!("failed to read body: {}", e)))?;

    if !status.is_success() {
        return Err(EngineError::provider(
            endpoint,
            format!("HTTP {}: {}", status, body),
        ));
    }

    let payload: Value = serde_json::from_str(&body)
        .map_err(|e| EngineError::provider(endpoint, format!("unparseable payload: {}", e)))?;

    ensure_success(endpoint, &payload)?;
    Ok(payload)
}

/// Reject payloads that carry an explicit `success: false`.
fn ensure_success(endpoint: &str, payload: &Value) -> Result<(), EngineError> {
    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("bridge reported failure");
        return Err(EngineError::provider(endpoint, message));
    }
    Ok(())
}

/// The terminal reports tickets as numbers; the ledger stores strings.
fn ticket_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_server_time(endpoint: &str, payload: &Value) -> Result<DateTime<Utc>, EngineError> {
    let raw = payload.get("serverTime").ok_or_else(|| {
        EngineError::provider(endpoint, "payload missing serverTime")
    })?;

    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| EngineError::provider(endpoint, format!("bad serverTime: {}", e))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| EngineError::provider(endpoint, "bad serverTime epoch")),
        _ => Err(EngineError::provider(endpoint, "bad serverTime shape")),
    }
}

#[derive(Debug, Deserialize)]
struct BridgePosition {
    ticket: Value,
    symbol: String,
    #[serde(rename = "type")]
    side: String,
    lots: f64,
    #[serde(rename = "openPrice")]
    open_price: f64,
    #[serde(rename = "stopLoss", default)]
    stop_loss: Option<f64>,
    #[serde(rename = "takeProfit", default)]
    take_profit: Option<f64>,
    #[serde(default)]
    profit: Option<f64>,
    #[serde(rename = "openTime", default)]
    open_time: Option<String>,
}

fn parse_positions(endpoint: &str, payload: &Value) -> Result<Vec<OpenPosition>, EngineError> {
    let raw = payload
        .get("positions")
        .cloned()
        .unwrap_or_else(|| json!([]));
    let rows: Vec<BridgePosition> = serde_json::from_value(raw)
        .map_err(|e| EngineError::provider(endpoint, format!("bad positions payload: {}", e)))?;

    rows.into_iter()
        .map(|row| {
            let side = TradeSide::parse(&row.side).ok_or_else(|| {
                EngineError::provider(endpoint, format!("unknown position side: {}", row.side))
            })?;
            Ok(OpenPosition {
                ticket: ticket_string(Some(&row.ticket)).ok_or_else(|| {
                    EngineError::provider(endpoint, "position ticket missing")
                })?,
                symbol: row.symbol,
                side,
                lot_size: row.lots,
                open_price: row.open_price,
                stop_loss: row.stop_loss,
                take_profit: row.take_profit,
                profit: row.profit,
                opened_at: row
                    .open_time
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc)),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct BridgeAccountSummary {
    balance: rust_decimal::Decimal,
    equity: rust_decimal::Decimal,
    margin: rust_decimal::Decimal,
    #[serde(rename = "freeMargin")]
    free_margin: rust_decimal::Decimal,
    currency: String,
}

#[async_trait]
impl TradeExecutor for BridgeExecutor {
    fn name(&self) -> &'static str {
        "metatrader_bridge"
    }

    async fn execute_order(&self, order: &OrderRequest) -> Result<OrderFill, EngineError> {
        let endpoint = "order/execute";
        let mut body = json!({
            "symbol": order.symbol,
            "type": order.side.as_str(),
            "lots": order.lot_size,
            "price": order.open_price,
            "stopLossPrice": order.stop_loss,
            "magicNumber": self.magic_number,
            "comment": match order.session_id {
                Some(id) => format!("engine-session-{}", id),
                None => "engine-manual".to_string(),
            },
        });
        if let Some(take_profit) = order.take_profit {
            body["takeProfitPrice"] = json!(take_profit);
        }

        let payload = self.post(endpoint, body).await?;
        let ticket = ticket_string(payload.get("ticket"))
            .ok_or_else(|| EngineError::provider(endpoint, "payload missing ticket"))?;

        Ok(OrderFill {
            trade_id: None,
            ticket,
        })
    }

    async fn close_order(
        &self,
        ticket: &str,
        lots: Option<f64>,
    ) -> Result<CloseOutcome, EngineError> {
        let endpoint = "order/close";
        let mut body = json!({ "ticket": ticket });
        if let Some(lots) = lots {
            body["lots"] = json!(lots);
        }

        let payload = self.post(endpoint, body).await?;
        Ok(CloseOutcome {
            ticket: ticket_string(payload.get("ticket")).unwrap_or_else(|| ticket.to_string()),
            close_price: payload.get("closePrice").and_then(Value::as_f64),
            profit: payload.get("profit").and_then(Value::as_f64),
        })
    }

    async fn account_summary(
        &self,
        _account_id: Option<i64>,
    ) -> Result<AccountSummary, EngineError> {
        let endpoint = "account/summary";
        let payload = self.get(endpoint).await?;
        let summary: BridgeAccountSummary = serde_json::from_value(payload)
            .map_err(|e| EngineError::provider(endpoint, format!("bad summary payload: {}", e)))?;

        Ok(AccountSummary {
            balance: summary.balance,
            equity: summary.equity,
            margin: summary.margin,
            free_margin: summary.free_margin,
            currency: summary.currency,
        })
    }

    async fn open_positions(
        &self,
        _account_id: Option<i64>,
    ) -> Result<Vec<OpenPosition>, EngineError> {
        let endpoint = "positions/open";
        let payload = self.get(endpoint).await?;
        parse_positions(endpoint, &payload)
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, EngineError> {
        let endpoint = "server/time";
        let payload = self.get(endpoint).await?;
        parse_server_time(endpoint, &payload)
    }
}
