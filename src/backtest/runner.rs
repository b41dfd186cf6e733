//! Backtest orchestration: load candles, replay, persist, notify.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::backtest::engine::{run_replay, ReplaySummary};
use crate::error::EngineError;
use crate::market::{Interval, SYMBOL};
use crate::notify::EmailNotifier;
use crate::risk::{RiskLevel, RiskParams};
use crate::store::{NewBacktestReport, Store};
use crate::strategy::{StrategyDispatcher, StrategyMode, StrategyParams};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<i64>,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(alias = "start_date")]
    pub start_date: String,
    #[serde(alias = "end_date")]
    pub end_date: String,
    #[serde(default, alias = "strategy_mode")]
    pub strategy_mode: Option<String>,
    #[serde(default, alias = "strategy_params")]
    pub strategy_params: Option<StrategyParams>,
    #[serde(default, alias = "risk_level")]
    pub risk_level: Option<String>,
    #[serde(default, alias = "risk_params")]
    pub risk_params: Option<RiskParams>,
}

fn default_symbol() -> String {
    SYMBOL.to_string()
}

fn default_timeframe() -> String {
    "15m".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestRunResult {
    pub report_id: i64,
    pub summary: ReplaySummary,
}

pub struct BacktestRunner {
    store: Store,
    notifier: Arc<EmailNotifier>,
}

impl BacktestRunner {
    pub fn new(store: Store, notifier: Arc<EmailNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn run(&self, request: BacktestRequest) -> Result<BacktestRunResult, EngineError> {
        let timeframe = Interval::parse(&request.timeframe).ok_or_else(|| {
            EngineError::Validation(format!("unknown timeframe: {}", request.timeframe))
        })?;
        let start = parse_date(&request.start_date, false)?;
        let end = parse_date(&request.end_date, true)?;
        if end <= start {
            return Err(EngineError::Validation(
                "endDate must be after startDate".to_string(),
            ));
        }

        let mode = match request.strategy_mode.as_deref() {
            Some(raw) => StrategyMode::parse(raw).ok_or_else(|| {
                EngineError::Validation(format!("unknown strategy mode: {}", raw))
            })?,
            None => StrategyMode::Adaptive,
        };
        let params = request.strategy_params.clone().unwrap_or_default();
        let risk = resolve_risk(&request)?;

        let candles = self
            .store
            .candles_in_range(&request.symbol, timeframe, start, end)
            .await?;

        info!(
            symbol = request.symbol.as_str(),
            timeframe = %timeframe,
            mode = mode.as_str(),
            candles = candles.len(),
            "running backtest"
        );

        let dispatcher = StrategyDispatcher::new(mode);
        let outcome = run_replay(&candles, &dispatcher, &params, &risk, &request.symbol)?;

        let report = NewBacktestReport {
            user_id: request.user_id,
            symbol: request.symbol.clone(),
            timeframe: timeframe.as_str().to_string(),
            start_date: start,
            end_date: end,
            strategy_params: encode(&params)?,
            risk_params: encode(&risk)?,
            total_trades: outcome.summary.total_trades,
            total_pl: outcome.summary.total_pl,
            winning_trades: outcome.summary.winning_trades,
            losing_trades: outcome.summary.losing_trades,
            win_rate: outcome.summary.win_rate,
        };

        let report_id = self.store.insert_backtest_report(&report).await?;

        // Summary and children exist together or not at all: a failed child
        // insert rolls the summary back before the error surfaces.
        if let Err(err) = self
            .store
            .insert_simulated_trades(report_id, &outcome.trades)
            .await
        {
            error!(report_id, error = %err, "simulated trade insert failed, rolling back report");
            if let Err(rollback) = self.store.delete_backtest_report(report_id).await {
                error!(report_id, error = %rollback, "report rollback also failed");
            }
            return Err(err);
        }

        if self.notifier.is_configured() {
            let subject = format!("Backtest #{} finished ({})", report_id, request.symbol);
            let body = format!(
                "Backtest {} [{} → {}]\ntrades: {}  wins: {}  losses: {}\ntotal P/L: {:.2}  win rate: {:.1}%",
                request.symbol,
                request.start_date,
                request.end_date,
                outcome.summary.total_trades,
                outcome.summary.winning_trades,
                outcome.summary.losing_trades,
                outcome.summary.total_pl,
                outcome.summary.win_rate,
            );
            self.notifier.send(&subject, &body).await;
        }

        Ok(BacktestRunResult {
            report_id,
            summary: outcome.summary,
        })
    }
}

fn resolve_risk(request: &BacktestRequest) -> Result<RiskParams, EngineError> {
    if let Some(risk) = request.risk_params {
        return Ok(risk);
    }
    match request.risk_level.as_deref() {
        Some(raw) => RiskLevel::parse(raw)
            .map(|level| level.params())
            .ok_or_else(|| EngineError::Validation(format!("unknown risk level: {}", raw))),
        None => Ok(RiskParams::default()),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::Validation(format!("unserializable parameters: {}", e)))
}

/// Accepts RFC 3339 stamps or bare dates; bare end dates extend to the end
/// of that day so the range is inclusive.
fn parse_date(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, EngineError> {
    if raw.trim().is_empty() {
        return Err(EngineError::Validation(
            "startDate and endDate are required".to_string(),
        ));
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(stamp.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(stamp) = time {
            return Ok(stamp.and_utc());
        }
    }

    Err(EngineError::Validation(format!("invalid date: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_dates_span_whole_days() {
        let start = parse_date("2025-03-01", false).unwrap();
        let end = parse_date("2025-03-01", true).unwrap();
        assert!(end > start);
        assert_eq!(end.timestamp() - start.timestamp(), 86_399);
    }

    #[test]
    fn rfc3339_dates_pass_through() {
        let stamp = parse_date("2025-03-01T12:30:00Z", false).unwrap();
        assert_eq!(stamp.timestamp() % 3600, 1800);
    }

    #[test]
    fn empty_date_is_a_validation_failure() {
        assert!(matches!(
            parse_date("", false),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            parse_date("yesterday", false),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn explicit_risk_params_win_over_tier() {
        let request: BacktestRequest = serde_json::from_value(serde_json::json!({
            "startDate": "2025-01-01",
            "endDate": "2025-02-01",
            "riskLevel": "risky",
            "riskParams": { "max_lot_size": 0.02, "stop_loss_pips": 150.0 }
        }))
        .unwrap();
        let risk = resolve_risk(&request).unwrap();
        assert_eq!(risk.max_lot_size, 0.02);
    }

    #[test]
    fn unknown_risk_level_is_rejected() {
        let request: BacktestRequest = serde_json::from_value(serde_json::json!({
            "startDate": "2025-01-01",
            "endDate": "2025-02-01",
            "riskLevel": "yolo"
        }))
        .unwrap();
        assert!(matches!(
            resolve_risk(&request),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn snake_case_aliases_are_accepted() {
        let request: BacktestRequest = serde_json::from_value(serde_json::json!({
            "user_id": 7,
            "start_date": "2025-01-01",
            "end_date": "2025-02-01",
            "strategy_mode": "SMA_ONLY"
        }))
        .unwrap();
        assert_eq!(request.user_id, Some(7));
        assert_eq!(request.strategy_mode.as_deref(), Some("SMA_ONLY"));
    }
}
