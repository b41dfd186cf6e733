//! Typed repository over the engine's store tables.
//!
//! Thin layer: every method is one statement (the backtest rollback in the
//! backtest runner is the only multi-row consistency rule). Uses positional
//! binds and tuple rows; enum columns are stored as their canonical strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::warn;

use crate::config::Database as DatabaseSettings;
use crate::error::EngineError;
use crate::market::{Candle, Interval};
use crate::risk::RiskLevel;
use crate::store::types::*;
use crate::strategy::TradeSide;

const TRADE_COLUMNS: &str = "id, user_id, account_id, session_id, ticket, symbol, side, \
     lot_size, open_price, stop_loss, take_profit, close_price, profit_loss, \
     status, opened_at, closed_at";

type TradeRow = (
    i64,
    i64,
    i64,
    Option<i64>,
    String,
    String,
    String,
    f64,
    f64,
    f64,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, EngineError> {
        PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect(&settings.url)
            .await
            .map_err(|e| EngineError::Store(format!("failed to connect to store: {}", e)))
    }

    /// Pool that defers connecting until first use. Router tests use this to
    /// exercise validation paths without a live database.
    pub fn connect_lazy(url: &str) -> Result<PgPool, EngineError> {
        PgPoolOptions::new()
            .connect_lazy(url)
            .map_err(|e| EngineError::Store(format!("invalid store url: {}", e)))
    }

    pub async fn test_connection(&self) -> Result<(), EngineError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =================================================================
    // Candles (price_data)
    // =================================================================

    /// Upsert candles by (symbol, timeframe, timestamp). Rows that fail are
    /// logged and skipped; returns the number written.
    pub async fn upsert_candles(
        &self,
        symbol: &str,
        timeframe: Interval,
        candles: &[Candle],
    ) -> Result<usize, EngineError> {
        let mut written = 0;
        for candle in candles {
            let result = sqlx::query(
                r#"
                INSERT INTO price_data (symbol, timeframe, timestamp, open, high, low, close, volume)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (symbol, timeframe, timestamp) DO UPDATE SET
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume
                "#,
            )
            .bind(symbol)
            .bind(timeframe.as_str())
            .bind(candle.timestamp)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => written += 1,
                Err(e) => warn!(timestamp = %candle.timestamp, error = %e, "failed to upsert candle"),
            }
        }
        Ok(written)
    }

    /// Candles in `[start, end]`, ascending.
    pub async fn candles_in_range(
        &self,
        symbol: &str,
        timeframe: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, f64, f64, f64, f64, f64)>(
            r#"
            SELECT timestamp, open, high, low, close, volume
            FROM price_data
            WHERE symbol = $1 AND timeframe = $2 AND timestamp >= $3 AND timestamp <= $4
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(timestamp, open, high, low, close, volume)| Candle {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            })
            .collect())
    }

    // =================================================================
    // Trade ledger (trades)
    // =================================================================

    pub async fn insert_trade(&self, trade: &NewTrade) -> Result<i64, EngineError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO trades (user_id, account_id, session_id, ticket, symbol, side,
                                lot_size, open_price, stop_loss, take_profit, status, opened_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'open', NOW())
            RETURNING id
            "#,
        )
        .bind(trade.user_id)
        .bind(trade.account_id)
        .bind(trade.session_id)
        .bind(&trade.ticket)
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.lot_size)
        .bind(trade.open_price)
        .bind(trade.stop_loss)
        .bind(trade.take_profit)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Conditional insert: writes the row only while the session has no other
    /// open trade. Returns `None` when the guard blocked the insert (another
    /// invocation won the race).
    pub async fn insert_trade_guarded(&self, trade: &NewTrade) -> Result<Option<i64>, EngineError> {
        let session_id = match trade.session_id {
            Some(id) => id,
            None => return self.insert_trade(trade).await.map(Some),
        };

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO trades (user_id, account_id, session_id, ticket, symbol, side,
                                lot_size, open_price, stop_loss, take_profit, status, opened_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'open', NOW()
            WHERE NOT EXISTS (
                SELECT 1 FROM trades WHERE session_id = $3 AND status = 'open'
            )
            RETURNING id
            "#,
        )
        .bind(trade.user_id)
        .bind(trade.account_id)
        .bind(session_id)
        .bind(&trade.ticket)
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.lot_size)
        .bind(trade.open_price)
        .bind(trade.stop_loss)
        .bind(trade.take_profit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    /// Close an open row, freezing price, profit and close time together.
    pub async fn close_trade(
        &self,
        id: i64,
        close_price: f64,
        profit_loss: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET close_price = $2, profit_loss = $3, closed_at = $4, status = 'closed'
            WHERE id = $1 AND status = 'open'
            "#,
        )
        .bind(id)
        .bind(close_price)
        .bind(profit_loss)
        .bind(closed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::Store(format!("no open trade with id {}", id)));
        }
        Ok(())
    }

    pub async fn open_trade_by_ticket(
        &self,
        ticket: &str,
    ) -> Result<Option<TradeRecord>, EngineError> {
        let row = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {} FROM trades WHERE ticket = $1 AND status = 'open'",
            TRADE_COLUMNS
        ))
        .bind(ticket)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_trade_row).transpose()
    }

    pub async fn open_trades(
        &self,
        account_id: Option<i64>,
    ) -> Result<Vec<TradeRecord>, EngineError> {
        let mut sql = format!(
            "SELECT {} FROM trades WHERE status = 'open'",
            TRADE_COLUMNS
        );
        if account_id.is_some() {
            sql.push_str(" AND account_id = $1");
        }
        sql.push_str(" ORDER BY opened_at ASC");

        let mut query = sqlx::query_as::<_, TradeRow>(&sql);
        if let Some(account) = account_id {
            query = query.bind(account);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(map_trade_row).collect()
    }

    pub async fn count_open_session_trades(&self, session_id: i64) -> Result<i64, EngineError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM trades WHERE session_id = $1 AND status = 'open'",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =================================================================
    // Bot sessions
    // =================================================================

    pub async fn active_sessions(&self) -> Result<Vec<BotSession>, EngineError> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                i64,
                i64,
                String,
                String,
                Value,
                String,
                DateTime<Utc>,
                Option<DateTime<Utc>>,
                i32,
                Option<DateTime<Utc>>,
            ),
        >(
            r#"
            SELECT id, user_id, account_id, risk_level, strategy_mode, strategy_params,
                   status, started_at, stopped_at, trade_count, last_trade_at
            FROM bot_sessions
            WHERE status = 'active'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(
                    id,
                    user_id,
                    account_id,
                    risk_level,
                    strategy_mode,
                    strategy_params,
                    status,
                    started_at,
                    stopped_at,
                    trade_count,
                    last_trade_at,
                )| {
                    Ok(BotSession {
                        id,
                        user_id,
                        account_id,
                        risk_level: RiskLevel::parse(&risk_level).ok_or_else(|| {
                            EngineError::Store(format!("unknown risk level: {}", risk_level))
                        })?,
                        strategy_mode,
                        strategy_params,
                        status: SessionStatus::parse(&status).ok_or_else(|| {
                            EngineError::Store(format!("unknown session status: {}", status))
                        })?,
                        started_at,
                        stopped_at,
                        trade_count,
                        last_trade_at,
                    })
                },
            )
            .collect()
    }

    /// Bump the session's trade counter after a fill.
    pub async fn record_session_trade(&self, session_id: i64) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE bot_sessions SET trade_count = trade_count + 1, last_trade_at = NOW() WHERE id = $1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_session_status(
        &self,
        session_id: i64,
        status: SessionStatus,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            UPDATE bot_sessions
            SET status = $2,
                stopped_at = CASE WHEN $2 = 'stopped' THEN NOW() ELSE stopped_at END
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =================================================================
    // Backtest reports & simulated trades
    // =================================================================

    pub async fn insert_backtest_report(
        &self,
        report: &NewBacktestReport,
    ) -> Result<i64, EngineError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO backtest_reports (user_id, symbol, timeframe, start_date, end_date,
                                          strategy_params, risk_params, total_trades, total_pl,
                                          winning_trades, losing_trades, win_rate, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            RETURNING id
            "#,
        )
        .bind(report.user_id)
        .bind(&report.symbol)
        .bind(&report.timeframe)
        .bind(report.start_date)
        .bind(report.end_date)
        .bind(&report.strategy_params)
        .bind(&report.risk_params)
        .bind(report.total_trades)
        .bind(report.total_pl)
        .bind(report.winning_trades)
        .bind(report.losing_trades)
        .bind(report.win_rate)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Insert the report's children. Fails on the first bad row so the caller
    /// can run the compensating report delete.
    pub async fn insert_simulated_trades(
        &self,
        report_id: i64,
        trades: &[SimulatedTrade],
    ) -> Result<usize, EngineError> {
        for trade in trades {
            sqlx::query(
                r#"
                INSERT INTO simulated_trades (report_id, symbol, side, lot_size, open_price,
                                              stop_loss, take_profit, close_price, profit_loss,
                                              close_reason, opened_at, closed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(report_id)
            .bind(&trade.symbol)
            .bind(trade.side.as_str())
            .bind(trade.lot_size)
            .bind(trade.open_price)
            .bind(trade.stop_loss)
            .bind(trade.take_profit)
            .bind(trade.close_price)
            .bind(trade.profit_loss)
            .bind(trade.close_reason.as_str())
            .bind(trade.opened_at)
            .bind(trade.closed_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(trades.len())
    }

    /// Compensating delete for a half-written report.
    pub async fn delete_backtest_report(&self, report_id: i64) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM simulated_trades WHERE report_id = $1")
            .bind(report_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM backtest_reports WHERE id = $1")
            .bind(report_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn backtest_report(
        &self,
        report_id: i64,
    ) -> Result<Option<BacktestReport>, EngineError> {
        let row = sqlx::query_as::<_, BacktestReportRow>(&format!(
            "SELECT {} FROM backtest_reports WHERE id = $1",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_report_row))
    }

    pub async fn simulated_trades(
        &self,
        report_id: i64,
    ) -> Result<Vec<SimulatedTrade>, EngineError> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                f64,
                f64,
                f64,
                Option<f64>,
                f64,
                f64,
                String,
                DateTime<Utc>,
                DateTime<Utc>,
            ),
        >(
            r#"
            SELECT symbol, side, lot_size, open_price, stop_loss, take_profit,
                   close_price, profit_loss, close_reason, opened_at, closed_at
            FROM simulated_trades
            WHERE report_id = $1
            ORDER BY opened_at ASC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(
                    symbol,
                    side,
                    lot_size,
                    open_price,
                    stop_loss,
                    take_profit,
                    close_price,
                    profit_loss,
                    close_reason,
                    opened_at,
                    closed_at,
                )| {
                    Ok(SimulatedTrade {
                        symbol,
                        side: parse_side(&side)?,
                        lot_size,
                        open_price,
                        stop_loss,
                        take_profit,
                        close_price,
                        profit_loss,
                        close_reason: CloseReason::parse(&close_reason).ok_or_else(|| {
                            EngineError::Store(format!("unknown close reason: {}", close_reason))
                        })?,
                        opened_at,
                        closed_at,
                    })
                },
            )
            .collect()
    }

    pub async fn list_backtest_reports(
        &self,
        user_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<BacktestReport>, EngineError> {
        let mut sql = format!("SELECT {} FROM backtest_reports", REPORT_COLUMNS);
        if user_id.is_some() {
            sql.push_str(" WHERE user_id = $1");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ");
        sql.push_str(&limit.to_string());

        let mut query = sqlx::query_as::<_, BacktestReportRow>(&sql);
        if let Some(user) = user_id {
            query = query.bind(user);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(map_report_row).collect())
    }

    // =================================================================
    // Notifications
    // =================================================================

    pub async fn insert_notification(
        &self,
        user_id: i64,
        kind: &str,
        title: &str,
        body: &str,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, title, body, created_at, read)
            VALUES ($1, $2, $3, $4, NOW(), FALSE)
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =================================================================
    // Trading accounts
    // =================================================================

    pub async fn trading_account(&self, id: i64) -> Result<Option<TradingAccount>, EngineError> {
        let row = sqlx::query_as::<
            _,
            (
                i64,
                i64,
                String,
                Option<String>,
                String,
                Decimal,
                DateTime<Utc>,
            ),
        >(
            r#"
            SELECT id, user_id, account_number, broker, currency, balance, updated_at
            FROM trading_accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, user_id, account_number, broker, currency, balance, updated_at)| TradingAccount {
                id,
                user_id,
                account_number,
                broker,
                currency,
                balance,
                updated_at,
            },
        ))
    }

    pub async fn upsert_trading_account(
        &self,
        input: &TradingAccountInput,
    ) -> Result<i64, EngineError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO trading_accounts (user_id, account_number, broker, currency, balance, updated_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, 0), NOW())
            ON CONFLICT (user_id, account_number) DO UPDATE SET
                broker = COALESCE(EXCLUDED.broker, trading_accounts.broker),
                currency = EXCLUDED.currency,
                balance = COALESCE($5, trading_accounts.balance),
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(input.user_id)
        .bind(&input.account_number)
        .bind(&input.broker)
        .bind(&input.currency)
        .bind(input.balance)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    // =================================================================
    // Admin aggregates
    // =================================================================

    pub async fn users_overview(&self) -> Result<Vec<UserOverview>, EngineError> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, i64, i64, f64)>(
            r#"
            SELECT u.user_id,
                   COALESCE(s.session_count, 0),
                   COALESCE(s.active_sessions, 0),
                   COALESCE(t.total_trades, 0),
                   COALESCE(t.open_trades, 0),
                   COALESCE(t.realized_pl, 0)::float8
            FROM (
                SELECT user_id FROM bot_sessions
                UNION
                SELECT user_id FROM trades
            ) u
            LEFT JOIN (
                SELECT user_id,
                       COUNT(*) AS session_count,
                       COUNT(*) FILTER (WHERE status = 'active') AS active_sessions
                FROM bot_sessions GROUP BY user_id
            ) s USING (user_id)
            LEFT JOIN (
                SELECT user_id,
                       COUNT(*) AS total_trades,
                       COUNT(*) FILTER (WHERE status = 'open') AS open_trades,
                       SUM(profit_loss) AS realized_pl
                FROM trades GROUP BY user_id
            ) t USING (user_id)
            ORDER BY u.user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(user_id, session_count, active_sessions, total_trades, open_trades, realized_pl)| {
                    UserOverview {
                        user_id,
                        session_count,
                        active_sessions,
                        total_trades,
                        open_trades,
                        realized_pl,
                    }
                },
            )
            .collect())
    }
}

const REPORT_COLUMNS: &str = "id, user_id, symbol, timeframe, start_date, end_date, \
     strategy_params, risk_params, total_trades, total_pl, winning_trades, \
     losing_trades, win_rate, created_at";

type BacktestReportRow = (
    i64,
    Option<i64>,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Value,
    Value,
    i32,
    f64,
    i32,
    i32,
    f64,
    DateTime<Utc>,
);

fn map_report_row(row: BacktestReportRow) -> BacktestReport {
    let (
        id,
        user_id,
        symbol,
        timeframe,
        start_date,
        end_date,
        strategy_params,
        risk_params,
        total_trades,
        total_pl,
        winning_trades,
        losing_trades,
        win_rate,
        created_at,
    ) = row;
    BacktestReport {
        id,
        user_id,
        symbol,
        timeframe,
        start_date,
        end_date,
        strategy_params,
        risk_params,
        total_trades,
        total_pl,
        winning_trades,
        losing_trades,
        win_rate,
        created_at,
    }
}

fn parse_side(value: &str) -> Result<TradeSide, EngineError> {
    TradeSide::parse(value)
        .ok_or_else(|| EngineError::Store(format!("unknown trade side: {}", value)))
}

fn map_trade_row(row: TradeRow) -> Result<TradeRecord, EngineError> {
    let (
        id,
        user_id,
        account_id,
        session_id,
        ticket,
        symbol,
        side,
        lot_size,
        open_price,
        stop_loss,
        take_profit,
        close_price,
        profit_loss,
        status,
        opened_at,
        closed_at,
    ) = row;

    Ok(TradeRecord {
        id,
        user_id,
        account_id,
        session_id,
        ticket,
        symbol,
        side: parse_side(&side)?,
        lot_size,
        open_price,
        stop_loss,
        take_profit,
        close_price,
        profit_loss,
        status: TradeStatus::parse(&status)
            .ok_or_else(|| EngineError::Store(format!("unknown trade status: {}", status)))?,
        opened_at,
        closed_at,
    })
}
