//! Performance metrics for a paper portfolio: win rate, Sharpe, drawdown, etc.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::models::{EquityPoint, Portfolio};

/// Trading days per year used to annualize the Sharpe ratio.
const TRADING_DAYS: f64 = 252.0;

/// Realized-trade and equity-curve statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Sell fills with a realized P&L
    pub closed_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,

    /// Winning closed trades / closed trades (0.0 to 1.0)
    pub win_rate: f64,

    pub avg_win: Decimal,

    /// Average losing trade as a positive amount
    pub avg_loss: Decimal,

    pub best_trade: Decimal,
    pub worst_trade: Decimal,

    /// Gross profit / gross loss
    pub profit_factor: f64,

    /// Mean / std-dev of realized trade P&L, annualized by sqrt(252)
    pub sharpe_ratio: f64,

    /// Largest peak-to-trough fall of the equity history (0.0 to 1.0)
    pub max_drawdown: f64,
    pub max_drawdown_amount: Decimal,

    pub realized_pnl: Decimal,

    /// (total value - initial cash) / initial cash * 100
    pub total_return_pct: Decimal,

    pub calculated_at: DateTime<Utc>,
}

impl std::fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^50}", " PERFORMANCE ")?;
        writeln!(f, "Closed Trades:    {}", self.closed_trades)?;
        writeln!(
            f,
            "Win Rate:         {:.1}% ({}W / {}L)",
            self.win_rate * 100.0,
            self.winning_trades,
            self.losing_trades
        )?;
        writeln!(f, "Avg Win:          ${:.2}", self.avg_win)?;
        writeln!(f, "Avg Loss:         ${:.2}", self.avg_loss)?;
        writeln!(f, "Best Trade:       ${:.2}", self.best_trade)?;
        writeln!(f, "Worst Trade:      ${:.2}", self.worst_trade)?;
        writeln!(f, "Profit Factor:    {:.2}", self.profit_factor)?;
        writeln!(f)?;
        writeln!(f, "Sharpe Ratio:     {:.2}", self.sharpe_ratio)?;
        writeln!(
            f,
            "Max Drawdown:     {:.2}% (${:.2})",
            self.max_drawdown * 100.0,
            self.max_drawdown_amount
        )?;
        writeln!(f, "Realized P&L:     ${:.2}", self.realized_pnl)?;
        writeln!(f, "Total Return:     {:.2}%", self.total_return_pct)?;
        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}

/// Calculator for portfolio performance metrics.
pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Calculate metrics from a portfolio's transactions and equity history.
    pub fn calculate(portfolio: &Portfolio) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics {
            realized_pnl: portfolio.realized_pnl(),
            total_return_pct: portfolio.summary().total_return_pct,
            calculated_at: Utc::now(),
            ..Default::default()
        };

        let pnls: Vec<Decimal> = portfolio
            .transactions()
            .iter()
            .filter_map(|tx| tx.realized_pnl)
            .collect();

        if !pnls.is_empty() {
            Self::calculate_trade_metrics(&mut metrics, &pnls);
            Self::calculate_sharpe(&mut metrics, &pnls);
        }
        Self::calculate_drawdown(&mut metrics, portfolio.equity_history());

        metrics
    }

    /// Win/loss statistics from realized trade outcomes.
    fn calculate_trade_metrics(metrics: &mut PerformanceMetrics, pnls: &[Decimal]) {
        // Break-even trades count toward neither side.
        let wins: Vec<Decimal> = pnls.iter().copied().filter(|p| *p > Decimal::ZERO).collect();
        let losses: Vec<Decimal> = pnls.iter().copied().filter(|p| *p < Decimal::ZERO).collect();

        metrics.closed_trades = pnls.len() as u32;
        metrics.winning_trades = wins.len() as u32;
        metrics.losing_trades = losses.len() as u32;
        metrics.win_rate = wins.len() as f64 / pnls.len() as f64;

        if !wins.is_empty() {
            metrics.avg_win = wins.iter().copied().sum::<Decimal>() / Decimal::from(wins.len() as u32);
        }
        if !losses.is_empty() {
            metrics.avg_loss = losses.iter().map(|l| l.abs()).sum::<Decimal>()
                / Decimal::from(losses.len() as u32);
        }

        metrics.best_trade = pnls.iter().copied().max().unwrap_or_default();
        metrics.worst_trade = pnls.iter().copied().min().unwrap_or_default();

        // Profit factor
        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();
        if gross_loss > Decimal::ZERO {
            metrics.profit_factor =
                gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
        }
    }

    /// Sharpe ratio of realized trade P&L (0% risk-free rate).
    fn calculate_sharpe(metrics: &mut PerformanceMetrics, pnls: &[Decimal]) {
        if pnls.len() < 2 {
            return;
        }

        let returns: Vec<f64> = pnls.iter().filter_map(|p| p.to_f64()).collect();
        if returns.len() < 2 {
            return;
        }

        let mean = (&returns).mean();
        let std_dev = (&returns).std_dev();

        if std_dev > 0.0 {
            metrics.sharpe_ratio = (mean / std_dev) * TRADING_DAYS.sqrt();
        }
    }

    /// Maximum drawdown of the recorded equity curve.
    fn calculate_drawdown(metrics: &mut PerformanceMetrics, history: &[EquityPoint]) {
        let mut peak = Decimal::ZERO;
        let mut max_dd = Decimal::ZERO;
        let mut max_dd_pct = 0.0f64;

        for point in history {
            if point.total_value > peak {
                peak = point.total_value;
            }

            if peak > Decimal::ZERO {
                let dd = peak - point.total_value;
                if dd > max_dd {
                    max_dd = dd;
                }

                let dd_pct = (dd / peak * dec!(100)).to_f64().unwrap_or(0.0) / 100.0;
                if dd_pct > max_dd_pct {
                    max_dd_pct = dd_pct;
                }
            }
        }

        metrics.max_drawdown = max_dd_pct;
        metrics.max_drawdown_amount = max_dd;
    }
}
