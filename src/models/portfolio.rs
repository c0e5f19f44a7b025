//! Portfolio aggregate: cash, open positions and the order/transaction logs.
//!
//! Fields are only mutable from inside the crate; the ledger is the single
//! writer and keeps the invariants (cash never negative, no zero-quantity
//! positions, append-only order and transaction logs).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{Order, OrderStatus};
use super::position::Position;
use super::transaction::Transaction;

/// Portfolio value at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub total_value: Decimal,
    pub cash: Decimal,
}

/// Paper-trading account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub(crate) initial_cash: Decimal,
    pub(crate) cash: Decimal,
    pub(crate) positions: BTreeMap<String, Position>,
    pub(crate) orders: Vec<Order>,
    pub(crate) transactions: Vec<Transaction>,
    /// Realized P&L across every sell, including positions since closed
    #[serde(default)]
    pub(crate) realized_pnl: Decimal,
    #[serde(default)]
    pub(crate) equity_history: Vec<EquityPoint>,
    pub(crate) created_at: DateTime<Utc>,
}

/// Most equity points a portfolio keeps.
pub const EQUITY_HISTORY_LIMIT: usize = 10_000;

impl Portfolio {
    /// Create an empty portfolio funded with `initial_cash`.
    pub fn new(initial_cash: Decimal) -> Self {
        let now = Utc::now();
        Self {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            orders: Vec::new(),
            transactions: Vec::new(),
            realized_pnl: Decimal::ZERO,
            equity_history: vec![EquityPoint {
                timestamp: now,
                total_value: initial_cash,
                cash: initial_cash,
            }],
            created_at: now,
        }
    }

    pub fn initial_cash(&self) -> Decimal {
        self.initial_cash
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Paper accounts have no margin: buying power is cash.
    pub fn buying_power(&self) -> Decimal {
        self.cash
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id() == id)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn equity_history(&self) -> &[EquityPoint] {
        &self.equity_history
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Market value of all open positions.
    pub fn positions_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Cash plus marked position value.
    pub fn total_value(&self) -> Decimal {
        self.cash + self.positions_value()
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl()
    }

    pub fn pending_order_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.status() == OrderStatus::Pending)
            .count()
    }

    /// Append an equity point if value or cash moved since the last one.
    ///
    /// The history keeps at most [`EQUITY_HISTORY_LIMIT`] points, dropping
    /// the oldest first.
    pub(crate) fn record_equity(&mut self, at: DateTime<Utc>) {
        let total_value = self.total_value();
        let unchanged = self
            .equity_history
            .last()
            .is_some_and(|last| last.total_value == total_value && last.cash == self.cash);
        if unchanged {
            return;
        }

        self.equity_history.push(EquityPoint {
            timestamp: at,
            total_value,
            cash: self.cash,
        });
        if self.equity_history.len() > EQUITY_HISTORY_LIMIT {
            let excess = self.equity_history.len() - EQUITY_HISTORY_LIMIT;
            self.equity_history.drain(..excess);
        }
    }

    /// Headline numbers for display.
    pub fn summary(&self) -> PortfolioSummary {
        let total_value = self.total_value();
        let total_pnl = self.total_pnl();
        let total_return_pct = if self.initial_cash > Decimal::ZERO {
            (total_value - self.initial_cash) / self.initial_cash * dec!(100)
        } else {
            Decimal::ZERO
        };

        PortfolioSummary {
            cash: self.cash,
            total_value,
            buying_power: self.buying_power(),
            realized_pnl: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl(),
            total_pnl,
            total_return_pct,
            open_position_count: self.positions.len(),
            pending_order_count: self.pending_order_count(),
        }
    }
}

/// Portfolio headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub cash: Decimal,
    pub total_value: Decimal,
    pub buying_power: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub total_return_pct: Decimal,
    pub open_position_count: usize,
    pub pending_order_count: usize,
}

impl std::fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^50}", " PORTFOLIO ")?;
        writeln!(f, "Cash:             ${:.2}", self.cash)?;
        writeln!(f, "Buying Power:     ${:.2}", self.buying_power)?;
        writeln!(f, "Total Value:      ${:.2}", self.total_value)?;
        writeln!(f)?;
        writeln!(f, "Realized P&L:     ${:.2}", self.realized_pnl)?;
        writeln!(f, "Unrealized P&L:   ${:.2}", self.unrealized_pnl)?;
        writeln!(
            f,
            "Total P&L:        ${:.2} ({:.2}%)",
            self.total_pnl, self.total_return_pct
        )?;
        writeln!(f)?;
        writeln!(f, "Open Positions:   {}", self.open_position_count)?;
        writeln!(f, "Pending Orders:   {}", self.pending_order_count)?;
        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_portfolio_summary() {
        let portfolio = Portfolio::new(dec!(1000));
        let summary = portfolio.summary();

        assert_eq!(summary.cash, dec!(1000));
        assert_eq!(summary.total_value, dec!(1000));
        assert_eq!(summary.buying_power, dec!(1000));
        assert_eq!(summary.total_pnl, Decimal::ZERO);
        assert_eq!(summary.total_return_pct, Decimal::ZERO);
        assert_eq!(summary.open_position_count, 0);
        assert_eq!(summary.pending_order_count, 0);
        assert_eq!(portfolio.equity_history().len(), 1);
    }

    #[test]
    fn test_total_value_marks_positions() {
        let now = Utc::now();
        let mut portfolio = Portfolio::new(dec!(1000));
        portfolio.cash = dec!(500);
        let mut pos = Position::open("AAPL".to_string(), dec!(10), dec!(50), now);
        pos.mark(dec!(60), now);
        portfolio.positions.insert("AAPL".to_string(), pos);

        assert_eq!(portfolio.positions_value(), dec!(600));
        assert_eq!(portfolio.total_value(), dec!(1100));
        assert_eq!(portfolio.total_pnl(), dec!(100));
        assert_eq!(portfolio.summary().total_return_pct, dec!(10));
    }

    #[test]
    fn test_equity_history_skips_unchanged_points() {
        let now = Utc::now();
        let mut portfolio = Portfolio::new(dec!(1000));

        portfolio.record_equity(now);
        portfolio.record_equity(now);
        assert_eq!(portfolio.equity_history().len(), 1);

        portfolio.cash = dec!(900);
        portfolio.record_equity(now);
        portfolio.record_equity(now);
        assert_eq!(portfolio.equity_history().len(), 2);
        assert_eq!(portfolio.equity_history()[1].total_value, dec!(900));
    }

    #[test]
    fn test_equity_history_is_bounded() {
        let now = Utc::now();
        let mut portfolio = Portfolio::new(dec!(1000));

        for i in 0..(EQUITY_HISTORY_LIMIT + 50) {
            portfolio.cash = Decimal::from(i as u64 + 1);
            portfolio.record_equity(now);
        }

        let history = portfolio.equity_history();
        assert_eq!(history.len(), EQUITY_HISTORY_LIMIT);
        assert_eq!(
            history.last().map(|p| p.cash),
            Some(Decimal::from(EQUITY_HISTORY_LIMIT as u64 + 50))
        );
    }
}
