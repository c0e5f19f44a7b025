//! Position model: an open holding in one symbol.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Open position in a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Ticker symbol (unique within a portfolio)
    pub symbol: String,

    /// Shares held, always greater than zero while the position exists
    pub quantity: Decimal,

    /// Volume-weighted average purchase price
    pub average_cost: Decimal,

    /// Last known market price
    pub last_price: Decimal,

    /// (last_price - average_cost) * quantity
    pub unrealized_pnl: Decimal,

    /// P&L locked in by partial sells of this position
    #[serde(default)]
    pub realized_pnl: Decimal,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Open a position from its first buy fill.
    pub fn open(symbol: String, quantity: Decimal, price: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            symbol,
            quantity,
            average_cost: price,
            last_price: price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            created_at: at,
            updated_at: at,
        }
    }

    /// Mark the position to a new market price.
    ///
    /// Returns `false`, leaving the position as it was, when the market value
    /// at `price` cannot be represented.
    pub fn mark(&mut self, price: Decimal, at: DateTime<Utc>) -> bool {
        let unrealized = self
            .quantity
            .checked_mul(price)
            .and_then(|_| (price - self.average_cost).checked_mul(self.quantity));
        let Some(unrealized) = unrealized else {
            return false;
        };

        self.last_price = price;
        self.unrealized_pnl = unrealized;
        self.updated_at = at;
        true
    }

    /// Add to the position (averaging in).
    pub fn add(&mut self, quantity: Decimal, price: Decimal, at: DateTime<Utc>) {
        let total_cost = self.cost_basis() + quantity * price;
        let new_quantity = self.quantity + quantity;

        if !new_quantity.is_zero() {
            self.average_cost = total_cost / new_quantity;
        }

        self.quantity = new_quantity;
        self.mark(price, at);
    }

    /// Reduce the position at `price`, returning the realized P&L of the sold shares.
    ///
    /// Average cost is left untouched.
    pub fn reduce(&mut self, quantity: Decimal, price: Decimal, at: DateTime<Utc>) -> Decimal {
        let realized = (price - self.average_cost) * quantity;

        self.realized_pnl += realized;
        self.quantity -= quantity;
        self.mark(price, at);

        realized
    }

    /// Whether every share has been sold.
    pub fn is_closed(&self) -> bool {
        self.quantity <= Decimal::ZERO
    }

    pub fn market_value(&self) -> Decimal {
        self.quantity * self.last_price
    }

    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.average_cost
    }

    pub fn total_pnl(&self) -> Decimal {
        self.unrealized_pnl + self.realized_pnl
    }

    /// Unrealized return in percent of cost basis.
    pub fn return_pct(&self) -> Decimal {
        let basis = self.cost_basis();
        if basis.is_zero() {
            return Decimal::ZERO;
        }
        self.unrealized_pnl / basis * dec!(100)
    }
}
