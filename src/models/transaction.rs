//! Transaction model: the audit record written for every fill.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{Order, OrderSide, OrderType};

/// One executed fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier
    pub id: Uuid,

    /// Order that produced this fill
    pub order_id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub symbol: String,

    pub side: OrderSide,

    pub order_type: OrderType,

    /// Shares filled
    pub quantity: Decimal,

    /// Fill price per share
    pub price: Decimal,

    /// quantity * price
    pub total: Decimal,

    /// Realized P&L of a sell fill; `None` for buys
    #[serde(default)]
    pub realized_pnl: Option<Decimal>,
}

impl Transaction {
    /// Build the audit record for a filled order.
    pub fn from_fill(
        order: &Order,
        quantity: Decimal,
        price: Decimal,
        realized_pnl: Option<Decimal>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id(),
            timestamp,
            symbol: order.symbol().to_string(),
            side: order.side(),
            order_type: order.order_type(),
            quantity,
            price,
            total: quantity * price,
            realized_pnl,
        }
    }

    /// Signed cash movement: negative for buys, positive for sells.
    pub fn cash_flow(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => -self.total,
            OrderSide::Sell => self.total,
        }
    }

    /// Whether this fill closed shares at a profit.
    pub fn is_winner(&self) -> bool {
        self.realized_pnl.is_some_and(|pnl| pnl > Decimal::ZERO)
    }
}
