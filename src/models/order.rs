//! Order model and its state machine.
//!
//! An order is created PENDING and moves exactly once into FILLED, CANCELLED
//! or REJECTED. The fill, cancellation time and rejection reason live inside
//! the state variant, so a filled order without a fill price cannot exist.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Execution style of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopLimit => "STOP_LIMIT",
        }
    }

    pub fn needs_limit_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn needs_stop_price(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Flat status view of an order, used for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELLED" | "CANCELED" => Ok(OrderStatus::Cancelled),
            "REJECTED" => Ok(OrderStatus::Rejected),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Why an order was refused. Always recoverable by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    #[error("insufficient funds: need ${required}, have ${available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("insufficient position in {symbol}: trying to sell {requested}, holding {held}")]
    InsufficientPosition {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    #[error("no price available for {symbol}")]
    NoPriceAvailable { symbol: String },

    #[error("invalid quantity {quantity}: must be positive with a notional in range")]
    InvalidQuantity { quantity: Decimal },

    #[error("{order_type} order is missing its trigger price")]
    MissingTriggerPrice { order_type: OrderType },
}

impl RejectionReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            RejectionReason::InsufficientPosition { .. } => "INSUFFICIENT_POSITION",
            RejectionReason::NoPriceAvailable { .. } => "NO_PRICE_AVAILABLE",
            RejectionReason::InvalidQuantity { .. } => "INVALID_QUANTITY",
            RejectionReason::MissingTriggerPrice { .. } => "MISSING_TRIGGER_PRICE",
        }
    }
}

/// Invariant violations. These point at a bug in the caller, not at bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("order {order_id} is already {status}; cannot move to {attempted}")]
    TerminalOrder {
        order_id: Uuid,
        status: OrderStatus,
        attempted: OrderStatus,
    },

    #[error("unknown order {order_id}")]
    UnknownOrder { order_id: Uuid },

    #[error("no open position in {symbol}")]
    MissingPosition { symbol: String },

    #[error("fill would oversell {symbol}: selling {requested}, holding {held}")]
    Oversell {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    #[error("fill would overdraw cash: need ${required}, have ${available}")]
    Overdraft { required: Decimal, available: Decimal },

    #[error("notional of {quantity} {symbol} at ${price} is out of range")]
    NotionalOverflow {
        symbol: String,
        quantity: Decimal,
        price: Decimal,
    },
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Pending,
    Filled {
        quantity: Decimal,
        price: Decimal,
        filled_at: DateTime<Utc>,
    },
    Cancelled {
        cancelled_at: DateTime<Utc>,
    },
    Rejected {
        reason: RejectionReason,
        rejected_at: DateTime<Utc>,
    },
}

impl OrderState {
    pub fn status(&self) -> OrderStatus {
        match self {
            OrderState::Pending => OrderStatus::Pending,
            OrderState::Filled { .. } => OrderStatus::Filled,
            OrderState::Cancelled { .. } => OrderStatus::Cancelled,
            OrderState::Rejected { .. } => OrderStatus::Rejected,
        }
    }
}

/// What a caller asks for before an order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
}

impl OrderRequest {
    /// Market order request.
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            stop_price: None,
        }
    }

    /// Limit order request.
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// Stop order request.
    pub fn stop(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Stop,
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// Stop-limit order request.
    pub fn stop_limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::StopLimit,
            stop_price: Some(stop_price),
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }
}

/// A submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    symbol: String,
    side: OrderSide,
    order_type: OrderType,
    quantity: Decimal,
    limit_price: Option<Decimal>,
    stop_price: Option<Decimal>,
    created_at: DateTime<Utc>,
    state: OrderState,
}

impl Order {
    /// Create a pending order from a request. Symbols are stored uppercase.
    pub fn new(request: OrderRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: request.symbol.trim().to_uppercase(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            created_at: Utc::now(),
            state: OrderState::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Requested quantity.
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn limit_price(&self) -> Option<Decimal> {
        self.limit_price
    }

    pub fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> &OrderState {
        &self.state
    }

    pub fn status(&self) -> OrderStatus {
        self.state.status()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == OrderStatus::Pending
    }

    pub fn filled_quantity(&self) -> Decimal {
        match self.state {
            OrderState::Filled { quantity, .. } => quantity,
            _ => Decimal::ZERO,
        }
    }

    pub fn filled_price(&self) -> Option<Decimal> {
        match self.state {
            OrderState::Filled { price, .. } => Some(price),
            _ => None,
        }
    }

    pub fn filled_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            OrderState::Filled { filled_at, .. } => Some(filled_at),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match &self.state {
            OrderState::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether the order may execute at `price` right now.
    ///
    /// Market orders always can. Limits need a price at or better than the
    /// limit, stops need the stop to be touched, stop-limits need both.
    pub fn is_marketable(&self, price: Decimal) -> bool {
        let limit_ok = match self.limit_price {
            Some(limit) => match self.side {
                OrderSide::Buy => price <= limit,
                OrderSide::Sell => price >= limit,
            },
            None => true,
        };
        let stop_hit = match self.stop_price {
            Some(stop) => match self.side {
                OrderSide::Buy => price >= stop,
                OrderSide::Sell => price <= stop,
            },
            None => true,
        };

        match self.order_type {
            OrderType::Market => true,
            OrderType::Limit => limit_ok,
            OrderType::Stop => stop_hit,
            OrderType::StopLimit => stop_hit && limit_ok,
        }
    }

    /// PENDING -> FILLED for the full requested quantity.
    pub fn fill(&mut self, price: Decimal, at: DateTime<Utc>) -> Result<(), StateError> {
        self.ensure_pending(OrderStatus::Filled)?;
        self.state = OrderState::Filled {
            quantity: self.quantity,
            price,
            filled_at: at,
        };
        Ok(())
    }

    /// PENDING -> CANCELLED.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), StateError> {
        self.ensure_pending(OrderStatus::Cancelled)?;
        self.state = OrderState::Cancelled { cancelled_at: at };
        Ok(())
    }

    /// PENDING -> REJECTED.
    pub fn reject(&mut self, reason: RejectionReason, at: DateTime<Utc>) -> Result<(), StateError> {
        self.ensure_pending(OrderStatus::Rejected)?;
        self.state = OrderState::Rejected {
            reason,
            rejected_at: at,
        };
        Ok(())
    }

    fn ensure_pending(&self, attempted: OrderStatus) -> Result<(), StateError> {
        let status = self.status();
        if status.is_terminal() {
            return Err(StateError::TerminalOrder {
                order_id: self.id,
                status,
                attempted,
            });
        }
        Ok(())
    }
}
