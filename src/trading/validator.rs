//! Pre-trade checks. Validation reads state and never mutates it.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{Order, OrderSide, OrderType, Portfolio, RejectionReason};

/// An order that passed validation against a portfolio.
///
/// Only [`OrderValidator`] can build one, so the ledger never executes an
/// unchecked order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    order: Order,
    reference_price: Option<Decimal>,
}

impl ValidatedOrder {
    pub fn order(&self) -> &Order {
        &self.order
    }

    /// Price used for the funds check (limit price, else market price).
    pub fn reference_price(&self) -> Option<Decimal> {
        self.reference_price
    }

    pub fn into_order(self) -> Order {
        self.order
    }
}

/// Stateless order validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderValidator;

impl OrderValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check `order` against `portfolio` with the caller's last market price.
    pub fn validate(
        &self,
        order: &Order,
        portfolio: &Portfolio,
        market_price: Option<Decimal>,
    ) -> Result<ValidatedOrder, RejectionReason> {
        let result = self.check(order, portfolio, market_price);
        if let Err(reason) = &result {
            debug!(order_id = %order.id(), code = reason.code(), "Validation failed");
        }
        result
    }

    fn check(
        &self,
        order: &Order,
        portfolio: &Portfolio,
        market_price: Option<Decimal>,
    ) -> Result<ValidatedOrder, RejectionReason> {
        let quantity = order.quantity();
        if quantity <= Decimal::ZERO {
            return Err(RejectionReason::InvalidQuantity { quantity });
        }

        let order_type = order.order_type();
        if (order_type.needs_limit_price() && order.limit_price().is_none())
            || (order_type.needs_stop_price() && order.stop_price().is_none())
        {
            return Err(RejectionReason::MissingTriggerPrice { order_type });
        }

        let market_price = market_price.filter(|p| *p > Decimal::ZERO);
        if order_type == OrderType::Market && market_price.is_none() {
            return Err(RejectionReason::NoPriceAvailable {
                symbol: order.symbol().to_string(),
            });
        }

        let reference_price = order.limit_price().or(market_price);

        match order.side() {
            OrderSide::Buy => {
                let Some(price) = reference_price else {
                    return Err(RejectionReason::NoPriceAvailable {
                        symbol: order.symbol().to_string(),
                    });
                };
                let Some(required) = quantity.checked_mul(price) else {
                    return Err(RejectionReason::InvalidQuantity { quantity });
                };
                let available = portfolio.cash();
                if required > available {
                    return Err(RejectionReason::InsufficientFunds {
                        required,
                        available,
                    });
                }
            }
            OrderSide::Sell => {
                let held = portfolio
                    .position(order.symbol())
                    .map(|p| p.quantity)
                    .unwrap_or(Decimal::ZERO);
                if held < quantity {
                    return Err(RejectionReason::InsufficientPosition {
                        symbol: order.symbol().to_string(),
                        requested: quantity,
                        held,
                    });
                }

                // Proceeds must fit alongside the current cash balance.
                if let Some(price) = reference_price {
                    let fits = quantity
                        .checked_mul(price)
                        .and_then(|proceeds| portfolio.cash().checked_add(proceeds))
                        .is_some();
                    if !fits {
                        return Err(RejectionReason::InvalidQuantity { quantity });
                    }
                }
            }
        }

        Ok(ValidatedOrder {
            order: order.clone(),
            reference_price,
        })
    }
}
