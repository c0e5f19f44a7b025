//! Portfolio ledger: the single writer for cash, positions and histories.
//!
//! Every write checks its preconditions before touching state, so a failed
//! call leaves the portfolio exactly as it was.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Order, OrderSide, OrderStatus, Portfolio, Position, RejectionReason, StateError, Transaction,
};

use super::price_feed::PriceFeed;
use super::validator::ValidatedOrder;

/// Owns a [`Portfolio`] and applies fills, cancels and price marks to it.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    portfolio: Portfolio,
}

impl PortfolioLedger {
    /// Ledger over a fresh portfolio.
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            portfolio: Portfolio::new(initial_cash),
        }
    }

    /// Ledger over an existing (e.g. reloaded) portfolio.
    pub fn from_portfolio(portfolio: Portfolio) -> Self {
        Self { portfolio }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Fill a validated order at `fill_price`.
    ///
    /// Returns the filled order and its transaction. Fails without mutating
    /// anything if the fill would overdraw cash, oversell a position, or if
    /// the stored order is no longer pending.
    pub fn execute(
        &mut self,
        validated: ValidatedOrder,
        fill_price: Decimal,
    ) -> Result<(Order, Transaction), StateError> {
        let mut order = validated.into_order();
        let symbol = order.symbol().to_string();
        let quantity = order.quantity();
        let overflow = || StateError::NotionalOverflow {
            symbol: symbol.clone(),
            quantity,
            price: fill_price,
        };
        let notional = quantity.checked_mul(fill_price).ok_or_else(overflow)?;

        match order.side() {
            OrderSide::Buy => {
                if notional > self.portfolio.cash {
                    return Err(StateError::Overdraft {
                        required: notional,
                        available: self.portfolio.cash,
                    });
                }
            }
            OrderSide::Sell => {
                let held = self
                    .portfolio
                    .positions
                    .get(&symbol)
                    .map(|p| p.quantity)
                    .ok_or_else(|| StateError::MissingPosition {
                        symbol: symbol.clone(),
                    })?;
                if held < quantity {
                    return Err(StateError::Oversell {
                        symbol: symbol.clone(),
                        requested: quantity,
                        held,
                    });
                }
                if self.portfolio.cash.checked_add(notional).is_none() {
                    return Err(overflow());
                }
            }
        }

        let slot = self.portfolio.orders.iter().position(|o| o.id() == order.id());
        if let Some(stored) = slot.map(|i| &self.portfolio.orders[i]) {
            if !stored.is_pending() {
                return Err(StateError::TerminalOrder {
                    order_id: stored.id(),
                    status: stored.status(),
                    attempted: OrderStatus::Filled,
                });
            }
        }

        let now = Utc::now();
        order.fill(fill_price, now)?;

        let realized = match order.side() {
            OrderSide::Buy => {
                self.portfolio.cash -= notional;
                match self.portfolio.positions.get_mut(&symbol) {
                    Some(position) => position.add(quantity, fill_price, now),
                    None => {
                        let position = Position::open(symbol.clone(), quantity, fill_price, now);
                        self.portfolio.positions.insert(symbol.clone(), position);
                        info!(symbol = %symbol, quantity = %quantity, "Position opened");
                    }
                }
                None
            }
            OrderSide::Sell => {
                let Some(position) = self.portfolio.positions.get_mut(&symbol) else {
                    return Err(StateError::MissingPosition { symbol });
                };
                let realized = position.reduce(quantity, fill_price, now);
                let closed = position.is_closed();

                self.portfolio.realized_pnl += realized;
                self.portfolio.cash += notional;

                if closed {
                    self.portfolio.positions.remove(&symbol);
                    info!(symbol = %symbol, realized_pnl = %realized, "Position closed");
                }
                Some(realized)
            }
        };

        let transaction = Transaction::from_fill(&order, quantity, fill_price, realized, now);
        self.portfolio.transactions.push(transaction.clone());

        match slot {
            Some(i) => self.portfolio.orders[i] = order.clone(),
            None => self.portfolio.orders.push(order.clone()),
        }
        self.portfolio.record_equity(now);

        info!(
            order_id = %order.id(),
            symbol = %order.symbol(),
            side = %order.side(),
            quantity = %quantity,
            price = %fill_price,
            cash = %self.portfolio.cash,
            "Order filled"
        );

        Ok((order, transaction))
    }

    /// Store a validated order that is waiting for its trigger.
    pub fn rest(&mut self, validated: ValidatedOrder) -> Order {
        let order = validated.into_order();
        info!(
            order_id = %order.id(),
            symbol = %order.symbol(),
            order_type = %order.order_type(),
            "Order resting"
        );
        self.portfolio.orders.push(order.clone());
        order
    }

    /// Cancel a pending order.
    ///
    /// `Ok(false)` when no order has that id; an error when the order is
    /// already terminal.
    pub fn cancel(&mut self, order_id: Uuid) -> Result<bool, StateError> {
        let Some(order) = self.portfolio.orders.iter_mut().find(|o| o.id() == order_id) else {
            return Ok(false);
        };

        order.cancel(Utc::now())?;
        info!(order_id = %order_id, symbol = %order.symbol(), "Order cancelled");
        Ok(true)
    }

    /// Reject a stored pending order whose trigger fired but failed revalidation.
    pub fn reject(&mut self, order_id: Uuid, reason: RejectionReason) -> Result<Order, StateError> {
        let Some(order) = self.portfolio.orders.iter_mut().find(|o| o.id() == order_id) else {
            return Err(StateError::UnknownOrder { order_id });
        };

        order.reject(reason, Utc::now())?;
        info!(order_id = %order_id, symbol = %order.symbol(), "Resting order rejected");
        Ok(order.clone())
    }

    /// Mark open positions to `prices`. Cash, realized P&L and average cost
    /// are untouched. Returns how many positions were marked.
    pub fn update_market_prices(&mut self, prices: &impl PriceFeed) -> usize {
        let now = Utc::now();
        let mut marked = 0;

        for (symbol, position) in self.portfolio.positions.iter_mut() {
            if let Some(price) = prices.price(symbol) {
                if position.mark(price, now) {
                    marked += 1;
                } else {
                    warn!(symbol = %symbol, price = %price, "Price out of range for position size");
                }
            }
        }

        self.portfolio.record_equity(now);
        debug!(marked = marked, total_value = %self.portfolio.total_value(), "Positions marked");
        marked
    }

    /// Pending orders, oldest first.
    pub fn pending_orders(&self) -> Vec<Order> {
        self.portfolio
            .orders
            .iter()
            .filter(|o| o.is_pending())
            .cloned()
            .collect()
    }

    /// Discard everything and start over with `initial_cash`.
    pub fn reset(&mut self, initial_cash: Decimal) {
        self.portfolio = Portfolio::new(initial_cash);
        info!(initial_cash = %initial_cash, "Portfolio reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderRequest;
    use crate::trading::OrderValidator;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn submit(
        ledger: &mut PortfolioLedger,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(Order, Transaction), RejectionReason> {
        let order = Order::new(OrderRequest::market("AAPL", side, quantity));
        let validated = OrderValidator::new().validate(&order, ledger.portfolio(), Some(price))?;
        Ok(ledger.execute(validated, price).unwrap())
    }

    #[test]
    fn test_buy_opens_position() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        let (order, tx) = submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();

        let portfolio = ledger.portfolio();
        assert_eq!(portfolio.cash(), dec!(500));
        let position = portfolio.position("AAPL").unwrap();
        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.average_cost, dec!(50));

        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.filled_price(), Some(dec!(50)));
        assert_eq!(tx.total, dec!(500));
        assert_eq!(tx.realized_pnl, None);
        assert_eq!(portfolio.orders().len(), 1);
        assert_eq!(portfolio.transactions().len(), 1);
    }

    #[test]
    fn test_second_buy_rejected_before_mutation() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();
        let before = ledger.portfolio().clone();

        let err = submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(60)).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(ledger.portfolio(), &before);
        assert_eq!(ledger.portfolio().cash(), dec!(500));
    }

    #[test]
    fn test_averaging_in() {
        let mut ledger = PortfolioLedger::new(dec!(2000));
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(60)).unwrap();

        let position = ledger.portfolio().position("AAPL").unwrap();
        assert_eq!(position.quantity, dec!(20));
        assert_eq!(position.average_cost, dec!(55));
        assert_eq!(ledger.portfolio().cash(), dec!(900));
    }

    #[test]
    fn test_sell_closes_position() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();

        let (_, tx) = submit(&mut ledger, OrderSide::Sell, dec!(10), dec!(70)).unwrap();

        let portfolio = ledger.portfolio();
        assert_eq!(tx.realized_pnl, Some(dec!(200)));
        assert_eq!(portfolio.realized_pnl(), dec!(200));
        assert_eq!(portfolio.cash(), dec!(1200));
        assert!(portfolio.position("AAPL").is_none());
        assert!(portfolio.positions().is_empty());
    }

    #[test]
    fn test_partial_sell_keeps_average_cost() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();
        submit(&mut ledger, OrderSide::Sell, dec!(4), dec!(40)).unwrap();

        let position = ledger.portfolio().position("AAPL").unwrap();
        assert_eq!(position.quantity, dec!(6));
        assert_eq!(position.average_cost, dec!(50));
        assert_eq!(position.realized_pnl, dec!(-40));
        assert_eq!(ledger.portfolio().realized_pnl(), dec!(-40));
        assert_eq!(ledger.portfolio().cash(), dec!(660));
    }

    #[test]
    fn test_sell_without_position_leaves_state_unchanged() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        let before = ledger.portfolio().clone();
        let before_json = serde_json::to_string(&before).unwrap();

        let err = submit(&mut ledger, OrderSide::Sell, dec!(1), dec!(10)).unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_POSITION");
        assert_eq!(serde_json::to_string(ledger.portfolio()).unwrap(), before_json);
    }

    #[test]
    fn test_cash_conservation() {
        let mut ledger = PortfolioLedger::new(dec!(10000));
        let fills = [
            (OrderSide::Buy, dec!(10), dec!(101.37)),
            (OrderSide::Buy, dec!(3), dec!(99.99)),
            (OrderSide::Sell, dec!(7), dec!(104.01)),
            (OrderSide::Buy, dec!(0.5), dec!(98.333)),
            (OrderSide::Sell, dec!(6.5), dec!(97.5)),
        ];

        for (side, quantity, price) in fills {
            submit(&mut ledger, side, quantity, price).unwrap();
        }

        let portfolio = ledger.portfolio();
        let flows: Decimal = portfolio.transactions().iter().map(Transaction::cash_flow).sum();
        assert_eq!(portfolio.cash(), dec!(10000) + flows);
        assert!(portfolio.cash() >= Decimal::ZERO);
        assert!(portfolio.positions().is_empty());
        assert!(portfolio.positions().values().all(|p| p.quantity > Decimal::ZERO));
    }

    #[test]
    fn test_execute_refuses_overdraft() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        let order = Order::new(OrderRequest::market("AAPL", OrderSide::Buy, dec!(10)));
        let validated = OrderValidator::new()
            .validate(&order, ledger.portfolio(), Some(dec!(50)))
            .unwrap();
        let before = ledger.portfolio().clone();

        // Price moved between validation and the fill.
        let err = ledger.execute(validated, dec!(150)).unwrap_err();
        assert!(matches!(err, StateError::Overdraft { .. }));
        assert_eq!(ledger.portfolio(), &before);
    }

    #[test]
    fn test_execute_refuses_unrepresentable_notional() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        let order = Order::new(OrderRequest::market("AAPL", OrderSide::Buy, dec!(10)));
        let validated = OrderValidator::new()
            .validate(&order, ledger.portfolio(), Some(dec!(50)))
            .unwrap();
        let before = ledger.portfolio().clone();

        let err = ledger.execute(validated, Decimal::MAX).unwrap_err();
        assert!(matches!(err, StateError::NotionalOverflow { .. }));
        assert_eq!(ledger.portfolio(), &before);
    }

    #[test]
    fn test_out_of_range_mark_is_skipped() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();

        let mut prices = BTreeMap::new();
        prices.insert("AAPL".to_string(), Decimal::MAX);
        assert_eq!(ledger.update_market_prices(&prices), 0);

        let position = ledger.portfolio().position("AAPL").unwrap();
        assert_eq!(position.last_price, dec!(50));
        assert_eq!(ledger.portfolio().total_value(), dec!(1000));
    }

    #[test]
    fn test_cancel_semantics() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        let order = Order::new(OrderRequest::limit("AAPL", OrderSide::Buy, dec!(1), dec!(40)));
        let validated = OrderValidator::new()
            .validate(&order, ledger.portfolio(), Some(dec!(50)))
            .unwrap();
        let resting = ledger.rest(validated.clone());

        assert_eq!(ledger.cancel(Uuid::new_v4()), Ok(false));
        assert_eq!(ledger.cancel(resting.id()), Ok(true));
        assert_eq!(
            ledger.portfolio().order(resting.id()).map(|o| o.status()),
            Some(OrderStatus::Cancelled)
        );

        assert!(matches!(
            ledger.cancel(resting.id()),
            Err(StateError::TerminalOrder { .. })
        ));

        // A stale validated copy cannot fill a cancelled order.
        assert!(matches!(
            ledger.execute(validated, dec!(40)),
            Err(StateError::TerminalOrder { .. })
        ));
        assert_eq!(ledger.portfolio().cash(), dec!(1000));
    }

    #[test]
    fn test_update_market_prices_only_marks() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();

        let mut prices = BTreeMap::new();
        prices.insert("AAPL".to_string(), dec!(65));
        prices.insert("MSFT".to_string(), dec!(400));
        let marked = ledger.update_market_prices(&prices);

        let portfolio = ledger.portfolio();
        let position = portfolio.position("AAPL").unwrap();
        assert_eq!(marked, 1);
        assert_eq!(position.last_price, dec!(65));
        assert_eq!(position.unrealized_pnl, dec!(150));
        assert_eq!(position.average_cost, dec!(50));
        assert_eq!(portfolio.cash(), dec!(500));
        assert_eq!(portfolio.realized_pnl(), Decimal::ZERO);
        assert_eq!(portfolio.total_value(), dec!(1150));
    }

    #[test]
    fn test_reset() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        submit(&mut ledger, OrderSide::Buy, dec!(10), dec!(50)).unwrap();

        ledger.reset(dec!(5000));

        let portfolio = ledger.portfolio();
        assert_eq!(portfolio.cash(), dec!(5000));
        assert!(portfolio.positions().is_empty());
        assert!(portfolio.orders().is_empty());
        assert!(portfolio.transactions().is_empty());
    }
}
