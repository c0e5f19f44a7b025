//! Trading engine: validate-then-execute on top of the ledger, plus queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics::{PerformanceCalculator, PerformanceMetrics};
use crate::models::{
    Order, OrderRequest, OrderStatus, Portfolio, PortfolioSummary, Position, StateError,
    Transaction,
};

use super::ledger::PortfolioLedger;
use super::position_sizer::{PositionSizer, SizingError, SizingResult};
use super::price_feed::{PriceBook, PriceFeed};
use super::validator::OrderValidator;
use super::TradingConfig;

/// What a price update did.
#[derive(Debug, Clone, Default)]
pub struct PriceUpdate {
    /// Open positions re-marked
    pub marked: usize,

    /// Prices refused as unusable
    pub ignored: usize,

    /// Resting orders that triggered and filled
    pub filled: Vec<Order>,

    /// Resting orders that triggered but failed revalidation
    pub rejected: Vec<Order>,
}

/// Single-writer paper trading engine for one portfolio.
#[derive(Debug, Clone)]
pub struct TradingEngine {
    config: TradingConfig,
    ledger: PortfolioLedger,
    validator: OrderValidator,
    sizer: PositionSizer,
    prices: PriceBook,
}

impl TradingEngine {
    /// Engine over a fresh portfolio funded from the config.
    pub fn new(config: TradingConfig) -> Self {
        let portfolio = Portfolio::new(config.initial_cash);
        Self::from_parts(config, portfolio, PriceBook::new())
    }

    /// Engine over a reloaded portfolio and price book.
    pub fn from_parts(config: TradingConfig, portfolio: Portfolio, prices: PriceBook) -> Self {
        Self {
            sizer: PositionSizer::new(config.clone()),
            config,
            ledger: PortfolioLedger::from_portfolio(portfolio),
            validator: OrderValidator::new(),
            prices,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.ledger.portfolio()
    }

    pub fn prices(&self) -> &PriceBook {
        &self.prices
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    /// Submit an order: validate, then fill, rest or reject.
    ///
    /// Rejections are returned as a REJECTED order and are not stored.
    pub fn submit_order(&mut self, request: OrderRequest) -> Result<Order, StateError> {
        let order = Order::new(request);
        let market_price = self.prices.price(order.symbol());

        let validated = match self
            .validator
            .validate(&order, self.ledger.portfolio(), market_price)
        {
            Ok(validated) => validated,
            Err(reason) => {
                warn!(
                    order_id = %order.id(),
                    symbol = %order.symbol(),
                    code = reason.code(),
                    reason = %reason,
                    "Order rejected"
                );
                let mut order = order;
                order.reject(reason, Utc::now())?;
                return Ok(order);
            }
        };

        match market_price {
            Some(price) if order.is_marketable(price) => {
                let (filled, _) = self.ledger.execute(validated, price)?;
                Ok(filled)
            }
            _ => Ok(self.ledger.rest(validated)),
        }
    }

    /// Cancel a pending order. `Ok(false)` if the id is unknown.
    pub fn cancel_order(&mut self, order_id: Uuid) -> Result<bool, StateError> {
        self.ledger.cancel(order_id)
    }

    /// Record new prices, re-mark positions and work resting orders.
    pub fn update_prices<I, S>(&mut self, prices: I) -> Result<PriceUpdate, StateError>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let now = Utc::now();
        let mut update = PriceUpdate::default();

        for (symbol, price) in prices {
            let symbol = symbol.as_ref();
            if !self.prices.set(symbol, price, now) {
                warn!(symbol = %symbol, price = %price, "Ignoring unusable price");
                update.ignored += 1;
            }
        }

        update.marked = self.ledger.update_market_prices(&self.prices);

        for order in self.ledger.pending_orders() {
            let Some(price) = self.prices.price(order.symbol()) else {
                continue;
            };
            if !order.is_marketable(price) {
                continue;
            }

            info!(order_id = %order.id(), symbol = %order.symbol(), price = %price, "Resting order triggered");
            match self
                .validator
                .validate(&order, self.ledger.portfolio(), Some(price))
            {
                Ok(validated) => {
                    let (filled, _) = self.ledger.execute(validated, price)?;
                    update.filled.push(filled);
                }
                Err(reason) => {
                    update.rejected.push(self.ledger.reject(order.id(), reason)?);
                }
            }
        }

        Ok(update)
    }

    /// Size a trade against the current account value.
    pub fn size_position(
        &self,
        confidence_score: f64,
        risk_fraction: Option<Decimal>,
    ) -> Result<SizingResult, SizingError> {
        let account = self.portfolio().total_value();
        match risk_fraction {
            Some(fraction) => self.sizer.size(confidence_score, account, fraction),
            None => self.sizer.size_default(confidence_score, account),
        }
    }

    pub fn get_portfolio_summary(&self) -> PortfolioSummary {
        self.portfolio().summary()
    }

    /// Transactions at or after `since`, oldest first.
    pub fn get_transaction_history(&self, since: Option<DateTime<Utc>>) -> Vec<Transaction> {
        self.portfolio()
            .transactions()
            .iter()
            .filter(|tx| since.map_or(true, |since| tx.timestamp >= since))
            .cloned()
            .collect()
    }

    pub fn get_order(&self, order_id: Uuid) -> Option<&Order> {
        self.portfolio().order(order_id)
    }

    /// Stored orders, newest first, optionally filtered.
    pub fn get_orders(&self, symbol: Option<&str>, status: Option<OrderStatus>) -> Vec<Order> {
        let symbol = symbol.map(str::to_uppercase);
        let mut orders: Vec<Order> = self
            .portfolio()
            .orders()
            .iter()
            .rev()
            .filter(|o| symbol.as_deref().map_or(true, |s| o.symbol() == s))
            .filter(|o| status.map_or(true, |s| o.status() == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        orders
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.portfolio().position(&symbol.to_uppercase())
    }

    pub fn positions(&self) -> Vec<&Position> {
        self.portfolio().positions().values().collect()
    }

    pub fn performance(&self) -> PerformanceMetrics {
        PerformanceCalculator::calculate(self.portfolio())
    }

    /// Start over. Uses the configured starting cash unless given one.
    pub fn reset(&mut self, initial_cash: Option<Decimal>) {
        self.ledger
            .reset(initial_cash.unwrap_or(self.config.initial_cash));
    }
}

/// Handle for sharing one engine between tasks.
///
/// Writes hold the lock across the whole validate-then-execute sequence, so
/// two concurrent orders can never both validate against the same state.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<TradingEngine>>,
}

impl SharedEngine {
    pub fn new(engine: TradingEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub async fn submit_order(&self, request: OrderRequest) -> Result<Order, StateError> {
        self.inner.write().await.submit_order(request)
    }

    pub async fn cancel_order(&self, order_id: Uuid) -> Result<bool, StateError> {
        self.inner.write().await.cancel_order(order_id)
    }

    pub async fn update_prices(
        &self,
        prices: Vec<(String, Decimal)>,
    ) -> Result<PriceUpdate, StateError> {
        self.inner.write().await.update_prices(prices)
    }

    pub async fn get_portfolio_summary(&self) -> PortfolioSummary {
        self.inner.read().await.get_portfolio_summary()
    }

    pub async fn get_transaction_history(&self, since: Option<DateTime<Utc>>) -> Vec<Transaction> {
        self.inner.read().await.get_transaction_history(since)
    }

    pub async fn get_position(&self, symbol: &str) -> Option<Position> {
        self.inner.read().await.get_position(symbol).cloned()
    }

    /// Copy of the current portfolio, e.g. for persistence.
    pub async fn snapshot(&self) -> (Portfolio, PriceBook) {
        let engine = self.inner.read().await;
        (engine.portfolio().clone(), engine.prices().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;
    use rust_decimal_macros::dec;

    fn engine(cash: Decimal) -> TradingEngine {
        TradingEngine::new(TradingConfig {
            initial_cash: cash,
            ..Default::default()
        })
    }

    #[test]
    fn test_market_round_trip() {
        let mut engine = engine(dec!(1000));
        engine.update_prices([("AAPL", dec!(50))]).unwrap();

        let buy = engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(10)))
            .unwrap();
        assert_eq!(buy.status(), OrderStatus::Filled);

        engine.update_prices([("AAPL", dec!(70))]).unwrap();
        let summary = engine.get_portfolio_summary();
        assert_eq!(summary.total_value, dec!(1200));
        assert_eq!(summary.unrealized_pnl, dec!(200));

        let sell = engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Sell, dec!(10)))
            .unwrap();
        assert_eq!(sell.filled_price(), Some(dec!(70)));

        let summary = engine.get_portfolio_summary();
        assert_eq!(summary.cash, dec!(1200));
        assert_eq!(summary.realized_pnl, dec!(200));
        assert_eq!(summary.total_pnl, dec!(200));
        assert_eq!(summary.total_return_pct, dec!(20));
        assert_eq!(summary.open_position_count, 0);
        assert_eq!(engine.get_transaction_history(None).len(), 2);
    }

    #[test]
    fn test_rejected_order_is_not_stored() {
        let mut engine = engine(dec!(1000));
        let before = engine.portfolio().clone();

        let order = engine
            .submit_order(OrderRequest::market("TSLA", OrderSide::Sell, dec!(5)))
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Rejected);
        assert_eq!(order.rejection().map(|r| r.code()), Some("INSUFFICIENT_POSITION"));
        assert_eq!(engine.portfolio(), &before);

        let no_price = engine
            .submit_order(OrderRequest::market("NVDA", OrderSide::Buy, dec!(1)))
            .unwrap();
        assert_eq!(no_price.rejection().map(|r| r.code()), Some("NO_PRICE_AVAILABLE"));
    }

    #[test]
    fn test_lowercase_symbols_are_normalized() {
        let mut engine = engine(dec!(1000));
        engine.update_prices([("aapl", dec!(50))]).unwrap();

        let request: OrderRequest = serde_json::from_str(
            r#"{"symbol":"aapl","side":"BUY","order_type":"MARKET","quantity":"10"}"#,
        )
        .unwrap();
        let order = engine.submit_order(request).unwrap();

        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.symbol(), "AAPL");
        assert_eq!(engine.get_position("aapl").map(|p| p.quantity), Some(dec!(10)));
        assert_eq!(engine.get_orders(Some("aapl"), None).len(), 1);

        let update = engine.update_prices([("AAPL", dec!(55))]).unwrap();
        assert_eq!(update.marked, 1);
        assert_eq!(engine.get_portfolio_summary().unrealized_pnl, dec!(50));
    }

    #[test]
    fn test_oversized_order_is_rejected() {
        let mut engine = engine(dec!(1000));
        engine.update_prices([("AAPL", dec!(10000000000))]).unwrap();
        let before = engine.portfolio().clone();

        let quantity = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let order = engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Buy, quantity))
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Rejected);
        assert_eq!(order.rejection().map(|r| r.code()), Some("INVALID_QUANTITY"));
        assert_eq!(engine.portfolio(), &before);
    }

    #[test]
    fn test_resting_limit_fills_on_update() {
        let mut engine = engine(dec!(1000));
        engine.update_prices([("AAPL", dec!(50))]).unwrap();

        let order = engine
            .submit_order(OrderRequest::limit("AAPL", OrderSide::Buy, dec!(10), dec!(45)))
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(engine.get_portfolio_summary().pending_order_count, 1);

        let update = engine.update_prices([("AAPL", dec!(47))]).unwrap();
        assert!(update.filled.is_empty());

        let update = engine.update_prices([("AAPL", dec!(44))]).unwrap();
        assert_eq!(update.filled.len(), 1);
        assert_eq!(update.filled[0].filled_price(), Some(dec!(44)));

        let stored = engine.get_order(order.id()).unwrap();
        assert_eq!(stored.status(), OrderStatus::Filled);
        assert_eq!(engine.portfolio().cash(), dec!(560));
        assert_eq!(engine.get_position("aapl").map(|p| p.quantity), Some(dec!(10)));
    }

    #[test]
    fn test_stop_loss_triggers_and_revalidates() {
        let mut engine = engine(dec!(1000));
        engine.update_prices([("AAPL", dec!(50))]).unwrap();
        engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(10)))
            .unwrap();

        let stop = engine
            .submit_order(OrderRequest::stop("AAPL", OrderSide::Sell, dec!(10), dec!(45)))
            .unwrap();
        assert!(stop.is_pending());

        // Position sold by hand before the stop fires.
        engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Sell, dec!(10)))
            .unwrap();

        let update = engine.update_prices([("AAPL", dec!(44))]).unwrap();
        assert!(update.filled.is_empty());
        assert_eq!(update.rejected.len(), 1);
        assert_eq!(
            update.rejected[0].rejection().map(|r| r.code()),
            Some("INSUFFICIENT_POSITION")
        );
        assert_eq!(engine.get_portfolio_summary().pending_order_count, 0);
    }

    #[test]
    fn test_cancel_resting_order() {
        let mut engine = engine(dec!(1000));
        let order = engine
            .submit_order(OrderRequest::limit("AAPL", OrderSide::Buy, dec!(1), dec!(10)))
            .unwrap();

        assert_eq!(engine.cancel_order(order.id()), Ok(true));
        assert!(engine.cancel_order(order.id()).is_err());
        assert_eq!(engine.cancel_order(Uuid::new_v4()), Ok(false));

        // Cancelled orders never trigger.
        let update = engine.update_prices([("AAPL", dec!(5))]).unwrap();
        assert!(update.filled.is_empty());
        assert_eq!(engine.portfolio().cash(), dec!(1000));
    }

    #[test]
    fn test_order_queries() {
        let mut engine = engine(dec!(10000));
        engine
            .update_prices([("AAPL", dec!(50)), ("MSFT", dec!(100)), ("BAD", dec!(-1))])
            .unwrap();

        let first = engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1)))
            .unwrap();
        let second = engine
            .submit_order(OrderRequest::market("MSFT", OrderSide::Buy, dec!(1)))
            .unwrap();
        let resting = engine
            .submit_order(OrderRequest::limit("AAPL", OrderSide::Buy, dec!(1), dec!(40)))
            .unwrap();

        let all: Vec<Uuid> = engine.get_orders(None, None).iter().map(|o| o.id()).collect();
        assert_eq!(all, vec![resting.id(), second.id(), first.id()]);

        let aapl = engine.get_orders(Some("aapl"), None);
        assert_eq!(aapl.len(), 2);

        let pending = engine.get_orders(None, Some(OrderStatus::Pending));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), resting.id());
        assert_eq!(engine.positions().len(), 2);
    }

    #[test]
    fn test_history_since() {
        let mut engine = engine(dec!(1000));
        engine.update_prices([("AAPL", dec!(10))]).unwrap();
        engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1)))
            .unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(engine.get_transaction_history(None).len(), 1);
        assert!(engine.get_transaction_history(Some(cutoff)).is_empty());
    }

    #[test]
    fn test_size_position_uses_account_value() {
        let engine = engine(dec!(10000));
        let sizing = engine.size_position(90.0, None).unwrap();

        assert_eq!(sizing.adjusted_risk_amount, dec!(300));
        assert_eq!(sizing.max_position_percent, dec!(3));

        let explicit = engine.size_position(90.0, Some(dec!(0.01))).unwrap();
        assert_eq!(explicit.adjusted_risk_amount, dec!(150));
    }

    #[test]
    fn test_reset() {
        let mut engine = engine(dec!(1000));
        engine.update_prices([("AAPL", dec!(10))]).unwrap();
        engine
            .submit_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(5)))
            .unwrap();

        engine.reset(None);
        assert_eq!(engine.portfolio().cash(), dec!(1000));
        assert!(engine.positions().is_empty());

        engine.reset(Some(dec!(250)));
        assert_eq!(engine.get_portfolio_summary().cash, dec!(250));
    }

    #[tokio::test]
    async fn test_concurrent_sells_cannot_both_pass() {
        let mut inner = engine(dec!(1000));
        inner.update_prices([("AAPL", dec!(50))]).unwrap();
        inner
            .submit_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(10)))
            .unwrap();
        let shared = SharedEngine::new(inner);

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let shared = shared.clone();
                tokio::spawn(async move {
                    shared
                        .submit_order(OrderRequest::market("AAPL", OrderSide::Sell, dec!(10)))
                        .await
                })
            })
            .collect();

        let mut statuses = Vec::new();
        for task in tasks {
            statuses.push(task.await.unwrap().unwrap().status());
        }
        statuses.sort_by_key(|s| s.as_str());

        assert_eq!(statuses, vec![OrderStatus::Filled, OrderStatus::Rejected]);
        assert!(shared.get_position("AAPL").await.is_none());
        assert_eq!(shared.get_portfolio_summary().await.cash, dec!(1000));
    }

    #[test]
    fn test_shared_reads_block_on() {
        let shared = SharedEngine::new(engine(dec!(750)));

        let summary = tokio_test::block_on(shared.get_portfolio_summary());
        assert_eq!(summary.cash, dec!(750));

        let history = tokio_test::block_on(shared.get_transaction_history(None));
        assert!(history.is_empty());

        let (portfolio, prices) = tokio_test::block_on(shared.snapshot());
        assert_eq!(portfolio.cash(), dec!(750));
        assert!(prices.is_empty());
    }
}
