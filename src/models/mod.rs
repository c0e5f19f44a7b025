//! Data models for analysis inputs, orders, positions and the portfolio.

mod order;
mod portfolio;
mod position;
mod snapshot;
mod transaction;

pub use order::{
    Order, OrderRequest, OrderSide, OrderState, OrderStatus, OrderType, RejectionReason,
    StateError,
};
pub use portfolio::{EquityPoint, Portfolio, PortfolioSummary, EQUITY_HISTORY_LIMIT};
pub use position::Position;
pub use snapshot::{
    AnalysisSnapshot, Fundamentals, MarketRegime, Sentiment, SentimentLabel, Technicals,
};
pub use transaction::Transaction;
