//! Trading logic: sizing, validation, the portfolio ledger and the engine.

mod config;
mod engine;
mod ledger;
mod position_sizer;
mod price_feed;
mod validator;

pub use config::TradingConfig;
pub use engine::{PriceUpdate, SharedEngine, TradingEngine};
pub use ledger::PortfolioLedger;
pub use position_sizer::{PositionSizer, SizingError, SizingResult};
pub use price_feed::{PriceBook, PriceFeed};
pub use validator::{OrderValidator, ValidatedOrder};
