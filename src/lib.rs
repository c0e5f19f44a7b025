//! Paper trading core: confidence scoring, position sizing, order
//! validation and a portfolio ledger.

pub mod metrics;
pub mod models;
pub mod scoring;
pub mod store;
pub mod trading;
