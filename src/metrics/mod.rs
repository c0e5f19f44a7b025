//! Portfolio performance analytics.

mod calculator;

pub use calculator::{PerformanceCalculator, PerformanceMetrics};
