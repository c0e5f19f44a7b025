//! Confidence-scaled position sizing.
//!
//! Sizing is a pure function of the score and the account: it never looks at
//! portfolio state, so a size can be previewed without side effects.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::ConfidenceLevel;

use super::TradingConfig;

/// Invalid sizing inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("account size must be positive, got {0}")]
    InvalidAccountSize(Decimal),

    #[error("risk fraction must be in (0, 1], got {0}")]
    InvalidRiskFraction(Decimal),

    #[error("confidence score must be a finite value in [0, 100], got {0}")]
    InvalidScore(f64),
}

/// Output of a sizing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    pub account_size: Decimal,

    /// account_size * risk fraction
    pub base_risk_amount: Decimal,

    /// base_risk_amount * multiplier
    pub adjusted_risk_amount: Decimal,

    pub multiplier: Decimal,

    /// adjusted_risk_amount / account_size * 100
    pub max_position_percent: Decimal,

    pub confidence_level: ConfidenceLevel,

    pub note: String,

    /// Notional cap per position as a fraction of the account
    pub max_position_size: Decimal,
}

impl SizingResult {
    /// Whole shares to buy at `entry_price` with a stop `stop_fraction` below it.
    ///
    /// The loss at the stop stays within the adjusted risk and the notional
    /// stays within the per-position cap.
    pub fn suggested_quantity(&self, entry_price: Decimal, stop_fraction: Decimal) -> Decimal {
        if entry_price <= Decimal::ZERO || stop_fraction <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let risk_per_share = entry_price * stop_fraction;
        let by_risk = (self.adjusted_risk_amount / risk_per_share).floor();
        let by_notional = (self.account_size * self.max_position_size / entry_price).floor();

        by_risk.min(by_notional).max(Decimal::ZERO)
    }
}

impl std::fmt::Display for SizingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^50}", " POSITION SIZE ")?;
        writeln!(f, "Account Size:     ${:.2}", self.account_size)?;
        writeln!(f, "Confidence:       {}", self.confidence_level)?;
        writeln!(f, "Base Risk:        ${:.2}", self.base_risk_amount)?;
        writeln!(f, "Multiplier:       {}x", self.multiplier)?;
        writeln!(f, "Adjusted Risk:    ${:.2}", self.adjusted_risk_amount)?;
        writeln!(f, "Max Position:     {:.2}%", self.max_position_percent)?;
        writeln!(f, "Note:             {}", self.note)?;
        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}

/// Calculator for confidence-scaled risk budgets.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: TradingConfig,
}

impl PositionSizer {
    /// Create a new position sizer with given config.
    pub fn new(config: TradingConfig) -> Self {
        Self { config }
    }

    /// Multiplier and note for a confidence level, capped by the config.
    fn multiplier(&self, level: ConfidenceLevel) -> (Decimal, &'static str) {
        let (multiplier, note) = match level {
            ConfidenceLevel::UltraHigh => (dec!(1.5), "Increased size due to exceptional setup"),
            ConfidenceLevel::High => (dec!(1.0), "Standard position size"),
            ConfidenceLevel::Medium => (dec!(0.5), "Reduced size due to mixed signals"),
            ConfidenceLevel::Low => (dec!(0.25), "Minimal size or consider passing"),
        };
        (multiplier.min(self.config.max_multiplier), note)
    }

    /// Size a trade from a confidence score.
    ///
    /// # Arguments
    /// * `confidence_score` - Raw 0-100 score from the scorer
    /// * `account_size` - Account value the risk is taken against
    /// * `risk_fraction` - Base fraction of the account risked, in (0, 1]
    pub fn size(
        &self,
        confidence_score: f64,
        account_size: Decimal,
        risk_fraction: Decimal,
    ) -> Result<SizingResult, SizingError> {
        if account_size <= Decimal::ZERO {
            return Err(SizingError::InvalidAccountSize(account_size));
        }
        if risk_fraction <= Decimal::ZERO || risk_fraction > Decimal::ONE {
            return Err(SizingError::InvalidRiskFraction(risk_fraction));
        }
        if !confidence_score.is_finite() || !(0.0..=100.0).contains(&confidence_score) {
            return Err(SizingError::InvalidScore(confidence_score));
        }

        let level = ConfidenceLevel::from_score(confidence_score);
        let (multiplier, note) = self.multiplier(level);

        let base_risk_amount = account_size * risk_fraction;
        let adjusted_risk_amount = base_risk_amount * multiplier;
        let max_position_percent = adjusted_risk_amount / account_size * dec!(100);

        Ok(SizingResult {
            account_size,
            base_risk_amount,
            adjusted_risk_amount,
            multiplier,
            max_position_percent,
            confidence_level: level,
            note: note.to_string(),
            max_position_size: self.config.max_position_size,
        })
    }

    /// Size using the configured default risk fraction.
    pub fn size_default(
        &self,
        confidence_score: f64,
        account_size: Decimal,
    ) -> Result<SizingResult, SizingError> {
        self.size(confidence_score, account_size, self.config.risk_per_trade)
    }

    /// Stop-loss and take-profit prices for a long entry at `entry_price`.
    pub fn exit_levels(&self, entry_price: Decimal) -> (Decimal, Decimal) {
        let stop = entry_price * (Decimal::ONE - self.config.stop_loss);
        let target = entry_price * (Decimal::ONE + self.config.take_profit);
        (stop, target)
    }
}
