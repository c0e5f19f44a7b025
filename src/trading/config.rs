//! Trading configuration.

use std::str::FromStr;

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for the paper account and position sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Starting cash for a fresh portfolio
    pub initial_cash: Decimal,

    /// Fraction of the account risked per trade before the confidence multiplier (0.0 to 1.0)
    pub risk_per_trade: Decimal,

    /// Maximum notional of a single position as a fraction of the account (0.0 to 1.0)
    pub max_position_size: Decimal,

    /// Default stop-loss distance from entry (0.0 to 1.0)
    pub stop_loss: Decimal,

    /// Default take-profit distance from entry
    pub take_profit: Decimal,

    /// Hard ceiling on the confidence multiplier
    pub max_multiplier: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(100000),  // $100k paper account
            risk_per_trade: dec!(0.02),  // 2% risk per trade
            max_position_size: dec!(0.10), // Max 10% per position
            stop_loss: dec!(0.05),       // 5% stop
            take_profit: dec!(0.15),     // 15% target
            max_multiplier: dec!(1.5),
        }
    }
}

impl TradingConfig {
    /// Defaults overridden by `PAPER_*` environment variables.
    ///
    /// A `.env` file is loaded first when present. Unparseable values are
    /// logged and skipped; the merged result is validated.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }

        let mut config = Self::default();
        override_from_env("PAPER_INITIAL_CASH", &mut config.initial_cash);
        override_from_env("PAPER_RISK_PER_TRADE", &mut config.risk_per_trade);
        override_from_env("PAPER_MAX_POSITION_SIZE", &mut config.max_position_size);
        override_from_env("PAPER_STOP_LOSS", &mut config.stop_loss);
        override_from_env("PAPER_TAKE_PROFIT", &mut config.take_profit);

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the sizer and ledger cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.initial_cash <= Decimal::ZERO {
            bail!("initial cash must be positive, got {}", self.initial_cash);
        }
        for (name, value) in [
            ("risk per trade", self.risk_per_trade),
            ("max position size", self.max_position_size),
            ("stop loss", self.stop_loss),
        ] {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                bail!("{} must be in (0, 1], got {}", name, value);
            }
        }
        if self.take_profit <= Decimal::ZERO {
            bail!("take profit must be positive, got {}", self.take_profit);
        }
        if self.max_multiplier <= Decimal::ZERO {
            bail!("max multiplier must be positive, got {}", self.max_multiplier);
        }
        Ok(())
    }
}

fn override_from_env(key: &str, target: &mut Decimal) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match Decimal::from_str(raw.trim()) {
        Ok(value) => *target = value,
        Err(e) => warn!(key = key, value = %raw, error = %e, "Ignoring invalid config value"),
    }
}
