//! Scoring configuration.

use serde::{Deserialize, Serialize};

/// Thresholds used when turning a score into explanations and caveats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Annualized volatility above which a "wider stops" caveat is added
    pub volatility_warning: f64,

    /// Session volume below which a "limit orders" caveat is added
    pub low_liquidity_volume: f64,

    /// Component score above which a supplemental explanation line is added
    pub exceptional_component: f64,

    /// Maximum number of explanation lines in a result
    pub max_explanations: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            volatility_warning: 0.5,
            low_liquidity_volume: 1_000_000.0,
            exceptional_component: 80.0,
            max_explanations: 5,
        }
    }
}
