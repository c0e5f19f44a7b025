//! Analysis snapshot: the already-parsed market observations for one symbol.
//!
//! Every field except the symbol is optional. A missing field never fails a
//! scoring call; the rules that need it simply do not fire.

use serde::{Deserialize, Serialize};

/// News sentiment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SentimentLabel {
    #[serde(alias = "positive", alias = "POSITIVE")]
    Positive,
    #[default]
    #[serde(alias = "neutral", alias = "NEUTRAL")]
    Neutral,
    #[serde(alias = "negative", alias = "NEGATIVE")]
    Negative,
}

/// Broad market regime reported by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bullish,
    #[default]
    Neutral,
    Bearish,
}

/// Technical indicator bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Technicals {
    #[serde(default)]
    pub sma_20: Option<f64>,
    #[serde(default)]
    pub sma_50: Option<f64>,
    #[serde(default)]
    pub sma_200: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub macd: Option<f64>,
    #[serde(default)]
    pub macd_signal: Option<f64>,
    #[serde(default)]
    pub support: Option<f64>,
    #[serde(default)]
    pub resistance: Option<f64>,

    /// Volume relative to its recent average (1.0 = average)
    #[serde(default)]
    pub relative_volume: Option<f64>,

    /// Swing-pattern quality score (0-100) from the pattern scanner
    #[serde(default)]
    pub swing_score: Option<f64>,

    /// Externally computed composite model score (0-100)
    #[serde(default)]
    pub ai_score: Option<f64>,
}

/// Fundamental data bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundamentals {
    #[serde(default)]
    pub forward_pe: Option<f64>,
    #[serde(default)]
    pub trailing_pe: Option<f64>,
    #[serde(default)]
    pub peg_ratio: Option<f64>,

    /// Year-over-year revenue growth (0.15 = 15%)
    #[serde(default)]
    pub revenue_growth: Option<f64>,

    /// Net profit margin (0.15 = 15%)
    #[serde(default)]
    pub profit_margin: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,

    /// Mean analyst price target
    #[serde(default)]
    pub target_price: Option<f64>,
}

impl Fundamentals {
    /// Forward P/E when reported, trailing P/E otherwise.
    pub fn pe(&self) -> Option<f64> {
        self.forward_pe.or(self.trailing_pe)
    }
}

/// News sentiment bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sentiment {
    #[serde(default)]
    pub label: Option<SentimentLabel>,

    /// Classifier confidence in [0, 1]
    #[serde(default)]
    pub score: Option<f64>,
}

/// Immutable analysis record handed to the scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub symbol: String,

    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default)]
    pub technicals: Technicals,

    #[serde(default)]
    pub fundamentals: Fundamentals,

    #[serde(default)]
    pub sentiment: Sentiment,

    /// Sector return over the provider's lookback window
    #[serde(default)]
    pub sector_performance: Option<f64>,

    #[serde(default)]
    pub market_regime: Option<MarketRegime>,

    #[serde(default)]
    pub beta: Option<f64>,

    /// Annualized volatility (0.35 = 35%)
    #[serde(default)]
    pub volatility: Option<f64>,

    /// Latest session volume in shares
    #[serde(default)]
    pub volume: Option<f64>,
}

impl AnalysisSnapshot {
    /// Create an empty snapshot for a symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_json_deserializes() {
        let json = r#"{"symbol": "NVDA", "price": 120.5, "technicals": {"rsi": 55.0}, "sentiment": {"score": 0.7}}"#;
        let snapshot: AnalysisSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.symbol, "NVDA");
        assert_eq!(snapshot.technicals.rsi, Some(55.0));
        assert!(snapshot.technicals.sma_20.is_none());
        assert!(snapshot.sentiment.label.is_none());
        assert_eq!(snapshot.sentiment.score, Some(0.7));

        let labelled: Sentiment = serde_json::from_str(r#"{"label": "negative"}"#).unwrap();
        assert_eq!(labelled.label, Some(SentimentLabel::Negative));
        assert!(snapshot.market_regime.is_none());
    }

    #[test]
    fn test_pe_prefers_forward() {
        let fundamentals = Fundamentals {
            forward_pe: Some(18.0),
            trailing_pe: Some(30.0),
            ..Default::default()
        };
        assert_eq!(fundamentals.pe(), Some(18.0));

        let trailing_only = Fundamentals {
            trailing_pe: Some(30.0),
            ..Default::default()
        };
        assert_eq!(trailing_only.pe(), Some(30.0));
    }
}
