//! Confidence aggregation: weighted blend of component scores into one level.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::components::{ComponentScore, Dimension};
use super::config::ScoringConfig;
use crate::models::AnalysisSnapshot;

/// Dimension weights. These must sum to 1.0.
pub const WEIGHTS: [(Dimension, f64); 4] = [
    (Dimension::Technical, 0.40),
    (Dimension::Fundamental, 0.20),
    (Dimension::Sentiment, 0.20),
    (Dimension::Trend, 0.20),
];

impl Dimension {
    /// Weight of this dimension in the blended score.
    pub fn weight(&self) -> f64 {
        WEIGHTS
            .iter()
            .find(|(d, _)| d == self)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }
}

/// Confidence bucket derived from the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    UltraHigh,
}

impl ConfidenceLevel {
    /// Map a 0-100 score to its level. Compare unrounded scores only.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            ConfidenceLevel::UltraHigh
        } else if score >= 70.0 {
            ConfidenceLevel::High
        } else if score >= 50.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceLevel::UltraHigh => "ULTRA HIGH",
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            ConfidenceLevel::UltraHigh => {
                "ULTRA HIGH CONFIDENCE: Multiple strong signals aligning perfectly"
            }
            ConfidenceLevel::High => "HIGH CONFIDENCE: Strong technical and fundamental alignment",
            ConfidenceLevel::Medium => "MEDIUM CONFIDENCE: Mixed signals, but opportunity present",
            ConfidenceLevel::Low => "LOW CONFIDENCE: Weak signals, high risk",
        }
    }

    fn sizing_advice(&self) -> &'static str {
        match self {
            ConfidenceLevel::UltraHigh => "Consider larger position size (still within risk limits)",
            ConfidenceLevel::High => "Standard position size recommended",
            ConfidenceLevel::Medium => "Consider smaller position or wait for confirmation",
            ConfidenceLevel::Low => "Avoid trade or wait for better setup",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// Final scoring output for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub symbol: String,

    /// Unrounded weighted score; the level is derived from this
    pub raw_score: f64,

    /// `raw_score` rounded to one decimal, for display only
    pub display_score: f64,

    pub level: ConfidenceLevel,

    pub components: BTreeMap<Dimension, ComponentScore>,

    pub explanations: Vec<String>,

    pub recommendations: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

impl ConfidenceResult {
    pub fn component(&self, dimension: Dimension) -> Option<&ComponentScore> {
        self.components.get(&dimension)
    }
}

impl std::fmt::Display for ConfidenceResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^60}", format!(" {} ", self.symbol))?;
        writeln!(
            f,
            "Confidence:       {:.1}/100 ({})",
            self.display_score, self.level
        )?;
        writeln!(f)?;
        for component in self.components.values() {
            writeln!(
                f,
                "{:<12} {:>5.1}  {}",
                component.dimension.as_str(),
                component.score,
                component.summary()
            )?;
        }

        writeln!(f, "\n--- Explanation ---")?;
        for line in &self.explanations {
            writeln!(f, "  {}", line)?;
        }

        writeln!(f, "\n--- Recommendations ---")?;
        for line in &self.recommendations {
            writeln!(f, "  {}", line)?;
        }
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

/// Blends component scores into a [`ConfidenceResult`].
#[derive(Debug, Clone, Default)]
pub struct ConfidenceAggregator {
    config: ScoringConfig,
}

impl ConfidenceAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Combine the four component scores for `snapshot`.
    ///
    /// The snapshot is only consulted for volatility and volume caveats.
    pub fn aggregate(
        &self,
        snapshot: &AnalysisSnapshot,
        technical: ComponentScore,
        fundamental: ComponentScore,
        sentiment: ComponentScore,
        trend: ComponentScore,
    ) -> ConfidenceResult {
        let components: BTreeMap<Dimension, ComponentScore> = [
            (Dimension::Technical, technical),
            (Dimension::Fundamental, fundamental),
            (Dimension::Sentiment, sentiment),
            (Dimension::Trend, trend),
        ]
        .into_iter()
        .collect();

        let raw_score = weighted_score(&components);
        let level = ConfidenceLevel::from_score(raw_score);

        ConfidenceResult {
            symbol: snapshot.symbol.clone(),
            raw_score,
            display_score: (raw_score * 10.0).round() / 10.0,
            level,
            explanations: self.explanations(level, &components),
            recommendations: self.recommendations(level, snapshot),
            components,
            timestamp: Utc::now(),
        }
    }

    fn explanations(
        &self,
        level: ConfidenceLevel,
        components: &BTreeMap<Dimension, ComponentScore>,
    ) -> Vec<String> {
        let mut lines = vec![level.headline().to_string()];

        // Fundamentals get no supplemental line.
        let supplemental = [
            (Dimension::Technical, "Exceptional technical setup"),
            (Dimension::Sentiment, "Very positive sentiment"),
            (Dimension::Trend, "Strong trend alignment"),
        ];
        for (dimension, prefix) in supplemental {
            if let Some(component) = components.get(&dimension) {
                if component.score > self.config.exceptional_component {
                    lines.push(format!("{}: {}", prefix, component.summary()));
                }
            }
        }

        lines.truncate(self.config.max_explanations);
        lines
    }

    fn recommendations(&self, level: ConfidenceLevel, snapshot: &AnalysisSnapshot) -> Vec<String> {
        let mut lines = vec![level.sizing_advice().to_string()];

        if snapshot
            .volatility
            .is_some_and(|v| v > self.config.volatility_warning)
        {
            lines.push("High volatility - use wider stops".to_string());
        }
        if snapshot
            .volume
            .is_some_and(|v| v < self.config.low_liquidity_volume)
        {
            lines.push("Low liquidity - use limit orders".to_string());
        }

        lines
    }
}

fn weighted_score(components: &BTreeMap<Dimension, ComponentScore>) -> f64 {
    let score: f64 = WEIGHTS
        .iter()
        .map(|(dimension, weight)| {
            components
                .get(dimension)
                .map(|c| c.score * weight)
                .unwrap_or(0.0)
        })
        .sum();
    score.clamp(0.0, 100.0)
}
