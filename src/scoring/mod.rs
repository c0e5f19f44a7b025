//! Confidence scoring: rule tables per dimension, blended into one level.

mod aggregator;
mod components;
mod config;
mod rules;
mod themes;

pub use aggregator::{ConfidenceAggregator, ConfidenceLevel, ConfidenceResult, WEIGHTS};
pub use components::{ComponentScore, ComponentScorer, Dimension};
pub use config::ScoringConfig;
pub use rules::{Reason, Rule, RuleContext, RuleGroup};
pub use themes::{display_theme, ThemeTable};

use tracing::debug;

use crate::models::AnalysisSnapshot;

/// Component scoring and aggregation behind one call.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    components: ComponentScorer,
    aggregator: ConfidenceAggregator,
}

impl ConfidenceScorer {
    pub fn new(themes: ThemeTable, config: ScoringConfig) -> Self {
        Self {
            components: ComponentScorer::new(themes),
            aggregator: ConfidenceAggregator::new(config),
        }
    }

    /// Score one snapshot.
    pub fn score(&self, snapshot: &AnalysisSnapshot) -> ConfidenceResult {
        let [technical, fundamental, sentiment, trend] = self.components.score_all(snapshot);
        let result = self
            .aggregator
            .aggregate(snapshot, technical, fundamental, sentiment, trend);

        debug!(
            symbol = %result.symbol,
            score = result.raw_score,
            level = %result.level,
            "Scored snapshot"
        );
        result
    }

    /// Score several snapshots, highest confidence first.
    pub fn score_many(&self, snapshots: &[AnalysisSnapshot]) -> Vec<ConfidenceResult> {
        let mut results: Vec<_> = snapshots.iter().map(|s| self.score(s)).collect();
        results.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score));
        results
    }
}
