//! Per-dimension component scoring.
//!
//! Each dimension has its own rule table. Technical and trend scores start
//! from zero; fundamental and sentiment start from a neutral 50 so that a
//! symbol with no data is not scored as bad.

use serde::{Deserialize, Serialize};

use super::rules::{evaluate, Reason, Rule, RuleContext, RuleGroup};
use super::themes::{display_theme, ThemeTable};
use crate::models::{AnalysisSnapshot, MarketRegime, SentimentLabel};

/// Signal dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Technical,
    Fundamental,
    Sentiment,
    Trend,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Technical,
        Dimension::Fundamental,
        Dimension::Sentiment,
        Dimension::Trend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Technical => "technical",
            Dimension::Fundamental => "fundamental",
            Dimension::Sentiment => "sentiment",
            Dimension::Trend => "trend",
        }
    }

    /// Starting score before any rule fires.
    pub fn base_score(&self) -> f64 {
        match self {
            Dimension::Technical | Dimension::Trend => 0.0,
            Dimension::Fundamental | Dimension::Sentiment => 50.0,
        }
    }

    /// Summary used when no rule fired.
    pub fn fallback_reason(&self) -> &'static str {
        match self {
            Dimension::Technical => "Limited technical confirmation",
            Dimension::Fundamental => "Limited fundamental data",
            Dimension::Sentiment => "Neutral sentiment",
            Dimension::Trend => "No clear trend alignment",
        }
    }

    pub fn rules(&self) -> &'static [RuleGroup] {
        match self {
            Dimension::Technical => TECHNICAL_RULES,
            Dimension::Fundamental => FUNDAMENTAL_RULES,
            Dimension::Sentiment => SENTIMENT_RULES,
            Dimension::Trend => TREND_RULES,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Score for one dimension, in [0, 100], with the reasons that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub dimension: Dimension,
    pub score: f64,
    pub reasons: Vec<String>,
}

impl ComponentScore {
    pub fn new(dimension: Dimension, score: f64, reasons: Vec<String>) -> Self {
        Self {
            dimension,
            score,
            reasons,
        }
    }

    /// Comma-joined reasons, or the dimension's fallback phrase.
    pub fn summary(&self) -> String {
        if self.reasons.is_empty() {
            self.dimension.fallback_reason().to_string()
        } else {
            self.reasons.join(", ")
        }
    }
}

/// Scores snapshots one dimension at a time.
#[derive(Debug, Clone, Default)]
pub struct ComponentScorer {
    themes: ThemeTable,
}

impl ComponentScorer {
    pub fn new(themes: ThemeTable) -> Self {
        Self { themes }
    }

    pub fn themes(&self) -> &ThemeTable {
        &self.themes
    }

    /// Score a single dimension.
    pub fn score(&self, dimension: Dimension, snapshot: &AnalysisSnapshot) -> ComponentScore {
        let ctx = self.context(snapshot);
        evaluate(dimension, dimension.base_score(), dimension.rules(), &ctx)
    }

    /// Score all four dimensions, in [`Dimension::ALL`] order.
    pub fn score_all(&self, snapshot: &AnalysisSnapshot) -> [ComponentScore; 4] {
        let ctx = self.context(snapshot);
        Dimension::ALL.map(|d| evaluate(d, d.base_score(), d.rules(), &ctx))
    }

    fn context<'a>(&'a self, snapshot: &'a AnalysisSnapshot) -> RuleContext<'a> {
        RuleContext {
            snapshot,
            themes: self.themes.themes_for(&snapshot.symbol),
        }
    }
}

// ==================== Technical ====================

fn sma_stack(ctx: &RuleContext<'_>) -> Option<(f64, f64)> {
    let t = &ctx.snapshot.technicals;
    Some((t.sma_20?, t.sma_50?))
}

fn perfect_uptrend(ctx: &RuleContext<'_>) -> bool {
    let t = &ctx.snapshot.technicals;
    match (t.sma_20, t.sma_50, t.sma_200) {
        (Some(s20), Some(s50), Some(s200)) => s20 > s50 && s50 > s200,
        _ => false,
    }
}

fn short_term_uptrend(ctx: &RuleContext<'_>) -> bool {
    sma_stack(ctx).is_some_and(|(s20, s50)| s20 > s50)
}

fn healthy_rsi(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot
        .technicals
        .rsi
        .is_some_and(|rsi| rsi > 40.0 && rsi < 70.0)
}

fn oversold_rsi(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot
        .technicals
        .rsi
        .is_some_and(|rsi| rsi > 30.0 && rsi < 40.0)
}

fn strong_volume(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.technicals.relative_volume.is_some_and(|rvol| rvol > 1.5)
}

fn above_average_volume(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.technicals.relative_volume.is_some_and(|rvol| rvol > 1.0)
}

fn above_support(ctx: &RuleContext<'_>) -> bool {
    match (ctx.snapshot.price, ctx.snapshot.technicals.support) {
        (Some(price), Some(support)) => support > 0.0 && price > support * 1.02,
        _ => false,
    }
}

fn quality_pattern(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.technicals.swing_score.is_some_and(|s| s > 70.0)
}

fn ai_confident(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.technicals.ai_score.is_some_and(|s| s > 80.0)
}

static TECHNICAL_RULES: &[RuleGroup] = &[
    RuleGroup {
        name: "trend_alignment",
        tiers: &[
            Rule { when: perfect_uptrend, points: 20.0, reason: Reason::Fixed("Perfect uptrend alignment") },
            Rule { when: short_term_uptrend, points: 10.0, reason: Reason::Fixed("Short-term uptrend") },
        ],
    },
    RuleGroup {
        name: "momentum",
        tiers: &[
            Rule { when: healthy_rsi, points: 15.0, reason: Reason::Fixed("Healthy RSI momentum") },
            Rule { when: oversold_rsi, points: 10.0, reason: Reason::Fixed("Potential oversold bounce") },
        ],
    },
    RuleGroup {
        name: "volume_confirmation",
        tiers: &[
            Rule { when: strong_volume, points: 15.0, reason: Reason::Fixed("Strong volume confirmation") },
            Rule { when: above_average_volume, points: 8.0, reason: Reason::Fixed("Above average volume") },
        ],
    },
    RuleGroup {
        name: "support",
        tiers: &[Rule { when: above_support, points: 10.0, reason: Reason::Fixed("Above key support") }],
    },
    RuleGroup {
        name: "pattern_quality",
        tiers: &[Rule { when: quality_pattern, points: 10.0, reason: Reason::Fixed("High-quality pattern detected") }],
    },
    RuleGroup {
        name: "ai_bonus",
        tiers: &[Rule { when: ai_confident, points: 20.0, reason: Reason::Fixed("AI system highly confident") }],
    },
];

// ==================== Fundamental ====================

fn reasonable_pe(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.fundamentals.pe().is_some_and(|pe| pe > 0.0 && pe < 25.0)
}

fn growth_premium_pe(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.fundamentals.pe().is_some_and(|pe| (25.0..40.0).contains(&pe))
}

fn strong_revenue_growth(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.fundamentals.revenue_growth.is_some_and(|g| g > 0.20)
}

fn solid_revenue_growth(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.fundamentals.revenue_growth.is_some_and(|g| g > 0.10)
}

fn excellent_margins(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.fundamentals.profit_margin.is_some_and(|m| m > 0.20)
}

fn good_margins(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.fundamentals.profit_margin.is_some_and(|m| m > 0.10)
}

fn analyst_upside(ctx: &RuleContext<'_>) -> Option<f64> {
    let price = ctx.snapshot.price.filter(|p| *p > 0.0)?;
    let target = ctx.snapshot.fundamentals.target_price?;
    Some(target / price - 1.0)
}

fn analysts_bullish(ctx: &RuleContext<'_>) -> bool {
    analyst_upside(ctx).is_some_and(|upside| upside > 0.20)
}

fn analyst_reason(ctx: &RuleContext<'_>) -> String {
    let upside = analyst_upside(ctx).unwrap_or_default();
    format!("Analysts see {:.0}% upside", upside * 100.0)
}

static FUNDAMENTAL_RULES: &[RuleGroup] = &[
    RuleGroup {
        name: "valuation",
        tiers: &[
            Rule { when: reasonable_pe, points: 10.0, reason: Reason::Fixed("Reasonable valuation") },
            Rule { when: growth_premium_pe, points: 5.0, reason: Reason::Fixed("Growth premium valuation") },
        ],
    },
    RuleGroup {
        name: "revenue_growth",
        tiers: &[
            Rule { when: strong_revenue_growth, points: 15.0, reason: Reason::Fixed("Strong revenue growth") },
            Rule { when: solid_revenue_growth, points: 8.0, reason: Reason::Fixed("Solid revenue growth") },
        ],
    },
    RuleGroup {
        name: "profit_margins",
        tiers: &[
            Rule { when: excellent_margins, points: 15.0, reason: Reason::Fixed("Excellent profit margins") },
            Rule { when: good_margins, points: 8.0, reason: Reason::Fixed("Good profit margins") },
        ],
    },
    RuleGroup {
        name: "analyst_target",
        tiers: &[Rule { when: analysts_bullish, points: 10.0, reason: Reason::Computed(analyst_reason) }],
    },
];

// ==================== Sentiment ====================

fn positive_news(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.sentiment.label == Some(SentimentLabel::Positive)
}

fn negative_news(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.sentiment.label == Some(SentimentLabel::Negative)
}

fn very_strong_sentiment(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.sentiment.score.is_some_and(|s| s > 0.8)
}

fn moderate_sentiment(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.sentiment.score.is_some_and(|s| s > 0.6)
}

static SENTIMENT_RULES: &[RuleGroup] = &[
    RuleGroup {
        name: "news_label",
        tiers: &[
            Rule { when: positive_news, points: 30.0, reason: Reason::Fixed("Positive news sentiment") },
            Rule { when: negative_news, points: -20.0, reason: Reason::Fixed("Negative news sentiment") },
        ],
    },
    RuleGroup {
        name: "news_magnitude",
        tiers: &[
            Rule { when: very_strong_sentiment, points: 20.0, reason: Reason::Fixed("Very strong positive sentiment") },
            Rule { when: moderate_sentiment, points: 10.0, reason: Reason::Fixed("Moderately positive sentiment") },
        ],
    },
];

// ==================== Trend alignment ====================

fn in_any_theme(ctx: &RuleContext<'_>) -> bool {
    !ctx.themes.is_empty()
}

fn in_several_themes(ctx: &RuleContext<'_>) -> bool {
    ctx.themes.len() > 1
}

fn themes_reason(ctx: &RuleContext<'_>) -> String {
    let names: Vec<String> = ctx.themes.iter().map(|t| display_theme(t)).collect();
    format!("Aligned with: {}", names.join(", "))
}

fn sector_momentum(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.sector_performance.is_some_and(|p| p > 0.0)
}

fn high_beta_bull(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.market_regime == Some(MarketRegime::Bullish)
        && ctx.snapshot.beta.is_some_and(|b| b > 1.2)
}

fn defensive_bear(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot.market_regime == Some(MarketRegime::Bearish)
        && ctx.snapshot.beta.is_some_and(|b| b < 0.8)
}

static TREND_RULES: &[RuleGroup] = &[
    RuleGroup {
        name: "theme_alignment",
        tiers: &[Rule { when: in_any_theme, points: 40.0, reason: Reason::Computed(themes_reason) }],
    },
    RuleGroup {
        name: "theme_convergence",
        tiers: &[Rule { when: in_several_themes, points: 20.0, reason: Reason::Fixed("Multiple trend convergence") }],
    },
    RuleGroup {
        name: "sector_trend",
        tiers: &[Rule { when: sector_momentum, points: 20.0, reason: Reason::Fixed("Strong sector momentum") }],
    },
    RuleGroup {
        name: "market_regime",
        tiers: &[
            Rule { when: high_beta_bull, points: 20.0, reason: Reason::Fixed("High-beta in bull market") },
            Rule { when: defensive_bear, points: 20.0, reason: Reason::Fixed("Defensive in bear market") },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fundamentals, Sentiment, Technicals};

    fn strong_snapshot() -> AnalysisSnapshot {
        AnalysisSnapshot {
            symbol: "NVDA".to_string(),
            price: Some(100.0),
            technicals: Technicals {
                sma_20: Some(98.0),
                sma_50: Some(92.0),
                sma_200: Some(80.0),
                rsi: Some(58.0),
                relative_volume: Some(2.1),
                support: Some(95.0),
                swing_score: Some(75.0),
                ai_score: Some(85.0),
                ..Default::default()
            },
            fundamentals: Fundamentals {
                forward_pe: Some(22.0),
                revenue_growth: Some(0.35),
                profit_margin: Some(0.25),
                target_price: Some(130.0),
                ..Default::default()
            },
            sentiment: Sentiment {
                label: Some(SentimentLabel::Positive),
                score: Some(0.9),
            },
            sector_performance: Some(0.04),
            market_regime: Some(MarketRegime::Bullish),
            beta: Some(1.6),
            volatility: Some(0.3),
            volume: Some(40_000_000.0),
        }
    }

    #[test]
    fn test_empty_snapshot_uses_baselines() {
        let scorer = ComponentScorer::default();
        let snapshot = AnalysisSnapshot::new("ZZZZ");

        let [tech, fund, sent, trend] = scorer.score_all(&snapshot);
        assert_eq!(tech.score, 0.0);
        assert_eq!(fund.score, 50.0);
        assert_eq!(sent.score, 50.0);
        assert_eq!(trend.score, 0.0);
        assert!(tech.reasons.is_empty());
        assert_eq!(tech.summary(), "Limited technical confirmation");
        assert_eq!(trend.summary(), "No clear trend alignment");
    }

    #[test]
    fn test_strong_technical_setup() {
        let scorer = ComponentScorer::default();
        let tech = scorer.score(Dimension::Technical, &strong_snapshot());

        // 20 + 15 + 15 + 10 + 10 + 20
        assert_eq!(tech.score, 90.0);
        assert_eq!(tech.reasons.len(), 6);
        assert_eq!(tech.reasons[0], "Perfect uptrend alignment");
    }

    #[test]
    fn test_missing_sma_is_no_contribution() {
        let scorer = ComponentScorer::default();
        let mut snapshot = AnalysisSnapshot::new("X");
        snapshot.technicals.sma_20 = Some(50.0);

        let tech = scorer.score(Dimension::Technical, &snapshot);
        assert_eq!(tech.score, 0.0);

        snapshot.technicals.sma_50 = Some(40.0);
        let tech = scorer.score(Dimension::Technical, &snapshot);
        assert_eq!(tech.score, 10.0);
        assert_eq!(tech.reasons, vec!["Short-term uptrend".to_string()]);
    }

    #[test]
    fn test_rsi_bands() {
        let scorer = ComponentScorer::default();
        let mut snapshot = AnalysisSnapshot::new("X");

        for (rsi, expected) in [(55.0, 15.0), (35.0, 10.0), (40.0, 0.0), (75.0, 0.0), (25.0, 0.0)] {
            snapshot.technicals.rsi = Some(rsi);
            let tech = scorer.score(Dimension::Technical, &snapshot);
            assert_eq!(tech.score, expected, "rsi {rsi}");
        }
    }

    #[test]
    fn test_fundamental_caps_at_100() {
        let scorer = ComponentScorer::default();
        let fund = scorer.score(Dimension::Fundamental, &strong_snapshot());

        assert_eq!(fund.score, 100.0);
        assert!(fund.reasons.contains(&"Analysts see 30% upside".to_string()));
    }

    #[test]
    fn test_trailing_pe_fallback() {
        let scorer = ComponentScorer::default();
        let mut snapshot = AnalysisSnapshot::new("X");
        snapshot.fundamentals.trailing_pe = Some(30.0);

        let fund = scorer.score(Dimension::Fundamental, &snapshot);
        assert_eq!(fund.score, 55.0);
        assert_eq!(fund.reasons, vec!["Growth premium valuation".to_string()]);
    }

    #[test]
    fn test_sentiment_moves_both_ways() {
        let scorer = ComponentScorer::default();
        let mut snapshot = AnalysisSnapshot::new("X");

        snapshot.sentiment.label = Some(SentimentLabel::Negative);
        assert_eq!(scorer.score(Dimension::Sentiment, &snapshot).score, 30.0);

        snapshot.sentiment.label = Some(SentimentLabel::Neutral);
        snapshot.sentiment.score = Some(0.7);
        assert_eq!(scorer.score(Dimension::Sentiment, &snapshot).score, 60.0);

        let sent = scorer.score(Dimension::Sentiment, &strong_snapshot());
        assert_eq!(sent.score, 100.0);
    }

    #[test]
    fn test_trend_rewards_multi_theme_membership() {
        let scorer = ComponentScorer::default();
        let mut snapshot = AnalysisSnapshot::new("MSFT");

        let trend = scorer.score(Dimension::Trend, &snapshot);
        assert_eq!(trend.score, 60.0);
        assert_eq!(
            trend.reasons[0],
            "Aligned with: Quantum Computing, Ai Revolution, Metaverse"
        );
        assert_eq!(trend.reasons[1], "Multiple trend convergence");

        snapshot.market_regime = Some(MarketRegime::Bearish);
        snapshot.beta = Some(0.6);
        snapshot.sector_performance = Some(0.02);
        assert_eq!(scorer.score(Dimension::Trend, &snapshot).score, 100.0);
    }

    #[test]
    fn test_regime_needs_beta() {
        let scorer = ComponentScorer::default();
        let mut snapshot = AnalysisSnapshot::new("KO");
        snapshot.market_regime = Some(MarketRegime::Bullish);

        assert_eq!(scorer.score(Dimension::Trend, &snapshot).score, 0.0);
    }

    #[test]
    fn test_scores_stay_bounded() {
        let scorer = ComponentScorer::default();
        let mut extreme = strong_snapshot();
        extreme.symbol = "MSFT".to_string();
        extreme.technicals.rsi = Some(f64::NAN);
        extreme.price = Some(f64::INFINITY);

        for snapshot in [extreme, AnalysisSnapshot::new(""), strong_snapshot()] {
            for component in scorer.score_all(&snapshot) {
                assert!((0.0..=100.0).contains(&component.score), "{component:?}");
            }
        }
    }

    #[test]
    fn test_rule_tables_stay_within_range() {
        for dimension in Dimension::ALL {
            let max: f64 = dimension.rules().iter().map(|g| g.max_points()).sum();
            assert!(dimension.base_score() + max >= 100.0 || dimension == Dimension::Technical);
        }
    }
}
