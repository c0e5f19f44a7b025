//! Rule tables: scoring logic expressed as data.
//!
//! A dimension is an ordered list of [`RuleGroup`]s. Each group is an ordered
//! list of tiers and at most one tier per group fires (the first whose
//! predicate holds). A predicate that needs a missing input returns `false`,
//! so absent data means "no contribution", never an error.

use super::components::{ComponentScore, Dimension};
use crate::models::AnalysisSnapshot;

/// Everything a predicate may look at.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub snapshot: &'a AnalysisSnapshot,

    /// Themes the symbol belongs to, already resolved from the theme table
    pub themes: Vec<&'a str>,
}

/// Text attached to a score when a rule fires.
#[derive(Clone, Copy)]
pub enum Reason {
    Fixed(&'static str),
    Computed(fn(&RuleContext<'_>) -> String),
}

impl Reason {
    pub fn render(&self, ctx: &RuleContext<'_>) -> String {
        match self {
            Reason::Fixed(text) => (*text).to_string(),
            Reason::Computed(f) => f(ctx),
        }
    }
}

impl std::fmt::Debug for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Fixed(text) => write!(f, "Fixed({text:?})"),
            Reason::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// One `(predicate, points, reason)` tier.
#[derive(Clone, Copy)]
pub struct Rule {
    pub when: fn(&RuleContext<'_>) -> bool,
    pub points: f64,
    pub reason: Reason,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("points", &self.points)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Mutually exclusive tiers, best first.
#[derive(Debug, Clone, Copy)]
pub struct RuleGroup {
    pub name: &'static str,
    pub tiers: &'static [Rule],
}

impl RuleGroup {
    /// The first tier whose predicate holds.
    pub fn matching(&self, ctx: &RuleContext<'_>) -> Option<&'static Rule> {
        self.tiers.iter().find(|rule| (rule.when)(ctx))
    }

    /// Largest positive contribution this group can make.
    pub fn max_points(&self) -> f64 {
        self.tiers.iter().map(|r| r.points).fold(0.0, f64::max)
    }
}

/// Run a rule table from `base`, clamping the result into [0, 100].
pub fn evaluate(
    dimension: Dimension,
    base: f64,
    groups: &[RuleGroup],
    ctx: &RuleContext<'_>,
) -> ComponentScore {
    let mut score = base;
    let mut reasons = Vec::new();

    for group in groups {
        if let Some(rule) = group.matching(ctx) {
            score += rule.points;
            reasons.push(rule.reason.render(ctx));
        }
    }

    ComponentScore::new(dimension, score.clamp(0.0, 100.0), reasons)
}
