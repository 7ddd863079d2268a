//! Alert rule definitions.
//!
//! Rules are data: persisted as versioned JSON and evaluated by the
//! governor engine. A rule fires when any of its conditions matches the
//! triggering observation and the rule is outside its cooldown.

use serde::{Deserialize, Serialize};

use super::budget::BudgetMetric;
use super::sample::MetricKind;

/// Schema version of the persisted rule set.
pub const RULES_VERSION: u32 = 1;

/// Comparator for threshold conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparator {
    GreaterThan,
    LessThan,
}

impl Comparator {
    /// Apply the comparator.
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::LessThan => value < threshold,
        }
    }
}

/// Which budget line a condition watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLine {
    /// 80% of the limit.
    Warning,
    /// 100% of the limit.
    Critical,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// One alert condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AlertCondition {
    /// Every sample of `metric` in the trailing window satisfied the
    /// comparator against the threshold.
    SustainedBreach {
        metric: MetricKind,
        threshold: f64,
        comparator: Comparator,
        /// Trailing window length in seconds.
        window_secs: u64,
    },

    /// A regression signal at or above this percentage was raised.
    Regression {
        metric: MetricKind,
        min_percent: f64,
    },

    /// A budget line was crossed for the metric.
    BudgetViolation {
        metric: BudgetMetric,
        line: BudgetLine,
    },
}

/// A configured alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Stable rule identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Conditions; any match makes the rule eligible to fire.
    pub conditions: Vec<AlertCondition>,
    /// Sink names to dispatch through; empty means every configured sink.
    pub actions: Vec<String>,
    /// Minimum minutes between fires.
    pub cooldown_minutes: u32,
    /// Severity attached to raised alerts.
    pub severity: Severity,
}

impl AlertRule {
    /// Create a rule with one condition.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        condition: AlertCondition,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            conditions: vec![condition],
            actions: Vec::new(),
            cooldown_minutes: 5,
            severity,
        }
    }

    /// Add a condition.
    pub fn with_condition(mut self, condition: AlertCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Restrict dispatch to the named sinks.
    pub fn with_actions(mut self, actions: &[&str]) -> Self {
        self.actions = actions.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Set the cooldown.
    pub fn with_cooldown_minutes(mut self, minutes: u32) -> Self {
        self.cooldown_minutes = minutes;
        self
    }

    /// Cooldown as a chrono duration.
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cooldown_minutes as i64)
    }
}
