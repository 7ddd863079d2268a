//! Performance budgets per environment.

use serde::{Deserialize, Serialize};

use super::sample::MetricKind;

/// Budget ratio at which a warning line is crossed.
pub const BUDGET_WARNING_RATIO: f64 = 0.8;

/// Budget ratio at which the critical line is crossed.
pub const BUDGET_CRITICAL_RATIO: f64 = 1.0;

/// Deployment environment a budget applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        write!(f, "{name}")
    }
}

/// The budgeted quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetMetric {
    /// Total bundle size (KB).
    BundleSize,
    /// Full load time (ms).
    LoadTime,
    /// Largest contentful paint (ms).
    Lcp,
    /// First input delay (ms).
    Fid,
    /// Cumulative layout shift (score).
    Cls,
    /// First contentful paint (ms).
    Fcp,
    /// Time to first byte (ms).
    Ttfb,
}

impl BudgetMetric {
    /// Budget metric corresponding to a sampled timing metric.
    pub fn for_sample(kind: MetricKind) -> Self {
        match kind {
            MetricKind::LargestPaint => BudgetMetric::Lcp,
            MetricKind::InputDelay => BudgetMetric::Fid,
            MetricKind::LayoutShift => BudgetMetric::Cls,
            MetricKind::FirstContentfulPaint => BudgetMetric::Fcp,
            MetricKind::TimeToFirstByte => BudgetMetric::Ttfb,
        }
    }
}

/// Where an observation sits relative to its budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetStatus {
    /// Below the warning line.
    Within,
    /// At or past 80% of the limit.
    Warning {
        /// observed / limit.
        ratio: f64,
    },
    /// At or past the limit itself.
    Critical {
        /// observed / limit.
        ratio: f64,
    },
}

impl BudgetStatus {
    /// Whether the warning line (or worse) was crossed.
    pub fn at_least_warning(&self) -> bool {
        !matches!(self, BudgetStatus::Within)
    }

    /// Whether the critical line was crossed.
    pub fn is_critical(&self) -> bool {
        matches!(self, BudgetStatus::Critical { .. })
    }
}

/// The seven tunable limits for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBudget {
    /// Bundle size limit in KB.
    pub max_bundle_kb: f64,
    /// Load time limit in ms.
    pub max_load_time_ms: f64,
    /// Largest contentful paint limit in ms.
    pub max_lcp_ms: f64,
    /// First input delay limit in ms.
    pub max_fid_ms: f64,
    /// Cumulative layout shift limit.
    pub max_cls: f64,
    /// First contentful paint limit in ms.
    pub max_fcp_ms: f64,
    /// Time to first byte limit in ms.
    pub max_ttfb_ms: f64,
}

impl PerformanceBudget {
    /// Default budget for an environment; production is the tightest.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                max_bundle_kb: 3_000.0,
                max_load_time_ms: 8_000.0,
                max_lcp_ms: 4_000.0,
                max_fid_ms: 300.0,
                max_cls: 0.25,
                max_fcp_ms: 3_000.0,
                max_ttfb_ms: 1_500.0,
            },
            Environment::Staging => Self {
                max_bundle_kb: 2_000.0,
                max_load_time_ms: 5_000.0,
                max_lcp_ms: 3_000.0,
                max_fid_ms: 200.0,
                max_cls: 0.15,
                max_fcp_ms: 2_200.0,
                max_ttfb_ms: 1_000.0,
            },
            Environment::Production => Self {
                max_bundle_kb: 1_500.0,
                max_load_time_ms: 3_500.0,
                max_lcp_ms: 2_500.0,
                max_fid_ms: 100.0,
                max_cls: 0.1,
                max_fcp_ms: 1_800.0,
                max_ttfb_ms: 800.0,
            },
        }
    }

    /// The limit for one budgeted metric.
    pub fn limit(&self, metric: BudgetMetric) -> f64 {
        match metric {
            BudgetMetric::BundleSize => self.max_bundle_kb,
            BudgetMetric::LoadTime => self.max_load_time_ms,
            BudgetMetric::Lcp => self.max_lcp_ms,
            BudgetMetric::Fid => self.max_fid_ms,
            BudgetMetric::Cls => self.max_cls,
            BudgetMetric::Fcp => self.max_fcp_ms,
            BudgetMetric::Ttfb => self.max_ttfb_ms,
        }
    }

    /// Evaluate an observation against its budget line.
    pub fn evaluate(&self, metric: BudgetMetric, observed: f64) -> BudgetStatus {
        let limit = self.limit(metric);
        if limit <= 0.0 {
            return BudgetStatus::Within;
        }
        let ratio = observed / limit;
        if ratio >= BUDGET_CRITICAL_RATIO {
            BudgetStatus::Critical { ratio }
        } else if ratio >= BUDGET_WARNING_RATIO {
            BudgetStatus::Warning { ratio }
        } else {
            BudgetStatus::Within
        }
    }
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self::for_environment(Environment::Production)
    }
}
