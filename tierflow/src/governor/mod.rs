//! Performance governor: baselines, regression detection, alert rules.
//!
//! The governor consumes timing-style metric samples pushed by the host,
//! keeps a capped rolling log, derives per-metric baselines (75th
//! percentile of recent samples), raises regression signals when a sample
//! degrades past the threshold, and runs an alert rule engine with
//! cooldowns, budget lines and independent sink fan-out.
//!
//! Alerts transition only via explicit acknowledge/resolve; there is no
//! automatic resolution.

mod alerts;
mod baseline;
mod budget;
mod engine;
mod rules;
mod sample;
mod sink;

pub use alerts::{Alert, AlertLog, AlertLogError, ALERT_LOG_VERSION};
pub use baseline::{
    baseline, percent_degradation, RegressionSignal, BASELINE_MIN_SAMPLES, BASELINE_SAMPLE_COUNT,
    BASELINE_WINDOW_HOURS, REGRESSION_THRESHOLD_PCT,
};
pub use budget::{
    BudgetMetric, BudgetStatus, Environment, PerformanceBudget, BUDGET_CRITICAL_RATIO,
    BUDGET_WARNING_RATIO,
};
pub use engine::{Governor, GovernorConfig};
pub use rules::{AlertCondition, AlertRule, BudgetLine, Comparator, Severity, RULES_VERSION};
pub use sample::{MetricKind, MetricSample, RollingLog, ROLLING_LOG_CAP};
pub use sink::{AlertSink, ChannelSink, LogSink, SinkError, WebhookSink};
