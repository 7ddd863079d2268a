//! The governor engine: sample intake, rule evaluation, alert firing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::EventSubscription;
use crate::storage::{decode_versioned, encode_versioned, KeyValueStore, KEY_ALERT_RULES};

use super::alerts::{Alert, AlertLog};
use super::baseline::{baseline, check_regression, RegressionSignal};
use super::budget::{BudgetMetric, BudgetStatus, PerformanceBudget};
use super::rules::{AlertCondition, AlertRule, BudgetLine, RULES_VERSION};
use super::sample::{MetricKind, MetricSample, RollingLog, ROLLING_LOG_CAP};
use super::sink::{dispatch_all, AlertSink};

/// Configuration for the governor.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Budget evaluated against observations.
    pub budget: PerformanceBudget,
    /// Initial rule set (replaced by persisted rules when present).
    pub rules: Vec<AlertRule>,
    /// Rolling log cap.
    pub log_cap: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            budget: PerformanceBudget::default(),
            rules: Vec::new(),
            log_cap: ROLLING_LOG_CAP,
        }
    }
}

/// The performance governor.
///
/// Hosts push timing samples (or bridge them in from an event channel via
/// [`Governor::spawn_sample_observer`]); the governor maintains baselines,
/// raises regression signals, evaluates alert rules under cooldown and
/// fans alerts out through its sinks.
pub struct Governor {
    budget: PerformanceBudget,
    log: Mutex<RollingLog>,
    rules: RwLock<Vec<AlertRule>>,
    last_fired: Mutex<HashMap<String, DateTime<Utc>>>,
    alerts: AlertLog,
    sinks: Vec<Arc<dyn AlertSink>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl Governor {
    /// Create a governor from its configuration.
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            budget: config.budget,
            log: Mutex::new(RollingLog::with_cap(config.log_cap)),
            rules: RwLock::new(config.rules),
            last_fired: Mutex::new(HashMap::new()),
            alerts: AlertLog::new(),
            sinks: Vec::new(),
            store: None,
        }
    }

    /// Add a delivery sink.
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Attach a persistence store for rules and the alert log.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.alerts = AlertLog::new().with_store(Arc::clone(&store));
        self.store = Some(store);
        self
    }

    /// Restore persisted rules and alerts.
    ///
    /// A version mismatch on either record silently keeps the configured
    /// defaults.
    pub async fn load_persisted(&self) {
        self.alerts.load_persisted().await;

        let Some(store) = &self.store else { return };
        let raw = match store.get(KEY_ALERT_RULES).await {
            Ok(Some(raw)) => raw,
            _ => return,
        };
        if let Some(rules) = decode_versioned::<Vec<AlertRule>>(&raw, RULES_VERSION) {
            *self.rules.write() = rules;
        }
    }

    /// Replace the rule set and persist it.
    pub fn set_rules(&self, rules: Vec<AlertRule>) {
        *self.rules.write() = rules;
        self.persist_rules();
    }

    /// Snapshot of the current rules.
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.read().clone()
    }

    /// The alert log.
    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// Current baseline for a metric, if enough samples exist.
    pub fn baseline_for(&self, kind: MetricKind) -> Option<f64> {
        baseline(&self.log.lock(), kind, Utc::now())
    }

    /// Number of retained samples.
    pub fn sample_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Record a timing sample observed now.
    pub async fn record_sample(&self, kind: MetricKind, value: f64) -> Vec<Alert> {
        self.record_sample_at(kind, value, Utc::now()).await
    }

    /// Record a timing sample observed at `now`.
    ///
    /// Computes the regression signal against the pre-existing baseline,
    /// appends the sample to the rolling log, evaluates the budget line for
    /// the mapped metric and runs every rule. Returns alerts raised by this
    /// observation.
    pub async fn record_sample_at(
        &self,
        kind: MetricKind,
        value: f64,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let regression = {
            let mut log = self.log.lock();
            let signal = check_regression(&log, kind, value, now);
            log.push(MetricSample { kind, value, at: now });
            signal
        };
        if let Some(signal) = &regression {
            debug!(
                metric = %signal.kind,
                percent = signal.percent,
                baseline = signal.baseline,
                "Regression signal raised"
            );
        }

        let budget_metric = BudgetMetric::for_sample(kind);
        let status = self.budget.evaluate(budget_metric, value);

        let matcher = |condition: &AlertCondition| -> Option<serde_json::Value> {
            self.match_sample_condition(
                condition,
                kind,
                value,
                regression.as_ref(),
                budget_metric,
                status,
                now,
            )
        };
        self.fire_matching(&matcher, now).await
    }

    /// Report an observed bundle size (KB) for budget evaluation.
    pub async fn report_bundle_size(&self, kb: f64) -> Vec<Alert> {
        self.report_budget_observation(BudgetMetric::BundleSize, kb, Utc::now())
            .await
    }

    /// Report an observed full load time (ms) for budget evaluation.
    pub async fn report_load_time(&self, ms: f64) -> Vec<Alert> {
        self.report_budget_observation(BudgetMetric::LoadTime, ms, Utc::now())
            .await
    }

    /// Evaluate a budget-only observation against the rules.
    pub async fn report_budget_observation(
        &self,
        metric: BudgetMetric,
        observed: f64,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let status = self.budget.evaluate(metric, observed);
        let matcher = |condition: &AlertCondition| -> Option<serde_json::Value> {
            match condition {
                AlertCondition::BudgetViolation { metric: m, line } if *m == metric => {
                    budget_line_payload(metric, observed, status, *line)
                }
                _ => None,
            }
        };
        self.fire_matching(&matcher, now).await
    }

    /// Bridge samples from an event channel until the token is cancelled.
    ///
    /// The owner must cancel the token on profile reset so the observer is
    /// disposed rather than leaked.
    pub fn spawn_sample_observer(
        self: Arc<Self>,
        mut subscription: EventSubscription<MetricSample>,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let this = self;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = subscription.recv() => match event {
                        Some(sample) => {
                            this.record_sample_at(sample.kind, sample.value, sample.at).await;
                        }
                        None => break,
                    }
                }
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn match_sample_condition(
        &self,
        condition: &AlertCondition,
        kind: MetricKind,
        value: f64,
        regression: Option<&RegressionSignal>,
        budget_metric: BudgetMetric,
        status: BudgetStatus,
        now: DateTime<Utc>,
    ) -> Option<serde_json::Value> {
        match condition {
            AlertCondition::SustainedBreach {
                metric,
                threshold,
                comparator,
                window_secs,
            } => {
                if *metric != kind {
                    return None;
                }
                let window = self
                    .log
                    .lock()
                    .window(*metric, Duration::seconds(*window_secs as i64), now);
                if window.is_empty() || !window.iter().all(|s| comparator.holds(s.value, *threshold))
                {
                    return None;
                }
                Some(serde_json::json!({
                    "condition": "sustained-breach",
                    "metric": metric,
                    "threshold": threshold,
                    "samples": window.len(),
                }))
            }
            AlertCondition::Regression {
                metric,
                min_percent,
            } => {
                let signal = regression?;
                if *metric != kind || signal.percent < *min_percent {
                    return None;
                }
                Some(serde_json::json!({
                    "condition": "regression",
                    "metric": metric,
                    "percent": signal.percent,
                    "baseline": signal.baseline,
                    "value": signal.value,
                }))
            }
            AlertCondition::BudgetViolation { metric, line } if *metric == budget_metric => {
                budget_line_payload(budget_metric, value, status, *line)
            }
            AlertCondition::BudgetViolation { .. } => None,
        }
    }

    /// Evaluate every rule against a condition matcher and fire those out
    /// of cooldown.
    async fn fire_matching(
        &self,
        matcher: &(dyn Fn(&AlertCondition) -> Option<serde_json::Value> + Sync),
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut to_fire: Vec<(AlertRule, serde_json::Value)> = Vec::new();
        {
            let rules = self.rules.read();
            let mut last_fired = self.last_fired.lock();
            for rule in rules.iter() {
                let Some(payload) = rule.conditions.iter().find_map(matcher) else {
                    continue;
                };
                if let Some(last) = last_fired.get(&rule.id) {
                    if now < *last + rule.cooldown() {
                        debug!(rule = %rule.id, "Alert suppressed by cooldown");
                        continue;
                    }
                }
                last_fired.insert(rule.id.clone(), now);
                to_fire.push((rule.clone(), payload));
            }
        }

        let mut raised = Vec::with_capacity(to_fire.len());
        for (rule, payload) in to_fire {
            let alert = self.alerts.record(
                &rule.id,
                rule.severity,
                format!("{} triggered", rule.name),
                payload,
                now,
            );
            dispatch_all(&self.sinks, &rule.actions, &alert).await;
            raised.push(alert);
        }
        raised
    }

    fn persist_rules(&self) {
        let Some(store) = &self.store else { return };
        let Some(encoded) = encode_versioned(RULES_VERSION, &*self.rules.read()) else {
            return;
        };
        let store = Arc::clone(store);
        tokio::spawn(async move {
            if let Err(e) = store.set(KEY_ALERT_RULES, encoded).await {
                debug!(error = %e, "Best-effort rule persistence failed");
            }
        });
    }
}

fn budget_line_payload(
    metric: BudgetMetric,
    observed: f64,
    status: BudgetStatus,
    line: BudgetLine,
) -> Option<serde_json::Value> {
    let crossed = match line {
        BudgetLine::Warning => status.at_least_warning(),
        BudgetLine::Critical => status.is_critical(),
    };
    if !crossed {
        return None;
    }
    let ratio = match status {
        BudgetStatus::Warning { ratio } | BudgetStatus::Critical { ratio } => ratio,
        BudgetStatus::Within => return None,
    };
    Some(serde_json::json!({
        "condition": "budget-violation",
        "metric": metric,
        "observed": observed,
        "ratio": ratio,
    }))
}
