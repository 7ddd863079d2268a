//! Prediction strategies.
//!
//! Each strategy independently proposes candidate resource keys with a
//! priority; the scheduler merges proposals by taking the maximum priority
//! per key. Strategies never filter against the current route or the
//! already-prefetched set — that is the merge step's job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::behavior::BehaviorProfile;

/// Priority for pattern-table entries (per-table values may override).
pub const PRIORITY_PATTERN: i32 = 50;

/// Base priority for frequent-transition candidates.
pub const PRIORITY_TRANSITION: i32 = 70;

/// Priority for dwell-driven candidates (user is about to navigate).
pub const PRIORITY_DWELL: i32 = 80;

/// Priority for session-phase defaults.
pub const PRIORITY_PHASE: i32 = 30;

/// Priority for exploration-biased candidates.
pub const PRIORITY_EXPLORATION: i32 = 40;

/// A proposed prefetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Resource key to prefetch.
    pub key: String,
    /// Priority; higher drains first.
    pub priority: i32,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(key: impl Into<String>, priority: i32) -> Self {
        Self {
            key: key.into(),
            priority,
        }
    }
}

/// Rough position within the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// First couple of minutes.
    Early,
    /// Settled browsing.
    Mid,
    /// Long session.
    Late,
}

impl SessionPhase {
    /// Classify a session age.
    pub fn from_age(age: chrono::Duration) -> Self {
        if age < chrono::Duration::minutes(2) {
            SessionPhase::Early
        } else if age < chrono::Duration::minutes(10) {
            SessionPhase::Mid
        } else {
            SessionPhase::Late
        }
    }
}

/// Everything a strategy may consult for one evaluation.
pub struct PredictionContext<'a> {
    /// The session's behavior profile snapshot.
    pub behavior: &'a BehaviorProfile,
    /// Route currently being viewed.
    pub current_route: &'a str,
    /// Dwell accumulated on the current route so far.
    pub current_dwell: Duration,
    /// Session phase at evaluation time.
    pub phase: SessionPhase,
}

/// One independent prediction heuristic.
pub trait PredictionStrategy: Send + Sync {
    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Candidate resource keys for this evaluation.
    fn candidates(&self, ctx: &PredictionContext<'_>) -> Vec<Candidate>;
}

/// Static per-route candidate table shared across strategies.
pub type PatternTable = Arc<HashMap<String, Vec<Candidate>>>;

/// Build a pattern table from route → keys associations.
pub fn pattern_table(entries: &[(&str, &[&str])]) -> PatternTable {
    let mut table = HashMap::new();
    for (route, keys) in entries {
        table.insert(
            route.to_string(),
            keys.iter()
                .map(|k| Candidate::new(*k, PRIORITY_PATTERN))
                .collect(),
        );
    }
    Arc::new(table)
}

// =============================================================================
// Strategies
// =============================================================================

/// (a) Static pattern table for the current route.
pub struct PatternTableStrategy {
    table: PatternTable,
}

impl PatternTableStrategy {
    /// Create over a shared table.
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }
}

impl PredictionStrategy for PatternTableStrategy {
    fn name(&self) -> &'static str {
        "pattern-table"
    }

    fn candidates(&self, ctx: &PredictionContext<'_>) -> Vec<Candidate> {
        self.table
            .get(ctx.current_route)
            .cloned()
            .unwrap_or_default()
    }
}

/// (b) Top-k most frequent observed transitions from the current route.
pub struct FrequentTransitionStrategy {
    top_k: usize,
}

impl FrequentTransitionStrategy {
    /// Consider the `top_k` most frequent transitions.
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }
}

impl PredictionStrategy for FrequentTransitionStrategy {
    fn name(&self) -> &'static str {
        "frequent-transition"
    }

    fn candidates(&self, ctx: &PredictionContext<'_>) -> Vec<Candidate> {
        ctx.behavior
            .top_transitions(ctx.current_route, self.top_k)
            .into_iter()
            .enumerate()
            .map(|(rank, (route, _count))| {
                Candidate::new(route, PRIORITY_TRANSITION - rank as i32 * 5)
            })
            .collect()
    }
}

/// (c) Time-based: fires once dwell exceeds a fraction of the route's
/// historical average, signalling an imminent navigation.
pub struct DwellStrategy {
    ratio: f64,
    top_k: usize,
}

impl DwellStrategy {
    /// Fire once dwell exceeds `ratio` of the historical average.
    pub fn new(ratio: f64, top_k: usize) -> Self {
        Self { ratio, top_k }
    }
}

impl PredictionStrategy for DwellStrategy {
    fn name(&self) -> &'static str {
        "dwell"
    }

    fn candidates(&self, ctx: &PredictionContext<'_>) -> Vec<Candidate> {
        let Some(average_ms) = ctx.behavior.average_dwell_ms(ctx.current_route) else {
            return Vec::new();
        };
        if (ctx.current_dwell.as_millis() as f64) < average_ms * self.ratio {
            return Vec::new();
        }

        ctx.behavior
            .top_transitions(ctx.current_route, self.top_k)
            .into_iter()
            .map(|(route, _)| Candidate::new(route, PRIORITY_DWELL))
            .collect()
    }
}

/// (d) Session-phase defaults: different route sets make sense early,
/// mid and late in a session.
pub struct SessionPhaseStrategy {
    early: Vec<String>,
    mid: Vec<String>,
    late: Vec<String>,
}

impl SessionPhaseStrategy {
    /// Create with per-phase default keys.
    pub fn new(early: &[&str], mid: &[&str], late: &[&str]) -> Self {
        let to_vec = |keys: &[&str]| keys.iter().map(|k| k.to_string()).collect();
        Self {
            early: to_vec(early),
            mid: to_vec(mid),
            late: to_vec(late),
        }
    }
}

impl PredictionStrategy for SessionPhaseStrategy {
    fn name(&self) -> &'static str {
        "session-phase"
    }

    fn candidates(&self, ctx: &PredictionContext<'_>) -> Vec<Candidate> {
        let keys = match ctx.phase {
            SessionPhase::Early => &self.early,
            SessionPhase::Mid => &self.mid,
            SessionPhase::Late => &self.late,
        };
        keys.iter()
            .map(|k| Candidate::new(k.clone(), PRIORITY_PHASE))
            .collect()
    }
}

/// (e) Exploration heuristic.
///
/// A high unique/total visit ratio means the user is exploring: bias
/// toward routes never visited. Otherwise the user revisits favourites:
/// bias toward the most-visited route's pattern-table entries.
pub struct ExplorationStrategy {
    threshold: f64,
    table: PatternTable,
}

impl ExplorationStrategy {
    /// Create over the shared pattern table.
    pub fn new(threshold: f64, table: PatternTable) -> Self {
        Self { threshold, table }
    }
}

impl PredictionStrategy for ExplorationStrategy {
    fn name(&self) -> &'static str {
        "exploration"
    }

    fn candidates(&self, ctx: &PredictionContext<'_>) -> Vec<Candidate> {
        if ctx.behavior.unique_ratio() > self.threshold {
            // Exploring: suggest known routes not yet visited.
            let visited: Vec<&str> = ctx.behavior.visited.iter().map(|s| s.as_str()).collect();
            let mut keys: Vec<&String> = self
                .table
                .keys()
                .filter(|route| !visited.contains(&route.as_str()))
                .collect();
            keys.sort();
            keys.into_iter()
                .map(|route| Candidate::new(route.clone(), PRIORITY_EXPLORATION))
                .collect()
        } else {
            // Revisiting: follow the favourite route's pattern entries.
            let Some(favourite) = ctx.behavior.most_visited() else {
                return Vec::new();
            };
            self.table
                .get(favourite)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|c| Candidate::new(c.key.clone(), PRIORITY_EXPLORATION))
                        .collect()
                })
                .unwrap_or_default()
        }
    }
}
