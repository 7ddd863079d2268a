//! Behavior-based prefetch prediction.
//!
//! Tracks navigation behavior, runs independent prediction strategies on
//! each route visit, merges their candidates into a deduplicated priority
//! queue and drains it in small, paced batches through a fetcher port.
//! Hover/viewport triggers schedule a single prefetch after a
//! capability-scaled delay and are no-ops when torn down first.
//!
//! Aggressiveness is throttled by the session's degradation level; the
//! predictor itself never re-derives capability thresholds.

mod behavior;
mod config;
mod queue;
mod scheduler;
mod strategies;

pub use behavior::{BehaviorProfile, BehaviorTracker, DwellStat, BEHAVIOR_VERSION};
pub use config::PrefetchConfig;
pub use queue::{PrefetchQueue, QueuedPrefetch};
pub use scheduler::{PrefetchError, PrefetchFetcher, PrefetchThrottle, Prefetcher, TriggerHandle};
pub use strategies::{
    pattern_table, Candidate, DwellStrategy, ExplorationStrategy, FrequentTransitionStrategy,
    PatternTable, PatternTableStrategy, PredictionContext, PredictionStrategy, SessionPhase,
    SessionPhaseStrategy, PRIORITY_DWELL, PRIORITY_EXPLORATION, PRIORITY_PATTERN, PRIORITY_PHASE,
    PRIORITY_TRANSITION,
};
