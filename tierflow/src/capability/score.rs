//! Composite performance score.
//!
//! Score = base 50
//!       + memory contribution (5 pts/GB, capped at 20)
//!       + core contribution (3 pts/core, capped at 15)
//!       + network-class contribution (slow-2g:0, 2g:3, 3g:8, 4g:15)
//!       + recent-navigation contribution (≤1s:10 down to >5s:0)
//! clamped to [0, 100].

use super::profile::NetworkClass;

/// Base score before contributions.
pub const BASE_SCORE: f64 = 50.0;

/// Points per GB of memory.
pub const MEMORY_POINTS_PER_GB: f64 = 5.0;

/// Cap on the memory contribution.
pub const MEMORY_CONTRIBUTION_CAP: f64 = 20.0;

/// Points per CPU core.
pub const CORE_POINTS_PER_CORE: f64 = 3.0;

/// Cap on the core contribution.
pub const CORE_CONTRIBUTION_CAP: f64 = 15.0;

/// Compute the composite performance score for a set of signals.
///
/// Total ∈ [0, 100] for all inputs (including pathological ones such as
/// zero memory or absurd core counts).
pub fn compute_score(
    memory_gb: f64,
    cores: usize,
    effective: NetworkClass,
    recent_navigation_ms: Option<u64>,
) -> u8 {
    let memory = (memory_gb.max(0.0) * MEMORY_POINTS_PER_GB).min(MEMORY_CONTRIBUTION_CAP);
    let cores = (cores as f64 * CORE_POINTS_PER_CORE).min(CORE_CONTRIBUTION_CAP);
    let network = network_contribution(effective);
    let navigation = navigation_contribution(recent_navigation_ms);

    let total = BASE_SCORE + memory + cores + network + navigation;
    total.clamp(0.0, 100.0).round() as u8
}

/// Contribution from the effective network class.
fn network_contribution(effective: NetworkClass) -> f64 {
    match effective {
        NetworkClass::Slow2g => 0.0,
        NetworkClass::TwoG => 3.0,
        NetworkClass::ThreeG => 8.0,
        NetworkClass::FourG => 15.0,
    }
}

/// Contribution from the most recent navigation duration.
///
/// Unmeasured navigations contribute nothing.
fn navigation_contribution(recent_navigation_ms: Option<u64>) -> f64 {
    match recent_navigation_ms {
        None => 0.0,
        Some(ms) if ms <= 1_000 => 10.0,
        Some(ms) if ms <= 2_000 => 7.0,
        Some(ms) if ms <= 3_000 => 5.0,
        Some(ms) if ms <= 5_000 => 2.0,
        Some(_) => 0.0,
    }
}
