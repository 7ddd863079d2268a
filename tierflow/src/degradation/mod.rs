//! Degradation level selection and feature-flag matrices.
//!
//! Maps a [`CapabilityProfile`](crate::capability::CapabilityProfile) to one
//! of five discrete functionality tiers. Consumers query the selected level
//! for feature flags and subsystem fallback modes; the selection thresholds
//! live here and nowhere else.

mod level;
mod matrix;

pub use level::{select_level, DegradationLevel};
pub use matrix::{AnimationMode, ChartMode, Feature, FeatureMatrix, InteractionMode};
