//! Feature flags and subsystem fallback modes per degradation level.

use serde::{Deserialize, Serialize};

/// A gated feature area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Animations,
    Interactivity,
    DynamicContent,
    HeavyComponents,
    RealTimeUpdates,
    AdvancedCharts,
}

/// Fixed feature-flag matrix carried by each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub animations: bool,
    pub interactivity: bool,
    pub dynamic_content: bool,
    pub heavy_components: bool,
    pub real_time_updates: bool,
    pub advanced_charts: bool,
}

impl FeatureMatrix {
    /// Whether `feature` is enabled in this matrix.
    pub fn enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Animations => self.animations,
            Feature::Interactivity => self.interactivity,
            Feature::DynamicContent => self.dynamic_content,
            Feature::HeavyComponents => self.heavy_components,
            Feature::RealTimeUpdates => self.real_time_updates,
            Feature::AdvancedCharts => self.advanced_charts,
        }
    }
}

/// Chart subsystem rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartMode {
    /// Pre-rendered static image.
    Static,
    /// Simplified interactive chart.
    Simple,
    /// Textual summary only.
    Text,
}

/// Animation subsystem mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationMode {
    /// No animation at all.
    None,
    /// Reduced set of animations.
    Reduced,
    /// Cheap CSS-only transitions.
    CssOnly,
}

/// Interaction subsystem mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionMode {
    Basic,
    Enhanced,
    Full,
}
