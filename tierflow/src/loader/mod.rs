//! Dependency-ordered, retrying, priority-batched feature loading.
//!
//! Feature units are registered once with an opaque async factory, a
//! dependency list, a priority tier and an eligibility requirement. A load
//! pass filters units against the session profile, orders them so every
//! dependency settles before its dependents, and drains the order in
//! fixed-size concurrent batches with strategy-controlled pacing.
//!
//! Per-unit loads are idempotent for the session: concurrent requests share
//! one in-flight load, and both success and terminal failure are cached.
//! A failed unit is substituted by its fallback (or a generic placeholder)
//! and never aborts the pass.

mod graph;
mod loader;
mod strategy;
mod unit;

pub use graph::{topological_order, GraphError};
pub use loader::{FeatureLoader, LoadOutcome, LoadResult, PassError, PassSummary, Placeholder};
pub use strategy::LoadStrategy;
pub use unit::{
    factory_fn, Artifact, FactoryError, FeatureUnit, PriorityTier, RegistryError, Requirement,
    UnitFactory, UnitRegistry,
};
