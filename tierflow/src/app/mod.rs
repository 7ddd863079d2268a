//! Application context object.
//!
//! [`DeliveryEngine`] owns every manager (profiler, cache, loader,
//! prefetcher, governor) as one explicit context the host holds — no
//! ambient globals. It wires the injected ports together, applies the
//! session's capability state everywhere it matters, and performs the
//! atomic profile reset.

mod config;
mod engine;
mod error;

pub use config::{EngineConfig, PhaseRoutes};
pub use engine::{DeliveryEngine, EngineEvent};
pub use error::EngineError;
