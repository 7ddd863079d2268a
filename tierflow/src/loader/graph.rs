//! Dependency-ordered unit sequencing.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::unit::FeatureUnit;

/// Errors from dependency ordering.
///
/// A cycle is a configuration error: it fails the pass fast with the full
/// cycle path rather than looping.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// Two or more units depend on each other.
    #[error("dependency cycle detected: {}", path.join(" -> "))]
    Cycle {
        /// The cycle, starting and ending at the same unit.
        path: Vec<String>,
    },

    /// A declared dependency is not part of the unit set.
    #[error("unit '{unit}' depends on '{dependency}', which is not in the load set")]
    MissingDependency {
        /// Unit declaring the dependency.
        unit: String,
        /// The absent dependency.
        dependency: String,
    },
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

/// Order `units` so every dependency precedes its dependents.
///
/// DFS-based insertion: units are visited in the given order and each is
/// emitted after its dependencies. Within the constraint the input order is
/// preserved, so callers can pre-sort by tier.
pub fn topological_order(
    units: &[Arc<FeatureUnit>],
) -> Result<Vec<Arc<FeatureUnit>>, GraphError> {
    let by_name: HashMap<&str, &Arc<FeatureUnit>> =
        units.iter().map(|u| (u.name.as_str(), u)).collect();

    let mut states: HashMap<&str, VisitState> = units
        .iter()
        .map(|u| (u.name.as_str(), VisitState::Unvisited))
        .collect();
    let mut ordered: Vec<Arc<FeatureUnit>> = Vec::with_capacity(units.len());
    let mut stack: Vec<String> = Vec::new();

    for unit in units {
        visit(unit, &by_name, &mut states, &mut ordered, &mut stack)?;
    }

    Ok(ordered)
}

fn visit<'a>(
    unit: &'a Arc<FeatureUnit>,
    by_name: &HashMap<&'a str, &'a Arc<FeatureUnit>>,
    states: &mut HashMap<&'a str, VisitState>,
    ordered: &mut Vec<Arc<FeatureUnit>>,
    stack: &mut Vec<String>,
) -> Result<(), GraphError> {
    match states.get(unit.name.as_str()) {
        Some(VisitState::Done) => return Ok(()),
        Some(VisitState::InProgress) => {
            // Close the cycle path for the diagnostic.
            let start = stack
                .iter()
                .position(|n| n == &unit.name)
                .unwrap_or(0);
            let mut path: Vec<String> = stack[start..].to_vec();
            path.push(unit.name.clone());
            return Err(GraphError::Cycle { path });
        }
        _ => {}
    }

    states.insert(unit.name.as_str(), VisitState::InProgress);
    stack.push(unit.name.clone());

    for dep in &unit.dependencies {
        let dep_unit = by_name.get(dep.as_str()).copied().ok_or_else(|| {
            GraphError::MissingDependency {
                unit: unit.name.clone(),
                dependency: dep.clone(),
            }
        })?;
        visit(dep_unit, by_name, states, ordered, stack)?;
    }

    stack.pop();
    states.insert(unit.name.as_str(), VisitState::Done);
    ordered.push(Arc::clone(unit));
    Ok(())
}
