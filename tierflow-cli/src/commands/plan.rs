//! `tierflow plan` - print the load plan for a unit manifest.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Deserialize;
use tierflow::degradation::select_level;
use tierflow::loader::{
    factory_fn, topological_order, Artifact, FeatureUnit, LoadStrategy, PriorityTier, Requirement,
};

use super::SignalArgs;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub signals: SignalArgs,

    /// Unit manifest (JSON array of units).
    #[arg(long)]
    pub manifest: PathBuf,
}

/// One unit as declared in the manifest file.
#[derive(Debug, Deserialize)]
struct ManifestUnit {
    name: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    min_score: Option<u8>,
}

fn parse_tier(raw: Option<&str>) -> Result<PriorityTier, String> {
    match raw {
        None | Some("important") => Ok(PriorityTier::Important),
        Some("critical") => Ok(PriorityTier::Critical),
        Some("enhancement") => Ok(PriorityTier::Enhancement),
        Some("optional") => Ok(PriorityTier::Optional),
        Some(other) => Err(format!("unknown tier '{other}'")),
    }
}

pub fn run(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let profile = args.signals.resolve_profile()?;
    let level = select_level(&profile);
    let strategy = LoadStrategy::for_profile(&profile);

    let raw = std::fs::read_to_string(&args.manifest)?;
    let manifest: Vec<ManifestUnit> = serde_json::from_str(&raw)?;

    let mut units = Vec::with_capacity(manifest.len());
    for entry in &manifest {
        let mut unit = FeatureUnit::new(
            entry.name.clone(),
            factory_fn(|| async { Ok(Arc::new(()) as Artifact) }),
        )
        .tier(parse_tier(entry.tier.as_deref())?);
        if let Some(min_score) = entry.min_score {
            unit = unit.requires(Requirement::ScoreAtLeast(min_score));
        }
        let dependencies: Vec<&str> = entry.dependencies.iter().map(String::as_str).collect();
        unit = unit.depends_on(&dependencies);
        units.push(Arc::new(unit));
    }

    let mut eligible: Vec<Arc<FeatureUnit>> = Vec::new();
    let mut skipped: Vec<&str> = Vec::new();
    for unit in &units {
        if unit.requirement.satisfied(&profile, level) && strategy.admits(unit.tier) {
            eligible.push(Arc::clone(unit));
        } else {
            skipped.push(&unit.name);
        }
    }

    // Pull in dependencies of eligible units regardless of their own tier.
    let mut included: Vec<String> = eligible.iter().map(|u| u.name.clone()).collect();
    loop {
        let missing: Vec<Arc<FeatureUnit>> = eligible
            .iter()
            .flat_map(|u| u.dependencies.iter())
            .filter(|dep| !included.iter().any(|n| n == *dep))
            .filter_map(|dep| units.iter().find(|u| &u.name == dep).cloned())
            .collect();
        if missing.is_empty() {
            break;
        }
        for unit in missing {
            included.push(unit.name.clone());
            eligible.push(unit);
        }
    }

    eligible.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.name.cmp(&b.name)));
    let ordered = topological_order(&eligible)?;

    println!(
        "Load plan ({} units, strategy {strategy}, level {level})",
        ordered.len()
    );
    for (index, batch) in ordered.chunks(strategy.max_concurrency()).enumerate() {
        let names: Vec<&str> = batch.iter().map(|u| u.name.as_str()).collect();
        println!("  batch {}: {}", index + 1, names.join(", "));
    }
    if !skipped.is_empty() {
        skipped.sort();
        println!("  skipped: {}", skipped.join(", "));
    }

    Ok(())
}
