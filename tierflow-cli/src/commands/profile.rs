//! `tierflow profile` - print the capability profile, level and policy.

use clap::Args;
use tierflow::capability::LoadPolicy;
use tierflow::degradation::{select_level, Feature};
use tierflow::loader::LoadStrategy;

use super::SignalArgs;

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub signals: SignalArgs,

    /// Emit machine-readable JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ProfileArgs) -> Result<(), Box<dyn std::error::Error>> {
    let profile = args.signals.resolve_profile()?;
    let level = select_level(&profile);
    let policy = LoadPolicy::for_profile(&profile);
    let strategy = LoadStrategy::for_profile(&profile);

    if args.json {
        let doc = serde_json::json!({
            "profile": profile,
            "level": level,
            "policy": policy,
            "strategy": strategy.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Capability profile");
    println!("  score:        {}", profile.performance_score);
    println!("  memory:       {:.1} GB", profile.memory_gb);
    println!("  cores:        {}", profile.cores);
    println!("  network:      {}", profile.effective_connection);
    println!("  save-data:    {}", profile.save_data);
    match profile.battery {
        Some(battery) => println!(
            "  battery:      {:.0}%{}",
            battery.level * 100.0,
            if battery.charging { " (charging)" } else { "" }
        ),
        None => println!("  battery:      not exposed"),
    }
    println!();
    println!("Degradation level: {level}");
    println!("  animations:     {}", level.feature_enabled(Feature::Animations));
    println!("  heavy widgets:  {}", level.feature_enabled(Feature::HeavyComponents));
    println!("  charts:         {:?}", level.chart_mode());
    println!();
    println!("Load strategy: {strategy}");
    println!(
        "  batch size {} / pacing {:?}",
        strategy.max_concurrency(),
        strategy.pacing()
    );
    println!();
    println!("Policy");
    println!("  concurrency:  {}", policy.max_concurrent_requests);
    println!("  image:        {:?} ({:?})", policy.image_quality, policy.image_format);
    println!("  prefetch:     {:?}", policy.prefetch);
    println!(
        "  budgets:      {} KB / {:?}",
        policy.max_view_size_kb, policy.max_view_time
    );

    Ok(())
}
