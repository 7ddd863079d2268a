//! Tierflow CLI - inspect capability profiles and load plans.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tierflow", version, about = "Adaptive delivery engine inspector")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute and print the capability profile, level and policy.
    Profile(commands::profile::ProfileArgs),

    /// Print the load plan for a unit manifest.
    Plan(commands::plan::PlanArgs),

    /// Manage the configuration file.
    Config(commands::config::ConfigArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Profile(args) => commands::profile::run(args),
        Command::Plan(args) => commands::plan::run(args),
        Command::Config(args) => commands::config::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
