use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use encounter_kit::{discover_encounters, run_encounter, EncounterConfig, EncounterReport};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Run and inspect turn-based combat encounters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play encounters headlessly and emit JSON reports.
    Simulate(SimulateArgs),
    /// Check encounter files without running them.
    Validate(ValidateArgs),
    /// Summarise an existing report.
    Report(ReportArgs),
}

#[derive(Args)]
struct SimulateArgs {
    #[arg(long, conflicts_with = "dir", required_unless_present = "dir")]
    config: Option<PathBuf>,
    /// Run every `*.toml` below this directory.
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Overrides the seed of every encounter (takes precedence over COMBAT_SEED).
    #[arg(long)]
    seed: Option<u64>,
    /// Report file, or directory when simulating a directory.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    id: Option<String>,
}

#[derive(Args)]
struct ValidateArgs {
    #[arg(long, default_value = "encounters/goblin_ambush.toml")]
    config: PathBuf,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    input: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();
    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate(args) => handle_simulate(args),
        Commands::Validate(args) => handle_validate(args),
        Commands::Report(args) => handle_report(args),
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<()> {
    let run_id = args
        .id
        .clone()
        .unwrap_or_else(|| format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S")));

    if let Some(dir) = args.dir.as_ref() {
        let paths = discover_encounters(dir)?;
        if paths.is_empty() {
            warn!(target: "encounter.runner", dir = %dir.display(), "no encounters found");
        }
        for path in paths {
            let id = format!("{run_id}-{}", file_stem(&path));
            let report = simulate_one(&path, &id, args.seed)?;
            let out = args
                .out
                .as_ref()
                .map(|out| out.join(format!("{}.json", file_stem(&path))));
            emit(&report, out.as_deref())?;
        }
        return Ok(());
    }

    let path = args
        .config
        .as_ref()
        .context("either --config or --dir is required")?;
    let report = simulate_one(path, &run_id, args.seed)?;
    emit(&report, args.out.as_deref())
}

fn simulate_one(path: &Path, id: &str, seed: Option<u64>) -> Result<EncounterReport> {
    let mut config = EncounterConfig::from_path(path)?;
    config.apply_env();
    if let Some(seed) = seed {
        config.seed = seed;
    }
    run_encounter(&config, id).with_context(|| format!("encounter {} failed", path.display()))
}

fn emit(report: &EncounterReport, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            report.write_to(path)?;
            println!("{}", report.headline());
            println!("Report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn handle_validate(args: ValidateArgs) -> Result<()> {
    let config = EncounterConfig::from_path(&args.config)?;
    config
        .validate()
        .with_context(|| format!("{} failed validation", args.config.display()))?;
    println!(
        "{} is valid: {} party member(s) vs {} enemy(ies), seed {}",
        args.config.display(),
        config.party.len(),
        config.enemies.len(),
        config.seed
    );
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let data = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let report: EncounterReport = serde_json::from_str(&data)?;
    println!("{}", report.headline());
    for event in &report.journal {
        println!("  {:<14} {}", event.name(), event.message());
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "encounter".to_owned())
}
