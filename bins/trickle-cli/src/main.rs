//! trickle — operator command line for the trickle reward controller.
//!
//! Prints the planned emission schedule, runs scripted simulations against an
//! in-memory controller, and inspects saved snapshots.

mod simulate;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use trickle_controller::ControllerConfig;
use trickle_core::constants::{CURVE_PRECISION, UNIT};
use trickle_core::store::{MemoryRewardStore, RewardStore};
use trickle_emission::PeriodPlan;

/// Decaying reward emission controller tooling.
#[derive(Parser)]
#[command(name = "trickle")]
#[command(version, about = "Fixed-budget, decaying reward emission")]
struct Cli {
    /// Config file (default: <config dir>/trickle/trickle.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the planned per-period schedule.
    Schedule(ScheduleArgs),
    /// Run a JSON script against an in-memory controller.
    Simulate(SimulateArgs),
    /// Print the periods and pools stored in a snapshot.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ScheduleArgs {
    /// Genesis date (YYYY-MM-DD, UTC midnight). Overrides the configured genesis.
    #[arg(short, long)]
    genesis: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SimulateArgs {
    /// Script file.
    #[arg(short, long)]
    script: PathBuf,

    /// Write the final store as a bincode snapshot.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    /// Snapshot file written by `simulate --snapshot`.
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ControllerConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, &cli.log_format);

    match cli.command {
        Commands::Schedule(args) => schedule(config, args),
        Commands::Simulate(args) => simulate(config, args),
        Commands::Inspect(args) => inspect(args),
    }
}

/// Print the planned schedule.
fn schedule(mut config: ControllerConfig, args: ScheduleArgs) -> Result<()> {
    if let Some(date) = &args.genesis {
        config.genesis_time = Some(parse_genesis(date)?);
    }
    let curve = config.curve().context("Invalid emission parameters")?;
    let plans = curve.schedule().context("Failed to compute schedule")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    println!(
        "{:>4}  {:<10}  {:>18}  {:>14}  {:>18}  {:>8}",
        "#", "start", "budget", "rate/s", "cumulative", "released"
    );
    for plan in &plans {
        print_plan(plan);
    }
    Ok(())
}

fn print_plan(plan: &PeriodPlan) {
    println!(
        "{:>4}  {:<10}  {:>18}  {:>14}  {:>18}  {:>7.3}%",
        plan.index,
        format_date(plan.start),
        format_tokens(plan.budget),
        format_tokens(plan.rate),
        format_tokens(plan.cumulative),
        plan.cumulative_fraction as f64 * 100.0 / CURVE_PRECISION as f64,
    );
}

/// Run a simulation script and print the JSON report.
fn simulate(config: ControllerConfig, args: SimulateArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script: {}", args.script.display()))?;
    let script: simulate::Script = serde_json::from_str(&text).context("Invalid script")?;
    let config = script.config.clone().unwrap_or(config);

    let (report, store) = simulate::run(&script, config).context("Failed to start controller")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = args.snapshot {
        let bytes = store.encode_snapshot().context("Failed to encode snapshot")?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}

/// Print a snapshot's periods and pools.
fn inspect(args: InspectArgs) -> Result<()> {
    let bytes = std::fs::read(&args.snapshot)
        .with_context(|| format!("Failed to read snapshot: {}", args.snapshot.display()))?;
    let store = MemoryRewardStore::decode_snapshot(&bytes).context("Invalid snapshot")?;
    let pools: Vec<_> = store
        .pool_ids()
        .iter()
        .filter_map(|id| store.pool(id))
        .collect();

    if args.json {
        let doc = serde_json::json!({
            "state": store.state(),
            "periods": store.periods(),
            "pools": pools,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let state = store.state();
    println!("phase:         {}", state.phase);
    println!("rate/s:        {}", format_tokens(state.current_rate));
    println!("total weight:  {}", state.total_weight);
    println!("total claimed: {}", format_tokens(state.total_claimed));
    println!("armed:         {}", state.termination_armed);

    println!("\nperiods:");
    for p in store.periods() {
        println!(
            "  {:>4}  {:<10}  budget {:>18}  claimed {:>18}{}",
            p.index,
            format_date(p.start),
            format_tokens(p.budget),
            format_tokens(p.claimed),
            if p.skipped { "  (skipped)" } else { "" },
        );
    }

    println!("\npools:");
    for pool in &pools {
        println!(
            "  {}  weight {}  shares {}  accrued {}",
            pool.id,
            pool.weight,
            pool.total_shares,
            format_tokens(pool.accrued),
        );
    }
    Ok(())
}

/// Parse `YYYY-MM-DD` as UTC midnight.
fn parse_genesis(date: &str) -> Result<u64> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {date}"))?;
    let ts = day
        .and_hms_opt(0, 0, 0)
        .context("Invalid time")?
        .and_utc()
        .timestamp();
    if ts < 0 {
        bail!("Genesis must not precede 1970-01-01");
    }
    Ok(ts as u64)
}

fn format_date(ts: u64) -> String {
    DateTime::<Utc>::from_timestamp(ts as i64, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Base units as whole tokens with six decimals.
fn format_tokens(units: u128) -> String {
    format!("{}.{:06}", units / UNIT, (units % UNIT) / (UNIT / 1_000_000))
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value defaults
/// to human-readable text. Logs go to stderr so reports on stdout stay clean.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
