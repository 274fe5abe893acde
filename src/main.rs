//! notion-github-sync entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info};

use ngs::config::{default_state_file, Config};
use ngs::error::Result;
use ngs::github::GithubClient;
use ngs::notion::NotionClient;
use ngs::sync::{PassStats, StateStore, SyncEngine};

#[derive(Parser)]
#[command(name = "ngs", version, about = "Keeps a Notion task database and a GitHub Project in agreement")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the state file location
    #[arg(long, global = true, value_name = "PATH", env = "STATE_FILE_PATH")]
    state: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler: one pass immediately, then one per interval
    Run,
    /// Run a single reconciliation pass and exit
    Once,
    /// Show the persisted sync state without touching the network
    Status {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use the verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run => {
            let (engine, config) = build_engine(cli)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_scheduler(&engine, &config))
        }
        Commands::Once => {
            let (engine, _) = build_engine(cli)?;
            let runtime = tokio::runtime::Runtime::new()?;
            let stats = runtime.block_on(engine.run_pass())?;
            print_stats(&stats);
            Ok(())
        }
        Commands::Status { json } => show_status(cli, *json),
    }
}

fn build_engine(cli: &Cli) -> Result<(SyncEngine<NotionClient, GithubClient>, Config)> {
    let mut config = Config::from_env()?;
    if let Some(path) = &cli.state {
        config.state_file.clone_from(path);
    }
    let mappings = Config::load_mappings()?;

    let engine = SyncEngine::new(
        NotionClient::new(&config.notion),
        GithubClient::new(&config.github),
        StateStore::new(config.state_file.clone()),
        mappings,
    );
    Ok((engine, config))
}

/// One pass immediately, then one per interval. A failed pass is logged
/// and the loop keeps going; every error the engine surfaces here is
/// worth retrying on the next tick.
async fn run_scheduler(
    engine: &SyncEngine<NotionClient, GithubClient>,
    config: &Config,
) -> Result<()> {
    info!(
        interval_secs = config.sync_interval.as_secs(),
        "scheduler started"
    );
    let mut ticker = tokio::time::interval(config.sync_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match engine.run_pass().await {
            Ok(stats) => {
                info!(
                    mutations = stats.total_mutations(),
                    failures = stats.failures,
                    "scheduled pass finished"
                );
            }
            Err(e) => {
                error!(error = %e, retryable = e.is_retryable(), "scheduled pass failed");
            }
        }
    }
}

fn print_stats(stats: &PassStats) {
    println!("{}", "Pass complete".green().bold());
    println!("  Issues created:  {}", stats.issues_created);
    println!("  Issues updated:  {}", stats.issues_updated);
    println!("  Issues closed:   {}", stats.issues_closed);
    println!("  Pages created:   {}", stats.pages_created);
    println!("  Pages updated:   {}", stats.pages_updated);
    if stats.recovered > 0 {
        println!("  Pairings recovered: {}", stats.recovered);
    }
    if stats.dropped > 0 {
        println!("  Pairings dropped:   {}", stats.dropped);
    }
    if stats.failures > 0 {
        println!(
            "  {} {}",
            "Failures:".red(),
            stats.failures
        );
    }
}

/// Report on the persisted state only; no credentials, no network.
fn show_status(cli: &Cli, json: bool) -> Result<()> {
    let path = cli.state.clone().unwrap_or_else(default_state_file);
    let state = StateStore::new(path.clone()).load()?;

    if json {
        let out = serde_json::json!({
            "stateFile": path.display().to_string(),
            "lastSync": state.last_sync,
            "trackedPairings": state.synced_tasks.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "Sync status".bold());
    println!("  State file: {}", path.display());
    match state.last_sync {
        Some(at) => println!("  Last sync:  {}", at.to_rfc3339()),
        None => println!("  Last sync:  {}", "never".yellow()),
    }
    println!("  Tracked pairings: {}", state.synced_tasks.len());
    Ok(())
}
