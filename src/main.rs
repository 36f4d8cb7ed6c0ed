// SPDX-License-Identifier: MPL-2.0

//! speedmeter command line
//!
//! `monitor` prints live throughput until Ctrl-C, `usage` prints the period
//! totals, and `reset` zeroes one period.

use std::path::PathBuf;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};

use speedmeter::config::Config;
use speedmeter::monitor::{NetworkMonitor, SysinfoSource};
use speedmeter::usage::{JsonFileStore, PeriodKind, StoreError, UsageAccumulator, UsageStore};
use speedmeter::{usage_detail, usage_summary};

#[derive(Debug, Parser)]
#[command(name = "speedmeter", version, about = "Network speed meter with rolling usage totals")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SPEEDMETER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding usage.json
    #[arg(long, global = true, env = "SPEEDMETER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Sampling interval in milliseconds (500-5000)
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show live throughput until interrupted
    Monitor,
    /// Print usage for every period
    Usage,
    /// Zero one period: today, week, month, year or all-time.
    /// Refused while a monitor is running on the same data directory.
    Reset { period: PeriodKind },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);
    let store_path = config
        .store_path()
        .ok_or("could not determine a data directory; pass --data-dir")?;
    let store = JsonFileStore::open(&store_path)?;
    log::debug!("Using usage store {}", store_path.display());

    match cli.command.unwrap_or(Command::Monitor) {
        Command::Monitor => monitor(store, &config).await,
        Command::Usage => {
            let usage = UsageAccumulator::load_local(store, Utc::now());
            print_usage(&usage);
            Ok(())
        }
        Command::Reset { period } => {
            let _lock = match store.lock() {
                Ok(lock) => lock,
                Err(e @ StoreError::Locked { .. }) => {
                    return Err(format!("{e}; stop `speedmeter monitor` before resetting").into());
                }
                Err(e) => return Err(e.into()),
            };
            let mut usage = UsageAccumulator::load_local(store, Utc::now());
            usage.reset_usage(period, Utc::now());
            if let Some(e) = usage.persist_error() {
                return Err(format!("failed to save reset: {e}").into());
            }
            println!("{}", usage_summary(period, usage.usage(period)));
            Ok(())
        }
    }
}

fn resolve_config(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(ms) = cli.interval_ms {
        config.update_interval_ms = ms;
    }
    config.normalized()
}

fn print_usage<S: UsageStore>(usage: &UsageAccumulator<S>) {
    for (kind, bucket) in usage.iter() {
        println!("{}", usage_detail(kind, bucket, &Local));
    }
    if let Some(at) = usage.last_update() {
        println!("Last updated: {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
    }
}

async fn monitor(store: JsonFileStore, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // Held until return so `reset` cannot write behind this process.
    let _lock = store.lock()?;
    let usage = UsageAccumulator::load_local(store, Utc::now());
    let monitor = NetworkMonitor::new(SysinfoSource::new(), usage, config);
    monitor.start();

    // Presentation runs on its own cadence and only ever reads snapshots.
    let display = {
        let monitor = monitor.clone();
        let mut refresh = tokio::time::interval(config.refresh_interval());
        tokio::spawn(async move {
            loop {
                refresh.tick().await;
                let snapshot = monitor.snapshot();
                let link = if snapshot.rate.is_connected {
                    snapshot.rate.interface_label.as_str()
                } else {
                    "offline"
                };
                println!("{}  [{}]", snapshot.rate.title(), link);
            }
        })
    };

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;
    display.abort();

    let snapshot = monitor.snapshot();
    println!();
    for (kind, bucket) in &snapshot.usage {
        println!("{}", usage_detail(*kind, bucket, &Local));
    }
    Ok(())
}
