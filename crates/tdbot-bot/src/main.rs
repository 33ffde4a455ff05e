//! tdbot - sequence signal detection and fill settlement
//!
//! Each subcommand runs once against the configured markets and prints its
//! result as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tdbot_bot::{AppConfig, Application};
use tdbot_core::{Price, Timeframe};
use tracing::info;

/// Sequence signal detection and fill settlement
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TDBOT_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Market selector shared by the per-market subcommands.
#[derive(clap::Args, Debug)]
struct MarketArgs {
    /// Instrument symbol, e.g. BTCUSDT
    #[arg(long)]
    instrument: String,
    /// Canonical timeframe, e.g. 1h
    #[arg(long)]
    timeframe: Timeframe,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read every market's candles and journal the latest signals
    Detect {
        /// Journal timestamp (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Settle a JSON Lines fill file into a market's ledger
    Settle {
        #[command(flatten)]
        market: MarketArgs,
        /// Fill file
        #[arg(long)]
        fills: PathBuf,
        /// Record the fills without matching them
        #[arg(long)]
        defer: bool,
    },
    /// Settle coarser markets' pending sells on behalf of a finer one
    Proxy {
        #[command(flatten)]
        market: MarketArgs,
        /// Evaluation instant (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Realized profit per UTC day
    Summary {
        #[command(flatten)]
        market: MarketArgs,
    },
    /// Quantity sellable at a price with every consumed lot in profit
    Lockable {
        #[command(flatten)]
        market: MarketArgs,
        /// Candidate sell price
        #[arg(long)]
        price: Decimal,
        /// Minimum margin in percent (defaults to the configured value)
        #[arg(long)]
        min_profit_pct: Option<Decimal>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tdbot_telemetry::init_logging()?;

    info!("Starting tdbot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)?;

    let app = Application::new(config)?;

    match args.command {
        Command::Detect { at } => {
            let readings = app.detect_all(at.unwrap_or_else(Utc::now)).await?;
            print_json(&readings)?;
        }
        Command::Settle {
            market,
            fills,
            defer,
        } => {
            if defer {
                let recorded = app
                    .record_file(&market.instrument, market.timeframe, fills)
                    .await?;
                print_json(&serde_json::json!({ "recorded": recorded }))?;
            } else {
                let report = app
                    .settle_file(&market.instrument, market.timeframe, fills)
                    .await?;
                print_json(&report)?;
            }
        }
        Command::Proxy { market, at } => {
            let runs = app
                .run_proxies(&market.instrument, market.timeframe, at.unwrap_or_else(Utc::now))
                .await?;
            print_json(&runs)?;
        }
        Command::Summary { market } => {
            print_json(&app.summary(&market.instrument, market.timeframe)?)?;
        }
        Command::Lockable {
            market,
            price,
            min_profit_pct,
        } => {
            let report = app.lockable(
                &market.instrument,
                market.timeframe,
                Price::new(price),
                min_profit_pct,
            )?;
            print_json(&report)?;
        }
    }

    Ok(())
}
