//! Hobart CLI binary.
//!
//! Runs the compositor pipeline against the local store and inspects its outputs.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hobart::compositor::{CompositorContext, DateCacheSnapshot};
use hobart::config::{CONFIG_FILE, default_dir};
use hobart::data::{TradingCalendar, frame};
use hobart::pipeline::beta_compositor;
use hobart::{HobartConfig, Pipeline};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Log filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "hobart=info,hobart_data=info,hobart_factors=info,hobart_compositor=info";

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: incremental factor compositors", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to hobart.json in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every compositor
    Update {
        /// Print run summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rolling beta of stocks against the market series
    Beta {
        /// Stock tickers
        #[arg(required = true)]
        ids: Vec<String>,

        /// Estimation date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Market series id, overriding the config
        #[arg(long)]
        market: Option<String>,

        /// Lookback in calendar days, overriding the config
        #[arg(long)]
        window: Option<u64>,
    },

    /// Show date cache and store statistics
    CacheInfo,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        error!(error = %e, "hobart failed");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| default_dir().join(CONFIG_FILE));
    let config = HobartConfig::load_or_default(&config_path)?;

    match cli.command {
        Commands::Update { json } => update(&config, json)?,
        Commands::Beta {
            ids,
            date,
            market,
            window,
        } => beta(&config, &ids, date, market, window)?,
        Commands::CacheInfo => cache_info(&config)?,
    }

    Ok(())
}

fn update(config: &HobartConfig, as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = config.open_store()?;
    let calendar = TradingCalendar::from_store(&store)?;
    let ctx = CompositorContext::new(&store, &calendar, &store);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = Pipeline::new(config).run_with(&ctx, |name| {
        pb.set_message(format!("Updating {name}"));
    });
    let summaries = match result {
        Ok(summaries) => {
            pb.finish_and_clear();
            summaries
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            println!("{summary}");
        }
    }
    Ok(())
}

fn beta(
    config: &HobartConfig,
    ids: &[String],
    date: NaiveDate,
    market: Option<String>,
    window: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = config.beta.clone();
    if let Some(market) = market {
        settings.market_id = market;
    }
    if let Some(window) = window {
        settings.window_days = window;
    }

    let store = config.open_store()?;
    let calendar = TradingCalendar::from_store(&store)?;
    let ctx = CompositorContext::new(&store, &calendar, &store);

    let df = beta_compositor(&settings).compute(&ctx.factors(), ids, &[date])?;
    let betas = frame::panel(&df, frame::VALUE)?;
    for id in ids {
        let value = betas.get(&(date, id.clone()));
        println!(
            "{}",
            json!({
                "date": date.to_string(),
                "id": id,
                "market": settings.market_id,
                "beta": value,
            })
        );
    }
    Ok(())
}

fn cache_info(config: &HobartConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cache = DateCacheSnapshot::load(&config.date_cache)?;
    println!("Date cache: {}", config.date_cache.display());
    println!("  Entities: {}", cache.entries.len());
    println!("  Entries: {}", cache.len());
    let oldest = cache.watermarks.values().min();
    let newest = cache.watermarks.values().max();
    if let (Some(oldest), Some(newest)) = (oldest, newest) {
        println!("  Watermarks: {oldest} to {newest}");
    }

    if !config.database.exists() {
        println!("Store: {} (not created yet)", config.database.display());
        return Ok(());
    }
    let stats = config.open_store()?.stats()?;
    println!("Store: {}", config.database.display());
    for (table, rows) in &stats.rows_per_table {
        println!("  {table}: {rows} points");
    }
    println!("  Checkpoint streams: {}", stats.checkpoints);
    Ok(())
}
