//! Recomputes dynamic alert thresholds from historical daily rates and
//! saves them to the threshold store.
//!
//! Usage: update-thresholds [--config rate-alert.toml] [--pairs AUD/CNY,USD/AUD]
//!        [--percentile 10] [--lookback-days 365] [--status] [--if-stale]

use std::path::PathBuf;

use anyhow::bail;
use chrono::Local;
use clap::Parser;
use clients_exchangerate::FrankfurterClient;
use rate_alert::{AppConfig, CurrencyPair, ThresholdCalculator, ThresholdSet, ThresholdStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "update-thresholds")]
#[command(about = "Compute percentile alert bands from historical exchange rates")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pairs to update, comma separated ("AUD/CNY,USD/AUD")
    #[arg(long, value_delimiter = ',')]
    pairs: Vec<String>,

    /// Lower percentile; the band spans [p, 100 - p]
    #[arg(long)]
    percentile: Option<u32>,

    /// Days of history to use
    #[arg(long)]
    lookback_days: Option<u32>,

    /// Threshold store to write
    #[arg(long)]
    thresholds_path: Option<PathBuf>,

    /// Print the store status and exit
    #[arg(long, conflicts_with = "if_stale")]
    status: bool,

    /// Only update when the stored thresholds are stale
    #[arg(long)]
    if_stale: bool,
}

fn print_status(store: &ThresholdStore) {
    let status = store.status();
    println!("Threshold store: {}", store.path().display());
    if !status.exists {
        println!("No dynamic thresholds found.");
        return;
    }
    println!("Pairs: {}", status.count);
    if let Some(last_updated) = status.last_updated {
        println!("Last updated: {}", last_updated.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(percentile) = status.percentile {
        println!("Percentile: {percentile}");
    }
    if let Some(lookback_days) = status.lookback_days {
        println!("Lookback days: {lookback_days}");
    }
}

fn print_summary(set: &ThresholdSet, requested: &[CurrencyPair]) {
    println!("Updated {} of {} pairs:", set.len(), requested.len());
    for (pair, threshold) in &set.thresholds {
        println!(
            "  {pair} → {:.4} - {:.4} ({} data points, historical {:.4} - {:.4})",
            threshold.min,
            threshold.max,
            threshold.data_points,
            threshold.historical_min,
            threshold.historical_max
        );
    }
    let failed: Vec<String> = requested
        .iter()
        .filter(|pair| set.get(pair).is_none())
        .map(|pair| pair.to_string())
        .collect();
    if !failed.is_empty() {
        println!("Failed: {}", failed.join(", "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_tracing("info");
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if !args.pairs.is_empty() {
        config.pairs = args.pairs;
    }
    if let Some(percentile) = args.percentile {
        config.percentile = percentile;
    }
    if let Some(lookback_days) = args.lookback_days {
        config.lookback_days = lookback_days;
    }
    if let Some(path) = args.thresholds_path {
        config.thresholds_path = path;
    }
    config.validate()?;

    let store = ThresholdStore::new(&config.thresholds_path);
    if args.status {
        print_status(&store);
        return Ok(());
    }

    let today = Local::now().date_naive();
    if args.if_stale && !store.is_stale(config.update_day_of_month, today) {
        info!(
            path = %store.path().display(),
            "thresholds are current, nothing to do"
        );
        return Ok(());
    }

    let pairs = config.currency_pairs()?;
    let calculator = ThresholdCalculator::new(
        FrankfurterClient::with_timeout(config.historical_timeout())?,
        store,
    );
    let set = calculator
        .update_all(&pairs, config.percentile, config.lookback_days)
        .await?;
    print_summary(&set, &pairs);

    if set.is_empty() {
        bail!("no thresholds could be computed");
    }
    Ok(())
}
