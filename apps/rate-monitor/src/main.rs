//! Exchange rate monitor: polls live rates and notifies when a pair leaves
//! its alert band.
//!
//! Usage: rate-monitor [--config rate-alert.toml] [--poll-interval-secs N]
//!
//! Bands come from the threshold store written by `update-thresholds`, or
//! from the configured static rules when the store is empty.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clients_exchangerate::{ExchangeRateApiClient, OpenErApiClient};
use clients_notifier::{DesktopNotifier, MultiNotifier, Notifier, TelegramBot};
use rate_alert::{AppConfig, RateMonitor, RateSource, ThresholdStore};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rate-monitor")]
#[command(about = "Watch exchange rates and alert when they leave their band")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between poll cycles
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Threshold store to read bands from
    #[arg(long)]
    thresholds_path: Option<PathBuf>,

    /// Re-read the threshold store when it changes
    #[arg(long)]
    reload_thresholds: bool,
}

fn build_notifier(config: &AppConfig) -> anyhow::Result<MultiNotifier> {
    let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
    if config.desktop_notifications {
        sinks.push(Box::new(DesktopNotifier::new()));
    }
    if let Some(telegram) = &config.telegram {
        sinks.push(Box::new(TelegramBot::new(
            telegram.bot_key.clone(),
            telegram.chat_id.clone(),
        )?));
    }
    Ok(MultiNotifier::new(sinks))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_tracing("info");
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(secs) = args.poll_interval_secs {
        config.poll_interval_secs = secs;
    }
    if let Some(path) = args.thresholds_path {
        config.thresholds_path = path;
    }
    if args.reload_thresholds {
        config.reload_thresholds = true;
    }
    config.validate()?;

    let mut source = RateSource::default();
    let primary = OpenErApiClient::with_timeout(config.api_timeout())?;
    source.push(Arc::new(primary));
    match config.exchangerate_api_key() {
        Some(key) => {
            let secondary =
                ExchangeRateApiClient::with_timeout(key.to_string(), config.api_timeout())?;
            source.push(Arc::new(secondary));
        }
        None => info!("no exchangerate-api key configured, secondary provider disabled"),
    }

    let notifier = build_notifier(&config)?;
    if notifier.is_empty() {
        warn!("all notification sinks disabled, alerts will only be logged");
    }

    let monitor = RateMonitor::new(
        source,
        Arc::new(notifier),
        ThresholdStore::new(&config.thresholds_path),
        config.static_rules()?,
        config.monitor_settings(),
    );

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await;
    Ok(())
}
