mod prompt;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use common::{Config, ExchangeGateway, TradingMode};
use engine::{BinanceClient, Driver, PollSchedule};
use paper::PaperClient;
use strategy::{BandStrategy, TradingConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;

    // ── Logging ──────────────────────────────────────────────────────────────
    init_logging(&cfg.log_file)?;
    info!(mode = %cfg.trading_mode, log_file = %cfg.log_file, "BandBot starting");

    // ── Trading parameters ───────────────────────────────────────────────────
    let trading = match &cfg.band_config_path {
        Some(path) => TradingConfig::load(path)?,
        None => prompt::collect()?,
    };

    // ── Exchange gateway (injected based on TRADING_MODE) ────────────────────
    let market = Arc::new(BinanceClient::new(
        &cfg.binance_base_url,
        &cfg.binance_api_key,
        &cfg.binance_secret,
    )?);
    let gateway: Arc<dyn ExchangeGateway> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode: using BinanceClient");
            market
        }
        TradingMode::Paper => {
            info!(slippage_bps = %cfg.paper_slippage_bps, "Paper trading mode: using PaperClient");
            let balances = [
                (trading.symbol.base().to_string(), cfg.paper_initial_base),
                (trading.symbol.quote().to_string(), cfg.paper_initial_quote),
            ];
            Arc::new(PaperClient::new(balances, cfg.paper_slippage_bps).with_market_data(market))
        }
    };

    // ── Driver ───────────────────────────────────────────────────────────────
    let schedule = PollSchedule {
        interval: cfg.poll_interval,
        retry_after_error: cfg.retry_interval,
    };
    let driver = Driver::new(BandStrategy::new(trading), gateway, schedule);

    tokio::select! {
        _ = driver.run() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Shutdown signal received. Exiting.");
        }
    }
    Ok(())
}

/// Status lines go to stdout; everything except per-tick waiting chatter is
/// also appended to the durable log file.
fn init_logging(path: &str) -> anyhow::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter_fn(|meta| meta.target() != "status")),
        )
        .init();
    Ok(())
}
