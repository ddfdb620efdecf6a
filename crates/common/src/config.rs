use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::debug;

use crate::{Error, Result, TradingMode};

const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.com";

/// Process configuration loaded from environment variables at startup.
///
/// Trading parameters (pair, size, band width) are not here: they come from
/// the operator prompt or the file named by `BAND_CONFIG_PATH`.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub trading_mode: TradingMode,
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_base_url: String,

    // Scheduling
    pub poll_interval: Duration,
    pub retry_interval: Duration,

    // Durable append-only log
    pub log_file: String,

    // Paper trading
    pub paper_slippage_bps: Decimal,
    pub paper_initial_base: Decimal,
    pub paper_initial_quote: Decimal,

    /// Optional TOML file holding the trading parameters.
    pub band_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Credentials are only required in live mode.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }

        let trading_mode = match optional_env("TRADING_MODE")
            .map(|m| m.to_lowercase())
            .as_deref()
        {
            None | Some("paper") => TradingMode::Paper,
            Some("live") => TradingMode::Live,
            Some(other) => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (
                required_env("BINANCE_API_KEY")?,
                required_env("BINANCE_SECRET")?,
            ),
            TradingMode::Paper => (
                optional_env("BINANCE_API_KEY").unwrap_or_default(),
                optional_env("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        Ok(Config {
            trading_mode,
            binance_api_key,
            binance_secret,
            binance_base_url: optional_env("BINANCE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BINANCE_BASE_URL.to_string()),
            poll_interval: Duration::from_secs(parsed_env("POLL_INTERVAL_SECS", 5)?),
            retry_interval: Duration::from_secs(parsed_env("RETRY_INTERVAL_SECS", 5)?),
            log_file: optional_env("LOG_FILE").unwrap_or_else(|| "bandbot.log".to_string()),
            paper_slippage_bps: parsed_env("PAPER_SLIPPAGE_BPS", Decimal::TEN)?,
            paper_initial_base: parsed_env("PAPER_INITIAL_BASE", Decimal::new(1, 2))?,
            paper_initial_quote: parsed_env("PAPER_INITIAL_QUOTE", Decimal::from(10_000))?,
            band_config_path: optional_env("BAND_CONFIG_PATH"),
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key} has invalid value '{raw}': {e}"))),
    }
}
