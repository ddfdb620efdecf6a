use std::io::{self, BufRead, Write};

use common::{Error, Result};
use strategy::config::{DEFAULT_BASE_AMOUNT, DEFAULT_PERCENTAGE, DEFAULT_SYMBOL};
use strategy::TradingConfig;

/// Ask the operator for pair, amount and band width. Enter keeps the default.
pub fn collect() -> Result<TradingConfig> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let symbol = ask(
        &mut input,
        &format!("Enter the trading pair (e.g., BTC/USDC) [Default: {DEFAULT_SYMBOL}]: "),
    )?;
    let amount = ask(
        &mut input,
        &format!("Enter the amount to trade (e.g., 0.0001) [Default: {DEFAULT_BASE_AMOUNT}]: "),
    )?;
    let percentage = ask(
        &mut input,
        &format!(
            "Enter the percentage for buy/sell triggers (e.g., 1) [Default: {DEFAULT_PERCENTAGE}%]: "
        ),
    )?;

    TradingConfig::from_answers(&symbol, &amount, &percentage)
}

fn ask(input: &mut impl BufRead, question: &str) -> Result<String> {
    let mut out = io::stdout();
    out.write_all(question.as_bytes())?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::Config("standard input closed before configuration was complete".into()));
    }
    Ok(line.trim().to_string())
}
