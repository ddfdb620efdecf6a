pub mod band;
pub mod config;
pub mod normalizer;

pub use band::{
    buy_threshold, sell_threshold, BandStrategy, Decision, LastAction, SkipReason, StrategyState,
    TickOutcome,
};
pub use config::TradingConfig;
pub use normalizer::QuantityNormalizer;
