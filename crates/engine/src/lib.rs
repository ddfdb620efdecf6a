pub mod binance;
pub mod driver;

pub use binance::BinanceClient;
pub use driver::{Driver, PollSchedule};
