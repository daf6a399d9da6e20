pub mod binance;
pub mod executor;
pub mod lifecycle;
pub mod portfolio;

pub use binance::BinanceFuturesClient;
pub use executor::{TradeError, TradeExecutor, TradeStage};
pub use lifecycle::{CycleError, CycleOutcome, Engine, EngineHandle};
pub use portfolio::{PortfolioManager, PortfolioState};
