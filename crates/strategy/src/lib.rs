pub mod config;
pub mod indicators;
pub mod provider;
pub mod registry;
pub mod selection;
pub mod strategies;

pub use config::{IndicatorConfig, StrategyFileConfig};
pub use provider::TechnicalIndicators;
pub use registry::StrategyRegistry;
pub use selection::StrategySelector;

use common::{Action, IndicatorSnapshot, MarketSnapshot, Result, StrategyName};

/// All strategy implementations must satisfy this trait.
///
/// `decide` is a pure function of its inputs: no I/O, no interior state.
/// The only permitted failure is a missing indicator key.
pub trait Strategy: Send + Sync {
    fn name(&self) -> StrategyName;

    fn decide(&self, market: &MarketSnapshot, indicators: &IndicatorSnapshot) -> Result<Action>;
}
