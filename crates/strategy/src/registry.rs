use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use common::StrategyName;

use crate::strategies::{BollingerBreakout, BreakoutMomentum, EmaCross, MeanReversion, RsiMacd};
use crate::Strategy;

/// Holds one shared instance of every strategy, keyed by name.
///
/// Built once at startup. Strategies are stateless, so the instances are
/// handed out as `Arc`s without any locking.
pub struct StrategyRegistry {
    strategies: HashMap<StrategyName, Arc<dyn Strategy>>,
    fallback: Arc<dyn Strategy>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        let fallback: Arc<dyn Strategy> = Arc::new(EmaCross);
        let all: [Arc<dyn Strategy>; 5] = [
            fallback.clone(),
            Arc::new(RsiMacd),
            Arc::new(BollingerBreakout),
            Arc::new(BreakoutMomentum),
            Arc::new(MeanReversion),
        ];

        let mut strategies = HashMap::new();
        for strategy in all {
            info!(name = %strategy.name(), "Registered strategy");
            strategies.insert(strategy.name(), strategy);
        }

        Self { strategies, fallback }
    }

    /// Look up a strategy. Names without an instance resolve to `EMA_CROSS`.
    pub fn resolve(&self, name: StrategyName) -> Arc<dyn Strategy> {
        self.strategies
            .get(&name)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Resolve an untrusted name, e.g. straight from an advisor response.
    pub fn resolve_str(&self, raw: &str) -> Arc<dyn Strategy> {
        self.resolve(StrategyName::coerce(raw))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
