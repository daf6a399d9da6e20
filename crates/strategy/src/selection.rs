use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use common::{IndicatorSnapshot, MarketSnapshot, StrategyAdvisor, StrategyName};

use crate::{Strategy, StrategyRegistry};

/// Picks the strategy for the current decision cycle.
///
/// With an advisor configured, its suggestion is resolved through the
/// registry; any advisor failure (error or timeout) falls back to
/// `EMA_CROSS` and never aborts the cycle. Without an advisor the
/// configured default strategy is used.
pub struct StrategySelector {
    registry: Arc<StrategyRegistry>,
    advisor: Option<Arc<dyn StrategyAdvisor>>,
    advisor_timeout: Duration,
    default_strategy: StrategyName,
}

impl StrategySelector {
    const DEFAULT_ADVISOR_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(registry: Arc<StrategyRegistry>, default_strategy: StrategyName) -> Self {
        Self {
            registry,
            advisor: None,
            advisor_timeout: Self::DEFAULT_ADVISOR_TIMEOUT,
            default_strategy,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn StrategyAdvisor>, timeout: Duration) -> Self {
        self.advisor = Some(advisor);
        self.advisor_timeout = timeout;
        self
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    pub async fn select(
        &self,
        market: &MarketSnapshot,
        indicators: &IndicatorSnapshot,
    ) -> Arc<dyn Strategy> {
        let Some(advisor) = &self.advisor else {
            return self.registry.resolve(self.default_strategy);
        };

        let suggestion =
            tokio::time::timeout(self.advisor_timeout, advisor.suggest_strategy(market, indicators))
                .await;

        match suggestion {
            Ok(Ok(raw)) => {
                let strategy = self.registry.resolve_str(&raw);
                info!(symbol = %market.symbol, suggested = %raw.trim(), selected = %strategy.name(), "Advisor strategy selected");
                strategy
            }
            Ok(Err(e)) => {
                warn!(symbol = %market.symbol, error = %e, "Advisor failed, using fallback strategy");
                self.registry.resolve(StrategyName::default())
            }
            Err(_) => {
                warn!(
                    symbol = %market.symbol,
                    timeout = ?self.advisor_timeout,
                    "Advisor timed out, using fallback strategy"
                );
                self.registry.resolve(StrategyName::default())
            }
        }
    }
}
