use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use common::{
    Error, ExchangeClient, IndicatorProvider, MarketSnapshot, StrategyName, TradeOutcome,
    TradingEvent,
};
use strategy::StrategySelector;

use crate::executor::{TradeError, TradeExecutor};
use crate::portfolio::PortfolioManager;

/// Result of one decision cycle that did not fail.
#[derive(Debug)]
pub enum CycleOutcome {
    Held { strategy: StrategyName },
    Traded { strategy: StrategyName, outcome: TradeOutcome },
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("market data unavailable: {0}")]
    Market(#[source] Error),

    #[error("indicators unavailable: {0}")]
    Indicators(#[source] Error),

    #[error("{strategy} could not decide: {source}")]
    Decision {
        strategy: StrategyName,
        #[source]
        source: Error,
    },

    #[error(transparent)]
    Trade(#[from] TradeError),
}

/// Cloneable handle used to stop a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl EngineHandle {
    /// Ask the engine to stop. The cycle in flight, if any, finishes first.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// The trading loop: balance poll, then market read → indicators →
/// strategy selection → decision → execution, once per interval.
pub struct Engine {
    symbol: String,
    cycle_interval: Duration,
    client: Arc<dyn ExchangeClient>,
    indicators: Arc<dyn IndicatorProvider>,
    selector: StrategySelector,
    executor: TradeExecutor,
    portfolio: PortfolioManager,
    capital_tx: Option<watch::Sender<Decimal>>,
    event_tx: mpsc::Sender<TradingEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(
        symbol: impl Into<String>,
        cycle_interval: Duration,
        client: Arc<dyn ExchangeClient>,
        indicators: Arc<dyn IndicatorProvider>,
        selector: StrategySelector,
        executor: TradeExecutor,
        event_tx: mpsc::Sender<TradingEvent>,
    ) -> (Self, EngineHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let engine = Engine {
            symbol: symbol.into(),
            cycle_interval,
            portfolio: PortfolioManager::new(client.clone()),
            client,
            indicators,
            selector,
            executor,
            capital_tx: None,
            event_tx,
            shutdown_rx,
        };
        let handle = EngineHandle {
            shutdown_tx: Arc::new(shutdown_tx),
        };

        (engine, handle)
    }

    /// Publish every balance change to position sizing.
    pub fn with_capital_feed(mut self, capital_tx: watch::Sender<Decimal>) -> Self {
        self.capital_tx = Some(capital_tx);
        self
    }

    /// Run one full cycle. Each cycle starts fresh; nothing carries over from
    /// a failed one except the last known balance.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        if let Some(change) = self.portfolio.update().await {
            if let Some(capital_tx) = &self.capital_tx {
                capital_tx.send_replace(change.current);
            }
            self.emit(TradingEvent::BalanceChanged(change)).await;
        }

        let price = self
            .client
            .current_price(&self.symbol)
            .await
            .map_err(CycleError::Market)?;
        let mut market = MarketSnapshot::new(self.symbol.clone(), price);
        // 24h stats only enrich the advisor prompt; missing stats never fail a cycle
        match self.client.market_stats(&self.symbol).await {
            Ok(Some(stats)) => market = market.with_stats(stats),
            Ok(None) => {}
            Err(e) => warn!(symbol = %self.symbol, error = %e, "24h stats unavailable"),
        }

        let indicators = self
            .indicators
            .indicators(&self.symbol)
            .await
            .map_err(CycleError::Indicators)?;
        debug!(symbol = %self.symbol, price = %price, indicators = ?indicators, "Market snapshot taken");

        let strategy = self.selector.select(&market, &indicators).await;
        let name = strategy.name();
        let action = strategy
            .decide(&market, &indicators)
            .map_err(|source| CycleError::Decision { strategy: name, source })?;
        info!(symbol = %self.symbol, strategy = %name, action = %action, price = %price, "Decision made");

        // HOLD has no side and never reaches the executor
        let Some(side) = action.side() else {
            return Ok(CycleOutcome::Held { strategy: name });
        };

        let outcome = self.executor.execute(&self.symbol, side).await?;
        self.emit(TradingEvent::TradeExecuted {
            strategy: name,
            outcome: outcome.clone(),
        })
        .await;

        Ok(CycleOutcome::Traded { strategy: name, outcome })
    }

    /// Run a cycle and turn a failure into a `CycleFailed` event.
    pub async fn tick(&mut self) {
        match self.run_cycle().await {
            Ok(CycleOutcome::Held { strategy }) => {
                debug!(symbol = %self.symbol, strategy = %strategy, "Cycle ended with HOLD");
            }
            Ok(CycleOutcome::Traded { strategy, outcome }) => {
                info!(
                    symbol = %self.symbol,
                    strategy = %strategy,
                    side = %outcome.fill.side,
                    qty = %outcome.quantity(),
                    stop = %outcome.stop_trigger(),
                    "Cycle completed with trade"
                );
            }
            Err(e) => {
                error!(symbol = %self.symbol, error = %e, "Cycle failed");
                self.emit(TradingEvent::CycleFailed {
                    symbol: self.symbol.clone(),
                    error: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Drive cycles until the handle requests shutdown. Call from
    /// `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            symbol = %self.symbol,
            mode = %self.executor.mode(),
            interval_secs = self.cycle_interval.as_secs(),
            "Engine started"
        );

        let mut ticker = tokio::time::interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!(symbol = %self.symbol, "Engine stopped");
    }

    async fn emit(&self, event: TradingEvent) {
        if self.event_tx.send(event).await.is_err() {
            warn!("Event receiver dropped, event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use common::{IndicatorSnapshot, MarketStats, OrderReceipt, OrderSide, Result};
    use paper::PaperBroker;
    use risk::{FractionalRiskManager, RiskConfig};
    use rust_decimal_macros::dec;
    use strategy::StrategyRegistry;

    struct CountingExchange {
        price_reads: AtomicUsize,
    }

    impl CountingExchange {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                price_reads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ExchangeClient for CountingExchange {
        async fn balance(&self) -> Result<Decimal> {
            Ok(dec!(1000))
        }

        async fn current_price(&self, _symbol: &str) -> Result<Decimal> {
            self.price_reads.fetch_add(1, Ordering::SeqCst);
            Ok(dec!(100))
        }

        async fn market_stats(&self, _symbol: &str) -> Result<Option<MarketStats>> {
            Err(Error::Gateway("24hr endpoint down".into()))
        }

        async fn place_market_order(
            &self,
            _symbol: &str,
            _side: OrderSide,
            _quantity: Decimal,
        ) -> Result<OrderReceipt> {
            Err(Error::Other("paper engine must not place orders".into()))
        }
    }

    struct Flat;

    #[async_trait]
    impl IndicatorProvider for Flat {
        async fn indicators(&self, _symbol: &str) -> Result<IndicatorSnapshot> {
            Ok(IndicatorSnapshot::new()
                .with(IndicatorSnapshot::EMA_FAST, 100.0)
                .with(IndicatorSnapshot::EMA_SLOW, 100.0))
        }
    }

    fn engine(
        client: Arc<CountingExchange>,
        interval: Duration,
    ) -> (Engine, EngineHandle, mpsc::Receiver<TradingEvent>) {
        let (capital_tx, capital_rx) = watch::channel(Decimal::ZERO);
        let risk = Arc::new(FractionalRiskManager::new(RiskConfig::default(), capital_rx).unwrap());
        let executor = TradeExecutor::paper(client.clone(), risk, PaperBroker::default())
            .with_settle_delay(Duration::ZERO);
        let selector = StrategySelector::new(Arc::new(StrategyRegistry::new()), StrategyName::EmaCross);
        let (event_tx, event_rx) = mpsc::channel(16);
        let (engine, handle) =
            Engine::new("BTCUSDT", interval, client, Arc::new(Flat), selector, executor, event_tx);
        (engine.with_capital_feed(capital_tx), handle, event_rx)
    }

    #[tokio::test]
    async fn balance_change_is_published_before_deciding() {
        let client = CountingExchange::new();
        let (mut engine, _handle, mut events) = engine(client, Duration::from_secs(60));

        let outcome = engine.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Held { strategy: StrategyName::EmaCross }));

        match events.try_recv().unwrap() {
            TradingEvent::BalanceChanged(change) => assert_eq!(change.current, dec!(1000)),
            other => panic!("expected balance event, got {other:?}"),
        }
        assert_eq!(engine.portfolio.state().last_balance, Some(dec!(1000)));

        // Unchanged balance emits nothing on the next cycle
        engine.run_cycle().await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_market_stats_do_not_fail_the_cycle() {
        let (mut engine, _handle, _events) = engine(CountingExchange::new(), Duration::from_secs(60));
        let outcome = engine.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Held { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let client = CountingExchange::new();
        let (engine, handle, _events) = engine(client.clone(), Duration::from_secs(60));

        let task = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_secs(150)).await;
        handle.shutdown();
        task.await.unwrap();

        // Cycles at t=0, 60 and 120
        assert_eq!(client.price_reads.load(Ordering::SeqCst), 3);
    }
}
