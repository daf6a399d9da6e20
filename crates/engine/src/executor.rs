use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};

use common::{
    Error, ExchangeClient, Fill, FillSource, Order, OrderSide, TradeOutcome, TradingMode,
    TrailingStopOrder,
};
use paper::PaperBroker;
use risk::RiskManager;

/// Furthest state a trade reached. A failed trade reports the last state it
/// completed, so `Idle` means no price was read and nothing was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStage {
    Idle,
    Priced,
    Sized,
    Submitted,
    StopComputed,
    Done,
}

impl std::fmt::Display for TradeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStage::Idle => write!(f, "IDLE"),
            TradeStage::Priced => write!(f, "PRICED"),
            TradeStage::Sized => write!(f, "SIZED"),
            TradeStage::Submitted => write!(f, "SUBMITTED"),
            TradeStage::StopComputed => write!(f, "STOP_COMPUTED"),
            TradeStage::Done => write!(f, "DONE"),
        }
    }
}

/// A trade cycle that ended in the failed state.
#[derive(Debug, Error)]
#[error("{symbol} {side} trade failed after {stage}: {source}")]
pub struct TradeError {
    pub symbol: String,
    pub side: OrderSide,
    pub stage: TradeStage,
    #[source]
    pub source: Error,
}

enum Venue {
    Paper(PaperBroker),
    Live,
}

/// Runs one trade: price → size → submit (or simulate) → trailing stop.
///
/// This is the ONLY component that calls `ExchangeClient::place_market_order`,
/// and only when built with [`TradeExecutor::live`]. Holds no per-trade state,
/// so one executor can serve any number of sequential cycles.
pub struct TradeExecutor {
    client: Arc<dyn ExchangeClient>,
    risk: Arc<dyn RiskManager>,
    venue: Venue,
    settle_delay: Duration,
}

impl TradeExecutor {
    const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

    pub fn paper(client: Arc<dyn ExchangeClient>, risk: Arc<dyn RiskManager>, broker: PaperBroker) -> Self {
        Self {
            client,
            risk,
            venue: Venue::Paper(broker),
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn live(client: Arc<dyn ExchangeClient>, risk: Arc<dyn RiskManager>) -> Self {
        Self {
            client,
            risk,
            venue: Venue::Live,
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
        }
    }

    /// Wait applied after every submission, in both modes.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn mode(&self) -> TradingMode {
        match self.venue {
            Venue::Paper(_) => TradingMode::Paper,
            Venue::Live => TradingMode::Live,
        }
    }

    pub async fn execute(&self, symbol: &str, side: OrderSide) -> Result<TradeOutcome, TradeError> {
        let fail = |stage: TradeStage, source: Error| {
            let err = TradeError {
                symbol: symbol.to_string(),
                side,
                stage,
                source,
            };
            error!(symbol = %symbol, side = %side, stage = %stage, error = %err.source, "Trade cycle failed");
            err
        };

        // IDLE → PRICED
        let price = self.client.current_price(symbol).await.map_err(|e| {
            fail(
                TradeStage::Idle,
                Error::PriceUnavailable {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                },
            )
        })?;
        if price <= Decimal::ZERO {
            return Err(fail(
                TradeStage::Idle,
                Error::PriceUnavailable {
                    symbol: symbol.to_string(),
                    reason: format!("non-positive price {price}"),
                },
            ));
        }

        // PRICED → SIZED
        let quantity = self
            .risk
            .calculate_quantity(price)
            .map_err(|e| fail(TradeStage::Priced, e))?;
        if quantity <= Decimal::ZERO {
            return Err(fail(
                TradeStage::Priced,
                Error::RiskViolation(format!("non-positive quantity {quantity} at price {price}")),
            ));
        }

        // SIZED → SUBMITTED
        let fill = match &self.venue {
            Venue::Paper(broker) => {
                let order = Order::market(symbol, side, quantity);
                let fill = broker.fill(&order, price);
                info!(symbol = %symbol, side = %side, qty = %quantity, price = %fill.fill_price, "[PAPER] Simulated market order");
                fill
            }
            Venue::Live => {
                let receipt = self
                    .client
                    .place_market_order(symbol, side, quantity)
                    .await
                    .map_err(|e| fail(TradeStage::Sized, e))?;
                info!(
                    symbol = %symbol,
                    side = %side,
                    qty = %quantity,
                    order_id = %receipt.order_id,
                    status = %receipt.status,
                    "[LIVE] Market order placed"
                );
                Fill {
                    order_id: receipt.order_id,
                    symbol: symbol.to_string(),
                    side,
                    fill_price: receipt.avg_price.unwrap_or(price),
                    quantity: if receipt.executed_qty > Decimal::ZERO {
                        receipt.executed_qty
                    } else {
                        quantity
                    },
                    source: FillSource::Exchange,
                    timestamp: Utc::now(),
                }
            }
        };

        tokio::time::sleep(self.settle_delay).await;

        // SUBMITTED → STOP_COMPUTED
        let entry_price = fill.fill_price;
        let trigger_price = self
            .risk
            .trailing_stop_price(entry_price, side)
            .map_err(|e| fail(TradeStage::Submitted, e))?;

        let on_protective_side = match side {
            OrderSide::Buy => trigger_price < entry_price,
            OrderSide::Sell => trigger_price > entry_price,
        };
        if !on_protective_side {
            return Err(fail(
                TradeStage::Submitted,
                Error::RiskViolation(format!(
                    "{side} trailing stop {trigger_price} is on the wrong side of entry {entry_price}"
                )),
            ));
        }

        let stop = TrailingStopOrder {
            side,
            entry_price,
            trigger_price,
        };
        info!(symbol = %symbol, side = %side, entry = %entry_price, trigger = %trigger_price, "Trailing stop armed");

        // STOP_COMPUTED → DONE
        Ok(TradeOutcome {
            fill,
            stop,
            mode: self.mode(),
        })
    }
}
