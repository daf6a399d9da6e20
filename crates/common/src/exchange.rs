use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{IndicatorSnapshot, MarketSnapshot, MarketStats, OrderReceipt, OrderSide, Result};

/// Abstraction over the exchange connection.
///
/// `BinanceFuturesClient` implements this against the real exchange. In paper
/// mode the client is still used for balance and price reads, but
/// `TradeExecutor` never calls `place_market_order`.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Quote-asset (USDT) account balance.
    async fn balance(&self) -> Result<Decimal>;

    /// Latest traded price for a symbol.
    async fn current_price(&self, symbol: &str) -> Result<Decimal>;

    /// Rolling 24h volume and price change. Venues without the data return `None`.
    async fn market_stats(&self, _symbol: &str) -> Result<Option<MarketStats>> {
        Ok(None)
    }

    /// Submit a market order. A refusal by the exchange is `Error::OrderRejected`.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderReceipt>;
}

/// Source of historical close prices for indicator computation.
#[async_trait]
pub trait CandleFeed: Send + Sync {
    /// The last `limit` candle closes for `symbol`, oldest first.
    async fn closes(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<f64>>;
}

/// Produces the indicator snapshot strategies decide on.
#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    async fn indicators(&self, symbol: &str) -> Result<IndicatorSnapshot>;
}

/// External oracle that recommends a strategy for the current market.
///
/// Returns the raw suggestion; the caller maps it onto a known strategy
/// (see `StrategyName::coerce`) and decides what to do on `Err`.
#[async_trait]
pub trait StrategyAdvisor: Send + Sync {
    async fn suggest_strategy(
        &self,
        market: &MarketSnapshot,
        indicators: &IndicatorSnapshot,
    ) -> Result<String>;
}
