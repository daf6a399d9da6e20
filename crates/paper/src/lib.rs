use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use common::{Fill, FillSource, Order, OrderSide};

/// Simulated order execution for paper trading.
///
/// Fills are produced at the supplied reference price with configurable
/// slippage. Nothing is ever sent to the exchange.
pub struct PaperBroker {
    /// Slippage in basis points applied to all fills.
    slippage_bps: Decimal,
}

impl PaperBroker {
    pub fn new(slippage_bps: Decimal) -> Self {
        info!(slippage_bps = %slippage_bps, "PaperBroker initialized");
        Self { slippage_bps }
    }

    /// Simulate a market fill for `order` at `reference_price`.
    pub fn fill(&self, order: &Order, reference_price: Decimal) -> Fill {
        let slip = self.slippage_bps / Decimal::from(10_000);

        // Buys pay more, sells receive less
        let fill_price = match order.side {
            OrderSide::Buy => reference_price * (Decimal::ONE + slip),
            OrderSide::Sell => reference_price * (Decimal::ONE - slip),
        };

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            reference = %reference_price,
            fill = %fill_price,
            qty = %order.quantity,
            "Paper fill simulated"
        );

        Fill {
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            fill_price,
            quantity: order.quantity,
            source: FillSource::Simulated,
            timestamp: Utc::now(),
        }
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn paper_buy_fill_applies_positive_slippage() {
        let broker = PaperBroker::new(dec!(10)); // 10 bps
        let order = Order::market("BTCUSDT", OrderSide::Buy, dec!(0.01));
        let fill = broker.fill(&order, dec!(1000));
        assert_eq!(fill.fill_price, dec!(1001));
        assert_eq!(fill.source, FillSource::Simulated);
    }

    #[test]
    fn paper_sell_fill_applies_negative_slippage() {
        let broker = PaperBroker::new(dec!(10));
        let order = Order::market("BTCUSDT", OrderSide::Sell, dec!(0.01));
        let fill = broker.fill(&order, dec!(1000));
        assert_eq!(fill.fill_price, dec!(999));
    }

    #[test]
    fn zero_slippage_fills_at_reference() {
        let broker = PaperBroker::default();
        let order = Order::market("ETHUSDT", OrderSide::Buy, dec!(1));
        let fill = broker.fill(&order, dec!(2500.5));
        assert_eq!(fill.fill_price, dec!(2500.5));
        assert_eq!(fill.order_id, order.id);
        assert_eq!(fill.quantity, dec!(1));
    }
}
