use rust_decimal::prelude::ToPrimitive;

use common::{Action, Error, IndicatorSnapshot, MarketSnapshot, Result, StrategyName};

use crate::Strategy;

// ─── Concrete strategy types ──────────────────────────────────────────────────
//
// Thresholds are fixed; strategies carry no state and are shared by the registry.

/// Trend following on the fast/slow EMA relationship.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmaCross;

impl Strategy for EmaCross {
    fn name(&self) -> StrategyName {
        StrategyName::EmaCross
    }

    fn decide(&self, _market: &MarketSnapshot, indicators: &IndicatorSnapshot) -> Result<Action> {
        let fast = indicators.get(IndicatorSnapshot::EMA_FAST)?;
        let slow = indicators.get(IndicatorSnapshot::EMA_SLOW)?;

        Ok(if fast > slow {
            Action::Buy
        } else if fast < slow {
            Action::Sell
        } else {
            Action::Hold
        })
    }
}

/// Oversold/overbought RSI confirmed by the MACD histogram sign.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsiMacd;

impl Strategy for RsiMacd {
    fn name(&self) -> StrategyName {
        StrategyName::RsiMacd
    }

    fn decide(&self, _market: &MarketSnapshot, indicators: &IndicatorSnapshot) -> Result<Action> {
        let rsi = indicators.get(IndicatorSnapshot::RSI)?;
        let macd = indicators.get(IndicatorSnapshot::MACD)?;

        Ok(if rsi < 30.0 && macd > 0.0 {
            Action::Buy
        } else if rsi > 70.0 && macd < 0.0 {
            Action::Sell
        } else {
            Action::Hold
        })
    }
}

/// Extreme-RSI breakout.
///
/// Simplified: decides on RSI 20/80 only and ignores the `bb_*` band values
/// even when the snapshot carries them.
#[derive(Debug, Clone, Copy, Default)]
pub struct BollingerBreakout;

impl Strategy for BollingerBreakout {
    fn name(&self) -> StrategyName {
        StrategyName::BollingerBreakout
    }

    fn decide(&self, _market: &MarketSnapshot, indicators: &IndicatorSnapshot) -> Result<Action> {
        let rsi = indicators.get(IndicatorSnapshot::RSI)?;

        Ok(if rsi < 20.0 {
            Action::Buy
        } else if rsi > 80.0 {
            Action::Sell
        } else {
            Action::Hold
        })
    }
}

/// Price, fast EMA and slow EMA stacked in the same direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakoutMomentum;

impl Strategy for BreakoutMomentum {
    fn name(&self) -> StrategyName {
        StrategyName::BreakoutMomentum
    }

    fn decide(&self, market: &MarketSnapshot, indicators: &IndicatorSnapshot) -> Result<Action> {
        let fast = indicators.get(IndicatorSnapshot::EMA_FAST)?;
        let slow = indicators.get(IndicatorSnapshot::EMA_SLOW)?;
        let price = market
            .price
            .to_f64()
            .ok_or_else(|| Error::Other(format!("price {} is not representable", market.price)))?;

        Ok(if price > fast && fast > slow {
            Action::Buy
        } else if price < fast && fast < slow {
            Action::Sell
        } else {
            Action::Hold
        })
    }
}

/// Fade RSI extremes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanReversion;

impl Strategy for MeanReversion {
    fn name(&self) -> StrategyName {
        StrategyName::MeanReversion
    }

    fn decide(&self, _market: &MarketSnapshot, indicators: &IndicatorSnapshot) -> Result<Action> {
        let rsi = indicators.get(IndicatorSnapshot::RSI)?;

        Ok(if rsi > 70.0 {
            Action::Sell
        } else if rsi < 30.0 {
            Action::Buy
        } else {
            Action::Hold
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(price: rust_decimal::Decimal) -> MarketSnapshot {
        MarketSnapshot::new("BTCUSDT", price)
    }

    fn emas(fast: f64, slow: f64) -> IndicatorSnapshot {
        IndicatorSnapshot::new()
            .with(IndicatorSnapshot::EMA_FAST, fast)
            .with(IndicatorSnapshot::EMA_SLOW, slow)
    }

    fn rsi_macd(rsi: f64, macd: f64) -> IndicatorSnapshot {
        IndicatorSnapshot::new()
            .with(IndicatorSnapshot::RSI, rsi)
            .with(IndicatorSnapshot::MACD, macd)
    }

    #[test]
    fn ema_cross_follows_fast_vs_slow() {
        let m = market(dec!(100));
        assert_eq!(EmaCross.decide(&m, &emas(101.0, 100.0)).unwrap(), Action::Buy);
        assert_eq!(EmaCross.decide(&m, &emas(99.0, 100.0)).unwrap(), Action::Sell);
    }

    #[test]
    fn ema_cross_equal_emas_hold() {
        let m = market(dec!(100));
        assert_eq!(EmaCross.decide(&m, &emas(100.0, 100.0)).unwrap(), Action::Hold);
    }

    #[test]
    fn rsi_macd_rules() {
        let m = market(dec!(100));
        assert_eq!(RsiMacd.decide(&m, &rsi_macd(25.0, 1.0)).unwrap(), Action::Buy);
        assert_eq!(RsiMacd.decide(&m, &rsi_macd(75.0, -1.0)).unwrap(), Action::Sell);
        assert_eq!(RsiMacd.decide(&m, &rsi_macd(50.0, 1.0)).unwrap(), Action::Hold);
        // Oversold without MACD confirmation is not enough
        assert_eq!(RsiMacd.decide(&m, &rsi_macd(25.0, -1.0)).unwrap(), Action::Hold);
    }

    #[test]
    fn bollinger_breakout_uses_rsi_extremes() {
        let m = market(dec!(100));
        let snap = |rsi: f64| IndicatorSnapshot::new().with(IndicatorSnapshot::RSI, rsi);
        assert_eq!(BollingerBreakout.decide(&m, &snap(19.9)).unwrap(), Action::Buy);
        assert_eq!(BollingerBreakout.decide(&m, &snap(80.1)).unwrap(), Action::Sell);
        assert_eq!(BollingerBreakout.decide(&m, &snap(20.0)).unwrap(), Action::Hold);
        assert_eq!(BollingerBreakout.decide(&m, &snap(80.0)).unwrap(), Action::Hold);
    }

    #[test]
    fn bollinger_breakout_ignores_band_values() {
        let m = market(dec!(50000));
        let snap = IndicatorSnapshot::new()
            .with(IndicatorSnapshot::RSI, 50.0)
            .with(IndicatorSnapshot::BB_UPPER, 46000.0)
            .with(IndicatorSnapshot::BB_LOWER, 44000.0);
        assert_eq!(BollingerBreakout.decide(&m, &snap).unwrap(), Action::Hold);
    }

    #[test]
    fn breakout_momentum_needs_full_stack() {
        let ind = emas(44800.0, 44500.0);
        assert_eq!(BreakoutMomentum.decide(&market(dec!(45000)), &ind).unwrap(), Action::Buy);
        // Price below the fast EMA breaks the bullish stack
        assert_eq!(BreakoutMomentum.decide(&market(dec!(44700)), &ind).unwrap(), Action::Hold);

        let bearish = emas(44500.0, 44800.0);
        assert_eq!(
            BreakoutMomentum.decide(&market(dec!(44000)), &bearish).unwrap(),
            Action::Sell
        );
    }

    #[test]
    fn mean_reversion_fades_extremes() {
        let m = market(dec!(100));
        let snap = |rsi: f64| IndicatorSnapshot::new().with(IndicatorSnapshot::RSI, rsi);
        assert_eq!(MeanReversion.decide(&m, &snap(71.0)).unwrap(), Action::Sell);
        assert_eq!(MeanReversion.decide(&m, &snap(29.0)).unwrap(), Action::Buy);
        assert_eq!(MeanReversion.decide(&m, &snap(70.0)).unwrap(), Action::Hold);
    }

    #[test]
    fn missing_key_is_reported_not_defaulted() {
        let m = market(dec!(100));
        let only_rsi = IndicatorSnapshot::new().with(IndicatorSnapshot::RSI, 10.0);
        match RsiMacd.decide(&m, &only_rsi) {
            Err(Error::MissingIndicator(key)) => assert_eq!(key, "macd"),
            other => panic!("expected MissingIndicator, got {other:?}"),
        }
        assert!(matches!(
            EmaCross.decide(&m, &only_rsi),
            Err(Error::MissingIndicator(_))
        ));
    }
}
