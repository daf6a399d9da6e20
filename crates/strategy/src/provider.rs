use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use common::{CandleFeed, Error, IndicatorProvider, IndicatorSnapshot, Result};

use crate::config::IndicatorConfig;
use crate::indicators::{ema, BollingerBands, MacdIndicator, RsiIndicator};

/// Computes the indicator snapshot from a rolling window of candle closes.
///
/// Nothing is cached between calls: every cycle fetches a fresh window.
pub struct TechnicalIndicators {
    feed: Arc<dyn CandleFeed>,
    interval: String,
    lookback: usize,
    ema_fast: usize,
    ema_slow: usize,
    rsi: RsiIndicator,
    macd: MacdIndicator,
    bands: BollingerBands,
}

impl TechnicalIndicators {
    pub fn new(feed: Arc<dyn CandleFeed>, cfg: &IndicatorConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            feed,
            interval: cfg.interval.clone(),
            lookback: cfg.lookback,
            ema_fast: cfg.macd_fast,
            ema_slow: cfg.macd_slow,
            rsi: RsiIndicator::new(cfg.rsi_period),
            macd: MacdIndicator::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal),
            bands: BollingerBands::new(cfg.bb_period, cfg.bb_std_dev),
        })
    }

    /// Build the snapshot from closes (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Result<IndicatorSnapshot> {
        let insufficient = |name: &str, needed: usize| {
            Error::Indicator(format!(
                "{name} needs at least {needed} closes, got {}",
                closes.len()
            ))
        };

        let rsi = self
            .rsi
            .compute(closes)
            .ok_or_else(|| insufficient("RSI", self.rsi.min_len()))?;
        let macd = self
            .macd
            .compute(closes)
            .ok_or_else(|| insufficient("MACD", self.macd.min_len()))?;
        let ema_fast = ema(closes, self.ema_fast).ok_or_else(|| insufficient("EMA", self.ema_fast))?;
        let ema_slow = ema(closes, self.ema_slow).ok_or_else(|| insufficient("EMA", self.ema_slow))?;
        let bands = self
            .bands
            .compute(closes)
            .ok_or_else(|| insufficient("Bollinger", self.bands.min_len()))?;

        Ok(IndicatorSnapshot::new()
            .with(IndicatorSnapshot::RSI, rsi)
            .with(IndicatorSnapshot::MACD, macd.histogram)
            .with(IndicatorSnapshot::EMA_FAST, ema_fast)
            .with(IndicatorSnapshot::EMA_SLOW, ema_slow)
            .with(IndicatorSnapshot::BB_UPPER, bands.upper)
            .with(IndicatorSnapshot::BB_MIDDLE, bands.middle)
            .with(IndicatorSnapshot::BB_LOWER, bands.lower))
    }
}

#[async_trait]
impl IndicatorProvider for TechnicalIndicators {
    async fn indicators(&self, symbol: &str) -> Result<IndicatorSnapshot> {
        let closes = self
            .feed
            .closes(symbol, &self.interval, self.lookback)
            .await
            .map_err(|e| Error::Indicator(format!("candle fetch for {symbol} failed: {e}")))?;

        let snapshot = self.compute(&closes)?;
        debug!(symbol = %symbol, candles = closes.len(), ?snapshot, "Indicators computed");
        Ok(snapshot)
    }
}
