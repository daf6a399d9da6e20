use super::ema::ema_series;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow), signal = EMA(macd_line, signal_period),
/// histogram = MACD line − signal.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// Latest MACD values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be positive");
        assert!(fast < slow, "MACD fast period must be less than slow period");
        Self { fast, slow, signal }
    }

    /// Closes needed before `compute` yields a value.
    pub fn min_len(&self) -> usize {
        self.slow + self.signal - 1
    }

    /// Compute MACD from a slice of close prices (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Option<MacdValue> {
        if closes.len() < self.min_len() {
            return None;
        }

        let fast = ema_series(closes, self.fast);
        let slow = ema_series(closes, self.slow);

        // Both series end on the last close; trim the fast one to the slow one's start.
        let offset = self.slow - self.fast;
        let macd_line: Vec<f64> = slow
            .iter()
            .zip(&fast[offset..])
            .map(|(s, f)| f - s)
            .collect();

        let signal_line = ema_series(&macd_line, self.signal);
        let macd = *macd_line.last()?;
        let signal = *signal_line.last()?;

        Some(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_returns_none_with_insufficient_data() {
        let macd = MacdIndicator::new(12, 26, 9);
        let prices = vec![100.0; 33]; // need >= 34
        assert!(macd.compute(&prices).is_none());
    }

    #[test]
    fn macd_returns_some_at_minimum_length() {
        let macd = MacdIndicator::new(12, 26, 9);
        let prices: Vec<f64> = (0..34).map(|i| 100.0 + i as f64).collect();
        assert!(macd.compute(&prices).is_some());
    }

    #[test]
    fn macd_is_zero_on_flat_prices() {
        let macd = MacdIndicator::new(12, 26, 9);
        let value = macd.compute(&[250.0; 60]).unwrap();
        assert!(value.macd.abs() < 1e-9);
        assert!(value.histogram.abs() < 1e-9);
    }

    #[test]
    fn macd_line_positive_in_uptrend() {
        let macd = MacdIndicator::new(3, 6, 3);
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        let value = macd.compute(&prices).unwrap();
        assert!(value.macd > 0.0);
    }

    #[test]
    fn histogram_turns_negative_after_reversal() {
        let macd = MacdIndicator::new(3, 6, 3);
        let mut prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        prices.extend((0..6).map(|i| 128.0 - i as f64 * 4.0));
        let value = macd.compute(&prices).unwrap();
        assert!(value.histogram < 0.0, "histogram {}", value.histogram);
    }
}
