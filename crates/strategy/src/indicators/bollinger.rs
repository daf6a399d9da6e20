/// Bollinger Bands: SMA(period) ± std_dev × population standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub period: usize,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev: f64) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        Self { period, std_dev }
    }

    pub fn min_len(&self) -> usize {
        self.period
    }

    /// Bands over the last `period` closes.
    pub fn compute(&self, closes: &[f64]) -> Option<Bands> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        let n = self.period as f64;
        let middle = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / n;
        let width = self.std_dev * variance.sqrt();

        Some(Bands {
            upper: middle + width,
            middle,
            lower: middle - width,
        })
    }
}
