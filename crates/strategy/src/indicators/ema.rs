/// Exponential moving average series over `data` (oldest first).
///
/// Seeded with the SMA of the first `period` values, so the first output
/// corresponds to `data[period - 1]`. Returns an empty vector when there
/// are fewer than `period` values.
pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);

    let seed = data[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(data.len() - period + 1);
    out.push(seed);

    let mut ema_val = seed;
    for &price in &data[period..] {
        ema_val = price * k + ema_val * (1.0 - k);
        out.push(ema_val);
    }
    out
}

/// Latest EMA value, or `None` with insufficient data.
pub fn ema(data: &[f64], period: usize) -> Option<f64> {
    ema_series(data, period).last().copied()
}
