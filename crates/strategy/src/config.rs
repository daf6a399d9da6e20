use serde::{Deserialize, Serialize};

use common::{Error, Result, StrategyName};

/// Trading config file (TOML). Only the top-level keys and `[indicators]`
/// are read here; `[risk]` belongs to the risk crate.
///
/// Example `config/trading.toml`:
/// ```toml
/// symbol = "BTCUSDT"
/// default_strategy = "EMA_CROSS"
/// cycle_interval_secs = 60
/// settle_delay_ms = 2000
///
/// [indicators]
/// interval = "1m"
/// lookback = 100
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    /// Futures symbol traded, e.g. "BTCUSDT".
    pub symbol: String,
    /// Strategy used when no advisor is configured.
    #[serde(default)]
    pub default_strategy: StrategyName,
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// Pause after each submitted order, in both modes.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub indicators: IndicatorConfig,
}

/// Candle window and indicator periods.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Kline interval, e.g. "1m".
    pub interval: String,
    /// Number of candles fetched per cycle.
    pub lookback: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            interval: "1m".to_string(),
            lookback: 100,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rsi_period < 2 {
            return Err(Error::Config("rsi_period must be >= 2".into()));
        }
        if self.macd_fast == 0 || self.macd_signal == 0 || self.macd_fast >= self.macd_slow {
            return Err(Error::Config(
                "macd periods must be positive with macd_fast < macd_slow".into(),
            ));
        }
        if self.bb_period < 2 || self.bb_std_dev <= 0.0 {
            return Err(Error::Config("bb_period must be >= 2 and bb_std_dev > 0".into()));
        }
        let needed = (self.macd_slow + self.macd_signal - 1)
            .max(self.rsi_period + 1)
            .max(self.bb_period);
        if self.lookback < needed {
            return Err(Error::Config(format!(
                "lookback {} is too short, indicators need at least {needed} candles",
                self.lookback
            )));
        }
        Ok(())
    }
}

fn default_cycle_interval_secs() -> u64 {
    60
}

fn default_settle_delay_ms() -> u64 {
    2000
}

impl StrategyFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read trading config at '{path}': {e}")))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("invalid trading config at '{path}': {e}")))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if cfg.symbol.trim().is_empty() {
            return Err(Error::Config("symbol must not be empty".into()));
        }
        if cfg.cycle_interval_secs == 0 {
            return Err(Error::Config("cycle_interval_secs must be > 0".into()));
        }
        cfg.indicators.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let cfg = StrategyFileConfig::from_toml_str(r#"symbol = "ETHUSDT""#).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.default_strategy, StrategyName::EmaCross);
        assert_eq!(cfg.cycle_interval_secs, 60);
        assert_eq!(cfg.settle_delay_ms, 2000);
        assert_eq!(cfg.indicators.lookback, 100);
        assert_eq!(cfg.indicators.interval, "1m");
    }

    #[test]
    fn full_file_with_risk_table_parses() {
        let cfg = StrategyFileConfig::from_toml_str(
            r#"
            symbol = "BTCUSDT"
            default_strategy = "RSI_MACD"
            settle_delay_ms = 0

            [indicators]
            lookback = 200
            rsi_period = 7

            [risk]
            risk_fraction = "0.01"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_strategy, StrategyName::RsiMacd);
        assert_eq!(cfg.settle_delay_ms, 0);
        assert_eq!(cfg.indicators.lookback, 200);
        assert_eq!(cfg.indicators.rsi_period, 7);
        assert_eq!(cfg.indicators.macd_slow, 26);
    }

    #[test]
    fn short_lookback_is_rejected() {
        let err = StrategyFileConfig::from_toml_str(
            r#"
            symbol = "BTCUSDT"
            [indicators]
            lookback = 20
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn default_strategy_name_is_case_insensitive() {
        let cfg = StrategyFileConfig::from_toml_str(
            r#"
            symbol = "BTCUSDT"
            default_strategy = "mean_reversion"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_strategy, StrategyName::MeanReversion);
    }

    #[test]
    fn unknown_default_strategy_is_rejected() {
        assert!(StrategyFileConfig::from_toml_str(
            r#"
            symbol = "BTCUSDT"
            default_strategy = "YOLO"
            "#
        )
        .is_err());
    }
}
