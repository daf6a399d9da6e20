use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// Market state read once at the start of a decision cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Last traded price.
    pub price: Decimal,
    /// Rolling 24h base-asset volume, when the venue reported it.
    pub volume: Option<Decimal>,
    /// Rolling 24h price change in percent, when the venue reported it.
    pub change_24h_pct: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume: None,
            change_24h_pct: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_stats(mut self, stats: MarketStats) -> Self {
        self.volume = Some(stats.volume);
        self.change_24h_pct = Some(stats.change_24h_pct);
        self
    }
}

/// Rolling 24h ticker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStats {
    pub volume: Decimal,
    pub change_24h_pct: Decimal,
}

/// Indicator values keyed by name, computed fresh for every cycle.
///
/// Strategies read keys through [`IndicatorSnapshot::get`], which fails with
/// [`Error::MissingIndicator`] instead of substituting a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    values: BTreeMap<String, f64>,
}

impl IndicatorSnapshot {
    pub const RSI: &'static str = "rsi";
    /// MACD histogram (MACD line minus signal line).
    pub const MACD: &'static str = "macd";
    pub const EMA_FAST: &'static str = "ema_fast";
    pub const EMA_SLOW: &'static str = "ema_slow";
    pub const BB_UPPER: &'static str = "bb_upper";
    pub const BB_MIDDLE: &'static str = "bb_middle";
    pub const BB_LOWER: &'static str = "bb_lower";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Result<f64> {
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| Error::MissingIndicator(key.to_string()))
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for IndicatorSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Decision emitted by a strategy for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// The order side to trade, or `None` for `Hold`.
    pub fn side(self) -> Option<OrderSide> {
        match self {
            Action::Buy => Some(OrderSide::Buy),
            Action::Sell => Some(OrderSide::Sell),
            Action::Hold => None,
        }
    }
}

impl From<OrderSide> for Action {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Action::Buy,
            OrderSide::Sell => Action::Sell,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Identifier of every strategy the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum StrategyName {
    #[default]
    EmaCross,
    RsiMacd,
    BollingerBreakout,
    BreakoutMomentum,
    MeanReversion,
}

impl StrategyName {
    pub const ALL: [StrategyName; 5] = [
        StrategyName::EmaCross,
        StrategyName::RsiMacd,
        StrategyName::BollingerBreakout,
        StrategyName::BreakoutMomentum,
        StrategyName::MeanReversion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyName::EmaCross => "EMA_CROSS",
            StrategyName::RsiMacd => "RSI_MACD",
            StrategyName::BollingerBreakout => "BOLLINGER_BREAKOUT",
            StrategyName::BreakoutMomentum => "BREAKOUT_MOMENTUM",
            StrategyName::MeanReversion => "MEAN_REVERSION",
        }
    }

    /// Map an untrusted name (advisor output, config value) onto a known strategy.
    ///
    /// Surrounding whitespace and case are ignored. Anything that is not
    /// exactly one of the known names becomes `EMA_CROSS`. This is the only
    /// place the unknown-name policy lives; the registry and the selection
    /// flow both go through it.
    pub fn coerce(raw: &str) -> StrategyName {
        raw.parse().unwrap_or_else(|_| {
            warn!(raw = %raw, fallback = %StrategyName::default(), "Unknown strategy name, using fallback");
            StrategyName::default()
        })
    }
}

impl FromStr for StrategyName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase();
        StrategyName::ALL
            .into_iter()
            .find(|name| name.as_str() == wanted)
            .ok_or_else(|| Error::Other(format!("unknown strategy name '{s}'")))
    }
}

impl TryFrom<String> for StrategyName {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        raw.parse()
    }
}

impl std::fmt::Display for StrategyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether orders are routed to the real exchange or simulated.
/// Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl FromStr for TradingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "paper" => Ok(TradingMode::Paper),
            "live" => Ok(TradingMode::Live),
            other => Err(Error::Config(format!(
                "trading mode must be 'paper' or 'live', got: '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// A market order to be submitted (or simulated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Client-side order id, also sent to the exchange as `newClientOrderId`.
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            symbol: symbol.into(),
            side,
            quantity,
        }
    }
}

/// Acknowledgement returned by the exchange for a submitted market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub status: String,
    /// Average fill price, when the exchange reports one.
    pub avg_price: Option<Decimal>,
    pub executed_qty: Decimal,
}

/// Where a fill came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillSource {
    Exchange,
    Simulated,
}

/// A filled order. Paper and live execution both produce this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub fill_price: Decimal,
    pub quantity: Decimal,
    pub source: FillSource,
    pub timestamp: DateTime<Utc>,
}

/// Initial trailing-stop level for a freshly opened trade. Reported only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailingStopOrder {
    pub side: OrderSide,
    pub entry_price: Decimal,
    pub trigger_price: Decimal,
}

/// Result of a completed trade cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub fill: Fill,
    pub stop: TrailingStopOrder,
    pub mode: TradingMode,
}

impl TradeOutcome {
    pub fn symbol(&self) -> &str {
        &self.fill.symbol
    }

    pub fn action(&self) -> Action {
        self.fill.side.into()
    }

    pub fn quantity(&self) -> Decimal {
        self.fill.quantity
    }

    pub fn fill_price(&self) -> Decimal {
        self.fill.fill_price
    }

    pub fn stop_trigger(&self) -> Decimal {
        self.stop.trigger_price
    }
}

/// Emitted by the portfolio poller when the account balance changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChangeEvent {
    /// `None` on the first successful read after startup.
    pub previous: Option<Decimal>,
    pub current: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Events published by the engine for notification sinks.
#[derive(Debug, Clone)]
pub enum TradingEvent {
    BalanceChanged(BalanceChangeEvent),
    TradeExecuted {
        strategy: StrategyName,
        outcome: TradeOutcome,
    },
    CycleFailed {
        symbol: String,
        error: String,
    },
}
