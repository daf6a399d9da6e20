pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use bollinger::{Bands, BollingerBands};
pub use ema::{ema, ema_series};
pub use macd::{MacdIndicator, MacdValue};
pub use rsi::RsiIndicator;
