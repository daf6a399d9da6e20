use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use common::{Error, OrderSide, Result};

/// User-configurable risk parameters, read from the `[risk]` table of the
/// trading config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Share of account capital committed as margin per trade (e.g. 0.01 = 1%).
    pub risk_fraction: Decimal,
    /// Futures leverage applied to the committed margin.
    pub leverage: Decimal,
    /// Distance of the initial trailing stop from entry (e.g. 0.01 = 1%).
    pub trailing_stop_pct: Decimal,
    /// Exchange lot size; quantities are floored to a multiple of it.
    pub quantity_step: Decimal,
    /// Decimal places of the exchange tick size.
    pub price_precision: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_fraction: Decimal::new(1, 2),
            leverage: Decimal::ONE,
            trailing_stop_pct: Decimal::new(1, 2),
            quantity_step: Decimal::new(1, 3),
            price_precision: 2,
        }
    }
}

#[derive(Deserialize)]
struct RiskFile {
    #[serde(default)]
    risk: RiskConfig,
}

impl RiskConfig {
    /// Load the `[risk]` table from a TOML file; a missing table means defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read risk config at '{path}': {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RiskFile = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        file.risk.validate()?;
        Ok(file.risk)
    }

    pub fn validate(&self) -> Result<()> {
        if self.risk_fraction <= Decimal::ZERO || self.risk_fraction > Decimal::ONE {
            return Err(Error::Config("risk_fraction must be in (0, 1]".into()));
        }
        if self.leverage < Decimal::ONE {
            return Err(Error::Config("leverage must be >= 1".into()));
        }
        if self.trailing_stop_pct <= Decimal::ZERO || self.trailing_stop_pct >= Decimal::ONE {
            return Err(Error::Config("trailing_stop_pct must be in (0, 1)".into()));
        }
        if self.quantity_step <= Decimal::ZERO {
            return Err(Error::Config("quantity_step must be > 0".into()));
        }
        Ok(())
    }
}

/// Position sizing and stop placement consulted by the trade executor.
///
/// Contract: `calculate_quantity` returns a strictly positive quantity for a
/// positive price or fails; `trailing_stop_price` returns a trigger strictly
/// below entry for `Buy` and strictly above entry for `Sell`.
pub trait RiskManager: Send + Sync {
    fn calculate_quantity(&self, price: Decimal) -> Result<Decimal>;

    fn trailing_stop_price(&self, entry_price: Decimal, side: OrderSide) -> Result<Decimal>;
}

/// Sizes every trade as a fixed fraction of current account capital.
///
/// Capital arrives over a `watch` channel so balance polling can keep it
/// current without sharing a lock with the executor.
pub struct FractionalRiskManager {
    config: RiskConfig,
    capital: watch::Receiver<Decimal>,
}

impl FractionalRiskManager {
    pub fn new(config: RiskConfig, capital: watch::Receiver<Decimal>) -> Result<Self> {
        config.validate()?;
        info!(
            risk_fraction = %config.risk_fraction,
            leverage = %config.leverage,
            trailing_stop_pct = %config.trailing_stop_pct,
            "RiskManager initialized"
        );
        Ok(Self { config, capital })
    }

    /// Risk manager with a capital figure that never changes.
    pub fn with_fixed_capital(config: RiskConfig, capital: Decimal) -> Result<Self> {
        let (_tx, rx) = watch::channel(capital);
        Self::new(config, rx)
    }

    pub fn capital(&self) -> Decimal {
        *self.capital.borrow()
    }
}

impl RiskManager for FractionalRiskManager {
    fn calculate_quantity(&self, price: Decimal) -> Result<Decimal> {
        if price <= Decimal::ZERO {
            return Err(Error::RiskViolation(format!("price must be positive, got {price}")));
        }
        let capital = self.capital();
        let overflow = || Error::RiskViolation("position size overflow".into());

        let notional = capital
            .checked_mul(self.config.risk_fraction)
            .and_then(|v| v.checked_mul(self.config.leverage))
            .ok_or_else(overflow)?;
        let raw = notional.checked_div(price).ok_or_else(overflow)?;
        let steps = raw
            .checked_div(self.config.quantity_step)
            .ok_or_else(overflow)?
            .floor();
        let quantity = (steps * self.config.quantity_step).normalize();

        debug!(%capital, %price, %notional, %quantity, "Position sized");

        if quantity <= Decimal::ZERO {
            return Err(Error::RiskViolation(format!(
                "position size rounds to zero (capital {capital}, price {price}, step {})",
                self.config.quantity_step
            )));
        }
        Ok(quantity)
    }

    fn trailing_stop_price(&self, entry_price: Decimal, side: OrderSide) -> Result<Decimal> {
        if entry_price <= Decimal::ZERO {
            return Err(Error::RiskViolation(format!(
                "entry price must be positive, got {entry_price}"
            )));
        }
        let pct = self.config.trailing_stop_pct;
        let dp = self.config.price_precision;

        // Round away from entry so the precision cut never crosses it.
        let trigger = match side {
            OrderSide::Buy => (entry_price * (Decimal::ONE - pct))
                .round_dp_with_strategy(dp, RoundingStrategy::ToNegativeInfinity),
            OrderSide::Sell => (entry_price * (Decimal::ONE + pct))
                .round_dp_with_strategy(dp, RoundingStrategy::ToPositiveInfinity),
        };

        if trigger <= Decimal::ZERO {
            return Err(Error::RiskViolation(format!(
                "trailing stop for entry {entry_price} rounds to {trigger}"
            )));
        }
        Ok(trigger)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
