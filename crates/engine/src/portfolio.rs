use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use common::{BalanceChangeEvent, ExchangeClient};

/// Last observed account balance. `None` until the first successful read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortfolioState {
    pub last_balance: Option<Decimal>,
}

/// Polls the account balance and reports only changes.
///
/// Owns its `PortfolioState`; one poller per instance, no shared globals.
pub struct PortfolioManager {
    client: Arc<dyn ExchangeClient>,
    state: PortfolioState,
}

impl PortfolioManager {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            client,
            state: PortfolioState::default(),
        }
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    /// Read the balance and emit an event if it differs from the last one.
    ///
    /// Read failures are logged and leave the stored balance untouched.
    pub async fn update(&mut self) -> Option<BalanceChangeEvent> {
        let balance = match self.client.balance().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Balance read failed, keeping last known balance");
                return None;
            }
        };

        if self.state.last_balance == Some(balance) {
            return None;
        }

        let event = BalanceChangeEvent {
            previous: self.state.last_balance.replace(balance),
            current: balance,
            timestamp: Utc::now(),
        };
        info!(
            balance = %event.current,
            previous = ?event.previous,
            "Balance updated"
        );
        Some(event)
    }
}
