pub mod manager;

pub use manager::{FractionalRiskManager, RiskConfig, RiskManager};
