use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A strategy was handed an indicator snapshot without a key it reads.
    #[error("Missing indicator '{0}'")]
    MissingIndicator(String),

    #[error("Exchange gateway error: {0}")]
    Gateway(String),

    #[error("No price available for {symbol}: {reason}")]
    PriceUnavailable { symbol: String, reason: String },

    #[error("Order rejected: {reason}")]
    OrderRejected { reason: String },

    /// The risk manager produced a quantity or stop price that breaks its contract.
    #[error("Risk manager violation: {0}")]
    RiskViolation(String),

    #[error("Indicator error: {0}")]
    Indicator(String),

    #[error("Advisor error: {0}")]
    Advisor(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
