use crate::{Error, Result, TradingMode};

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange credentials
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_futures_url: String,

    // Strategy advisor (disabled when no API key is set)
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub advisor_timeout_secs: u64,

    // Telegram notifications (disabled when no token is set)
    pub telegram_token: Option<String>,
    pub telegram_chat_ids: Vec<i64>,

    // Trading
    pub trading_mode: TradingMode,
    pub paper_slippage_bps: f64,

    // Strategy / indicator / risk parameters file
    pub trading_config_path: String,
}

impl Config {
    pub const DEFAULT_FUTURES_URL: &'static str = "https://fapi.binance.com";

    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode = required_env("TRADING_MODE")
            .parse::<TradingMode>()
            .unwrap_or_else(|e| panic!("ERROR: {e}"));

        let telegram_chat_ids = optional_env("TELEGRAM_CHAT_IDS")
            .map(|raw| parse_chat_ids(&raw).unwrap_or_else(|e| panic!("{e}")))
            .unwrap_or_default();

        Config {
            binance_api_key: required_env("BINANCE_API_KEY"),
            binance_secret: required_env("BINANCE_SECRET"),
            binance_futures_url: optional_env("BINANCE_FUTURES_URL")
                .unwrap_or_else(|| Self::DEFAULT_FUTURES_URL.to_string()),
            openai_api_key: optional_env("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            openai_model: optional_env("OPENAI_MODEL").unwrap_or_else(|| "gpt-4".to_string()),
            openai_base_url: optional_env("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            advisor_timeout_secs: parse_advisor_timeout(optional_env("ADVISOR_TIMEOUT_SECS").as_deref())
                .unwrap_or_else(|e| panic!("{e}")),
            telegram_token: optional_env("TELEGRAM_TOKEN").filter(|t| !t.trim().is_empty()),
            telegram_chat_ids,
            trading_mode,
            paper_slippage_bps: optional_env("PAPER_SLIPPAGE_BPS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            trading_config_path: optional_env("TRADING_CONFIG_PATH")
                .unwrap_or_else(|| "config/trading.toml".to_string()),
        }
    }
}

/// Parse a comma-separated list of Telegram chat ids.
pub fn parse_chat_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                Error::Config(format!("TELEGRAM_CHAT_IDS contains non-numeric ID: '{s}'"))
            })
        })
        .collect()
}

/// Advisor timeout in whole seconds. Unset means 20; zero or garbage is an error.
fn parse_advisor_timeout(raw: Option<&str>) -> Result<u64> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(20);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(Error::Config("ADVISOR_TIMEOUT_SECS must be greater than zero".into())),
        Ok(secs) => Ok(secs),
        Err(_) => Err(Error::Config(format!(
            "ADVISOR_TIMEOUT_SECS is not a whole number of seconds: '{raw}'"
        ))),
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ids_parse_with_whitespace() {
        assert_eq!(parse_chat_ids("123, -456 ,789").unwrap(), vec![123, -456, 789]);
        assert!(parse_chat_ids("").unwrap().is_empty());
    }

    #[test]
    fn chat_ids_reject_non_numeric() {
        assert!(matches!(parse_chat_ids("12,abc"), Err(Error::Config(_))));
    }

    #[test]
    fn advisor_timeout_defaults_and_rejects_zero() {
        assert_eq!(parse_advisor_timeout(None).unwrap(), 20);
        assert_eq!(parse_advisor_timeout(Some(" 45 ")).unwrap(), 45);
        assert!(matches!(parse_advisor_timeout(Some("0")), Err(Error::Config(_))));
        assert!(matches!(parse_advisor_timeout(Some("ten")), Err(Error::Config(_))));
        assert!(matches!(parse_advisor_timeout(Some("-3")), Err(Error::Config(_))));
    }
}
