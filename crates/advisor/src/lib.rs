use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{Error, IndicatorSnapshot, MarketSnapshot, Result, StrategyAdvisor, StrategyName};

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 100;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Strategy advisor backed by an OpenAI-compatible chat-completions API.
pub struct GptAdvisor {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl GptAdvisor {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("OPENAI_API_KEY is empty".into()));
        }

        let http = Client::builder()
            .use_rustls_tls()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        let advisor = Self {
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        };
        info!(model = %advisor.model, "GptAdvisor initialized");
        Ok(advisor)
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Advisor(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Advisor(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(Error::Advisor(format!("HTTP {status}: {body}")));
        }

        extract_content(&body)
    }
}

#[async_trait]
impl StrategyAdvisor for GptAdvisor {
    async fn suggest_strategy(
        &self,
        market: &MarketSnapshot,
        indicators: &IndicatorSnapshot,
    ) -> Result<String> {
        let prompt = analysis_prompt(market, indicators);
        debug!(symbol = %market.symbol, "Requesting strategy suggestion");

        let reply = self.complete(prompt).await?;
        let suggestion = parse_suggestion(&reply);
        info!(reply = %reply.trim(), suggestion = %suggestion, "Advisor suggested strategy");
        Ok(suggestion)
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_content(body: &str) -> Result<String> {
    let resp: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::Advisor(format!("malformed completion: {e}")))?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or_else(|| Error::Advisor("completion has no content".into()))
}

// ─── Prompt and reply handling ────────────────────────────────────────────────

fn strategy_list() -> String {
    StrategyName::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn system_prompt() -> String {
    format!(
        "You are an expert cryptocurrency trading advisor. Analyze market data and \
         technical indicators to suggest the BEST trading strategy. Choose ONE from: {}. \
         Respond with ONLY the strategy name.",
        strategy_list()
    )
}

/// User message describing the current market. Absent indicators print `N/A`.
pub fn analysis_prompt(market: &MarketSnapshot, indicators: &IndicatorSnapshot) -> String {
    let show = |key: &str| {
        indicators
            .value(key)
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "N/A".to_string())
    };

    let mut prompt = String::new();
    let _ = writeln!(prompt, "Market Analysis Request for {}:", market.symbol);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Current Price: {}", market.price);
    let _ = writeln!(prompt, "Volume: {}", or_na(market.volume));
    let _ = writeln!(prompt, "24h Change: {}", or_na(market.change_24h_pct.map(|c| format!("{c}%"))));
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Technical Indicators:");
    let _ = writeln!(prompt, "- RSI: {}", show(IndicatorSnapshot::RSI));
    let _ = writeln!(prompt, "- MACD histogram: {}", show(IndicatorSnapshot::MACD));
    let _ = writeln!(prompt, "- EMA Fast (12): {}", show(IndicatorSnapshot::EMA_FAST));
    let _ = writeln!(prompt, "- EMA Slow (26): {}", show(IndicatorSnapshot::EMA_SLOW));
    let _ = writeln!(prompt, "- Bollinger Upper: {}", show(IndicatorSnapshot::BB_UPPER));
    let _ = writeln!(prompt, "- Bollinger Lower: {}", show(IndicatorSnapshot::BB_LOWER));
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Available Strategies:");
    for (i, name) in StrategyName::ALL.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {} - {}", i + 1, name, describe(*name));
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Based on the market conditions and indicators, which strategy would be most effective?"
    );
    let _ = write!(prompt, "Respond with ONLY the strategy name.");
    prompt
}

fn or_na(value: Option<impl std::fmt::Display>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn describe(name: StrategyName) -> &'static str {
    match name {
        StrategyName::EmaCross => "Trend following with EMA crossovers",
        StrategyName::RsiMacd => "Momentum strategy combining RSI and MACD",
        StrategyName::BollingerBreakout => "Volatility breakout on extreme RSI",
        StrategyName::BreakoutMomentum => "Price breakout with EMA trend confirmation",
        StrategyName::MeanReversion => "Mean reversion fading RSI extremes",
    }
}

/// Map a free-text reply onto a strategy name: exact names first, then
/// keywords. Spaces and hyphens count as underscores for the exact pass, so
/// "Mean Reversion" and "mean-reversion" both name MEAN_REVERSION. Keywords
/// match whole words only. Unmatched replies are returned trimmed so the
/// registry's validator decides the fallback.
pub fn parse_suggestion(reply: &str) -> String {
    let upper = reply.to_uppercase();
    let normalized: String = upper
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect();

    if let Some(exact) = StrategyName::ALL.iter().find(|s| normalized.contains(s.as_str())) {
        return exact.as_str().to_string();
    }

    let words: Vec<&str> = upper
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |keys: &[&str]| keys.iter().any(|k| words.contains(k));
    let keyword = if has(&["EMA", "CROSS"]) {
        Some(StrategyName::EmaCross)
    } else if has(&["RSI", "MACD"]) {
        Some(StrategyName::RsiMacd)
    } else if has(&["BOLLINGER"]) {
        Some(StrategyName::BollingerBreakout)
    } else if has(&["BREAKOUT", "MOMENTUM"]) {
        Some(StrategyName::BreakoutMomentum)
    } else if has(&["REVERSION", "MEAN"]) {
        Some(StrategyName::MeanReversion)
    } else {
        None
    };

    match keyword {
        Some(name) => name.as_str().to_string(),
        None => {
            warn!(reply = %reply.trim(), "Advisor reply names no known strategy");
            reply.trim().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MarketStats;
    use rust_decimal_macros::dec;

    #[test]
    fn exact_name_wins_over_keywords() {
        // "MEAN" would match MEAN_REVERSION by keyword; exact RSI_MACD comes first
        assert_eq!(parse_suggestion("I mean RSI_MACD."), "RSI_MACD");
        assert_eq!(parse_suggestion("bollinger_breakout"), "BOLLINGER_BREAKOUT");
    }

    #[test]
    fn keywords_map_in_priority_order() {
        assert_eq!(parse_suggestion("Go with an EMA crossover"), "EMA_CROSS");
        assert_eq!(parse_suggestion("macd momentum looks good"), "RSI_MACD");
        assert_eq!(parse_suggestion("Bollinger squeeze"), "BOLLINGER_BREAKOUT");
        assert_eq!(parse_suggestion("momentum play"), "BREAKOUT_MOMENTUM");
        assert_eq!(parse_suggestion("revert to the mean"), "MEAN_REVERSION");
    }

    #[test]
    fn spaced_and_hyphenated_names_match_exactly() {
        assert_eq!(parse_suggestion("Mean Reversion"), "MEAN_REVERSION");
        assert_eq!(parse_suggestion("mean-reversion"), "MEAN_REVERSION");
        assert_eq!(parse_suggestion("Bollinger Breakout"), "BOLLINGER_BREAKOUT");
        assert_eq!(parse_suggestion("EMA cross"), "EMA_CROSS");
        assert_eq!(parse_suggestion("Breakout-Momentum."), "BREAKOUT_MOMENTUM");
    }

    #[test]
    fn keywords_do_not_match_inside_longer_words() {
        // "REVERSION" contains "RSI", "CROSSOVER" contains "CROSS"
        assert_eq!(parse_suggestion("favour reversion here"), "MEAN_REVERSION");
        assert_eq!(parse_suggestion("crossover"), "crossover");
    }

    #[test]
    fn unmatched_reply_is_returned_raw() {
        assert_eq!(parse_suggestion("  SCALPING \n"), "SCALPING");
        assert_eq!(StrategyName::coerce(&parse_suggestion("")), StrategyName::EmaCross);
    }

    #[test]
    fn prompt_lists_indicators_and_every_strategy() {
        let market = MarketSnapshot::new("BTCUSDT", dec!(45000));
        let indicators = IndicatorSnapshot::new()
            .with(IndicatorSnapshot::RSI, 65.0)
            .with(IndicatorSnapshot::EMA_FAST, 44800.0);
        let prompt = analysis_prompt(&market, &indicators);

        assert!(prompt.contains("Current Price: 45000"));
        assert!(prompt.contains("Volume: N/A"));
        assert!(prompt.contains("24h Change: N/A"));
        assert!(prompt.contains("- RSI: 65.0000"));
        assert!(prompt.contains("- EMA Slow (26): N/A"));
        for name in StrategyName::ALL {
            assert!(prompt.contains(name.as_str()), "missing {name}");
        }
        assert!(system_prompt().contains("EMA_CROSS, RSI_MACD"));
    }

    #[test]
    fn prompt_includes_24h_stats_when_known() {
        let market = MarketSnapshot::new("BTCUSDT", dec!(45000)).with_stats(MarketStats {
            volume: dec!(1000000),
            change_24h_pct: dec!(2.5),
        });
        let prompt = analysis_prompt(&market, &IndicatorSnapshot::new());
        assert!(prompt.contains("Volume: 1000000"));
        assert!(prompt.contains("24h Change: 2.5%"));
    }

    #[test]
    fn completion_content_is_extracted() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":" EMA_CROSS\n"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "EMA_CROSS");
    }

    #[test]
    fn empty_completion_is_an_advisor_error() {
        assert!(matches!(extract_content(r#"{"choices":[]}"#), Err(Error::Advisor(_))));
        assert!(matches!(extract_content("not json"), Err(Error::Advisor(_))));
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(matches!(
            GptAdvisor::new("  ", "gpt-4", "https://api.openai.com/v1"),
            Err(Error::Config(_))
        ));
    }
}
