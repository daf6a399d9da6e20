use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use advisor::GptAdvisor;
use common::{Config, TradingEvent, TradingMode};
use engine::{BinanceFuturesClient, Engine, TradeExecutor};
use paper::PaperBroker;
use risk::{FractionalRiskManager, RiskConfig, RiskManager};
use strategy::{StrategyFileConfig, StrategyRegistry, StrategySelector, TechnicalIndicators};
use telegram_notify::TelegramNotifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let trading = StrategyFileConfig::load(&cfg.trading_config_path)
        .with_context(|| format!("loading {}", cfg.trading_config_path))?;
    let risk_cfg = RiskConfig::load(&cfg.trading_config_path)
        .with_context(|| format!("loading [risk] from {}", cfg.trading_config_path))?;
    info!(mode = %cfg.trading_mode, symbol = %trading.symbol, "Autotrader starting");

    // ── Exchange gateway ──────────────────────────────────────────────────────
    // Paper mode still reads prices, balances and klines from the real venue.
    let binance = Arc::new(BinanceFuturesClient::new(
        &cfg.binance_api_key,
        &cfg.binance_secret,
        &cfg.binance_futures_url,
    )?);

    // ── Risk manager, fed by balance changes ──────────────────────────────────
    let (capital_tx, capital_rx) = watch::channel(Decimal::ZERO);
    let risk: Arc<dyn RiskManager> = Arc::new(FractionalRiskManager::new(risk_cfg, capital_rx)?);

    // ── Trade executor (venue chosen by TRADING_MODE) ─────────────────────────
    let executor = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode: orders go to Binance futures");
            TradeExecutor::live(binance.clone(), risk)
        }
        TradingMode::Paper => {
            let slippage = Decimal::try_from(cfg.paper_slippage_bps)
                .context("PAPER_SLIPPAGE_BPS is not a finite number")?;
            info!(slippage_bps = %slippage, "Paper trading mode: fills are simulated");
            TradeExecutor::paper(binance.clone(), risk, PaperBroker::new(slippage))
        }
    }
    .with_settle_delay(Duration::from_millis(trading.settle_delay_ms));

    // ── Indicators and strategy selection ─────────────────────────────────────
    let indicators = Arc::new(TechnicalIndicators::new(binance.clone(), &trading.indicators)?);
    let registry = Arc::new(StrategyRegistry::new());
    let mut selector = StrategySelector::new(registry, trading.default_strategy);
    match &cfg.openai_api_key {
        Some(key) => {
            let gpt = GptAdvisor::new(key.as_str(), cfg.openai_model.as_str(), cfg.openai_base_url.as_str())?;
            selector =
                selector.with_advisor(Arc::new(gpt), Duration::from_secs(cfg.advisor_timeout_secs));
        }
        None => info!(
            strategy = %trading.default_strategy,
            "OPENAI_API_KEY not set, using configured default strategy"
        ),
    }
    info!(advisor = selector.has_advisor(), "Strategy selector ready");

    // ── Notifications ─────────────────────────────────────────────────────────
    let notifier = match (&cfg.telegram_token, cfg.telegram_chat_ids.is_empty()) {
        (Some(token), false) => Some(TelegramNotifier::new(token.as_str(), &cfg.telegram_chat_ids)),
        _ => {
            info!("Telegram notifications disabled");
            None
        }
    };

    let (event_tx, mut event_rx) = mpsc::channel::<TradingEvent>(128);
    let forwarder = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(event = ?event, "Trading event");
            if let Some(notifier) = &notifier {
                notifier.notify(&event).await;
            }
        }
    });

    // ── Engine ────────────────────────────────────────────────────────────────
    let (engine, handle) = Engine::new(
        trading.symbol.clone(),
        Duration::from_secs(trading.cycle_interval_secs),
        binance,
        indicators,
        selector,
        executor,
        event_tx,
    );
    let engine_task = tokio::spawn(engine.with_capital_feed(capital_tx).run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received, finishing current cycle");

    handle.shutdown();
    engine_task.await?;
    forwarder.await?;

    info!("Autotrader stopped");
    Ok(())
}
