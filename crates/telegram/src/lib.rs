use teloxide::prelude::*;
use tracing::{info, warn};

use common::{TradingEvent, TradingMode};

/// Pushes trading events to a fixed set of Telegram chats.
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_ids: &[i64]) -> Self {
        info!(chats = chat_ids.len(), "Telegram notifier enabled");
        Self {
            bot: Bot::new(token),
            chat_ids: chat_ids.iter().copied().map(ChatId).collect(),
        }
    }

    pub async fn notify(&self, event: &TradingEvent) {
        send_alert(&self.bot, &self.chat_ids, &format_event(event)).await;
    }
}

/// Send a message to every chat. Delivery failures are logged, not returned.
pub async fn send_alert(bot: &Bot, chat_ids: &[ChatId], message: &str) {
    for &chat_id in chat_ids {
        if let Err(e) = bot.send_message(chat_id, message).await {
            warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram alert");
        }
    }
}

/// Plain-text rendering of an event.
pub fn format_event(event: &TradingEvent) -> String {
    match event {
        TradingEvent::BalanceChanged(change) => match change.previous {
            Some(previous) => format!(
                "💰 Balance update\nBalance: {} USDT\nPrevious: {} USDT\nChange: {} USDT",
                change.current,
                previous,
                change.current - previous
            ),
            None => format!("💰 Balance update\nBalance: {} USDT", change.current),
        },
        TradingEvent::TradeExecuted { strategy, outcome } => {
            let tag = match outcome.mode {
                TradingMode::Paper => "[PAPER] ",
                TradingMode::Live => "",
            };
            format!(
                "✅ {tag}{} {}\nStrategy: {strategy}\nQuantity: {}\nPrice: {}\nTrailing stop: {}",
                outcome.action(),
                outcome.symbol(),
                outcome.quantity(),
                outcome.fill_price(),
                outcome.stop_trigger()
            )
        }
        TradingEvent::CycleFailed { symbol, error } => {
            format!("🚨 Cycle failed for {symbol}\n{error}")
        }
    }
}
