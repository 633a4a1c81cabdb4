pub mod telegram;
pub mod types;
pub mod util;

pub use types::ChannelHandle;

use std::sync::Arc;
use teloxide::Bot;
use tokio::sync::oneshot;

use crate::bot::BotContext;

/// Start the Telegram listener in the background
pub fn start_telegram(bot: Bot, ctx: Arc<BotContext>) -> ChannelHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let result = telegram::start_telegram_listener(bot, ctx, shutdown_rx).await;
        if let Err(e) = &result {
            log::error!("Telegram listener error: {}", e);
        }
        result
    });
    ChannelHandle::new("Telegram", shutdown_tx, task)
}
