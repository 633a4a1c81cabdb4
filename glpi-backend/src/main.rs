use dotenv::dotenv;
use std::sync::Arc;

mod access;
mod bot;
mod channels;
mod config;
mod dispatch;
mod documents;
mod error;
mod glpi;
mod pagination;
mod pending;
mod session;
#[cfg(test)]
mod testing;

use access::AccessList;
use bot::{BotContext, BotSettings};
use channels::telegram::{self, TelegramPrompter};
use config::{Config, SessionBackend};
use dispatch::CallDispatcher;
use glpi::GlpiClient;
use session::{MemorySessionStore, RedisSessionStore, SessionStore};

#[tokio::main]
async fn main() -> Result<(), String> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    let store = open_session_store(&config).await?;

    let gateway = GlpiClient::new(
        &config.glpi.base_url,
        &config.glpi.username,
        &config.glpi.password,
        config.glpi.call_timeout,
    )?;
    log::info!("GLPI webservice at {}", gateway.service_url());

    let bot = telegram::build_bot(&config)?;
    let bot_username = telegram::bot_username(&bot).await?;

    let dispatcher = Arc::new(CallDispatcher::new(
        store.clone(),
        Arc::new(gateway),
        Arc::new(TelegramPrompter::new(bot.clone(), bot_username.clone())),
        config.glpi.auth_fault_code,
    ));
    let ctx = Arc::new(BotContext::new(
        dispatcher,
        AccessList::new(config.allowed_users.iter().cloned()),
        BotSettings::from_config(&config, &bot_username),
    ));
    log::info!(
        "Serving {} allowed Telegram users, {} tickets per page",
        ctx.access.len(),
        ctx.settings.page_size
    );

    let listener = channels::start_telegram(bot, ctx);

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
    }
    log::info!("Shutting down");

    let result = listener.stop().await;
    store.close().await;
    result
}

async fn open_session_store(config: &Config) -> Result<Arc<dyn SessionStore>, String> {
    match config.session_store {
        SessionBackend::Redis => {
            log::info!(
                "Connecting to session store at {}:{}",
                config.redis_host,
                config.redis_port
            );
            let store = RedisSessionStore::connect(&config.redis_url()).await?;
            if !store.ping().await {
                log::warn!("Session store did not answer PING, sessions may be unavailable");
            }
            Ok(Arc::new(store))
        }
        SessionBackend::Memory => {
            log::warn!("Sessions are kept in memory and will not survive a restart");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}
