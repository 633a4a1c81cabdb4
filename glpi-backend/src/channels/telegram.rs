use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, ForceReply, InlineQueryResult, InlineQueryResultArticle, InputFile,
    InputMessageContent, InputMessageContentText, MessageId, ParseMode,
};
use teloxide::{ApiError, RequestError};
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;

use crate::bot::handlers::{self, FileSource};
use crate::bot::login::{self, TelegramProfile};
use crate::bot::{BotContext, Outgoing, Screen, TextFormat, menus};
use crate::channels::util;
use crate::config::Config;
use crate::dispatch::{ChatOrigin, ReauthPrompter};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const INLINE_CACHE_SECS: u32 = 10;

/// Bot client, through the configured proxy if any
pub fn build_bot(config: &Config) -> Result<Bot, String> {
    let Some(proxy_url) = config.proxy_url.as_deref() else {
        return Ok(Bot::new(&config.bot_token));
    };
    let proxy = reqwest::Proxy::all(proxy_url)
        .map_err(|e| format!("Invalid Telegram proxy {}: {}", proxy_url, e))?;
    let client = teloxide::net::default_reqwest_settings()
        .proxy(proxy)
        .build()
        .map_err(|e| format!("Failed to build Telegram HTTP client: {}", e))?;
    log::info!("Telegram: using proxy {}", proxy_url);
    Ok(Bot::with_client(&config.bot_token, client))
}

/// Validate the token and return the bot's username
pub async fn bot_username(bot: &Bot) -> Result<String, String> {
    log::info!("Telegram: Validating bot token...");
    match bot.get_me().await {
        Ok(me) => {
            log::info!(
                "Telegram: Bot validated - username: @{}, id: {}",
                me.username(),
                me.id
            );
            Ok(me.username().to_string())
        }
        Err(e) => {
            let error = format!("Invalid Telegram bot token: {}", e);
            log::error!("Telegram: {}", error);
            Err(error)
        }
    }
}

#[allow(deprecated)]
fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Html => Some(ParseMode::Html),
        TextFormat::Markdown => Some(ParseMode::Markdown),
    }
}

async fn send_screen(bot: &Bot, chat_id: ChatId, screen: Screen) -> Result<(), RequestError> {
    let text = util::truncate(&screen.text, util::MAX_MESSAGE_LEN);
    let mut request = bot.send_message(chat_id, text);
    if let Some(mode) = parse_mode(screen.format) {
        request = request.parse_mode(mode);
    }
    if let Some(keyboard) = screen.keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await.map(|_| ())
}

/// Replace a bot message; falls back to a new message when it can't be edited
async fn edit_screen(
    bot: &Bot,
    chat_id: ChatId,
    message_id: i32,
    screen: Screen,
) -> Result<(), RequestError> {
    let mut request = bot.edit_message_text(
        chat_id,
        MessageId(message_id),
        util::truncate(&screen.text, util::MAX_MESSAGE_LEN),
    );
    if let Some(mode) = parse_mode(screen.format) {
        request = request.parse_mode(mode);
    }
    if let Some(keyboard) = screen.keyboard.clone() {
        request = request.reply_markup(keyboard);
    }
    match request.await {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => {
            log::warn!(
                "Telegram: Failed to edit message {} in chat {}, sending instead: {}",
                message_id,
                chat_id,
                e
            );
            send_screen(bot, chat_id, screen).await
        }
    }
}

async fn send_file(bot: &Bot, chat_id: ChatId, path: &Path, caption: &str, as_photo: bool) {
    if as_photo {
        match bot
            .send_photo(chat_id, InputFile::file(path))
            .caption(caption)
            .await
        {
            Ok(_) => return,
            Err(e) => log::warn!(
                "Telegram: photo {} refused, sending as document: {}",
                path.display(),
                e
            ),
        }
    }
    if let Err(e) = bot
        .send_document(chat_id, InputFile::file(path))
        .caption(caption)
        .await
    {
        log::error!("Telegram: Failed to send document {}: {}", path.display(), e);
    }
}

/// Perform the actions a handler returned, in order
async fn execute(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    user_id: &str,
    outgoing: Vec<Outgoing>,
) {
    for action in outgoing {
        match action {
            Outgoing::Send(screen) => {
                if screen.text.is_empty() {
                    continue;
                }
                if let Err(e) = send_screen(bot, chat_id, screen).await {
                    log::error!("Failed to send Telegram message: {}", e);
                }
            }
            Outgoing::Edit { message_id, screen } => {
                if let Err(e) = edit_screen(bot, chat_id, message_id, screen).await {
                    log::error!("Failed to send Telegram message: {}", e);
                }
            }
            Outgoing::Delete { message_id } => {
                if let Err(e) = bot.delete_message(chat_id, MessageId(message_id)).await {
                    log::warn!("Telegram: Failed to delete message {}: {}", message_id, e);
                }
            }
            Outgoing::Prompt { text, action } => {
                match bot
                    .send_message(chat_id, text)
                    .reply_markup(ForceReply::new())
                    .await
                {
                    Ok(sent) => ctx.pending.set(user_id, action, Some(sent.id.0)),
                    Err(e) => log::error!("Telegram: Failed to send prompt to {}: {}", user_id, e),
                }
            }
            Outgoing::UploadingDocument => {
                if let Err(e) = bot
                    .send_chat_action(chat_id, ChatAction::UploadDocument)
                    .await
                {
                    log::debug!("Telegram: chat action failed: {}", e);
                }
            }
            Outgoing::File { document, caption } => {
                send_file(bot, chat_id, &document.path, &caption, document.is_image()).await;
                if let Err(e) = tokio::fs::remove_file(&document.path).await {
                    log::debug!("Documents: {} not removed: {}", document.path.display(), e);
                }
            }
        }
    }
}

/// Shows the login prompt through the bot
pub struct TelegramPrompter {
    bot: Bot,
    bot_username: String,
}

impl TelegramPrompter {
    pub fn new(bot: Bot, bot_username: impl Into<String>) -> Self {
        Self {
            bot,
            bot_username: bot_username.into(),
        }
    }
}

#[async_trait]
impl ReauthPrompter for TelegramPrompter {
    async fn prompt_login(
        &self,
        origin: &ChatOrigin,
        login_hint: Option<&str>,
    ) -> Result<(), String> {
        let screen = menus::reauth_screen(&self.bot_username, login_hint);
        let chat_id = ChatId(origin.chat_id);
        let result = match origin.editable_message() {
            Some(message_id) => edit_screen(&self.bot, chat_id, message_id, screen).await,
            None => send_screen(&self.bot, chat_id, screen).await,
        };
        result.map_err(|e| e.to_string())
    }
}

/// A document attached to an incoming message
struct TelegramFile {
    bot: Bot,
    file_id: String,
}

#[async_trait]
impl FileSource for TelegramFile {
    async fn download_to(&self, dest: &Path) -> Result<(), String> {
        let file = self
            .bot
            .get_file(&self.file_id)
            .await
            .map_err(|e| format!("Telegram getFile failed: {}", e))?;
        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| format!("Failed to create {}: {}", dest.display(), e))?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| format!("Telegram download failed: {}", e))?;
        out.flush().await.map_err(|e| e.to_string())
    }
}

async fn on_message(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.to_string();
    let origin = ChatOrigin::new(user_id.clone(), msg.chat.id.0)
        .with_message(msg.id.0, user.is_bot)
        .replying_to(msg.reply_to_message().map(|m| m.id.0));
    log::debug!("Telegram: Received message from {} in chat {}", user_id, msg.chat.id);

    let outgoing = if let Some(doc) = msg.document() {
        let source = TelegramFile {
            bot: bot.clone(),
            file_id: doc.file.id.clone(),
        };
        let file_name = doc.file_name.clone().unwrap_or_default();
        handlers::handle_document(&ctx, &origin, &file_name, msg.caption(), &source).await
    } else if let Some(text) = msg.text() {
        if text.starts_with('/') {
            handlers::handle_command(&ctx, &origin, text).await
        } else {
            handlers::handle_text(&ctx, &origin, text).await
        }
    } else {
        return Ok(());
    };

    execute(&bot, &ctx, msg.chat.id, &user_id, outgoing).await;
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> HandlerResult {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::debug!("Telegram: Failed to answer callback {}: {}", q.id, e);
    }
    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };

    let user_id = q.from.id.to_string();
    // Buttons only ever sit under the bot's own messages
    let origin =
        ChatOrigin::new(user_id.clone(), message.chat.id.0).with_message(message.id.0, true);
    let outgoing = handlers::handle_callback(&ctx, &origin, data).await;
    execute(&bot, &ctx, message.chat.id, &user_id, outgoing).await;
    Ok(())
}

async fn on_inline_query(bot: Bot, q: InlineQuery, ctx: Arc<BotContext>) -> HandlerResult {
    let profile = TelegramProfile::from(&q.from);
    let Some(article) = login::inline_login(&ctx, &profile, &q.query).await else {
        return Ok(());
    };

    let mut result = InlineQueryResultArticle::new(
        article.id,
        article.title,
        InputMessageContent::Text(InputMessageContentText::new(article.message_text)),
    )
    .description(article.description);
    if let Some(thumb) = ctx.settings.login_thumb_url.as_deref() {
        match url::Url::parse(thumb) {
            Ok(thumb) => result = result.thumb_url(thumb),
            Err(e) => log::warn!("Telegram: invalid login thumbnail {}: {}", thumb, e),
        }
    }

    if let Err(e) = bot
        .answer_inline_query(q.id, vec![InlineQueryResult::Article(result)])
        .cache_time(INLINE_CACHE_SECS)
        .is_personal(true)
        .await
    {
        log::error!("Telegram: Failed to answer inline query from {}: {}", profile.id, e);
    }
    Ok(())
}

/// Run the bot until `shutdown_rx` fires
pub async fn start_telegram_listener(
    bot: Bot,
    ctx: Arc<BotContext>,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), String> {
    log::info!("Starting Telegram listener");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
        .branch(Update::filter_inline_query().endpoint(on_inline_query));

    let mut tg_dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .default_handler(|update| async move {
            log::debug!("Telegram: Ignoring update {:?}", update.id);
        })
        .build();

    tokio::select! {
        _ = shutdown_rx => {
            log::info!("Telegram listener received shutdown signal");
        }
        _ = tg_dispatcher.dispatch() => {
            log::info!("Telegram listener stopped");
        }
    }

    Ok(())
}
