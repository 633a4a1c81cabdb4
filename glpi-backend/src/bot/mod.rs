//! Chat-facing behaviour: commands, menu callbacks, inline login and
//! pending replies. Handlers return [`Outgoing`] actions; the Telegram
//! channel executes them.

pub mod callbacks;
pub mod handlers;
pub mod login;
pub mod menus;

use std::path::PathBuf;
use std::sync::Arc;
use teloxide::types::InlineKeyboardMarkup;

use crate::access::AccessList;
use crate::config::Config;
use crate::dispatch::CallDispatcher;
use crate::documents::StagedDocument;
use crate::pending::{PendingAction, PendingReplies};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
    Markdown,
}

/// Text plus optional inline keyboard
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub text: String,
    pub format: TextFormat,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Screen {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Plain,
            keyboard: None,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            format: TextFormat::Html,
            ..Self::plain(text)
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            format: TextFormat::Markdown,
            ..Self::plain(text)
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// One thing to do in the chat the update came from
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Send(Screen),
    /// Replace a bot message in place
    Edit { message_id: i32, screen: Screen },
    Delete { message_id: i32 },
    /// Forced-reply prompt; once sent, `action` becomes the user's pending reply
    Prompt { text: String, action: PendingAction },
    /// "Uploading document…" indicator
    UploadingDocument,
    File {
        document: StagedDocument,
        caption: String,
    },
}

/// Settings the handlers read
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub glpi_base_url: String,
    pub page_size: usize,
    pub excluded_entities: Vec<String>,
    pub docs_tmp_path: PathBuf,
    pub login_thumb_url: Option<String>,
    /// Telegram username of the bot, shown in the login instructions
    pub bot_username: String,
}

impl BotSettings {
    pub fn from_config(config: &Config, bot_username: &str) -> Self {
        Self {
            glpi_base_url: config.glpi.base_url.clone(),
            page_size: config.page_size,
            excluded_entities: config.glpi.excluded_entities.clone(),
            docs_tmp_path: config.docs_tmp_path.clone(),
            login_thumb_url: config.login_thumb_url.clone(),
            bot_username: bot_username.to_string(),
        }
    }
}

/// Everything a handler needs, shared across updates
pub struct BotContext {
    pub dispatcher: Arc<CallDispatcher>,
    pub access: AccessList,
    pub pending: PendingReplies,
    pub settings: BotSettings,
}

impl BotContext {
    pub fn new(dispatcher: Arc<CallDispatcher>, access: AccessList, settings: BotSettings) -> Self {
        Self {
            dispatcher,
            access,
            pending: PendingReplies::new(),
            settings,
        }
    }
}
