//! Inline-query login: `@bot <login> <password> login`.

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::types::User;

use super::BotContext;
use super::menus::NOT_ALLOWED;
use crate::glpi;

static LOGIN_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+)\s+(\S+)\s+(?i:login)\s*$").unwrap());

pub const LOGIN_FAILED: &str = "Login failed";

/// The single article answering a login query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginArticle {
    pub id: &'static str,
    pub title: String,
    pub description: String,
    /// Sent to the chat when the user taps the article
    pub message_text: String,
}

/// Telegram profile stored next to the GLPI session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl From<&User> for TelegramProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            language_code: user.language_code.clone(),
        }
    }
}

impl TelegramProfile {
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.clone()),
            ("first_name".to_string(), self.first_name.clone()),
        ];
        let optional = [
            ("last_name", &self.last_name),
            ("username", &self.username),
            ("language_code", &self.language_code),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                fields.push((name.to_string(), value.clone()));
            }
        }
        fields
    }
}

/// `(login, password)` from a login query
pub fn parse_login_query(query: &str) -> Option<(String, String)> {
    LOGIN_QUERY
        .captures(query)
        .map(|c| (c[1].to_string(), c[2].to_string()))
}

/// Answer an inline query. `None` when the query is not a login query yet
/// (the user is still typing).
pub async fn inline_login(
    ctx: &BotContext,
    profile: &TelegramProfile,
    query: &str,
) -> Option<LoginArticle> {
    let (login_name, login_password) = parse_login_query(query)?;

    if ctx.access.check(&profile.id).is_err() {
        return Some(LoginArticle {
            id: "321",
            title: NOT_ALLOWED.to_string(),
            description: "Чужие не поймут".to_string(),
            message_text: "Доступ запрещен".to_string(),
        });
    }

    let failed = |description: String| LoginArticle {
        id: "123",
        title: "Вход в GLPI".to_string(),
        description,
        message_text: LOGIN_FAILED.to_string(),
    };

    let dispatcher = &ctx.dispatcher;
    let gateway = dispatcher.gateway();
    let info = match glpi::connect(gateway.as_ref(), &login_name, &login_password).await {
        Ok(info) => info,
        Err(e) => {
            log::warn!("GLPI: login of {} as {} failed: {}", profile.id, login_name, e);
            return Some(failed(LOGIN_FAILED.to_string()));
        }
    };

    let mut record = profile.fields();
    record.extend(info.session_fields());
    if let Err(e) = dispatcher.store().set_record(&profile.id, &record).await {
        log::error!("Session: failed to store login of {}: {}", profile.id, e);
        return Some(failed(LOGIN_FAILED.to_string()));
    }
    log::info!("GLPI: {} logged in as {} (id {})", profile.id, info.name, info.id);

    Some(LoginArticle {
        id: "123",
        title: "Вход в GLPI".to_string(),
        description: format!("Привет, {}!", info.firstname),
        message_text: "/menu".to_string(),
    })
}
