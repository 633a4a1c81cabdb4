use std::env;
use std::path::PathBuf;
use std::time::Duration;
use strum::{AsRefStr, EnumString};

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const BOT_TOKEN: &str = "BOT_TOKEN";
    pub const BOT_USERS_CHAT_ID: &str = "BOT_USERS_CHAT_ID";
    pub const BOT_PROXY_URL: &str = "BOT_PROXY_URL";
    pub const BOT_PAGE_SIZE: &str = "BOT_PAGE_SIZE";
    pub const API_BASE: &str = "API_BASE";
    pub const API_USER: &str = "API_USER";
    pub const API_PASS: &str = "API_PASS";
    pub const SESSION_STORE: &str = "SESSION_STORE";
    pub const REDIS_HOST: &str = "REDIS_HOST";
    pub const REDIS_PORT: &str = "REDIS_PORT";
    pub const DOCS_TMP_PATH: &str = "DOCS_TMP_PATH";
    pub const LOGIN_THUMB_URL: &str = "LOGIN_THUMB_URL";
    // GLPI deployment specifics
    pub const AUTH_FAULT_CODE: &str = "GLPI_AUTH_FAULT_CODE";
    pub const EXCLUDED_ENTITIES: &str = "GLPI_EXCLUDED_ENTITIES";
    pub const CALL_TIMEOUT_SECS: &str = "GLPI_CALL_TIMEOUT_SECS";
}

/// Default values
pub mod defaults {
    pub const REDIS_HOST: &str = "127.0.0.1";
    pub const REDIS_PORT: u16 = 6379;
    pub const DOCS_TMP_PATH: &str = "./docs_tmp";
    /// Fault code the webservices plugin returns for an invalid or expired session.
    pub const AUTH_FAULT_CODE: i64 = 13;
    pub const EXCLUDED_ENTITIES: &str = "12,13,14,15";
    pub const CALL_TIMEOUT_SECS: u64 = 30;
    pub const PAGE_SIZE: usize = 5;
}

/// Where per-user session records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionBackend {
    #[default]
    Redis,
    /// Process memory, lost on restart
    Memory,
}

/// Split a comma-separated list, trimming blanks
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn required(name: &str) -> Result<String, String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{} must be set", name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_backend(raw: &str) -> Result<SessionBackend, String> {
    raw.parse().map_err(|_| {
        format!(
            "{} must be 'redis' or 'memory', got '{}'",
            env_vars::SESSION_STORE,
            raw
        )
    })
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("{} must be a valid number, got '{}'", name, raw)),
        None => Ok(default),
    }
}

/// Remote GLPI service settings
#[derive(Clone, Debug)]
pub struct GlpiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub auth_fault_code: i64,
    pub excluded_entities: Vec<String>,
    pub call_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub allowed_users: Vec<String>,
    pub proxy_url: Option<String>,
    pub page_size: usize,
    pub login_thumb_url: Option<String>,
    pub session_store: SessionBackend,
    pub redis_host: String,
    pub redis_port: u16,
    pub docs_tmp_path: PathBuf,
    pub glpi: GlpiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let page_size = parsed_or(env_vars::BOT_PAGE_SIZE, defaults::PAGE_SIZE)?;
        if page_size == 0 {
            return Err(format!("{} must be greater than zero", env_vars::BOT_PAGE_SIZE));
        }

        let allowed_users = optional(env_vars::BOT_USERS_CHAT_ID)
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();
        if allowed_users.is_empty() {
            log::warn!(
                "{} is empty, every Telegram user will be refused",
                env_vars::BOT_USERS_CHAT_ID
            );
        }

        let session_store = match optional(env_vars::SESSION_STORE) {
            Some(raw) => parse_backend(&raw)?,
            None => SessionBackend::default(),
        };

        let glpi = GlpiConfig {
            base_url: required(env_vars::API_BASE)?
                .trim_end_matches('/')
                .to_string(),
            username: optional(env_vars::API_USER).unwrap_or_default(),
            password: optional(env_vars::API_PASS).unwrap_or_default(),
            auth_fault_code: parsed_or(env_vars::AUTH_FAULT_CODE, defaults::AUTH_FAULT_CODE)?,
            excluded_entities: parse_list(
                &optional(env_vars::EXCLUDED_ENTITIES)
                    .unwrap_or_else(|| defaults::EXCLUDED_ENTITIES.to_string()),
            ),
            call_timeout: Duration::from_secs(parsed_or(
                env_vars::CALL_TIMEOUT_SECS,
                defaults::CALL_TIMEOUT_SECS,
            )?),
        };

        Ok(Self {
            bot_token: required(env_vars::BOT_TOKEN)?,
            allowed_users,
            proxy_url: optional(env_vars::BOT_PROXY_URL),
            page_size,
            login_thumb_url: optional(env_vars::LOGIN_THUMB_URL),
            session_store,
            redis_host: optional(env_vars::REDIS_HOST)
                .unwrap_or_else(|| defaults::REDIS_HOST.to_string()),
            redis_port: parsed_or(env_vars::REDIS_PORT, defaults::REDIS_PORT)?,
            docs_tmp_path: PathBuf::from(
                optional(env_vars::DOCS_TMP_PATH)
                    .unwrap_or_else(|| defaults::DOCS_TMP_PATH.to_string()),
            ),
            glpi,
        })
    }

    /// Redis URL for the session store, always database 0
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/0", self.redis_host, self.redis_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_skips_blanks() {
        assert_eq!(parse_list(" 1, 2,,3 "), vec!["1", "2", "3"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_default_excluded_entities() {
        assert_eq!(
            parse_list(defaults::EXCLUDED_ENTITIES),
            vec!["12", "13", "14", "15"]
        );
    }

    #[test]
    fn test_redis_url_uses_database_zero() {
        let config = Config {
            bot_token: "t".to_string(),
            allowed_users: vec![],
            proxy_url: None,
            page_size: 5,
            login_thumb_url: None,
            session_store: SessionBackend::Redis,
            redis_host: "redis.local".to_string(),
            redis_port: 6380,
            docs_tmp_path: PathBuf::from("/tmp/docs"),
            glpi: GlpiConfig {
                base_url: "http://glpi".to_string(),
                username: String::new(),
                password: String::new(),
                auth_fault_code: 13,
                excluded_entities: vec![],
                call_timeout: Duration::from_secs(30),
            },
        };
        assert_eq!(config.redis_url(), "redis://redis.local:6380/0");
    }

    #[test]
    fn test_parse_session_backend() {
        assert_eq!(parse_backend("redis"), Ok(SessionBackend::Redis));
        assert_eq!(parse_backend("Memory"), Ok(SessionBackend::Memory));
        assert!(parse_backend("sqlite").unwrap_err().contains("SESSION_STORE"));
        assert_eq!(SessionBackend::default().as_ref(), "redis");
    }
}
