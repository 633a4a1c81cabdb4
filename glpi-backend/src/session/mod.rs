//! Per-user GLPI session records.
//!
//! One hash per Telegram user id holding the GLPI session token, the GLPI
//! profile returned at login and the Telegram profile. The store is the only
//! source of truth for "is this user logged in"; nothing caches tokens.

mod memory_store;
mod redis_store;

pub use memory_store::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

/// Hash field names
pub mod fields {
    pub const SESSION: &str = "glpi_session";
    pub const LOGIN_NAME: &str = "glpi_name";
    pub const GLPI_ID: &str = "glpi_id";
    pub const CREATED: &str = "created";
    pub const MODIFIED: &str = "modified";
}

/// Snapshot of one user's record
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub chat_user_id: String,
    pub remote_session_token: Option<String>,
    pub display_name: Option<String>,
    pub remote_user_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub fields: HashMap<String, String>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn timestamp(value: Option<&String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

impl UserSession {
    pub fn from_fields(chat_user_id: &str, fields: HashMap<String, String>) -> Self {
        Self {
            chat_user_id: chat_user_id.to_string(),
            remote_session_token: non_empty(fields.get(fields::SESSION)),
            display_name: non_empty(fields.get(fields::LOGIN_NAME)),
            remote_user_id: non_empty(fields.get(fields::GLPI_ID)),
            created_at: timestamp(fields.get(fields::CREATED)),
            modified_at: timestamp(fields.get(fields::MODIFIED)),
            fields,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.remote_session_token.is_some()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read one field; unknown users and fields are `None`
    async fn get_field(&self, user_id: &str, field: &str) -> Result<Option<String>, String>;

    /// Write one field, last write wins
    async fn set_field(&self, user_id: &str, field: &str, value: &str) -> Result<(), String>;

    /// Bulk upsert used at login: all fields plus `created` (only when absent)
    /// and `modified` are applied as one atomic unit
    async fn set_record(&self, user_id: &str, fields: &[(String, String)]) -> Result<(), String>;

    /// Whole record, `None` for unknown users
    async fn get_record(&self, user_id: &str) -> Result<Option<UserSession>, String>;

    /// End of lifecycle; later operations fail
    async fn close(&self);

    /// Current GLPI session token. An empty token (after logout) is absent.
    async fn session_token(&self, user_id: &str) -> Result<Option<String>, String> {
        Ok(self
            .get_field(user_id, fields::SESSION)
            .await?
            .filter(|t| !t.is_empty()))
    }

    /// Last known GLPI login name, used to pre-fill the login prompt
    async fn login_name(&self, user_id: &str) -> Result<Option<String>, String> {
        Ok(self
            .get_field(user_id, fields::LOGIN_NAME)
            .await?
            .filter(|n| !n.is_empty()))
    }

    /// Logout keeps the record and blanks the token
    async fn clear_session(&self, user_id: &str) -> Result<(), String> {
        self.set_field(user_id, fields::SESSION, "").await
    }
}

pub(crate) fn now_unix() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_session_from_fields() {
        let mut raw = HashMap::new();
        raw.insert(fields::SESSION.to_string(), "tok".to_string());
        raw.insert(fields::LOGIN_NAME.to_string(), "ivanov".to_string());
        raw.insert(fields::GLPI_ID.to_string(), "42".to_string());
        raw.insert(fields::CREATED.to_string(), "1700000000".to_string());
        let session = UserSession::from_fields("100", raw);
        assert!(session.is_logged_in());
        assert_eq!(session.display_name.as_deref(), Some("ivanov"));
        assert_eq!(session.remote_user_id.as_deref(), Some("42"));
        assert_eq!(session.created_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(session.modified_at, None);
    }

    #[test]
    fn test_blank_token_is_logged_out() {
        let mut raw = HashMap::new();
        raw.insert(fields::SESSION.to_string(), String::new());
        assert!(!UserSession::from_fields("1", raw).is_logged_in());
    }
}
