//! Redis-backed session store.
//!
//! One hash per Telegram user id in database 0. The multiplexed connection is
//! opened at startup and dropped by `close()` at shutdown.

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;

use super::{SessionStore, UserSession, fields, now_unix};

pub struct RedisSessionStore {
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisSessionStore {
    /// Open the client and the shared multiplexed connection.
    pub async fn connect(url: &str) -> Result<Self, String> {
        let client = redis::Client::open(url)
            .map_err(|e| format!("Failed to create Redis client: {}", e))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| format!("Redis connection error: {}", e))?;
        log::info!("Session: connected to Redis at {}", url);
        Ok(Self {
            connection: RwLock::new(Some(connection)),
        })
    }

    /// Clone of the shared connection. The lock is never held across an await.
    fn conn(&self) -> Result<MultiplexedConnection, String> {
        self.connection
            .read()
            .clone()
            .ok_or_else(|| "Session store is closed".to_string())
    }

    /// Check if Redis is reachable.
    pub async fn ping(&self) -> bool {
        match self.conn() {
            Ok(mut conn) => redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_field(&self, user_id: &str, field: &str) -> Result<Option<String>, String> {
        let mut conn = self.conn()?;
        let value: Option<String> = conn
            .hget(user_id, field)
            .await
            .map_err(|e| format!("Redis HGET error: {}", e))?;
        log::debug!("Session: {}: {{{}: {:?}}}", user_id, field, value);
        Ok(value)
    }

    async fn set_field(&self, user_id: &str, field: &str, value: &str) -> Result<(), String> {
        let mut conn = self.conn()?;
        conn.hset::<_, _, _, ()>(user_id, field, value)
            .await
            .map_err(|e| format!("Redis HSET error: {}", e))?;
        log::debug!("Session: {}: {{{}: set}}", user_id, field);
        Ok(())
    }

    async fn set_record(&self, user_id: &str, record: &[(String, String)]) -> Result<(), String> {
        let mut conn = self.conn()?;
        let now = now_unix();

        let mut pipe = redis::pipe();
        pipe.atomic();
        if !record.is_empty() {
            pipe.hset_multiple(user_id, record).ignore();
        }
        pipe.hset_nx(user_id, fields::CREATED, now).ignore();
        pipe.hset(user_id, fields::MODIFIED, now).ignore();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| format!("Redis MULTI/EXEC error: {}", e))?;

        log::debug!("Session: {}: stored {} fields", user_id, record.len());
        Ok(())
    }

    async fn get_record(&self, user_id: &str) -> Result<Option<UserSession>, String> {
        let mut conn = self.conn()?;
        let raw: HashMap<String, String> = conn
            .hgetall(user_id)
            .await
            .map_err(|e| format!("Redis HGETALL error: {}", e))?;
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(UserSession::from_fields(user_id, raw)))
    }

    async fn close(&self) {
        if self.connection.write().take().is_some() {
            log::info!("Session: Redis connection closed");
        }
    }
}
