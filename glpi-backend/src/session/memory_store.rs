//! In-process session store for tests and Redis-less local runs.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{SessionStore, UserSession, fields, now_unix};

#[derive(Default)]
pub struct MemorySessionStore {
    records: DashMap<String, HashMap<String, String>>,
    closed: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), String> {
        if self.closed.load(Ordering::Acquire) {
            Err("Session store is closed".to_string())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_field(&self, user_id: &str, field: &str) -> Result<Option<String>, String> {
        self.ensure_open()?;
        Ok(self
            .records
            .get(user_id)
            .and_then(|record| record.get(field).cloned()))
    }

    async fn set_field(&self, user_id: &str, field: &str, value: &str) -> Result<(), String> {
        self.ensure_open()?;
        self.records
            .entry(user_id.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn set_record(&self, user_id: &str, record: &[(String, String)]) -> Result<(), String> {
        self.ensure_open()?;
        let now = now_unix().to_string();
        // one entry guard: readers see all of it or none of it
        let mut entry = self.records.entry(user_id.to_string()).or_default();
        for (field, value) in record {
            entry.insert(field.clone(), value.clone());
        }
        entry
            .entry(fields::CREATED.to_string())
            .or_insert_with(|| now.clone());
        entry.insert(fields::MODIFIED.to_string(), now);
        Ok(())
    }

    async fn get_record(&self, user_id: &str) -> Result<Option<UserSession>, String> {
        self.ensure_open()?;
        Ok(self
            .records
            .get(user_id)
            .map(|record| UserSession::from_fields(user_id, record.clone())))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
