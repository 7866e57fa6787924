//! The two storage tiers.
//!
//! The durable partition survives restarts and holds the session map and the
//! current-session pointer. The ephemeral partition holds screenshot payloads
//! and is gone when the process ends.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::Database;

#[async_trait]
pub trait DurablePartition: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// All entries are written together or not at all.
    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()>;
}

#[async_trait]
pub trait EphemeralPartition: Send + Sync {
    async fn set(&self, key: &str, payload: String) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn remove(&self, keys: &[String]) -> Result<()>;
}

#[async_trait]
impl DurablePartition for Database {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.get_entries(keys).await
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.set_entries(entries).await
    }
}

/// Process-lifetime screenshot store.
#[derive(Default)]
pub struct MemoryEphemeral {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryEphemeral {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl EphemeralPartition for MemoryEphemeral {
    async fn set(&self, key: &str, payload: String) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), payload);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}
