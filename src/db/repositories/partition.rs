use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::db::Database;

impl Database {
    /// Reads the requested keys; absent keys are simply missing from the map.
    pub async fn get_entries(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare("SELECT value FROM partition_entries WHERE key = ?1")?;
            let mut entries = HashMap::new();
            for key in keys {
                let raw: Option<String> = stmt
                    .query_row(params![key], |row| row.get(0))
                    .optional()?;
                if let Some(raw) = raw {
                    let value = serde_json::from_str(&raw)
                        .with_context(|| format!("corrupt JSON stored under '{key}'"))?;
                    entries.insert(key, value);
                }
            }
            Ok(entries)
        })
        .await
    }

    /// Writes every entry in one transaction: either all keys change or none do.
    pub async fn set_entries(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now().to_rfc3339();
            for (key, value) in &entries {
                let raw = serde_json::to_string(value)
                    .with_context(|| format!("failed to encode '{key}'"))?;
                tx.execute(
                    "INSERT INTO partition_entries (key, value, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                    updated_at = excluded.updated_at",
                    params![key, raw, now],
                )?;
            }
            tx.commit().context("failed to commit partition write")?;
            Ok(())
        })
        .await
    }
}
