//! Storage partition manager.
//!
//! Owns the durable session store and the ephemeral screenshot store. Every
//! mutation goes through [`Storage::modify`], which re-reads the durable state,
//! applies the change and writes the session map back while holding the write
//! guard, so concurrent mutations cannot drop each other's updates.

pub mod migration;
pub mod partitions;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tokio::{sync::Mutex, task::JoinSet};

use crate::models::{Session, SessionMap, Step};

pub use migration::MigrationReport;
pub use partitions::{DurablePartition, EphemeralPartition, MemoryEphemeral};

use migration::MigrationGate;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const SESSIONS_KEY: &str = "sessions";
pub const CURRENT_KEY: &str = "currentSessionId";
pub const SCREENSHOT_PREFIX: &str = "shot:";

pub fn screenshot_key(step_id: &str) -> String {
    format!("{SCREENSHOT_PREFIX}{step_id}")
}

/// Snapshot of the durable partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub sessions: SessionMap,
    pub current_session_id: Option<String>,
}

impl PersistedState {
    pub fn current(&self) -> Option<&Session> {
        self.current_session_id
            .as_ref()
            .and_then(|id| self.sessions.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut Session> {
        let id = self.current_session_id.clone()?;
        self.sessions.get_mut(&id)
    }

    pub fn step_count(&self) -> usize {
        self.current().map(|session| session.steps.len()).unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct Storage {
    durable: Arc<dyn DurablePartition>,
    ephemeral: Arc<dyn EphemeralPartition>,
    migration: Arc<MigrationGate>,
    /// Held across every read-modify-write of the durable partition.
    writes: Arc<Mutex<()>>,
}

impl Storage {
    pub fn new(durable: Arc<dyn DurablePartition>, ephemeral: Arc<dyn EphemeralPartition>) -> Self {
        Self {
            durable,
            ephemeral,
            migration: Arc::new(MigrationGate::new()),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Reads the durable state after making sure the legacy migration has run.
    pub async fn load_state(&self) -> Result<PersistedState> {
        self.migration.ensure(self).await;
        self.read_state().await
    }

    /// Allows a failed migration to run again on the next `load_state`.
    pub async fn retry_migration(&self) {
        self.migration.rearm().await;
    }

    async fn read_state(&self) -> Result<PersistedState> {
        let mut entries = self
            .durable
            .get(&[SESSIONS_KEY, CURRENT_KEY])
            .await
            .context("failed to read durable partition")?;

        let sessions = match entries.remove(SESSIONS_KEY) {
            Some(Value::Null) | None => SessionMap::new(),
            Some(value) => serde_json::from_value(value).context("stored sessions are malformed")?,
        };
        let current_session_id = entries
            .remove(CURRENT_KEY)
            .and_then(|value| value.as_str().map(str::to_string));

        Ok(PersistedState {
            sessions,
            current_session_id,
        })
    }

    async fn write_sessions(&self, sessions: &SessionMap) -> Result<()> {
        let value = serde_json::to_value(sessions).context("failed to encode sessions")?;
        self.durable
            .set(vec![(SESSIONS_KEY.to_string(), value)])
            .await
            .context("failed to write sessions")
    }

    /// Applies `change` to freshly read durable state and writes the session
    /// map back when it changed. Mutations run one at a time; `change` must not
    /// call back into `Storage`.
    pub async fn modify<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut PersistedState) -> Result<T>,
    {
        self.migration.ensure(self).await;
        let _guard = self.writes.lock().await;
        let mut state = self.read_state().await?;
        let before = state.sessions.clone();
        let value = change(&mut state)?;
        if state.sessions != before {
            self.write_sessions(&state.sessions).await?;
        }
        Ok(value)
    }

    /// Creates a session and makes it current in a single durable write.
    pub async fn start_session(&self, article_context: String) -> Result<String> {
        self.migration.ensure(self).await;
        let _guard = self.writes.lock().await;
        let mut state = self.read_state().await?;
        let session = Session::new(Utc::now(), article_context);
        let id = session.id.clone();
        state.sessions.insert(id.clone(), session);

        let sessions = serde_json::to_value(&state.sessions).context("failed to encode sessions")?;
        self.durable
            .set(vec![
                (SESSIONS_KEY.to_string(), sessions),
                (CURRENT_KEY.to_string(), Value::String(id.clone())),
            ])
            .await
            .context("failed to persist new session")?;
        Ok(id)
    }

    /// Sets the description of the step with `step_id`, wherever it lives.
    /// Returns false when the step no longer exists, which happens when a
    /// deletion raced the enrichment.
    pub async fn set_step_description(&self, step_id: &str, text: &str) -> Result<bool> {
        let updated = self
            .set_step_descriptions(&[(step_id.to_string(), text.to_string())])
            .await?;
        Ok(updated == 1)
    }

    /// Applies several descriptions in one mutation. Entries for steps that no
    /// longer exist are skipped; returns how many were applied.
    pub async fn set_step_descriptions(&self, descriptions: &[(String, String)]) -> Result<usize> {
        self.modify(|state| {
            let mut updated = 0;
            for (step_id, text) in descriptions {
                let step = state
                    .sessions
                    .values_mut()
                    .find_map(|session| session.find_step_mut(step_id));
                if let Some(step) = step {
                    step.ai_description = Some(text.clone());
                    updated += 1;
                }
            }
            Ok(updated)
        })
        .await
    }

    pub async fn store_screenshot(&self, step_id: &str, payload: String) -> Result<String> {
        let key = screenshot_key(step_id);
        self.ephemeral
            .set(&key, payload)
            .await
            .with_context(|| format!("failed to store screenshot {key}"))?;
        Ok(key)
    }

    /// Prefers the legacy inline payload, then the ephemeral entry. `None`
    /// means the screenshot is gone (typically the ephemeral entry expired).
    pub async fn get_screenshot(&self, step: &Step) -> Option<String> {
        if let Some(inline) = &step.screenshot {
            return Some(inline.clone());
        }
        let key = step.screenshot_key.as_deref()?;
        match self.ephemeral.get(key).await {
            Ok(payload) => payload,
            Err(err) => {
                log_warn!("screenshot lookup failed for {key}: {err:#}");
                None
            }
        }
    }

    /// Best-effort: a dangling ephemeral entry only wastes memory.
    pub async fn remove_screenshot(&self, step: &Step) {
        let Some(key) = step.screenshot_key.clone() else {
            return;
        };
        match self.ephemeral.remove(std::slice::from_ref(&key)).await {
            Ok(()) => log_debug!("removed screenshot {key}"),
            Err(err) => log_warn!("screenshot removal failed for {key}: {err:#}"),
        }
    }

    /// Removes the screenshots of every step concurrently. Each removal settles
    /// on its own so one stuck or failing delete does not hold back the rest.
    pub async fn remove_screenshots(&self, steps: Vec<Step>) {
        let mut removals = JoinSet::new();
        for step in steps {
            let storage = self.clone();
            removals.spawn(async move { storage.remove_screenshot(&step).await });
        }
        while let Some(result) = removals.join_next().await {
            if let Err(err) = result {
                log_warn!("screenshot removal task failed: {err}");
            }
        }
    }

    pub(crate) async fn discard_screenshot_key(&self, key: &str) -> Result<()> {
        self.ephemeral.remove(&[key.to_string()]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Step;

    async fn sqlite_storage() -> (tempfile::TempDir, Storage, Arc<MemoryEphemeral>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("durable.sqlite3")).unwrap();
        let ephemeral = Arc::new(MemoryEphemeral::new());
        let storage = Storage::new(Arc::new(db), ephemeral.clone());
        (dir, storage, ephemeral)
    }

    #[tokio::test]
    async fn start_session_replaces_current_pointer() {
        let (_dir, storage, _) = sqlite_storage().await;
        let first = storage.start_session("one".into()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = storage.start_session("two".into()).await.unwrap();
        assert_ne!(first, second);

        let state = storage.load_state().await.unwrap();
        assert_eq!(state.current_session_id.as_deref(), Some(second.as_str()));
        assert_eq!(state.sessions.len(), 2);
        assert_eq!(state.current().unwrap().article_context, "two");
    }

    #[tokio::test]
    async fn screenshot_resolution_prefers_inline_then_key() {
        let (_dir, storage, _) = sqlite_storage().await;
        let key = storage.store_screenshot("s1", "data:image/png;base64,AAA".into()).await.unwrap();
        assert_eq!(key, "shot:s1");

        let keyed = Step { id: "s1".into(), screenshot_key: Some(key.clone()), ..Default::default() };
        assert_eq!(storage.get_screenshot(&keyed).await.as_deref(), Some("data:image/png;base64,AAA"));

        let inline = Step {
            id: "s2".into(),
            screenshot: Some("inline".into()),
            screenshot_key: Some(key),
            ..Default::default()
        };
        assert_eq!(storage.get_screenshot(&inline).await.as_deref(), Some("inline"));

        let expired = Step { id: "s3".into(), screenshot_key: Some("shot:s3".into()), ..Default::default() };
        assert_eq!(storage.get_screenshot(&expired).await, None);

        let bare = Step { id: "s4".into(), ..Default::default() };
        assert_eq!(storage.get_screenshot(&bare).await, None);
    }

    #[tokio::test]
    async fn set_step_description_ignores_missing_steps() {
        let (_dir, storage, _) = sqlite_storage().await;
        let session_id = storage.start_session(String::new()).await.unwrap();
        storage
            .modify(|state| {
                let session = state.sessions.get_mut(&session_id).unwrap();
                session.steps.push(Step { id: "keep".into(), ..Default::default() });
                Ok(())
            })
            .await
            .unwrap();

        assert!(storage.set_step_description("keep", "Clicked save").await.unwrap());
        assert!(!storage.set_step_description("gone", "Nothing").await.unwrap());

        let state = storage.load_state().await.unwrap();
        let step = &state.current().unwrap().steps[0];
        assert_eq!(step.ai_description.as_deref(), Some("Clicked save"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_all_land() {
        let (_dir, storage, _) = sqlite_storage().await;
        storage.start_session(String::new()).await.unwrap();

        let mut tasks = JoinSet::new();
        for idx in 0..20 {
            let storage = storage.clone();
            tasks.spawn(async move {
                let id = format!("step-{idx}");
                storage
                    .modify(|state| {
                        let session = state.current_mut().unwrap();
                        session.steps.push(Step { id: id.clone(), ..Default::default() });
                        Ok(())
                    })
                    .await
                    .unwrap();
                storage.set_step_description(&id, "described").await.unwrap()
            });
        }
        while let Some(described) = tasks.join_next().await {
            assert!(described.unwrap());
        }

        let state = storage.load_state().await.unwrap();
        let steps = &state.current().unwrap().steps;
        assert_eq!(steps.len(), 20);
        assert!(steps.iter().all(|step| step.has_description()));
    }
}
