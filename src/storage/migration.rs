//! One-time rewrite of legacy inline-image steps into the partitioned form.

use anyhow::Result;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{screenshot_key, Storage};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationPhase {
    Pending,
    Done,
    Failed,
}

/// Serialises migration runs. Concurrent callers queue on the lock and observe
/// the outcome of the single run; a failed run stays failed until
/// [`MigrationGate::rearm`] is called.
pub(crate) struct MigrationGate {
    phase: Mutex<MigrationPhase>,
}

impl MigrationGate {
    pub(crate) fn new() -> Self {
        Self {
            phase: Mutex::new(MigrationPhase::Pending),
        }
    }

    pub(crate) async fn ensure(&self, storage: &Storage) {
        let mut phase = self.phase.lock().await;
        if *phase != MigrationPhase::Pending {
            return;
        }
        *phase = match storage.migrate().await {
            Ok(report) => {
                if report.migrated > 0 || report.failed > 0 {
                    log_info!(
                        "screenshot migration moved {} step(s), {} left inline",
                        report.migrated,
                        report.failed
                    );
                }
                MigrationPhase::Done
            }
            Err(err) => {
                log_error!("screenshot migration failed: {err:#}");
                MigrationPhase::Failed
            }
        };
    }

    pub(crate) async fn rearm(&self) {
        let mut phase = self.phase.lock().await;
        if *phase == MigrationPhase::Failed {
            *phase = MigrationPhase::Pending;
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Steps rewritten to reference the ephemeral partition.
    pub migrated: usize,
    /// Steps whose payload could not be moved and stay inline for now.
    pub failed: usize,
}

impl Storage {
    /// Moves every inline screenshot into the ephemeral partition and drops it
    /// from the durable record. Durable storage is only written when at least
    /// one step changed, which makes a second run a no-op.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let _guard = self.writes.lock().await;
        let mut sessions = self.read_state().await?.sessions;
        let mut report = MigrationReport::default();
        if !sessions
            .values()
            .flat_map(|session| session.steps.iter())
            .any(|step| step.is_legacy_inline())
        {
            return Ok(report);
        }

        for session in sessions.values_mut() {
            for step in session.steps.iter_mut() {
                let Some(inline) = step.screenshot.clone() else {
                    continue;
                };

                let key = match step.screenshot_key.clone() {
                    Some(key) => {
                        let present = matches!(self.ephemeral.get(&key).await, Ok(Some(_)));
                        if !present {
                            if let Err(err) = self.ephemeral.set(&key, inline).await {
                                log_warn!("legacy screenshot store failed for {key}: {err:#}");
                                report.failed += 1;
                                continue;
                            }
                        }
                        key
                    }
                    None => {
                        if step.id.is_empty() {
                            step.id = Uuid::new_v4().to_string();
                        }
                        let key = screenshot_key(&step.id);
                        if let Err(err) = self.ephemeral.set(&key, inline).await {
                            log_warn!("legacy screenshot store failed for {key}: {err:#}");
                            report.failed += 1;
                            continue;
                        }
                        key
                    }
                };

                step.screenshot_key = Some(key);
                step.screenshot = None;
                report.migrated += 1;
            }
        }

        if report.migrated > 0 {
            self.write_sessions(&sessions).await?;
        }

        Ok(report)
    }
}
