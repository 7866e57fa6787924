use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::host::HostSurface;
use super::state::{CapturePhase, RecordingState};
use crate::annotate::annotate_screenshot;
use crate::enrichment::{prompts::step_context, Enricher};
use crate::error::RecorderError;
use crate::models::{CaptureMeta, Session, SurfaceOrigin, Step};
use crate::settings::SettingsStore;
use crate::storage::Storage;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Owns the recording lifecycle and the step capture transaction.
#[derive(Clone)]
pub struct CaptureController {
    state: Arc<Mutex<RecordingState>>,
    storage: Storage,
    host: Arc<dyn HostSurface>,
    enricher: Enricher,
    settings: Arc<SettingsStore>,
}

impl CaptureController {
    pub fn new(
        storage: Storage,
        host: Arc<dyn HostSurface>,
        enricher: Enricher,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingState::default())),
            storage,
            host,
            enricher,
            settings,
        }
    }

    pub async fn recording_state(&self) -> RecordingState {
        *self.state.lock().await
    }

    /// Starts a fresh session (which becomes current) and begins recording.
    pub async fn start_recording(&self, article_context: String) -> Result<String> {
        let session_id = self.storage.start_session(article_context).await?;
        self.state.lock().await.start();
        log_info!("recording started in session {session_id}");
        self.broadcast(true).await;
        Ok(session_id)
    }

    pub async fn stop_recording(&self) {
        self.state.lock().await.stop();
        log_info!("recording stopped");
        self.broadcast(false).await;
    }

    async fn broadcast(&self, on: bool) {
        if let Err(err) = self.host.broadcast_recording(on).await {
            log_debug!("recording broadcast ignored: {err:#}");
        }
    }

    /// Captures, annotates and records one step, returning its id.
    ///
    /// The call resolves as soon as the step is durably written. Description
    /// enrichment runs afterwards on a detached task.
    pub async fn capture_step(
        &self,
        meta: CaptureMeta,
        origin: Option<SurfaceOrigin>,
    ) -> Result<String> {
        if !self.recording_state().await.is_recording() {
            return Err(RecorderError::NotRecording.into());
        }
        let settings = self.settings.current();
        let mut phase = CapturePhase::Idle;

        advance(&mut phase, CapturePhase::CapturingRaw);
        let target = self
            .host
            .resolve_target(origin.as_ref())
            .await
            .with_context(|| format!("capture failed while {phase}"))?;
        let raw = self
            .host
            .capture_visible(target)
            .await
            .with_context(|| format!("capture failed while {phase}"))?;

        advance(&mut phase, CapturePhase::Annotating);
        let annotated = annotate_screenshot(&raw, &meta, settings.annotate_screenshots);

        advance(&mut phase, CapturePhase::Persisting);
        let step_id = Uuid::new_v4().to_string();
        let (screenshot_key, inline) = match self.storage.store_screenshot(&step_id, annotated.clone()).await {
            Ok(key) => (Some(key), None),
            Err(err) => {
                log_warn!("keeping screenshot inline for step {step_id}: {err:#}");
                (None, Some(annotated))
            }
        };

        let origin = origin.unwrap_or_default();
        let step = Step {
            id: step_id.clone(),
            ts: Utc::now().timestamp_millis(),
            url: origin.url.or(meta.url),
            title: origin.title.or(meta.title),
            event: meta.event,
            selector: meta.selector,
            element_text: meta.element_text,
            value: meta.value,
            viewport: meta.viewport,
            rect: meta.rect,
            point: meta.point,
            scroll: meta.scroll,
            screenshot_key,
            screenshot: inline,
            ai_description: None,
            manual_caption: None,
            ai_status: None,
        };
        let context = step_context(&step, settings.context_field_chars);

        if let Err(err) = self.append_step(step.clone()).await {
            self.roll_back(&step).await;
            return Err(err.context(format!("capture failed while {phase}")));
        }

        advance(&mut phase, CapturePhase::Enriching);
        self.spawn_enrichment(step_id.clone(), raw, context);

        advance(&mut phase, CapturePhase::Done);
        Ok(step_id)
    }

    async fn append_step(&self, step: Step) -> Result<()> {
        self.storage
            .modify(|state| {
                let session = state.current_mut().ok_or(RecorderError::NoSession)?;
                session.steps.push(step);
                Ok(())
            })
            .await
    }

    /// Undoes the ephemeral write of a step that never made it into the
    /// durable record.
    async fn roll_back(&self, step: &Step) {
        let Some(key) = step.screenshot_key.as_deref() else {
            return;
        };
        if let Err(err) = self.storage.discard_screenshot_key(key).await {
            log_warn!("rollback of {key} failed: {err:#}");
        }
    }

    fn spawn_enrichment(&self, step_id: String, image: String, context: String) {
        let enricher = self.enricher.clone();
        let storage = self.storage.clone();
        tokio::spawn(async move {
            let description = enricher.describe(&image, &context, Some(&step_id)).await;
            match description.result {
                Ok(completion) if !description.persisted => {
                    match storage.set_step_description(&step_id, &completion.text).await {
                        Ok(true) => log_debug!("step {step_id} described locally"),
                        Ok(false) => log_debug!("step {step_id} deleted before enrichment finished"),
                        Err(err) => log_warn!("failed to store description for {step_id}: {err:#}"),
                    }
                }
                Ok(_) => log_debug!("step {step_id} described"),
                Err(status) => log_info!("step {step_id} left undescribed: {status:?}"),
            }
        });
    }

    /// Removes a step from the current session. Returns how many were removed.
    pub async fn delete_step(&self, step_id: &str) -> Result<usize> {
        if step_id.trim().is_empty() {
            return Err(RecorderError::MissingStepId.into());
        }
        let removed = self
            .storage
            .modify(|state| {
                let session = state.current_mut().ok_or(RecorderError::NoSession)?;
                let (removed, kept): (Vec<Step>, Vec<Step>) = std::mem::take(&mut session.steps)
                    .into_iter()
                    .partition(|step| step.id == step_id);
                session.steps = kept;
                Ok(removed)
            })
            .await?;

        for step in &removed {
            self.storage.remove_screenshot(step).await;
        }
        Ok(removed.len())
    }

    /// Empties the current session's steps and article metadata. A missing
    /// session is not an error.
    pub async fn clear_all(&self) -> Result<()> {
        let removed = self
            .storage
            .modify(|state| Ok(state.current_mut().map(Session::clear).unwrap_or_default()))
            .await?;
        if removed.is_empty() {
            return Ok(());
        }

        log_info!("cleared {} step(s)", removed.len());
        self.storage.remove_screenshots(removed).await;
        Ok(())
    }
}

fn advance(phase: &mut CapturePhase, next: CapturePhase) {
    log_debug!("capture {phase} -> {next}");
    *phase = next;
}
