use std::sync::Arc;

use anyhow::Result;

use super::messages::{Request, Response};
use crate::capture::CaptureController;
use crate::document::build_markdown;
use crate::enrichment::{describe_pending, Enricher};
use crate::error::as_recorder_error;
use crate::settings::SettingsStore;
use crate::storage::Storage;
use crate::translation::translate_markdown;

const ENABLE_LOGS: bool = true;

use crate::log_error;

/// The background context: answers every request and never lets an error
/// escape as anything but a `Failed` reply.
#[derive(Clone)]
pub struct BackgroundService {
    capture: CaptureController,
    storage: Storage,
    enricher: Enricher,
    settings: Arc<SettingsStore>,
}

impl BackgroundService {
    pub fn new(
        capture: CaptureController,
        storage: Storage,
        enricher: Enricher,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            capture,
            storage,
            enricher,
            settings,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => failure(&err),
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::GetState => {
                let state = self.storage.load_state().await?;
                Ok(Response::State {
                    recording: self.capture.recording_state().await.is_recording(),
                    step_count: state.step_count(),
                    current_session_id: state.current_session_id,
                })
            }
            Request::StartRecording { context } => {
                let session_id = self
                    .capture
                    .start_recording(context.unwrap_or_default())
                    .await?;
                Ok(Response::Started {
                    session_id,
                    recording: true,
                })
            }
            Request::StopRecording => {
                self.capture.stop_recording().await;
                Ok(Response::Stopped { recording: false })
            }
            Request::CaptureStep { meta, origin } => {
                let step_id = self.capture.capture_step(meta, origin).await?;
                Ok(Response::Captured { step_id })
            }
            Request::DescribeAllImages => {
                let summary = describe_pending(&self.storage, &self.enricher, &self.settings).await?;
                Ok(Response::Described {
                    described: summary.described,
                    pending: summary.pending,
                })
            }
            Request::DeleteStep { step_id } => {
                let removed = self
                    .capture
                    .delete_step(step_id.as_deref().unwrap_or_default())
                    .await?;
                Ok(Response::Removed { removed })
            }
            Request::GenerateMarkdown => {
                let markdown = build_markdown(&self.storage, &self.settings.current()).await?;
                Ok(Response::Markdown { markdown })
            }
            Request::TranslateMarkdown {
                markdown,
                target_language,
                language_name,
            } => {
                let translated = translate_markdown(
                    &self.enricher,
                    &markdown,
                    &target_language,
                    language_name.as_deref(),
                )
                .await?;
                Ok(Response::Translated { translated })
            }
            Request::ClearAll => {
                self.capture.clear_all().await?;
                Ok(Response::Done)
            }
        }
    }
}

/// Typed failures answer with their code; anything else with its message.
pub(super) fn failure(err: &anyhow::Error) -> Response {
    match as_recorder_error(err) {
        Some(typed) => Response::failed(typed.code()),
        None => {
            log_error!("request failed: {err:#}");
            Response::failed(format!("{err:#}"))
        }
    }
}
