use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::{ApiShape, Availability, InferenceBackend, InferenceCapabilities, SessionOptions};
use crate::settings::SettingsStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Why the chain produced no text. `Downloading` is not terminal: callers
/// should offer to try again later.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStatus {
    Unavailable,
    Downloading,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub shape: ApiShape,
}

pub type ChainResult = Result<Completion, InferenceStatus>;

/// Runs a prompt against the primary API shape and falls back to the legacy
/// one. Each shape is probed before a session is opened.
pub struct InferenceChain {
    capabilities: InferenceCapabilities,
    settings: Arc<SettingsStore>,
}

impl InferenceChain {
    pub fn new(capabilities: InferenceCapabilities, settings: Arc<SettingsStore>) -> Self {
        Self {
            capabilities,
            settings,
        }
    }

    pub async fn complete(&self, system_prompt: &str, prompt: &str) -> ChainResult {
        let options = SessionOptions {
            system_prompt: system_prompt.to_string(),
            language: self.settings.current().expected_language,
        };

        // The primary shape's failure is what callers see whenever it exists.
        let primary_status = match &self.capabilities.primary {
            Some(backend) => match attempt(backend.as_ref(), &options, prompt).await {
                Ok(completion) => return Ok(completion),
                Err(InferenceStatus::Downloading) => return Err(InferenceStatus::Downloading),
                Err(status) => Some(status),
            },
            None => None,
        };

        let legacy_status = match &self.capabilities.legacy {
            Some(backend) => match attempt(backend.as_ref(), &options, prompt).await {
                Ok(completion) => return Ok(completion),
                Err(status) => status,
            },
            None => InferenceStatus::Unavailable,
        };

        Err(primary_status.unwrap_or(legacy_status))
    }
}

async fn attempt(
    backend: &dyn InferenceBackend,
    options: &SessionOptions,
    prompt: &str,
) -> ChainResult {
    let shape = backend.shape();
    match backend.probe(options).await {
        Availability::Available | Availability::Downloadable => {}
        Availability::Downloading => {
            log_debug!("{shape:?} inference model is still downloading");
            return Err(InferenceStatus::Downloading);
        }
        Availability::Unavailable => return Err(InferenceStatus::Unavailable),
    }

    let mut session = match backend.open_session(options).await {
        Ok(session) => session,
        Err(err) => {
            log_warn!("{shape:?} inference session could not be opened: {err:#}");
            return Err(InferenceStatus::Error);
        }
    };

    let response = session.prompt(prompt).await;
    session.destroy().await;

    match response {
        Ok(raw) => {
            let text = raw.trim();
            if text.is_empty() {
                log_debug!("{shape:?} inference returned empty text");
                Err(InferenceStatus::Error)
            } else {
                Ok(Completion {
                    text: text.to_string(),
                    shape,
                })
            }
        }
        Err(err) => {
            log_warn!("{shape:?} inference prompt failed: {err:#}");
            Err(InferenceStatus::Error)
        }
    }
}
