use anyhow::Result;
use serde::Serialize;

use super::chain::{InferenceChain, InferenceStatus};
use super::enricher::Enricher;
use super::prompts::{describe_prompt, step_context, STEP_SYSTEM_PROMPT};
use crate::error::RecorderError;
use crate::models::Step;
use crate::settings::SettingsStore;
use crate::storage::Storage;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub described: usize,
    pub pending: usize,
}

/// Local-path result; `status` is the last failure seen, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalSummary {
    pub described: usize,
    pub status: Option<InferenceStatus>,
}

/// Describes every step of the current session that lacks a description.
///
/// Steps run one after another through the delegated path. A step whose
/// screenshot is gone is skipped and a step whose inference fails is logged;
/// neither stops the batch. Results are persisted once at the end.
pub async fn describe_pending(
    storage: &Storage,
    enricher: &Enricher,
    settings: &SettingsStore,
) -> Result<BatchSummary> {
    let state = storage.load_state().await?;
    let session = state.current().ok_or(RecorderError::NoSession)?;
    let pending: Vec<Step> = session
        .steps
        .iter()
        .filter(|step| !step.has_description())
        .cloned()
        .collect();
    if pending.is_empty() {
        return Ok(BatchSummary::default());
    }

    let context_limit = settings.current().context_field_chars;
    let mut descriptions = Vec::new();
    for step in &pending {
        let Some(screenshot) = storage.get_screenshot(step).await else {
            log_debug!("step {} has no resolvable screenshot, skipping", step.id);
            continue;
        };
        let context = step_context(step, context_limit);
        match enricher.describe(&screenshot, &context, None).await.result {
            Ok(completion) => descriptions.push((step.id.clone(), completion.text)),
            Err(status) => log_info!("no description for step {}: {status:?}", step.id),
        }
    }

    let described = persist(storage, &descriptions).await?;
    Ok(BatchSummary {
        described,
        pending: pending.len(),
    })
}

/// Describes `pending` with the chain in the caller's own context and persists
/// the results.
pub async fn describe_locally(
    storage: &Storage,
    chain: &InferenceChain,
    settings: &SettingsStore,
    pending: &[Step],
) -> Result<LocalSummary> {
    let settings = settings.current();
    let mut descriptions = Vec::new();
    let mut status = None;

    for step in pending {
        let Some(screenshot) = storage.get_screenshot(step).await else {
            continue;
        };
        let context = step_context(step, settings.context_field_chars);
        let prompt = describe_prompt(&screenshot, &context, &settings);
        match chain.complete(STEP_SYSTEM_PROMPT, &prompt).await {
            Ok(completion) => descriptions.push((step.id.clone(), completion.text)),
            Err(failure) => status = Some(failure),
        }
    }

    let described = persist(storage, &descriptions).await?;
    Ok(LocalSummary { described, status })
}

async fn persist(storage: &Storage, descriptions: &[(String, String)]) -> Result<usize> {
    if descriptions.is_empty() {
        return Ok(0);
    }
    storage.set_step_descriptions(descriptions).await
}
