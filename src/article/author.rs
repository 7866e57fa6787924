use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::issues::issue_messages;
use super::plan::parse_article_plan;
use crate::enrichment::prompts::{article_prompt, ARTICLE_SYSTEM_PROMPT};
use crate::enrichment::{describe_locally, InferenceChain, InferenceStatus};
use crate::error::RecorderError;
use crate::models::Step;
use crate::service::{Request, Response, ServiceHandle};
use crate::settings::SettingsStore;
use crate::storage::Storage;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Service answers that mean "no delegated description path here" rather
/// than a real failure.
const LOCAL_FALLBACK_ERRORS: [&str; 2] = ["no_ai_context", "unknown_message_type"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionSource {
    /// Every step already had a description.
    Nothing,
    Background,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptionSummary {
    pub described: usize,
    pub pending: usize,
    pub source: DescriptionSource,
    /// Last inference failure seen on the local path.
    pub status: Option<InferenceStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub message: String,
    pub issues: Vec<String>,
    /// Regenerated document; `None` when the service could not produce it.
    pub markdown: Option<String>,
}

/// Client-side authoring flow: talks to the background service over its
/// handle, reads durable state directly, and runs article inference in its
/// own context.
#[derive(Clone)]
pub struct ArticleAuthor {
    service: ServiceHandle,
    storage: Storage,
    chain: Arc<InferenceChain>,
    settings: Arc<SettingsStore>,
}

impl ArticleAuthor {
    pub fn new(
        service: ServiceHandle,
        storage: Storage,
        chain: Arc<InferenceChain>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            service,
            storage,
            chain,
            settings,
        }
    }

    /// Stores the free-text article context on the current session. Returns
    /// whether anything was written.
    pub async fn persist_context(&self, value: &str) -> Result<bool> {
        self.storage
            .modify(|state| {
                let Some(session) = state.current_mut() else {
                    return Ok(false);
                };
                if session.article_context == value {
                    return Ok(false);
                }
                session.article_context = value.to_string();
                Ok(true)
            })
            .await
    }

    /// Makes sure every step has a baseline description, preferring the
    /// background service and describing locally when it cannot help.
    pub async fn ensure_step_descriptions(&self) -> Result<DescriptionSummary> {
        let state = self.storage.load_state().await?;
        let pending: Vec<Step> = state
            .current()
            .map(|session| {
                session
                    .steps
                    .iter()
                    .filter(|step| !step.has_description())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if pending.is_empty() {
            return Ok(DescriptionSummary {
                described: 0,
                pending: 0,
                source: DescriptionSource::Nothing,
                status: None,
            });
        }

        match self.service.request(Request::DescribeAllImages).await {
            Ok(Response::Described { described, pending: total }) if described > 0 => {
                return Ok(DescriptionSummary {
                    described,
                    pending: total,
                    source: DescriptionSource::Background,
                    status: None,
                });
            }
            Ok(Response::Failed { error }) if !LOCAL_FALLBACK_ERRORS.contains(&error.as_str()) => {
                return Err(anyhow!(error));
            }
            Ok(_) => log_info!("background described nothing, trying locally"),
            Err(err) => log_warn!("{err}; describing locally"),
        }

        let local = describe_locally(&self.storage, &self.chain, &self.settings, &pending).await?;
        Ok(DescriptionSummary {
            described: local.described,
            pending: pending.len(),
            source: DescriptionSource::Local,
            status: local.status,
        })
    }

    /// Drafts the article: ensures descriptions, asks the model for a plan,
    /// applies it to the current session and regenerates the document.
    pub async fn run_article_enhancer(&self) -> Result<ArticleSummary> {
        let descriptions = self.ensure_step_descriptions().await?;

        let state = self.storage.load_state().await?;
        let session = state
            .current()
            .filter(|session| !session.steps.is_empty())
            .ok_or_else(|| RecorderError::Precondition("Capture steps before using AI.".into()))?;
        let prompt = article_prompt(session, &self.settings.current());
        let completion = self
            .chain
            .complete(ARTICLE_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|status| RecorderError::InferenceUnavailable {
                status,
                task: "article draft",
            })?;
        let plan = parse_article_plan(&completion.text)?;

        let (title, issues) = self
            .storage
            .modify(|state| {
                let session = state.current_mut().ok_or(RecorderError::NoSession)?;
                plan.apply(session);
                let issues = issue_messages(session.article_issues.as_deref().unwrap_or_default());
                Ok((session.article_title.clone(), issues))
            })
            .await?;

        let markdown = match self.service.request(Request::GenerateMarkdown).await {
            Ok(Response::Markdown { markdown }) => Some(markdown),
            _ => None,
        };

        Ok(ArticleSummary {
            message: summary_message(title.as_deref(), descriptions.described),
            issues,
            markdown,
        })
    }
}

fn summary_message(title: Option<&str>, described: usize) -> String {
    let title = title
        .map(|title| format!("“{title}”"))
        .unwrap_or_else(|| "AI article draft".to_string());
    let mut parts = vec![format!("Article draft ready: {title}")];
    if described > 0 {
        let plural = if described == 1 { "" } else { "s" };
        parts.push(format!("{described} step description{plural} updated."));
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_mentions_title_and_updates() {
        assert_eq!(
            summary_message(Some("Invite users"), 1),
            "Article draft ready: “Invite users” · 1 step description updated."
        );
        assert_eq!(summary_message(None, 0), "Article draft ready: AI article draft");
        assert!(summary_message(None, 3).ends_with("3 step descriptions updated."));
    }
}
