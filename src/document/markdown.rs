use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::enrichment::prompts::step_context;
use crate::models::{Session, Step};
use crate::settings::RecorderSettings;
use crate::storage::Storage;
use crate::utils::text::non_empty;

pub const EMPTY_DOCUMENT: &str = "# Empty session";

const FALLBACK_TITLE: &str = "Session";
const DEFAULT_STATUS: &str = "keep";

/// Where step screenshots are looked up while a document is assembled.
#[async_trait]
pub trait ScreenshotResolver: Send + Sync {
    async fn resolve(&self, step: &Step) -> Option<String>;
}

#[async_trait]
impl ScreenshotResolver for Storage {
    async fn resolve(&self, step: &Step) -> Option<String> {
        self.get_screenshot(step).await
    }
}

/// Markdown for the current session, or a placeholder when there is none.
pub async fn build_markdown(storage: &Storage, settings: &RecorderSettings) -> Result<String> {
    let state = storage.load_state().await?;
    Ok(match state.current() {
        Some(session) => assemble_markdown(session, storage, settings.context_field_chars).await,
        None => EMPTY_DOCUMENT.to_string(),
    })
}

/// Renders `session`. Screenshots are resolved one step at a time; steps whose
/// screenshot is gone are emitted without an image.
pub async fn assemble_markdown(
    session: &Session,
    screenshots: &dyn ScreenshotResolver,
    context_limit: usize,
) -> String {
    let mut lines = Vec::new();

    let first = session.steps.first();
    let title = non_empty(session.article_title.as_deref())
        .or_else(|| first.and_then(|step| non_empty(step.title.as_deref())))
        .or_else(|| first.and_then(|step| non_empty(step.ai_description.as_deref())))
        .unwrap_or(FALLBACK_TITLE);
    lines.push(format!("# {title}\n"));
    lines.push(format!("Generated: {}\n", generated_at(session.created_at)));
    if let Some(introduction) = non_empty(session.article_introduction.as_deref()) {
        lines.push(format!("{introduction}\n"));
    }

    let messages: Vec<&str> = session
        .article_issues
        .iter()
        .flatten()
        .filter_map(|issue| non_empty(Some(issue.message.as_str())))
        .collect();
    if !messages.is_empty() {
        lines.push("## Quality Review".to_string());
        lines.extend(messages.iter().map(|message| format!("- {message}")));
        lines.push(String::new());
    }

    for (idx, step) in session.steps.iter().enumerate() {
        let number = idx + 1;
        let numbered = format!("Step {number}");
        let heading = non_empty(step.manual_caption.as_deref())
            .or_else(|| non_empty(step.title.as_deref()))
            .unwrap_or(numbered.as_str());
        let context = step_context(step, context_limit);
        let body = non_empty(step.ai_description.as_deref())
            .or_else(|| non_empty(Some(context.as_str())))
            .or_else(|| non_empty(step.url.as_deref()))
            .unwrap_or(heading);

        lines.push(format!("## Step {number}: {heading}"));
        lines.push(body.to_string());
        if let Some(status) = non_empty(step.ai_status.as_deref()).filter(|s| *s != DEFAULT_STATUS) {
            lines.push(format!("> Status: {status}"));
        }
        if let Some(screenshot) = screenshots.resolve(step).await {
            lines.push(format!("\n![Step {number}]({screenshot})\n"));
        }
    }

    lines.join("\n")
}

fn generated_at(created_at: i64) -> String {
    DateTime::from_timestamp_millis(created_at)
        .map(|utc| utc.with_timezone(&Local).format("%-m/%-d/%Y, %-I:%M:%S %p").to_string())
        .unwrap_or_default()
}
