//! Markdown translation through the inference chain.
//!
//! Embedded image payloads never reach the model: they are swapped for
//! placeholders before the request and restored afterwards.

mod placeholders;

use anyhow::Result;

pub use placeholders::StrippedMarkdown;

use crate::enrichment::Enricher;
use crate::error::RecorderError;

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub async fn translate_markdown(
    enricher: &Enricher,
    markdown: &str,
    target_language: &str,
    language_name: Option<&str>,
) -> Result<String> {
    if markdown.trim().is_empty() {
        return Err(RecorderError::EmptySource.into());
    }
    let language_name = language_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(target_language);

    let stripped = StrippedMarkdown::strip(markdown);
    log_info!(
        "translating to {language_name} with {} embedded image(s) held back",
        stripped.image_count()
    );

    let completion = enricher
        .translate(&stripped.text, language_name)
        .await
        .map_err(|status| RecorderError::InferenceUnavailable {
            status,
            task: "translation",
        })?;

    Ok(stripped.restore(&completion.text))
}
