//! Prompt text for every inference task.

use crate::models::{Session, Step};
use crate::settings::RecorderSettings;
use crate::utils::text::{non_empty, truncate};

pub const STEP_SYSTEM_PROMPT: &str = "You generate concise, professional documentation steps for SaaS tutorials based on screenshots and context. ALWAYS write in English, even if the screenshots contain text in other languages. Reply with one clear sentence per step.";

pub const ARTICLE_SYSTEM_PROMPT: &str = "You are a senior technical writer. Given a sequence of recorded steps, respond with JSON containing title, introduction, rewritten step descriptions, and any quality issues such as repeated or missing steps. ALWAYS write in English regardless of the language in the screenshots. Keep the tone instructional and concise.";

const DEFAULT_CONTEXT: &str = "User interaction with a SaaS app.";

const ARTICLE_SHAPE: [&str; 11] = [
    "You receive recorded steps from a SaaS workflow. Produce JSON with this shape:",
    "{",
    "  \"title\": \"string\",",
    "  \"introduction\": \"string\",",
    "  \"steps\": [ { \"stepNumber\": number, \"description\": \"string\", \"status\": \"keep|review|remove\" } ],",
    "  \"issues\": [ { \"type\": \"duplicate_step|missing_context|note\", \"message\": \"string\", \"steps\": [numbers] } ]",
    "}",
    "Guidelines:",
    "- Rewrite each step description so it is action-oriented and concise.",
    "- Flag any missing or repeated steps inside the issues array.",
    "- Use English only. Provide valid JSON without comments or extra text.",
];

/// `Event: .. | Selector: .. | Text: .. | Value: ..`, skipping empty parts.
pub fn step_context(step: &Step, field_limit: usize) -> String {
    let mut parts = Vec::new();
    if let Some(event) = non_empty(step.event.as_deref()) {
        parts.push(format!("Event: {event}"));
    }
    if let Some(selector) = non_empty(step.selector.as_deref()) {
        parts.push(format!("Selector: {selector}"));
    }
    if let Some(text) = non_empty(step.element_text.as_deref()) {
        parts.push(format!("Text: {}", truncate(text, field_limit)));
    }
    if let Some(value) = non_empty(step.value.as_deref()) {
        parts.push(format!("Value: {}", truncate(value, field_limit)));
    }
    parts.join(" | ")
}

pub fn describe_prompt(image: &str, context: &str, settings: &RecorderSettings) -> String {
    let context = non_empty(Some(context)).unwrap_or(DEFAULT_CONTEXT);
    let mut lines = vec![
        "You document SaaS user flows with short, instructional sentences.".to_string(),
        format!("Context: {context}"),
        "Describe the user action happening in this screenshot using one sentence in English."
            .to_string(),
    ];
    let quoted: String = image.chars().take(settings.prompt_screenshot_chars).collect();
    if !quoted.is_empty() {
        lines.push(format!("Screenshot (data URL, truncated): {quoted}"));
    }
    lines.join("\n")
}

pub fn article_prompt(session: &Session, settings: &RecorderSettings) -> String {
    let mut lines: Vec<String> = ARTICLE_SHAPE.iter().map(|line| line.to_string()).collect();

    if let Some(context) = non_empty(Some(session.article_context.as_str())) {
        lines.push("Additional context provided by the user or transcript:".into());
        lines.push(truncate(context, settings.article_context_chars));
    }

    for (idx, step) in session.steps.iter().enumerate() {
        let or_na = |value: &Option<String>| non_empty(value.as_deref()).unwrap_or("n/a").to_string();
        lines.push(format!("Step {}:", idx + 1));
        lines.push(format!(
            "  Event: {}",
            non_empty(step.event.as_deref()).unwrap_or("unknown")
        ));
        lines.push(format!("  Selector: {}", or_na(&step.selector)));
        lines.push(format!("  Page title: {}", or_na(&step.title)));
        lines.push(format!("  URL: {}", or_na(&step.url)));

        let context = step_context(step, settings.context_field_chars);
        let existing = non_empty(step.manual_caption.as_deref())
            .or_else(|| non_empty(step.ai_description.as_deref()))
            .or_else(|| non_empty(Some(context.as_str())))
            .unwrap_or("none");
        lines.push(format!(
            "  Existing description: {}",
            truncate(existing, settings.existing_description_chars)
        ));
    }

    lines.join("\n")
}

pub fn translator_system_prompt(language_name: &str) -> String {
    format!(
        "You are a professional translator. Translate documentation markdown from English to {language_name}. Preserve all markdown formatting, links, and image references exactly. Output only the translated markdown without explanations or additional text."
    )
}

pub fn translation_prompt(language_name: &str, markdown: &str) -> String {
    format!(
        "Translate the following markdown documentation to {language_name}. Keep all markdown syntax, image links, and structure identical:\n\n{markdown}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn context_truncates_long_fields() {
        let step = Step {
            event: Some("input".into()),
            selector: Some("#email".into()),
            value: Some("x".repeat(200)),
            ..Default::default()
        };
        let context = step_context(&step, 120);
        assert!(context.starts_with("Event: input | Selector: #email | Value: "));
        assert!(context.ends_with('…'));
        assert_eq!(step_context(&Step::default(), 120), "");
    }

    #[test]
    fn describe_prompt_uses_default_context_and_truncates_image() {
        let settings = RecorderSettings { prompt_screenshot_chars: 10, ..Default::default() };
        let prompt = describe_prompt("data:image/png;base64,AAAAAAAA", "", &settings);
        assert!(prompt.contains("Context: User interaction with a SaaS app."));
        assert!(prompt.ends_with("Screenshot (data URL, truncated): data:image"));
    }

    #[test]
    fn article_prompt_lists_steps_with_fallbacks() {
        let mut session = Session::new(Utc::now(), "Onboarding flow".into());
        session.steps.push(Step {
            event: Some("click".into()),
            manual_caption: Some("Open billing".into()),
            ..Default::default()
        });
        session.steps.push(Step::default());

        let prompt = article_prompt(&session, &RecorderSettings::default());
        assert!(prompt.contains("Additional context provided by the user or transcript:\nOnboarding flow"));
        assert!(prompt.contains("Step 1:\n  Event: click\n  Selector: n/a"));
        assert!(prompt.contains("  Existing description: Open billing"));
        assert!(prompt.contains("Step 2:\n  Event: unknown"));
        assert!(prompt.ends_with("  Existing description: none"));
    }
}
