use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::issues::{detect_duplicate_steps, merge_issues};
use crate::error::RecorderError;
use crate::models::Session;

/// One rewritten step from the model. `step_number` is 1-based and kept as
/// reported; non-integer values are skipped when the plan is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub step_number: f64,
    pub description: String,
    pub status: String,
}

/// Article draft returned by the model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArticlePlan {
    pub title: String,
    pub introduction: String,
    pub steps: Vec<PlanStep>,
    /// Raw issue entries; normalised when merged into the session.
    pub issues: Vec<Value>,
}

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("fenced block pattern is valid")
});

/// Recovers the JSON object from a model reply: the first fenced code block if
/// there is one, else everything from the first `{` to the last `}`.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    if let Some(body) = FENCED_BLOCK.captures(text).and_then(|caps| caps.get(1)) {
        return Some(body.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses a model reply into a plan. Unparseable replies are rejected whole.
pub fn parse_article_plan(text: &str) -> Result<ArticlePlan, RecorderError> {
    let payload = extract_json_payload(text)
        .ok_or_else(|| RecorderError::InvalidPlan("no JSON object in reply".into()))?;
    let data: Value = serde_json::from_str(payload)
        .map_err(|err| RecorderError::InvalidPlan(err.to_string()))?;
    if !data.is_object() {
        return Err(RecorderError::InvalidPlan("reply is not a JSON object".into()));
    }

    let steps = data
        .get("steps")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(idx, entry)| plan_step(idx, entry))
                .collect()
        })
        .unwrap_or_default();

    Ok(ArticlePlan {
        title: text_field(&data, &["title"]),
        introduction: text_field(&data, &["introduction", "intro"]),
        steps,
        issues: data
            .get("issues")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    })
}

fn plan_step(idx: usize, entry: &Value) -> Option<PlanStep> {
    let step_number = number_field(entry, "stepNumber")
        .or_else(|| number_field(entry, "number"))
        .unwrap_or((idx + 1) as f64);
    let description = text_field(entry, &["description", "text"]);
    if step_number == 0.0 || description.is_empty() {
        return None;
    }
    Some(PlanStep {
        step_number,
        description,
        status: text_field(entry, &["status"]).to_lowercase(),
    })
}

fn text_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

impl ArticlePlan {
    /// Writes the plan into `session`: title, introduction, per-step
    /// descriptions and statuses, then the merged issue list. Step entries that
    /// do not address an existing step are ignored.
    pub fn apply(&self, session: &mut Session) {
        if !self.title.is_empty() {
            session.article_title = Some(self.title.clone());
        }
        if !self.introduction.is_empty() {
            session.article_introduction = Some(self.introduction.clone());
        }

        for entry in &self.steps {
            let Some(step) = step_index(entry.step_number).and_then(|idx| session.steps.get_mut(idx))
            else {
                continue;
            };
            step.ai_description = Some(entry.description.clone());
            if !entry.status.is_empty() {
                step.ai_status = Some(entry.status.clone());
            }
        }

        let duplicates = detect_duplicate_steps(&session.steps);
        session.article_issues = Some(merge_issues(&self.issues, duplicates));
    }
}

fn step_index(step_number: f64) -> Option<usize> {
    (step_number.fract() == 0.0 && step_number >= 1.0).then(|| step_number as usize - 1)
}
