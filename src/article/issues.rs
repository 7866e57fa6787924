//! Quality findings: normalisation of model-reported issues, heuristic
//! duplicate detection, and the merge of both.

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::models::{Issue, IssueType, Step};

static STEP_LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("step list separator is valid"));

/// Turns one model-reported issue into the canonical shape.
///
/// Bare strings become notes. `category` and `note` are accepted for `type` and
/// `message`, and `steps` may be a list or a comma/space separated string.
/// Issues without a message are dropped, except duplicate-step issues that name
/// their steps, which get a synthesised message.
pub fn normalize_issue(raw: &Value) -> Option<Issue> {
    match raw {
        Value::String(text) => {
            let message = text.trim();
            (!message.is_empty()).then(|| Issue {
                kind: IssueType::Note,
                message: message.to_string(),
                steps: Vec::new(),
            })
        }
        Value::Object(_) => {
            let kind = first_text(raw, &["type", "category"])
                .map(IssueType::parse)
                .unwrap_or(IssueType::Note);
            let message = first_text(raw, &["message", "note"]).unwrap_or_default();
            let steps = step_numbers(raw.get("steps"));

            if !message.is_empty() {
                return Some(Issue {
                    kind,
                    message: message.to_string(),
                    steps,
                });
            }
            if kind == IssueType::DuplicateStep && !steps.is_empty() {
                let listed: Vec<String> = steps.iter().map(u32::to_string).collect();
                return Some(Issue {
                    kind,
                    message: format!("Potential duplicate steps: {}", listed.join(", ")),
                    steps,
                });
            }
            None
        }
        _ => None,
    }
}

fn first_text<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| raw.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
}

fn step_numbers(raw: Option<&Value>) -> Vec<u32> {
    let candidates: Vec<Value> = match raw {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(list)) => STEP_LIST_SEPARATOR
            .split(list)
            .map(|part| Value::String(part.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    candidates.iter().filter_map(positive_integer).collect()
}

fn positive_integer(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.fract() == 0.0 && number >= 1.0 && number <= f64::from(u32::MAX)).then_some(number as u32)
}

/// Consecutive steps sharing the same (event, selector, url) are flagged.
pub fn detect_duplicate_steps(steps: &[Step]) -> Vec<Issue> {
    let key = |step: &Step| {
        (
            step.event.clone().unwrap_or_default(),
            step.selector.clone().unwrap_or_default(),
            step.url.clone().unwrap_or_default(),
        )
    };

    steps
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| key(&pair[0]) == key(&pair[1]))
        .map(|(idx, pair)| {
            let previous = idx as u32 + 1;
            let current = previous + 1;
            let action = pair[1].event.as_deref().filter(|e| !e.is_empty()).unwrap_or("interaction");
            Issue {
                kind: IssueType::DuplicateStep,
                message: format!(
                    "Steps {previous} and {current} appear to repeat the same action ({action})."
                ),
                steps: vec![previous, current],
            }
        })
        .collect()
}

/// Model issues first, then heuristic ones, keeping the first of each
/// `(type, message)` pair.
pub fn merge_issues(model_issues: &[Value], duplicates: Vec<Issue>) -> Vec<Issue> {
    let mut seen = HashSet::new();
    model_issues
        .iter()
        .filter_map(normalize_issue)
        .chain(duplicates)
        .filter(|issue| seen.insert((issue.kind, issue.message.clone())))
        .collect()
}

pub fn issue_messages(issues: &[Issue]) -> Vec<String> {
    issues
        .iter()
        .map(|issue| issue.message.clone())
        .filter(|message| !message.is_empty())
        .collect()
}
