//! Session data model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Issue, Step};

/// Durable `sessions` entry: session id -> session.
pub type SessionMap = HashMap<String, Session>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub article_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_introduction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_issues: Option<Vec<Issue>>,
}

impl Session {
    /// Session ids are the creation instant in RFC 3339 form with `:` and `.`
    /// replaced so they stay usable as file names and map keys.
    pub fn new(created: DateTime<Utc>, article_context: String) -> Self {
        let id = created
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        Self {
            id,
            created_at: created.timestamp_millis(),
            steps: Vec::new(),
            article_context,
            article_title: None,
            article_introduction: None,
            article_issues: None,
        }
    }

    pub fn find_step_mut(&mut self, step_id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|step| step.id == step_id)
    }

    /// Empties the step list and every piece of article metadata, returning the
    /// removed steps so their screenshots can be released.
    pub fn clear(&mut self) -> Vec<Step> {
        self.article_title = None;
        self.article_introduction = None;
        self.article_context.clear();
        self.article_issues = Some(Vec::new());
        std::mem::take(&mut self.steps)
    }
}
