use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    DuplicateStep,
    MissingContext,
    Note,
}

impl IssueType {
    /// Unknown categories collapse into `note`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "duplicate_step" => IssueType::DuplicateStep,
            "missing_context" => IssueType::MissingContext,
            _ => IssueType::Note,
        }
    }
}

/// A quality finding attached to an article; `steps` are 1-based step numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueType,
    pub message: String,
    #[serde(default)]
    pub steps: Vec<u32>,
}
