//! Wire format of the background service.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecorderError;
use crate::models::{CaptureMeta, SurfaceOrigin};

const KNOWN_TYPES: [&str; 9] = [
    "get_state",
    "start_recording",
    "stop_recording",
    "capture_step",
    "describe_all_images",
    "delete_step",
    "generate_markdown",
    "translate_markdown",
    "clear_all",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    GetState,
    StartRecording {
        #[serde(default)]
        context: Option<String>,
    },
    StopRecording,
    CaptureStep {
        #[serde(default)]
        meta: CaptureMeta,
        /// Surface the event came from; its url and title override `meta`.
        #[serde(default)]
        origin: Option<SurfaceOrigin>,
    },
    DescribeAllImages,
    DeleteStep {
        #[serde(default, rename = "stepId")]
        step_id: Option<String>,
    },
    GenerateMarkdown,
    TranslateMarkdown {
        #[serde(default)]
        markdown: String,
        #[serde(default, rename = "targetLanguage")]
        target_language: String,
        #[serde(default, rename = "languageName")]
        language_name: Option<String>,
    },
    ClearAll,
}

impl Request {
    /// Decodes a raw message, answering unrecognised `type`s with
    /// `unknown_message_type` rather than a decode error.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(RecorderError::UnknownMessageType.into());
        }
        serde_json::from_value(value).with_context(|| format!("malformed {kind} request"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    State {
        recording: bool,
        current_session_id: Option<String>,
        step_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    Started { session_id: String, recording: bool },
    Stopped { recording: bool },
    #[serde(rename_all = "camelCase")]
    Captured { step_id: String },
    Described { described: usize, pending: usize },
    Removed { removed: usize },
    Markdown { markdown: String },
    Translated { translated: String },
    Done,
    Failed { error: String },
}

impl Response {
    pub fn failed(error: impl Into<String>) -> Self {
        Response::Failed {
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Response::Failed { .. })
    }

    /// JSON body as sent over the wire. Every reply except `get_state` carries
    /// an `ok` flag.
    pub fn to_json(&self) -> Result<Value> {
        let body = match self {
            Response::Done => Value::Object(Map::new()),
            other => serde_json::to_value(other).context("failed to encode response")?,
        };
        let Value::Object(mut fields) = body else {
            return Err(anyhow!("response did not encode to an object"));
        };
        if !matches!(self, Response::State { .. }) {
            fields.insert("ok".into(), Value::Bool(self.is_ok()));
        }
        Ok(Value::Object(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_fields() {
        let request = Request::from_value(json!({"type": "delete_step", "stepId": "abc"})).unwrap();
        assert_eq!(request, Request::DeleteStep { step_id: Some("abc".into()) });

        let request = Request::from_value(json!({
            "type": "translate_markdown",
            "markdown": "# Hi",
            "targetLanguage": "es",
            "languageName": "Spanish"
        }))
        .unwrap();
        assert!(matches!(request, Request::TranslateMarkdown { ref target_language, .. } if target_language == "es"));
    }

    #[test]
    fn unknown_types_are_typed_failures() {
        let err = Request::from_value(json!({"type": "ai_describe"})).unwrap_err();
        assert_eq!(
            crate::error::as_recorder_error(&err),
            Some(&RecorderError::UnknownMessageType)
        );
        assert!(Request::from_value(json!({"no": "type"})).is_err());
    }

    #[test]
    fn replies_carry_ok_flags() {
        let captured = Response::Captured { step_id: "s1".into() }.to_json().unwrap();
        assert_eq!(captured, json!({"ok": true, "stepId": "s1"}));

        let failed = Response::failed("not_recording").to_json().unwrap();
        assert_eq!(failed, json!({"ok": false, "error": "not_recording"}));

        assert_eq!(Response::Done.to_json().unwrap(), json!({"ok": true}));

        let state = Response::State {
            recording: false,
            current_session_id: None,
            step_count: 0,
        }
        .to_json()
        .unwrap();
        assert_eq!(state, json!({"recording": false, "currentSessionId": null, "stepCount": 0}));
    }
}
