use thiserror::Error;

use crate::enrichment::InferenceStatus;

/// Failures that callers are expected to branch on. Everything else travels as
/// `anyhow::Error` and is reported by its display text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("not_recording")]
    NotRecording,

    #[error("missing_step_id")]
    MissingStepId,

    #[error("no_session")]
    NoSession,

    #[error("unknown_message_type")]
    UnknownMessageType,

    #[error("{}", unavailable_message(.status, .task))]
    InferenceUnavailable {
        status: InferenceStatus,
        task: &'static str,
    },

    #[error("AI response could not be parsed: {0}")]
    InvalidPlan(String),

    #[error("no content to translate")]
    EmptySource,

    #[error("{0}")]
    Precondition(String),

    /// The receiving context is gone or dropped the reply.
    #[error("{0} is unreachable")]
    Unreachable(&'static str),
}

impl RecorderError {
    /// Wire code sent back in `{ok:false, error}` replies.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

fn unavailable_message(status: &InferenceStatus, task: &str) -> String {
    match status {
        InferenceStatus::Downloading => format!(
            "On-device AI is unavailable while the model downloads; try the {task} again in a moment."
        ),
        InferenceStatus::Unavailable => format!(
            "On-device AI is unavailable. Enable the on-device Prompt API to run the {task}."
        ),
        InferenceStatus::Error => {
            format!("On-device AI is unavailable: the {task} returned no usable text.")
        }
    }
}

/// Pulls the typed error back out of an `anyhow` chain.
pub fn as_recorder_error(err: &anyhow::Error) -> Option<&RecorderError> {
    err.chain().find_map(|cause| cause.downcast_ref::<RecorderError>())
}
