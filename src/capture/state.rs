use std::fmt;

use serde::{Deserialize, Serialize};

/// Recording lifecycle. Lives in the background service context and resets to
/// `Idle` whenever that context restarts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
}

impl RecordingState {
    pub fn is_recording(self) -> bool {
        self == RecordingState::Recording
    }

    pub fn start(&mut self) {
        *self = RecordingState::Recording;
    }

    pub fn stop(&mut self) {
        *self = RecordingState::Idle;
    }
}

/// Stages a single capture request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    CapturingRaw,
    Annotating,
    Persisting,
    Enriching,
    Done,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CapturePhase::Idle => "idle",
            CapturePhase::CapturingRaw => "capturing_raw",
            CapturePhase::Annotating => "annotating",
            CapturePhase::Persisting => "persisting",
            CapturePhase::Enriching => "enriching",
            CapturePhase::Done => "done",
        };
        f.write_str(label)
    }
}
