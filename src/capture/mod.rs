//! Step capture pipeline.

mod controller;
mod host;
mod state;

pub use controller::CaptureController;
pub use host::{HostSurface, SurfaceTarget};
pub use state::{CapturePhase, RecordingState};
