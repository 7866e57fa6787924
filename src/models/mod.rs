pub mod issue;
pub mod session;
pub mod step;

pub use issue::{Issue, IssueType};
pub use session::{Session, SessionMap};
pub use step::{CaptureMeta, Point, Rect, Scroll, Step, SurfaceOrigin, Viewport};
