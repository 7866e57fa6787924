//! Background service context and its request/response protocol.

mod handle;
mod handler;
mod messages;

pub use handle::ServiceHandle;
pub use handler::BackgroundService;
pub use messages::{Request, Response};
