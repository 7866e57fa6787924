use anyhow::Result;
use async_trait::async_trait;

use crate::models::SurfaceOrigin;

/// The window or tab a capture is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceTarget {
    pub window_id: i64,
}

/// Host application services the pipeline depends on.
#[async_trait]
pub trait HostSurface: Send + Sync {
    /// Picks the originating window when known, else the currently focused one.
    async fn resolve_target(&self, origin: Option<&SurfaceOrigin>) -> Result<SurfaceTarget>;

    /// Rasterises the visible area of `target` as an image data URL.
    async fn capture_visible(&self, target: SurfaceTarget) -> Result<String>;

    /// Tells foreground observers to show or hide their recording indicator.
    async fn broadcast_recording(&self, on: bool) -> Result<()>;
}
