//! Annotation overlay compositing for captured screenshots.

mod compositor;
mod data_url;

pub use compositor::{annotate_screenshot, RasterMapping};
pub use data_url::DataUrl;
