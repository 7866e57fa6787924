//! Markdown document assembly.

mod markdown;

pub use markdown::{assemble_markdown, build_markdown, ScreenshotResolver, EMPTY_DOCUMENT};
