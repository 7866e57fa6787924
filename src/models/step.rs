//! Step data model.
//!
//! A step is one recorded user action: the event metadata reported by the
//! foreground observer plus a reference to the annotated screenshot.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Scroll {
    pub x: f64,
    pub y: f64,
}

/// Metadata reported by the event source for a single observed action.
///
/// Click events carry `point`; blur and enter-on-textual-field events do not.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMeta {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub element_text: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub scroll: Option<Scroll>,
    #[serde(default)]
    pub point: Option<Point>,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl CaptureMeta {
    pub fn has_point(&self) -> bool {
        self.point.map(|p| p.is_finite()).unwrap_or(false)
    }

    pub fn has_rect(&self) -> bool {
        self.rect.map(|r| r.is_finite()).unwrap_or(false)
    }
}

/// The surface a capture request originated from. Its url and title take
/// precedence over whatever the event source reported.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceOrigin {
    #[serde(default)]
    pub window_id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ts: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<Scroll>,
    /// Reference into the ephemeral partition (`shot:<step id>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_key: Option<String>,
    /// Inline payload; only present on legacy records or when the ephemeral
    /// write failed at capture time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub ai_description: Option<String>,
    #[serde(default)]
    pub manual_caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_status: Option<String>,
}

impl Step {
    pub fn has_description(&self) -> bool {
        self.ai_description
            .as_deref()
            .map(|text| !text.is_empty())
            .unwrap_or(false)
    }

    /// True when the record still carries the legacy inline image form.
    pub fn is_legacy_inline(&self) -> bool {
        self.screenshot.is_some()
    }
}
