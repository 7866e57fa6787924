use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::data_url::DataUrl;
use crate::models::{CaptureMeta, Point, Rect, Viewport};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const HIGHLIGHT_FILL: Tint = Tint::new(16, 185, 129, 0.18);
const HIGHLIGHT_STROKE: Tint = Tint::new(16, 185, 129, 0.95);
const MARKER_FILL: Tint = Tint::new(239, 68, 68, 0.2);
const MARKER_STROKE: Tint = Tint::new(239, 68, 68, 0.75);

/// Dash pattern along the highlight border: 12px drawn, 8px gap.
const DASH_ON: u32 = 12;
const DASH_PERIOD: u32 = 20;

const MIN_HIGHLIGHT_LINE: f64 = 3.0;
const MIN_MARKER_RADIUS: f64 = 14.0;
const MIN_MARKER_LINE: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
struct Tint {
    rgb: [u8; 3],
    alpha: f64,
}

impl Tint {
    const fn new(r: u8, g: u8, b: u8, alpha: f64) -> Self {
        Self { rgb: [r, g, b], alpha }
    }
}

/// Maps viewport-relative coordinates onto the captured raster, which may have a
/// different pixel density than the viewport the event source measured in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterMapping {
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl RasterMapping {
    pub fn new(width: u32, height: u32, viewport: Option<Viewport>) -> Self {
        let width = f64::from(width);
        let height = f64::from(height);
        let usable = |value: f64| value.is_finite() && value > 0.0;
        let viewport_width = viewport.map(|v| v.width).filter(|v| usable(*v)).unwrap_or(width);
        let viewport_height = viewport.map(|v| v.height).filter(|v| usable(*v)).unwrap_or(height);

        Self {
            width,
            height,
            scale_x: width / viewport_width,
            scale_y: height / viewport_height,
        }
    }

    /// Scales `rect` into raster space and clamps it to the image bounds.
    pub fn clamp_rect(&self, rect: Rect) -> Rect {
        let x = (rect.x * self.scale_x).clamp(0.0, self.width);
        let y = (rect.y * self.scale_y).clamp(0.0, self.height);
        let width = (rect.width * self.scale_x).clamp(0.0, self.width - x);
        let height = (rect.height * self.scale_y).clamp(0.0, self.height - y);
        Rect { x, y, width, height }
    }

    pub fn clamp_point(&self, point: Point) -> Point {
        Point {
            x: (point.x * self.scale_x).clamp(0.0, self.width),
            y: (point.y * self.scale_y).clamp(0.0, self.height),
        }
    }

    fn base(&self) -> f64 {
        self.width.max(self.height)
    }
}

/// Overlays the rect highlight and point marker described by `meta` onto `raw`.
///
/// Returns `raw` unchanged when there is nothing to draw or compositing is
/// disabled. Annotation is cosmetic: every failure falls back to the raw image.
pub fn annotate_screenshot(raw: &str, meta: &CaptureMeta, enabled: bool) -> String {
    if !enabled || (!meta.has_point() && !meta.has_rect()) {
        return raw.to_string();
    }

    match compose(raw, meta) {
        Ok(annotated) => annotated,
        Err(err) => {
            log_warn!("screenshot annotation failed, keeping raw capture: {err:#}");
            raw.to_string()
        }
    }
}

fn compose(raw: &str, meta: &CaptureMeta) -> Result<String> {
    let source = DataUrl::parse(raw)?;
    let format = ImageFormat::from_mime_type(&source.mime)
        .ok_or_else(|| anyhow!("unsupported screenshot type {}", source.mime))?;
    let decoded = image::load_from_memory_with_format(&source.bytes, format)
        .context("failed to decode screenshot")?;

    let mut canvas = decoded.to_rgba8();
    let mapping = RasterMapping::new(canvas.width(), canvas.height(), meta.viewport);
    let base = mapping.base();

    if let Some(rect) = meta.rect.filter(Rect::is_finite) {
        let area = mapping.clamp_rect(rect);
        let line = MIN_HIGHLIGHT_LINE.max(base * 0.003);
        fill_rect(&mut canvas, area, HIGHLIGHT_FILL);
        stroke_dashed_rect(&mut canvas, area, line, HIGHLIGHT_STROKE);
    }

    if let Some(point) = meta.point.filter(Point::is_finite) {
        let center = mapping.clamp_point(point);
        let radius = MIN_MARKER_RADIUS.max(base * 0.03);
        let line = MIN_MARKER_LINE.max(base * 0.004);
        draw_marker(&mut canvas, center, radius, line);
    }

    let bytes = encode(canvas, format)?;
    log_debug!("annotated {} screenshot ({} bytes)", source.mime, bytes.len());

    Ok(DataUrl {
        mime: source.mime,
        bytes,
    }
    .encode())
}

fn encode(canvas: RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
        _ => DynamicImage::ImageRgba8(canvas),
    };
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .context("failed to re-encode annotated screenshot")?;
    Ok(out.into_inner())
}

/// Pixel span `[start, end)` covered by `[from, from + len)`, inside `limit`.
fn span(from: f64, len: f64, limit: u32) -> (u32, u32) {
    let start = from.round().max(0.0) as u32;
    let end = (from + len).round().max(0.0) as u32;
    (start.min(limit), end.min(limit))
}

fn blend(pixel: &mut Rgba<u8>, tint: Tint) {
    let a = tint.alpha;
    let [r, g, b, dst_alpha] = pixel.0;
    let mix = |dst: u8, src: u8| (f64::from(src) * a + f64::from(dst) * (1.0 - a)).round() as u8;
    let out_alpha = a * 255.0 + f64::from(dst_alpha) * (1.0 - a);
    pixel.0 = [
        mix(r, tint.rgb[0]),
        mix(g, tint.rgb[1]),
        mix(b, tint.rgb[2]),
        out_alpha.round().clamp(0.0, 255.0) as u8,
    ];
}

fn fill_rect(canvas: &mut RgbaImage, area: Rect, tint: Tint) {
    let (x0, x1) = span(area.x, area.width, canvas.width());
    let (y0, y1) = span(area.y, area.height, canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            blend(canvas.get_pixel_mut(x, y), tint);
        }
    }
}

/// Strokes the border inside `area` so the outline never leaves the clamped rect.
fn stroke_dashed_rect(canvas: &mut RgbaImage, area: Rect, line: f64, tint: Tint) {
    let (x0, x1) = span(area.x, area.width, canvas.width());
    let (y0, y1) = span(area.y, area.height, canvas.height());
    let line = line.round().max(1.0) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            let horizontal = y < y0 + line || y + line >= y1;
            let vertical = x < x0 + line || x + line >= x1;
            if !horizontal && !vertical {
                continue;
            }
            let along = if horizontal { x - x0 } else { y - y0 };
            if along % DASH_PERIOD < DASH_ON {
                blend(canvas.get_pixel_mut(x, y), tint);
            }
        }
    }
}

fn draw_marker(canvas: &mut RgbaImage, center: Point, radius: f64, line: f64) {
    let reach = radius + line / 2.0;
    let (x0, x1) = span(center.x - reach, reach * 2.0, canvas.width());
    let (y0, y1) = span(center.y - reach, reach * 2.0, canvas.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = f64::from(x) + 0.5 - center.x;
            let dy = f64::from(y) + 0.5 - center.y;
            let distance = (dx * dx + dy * dy).sqrt();
            let pixel = canvas.get_pixel_mut(x, y);
            if distance <= radius {
                blend(pixel, MARKER_FILL);
            }
            if (distance - radius).abs() <= line / 2.0 {
                blend(pixel, MARKER_STROKE);
            }
        }
    }
}
