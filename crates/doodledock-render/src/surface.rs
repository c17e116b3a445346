//! Drawing surface abstraction.

use kurbo::{Circle, Point, Rect, Size};
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Export failed: {0}")]
    Export(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Trait for drawing backends.
///
/// Implementations can rasterize directly, record a display list, or hand
/// the primitives to a GPU scene. All coordinates are canvas pixels.
pub trait Surface {
    /// Surface size in pixels.
    fn size(&self) -> Size;

    /// Erase everything to transparent.
    fn clear(&mut self);

    /// Stroke an open polyline with round joins and caps.
    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f64);

    /// Stroke the outline of a rectangle.
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64);

    /// Stroke the outline of a circle.
    fn stroke_circle(&mut self, circle: Circle, color: Color, width: f64);

    /// Fill a single line of text starting at `origin` on its baseline.
    fn fill_text(&mut self, origin: Point, text: &str, font_size: f64, color: Color);
}
