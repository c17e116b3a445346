//! Text label action.

use super::{DecodeError, default_size, validate_finite, validate_size};
use crate::color::BoardColor;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// A single-line text label anchored at its baseline start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "text")]
    pub content: String,
    #[serde(default)]
    pub color: BoardColor,
    /// Pen size at the time of placement; the font size is derived from it.
    #[serde(rename = "size", default = "default_size")]
    pub size_hint: f64,
}

impl Text {
    /// Create a text label at the given insertion point.
    pub fn new(at: Point, content: impl Into<String>, color: BoardColor, size_hint: f64) -> Self {
        Self {
            x: at.x,
            y: at.y,
            content: content.into(),
            color,
            size_hint,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Font size in pixels: `size * 6 + 12`.
    pub fn font_size(&self) -> f64 {
        self.size_hint * 6.0 + 12.0
    }

    pub(crate) fn validate(&self) -> Result<(), DecodeError> {
        validate_finite("text", "x", self.x)?;
        validate_finite("text", "y", self.y)?;
        validate_size("text", self.size_hint)?;
        if self.content.trim().is_empty() {
            return Err(DecodeError::invalid("text", "text", "must not be blank"));
        }
        Ok(())
    }
}
