//! Circle outline action.

use super::{DecodeError, default_size, validate_finite, validate_size};
use crate::color::BoardColor;
use kurbo::{Circle as KurboCircle, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// A circle outline spanned by the two points of a drag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    #[serde(rename = "x")]
    pub center_x: f64,
    #[serde(rename = "y")]
    pub center_y: f64,
    #[serde(rename = "r")]
    pub radius: f64,
    #[serde(default)]
    pub color: BoardColor,
    /// Outline width in pixels.
    #[serde(rename = "size", default = "default_size")]
    pub stroke_width: f64,
}

impl Circle {
    /// Create the circle whose diameter is the segment from `anchor` to `release`.
    pub fn from_points(anchor: Point, release: Point, color: BoardColor, stroke_width: f64) -> Self {
        let center = anchor.midpoint(release);
        Self {
            center_x: center.x,
            center_y: center.y,
            radius: anchor.distance(release) / 2.0,
            color,
            stroke_width,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }

    /// The circle as a kurbo Circle.
    pub fn as_circle(&self) -> KurboCircle {
        KurboCircle::new(self.center(), self.radius)
    }

    pub fn bounds(&self) -> Rect {
        self.as_circle().bounding_box()
    }

    pub(crate) fn validate(&self) -> Result<(), DecodeError> {
        validate_finite("circle", "x", self.center_x)?;
        validate_finite("circle", "y", self.center_y)?;
        validate_finite("circle", "r", self.radius)?;
        validate_size("circle", self.stroke_width)?;
        if self.radius < 0.0 {
            return Err(DecodeError::invalid("circle", "r", "must not be negative"));
        }
        Ok(())
    }
}
