//! Rectangle outline action.

use super::{DecodeError, default_size, validate_finite, validate_size};
use crate::color::BoardColor;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle outline with non-negative extents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    #[serde(rename = "w")]
    pub width: f64,
    #[serde(rename = "h")]
    pub height: f64,
    #[serde(default)]
    pub color: BoardColor,
    /// Outline width in pixels.
    #[serde(rename = "size", default = "default_size")]
    pub stroke_width: f64,
}

impl Rectangle {
    /// Create a rectangle from two arbitrary corner points.
    ///
    /// The result is normalized so the origin is the top-left corner and
    /// width/height are never negative, whichever corner the drag began from.
    pub fn from_corners(p1: Point, p2: Point, color: BoardColor, stroke_width: f64) -> Self {
        Self {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            width: (p2.x - p1.x).abs(),
            height: (p2.y - p1.y).abs(),
            color,
            stroke_width,
        }
    }

    /// The rectangle as a kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Whether both extents are zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    pub(crate) fn validate(&self) -> Result<(), DecodeError> {
        validate_finite("rect", "x", self.x)?;
        validate_finite("rect", "y", self.y)?;
        validate_finite("rect", "w", self.width)?;
        validate_finite("rect", "h", self.height)?;
        validate_size("rect", self.stroke_width)?;
        if self.width < 0.0 {
            return Err(DecodeError::invalid("rect", "w", "must not be negative"));
        }
        if self.height < 0.0 {
            return Err(DecodeError::invalid("rect", "h", "must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_any_direction() {
        let corners = [
            (Point::new(10.0, 10.0), Point::new(40.0, 30.0)),
            (Point::new(40.0, 30.0), Point::new(10.0, 10.0)),
            (Point::new(40.0, 10.0), Point::new(10.0, 30.0)),
            (Point::new(10.0, 30.0), Point::new(40.0, 10.0)),
        ];
        for (a, b) in corners {
            let rect = Rectangle::from_corners(a, b, BoardColor::black(), 2.0);
            assert_eq!((rect.x, rect.y), (10.0, 10.0));
            assert_eq!((rect.width, rect.height), (30.0, 20.0));
        }
    }

    #[test]
    fn test_degenerate() {
        let p = Point::new(5.0, 5.0);
        assert!(Rectangle::from_corners(p, p, BoardColor::black(), 2.0).is_degenerate());
        let line = Rectangle::from_corners(p, Point::new(5.0, 9.0), BoardColor::black(), 2.0);
        assert!(!line.is_degenerate());
    }

    #[test]
    fn test_negative_extent_is_invalid() {
        let mut rect = Rectangle::from_corners(
            Point::ZERO,
            Point::new(10.0, 10.0),
            BoardColor::black(),
            2.0,
        );
        rect.width = -1.0;
        assert!(rect.validate().is_err());
    }
}
