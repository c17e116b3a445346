//! Freehand stroke action.

use super::{DecodeError, default_size, validate_finite, validate_size};
use crate::color::BoardColor;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A complete freehand path captured as one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Points in capture order.
    pub points: Vec<Point>,
    /// Ink color.
    #[serde(default)]
    pub color: BoardColor,
    /// Line width in pixels.
    #[serde(rename = "size", default = "default_size")]
    pub width: f64,
}

impl Stroke {
    /// Minimum number of points for a committable stroke.
    pub const MIN_POINTS: usize = 2;

    /// Create a stroke from captured points.
    pub fn new(points: Vec<Point>, color: BoardColor, width: f64) -> Self {
        Self {
            points,
            color,
            width,
        }
    }

    /// Number of points in the path.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the path has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Consecutive point pairs, in paint order.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    /// Bounding box of the path, not including line width.
    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
    }

    pub(crate) fn validate(&self) -> Result<(), DecodeError> {
        if self.points.len() < Self::MIN_POINTS {
            return Err(DecodeError::invalid(
                "stroke",
                "points",
                format!("needs at least {} points, got {}", Self::MIN_POINTS, self.points.len()),
            ));
        }
        for p in &self.points {
            validate_finite("stroke", "points", p.x)?;
            validate_finite("stroke", "points", p.y)?;
        }
        validate_size("stroke", self.width)
    }
}
