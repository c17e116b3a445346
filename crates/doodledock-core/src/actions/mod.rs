//! Whiteboard actions: the immutable entries of a room's action log.
//!
//! Every edit to a board is one [`Action`]. The log is an ordered sequence of
//! actions and the canvas is rebuilt by painting them in order. Actions carry
//! no identity or version; reconciliation is purely append-by-position.

mod circle;
mod codec;
mod rectangle;
mod stroke;
mod text;

pub use circle::Circle;
pub use codec::{LEGACY_SEGMENT_TAG, decode, decode_all, encode, encode_all};
pub use rectangle::Rectangle;
pub use stroke::Stroke;
pub use text::Text;

use crate::color::BoardColor;
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pen size assumed when a record omits it.
pub const DEFAULT_RECORD_SIZE: f64 = 2.0;

pub(crate) fn default_size() -> f64 {
    DEFAULT_RECORD_SIZE
}

/// Errors produced while decoding a transport record into an [`Action`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("record has no \"type\" field")]
    MissingType,
    #[error("unknown action type {0:?}")]
    UnknownType(String),
    #[error("malformed {kind} record: {message}")]
    Malformed { kind: &'static str, message: String },
    #[error("invalid {kind}.{field}: {reason}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn invalid(kind: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidField {
            kind,
            field,
            reason: reason.into(),
        }
    }
}

pub(crate) fn validate_finite(kind: &'static str, field: &'static str, value: f64) -> Result<(), DecodeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DecodeError::invalid(kind, field, "must be a finite number"))
    }
}

/// Pen size shared by every variant: finite and above zero.
pub(crate) fn validate_size(kind: &'static str, value: f64) -> Result<(), DecodeError> {
    validate_finite(kind, "size", value)?;
    if value <= 0.0 {
        return Err(DecodeError::invalid(kind, "size", "must be positive"));
    }
    Ok(())
}

/// One discrete, immutable whiteboard edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "stroke")]
    Stroke(Stroke),
    #[serde(rename = "rect")]
    Rectangle(Rectangle),
    #[serde(rename = "circle")]
    Circle(Circle),
    #[serde(rename = "text")]
    Text(Text),
}

impl Action {
    /// The wire tag of this action.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Stroke(_) => "stroke",
            Action::Rectangle(_) => "rect",
            Action::Circle(_) => "circle",
            Action::Text(_) => "text",
        }
    }

    pub fn color(&self) -> BoardColor {
        match self {
            Action::Stroke(s) => s.color,
            Action::Rectangle(r) => r.color,
            Action::Circle(c) => c.color,
            Action::Text(t) => t.color,
        }
    }

    /// Geometric bounds, not including stroke width. Text reports its anchor only.
    pub fn bounds(&self) -> Rect {
        match self {
            Action::Stroke(s) => s.bounds(),
            Action::Rectangle(r) => r.as_rect(),
            Action::Circle(c) => c.bounds(),
            Action::Text(t) => Rect::from_points(t.origin(), t.origin()),
        }
    }

    /// Check the invariants every action in a log must satisfy.
    pub fn validate(&self) -> Result<(), DecodeError> {
        match self {
            Action::Stroke(s) => s.validate(),
            Action::Rectangle(r) => r.validate(),
            Action::Circle(c) => c.validate(),
            Action::Text(t) => t.validate(),
        }
    }
}

impl From<Stroke> for Action {
    fn from(stroke: Stroke) -> Self {
        Action::Stroke(stroke)
    }
}

impl From<Rectangle> for Action {
    fn from(rect: Rectangle) -> Self {
        Action::Rectangle(rect)
    }
}

impl From<Circle> for Action {
    fn from(circle: Circle) -> Self {
        Action::Circle(circle)
    }
}

impl From<Text> for Action {
    fn from(text: Text) -> Self {
        Action::Text(text)
    }
}
