//! Local drawing engine: turns pointer gestures into actions.
//!
//! Each gesture is a small state machine driven by pointer events. Freehand
//! capture reports every new segment so the host can paint it immediately;
//! shape tools report a non-committed preview; the text tool records an
//! insertion point and waits for submitted content. At most one action comes
//! out of a gesture.

use crate::actions::{Action, Circle, Rectangle, Stroke, Text};
use crate::color::BoardColor;
use crate::config::DrawingSessionConfig;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Pen,
    #[serde(alias = "rect")]
    Rectangle,
    Circle,
    Text,
    /// Freehand capture in the background color at a fixed large width.
    Eraser,
}

/// How a tool turns pointer input into an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    Freehand,
    Shape,
    Text,
}

impl ToolKind {
    pub fn family(self) -> ToolFamily {
        match self {
            ToolKind::Pen | ToolKind::Eraser => ToolFamily::Freehand,
            ToolKind::Rectangle | ToolKind::Circle => ToolFamily::Shape,
            ToolKind::Text => ToolFamily::Text,
        }
    }

    /// Label shown next to this user's cursor on other clients.
    pub fn label(self) -> &'static str {
        match self {
            ToolKind::Pen => "Pen",
            ToolKind::Rectangle => "Rect",
            ToolKind::Circle => "Circle",
            ToolKind::Text => "Text",
            ToolKind::Eraser => "Eraser",
        }
    }
}

/// Reasons a gesture produced no action. Never shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no gesture in progress")]
    NoGesture,
    #[error("stroke captured {0} point(s), needs at least 2")]
    TooFewPoints(usize),
    #[error("shape gesture ended without pointer movement")]
    NoMovement,
    #[error("shape has zero size")]
    DegenerateShape,
    #[error("text is empty")]
    EmptyText,
    #[error("text gesture is waiting for submitted content")]
    AwaitingText,
}

/// Ink captured when a gesture starts; settings changes mid-gesture do not apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureInk {
    pub color: BoardColor,
    pub width: f64,
}

/// State of the current gesture.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolState {
    /// Waiting for pointer-down.
    #[default]
    Idle,
    /// Freehand capture in progress.
    Capturing { points: Vec<Point>, ink: GestureInk },
    /// Shape anchor placed, pointer has not moved yet.
    Anchoring {
        tool: ToolKind,
        anchor: Point,
        ink: GestureInk,
    },
    /// Shape being dragged; `current` is the latest pointer position.
    Previewing {
        tool: ToolKind,
        anchor: Point,
        current: Point,
        ink: GestureInk,
    },
    /// Text insertion point recorded, waiting for content.
    Positioned { at: Point },
}

/// What the host should draw in response to a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureFeedback {
    /// Nothing to draw.
    None,
    /// Paint this segment onto the committed canvas right away.
    Segment {
        from: Point,
        to: Point,
        color: BoardColor,
        width: f64,
    },
    /// Replace the preview overlay with this uncommitted action.
    Preview(Action),
    /// Show a text entry at this point.
    Positioned(Point),
}

/// Converts pointer gestures into actions for one client.
#[derive(Debug, Clone, Default)]
pub struct DrawingEngine {
    state: ToolState,
}

impl DrawingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    /// Whether a gesture is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ToolState::Idle)
    }

    /// Pointer-down (or click, for the text tool). Restarts any gesture in progress.
    pub fn start_gesture(&mut self, point: Point, config: &DrawingSessionConfig) -> GestureFeedback {
        let ink = GestureInk {
            color: config.ink(),
            width: config.ink_width(),
        };
        match config.tool.family() {
            ToolFamily::Freehand => {
                self.state = ToolState::Capturing {
                    points: vec![point],
                    ink,
                };
                GestureFeedback::None
            }
            ToolFamily::Shape => {
                self.state = ToolState::Anchoring {
                    tool: config.tool,
                    anchor: point,
                    ink,
                };
                GestureFeedback::None
            }
            ToolFamily::Text => {
                self.state = ToolState::Positioned { at: point };
                GestureFeedback::Positioned(point)
            }
        }
    }

    /// Pointer-move.
    pub fn update_pointer(&mut self, point: Point) -> GestureFeedback {
        match &mut self.state {
            ToolState::Capturing { points, ink } => {
                let Some(&last) = points.last() else {
                    points.push(point);
                    return GestureFeedback::None;
                };
                // Repeated samples would only add zero-length segments.
                if last == point {
                    return GestureFeedback::None;
                }
                points.push(point);
                GestureFeedback::Segment {
                    from: last,
                    to: point,
                    color: ink.color,
                    width: ink.width,
                }
            }
            ToolState::Anchoring { tool, anchor, ink } => {
                let (tool, anchor, ink) = (*tool, *anchor, *ink);
                self.state = ToolState::Previewing {
                    tool,
                    anchor,
                    current: point,
                    ink,
                };
                GestureFeedback::Preview(shape_action(tool, anchor, point, ink))
            }
            ToolState::Previewing {
                tool,
                anchor,
                current,
                ink,
            } => {
                *current = point;
                GestureFeedback::Preview(shape_action(*tool, *anchor, point, *ink))
            }
            ToolState::Idle | ToolState::Positioned { .. } => GestureFeedback::None,
        }
    }

    /// Pointer-up. Returns the committed action, or why there is none.
    ///
    /// Shapes span from the anchor to the last reported pointer position.
    /// A text gesture stays positioned; use [`DrawingEngine::submit_text`].
    pub fn commit_gesture(&mut self) -> Result<Action, InputError> {
        match std::mem::take(&mut self.state) {
            ToolState::Idle => Err(InputError::NoGesture),
            ToolState::Positioned { at } => {
                self.state = ToolState::Positioned { at };
                Err(InputError::AwaitingText)
            }
            ToolState::Capturing { points, ink } => {
                if points.len() < Stroke::MIN_POINTS {
                    return Err(InputError::TooFewPoints(points.len()));
                }
                Ok(Action::Stroke(Stroke::new(points, ink.color, ink.width)))
            }
            ToolState::Anchoring { .. } => Err(InputError::NoMovement),
            ToolState::Previewing {
                tool,
                anchor,
                current,
                ink,
            } => {
                let action = shape_action(tool, anchor, current, ink);
                if is_degenerate(&action) {
                    return Err(InputError::DegenerateShape);
                }
                Ok(action)
            }
        }
    }

    /// Submit text for the recorded insertion point.
    ///
    /// Blank content is rejected and the insertion point is kept.
    pub fn submit_text(&mut self, content: &str, config: &DrawingSessionConfig) -> Result<Action, InputError> {
        let ToolState::Positioned { at } = self.state else {
            return Err(InputError::NoGesture);
        };
        if content.trim().is_empty() {
            return Err(InputError::EmptyText);
        }
        self.state = ToolState::Idle;
        Ok(Action::Text(Text::new(at, content, config.color, config.stroke_width)))
    }

    /// Abandon the current gesture without producing an action.
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    /// The uncommitted shape currently being dragged, if any.
    pub fn preview(&self) -> Option<Action> {
        match &self.state {
            ToolState::Previewing {
                tool,
                anchor,
                current,
                ink,
            } => Some(shape_action(*tool, *anchor, *current, *ink)),
            _ => None,
        }
    }

    /// Points captured so far by a freehand gesture.
    pub fn captured_points(&self) -> &[Point] {
        match &self.state {
            ToolState::Capturing { points, .. } => points,
            _ => &[],
        }
    }
}

fn shape_action(tool: ToolKind, anchor: Point, current: Point, ink: GestureInk) -> Action {
    match tool {
        ToolKind::Circle => Action::Circle(Circle::from_points(anchor, current, ink.color, ink.width)),
        _ => Action::Rectangle(Rectangle::from_corners(anchor, current, ink.color, ink.width)),
    }
}

fn is_degenerate(action: &Action) -> bool {
    match action {
        Action::Rectangle(rect) => rect.is_degenerate(),
        Action::Circle(circle) => circle.radius == 0.0,
        _ => false,
    }
}
