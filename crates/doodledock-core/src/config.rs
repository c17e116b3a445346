//! Per-session drawing settings.

use crate::color::{BoardColor, DEFAULT_BACKGROUND, DEFAULT_INK};
use crate::history::UndoPolicy;
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pen size for new sessions.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
/// Smallest pen size the session accepts.
pub const MIN_STROKE_WIDTH: f64 = 1.0;
/// Largest pen size the session accepts.
pub const MAX_STROKE_WIDTH: f64 = 10.0;
/// Fixed width of eraser strokes.
pub const ERASER_WIDTH: f64 = 16.0;

/// Tool, ink and canvas settings for one drawing session.
///
/// Passed explicitly into the drawing engine rather than held as ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingSessionConfig {
    /// Active tool.
    pub tool: ToolKind,
    /// Ink color for new actions.
    pub color: BoardColor,
    /// Pen size for new actions.
    pub stroke_width: f64,
    /// Canvas background; also the eraser ink.
    pub background: BoardColor,
    /// How local undo interacts with remote snapshots.
    #[serde(default)]
    pub undo_policy: UndoPolicy,
    /// Hide remote cursors older than this. `None` keeps them until overwritten.
    #[serde(default)]
    pub presence_ttl: Option<Duration>,
}

impl Default for DrawingSessionConfig {
    fn default() -> Self {
        Self {
            tool: ToolKind::default(),
            color: DEFAULT_INK,
            stroke_width: DEFAULT_STROKE_WIDTH,
            background: DEFAULT_BACKGROUND,
            undo_policy: UndoPolicy::default(),
            presence_ttl: None,
        }
    }
}

impl DrawingSessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pen size, clamped to the supported range. Non-finite input is ignored.
    pub fn set_stroke_width(&mut self, width: f64) {
        if width.is_finite() {
            self.stroke_width = width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
        }
    }

    /// Color that freehand capture paints with under the current tool.
    pub fn ink(&self) -> BoardColor {
        if self.tool == ToolKind::Eraser {
            self.background
        } else {
            self.color
        }
    }

    /// Width that freehand capture paints with under the current tool.
    pub fn ink_width(&self) -> f64 {
        if self.tool == ToolKind::Eraser {
            ERASER_WIDTH
        } else {
            self.stroke_width
        }
    }

    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tool = tool;
        self
    }

    pub fn with_color(mut self, color: BoardColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_undo_policy(mut self, policy: UndoPolicy) -> Self {
        self.undo_policy = policy;
        self
    }

    pub fn with_presence_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.presence_ttl = ttl;
        self
    }
}
