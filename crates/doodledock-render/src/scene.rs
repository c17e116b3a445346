//! Recording surface.

use crate::surface::Surface;
use kurbo::{Circle, Point, Rect, Size};
use peniko::Color;

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Polyline { points: Vec<Point>, color: Color, width: f64 },
    Rect { rect: Rect, color: Color, width: f64 },
    Circle { circle: Circle, color: Color, width: f64 },
    Text { origin: Point, text: String, font_size: f64, color: Color },
}

/// A display list of drawing calls.
///
/// Lets hosts with their own backend (GPU scene, SVG, canvas 2D) consume the
/// replay output, and lets tests inspect paint order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl Scene {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drop all recorded commands.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// Re-issue every recorded command, in order, on another surface.
    pub fn replay_onto<S: Surface + ?Sized>(&self, surface: &mut S) {
        for command in &self.commands {
            match command {
                DrawCommand::Clear => surface.clear(),
                DrawCommand::Polyline { points, color, width } => surface.stroke_polyline(points, *color, *width),
                DrawCommand::Rect { rect, color, width } => surface.stroke_rect(*rect, *color, *width),
                DrawCommand::Circle { circle, color, width } => surface.stroke_circle(*circle, *color, *width),
                DrawCommand::Text {
                    origin,
                    text,
                    font_size,
                    color,
                } => surface.fill_text(*origin, text, *font_size, *color),
            }
        }
    }
}

impl Surface for Scene {
    fn size(&self) -> Size {
        self.size
    }

    /// Clearing discards everything recorded before it.
    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f64) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            color,
            width,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64) {
        self.commands.push(DrawCommand::Rect { rect, color, width });
    }

    fn stroke_circle(&mut self, circle: Circle, color: Color, width: f64) {
        self.commands.push(DrawCommand::Circle { circle, color, width });
    }

    fn fill_text(&mut self, origin: Point, text: &str, font_size: f64, color: Color) {
        self.commands.push(DrawCommand::Text {
            origin,
            text: text.to_string(),
            font_size,
            color,
        });
    }
}
