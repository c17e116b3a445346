//! Replay of action sequences onto a surface.
//!
//! Painter's algorithm: the surface is cleared and every action is painted in
//! log order with its own color, width and content. There is no layering
//! beyond log order, and erasing is just painting in the background color.

use crate::surface::Surface;
use doodledock_core::actions::Action;
use doodledock_core::presence::PresenceMap;
use doodledock_core::tools::GestureFeedback;
use kurbo::Point;
use peniko::Color;

/// Size of the label drawn next to remote cursors.
const CURSOR_LABEL_SIZE: f64 = 12.0;

/// Clear `surface` and paint `actions` in order.
pub fn render<S: Surface + ?Sized>(surface: &mut S, actions: &[Action]) {
    surface.clear();
    for action in actions {
        paint_action(surface, action);
    }
}

/// Paint one action on top of whatever the surface already shows.
pub fn paint_action<S: Surface + ?Sized>(surface: &mut S, action: &Action) {
    let color: Color = action.color().into();
    match action {
        Action::Stroke(stroke) => surface.stroke_polyline(&stroke.points, color, stroke.width),
        Action::Rectangle(rect) => surface.stroke_rect(rect.as_rect(), color, rect.stroke_width),
        Action::Circle(circle) => surface.stroke_circle(circle.as_circle(), color, circle.stroke_width),
        Action::Text(text) => surface.fill_text(text.origin(), &text.content, text.font_size(), color),
    }
}

/// Paint the incremental result of a pointer event onto the committed canvas.
///
/// Only freehand segments are painted here; previews belong on an overlay
/// (see [`paint_preview`]) and text entry is the host's business.
pub fn paint_feedback<S: Surface + ?Sized>(surface: &mut S, feedback: &GestureFeedback) {
    if let GestureFeedback::Segment { from, to, color, width } = feedback {
        surface.stroke_polyline(&[*from, *to], (*color).into(), *width);
    }
}

/// Redraw the preview overlay: clear it, then paint the uncommitted shape.
pub fn paint_preview<S: Surface + ?Sized>(overlay: &mut S, preview: Option<&Action>) {
    overlay.clear();
    if let Some(action) = preview {
        paint_action(overlay, action);
    }
}

/// Draw remote cursors as small pointers labelled with name and tool.
pub fn paint_cursors<S: Surface + ?Sized>(overlay: &mut S, cursors: &PresenceMap, color: Color) {
    for cursor in cursors.values() {
        let tip = cursor.position();
        let pointer = [
            tip,
            Point::new(tip.x, tip.y + 18.0),
            Point::new(tip.x + 14.0, tip.y + 14.0),
            tip,
        ];
        overlay.stroke_polyline(&pointer, color, 1.5);
        let label = format!("{} ({})", cursor.display_name, cursor.tool_label);
        overlay.fill_text(
            Point::new(tip.x + 16.0, tip.y + 30.0),
            &label,
            CURSOR_LABEL_SIZE,
            color,
        );
    }
}
