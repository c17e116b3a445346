//! DoodleDock Render Library
//!
//! Deterministic replay of whiteboard action logs onto drawing surfaces.
//! Ships a software raster canvas (with PNG export) and a recording scene
//! for hosts that bring their own backend.

mod glyphs;
mod raster;
mod replay;
mod scene;
mod surface;

pub use raster::RasterCanvas;
pub use replay::{paint_action, paint_cursors, paint_feedback, paint_preview, render};
pub use scene::{DrawCommand, Scene};
pub use surface::{RenderResult, RendererError, Surface};
