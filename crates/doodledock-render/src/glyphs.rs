//! Text shaping and glyph rasterization for the software canvas.
//!
//! Layout goes through parley with a bundled sans-serif face. Each positioned
//! glyph is rendered to an 8-bit coverage mask by swash.

use kurbo::{Point, Rect};
use parley::fontique::Blob;
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, LayoutContext, StyleProperty};
use std::cell::RefCell;
use std::sync::Arc;
use swash::FontRef;
use swash::scale::{Render, ScaleContext, Source};
use swash::zeno::{Format, Vector};

static UI_FONT: &[u8] = epaint_default_fonts::UBUNTU_LIGHT;

/// Coverage of one glyph in canvas pixels.
#[derive(Debug, Clone)]
pub(crate) struct GlyphMask {
    left: i32,
    top: i32,
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl GlyphMask {
    pub(crate) fn bounds(&self) -> Rect {
        Rect::new(
            self.left as f64,
            self.top as f64,
            self.left as f64 + self.width as f64,
            self.top as f64 + self.height as f64,
        )
    }

    /// Coverage in 0..=1 of canvas pixel (x, y), zero outside the glyph.
    pub(crate) fn coverage(&self, x: i64, y: i64) -> f64 {
        let gx = x - self.left as i64;
        let gy = y - self.top as i64;
        if gx < 0 || gy < 0 || gx >= self.width as i64 || gy >= self.height as i64 {
            return 0.0;
        }
        let index = gy as usize * self.width as usize + gx as usize;
        self.alpha.get(index).map_or(0.0, |a| *a as f64 / 255.0)
    }
}

struct TextShaper {
    font_cx: FontContext,
    layout_cx: LayoutContext<()>,
    scale_cx: ScaleContext,
    family: Option<String>,
}

impl TextShaper {
    fn new() -> Self {
        let mut font_cx = FontContext::new();
        let registered = font_cx.collection.register_fonts(Blob::new(Arc::new(UI_FONT)), None);
        let family = registered
            .first()
            .and_then(|(id, _)| font_cx.collection.family_name(*id).map(str::to_owned));
        if family.is_none() {
            log::warn!("Bundled font did not register, text will not render");
        }
        Self {
            font_cx,
            layout_cx: LayoutContext::new(),
            scale_cx: ScaleContext::new(),
            family,
        }
    }

    fn rasterize(&mut self, origin: Point, text: &str, font_size: f64) -> Vec<GlyphMask> {
        let Some(family) = self.family.as_deref() else {
            return Vec::new();
        };

        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(font_size as f32));
        builder.push_default(StyleProperty::FontStack(parley::FontStack::Single(
            parley::FontFamily::Named(family.into()),
        )));
        let mut layout = builder.build(text);
        layout.break_all_lines(None);
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());

        // Layout y runs down from the top of the first line; pin its baseline to origin.y.
        let first_baseline = layout.lines().next().map_or(0.0, |line| line.metrics().baseline as f64);
        let dy = origin.y - first_baseline;

        let mut masks = Vec::new();
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let font = run.font();
                let Some(font_ref) = FontRef::from_index(font.data.data(), font.index as usize) else {
                    log::warn!("Skipping glyph run with unreadable font data");
                    continue;
                };
                let mut scaler = self.scale_cx.builder(font_ref).size(run.font_size()).hint(true).build();

                for glyph in glyph_run.glyphs() {
                    let gx = origin.x + (x + glyph.x) as f64;
                    let gy = (dy + (y - glyph.y) as f64).round();
                    x += glyph.advance;
                    let Ok(id) = u16::try_from(glyph.id) else {
                        continue;
                    };
                    let Some(image) = Render::new(&[Source::Outline])
                        .format(Format::Alpha)
                        .offset(Vector::new((gx - gx.floor()) as f32, 0.0))
                        .render(&mut scaler, id)
                    else {
                        continue;
                    };
                    let placement = image.placement;
                    if placement.width == 0 || placement.height == 0 {
                        continue;
                    }
                    masks.push(GlyphMask {
                        left: gx.floor() as i32 + placement.left,
                        top: gy as i32 - placement.top,
                        width: placement.width,
                        height: placement.height,
                        alpha: image.data,
                    });
                }
            }
        }
        masks
    }
}

thread_local! {
    static SHAPER: RefCell<TextShaper> = RefCell::new(TextShaper::new());
}

/// Shape `text` with its first baseline starting at `origin` and rasterize
/// every visible glyph.
pub(crate) fn rasterize_text(origin: Point, text: &str, font_size: f64) -> Vec<GlyphMask> {
    if text.trim().is_empty() || font_size.is_nan() || font_size <= 0.0 {
        return Vec::new();
    }
    SHAPER.with(|shaper| shaper.borrow_mut().rasterize(origin, text, font_size))
}
