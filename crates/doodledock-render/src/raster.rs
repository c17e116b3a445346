//! Software raster canvas.
//!
//! Anti-aliased coverage is computed from the distance between each pixel
//! centre and the primitive's geometry, collected into a per-primitive mask
//! and blended once (source-over) so overlapping segments of one stroke do
//! not darken each other. Text coverage comes from shaped glyph masks.
//! Output depends only on the input sequence.

use crate::glyphs::rasterize_text;
use crate::surface::{RenderResult, RendererError, Surface};
use image::{ImageFormat, Rgba, RgbaImage};
use kurbo::{Circle, Point, Rect, Size};
use peniko::Color;
use std::io::Cursor;
use std::path::Path;

/// Pixel region of a primitive, clipped to the canvas.
#[derive(Debug, Clone, Copy)]
struct Area {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Area {
    fn width(&self) -> usize {
        (self.x1 - self.x0) as usize
    }

    fn height(&self) -> usize {
        (self.y1 - self.y0) as usize
    }

    fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y - self.y0) as usize * self.width() + (x - self.x0) as usize
    }
}

/// A transparent RGBA canvas that actions are painted onto.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterCanvas {
    pixels: RgbaImage,
}

impl RasterCanvas {
    /// Create a transparent canvas.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RendererError::InvalidSize { width, height });
        }
        Ok(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// The painted layer, without background.
    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// RGBA value at (x, y), if inside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Whether nothing has been painted since the last clear.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p.0[3] == 0)
    }

    /// Composite the painted layer over an opaque background.
    pub fn flatten(&self, background: Color) -> RgbaImage {
        let bg = background.to_rgba8();
        let mut out = RgbaImage::from_pixel(self.width(), self.height(), Rgba([bg.r, bg.g, bg.b, 255]));
        for (dst, src) in out.pixels_mut().zip(self.pixels.pixels()) {
            blend(dst, src.0, 1.0);
        }
        out
    }

    /// Encode the canvas over `background` as PNG.
    pub fn to_png(&self, background: Color) -> RenderResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.flatten(background)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| RendererError::Export(e.to_string()))?;
        Ok(bytes)
    }

    /// Write the canvas over `background` to a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>, background: Color) -> RenderResult<()> {
        let path = path.as_ref();
        self.flatten(background)
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| RendererError::Export(e.to_string()))?;
        log::debug!("Exported canvas to {}", path.display());
        Ok(())
    }

    fn clip(&self, bounds: Rect) -> Option<Area> {
        let x0 = bounds.x0.floor().max(0.0);
        let y0 = bounds.y0.floor().max(0.0);
        let x1 = bounds.x1.ceil().min(self.width() as f64);
        let y1 = bounds.y1.ceil().min(self.height() as f64);
        if !(x0 < x1 && y0 < y1) {
            return None;
        }
        Some(Area {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        })
    }

    fn apply_mask(&mut self, area: Area, mask: &[f64], color: Color) {
        let rgba = color.to_rgba8();
        let src = [rgba.r, rgba.g, rgba.b, rgba.a];
        for (x, y) in area.pixels() {
            let coverage = mask[area.index(x, y)];
            if coverage > 0.0 {
                blend(self.pixels.get_pixel_mut(x, y), src, coverage);
            }
        }
    }

    fn stroke_segments(&mut self, points: &[Point], color: Color, width: f64) {
        let Some(&first) = points.first() else {
            return;
        };
        let half = width / 2.0;
        let bounds = points
            .iter()
            .fold(Rect::from_points(first, first), |r, p| r.union_pt(*p))
            .inflate(half + 1.0, half + 1.0);
        let Some(area) = self.clip(bounds) else {
            return;
        };

        let mut mask = vec![0.0_f64; area.width() * area.height()];
        let pairs: Vec<(Point, Point)> = if points.len() == 1 {
            vec![(first, first)]
        } else {
            points.windows(2).map(|w| (w[0], w[1])).collect()
        };
        for (a, b) in pairs {
            let seg_bounds = Rect::from_points(a, b).inflate(half + 1.0, half + 1.0);
            let Some(seg_area) = self.clip(seg_bounds) else {
                continue;
            };
            for (x, y) in seg_area.pixels() {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let coverage = (half + 0.5 - segment_distance(center, a, b)).clamp(0.0, 1.0);
                let slot = &mut mask[area.index(x, y)];
                *slot = slot.max(coverage);
            }
        }
        self.apply_mask(area, &mask, color);
    }
}

impl Surface for RasterCanvas {
    fn size(&self) -> Size {
        Size::new(self.width() as f64, self.height() as f64)
    }

    fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f64) {
        self.stroke_segments(points, color, width);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64) {
        let outline = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
            Point::new(rect.x0, rect.y0),
        ];
        self.stroke_segments(&outline, color, width);
    }

    fn stroke_circle(&mut self, circle: Circle, color: Color, width: f64) {
        let half = width / 2.0;
        let reach = circle.radius + half + 1.0;
        let bounds = Rect::from_center_size(circle.center, (reach * 2.0, reach * 2.0));
        let Some(area) = self.clip(bounds) else {
            return;
        };
        let mut mask = vec![0.0_f64; area.width() * area.height()];
        for (x, y) in area.pixels() {
            let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let d = (center.distance(circle.center) - circle.radius).abs();
            mask[area.index(x, y)] = (half + 0.5 - d).clamp(0.0, 1.0);
        }
        self.apply_mask(area, &mask, color);
    }

    fn fill_text(&mut self, origin: Point, text: &str, font_size: f64, color: Color) {
        let glyphs = rasterize_text(origin, text, font_size);
        let Some(bounds) = glyphs.iter().map(|g| g.bounds()).reduce(|a, b| a.union(b)) else {
            return;
        };
        let Some(area) = self.clip(bounds) else {
            return;
        };
        let mut mask = vec![0.0_f64; area.width() * area.height()];
        for glyph in &glyphs {
            let Some(glyph_area) = self.clip(glyph.bounds()) else {
                continue;
            };
            for (x, y) in glyph_area.pixels() {
                let slot = &mut mask[area.index(x, y)];
                *slot = slot.max(glyph.coverage(x as i64, y as i64));
            }
        }
        self.apply_mask(area, &mask, color);
    }
}

/// Distance from `p` to the segment `a`-`b`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Source-over blend of `src` at `coverage` onto `dst`, straight alpha.
fn blend(dst: &mut Rgba<u8>, src: [u8; 4], coverage: f64) {
    let sa = src[3] as f64 / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let c = (src[i] as f64 * sa + dst.0[i] as f64 * da * (1.0 - sa)) / out_a;
        dst.0[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::from_rgba8(255, 0, 0, 255);

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            RasterCanvas::new(0, 10),
            Err(RendererError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_polyline_covers_its_path_only() {
        let mut canvas = RasterCanvas::new(20, 20).unwrap();
        canvas.stroke_polyline(&[Point::new(2.0, 10.0), Point::new(18.0, 10.0)], RED, 4.0);
        assert_eq!(canvas.pixel(10, 9), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(10, 2), Some([0, 0, 0, 0]));
        assert!(!canvas.is_blank());
    }

    #[test]
    fn test_rect_outline_leaves_interior() {
        let mut canvas = RasterCanvas::new(40, 40).unwrap();
        canvas.stroke_rect(Rect::new(5.0, 5.0, 35.0, 35.0), RED, 2.0);
        assert_eq!(canvas.pixel(5, 20).map(|p| p[3]), Some(255));
        assert_eq!(canvas.pixel(20, 20), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_circle_outline() {
        let mut canvas = RasterCanvas::new(40, 40).unwrap();
        canvas.stroke_circle(Circle::new((20.0, 20.0), 10.0), RED, 2.0);
        // Pixel (29, 19) has its centre at (29.5, 19.5), about 9.5 from the centre.
        assert!(canvas.pixel(29, 19).is_some_and(|p| p[3] > 0));
        assert_eq!(canvas.pixel(20, 20), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_text_content_changes_pixels() {
        let mut hello = RasterCanvas::new(200, 60).unwrap();
        let mut world = RasterCanvas::new(200, 60).unwrap();
        hello.fill_text(Point::new(10.0, 40.0), "hello", 24.0, RED);
        world.fill_text(Point::new(10.0, 40.0), "WORLD", 24.0, RED);
        assert!(!hello.is_blank());
        assert!(!world.is_blank());
        assert_ne!(hello, world);
    }

    #[test]
    fn test_text_ink_sits_above_baseline() {
        let mut canvas = RasterCanvas::new(200, 60).unwrap();
        canvas.fill_text(Point::new(10.0, 40.0), "hello", 24.0, RED);
        let inked: Vec<(u32, u32)> = (0..200)
            .flat_map(|x| (0..60).map(move |y| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y).is_some_and(|p| p[3] > 0))
            .collect();
        assert!(!inked.is_empty());
        // No descenders in "hello".
        assert!(inked.iter().all(|&(_, y)| y <= 41));
        assert!(inked.iter().all(|&(x, _)| x >= 9));
        assert!(inked.iter().all(|&(x, y)| canvas.pixel(x, y).is_some_and(|p| p[0] == 255 && p[1] == 0)));
    }

    #[test]
    fn test_whitespace_text_paints_nothing() {
        let mut canvas = RasterCanvas::new(50, 50).unwrap();
        canvas.fill_text(Point::new(5.0, 30.0), "  \t ", 20.0, RED);
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_clear_and_offscreen_geometry() {
        let mut canvas = RasterCanvas::new(10, 10).unwrap();
        canvas.stroke_polyline(&[Point::new(-50.0, -50.0), Point::new(-40.0, -40.0)], RED, 2.0);
        assert!(canvas.is_blank());
        canvas.stroke_polyline(&[Point::new(0.0, 5.0), Point::new(10.0, 5.0)], RED, 2.0);
        canvas.clear();
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_flatten_over_background() {
        let canvas = RasterCanvas::new(2, 2).unwrap();
        let flat = canvas.flatten(Color::from_rgba8(0xFD, 0xF6, 0xE3, 255));
        assert_eq!(flat.get_pixel(0, 0).0, [0xFD, 0xF6, 0xE3, 255]);
    }

    #[test]
    fn test_png_export_signature() {
        let canvas = RasterCanvas::new(4, 4).unwrap();
        let png = canvas.to_png(Color::WHITE).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
