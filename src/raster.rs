//! Software rasterizer used by widgets to draw into their own pixel buffers.
//!
//! No GPU dependencies: a [`Canvas`] is a plain ARGB pixel array that is turned
//! into BGRA bytes once a widget has finished drawing.

use crate::error::{ConfigError, WidgetError};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::imageops::FilterType;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const GREEN: Color = Color { r: 0x16, g: 0xa3, b: 0x4a, a: 255 };
    pub const BLUE: Color = Color { r: 0x21, g: 0x96, b: 0xf3, a: 255 };

    pub fn from_hex(hex: &str) -> Option<Color> {
        let hex = hex.strip_prefix('#')?;
        let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok().map(|v| v * 17);
        match hex.len() {
            8 => Some(Color { r: pair(0)?, g: pair(2)?, b: pair(4)?, a: pair(6)? }),
            6 => Some(Color { r: pair(0)?, g: pair(2)?, b: pair(4)?, a: 255 }),
            3 => Some(Color { r: nibble(0)?, g: nibble(1)?, b: nibble(2)?, a: 255 }),
            _ => None,
        }
    }

    /// `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    fn from_function(s: &str) -> Option<Color> {
        let inner = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<u8> = inner.split(',').map(|p| p.trim().parse().ok()).collect::<Option<_>>()?;
        match parts.as_slice() {
            [r, g, b] => Some(Color { r: *r, g: *g, b: *b, a: 255 }),
            [r, g, b, a] => Some(Color { r: *r, g: *g, b: *b, a: *a }),
            _ => None,
        }
    }

    pub fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Color::from_hex(s)
            .or_else(|| Color::from_function(s))
            .ok_or_else(|| format!("invalid color {:?}", s))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Where a text run is attached relative to its reference point, in the
/// two-letter form `lt`, `mm`, `rb` and so on (horizontal then vertical).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    h: Align,
    v: Align,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Start,
    Middle,
    End,
}

impl Anchor {
    pub const LEFT_TOP: Anchor = Anchor { h: Align::Start, v: Align::Start };
    pub const MIDDLE_TOP: Anchor = Anchor { h: Align::Middle, v: Align::Start };
    pub const MIDDLE: Anchor = Anchor { h: Align::Middle, v: Align::Middle };

    /// Top-left corner of a `w` x `h` run anchored at `(x, y)`.
    pub fn origin(self, x: f32, y: f32, w: f32, h: f32) -> (f32, f32) {
        let offset = |align: Align, extent: f32| match align {
            Align::Start => 0.0,
            Align::Middle => extent / 2.0,
            Align::End => extent,
        };
        (x - offset(self.h, w), y - offset(self.v, h))
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let h = match chars.next() {
            Some('l') => Align::Start,
            Some('m') => Align::Middle,
            Some('r') => Align::End,
            _ => return Err(format!("unknown anchor: {}", s)),
        };
        let v = match chars.next() {
            Some('t') => Align::Start,
            Some('m') => Align::Middle,
            Some('b') => Align::End,
            _ => return Err(format!("unknown anchor: {}", s)),
        };
        if chars.next().is_some() {
            return Err(format!("unknown anchor: {}", s));
        }
        Ok(Anchor { h, v })
    }
}

/// Pixel buffer for one widget.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![background.to_argb(); width as usize * height as usize],
        }
    }

    /// Build from tightly packed RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Self {
        let pixels = rgba
            .chunks_exact(4)
            .map(|p| Color { r: p[0], g: p[1], b: p[2], a: p[3] }.to_argb())
            .collect();
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w as i32).min(self.width as i32);
        let y1 = (y + h as i32).min(self.height as i32);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let argb = color.to_argb();
        for py in y0..y1 {
            let row = (py as u32 * self.width) as usize;
            self.pixels[row + x0 as usize..row + x1 as usize].fill(argb);
        }
    }

    /// Composite `argb` over the pixel at `(x, y)` with extra coverage `coverage`.
    pub fn blend_pixel(&mut self, x: i32, y: i32, argb: u32, coverage: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = (y as u32 * self.width + x as u32) as usize;
        let bg = self.pixels[idx];

        let a = ((argb >> 24) & 0xFF) * coverage as u32 / 255;
        if a == 0 {
            return;
        }
        let inv_a = 255 - a;
        let channel = |shift: u32| {
            let fg = (argb >> shift) & 0xFF;
            let bg = (bg >> shift) & 0xFF;
            (fg * a + bg * inv_a) / 255
        };
        let bg_a = (bg >> 24) & 0xFF;
        let out_a = a + bg_a * inv_a / 255;

        self.pixels[idx] = (out_a << 24) | (channel(16) << 16) | (channel(8) << 8) | channel(0);
    }

    /// A straight line `thickness` pixels wide.
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), thickness: u32, color: Color) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
        let half = thickness as i32 / 2;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = (from.0 + dx * t).round() as i32;
            let y = (from.1 + dy * t).round() as i32;
            self.fill_rect(x - half, y - half, thickness.max(1), thickness.max(1), color);
        }
    }

    /// Outline of a rounded rectangle, drawn inside its bounds.
    pub fn stroke_rounded_rect(&mut self, x: i32, y: i32, w: u32, h: u32, radius: f32, thickness: u32, color: Color) {
        let argb = color.to_argb();
        let t = thickness as f32;
        let (inner_w, inner_h) = (w as f32 - 2.0 * t, h as f32 - 2.0 * t);
        for py in 0..h {
            for px in 0..w {
                let (fx, fy) = (px as f32 + 0.5, py as f32 + 0.5);
                if !in_rounded_rect(fx, fy, w as f32, h as f32, radius) {
                    continue;
                }
                let inside_inner = inner_w > 0.0
                    && inner_h > 0.0
                    && in_rounded_rect(fx - t, fy - t, inner_w, inner_h, (radius - t).max(0.0));
                if !inside_inner {
                    self.blend_pixel(x + px as i32, y + py as i32, argb, 255);
                }
            }
        }
    }

    /// Alpha-composite `src` with its top-left at `(x, y)`, optionally clipped
    /// to a rounded rectangle with corner `radius`.
    pub fn blit(&mut self, src: &Canvas, x: i32, y: i32, radius: Option<f32>) {
        for sy in 0..src.height {
            for sx in 0..src.width {
                if let Some(r) = radius {
                    if !in_rounded_rect(sx as f32 + 0.5, sy as f32 + 0.5, src.width as f32, src.height as f32, r) {
                        continue;
                    }
                }
                let argb = src.pixels[(sy * src.width + sx) as usize];
                self.blend_pixel(x + sx as i32, y + sy as i32, argb, 255);
            }
        }
    }

    /// Draw a single line of text anchored at `(x, y)`.
    pub fn draw_text(&mut self, font: &Font, text: &str, size: f32, at: (f32, f32), anchor: Anchor, color: Color) {
        if text.is_empty() || size <= 0.0 {
            return;
        }
        let (w, h) = text_size(font, text, size);
        let (left, top) = anchor.origin(at.0, at.1, w, h);

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings { x: left, y: top, ..LayoutSettings::default() });
        layout.append(&[font], &TextStyle::new(text, size, 0));

        let argb = color.to_argb();
        for glyph in layout.glyphs() {
            let (metrics, bitmap) = font.rasterize_config(glyph.key);
            if metrics.width == 0 {
                continue;
            }
            let gx = glyph.x.round() as i32;
            let gy = glyph.y.round() as i32;
            for (i, coverage) in bitmap.iter().enumerate() {
                if *coverage == 0 {
                    continue;
                }
                let px = gx + (i % metrics.width) as i32;
                let py = gy + (i / metrics.width) as i32;
                self.blend_pixel(px, py, argb, *coverage);
            }
        }
    }

    /// BGRA bytes, row-major: exactly `width * height * 4` of them.
    pub fn into_bgra(self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
    }
}

/// Whether the point lies inside a `w` x `h` rectangle at the origin with rounded corners.
fn in_rounded_rect(px: f32, py: f32, w: f32, h: f32, radius: f32) -> bool {
    if px < 0.0 || py < 0.0 || px > w || py > h {
        return false;
    }
    let r = radius.min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return true;
    }
    let cx = px.clamp(r, w - r);
    let cy = py.clamp(r, h - r);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

/// Pixel width and line height of `text` at `size`.
pub fn text_size(font: &Font, text: &str, size: f32) -> (f32, f32) {
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings::default());
    layout.append(&[font], &TextStyle::new(text, size, 0));

    let height = layout.height();
    let width = match (layout.glyphs().first(), layout.glyphs().last()) {
        (Some(first), Some(last)) => (last.x + last.width as f32 - first.x.floor()).max(0.0),
        _ => 0.0,
    };
    (width, height)
}

/// Largest whole font size whose text fits within 90% of the box, capped at `max_size`.
pub fn fit_font_size(font: &Font, text: &str, max_width: f32, max_height: f32, max_size: f32) -> f32 {
    let mut size = 1.0f32;
    while size < max_size {
        let next = size + 1.0;
        let (w, _) = text_size(font, text, next);
        if w > 0.9 * max_width || next > 0.9 * max_height {
            break;
        }
        size = next;
    }
    size
}

pub fn load_font(path: &Path) -> Result<Arc<Font>, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let font = Font::from_bytes(bytes, FontSettings { scale: 40.0, ..FontSettings::default() })
        .map_err(|e| ConfigError::Font(format!("{}: {}", path.display(), e)))?;
    Ok(Arc::new(font))
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

/// Decode a raster image or an SVG document and scale it to exactly `width` x `height`.
pub fn decode_image(bytes: &[u8], width: u32, height: u32) -> Result<Canvas, WidgetError> {
    if looks_like_svg(bytes) {
        return render_svg(bytes, width, height);
    }
    let img = image::load_from_memory(bytes)?;
    let rgba = img.resize_exact(width, height, FilterType::Lanczos3).to_rgba8();
    Ok(Canvas::from_rgba(width, height, rgba.as_raw()))
}

fn render_svg(bytes: &[u8], width: u32, height: u32) -> Result<Canvas, WidgetError> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default()).map_err(|e| WidgetError::Svg(e.to_string()))?;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| WidgetError::Svg(format!("cannot allocate {}x{} pixmap", width, height)))?;

    let size = tree.size();
    let transform = resvg::tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let pixels = pixmap
        .pixels()
        .iter()
        .map(|p| {
            let c = p.demultiply();
            Color { r: c.red(), g: c.green(), b: c.blue(), a: c.alpha() }.to_argb()
        })
        .collect();
    Ok(Canvas { width, height, pixels })
}
