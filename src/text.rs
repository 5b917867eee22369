// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Text rasterization collaborator.
//!
//! The cache only needs a [`Font`]: something that turns a string into a
//! [`Surface`].  [`GlyphFont`] is the stock implementation over `ab_glyph`.

use std::fmt::Debug;

use ab_glyph::{Font as _, FontArc, GlyphId, PxScale, ScaleFont as _, point};

use crate::software::{Surface, SurfaceFormat};

/// Identity of a font, as far as text cache keys are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub u64);

/// Straight-alpha color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color::rgba(r, g, b, 1.0)
    }

    /// Quantized to bytes.  Out-of-range components are clamped.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot rasterize text: {0}")]
    Rasterize(String),
    #[error("invalid font data: {0}")]
    InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// Rasterizes UTF-8 text into a straight-alpha RGBA surface.
pub trait Font: Send + Sync + Debug {
    fn id(&self) -> FontId;
    fn rasterize(&self, color: Color, text: &str) -> Result<Surface, RenderError>;
}

/// A [`Font`] backed by an `ab_glyph` outline font at a fixed pixel size.
#[derive(Debug, Clone)]
pub struct GlyphFont {
    id: FontId,
    font: FontArc,
    scale: PxScale,
}

impl GlyphFont {
    pub fn new(id: FontId, font: FontArc, px_size: f32) -> Self {
        GlyphFont {
            id,
            font,
            scale: PxScale::from(px_size),
        }
    }

    /// Parses TrueType/OpenType data.
    pub fn from_bytes(id: FontId, data: Vec<u8>, px_size: f32) -> Result<Self, RenderError> {
        Ok(GlyphFont::new(id, FontArc::try_from_vec(data)?, px_size))
    }

    /// Pen positions of each glyph on a single line, plus the line's width.
    fn layout(&self, text: &str) -> (Vec<(GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(self.scale);
        let mut glyphs = Vec::with_capacity(text.len());
        let mut cursor_x = 0.0;
        let mut last_glyph: Option<GlyphId> = None;
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let glyph_id = self.font.glyph_id(ch);
            if let Some(prev) = last_glyph {
                cursor_x += scaled.kern(prev, glyph_id);
            }
            glyphs.push((glyph_id, cursor_x));
            cursor_x += scaled.h_advance(glyph_id);
            last_glyph = Some(glyph_id);
        }
        (glyphs, cursor_x)
    }
}

impl Font for GlyphFont {
    fn id(&self) -> FontId {
        self.id
    }

    fn rasterize(&self, color: Color, text: &str) -> Result<Surface, RenderError> {
        let scaled = self.font.as_scaled(self.scale);
        let ascent = scaled.ascent();
        let (glyphs, line_width) = self.layout(text);
        let width = line_width.ceil() as u32;
        let height = (ascent - scaled.descent()).ceil() as u32;
        if width == 0 || height == 0 {
            return Err(RenderError::Rasterize(format!(
                "{:?} has no visible extent",
                text
            )));
        }

        let [r, g, b, a] = color.to_rgba8();
        let mut coverage = vec![0f32; width as usize * height as usize];
        for (glyph_id, x) in glyphs {
            let glyph = glyph_id.with_scale_and_position(self.scale, point(x, ascent));
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, cov| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                    return;
                }
                let slot = &mut coverage[py as usize * width as usize + px as usize];
                *slot = slot.max(cov);
            });
        }

        let mut pixels = Vec::with_capacity(coverage.len() * 4);
        for cov in coverage {
            let alpha = (cov.clamp(0.0, 1.0) * a as f32).round() as u8;
            pixels.extend_from_slice(&[r, g, b, alpha]);
        }
        Ok(Surface::packed(width, height, SurfaceFormat::RGBA32, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_glyph::{Font as _, ScaleFont as _};

    #[test]
    fn color_quantizes() {
        assert_eq!(Color::WHITE.to_rgba8(), [255, 255, 255, 255]);
        assert_eq!(Color::rgba(0.5, 2.0, -1.0, 0.0).to_rgba8(), [128, 255, 0, 0]);
    }

    fn mono() -> GlyphFont {
        let data = include_bytes!("../tests/fixtures/DejaVuSansMono.ttf").to_vec();
        GlyphFont::from_bytes(FontId(7), data, 24.0).unwrap()
    }

    #[test]
    fn rasterizes_in_the_requested_color() {
        let font = mono();
        let color = Color::rgb(1.0, 0.5, 0.0);
        let surface = font.rasterize(color, "gjpqy").unwrap();
        assert!(surface.width() > 0 && surface.height() > 0);
        assert_eq!(surface.format(), SurfaceFormat::RGBA32);
        assert_eq!(surface.pitch(), surface.width() * 4);

        let pixels = surface.pixels();
        assert_eq!(pixels.len(), (surface.width() * surface.height() * 4) as usize);
        let [r, g, b, _] = color.to_rgba8();
        assert!(pixels.chunks_exact(4).all(|p| p[..3] == [r, g, b]));
        let covered = pixels.chunks_exact(4).filter(|p| p[3] > 0).count();
        assert!(covered > 0);

        //descenders land below the baseline
        let ascent = font.font.as_scaled(font.scale).ascent();
        let below_baseline = pixels
            .chunks_exact(4)
            .enumerate()
            .any(|(i, p)| p[3] > 0 && (i as u32 / surface.width()) as f32 > ascent);
        assert!(below_baseline);
    }

    #[test]
    fn monospaced_strings_share_a_width() {
        let font = mono();
        let a = font.rasterize(Color::WHITE, "ab").unwrap();
        let b = font.rasterize(Color::WHITE, "xy").unwrap();
        let longer = font.rasterize(Color::WHITE, "abcd").unwrap();
        assert_eq!(a.width(), b.width());
        assert_eq!(a.height(), longer.height());
        assert!(longer.width() > a.width());
    }

    #[test]
    fn control_only_text_is_a_render_error() {
        let font = mono();
        assert_eq!(font.id(), FontId(7));
        let err = font.rasterize(Color::BLACK, "\n").unwrap_err();
        assert!(matches!(err, RenderError::Rasterize(_)));
    }

    #[test]
    fn garbage_is_not_a_font() {
        let err = GlyphFont::from_bytes(FontId(1), vec![0, 1, 2, 3], 16.0).unwrap_err();
        assert!(matches!(err, RenderError::InvalidFont(_)));
    }
}
