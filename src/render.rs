//! Rasterises a single character from a vector font into a boolean pixel
//! grid, for the two modes the write path and the tofu detector each need.
//!
//! The distilled contract only described this component from the outside;
//! this crate also carries a default implementation (`AbGlyphRenderer`) so
//! the write path and the tofu pipeline can be exercised end-to-end without
//! an embedding application supplying its own rasteriser.

use ab_glyph::{Font, FontRef, Glyph, PxScale};

use crate::grid::PixelGrid;

/// An 8-bit-per-channel colour; alpha is never tracked, matching the
/// "anti-aliasing disabled conceptually" contract — brightness is always the
/// plain mean of R, G and B.
pub type Rgb = (u8, u8, u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Render at `font_size * 10`, downsample nearest-neighbour to
    /// `font_size * font_size`.
    Scaled,
    /// Render at `font_size * 4`, place at offset (10, 10) inside a canvas of
    /// side `font_size * 4 + 20`.
    Padded,
}

fn brightness(c: Rgb) -> f32 {
    (c.0 as f32 + c.1 as f32 + c.2 as f32) / 3.0
}

/// The single operation every glyph renderer in this crate must provide.
/// `font_size` is always 12 or 16; `threshold` is the brightness cutoff
/// below which a pixel is considered set (typically
/// `EngineConfig::render_brightness_threshold`, or
/// `tofu_signature_brightness_threshold` when building the tofu signature).
pub trait FontRenderer {
    fn render(
        &self,
        character: char,
        font_family: Option<&[u8]>,
        font_size: u8,
        mode: RenderMode,
        background: Rgb,
        foreground: Rgb,
        threshold: u8,
    ) -> PixelGrid;
}

/// Default `FontRenderer` backed by `ab_glyph`. Without a fallback font
/// installed and with no `font_family` bytes supplied at the call site, every
/// render yields an all-`false` grid rather than failing — this crate has no
/// real outline font to embed as a default, so the fallback is an explicit,
/// caller-supplied opt-in rather than bundled binary data.
pub struct AbGlyphRenderer {
    fallback: Option<Vec<u8>>,
}

impl AbGlyphRenderer {
    pub fn new() -> Self {
        Self { fallback: None }
    }

    /// Installs a fallback font used whenever a render call passes no
    /// `font_family` of its own, or the supplied bytes fail to parse.
    pub fn with_fallback(fallback: Vec<u8>) -> Self {
        Self {
            fallback: Some(fallback),
        }
    }

    fn resolve_font<'a>(&'a self, font_family: Option<&'a [u8]>) -> Option<FontRef<'a>> {
        if let Some(bytes) = font_family {
            if let Ok(font) = FontRef::try_from_slice(bytes) {
                return Some(font);
            }
        }
        self.fallback
            .as_deref()
            .and_then(|bytes| FontRef::try_from_slice(bytes).ok())
    }

    /// Rasterises `character` at `font.glyph_id(character)`, scaled to a
    /// `px * px` coverage buffer. Coverage is 0.0 everywhere a glyph has no
    /// ink, including when the font has no outline for the character at all.
    fn rasterize_coverage(font: &FontRef<'_>, character: char, px: usize) -> Vec<f32> {
        let mut coverage = vec![0f32; px * px];
        if px == 0 {
            return coverage;
        }
        let scale = PxScale::from(px as f32);
        let scaled = font.as_scaled(scale);
        let glyph: Glyph = font
            .glyph_id(character)
            .with_scale_and_position(scale, ab_glyph::point(0.0, scaled.ascent()));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            let origin_x = bounds.min.x.round() as i32;
            let origin_y = bounds.min.y.round() as i32;
            outlined.draw(|x, y, c| {
                let gx = origin_x + x as i32;
                let gy = origin_y + y as i32;
                if gx >= 0 && gy >= 0 {
                    let (gx, gy) = (gx as usize, gy as usize);
                    if gx < px && gy < px {
                        let idx = gy * px + gx;
                        if c > coverage[idx] {
                            coverage[idx] = c;
                        }
                    }
                }
            });
        }
        coverage
    }

    fn threshold_grid(
        coverage: &[f32],
        px: usize,
        background: Rgb,
        foreground: Rgb,
        threshold: u8,
    ) -> PixelGrid {
        let bg_brightness = brightness(background);
        let fg_brightness = brightness(foreground);
        let mut grid = PixelGrid::new(px, px);
        for y in 0..px {
            for x in 0..px {
                let c = coverage[y * px + x];
                let pixel_brightness = bg_brightness + (fg_brightness - bg_brightness) * c;
                grid.set(x, y, pixel_brightness < threshold as f32);
            }
        }
        grid
    }
}

impl Default for AbGlyphRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRenderer for AbGlyphRenderer {
    fn render(
        &self,
        character: char,
        font_family: Option<&[u8]>,
        font_size: u8,
        mode: RenderMode,
        background: Rgb,
        foreground: Rgb,
        threshold: u8,
    ) -> PixelGrid {
        let font_size = font_size as usize;
        let Some(font) = self.resolve_font(font_family) else {
            let side = match mode {
                RenderMode::Scaled => font_size,
                RenderMode::Padded => font_size * 4 + 20,
            };
            return PixelGrid::new(side, side);
        };

        match mode {
            RenderMode::Scaled => {
                let render_px = font_size * 10;
                let coverage = Self::rasterize_coverage(&font, character, render_px);
                let fine = Self::threshold_grid(&coverage, render_px, background, foreground, threshold);
                let mut out = PixelGrid::new(font_size, font_size);
                for ty in 0..font_size {
                    for tx in 0..font_size {
                        let sx = tx * 10 + 5;
                        let sy = ty * 10 + 5;
                        out.set(tx, ty, fine.get(sx.min(render_px - 1), sy.min(render_px - 1)));
                    }
                }
                out
            }
            RenderMode::Padded => {
                let render_px = font_size * 4;
                let side = render_px + 20;
                let coverage = Self::rasterize_coverage(&font, character, render_px);
                let inner = Self::threshold_grid(&coverage, render_px, background, foreground, threshold);
                let mut out = PixelGrid::new(side, side);
                for y in 0..render_px {
                    for x in 0..render_px {
                        out.set(x + 10, y + 10, inner.get(x, y));
                    }
                }
                out
            }
        }
    }
}
