//! Builds and matches the canonical "missing glyph" (tofu) signature: the
//! rendered appearance of the Unicode replacement character under a
//! `.notdef`-only fallback font, recognised inside a later render by a
//! sliding-window pattern scan rather than a positional compare, so that
//! sub-pixel baseline drift between fonts doesn't defeat detection.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::grid::PixelGrid;
use crate::render::{FontRenderer, RenderMode};

const TOFU_CHARACTER: char = '\u{FFFD}';
const FALLBACK_FONT_FAMILY: &str = "Adobe-NotDef";

/// Owns the rendering backend and the process-wide-in-spirit signature
/// cache. A single process is expected to hold one of these; nothing here
/// enforces that, it is a convention carried over from the reference
/// rasteriser's single font registry.
pub struct TofuContext<R: FontRenderer> {
    renderer: R,
    signatures: HashMap<u8, PixelGrid>,
}

impl<R: FontRenderer> TofuContext<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            signatures: HashMap::new(),
        }
    }

    /// Builds (or rebuilds) the cached signature for `font_size` by
    /// rendering the replacement character through `fallback_font_bytes` in
    /// padded mode and cropping away the 10-pixel border. Idempotent:
    /// calling it again for the same size simply replaces the cache entry.
    pub fn load_signature(&mut self, font_size: u8, fallback_font_bytes: &[u8], cfg: &EngineConfig) {
        let padded = self.renderer.render(
            TOFU_CHARACTER,
            Some(fallback_font_bytes),
            font_size,
            RenderMode::Padded,
            (255, 255, 255),
            (0, 0, 0),
            cfg.tofu_signature_brightness_threshold,
        );
        let side = font_size as usize * 4;
        let signature = padded.sub_grid(10, 10, side);
        log::debug!(
            "tofu signature cache load: font_size={font_size} family={FALLBACK_FONT_FAMILY} side={side}"
        );
        self.signatures.insert(font_size, signature);
    }

    pub fn unload_signature(&mut self, font_size: u8) {
        if self.signatures.remove(&font_size).is_some() {
            log::debug!("tofu signature cache unload: font_size={font_size}");
        }
    }

    pub fn unload_all(&mut self) {
        self.signatures.clear();
        log::debug!("tofu signature cache unload: all sizes");
    }

    pub fn has_signature(&self, font_size: u8) -> bool {
        self.signatures.contains_key(&font_size)
    }

    /// Renders `character` through `font_family` in padded mode and matches
    /// it against the cached signature for `font_size`. Returns `None` if no
    /// signature has been loaded for that size yet — there's nothing to
    /// compare against, so no tofu verdict can be given.
    pub fn is_tofu(
        &self,
        character: char,
        font_family: Option<&[u8]>,
        font_size: u8,
        cfg: &EngineConfig,
    ) -> Option<bool> {
        let signature = self.signatures.get(&font_size)?;
        let rendered = self.renderer.render(
            character,
            font_family,
            font_size,
            RenderMode::Padded,
            (255, 255, 255),
            (0, 0, 0),
            cfg.render_brightness_threshold,
        );
        let ratio = max_match_ratio(&rendered, signature);
        Some(ratio >= cfg.tofu_match_threshold)
    }

    /// Whether a code point's glyph should be skipped from a write plan:
    /// skip if the firmware doesn't already have an entry for it, or if the
    /// rendered replacement is tofu.
    pub fn should_skip(firmware_has_entry: bool, is_tofu: bool) -> bool {
        !firmware_has_entry || is_tofu
    }
}

/// Slides `pattern` over every valid top-left position inside `canvas`,
/// returning the highest fraction of equal pixels observed. Returns `0.0` if
/// `pattern` doesn't fit inside `canvas` at all.
pub fn max_match_ratio(canvas: &PixelGrid, pattern: &PixelGrid) -> f64 {
    let (pw, ph) = (pattern.width(), pattern.height());
    if pw == 0 || ph == 0 || pw > canvas.width() || ph > canvas.height() {
        return 0.0;
    }
    let total = (pw * ph) as f64;
    let mut best = 0.0f64;
    for y0 in 0..=(canvas.height() - ph) {
        for x0 in 0..=(canvas.width() - pw) {
            let mut matches = 0usize;
            for y in 0..ph {
                for x in 0..pw {
                    if canvas.get(x0 + x, y0 + y) == pattern.get(x, y) {
                        matches += 1;
                    }
                }
            }
            let ratio = matches as f64 / total;
            if ratio > best {
                best = ratio;
            }
        }
    }
    best
}
