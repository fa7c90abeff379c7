//! Named constants the rest of the crate would otherwise scatter as magic
//! numbers. Every field here reproduces a fixed firmware-derived constant;
//! overriding a field is supported (mostly for tests that want to exercise
//! the zoom loop on a smaller synthetic buffer) but not validated — an
//! override that weakens a threshold is the caller's responsibility.

use num_enum::TryFromPrimitive;

/// Footer bytes a Large-font chunk's 33rd byte may legally hold. Modelled as
/// a fallible-from-`u8` enum rather than a bare byte so the address
/// detector's footer-run scan reads as a classification, not a magic-number
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum FooterByte {
    Variant90 = 0x90,
    Variant8F = 0x8F,
    Variant89 = 0x89,
    Variant8B = 0x8B,
    Variant8D = 0x8D,
    Variant8E = 0x8E,
    Variant8C = 0x8C,
}

impl FooterByte {
    pub fn is_footer(byte: u8) -> bool {
        Self::try_from(byte).is_ok()
    }
}

/// Footer bytes a Large-font chunk's 33rd byte may legally hold, as a plain
/// array for code that wants to iterate the set (tests, synthetic fixtures).
pub const FOOTER_BYTES: [u8; 7] = [0x90, 0x8F, 0x89, 0x8B, 0x8D, 0x8E, 0x8C];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Divisor used to derive the address detector's initial window size:
    /// `window_size = window_divisor * 33`, `stride = window_size / 2`.
    pub window_divisor: u32,
    /// Consecutive anomalous footer bytes tolerated before a run closes.
    pub anomaly_tolerance: u32,
    /// Zoom terminates once `stride` falls to or below this value.
    pub stride_floor: u32,
    /// Number of top-scoring windows carried into the next zoom round.
    pub top_window_count: usize,
    /// Minimum true-pixel fraction for a valid Small grid (exclusive).
    pub small_valid_min: f64,
    /// Maximum true-pixel fraction for a valid Small grid (exclusive).
    pub small_valid_max: f64,
    /// Minimum true-pixel fraction for a valid Large grid (exclusive).
    pub large_valid_min: f64,
    /// Maximum true-pixel fraction for a valid Large grid (exclusive).
    pub large_valid_max: f64,
    /// Sliding-window match ratio at or above which a render is tofu.
    pub tofu_match_threshold: f64,
    /// Brightness threshold (0..255) used by the scaled/padded renderer.
    pub render_brightness_threshold: u8,
    /// Brightness threshold used specifically when building the tofu
    /// signature itself (kept distinct per the reference implementation's
    /// own choice of a looser threshold for the canonical signature render).
    pub tofu_signature_brightness_threshold: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_divisor: 20_902,
            anomaly_tolerance: 5,
            stride_floor: 100,
            top_window_count: 5,
            small_valid_min: 0.01,
            small_valid_max: 0.95,
            large_valid_min: 0.01,
            large_valid_max: 0.97,
            tofu_match_threshold: 0.98,
            render_brightness_threshold: 128,
            tofu_signature_brightness_threshold: 200,
        }
    }
}
