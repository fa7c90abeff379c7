//! The crate's top-level entry point for typical use: load a firmware
//! buffer, detect its font table addresses once, and expose the accessor
//! operations through a single owning type.

use crate::addresses::{self, FirmwareAddresses};
use crate::config::EngineConfig;
use crate::error::FontEngineError;
use crate::font::{BmpArtifact, FontAccessor, FontClass, UnicodeRange, WriteEntry};
use crate::grid::PixelGrid;

/// Owns the firmware buffer and the accessor built on top of it. Address
/// detection runs once, at construction; every other operation is a
/// pass-through to the underlying [`FontAccessor`].
///
/// `mutated` is a convenience flag for callers deciding whether a
/// re-serialisation is worth doing — the session sets it on any successful
/// write, but nothing in this crate reads it to change behaviour.
pub struct FirmwareSession {
    accessor: FontAccessor,
    mutated: bool,
}

impl FirmwareSession {
    /// Runs address detection against `buffer` and, on success, returns a
    /// session ready for reads and writes. Returns
    /// `FontEngineError::DetectionFailed` — never panics — if no plausible
    /// `LARGE_BASE` can be found.
    pub fn new(buffer: Vec<u8>, config: EngineConfig) -> Result<Self, FontEngineError> {
        let addresses = addresses::detect(&buffer, &config).ok_or(FontEngineError::DetectionFailed)?;
        Ok(Self {
            accessor: FontAccessor::new(buffer, addresses, config),
            mutated: false,
        })
    }

    /// Convenience constructor using `EngineConfig::default()`.
    pub fn with_defaults(buffer: Vec<u8>) -> Result<Self, FontEngineError> {
        Self::new(buffer, EngineConfig::default())
    }

    pub fn addresses(&self) -> &FirmwareAddresses {
        self.accessor.addresses()
    }

    pub fn is_mutated(&self) -> bool {
        self.mutated
    }

    pub fn accessor(&self) -> &FontAccessor {
        &self.accessor
    }

    pub fn read_chunk(&self, code_point: u32, class: FontClass) -> Option<&[u8]> {
        self.accessor.read_chunk(code_point, class)
    }

    pub fn read_pixels(&self, code_point: u32, class: FontClass) -> Option<PixelGrid> {
        self.accessor.read_pixels(code_point, class)
    }

    pub fn write_chunk(&mut self, code_point: u32, class: FontClass, chunk: &[u8]) -> bool {
        let ok = self.accessor.write_chunk(code_point, class, chunk);
        self.mutated |= ok;
        ok
    }

    pub fn write_pixels(&mut self, code_point: u32, class: FontClass, grid: &PixelGrid) -> bool {
        let ok = self.accessor.write_pixels(code_point, class, grid);
        self.mutated |= ok;
        ok
    }

    pub fn verify_chunk(&self, code_point: u32, class: FontClass, expected: &[u8]) -> bool {
        self.accessor.verify_chunk(code_point, class, expected)
    }

    pub fn write_batch(&mut self, plan: &[WriteEntry]) -> Result<usize, FontEngineError> {
        let result = self.accessor.write_batch(plan);
        if matches!(result, Ok(n) if n > 0) {
            self.mutated = true;
        }
        result
    }

    pub fn extract_all(&self, ranges: &[UnicodeRange]) -> Vec<BmpArtifact> {
        self.accessor.extract_all(ranges)
    }

    /// Hands the (possibly mutated) firmware buffer back to the caller.
    /// Serialising it to a file, a device, or a socket is out of this
    /// crate's scope.
    pub fn into_bytes(self) -> Vec<u8> {
        self.accessor.into_bytes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn minimal_firmware_without_large_base() -> Vec<u8> {
        let mut buf = vec![0u8; 0x10000];
        buf[0x80..0x84].copy_from_slice(&0x1000u32.to_le_bytes());
        buf[0x84..0x88].copy_from_slice(&0xE000u32.to_le_bytes());
        buf
    }

    #[test]
    fn new_reports_detection_failed_rather_than_panicking() {
        let buf = minimal_firmware_without_large_base();
        let cfg = EngineConfig {
            window_divisor: 6,
            stride_floor: 3,
            ..EngineConfig::default()
        };
        let result = FirmwareSession::new(buf, cfg);
        assert!(matches!(result, Err(FontEngineError::DetectionFailed)));
    }

    #[test]
    fn mutated_flag_starts_false_and_flips_on_successful_write() {
        let large_base = 0x4000usize;
        let mut buf = vec![0u8; 0x10000];
        buf[0x80..0x84].copy_from_slice(&0x1000u32.to_le_bytes());
        buf[0x84..0x88].copy_from_slice(&0xE000u32.to_le_bytes());
        for i in 0..60 {
            let addr = large_base + i * 33;
            buf[addr + 32] = crate::config::FOOTER_BYTES[i % 7];
        }
        let cfg = EngineConfig {
            window_divisor: 6,
            stride_floor: 3,
            ..EngineConfig::default()
        };
        let mut session = FirmwareSession::new(buf, cfg).expect("large base should be detected");
        assert!(!session.is_mutated());

        let small_grid = PixelGrid::new(12, 12);
        let wrote = session.write_pixels(0x41, FontClass::Small, &small_grid);
        // An empty grid is invalid (fraction 0.0), so this write is expected
        // to be rejected and must not flip the flag.
        assert!(!wrote);
        assert!(!session.is_mutated());
    }

    #[test]
    fn mutated_flag_flips_true_on_a_successful_write() {
        let large_base = 0x4000usize;
        let small_base = 0x1000usize;
        // Large enough to cover the fixed lookup table at 0x080000.
        let mut buf = vec![0u8; 0x090000];
        buf[0x78..0x7A].copy_from_slice(&((small_base & 0xFFFF) as u16).to_le_bytes());
        buf[0x7A..0x7C].copy_from_slice(&((small_base >> 16) as u16).to_le_bytes());
        buf[0x80..0x84].copy_from_slice(&0x1000u32.to_le_bytes());
        buf[0x84..0x88].copy_from_slice(&0x80000u32.to_le_bytes());
        for i in 0..60 {
            let addr = large_base + i * 33;
            buf[addr + 32] = crate::config::FOOTER_BYTES[i % 7];
        }
        buf[0x080000 + (0x41 >> 3)] = 0x00;
        let cfg = EngineConfig {
            window_divisor: 6,
            stride_floor: 3,
            ..EngineConfig::default()
        };
        let mut session = FirmwareSession::new(buf, cfg).expect("large base should be detected");
        assert!(!session.is_mutated());

        let mut grid = PixelGrid::new(12, 12);
        for i in 0..12 {
            grid.set(i, i % 12, true);
        }
        assert!(session.write_pixels(0x41, FontClass::Small, &grid));
        assert!(session.is_mutated());
    }
}
