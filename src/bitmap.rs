//! Bitmap validity scoring and a monochrome (1-bpp) BMP codec.
//!
//! Validity rejects decoded grids that are empty or degenerate before they
//! ever reach a caller; the BMP codec is the on-disk artifact format used by
//! bulk extraction (`FontAccessor::extract_all`) and, in reverse, by anything
//! that wants to read previously-extracted glyphs back in.

use crate::config::EngineConfig;
use crate::font::FontClass;
use crate::grid::PixelGrid;

/// `true` iff `grid`'s true-pixel fraction falls strictly inside the bounds
/// `class` defines in `cfg`. An all-false, all-true, or otherwise degenerate
/// grid always fails this check since such a grid's fraction sits at or
/// outside the bound.
pub fn is_valid_grid(grid: &PixelGrid, class: FontClass, cfg: &EngineConfig) -> bool {
    let (min, max) = match class {
        FontClass::Small => (cfg.small_valid_min, cfg.small_valid_max),
        FontClass::Large => (cfg.large_valid_min, cfg.large_valid_max),
    };
    let frac = grid.true_fraction();
    frac > min && frac < max
}

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_LEN: usize = 40;
const PALETTE_LEN: usize = 8;
const HEADER_LEN: usize = FILE_HEADER_LEN + INFO_HEADER_LEN + PALETTE_LEN; // 62
const PPM_RESOLUTION: i32 = 2835;

fn row_stride(width: usize) -> usize {
    let unpadded = (width + 7) / 8;
    (unpadded + 3) / 4 * 4
}

/// Serialises `grid` as a strict little-endian, bottom-up, 1-bpp BMP with a
/// two-colour palette (index 0 = white = `false`, index 1 = black = `true`).
pub fn create_bmp(grid: &PixelGrid) -> Vec<u8> {
    let width = grid.width();
    let height = grid.height();
    let stride = row_stride(width);
    let pixel_data_len = stride * height;
    let file_len = HEADER_LEN + pixel_data_len;

    let mut out = Vec::with_capacity(file_len);

    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_len as u32).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());

    // BITMAPINFOHEADER
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&1u16.to_le_bytes()); // bits per pixel
    out.extend_from_slice(&0u32.to_le_bytes()); // compression = BI_RGB
    out.extend_from_slice(&(pixel_data_len as u32).to_le_bytes());
    out.extend_from_slice(&PPM_RESOLUTION.to_le_bytes());
    out.extend_from_slice(&PPM_RESOLUTION.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes()); // colors used
    out.extend_from_slice(&2u32.to_le_bytes()); // colors important

    // Palette: white then black, BGRA order.
    out.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0x00]);
    out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    // Pixel data, bottom-up, MSB-first within each row byte.
    let mut row_buf = vec![0u8; stride];
    for y in (0..height).rev() {
        row_buf.iter_mut().for_each(|b| *b = 0);
        for x in 0..width {
            if grid.get(x, y) {
                row_buf[x / 8] |= 0x80 >> (x % 8);
            }
        }
        out.extend_from_slice(&row_buf);
    }

    debug_assert_eq!(out.len(), file_len);
    out
}

/// Parses a monochrome BMP back into a pixel grid. Returns `None` for a bad
/// magic, a declared size exceeding the buffer, or an unsupported bit depth —
/// never panics on malformed input.
pub fn parse_bmp(bytes: &[u8]) -> Option<PixelGrid> {
    if bytes.len() < HEADER_LEN || &bytes[0..2] != b"BM" {
        return None;
    }
    let file_len = u32::from_le_bytes(bytes[2..6].try_into().ok()?) as usize;
    if file_len > bytes.len() {
        return None;
    }
    let pixel_offset = u32::from_le_bytes(bytes[10..14].try_into().ok()?) as usize;
    let width = i32::from_le_bytes(bytes[18..22].try_into().ok()?);
    let height_raw = i32::from_le_bytes(bytes[22..26].try_into().ok()?);
    let bits_per_pixel = u16::from_le_bytes(bytes[28..30].try_into().ok()?);
    let compression = u32::from_le_bytes(bytes[30..34].try_into().ok()?);

    if bits_per_pixel != 1 || compression != 0 || width <= 0 || height_raw == 0 {
        return None;
    }
    let width = width as usize;
    let bottom_up = height_raw > 0;
    let height = height_raw.unsigned_abs() as usize;

    let stride = row_stride(width);
    let needed = pixel_offset.checked_add(stride.checked_mul(height)?)?;
    if needed > bytes.len() {
        return None;
    }

    let mut grid = PixelGrid::new(width, height);
    for row_index in 0..height {
        let y = if bottom_up {
            height - 1 - row_index
        } else {
            row_index
        };
        let row_start = pixel_offset + row_index * stride;
        let row = &bytes[row_start..row_start + stride];
        for x in 0..width {
            let bit = row[x / 8] & (0x80 >> (x % 8)) != 0;
            grid.set(x, y, bit);
        }
    }
    Some(grid)
}
