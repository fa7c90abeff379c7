//! Byte-level primitives the rest of the crate is built on: bounds-checked
//! little/big-endian integer access, a bounded slice helper, and forward
//! pattern search (including a wildcard variant for the `movw` corroborating
//! signal in the address detector).
//!
//! Every reader here fails closed: an offset that would read past the end of
//! the buffer returns `None` rather than panicking. [`bounded_slice`] is the
//! one exception — a start past the end yields an empty slice, not an error,
//! matching how the rest of the crate treats "nothing here" as a normal
//! outcome rather than a failure.

#[inline]
pub fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let bytes: [u8; 2] = buf.get(offset..end)?.try_into().ok()?;
    Some(u16::from_le_bytes(bytes))
}

#[inline]
pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes: [u8; 4] = buf.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

#[inline]
pub fn read_i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    read_u32_le(buf, offset).map(|v| v as i32)
}

/// Returns up to `len` bytes starting at `offset`. A `offset` past the end of
/// the buffer returns an empty slice rather than `None` — callers scanning a
/// buffer window by window should not have to special-case running off the
/// end.
#[inline]
pub fn bounded_slice(buf: &[u8], offset: usize, len: usize) -> &[u8] {
    if offset >= buf.len() {
        return &[];
    }
    let end = (offset + len).min(buf.len());
    &buf[offset..end]
}

/// Forward search for an exact byte sequence. Returns the first matching
/// offset, or `None` if `pattern` does not occur.
pub fn find_pattern(buf: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > buf.len() {
        return None;
    }
    buf.windows(pattern.len()).position(|w| w == pattern)
}

/// Forward search for a byte sequence where `None` entries in `pattern` act
/// as single-byte wildcards. Used for the `movw`-instruction corroborating
/// signal, whose middle four bytes vary by immediate operand.
pub fn find_pattern_masked(buf: &[u8], pattern: &[Option<u8>]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > buf.len() {
        return None;
    }
    buf.windows(pattern.len()).position(|w| {
        w.iter()
            .zip(pattern.iter())
            .all(|(b, p)| p.map_or(true, |expected| *b == expected))
    })
}

/// Counts every (possibly overlapping) occurrence of a masked pattern.
pub fn count_pattern_masked(buf: &[u8], pattern: &[Option<u8>]) -> usize {
    if pattern.is_empty() || pattern.len() > buf.len() {
        return 0;
    }
    buf.windows(pattern.len())
        .filter(|w| {
            w.iter()
                .zip(pattern.iter())
                .all(|(b, p)| p.map_or(true, |expected| *b == expected))
        })
        .count()
}
