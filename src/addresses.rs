//! Heuristic address detection: locates `SMALL_BASE`, `LARGE_BASE` and the
//! lookup table inside a firmware image with no explicit header describing
//! where the font tables live.
//!
//! `SMALL_BASE` and the lookup table are read straight out of fixed header
//! fields. `LARGE_BASE` has no such pointer — it is found by an iterative
//! "zoom" over candidate windows, scoring each by the length of the longest
//! run of 33-byte-aligned records whose last byte looks like a footer. This
//! is the single most heuristic piece of the crate; the confidence triple
//! exists so a caller can decide whether to trust a destructive write.

use crate::bytes::{count_pattern_masked, find_pattern_masked, read_u16_le, read_u32_le};
use crate::codec::is_uniform_chunk;
use crate::config::{EngineConfig, FooterByte};

const LOOKUP_TABLE: usize = 0x080000;
const SMALL_BASE_LO_OFFSET: usize = 0x78;
const SMALL_BASE_HI_OFFSET: usize = 0x7A;
const PARTITION_OFFSET_FIELD: usize = 0x80;
const PARTITION_SIZE_FIELD: usize = 0x84;
const RECORD_STRIDE: usize = 33;

const SMALL_PROBE_POINTS: [u32; 3] = [0x0041, 0x0042, 0x0043];
const LARGE_PROBE_POINTS: [u32; 3] = [0x4E00, 0x4E01, 0x4E02];
const MOVW_PATTERN: [Option<u8>; 6] = [
    Some(0xF2),
    Some(0x40),
    None,
    None,
    None,
    Some(0x42),
];

/// Advisory corroborating evidence for a detected set of addresses. Never
/// itself the reason `detect` returns `None` — only the `LARGE_BASE` search
/// failing outright does that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Confidence {
    pub small_valid: u32,
    pub large_valid: u32,
    pub movw_count: usize,
    /// Byte offset of the first masked `MOVW` match in the image, if any.
    pub movw_offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareAddresses {
    pub small_base: usize,
    pub large_base: usize,
    pub lookup_table: usize,
    pub confidence: Confidence,
}

struct Candidate {
    first_address: usize,
    score: usize,
}

/// Scans a single alignment phase (`addr = start, start+33, start+66, …`)
/// within `[start, window_end)`, returning the longest footer-run found and
/// where it starts.
fn score_phase(
    buffer: &[u8],
    start: usize,
    window_end: usize,
    anomaly_tolerance: u32,
) -> Option<Candidate> {
    let mut addr = start;
    let mut best_len = 0usize;
    let mut best_start: Option<usize> = None;
    let mut run_len = 0usize;
    let mut run_start: Option<usize> = None;
    let mut anomalies = 0u32;

    let close_run = |run_len: &mut usize, run_start: &mut Option<usize>, anomalies: &mut u32, best_len: &mut usize, best_start: &mut Option<usize>| {
        if *run_len > *best_len {
            *best_len = *run_len;
            *best_start = *run_start;
        }
        *run_len = 0;
        *run_start = None;
        *anomalies = 0;
    };

    while addr + RECORD_STRIDE <= window_end {
        let footer_index = addr + 32;
        if footer_index >= buffer.len() {
            break;
        }
        let byte = buffer[footer_index];
        if byte == 0x00 || byte == 0xFF {
            close_run(&mut run_len, &mut run_start, &mut anomalies, &mut best_len, &mut best_start);
        } else if FooterByte::is_footer(byte) {
            if run_start.is_none() {
                run_start = Some(addr);
            }
            run_len += 1;
            anomalies = 0;
        } else {
            anomalies += 1;
            if anomalies > anomaly_tolerance {
                close_run(&mut run_len, &mut run_start, &mut anomalies, &mut best_len, &mut best_start);
            }
        }
        addr += RECORD_STRIDE;
    }
    close_run(&mut run_len, &mut run_start, &mut anomalies, &mut best_len, &mut best_start);

    if best_len == 0 {
        None
    } else {
        Some(Candidate {
            first_address: best_start.expect("non-zero run length implies a start"),
            score: best_len,
        })
    }
}

/// Scores a window `[w, w+window_size)`. Until `base_alignment` is known the
/// true record phase inside the window is unknown, so every one of the 33
/// possible starting offsets is tried and the best is kept; once an
/// alignment has been adopted (after round one), only that phase is tried.
fn score_window(
    buffer: &[u8],
    w: usize,
    window_size: usize,
    base_alignment: Option<usize>,
    anomaly_tolerance: u32,
) -> Option<Candidate> {
    let window_end = (w + window_size).min(buffer.len());
    match base_alignment {
        Some(align) => {
            let phase_start = w + (RECORD_STRIDE + align - w % RECORD_STRIDE) % RECORD_STRIDE;
            score_phase(buffer, phase_start, window_end, anomaly_tolerance)
        }
        None => (0..RECORD_STRIDE)
            .filter_map(|phase| score_phase(buffer, w + phase, window_end, anomaly_tolerance))
            .max_by_key(|c| c.score),
    }
}

fn score_region(
    buffer: &[u8],
    region: std::ops::Range<usize>,
    window_size: usize,
    stride: usize,
    base_alignment: Option<usize>,
    anomaly_tolerance: u32,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if region.end <= region.start {
        return candidates;
    }
    if region.end - region.start <= window_size {
        if let Some(c) = score_window(buffer, region.start, region.end - region.start, base_alignment, anomaly_tolerance) {
            candidates.push(c);
        }
        return candidates;
    }
    let mut w = region.start;
    while w + window_size <= region.end {
        if let Some(c) = score_window(buffer, w, window_size, base_alignment, anomaly_tolerance) {
            candidates.push(c);
        }
        w += stride;
    }
    candidates
}

fn region_around(
    center: usize,
    stride: usize,
    partition: &std::ops::Range<usize>,
) -> std::ops::Range<usize> {
    // ceil(stride / RECORD_STRIDE) + 1 records on each side, per the zoom's
    // "centre on first address, extend ceil(stride/33)+1 records" step.
    let record_span = ((stride + RECORD_STRIDE - 1) / RECORD_STRIDE + 1) * RECORD_STRIDE;
    let start = center.saturating_sub(record_span).max(partition.start);
    let end = (center + record_span).min(partition.end);
    start..end.max(start)
}

/// The `LARGE_BASE` window-spacing-score zoom search described in the
/// address detector design: iteratively narrow a set of candidate regions,
/// halving the search stride each round, until the stride drops to the
/// configured floor.
fn detect_large_base(buffer: &[u8], partition: std::ops::Range<usize>, cfg: &EngineConfig) -> Option<usize> {
    let mut stride = (cfg.window_divisor as usize * RECORD_STRIDE) / 2;
    let mut window_size = stride * 2;
    let mut regions = vec![partition.clone()];
    let mut base_alignment: Option<usize> = None;
    let mut best: Option<Candidate> = None;
    let mut round = 0u32;

    loop {
        let mut round_candidates: Vec<Candidate> = regions
            .iter()
            .flat_map(|region| {
                score_region(
                    buffer,
                    region.clone(),
                    window_size,
                    stride.max(1),
                    base_alignment,
                    cfg.anomaly_tolerance,
                )
            })
            .collect();

        if round_candidates.is_empty() {
            log::debug!("address detector round {round}: stride={stride}, no candidates");
            break;
        }
        round_candidates.sort_by(|a, b| b.score.cmp(&a.score));

        if base_alignment.is_none() {
            base_alignment = Some(round_candidates[0].first_address % RECORD_STRIDE);
        }

        log::debug!(
            "address detector round {round}: stride={stride}, top candidate score={} first_address=0x{:X}",
            round_candidates[0].score,
            round_candidates[0].first_address
        );

        if best.as_ref().map_or(true, |b| round_candidates[0].score > b.score) {
            best = Some(Candidate {
                first_address: round_candidates[0].first_address,
                score: round_candidates[0].score,
            });
        }

        if stride <= cfg.stride_floor as usize {
            break;
        }

        regions = round_candidates
            .into_iter()
            .take(cfg.top_window_count)
            .map(|c| region_around(c.first_address, stride, &partition))
            .collect();
        stride /= 2;
        window_size = stride * 2;
        round += 1;
    }

    best.map(|c| c.first_address)
}

fn probe_confidence(
    buffer: &[u8],
    small_base: usize,
    large_base: usize,
) -> Confidence {
    let small_valid = SMALL_PROBE_POINTS
        .iter()
        .filter(|&&cp| {
            let addr = small_base + cp as usize * 32;
            matches!(buffer.get(addr..addr + 32), Some(chunk) if !is_uniform_chunk(chunk))
        })
        .count() as u32;

    let large_valid = LARGE_PROBE_POINTS
        .iter()
        .filter(|&&cp| {
            let offset = (cp - 0x4E00) as usize * RECORD_STRIDE;
            let addr = large_base + offset;
            matches!(buffer.get(addr..addr + RECORD_STRIDE), Some(chunk) if !is_uniform_chunk(chunk))
        })
        .count() as u32;

    let movw_count = count_pattern_masked(buffer, &MOVW_PATTERN);
    let movw_offset = find_movw_offset(buffer);

    Confidence {
        small_valid,
        large_valid,
        movw_count,
        movw_offset,
    }
}

/// Runs the full detection pipeline: reads `SMALL_BASE` and the partition
/// bounds from fixed header fields, runs the `LARGE_BASE` zoom search inside
/// that partition, and probes a confidence triple. Returns `None` only if
/// the zoom search never finds a positively-scoring candidate.
pub fn detect(buffer: &[u8], cfg: &EngineConfig) -> Option<FirmwareAddresses> {
    let lo = read_u16_le(buffer, SMALL_BASE_LO_OFFSET)? as u32;
    let hi = read_u16_le(buffer, SMALL_BASE_HI_OFFSET)? as u32;
    let small_base = ((hi << 16) | lo) as usize;

    let partition_offset = read_u32_le(buffer, PARTITION_OFFSET_FIELD)? as usize;
    let partition_size = read_u32_le(buffer, PARTITION_SIZE_FIELD)? as usize;
    let partition_end = partition_offset.saturating_add(partition_size).min(buffer.len());
    let partition = partition_offset.min(partition_end)..partition_end;

    let large_base = detect_large_base(buffer, partition, cfg)?;

    let confidence = probe_confidence(buffer, small_base, large_base);
    log::info!(
        "address detection resolved: small_base=0x{:X} large_base=0x{:X} lookup_table=0x{:X} confidence={:?}",
        small_base,
        large_base,
        LOOKUP_TABLE,
        confidence
    );
    if confidence.small_valid == 0 || confidence.large_valid == 0 {
        log::warn!(
            "address detection produced a candidate with no corroborating evidence: {:?}",
            confidence
        );
    }

    Some(FirmwareAddresses {
        small_base,
        large_base,
        lookup_table: LOOKUP_TABLE,
        confidence,
    })
}

fn find_movw_offset(buffer: &[u8]) -> Option<usize> {
    find_pattern_masked(buffer, &MOVW_PATTERN)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::FOOTER_BYTES;

    /// Builds a synthetic firmware image with a plausible header and a run
    /// of footer-terminated 33-byte records starting at `large_base`.
    fn synthetic_firmware(large_base: usize, record_count: usize, small_base: u32) -> Vec<u8> {
        let partition_offset: u32 = 0x1000;
        let total_len = large_base + record_count * RECORD_STRIDE + 64;
        let mut buf = vec![0u8; total_len.max(0x90)];

        buf[0x78..0x7A].copy_from_slice(&((small_base & 0xFFFF) as u16).to_le_bytes());
        buf[0x7A..0x7C].copy_from_slice(&((small_base >> 16) as u16).to_le_bytes());
        buf[0x80..0x84].copy_from_slice(&partition_offset.to_le_bytes());
        buf[0x84..0x88].copy_from_slice(&((total_len as u32) - partition_offset).to_le_bytes());

        for i in 0..record_count {
            let addr = large_base + i * RECORD_STRIDE;
            for b in 0..32 {
                buf[addr + b] = 0x55;
            }
            buf[addr + 32] = FOOTER_BYTES[i % FOOTER_BYTES.len()];
        }
        buf
    }

    fn small_cfg() -> EngineConfig {
        EngineConfig {
            window_divisor: 6,
            stride_floor: 3,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn small_base_reads_two_words_as_one_32_bit_value() {
        let buf = synthetic_firmware(0x4000, 40, 0xABCD1234);
        let addrs = detect(&buf, &small_cfg()).expect("detection should succeed");
        assert_eq!(addrs.small_base, 0xABCD1234);
    }

    #[test]
    fn detects_large_base_at_start_of_footer_run() {
        drop(env_logger::init());
        let large_base = 0x4000;
        let buf = synthetic_firmware(large_base, 80, 0);
        let cfg = small_cfg();
        let addrs = detect(&buf, &cfg).expect("detection should succeed");
        assert_eq!(addrs.large_base % RECORD_STRIDE, large_base % RECORD_STRIDE);
        assert!(addrs.large_base >= 0x1000);
    }

    #[test]
    fn returns_none_when_no_footer_run_exists() {
        let mut buf = vec![0u8; 0x10000];
        buf[0x80..0x84].copy_from_slice(&0x1000u32.to_le_bytes());
        buf[0x84..0x88].copy_from_slice(&0xE000u32.to_le_bytes());
        let cfg = small_cfg();
        assert!(detect(&buf, &cfg).is_none());
    }

    #[test]
    fn zoom_terminates_on_large_partition_without_hanging() {
        let large_base = 0x200000;
        let buf = synthetic_firmware(large_base, 200, 0);
        let cfg = EngineConfig::default();
        // Uses the full-size default divisor against a multi-megabyte buffer;
        // must terminate rather than recurse indefinitely.
        let result = detect(&buf, &cfg);
        assert!(result.is_some());
    }

    #[test]
    fn confidence_counts_non_uniform_probe_chunks() {
        let mut buf = synthetic_firmware(0x4000, 80, 0);
        // Make the small-font probe points at small_base=0 non-uniform.
        for cp in SMALL_PROBE_POINTS {
            let addr = cp as usize * 32;
            buf[addr] = 0xAB;
        }
        let cfg = small_cfg();
        let addrs = detect(&buf, &cfg).unwrap();
        assert_eq!(addrs.confidence.small_valid, 3);
    }

    #[test]
    fn movw_pattern_is_counted_into_confidence() {
        let mut buf = synthetic_firmware(0x4000, 80, 0);
        buf.extend_from_slice(&[0xF2, 0x40, 0x01, 0x02, 0x03, 0x42]);
        let cfg = small_cfg();
        let addrs = detect(&buf, &cfg).unwrap();
        assert!(addrs.confidence.movw_count >= 1);
    }
}
