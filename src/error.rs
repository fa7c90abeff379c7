use thiserror::Error;

use crate::font::FontClass;

/// The one structured error type this crate's public surface returns.
///
/// Every other failure mode this crate's pipeline can hit (out-of-range
/// address, empty chunk, invalid grid, invalid write, render failure) is
/// modelled as `Option`/`bool` at the point of occurrence rather than folded
/// in here — turning "no glyph at this code point" into an exceptional
/// condition would force every caller to handle it as if it were one.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FontEngineError {
    /// A batch write's post-store read-back did not match what was stored.
    /// The `Display` impl always contains the `U+XXXX` form of `code_point`,
    /// uppercase and zero-padded to four hex digits, per the wire contract.
    #[error("verify mismatch at U+{code_point:04X} ({class:?})")]
    VerifyMismatch {
        code_point: u32,
        class: FontClass,
    },

    /// The address detector exhausted every window-search candidate without
    /// finding a plausible `LARGE_BASE`.
    #[error("could not detect LARGE_BASE in firmware image")]
    DetectionFailed,
}
