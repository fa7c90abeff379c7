//! Address detection, glyph codec and tofu detection for pocket-translator
//! firmware fonts.
//!
//! [`FirmwareSession`] is the usual entry point: it owns a firmware buffer,
//! detects the font table addresses once at construction, and exposes the
//! read/write/verify/extract operations a caller needs. The lower-level
//! pieces (byte primitives, the codec, the bitmap serialiser, the address
//! detector itself) are public for callers that want to compose their own
//! pipeline instead.

#![warn(unsafe_code)]

pub mod addresses;
pub mod bitmap;
pub mod bytes;
pub mod codec;
pub mod config;
pub mod error;
pub mod font;
pub mod grid;
pub mod render;
pub mod session;
pub mod tofu;

pub use addresses::{Confidence, FirmwareAddresses};
pub use codec::{decode_chunk, encode_chunk};
pub use config::EngineConfig;
pub use error::FontEngineError;
pub use font::{BmpArtifact, FontAccessor, FontClass, UnicodeRange, WriteEntry};
pub use grid::PixelGrid;
pub use render::{AbGlyphRenderer, FontRenderer, RenderMode};
pub use session::FirmwareSession;
pub use tofu::TofuContext;
