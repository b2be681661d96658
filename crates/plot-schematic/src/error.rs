use std::io;

use plot_region::{AccessError, RegionError};
use thiserror::Error;

/// Errors produced while decoding, validating, or storing a schematic.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("bad magic {found:?}, expected \"PSCH\"")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported schematic version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("schematic version {0} was never issued")]
    InvalidVersion(u16),

    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("palette index {index} out of range for palette of {palette_len}")]
    InvalidIndex { index: u32, palette_len: usize },

    #[error("invalid dimensions {width}x{height}x{length}")]
    InvalidDimensions { width: u16, height: u16, length: u16 },

    #[error("palette entry is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("palette has {len} entries, at most {max} allowed")]
    PaletteTooLarge { len: usize, max: usize },

    #[error("palette entry {0:?} appears twice")]
    DuplicatePaletteEntry(String),

    #[error("entry of {len} bytes exceeds the {max} byte limit")]
    EntryTooLong { len: usize, max: usize },

    #[error("expected {expected} entries, got {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("invalid biome flag {0}")]
    InvalidBiomeFlag(u8),

    #[error("{0} trailing bytes after entity block")]
    TrailingBytes(usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced while capturing a region from the world.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("region {width}x{height}x{length} exceeds the schematic size limit")]
    TooLarge { width: u64, height: u64, length: u64 },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
