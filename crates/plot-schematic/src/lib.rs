//! Plot Schematic
//!
//! Immutable snapshots of world regions, captured through chunk accessors
//! and stored in a compact paletted binary format.

mod capture;
pub mod codec;
mod error;
pub mod file;
mod schematic;

pub use capture::{CaptureOptions, capture, encode};
pub use codec::{decode, serialize};
pub use error::{CaptureError, CaptureResult, CodecError, CodecResult};
pub use file::{load, save};
pub use schematic::{
    Dimensions, MAX_ENTRY_LEN, MAX_PALETTE_LEN, MAX_PAYLOAD_LEN, PaletteBuilder, Paletted, Schematic,
    SchematicEntity,
};
