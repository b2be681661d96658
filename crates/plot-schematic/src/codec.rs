//! Binary schematic format.
//!
//! All integers are big-endian.
//!
//! ```text
//! magic        4 bytes  "PSCH"
//! version      u16
//! width        u16
//! height       u16
//! length       u16
//! palette      u32 count, then per entry: u16 byte length + UTF-8 bytes
//! block data   one index per cell: u8 if the palette has <= 256 entries, else u16
//! biome flag   u8 (0 = absent, 1 = present)
//! [biomes]     palette + indices, same layout as blocks
//! entities     u32 count, then per entity: f64 x, f64 y, f64 z, u32 len, bytes
//! ```

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes};
use plot_region::{Biome, BlockState};
use tracing::trace;

use crate::schematic::{Dimensions, MAX_PALETTE_LEN, Paletted, Schematic, SchematicEntity};
use crate::{CodecError, CodecResult};

pub const MAGIC: [u8; 4] = *b"PSCH";
pub const VERSION: u16 = 1;

/// Serialize a schematic.
#[must_use]
pub fn serialize(schematic: &Schematic) -> Vec<u8> {
    let dims = schematic.dimensions();
    let mut out = Vec::with_capacity(16 + dims.volume() * 2);

    out.put_slice(&MAGIC);
    out.put_u16(VERSION);
    out.put_u16(dims.width);
    out.put_u16(dims.height);
    out.put_u16(dims.length);

    write_layer(&mut out, schematic.blocks(), BlockState::name);
    match schematic.biomes() {
        Some(biomes) => {
            out.put_u8(1);
            write_layer(&mut out, biomes, Biome::name);
        }
        None => out.put_u8(0),
    }

    out.put_u32(schematic.entities().len() as u32);
    for entity in schematic.entities() {
        for axis in entity.offset {
            out.put_f64(axis);
        }
        out.put_u32(entity.payload.len() as u32);
        out.put_slice(&entity.payload);
    }

    trace!(bytes = out.len(), %dims, "serialized schematic");
    out
}

fn write_layer<T>(out: &mut Vec<u8>, layer: &Paletted<T>, name: impl Fn(&T) -> &str) {
    out.put_u32(layer.palette().len() as u32);
    for entry in layer.palette() {
        let name = name(entry);
        out.put_u16(name.len() as u16);
        out.put_slice(name.as_bytes());
    }
    if layer.wide() {
        for &index in layer.indices() {
            out.put_u16(index);
        }
    } else {
        out.extend(layer.indices().iter().map(|&index| index as u8));
    }
}

/// Decode a schematic. Never returns a partially decoded value.
pub fn decode(input: &[u8]) -> CodecResult<Schematic> {
    let mut reader = Reader::new(input);

    let magic = reader.take(4)?;
    if magic != MAGIC {
        let mut found = [0; 4];
        found.copy_from_slice(magic);
        return Err(CodecError::BadMagic { found });
    }

    let version = reader.u16()?;
    if version == 0 {
        return Err(CodecError::InvalidVersion(version));
    }
    if version > VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: VERSION,
        });
    }

    let dims = Dimensions::new(reader.u16()?, reader.u16()?, reader.u16()?)?;
    let blocks = read_layer(&mut reader, dims, |name| BlockState::new(name))?;

    let biomes = match reader.u8()? {
        0 => None,
        1 => Some(read_layer(&mut reader, dims, |name| Biome::new(name))?),
        flag => return Err(CodecError::InvalidBiomeFlag(flag)),
    };

    let count = reader.u32()? as usize;
    // Each entity needs at least 28 bytes, which bounds the allocation.
    let mut entities = Vec::with_capacity(count.min(reader.remaining() / 28));
    for _ in 0..count {
        let offset = [reader.f64()?, reader.f64()?, reader.f64()?];
        let len = reader.u32()? as usize;
        let payload = Bytes::copy_from_slice(reader.take(len)?);
        entities.push(SchematicEntity { offset, payload });
    }

    if reader.remaining() > 0 {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }

    Schematic::new(dims, blocks, biomes, entities)
}

fn read_layer<T, F>(reader: &mut Reader<'_>, dims: Dimensions, make: F) -> CodecResult<Paletted<T>>
where
    T: Eq + std::hash::Hash + std::fmt::Display,
    F: Fn(&str) -> T,
{
    let count = reader.u32()? as usize;
    if count > MAX_PALETTE_LEN {
        return Err(CodecError::PaletteTooLarge {
            len: count,
            max: MAX_PALETTE_LEN,
        });
    }

    let mut palette = Vec::with_capacity(count.min(reader.remaining() / 2));
    for _ in 0..count {
        let len = usize::from(reader.u16()?);
        let name = std::str::from_utf8(reader.take(len)?)?;
        palette.push(make(name));
    }

    let cells = dims.volume();
    let wide = count > 256;
    let raw = reader.take(if wide { cells * 2 } else { cells })?;
    let indices: Vec<u16> = if wide {
        raw.chunks_exact(2).map(BigEndian::read_u16).collect()
    } else {
        raw.iter().map(|&b| u16::from(b)).collect()
    };

    Paletted::new(palette, indices)
}

/// Cursor over the input that reports how much was missing on underrun.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(CodecError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> CodecResult<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> CodecResult<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn f64(&mut self) -> CodecResult<f64> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(palette_len: usize) -> Schematic {
        let dims = Dimensions::new(20, 2, 10).unwrap();
        let palette: Vec<_> = (0..palette_len)
            .map(|i| BlockState::new(format!("test:block_{i}")))
            .collect();
        let indices = (0..dims.volume()).map(|i| (i % palette_len) as u16).collect();
        let blocks = Paletted::new(palette, indices).unwrap();
        let biomes = Paletted::new(
            vec![Biome::default(), Biome::new("minecraft:desert")],
            (0..dims.volume()).map(|i| (i % 2) as u16).collect(),
        )
        .unwrap();
        let entities = vec![SchematicEntity {
            offset: [1.5, 0.0, 9.25],
            payload: Bytes::from_static(b"{id:sheep}"),
        }];
        Schematic::new(dims, blocks, Some(biomes), entities).unwrap()
    }

    #[test]
    fn narrow_and_wide_palettes_decode_back() {
        for palette_len in [1, 256, 257, 400] {
            let schematic = sample(palette_len);
            let bytes = serialize(&schematic);
            assert_eq!(decode(&bytes).unwrap(), schematic, "palette of {palette_len}");
        }
    }

    #[test]
    fn index_width_follows_palette_size() {
        let narrow = serialize(&sample(256));
        let wide = serialize(&sample(257));
        let cells = 20 * 2 * 10;
        // One extra palette entry plus one extra byte per cell.
        let extra_entry = 2 + "test:block_256".len();
        assert_eq!(wide.len() - narrow.len(), cells + extra_entry);
    }

    #[test]
    fn header_layout() {
        let schematic = Schematic::uniform(Dimensions::new(1, 1, 1).unwrap(), BlockState::new("a")).unwrap();
        let bytes = serialize(&schematic);
        assert_eq!(&bytes[..4], b"PSCH");
        assert_eq!(&bytes[4..6], &[0, 1]);
        assert_eq!(&bytes[6..12], &[0, 1, 0, 1, 0, 1]);
        // Palette: one entry "a", then one u8 index, no biomes, no entities.
        assert_eq!(&bytes[12..], &[0, 0, 0, 1, 0, 1, b'a', 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn index_equal_to_palette_len_is_rejected() {
        let schematic = Schematic::uniform(Dimensions::new(2, 1, 1).unwrap(), BlockState::air()).unwrap();
        let mut bytes = serialize(&schematic);
        // The two block indices follow the 12-byte header and the palette.
        let data = 12 + 4 + 2 + BlockState::AIR_NAME.len();
        bytes[data + 1] = 1;
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::InvalidIndex {
                index: 1,
                palette_len: 1
            })
        ));
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = serialize(&sample(3));
        bytes[5] = 9;
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::UnsupportedVersion {
                found: 9,
                supported: 1
            })
        ));
    }

    #[test]
    fn version_zero_is_invalid() {
        let mut bytes = serialize(&sample(3));
        bytes[5] = 0;
        assert!(matches!(decode(&bytes), Err(CodecError::InvalidVersion(0))));
    }

    #[test]
    fn longest_storable_name_survives() {
        let name = "y".repeat(crate::schematic::MAX_ENTRY_LEN);
        let schematic = Schematic::uniform(Dimensions::new(1, 1, 1).unwrap(), BlockState::new(&name)).unwrap();
        let decoded = decode(&serialize(&schematic)).unwrap();
        assert_eq!(decoded.block_at(0, 0, 0).name(), name);
    }

    #[test]
    fn every_truncation_is_reported() {
        let bytes = serialize(&sample(3));
        for len in 0..bytes.len() {
            match decode(&bytes[..len]) {
                Err(CodecError::Truncated { needed, available }) => assert!(needed > available),
                other => panic!("prefix of {len} bytes decoded as {other:?}"),
            }
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = serialize(&sample(3));
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(CodecError::TrailingBytes(1))));
    }

    #[test]
    fn bad_magic() {
        let mut bytes = serialize(&sample(1));
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(CodecError::BadMagic { .. })));
    }

    #[test]
    fn invalid_utf8_in_palette() {
        let schematic = Schematic::uniform(Dimensions::new(1, 1, 1).unwrap(), BlockState::new("ab")).unwrap();
        let mut bytes = serialize(&schematic);
        bytes[18] = 0xFF;
        assert!(matches!(decode(&bytes), Err(CodecError::InvalidUtf8(_))));
    }
}
