//! Schematic files.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{CodecResult, Schematic, codec};

/// File extension used for saved schematics.
pub const EXTENSION: &str = "psch";

/// Write a schematic to `path`, replacing any existing file atomically.
///
/// The data is written to a temporary file in the same directory and then
/// renamed over the target, so readers never observe a partial file.
pub fn save(path: impl AsRef<Path>, schematic: &Schematic) -> CodecResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let bytes = codec::serialize(schematic);
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;

    debug!(path = %path.display(), bytes = bytes.len(), "saved schematic");
    Ok(())
}

/// Read and decode a schematic file.
pub fn load(path: impl AsRef<Path>) -> CodecResult<Schematic> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let schematic = codec::decode(&bytes)?;
    debug!(path = %path.display(), dims = %schematic.dimensions(), "loaded schematic");
    Ok(schematic)
}

#[cfg(test)]
mod tests {
    use plot_region::BlockState;

    use super::*;
    use crate::{CodecError, Dimensions};

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("plot.{EXTENSION}"));
        let schematic =
            Schematic::uniform(Dimensions::new(3, 2, 1).unwrap(), BlockState::new("minecraft:stone")).unwrap();

        save(&path, &schematic).unwrap();
        assert_eq!(load(&path).unwrap(), schematic);

        // Overwrite in place.
        let other = Schematic::uniform(Dimensions::new(1, 1, 1).unwrap(), BlockState::air()).unwrap();
        save(&path, &other).unwrap();
        assert_eq!(load(&path).unwrap(), other);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path().join("absent.psch")), Err(CodecError::Io(_))));
    }

    #[test]
    fn corrupt_file_is_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.psch");
        fs::write(&path, b"PSCH\x00").unwrap();
        assert!(matches!(load(&path), Err(CodecError::Truncated { .. })));
    }
}
