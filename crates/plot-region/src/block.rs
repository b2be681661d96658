//! Block, biome, and entity values as seen through a chunk accessor.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// A block-type descriptor such as `minecraft:stone`.
///
/// Cloning is a reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState(Arc<str>);

impl BlockState {
    pub const AIR_NAME: &'static str = "minecraft:air";

    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    #[must_use]
    pub fn air() -> Self {
        Self::new(Self::AIR_NAME)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_air(&self) -> bool {
        &*self.0 == Self::AIR_NAME
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::air()
    }
}

impl fmt::Debug for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockState({})", self.0)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockState {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A biome descriptor such as `minecraft:plains`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Biome(Arc<str>);

impl Biome {
    pub const DEFAULT_NAME: &'static str = "minecraft:plains";

    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Biome {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

impl fmt::Debug for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Biome({})", self.0)
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Biome {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Host-assigned entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// An entity living in a chunk.
///
/// `pos` is chunk-local: X and Z in `0.0..16.0`, Y in world height. The
/// payload is opaque serialized entity state owned by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub pos: [f64; 3],
    pub payload: Bytes,
}
