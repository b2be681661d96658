//! In-memory world backing for tests, tools, and the runner.
//!
//! Columns are generated lazily from a seed and stored paletted. Accessors
//! stage a private copy of their column and publish it on commit, so an
//! accessor that is dropped mid-edit leaves the world untouched.
//!
//! The world can be told to report chunks as unavailable, to fault, or to
//! panic on open, and it records whether two accessors for the same chunk
//! were ever alive at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{trace, warn};

use crate::{
    AccessError, AccessResult, AccessorFactory, Biome, BlockPos, BlockState, CHUNK_SIZE, ChunkPos,
    EntityId, EntityRecord, LocalArea, LocalPos, Region, RegionAccessor,
};

/// Dense array of values stored as indices into a small palette.
#[derive(Clone, Debug)]
struct Paletted<T> {
    palette: Vec<T>,
    indices: Vec<u32>,
}

impl<T: Clone + PartialEq> Paletted<T> {
    fn filled(value: T, len: usize) -> Self {
        Self {
            palette: vec![value],
            indices: vec![0; len],
        }
    }

    fn get(&self, index: usize) -> &T {
        &self.palette[self.indices[index] as usize]
    }

    fn set(&mut self, index: usize, value: T) {
        let slot = match self.palette.iter().position(|v| *v == value) {
            Some(slot) => slot,
            None => {
                self.palette.push(value);
                self.palette.len() - 1
            }
        };
        self.indices[index] = slot as u32;
    }
}

#[derive(Clone, Debug)]
struct Column {
    blocks: Paletted<BlockState>,
    biomes: Paletted<Biome>,
    entities: Vec<EntityRecord>,
}

/// An [`AccessorFactory`] that keeps the whole world in memory.
pub struct MemoryWorld {
    seed: u64,
    min_y: i32,
    max_y: i32,
    columns: RwLock<FxHashMap<ChunkPos, Column>>,
    unavailable: Mutex<FxHashMap<ChunkPos, u32>>,
    faults: Mutex<FxHashMap<ChunkPos, String>>,
    panics: Mutex<FxHashSet<ChunkPos>>,
    open_accessors: Mutex<FxHashMap<ChunkPos, u32>>,
    overlap_detected: AtomicBool,
    next_entity: AtomicU64,
    opens: AtomicU64,
    commits: AtomicU64,
}

impl MemoryWorld {
    /// Create a world spanning heights `min_y..=max_y`.
    ///
    /// # Panics
    /// Panics if `min_y > max_y`.
    #[must_use]
    pub fn new(seed: u64, min_y: i32, max_y: i32) -> Self {
        assert!(min_y <= max_y, "min_y {min_y} above max_y {max_y}");
        Self {
            seed,
            min_y,
            max_y,
            columns: RwLock::new(FxHashMap::default()),
            unavailable: Mutex::new(FxHashMap::default()),
            faults: Mutex::new(FxHashMap::default()),
            panics: Mutex::new(FxHashSet::default()),
            open_accessors: Mutex::new(FxHashMap::default()),
            overlap_detected: AtomicBool::new(false),
            next_entity: AtomicU64::new(1),
            opens: AtomicU64::new(0),
            commits: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn min_y(&self) -> i32 {
        self.min_y
    }

    #[must_use]
    pub const fn max_y(&self) -> i32 {
        self.max_y
    }

    /// Report `chunk` as unavailable for the next `times` opens.
    pub fn make_unavailable(&self, chunk: ChunkPos, times: u32) {
        self.unavailable.lock().insert(chunk, times);
    }

    /// Make every open of `chunk` fail permanently.
    pub fn inject_fault(&self, chunk: ChunkPos, reason: impl Into<String>) {
        self.faults.lock().insert(chunk, reason.into());
    }

    /// Make every open of `chunk` panic.
    pub fn inject_panic(&self, chunk: ChunkPos) {
        self.panics.lock().insert(chunk);
    }

    /// Whether two accessors for one chunk were ever alive at the same time.
    #[must_use]
    pub fn concurrent_access_detected(&self) -> bool {
        self.overlap_detected.load(Ordering::SeqCst)
    }

    /// Total number of successful opens.
    #[must_use]
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Total number of commits.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Read a block directly, bypassing accessors.
    #[must_use]
    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.with_column(pos.chunk(), |column| {
            self.index(pos.local())
                .map_or_else(BlockState::air, |i| column.blocks.get(i).clone())
        })
    }

    /// Write a block directly, bypassing accessors.
    pub fn set_block(&self, pos: BlockPos, block: BlockState) {
        if let Some(i) = self.index(pos.local()) {
            self.with_column_mut(pos.chunk(), |column| column.blocks.set(i, block));
        }
    }

    /// Read a biome directly.
    #[must_use]
    pub fn biome(&self, pos: BlockPos) -> Biome {
        self.with_column(pos.chunk(), |column| {
            self.index(pos.local())
                .map_or_else(Biome::default, |i| column.biomes.get(i).clone())
        })
    }

    /// Write a biome directly.
    pub fn set_biome(&self, pos: BlockPos, biome: Biome) {
        if let Some(i) = self.index(pos.local()) {
            self.with_column_mut(pos.chunk(), |column| column.biomes.set(i, biome));
        }
    }

    /// Spawn an entity at a world position.
    pub fn spawn_entity(&self, pos: [f64; 3], payload: Bytes) -> EntityId {
        let block = BlockPos::new(pos[0].floor() as i32, pos[1].floor() as i32, pos[2].floor() as i32);
        let chunk = block.chunk();
        let id = self.allocate_entity();
        let local = [
            pos[0] - f64::from(chunk.min_block_x()),
            pos[1],
            pos[2] - f64::from(chunk.min_block_z()),
        ];
        self.with_column_mut(chunk, |column| {
            column.entities.push(EntityRecord {
                id,
                pos: local,
                payload,
            });
        });
        id
    }

    /// Entities inside `region` as `(world position, payload)`, sorted by
    /// position then payload so snapshots compare independently of ids.
    #[must_use]
    pub fn entities_in(&self, region: &Region) -> Vec<([f64; 3], Bytes)> {
        let mut found = Vec::new();
        for slice in region.chunk_slices() {
            self.with_column(slice.chunk, |column| {
                for entity in &column.entities {
                    if slice.area.contains_point(entity.pos) {
                        found.push((
                            [
                                entity.pos[0] + f64::from(slice.chunk.min_block_x()),
                                entity.pos[1],
                                entity.pos[2] + f64::from(slice.chunk.min_block_z()),
                            ],
                            entity.payload.clone(),
                        ));
                    }
                }
            });
        }
        found.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        found
    }

    /// Every block of `region` in Y, Z, X order.
    #[must_use]
    pub fn snapshot(&self, region: &Region) -> Vec<BlockState> {
        let (min, max) = (region.min(), region.max());
        let mut out = Vec::with_capacity(region.volume() as usize);
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                for x in min.x..=max.x {
                    out.push(self.block(BlockPos::new(x, y, z)));
                }
            }
        }
        out
    }

    /// What the generator places at `pos`.
    #[must_use]
    pub fn generated_block(&self, pos: BlockPos) -> BlockState {
        let surface = self.surface_height(pos.x, pos.z);
        let name = if pos.y == self.min_y {
            "minecraft:bedrock"
        } else if pos.y > surface {
            BlockState::AIR_NAME
        } else if pos.y == surface {
            "minecraft:grass_block"
        } else if pos.y > surface - 3 {
            "minecraft:dirt"
        } else {
            "minecraft:stone"
        };
        BlockState::new(name)
    }

    fn surface_height(&self, x: i32, z: i32) -> i32 {
        let base = self.min_y + (self.max_y - self.min_y) / 4;
        let jitter = (mix(self.seed ^ (x as u64).wrapping_mul(0x9E37_79B9) ^ (z as u64).rotate_left(32)) % 3) as i32;
        (base + jitter).min(self.max_y)
    }

    fn allocate_entity(&self) -> EntityId {
        EntityId(self.next_entity.fetch_add(1, Ordering::Relaxed))
    }

    fn index(&self, pos: LocalPos) -> Option<usize> {
        if pos.y < self.min_y || pos.y > self.max_y {
            return None;
        }
        let size = CHUNK_SIZE as usize;
        let y = (pos.y - self.min_y) as usize;
        Some((y * size + pos.z as usize) * size + pos.x as usize)
    }

    fn generate(&self, chunk: ChunkPos) -> Column {
        let height = (self.max_y - self.min_y + 1) as usize;
        let len = height * (CHUNK_SIZE * CHUNK_SIZE) as usize;
        let mut blocks = Paletted::filled(BlockState::air(), len);
        let full = LocalArea::column(self.min_y, self.max_y);
        for local in full.positions() {
            let block = self.generated_block(chunk.to_world(local));
            if !block.is_air() {
                if let Some(i) = self.index(local) {
                    blocks.set(i, block);
                }
            }
        }
        trace!("generated {chunk}");
        Column {
            blocks,
            biomes: Paletted::filled(Biome::default(), len),
            entities: Vec::new(),
        }
    }

    fn load(&self, chunk: ChunkPos) -> Column {
        if let Some(column) = self.columns.read().get(&chunk) {
            return column.clone();
        }
        self.generate(chunk)
    }

    fn with_column<R>(&self, chunk: ChunkPos, f: impl FnOnce(&Column) -> R) -> R {
        if let Some(column) = self.columns.read().get(&chunk) {
            return f(column);
        }
        f(&self.generate(chunk))
    }

    fn with_column_mut<R>(&self, chunk: ChunkPos, f: impl FnOnce(&mut Column) -> R) -> R {
        let mut columns = self.columns.write();
        let column = columns.entry(chunk).or_insert_with(|| self.generate(chunk));
        f(column)
    }
}

/// SplitMix64 finalizer.
const fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl AccessorFactory for MemoryWorld {
    type Accessor<'a> = MemoryAccessor<'a>;

    fn open(&self, chunk: ChunkPos) -> AccessResult<MemoryAccessor<'_>> {
        if self.panics.lock().contains(&chunk) {
            panic!("injected panic opening {chunk}");
        }
        {
            let mut unavailable = self.unavailable.lock();
            if let Some(remaining) = unavailable.get_mut(&chunk) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AccessError::ChunkUnavailable(chunk));
                }
            }
        }
        if let Some(reason) = self.faults.lock().get(&chunk) {
            return Err(AccessError::fault(chunk, reason.clone()));
        }

        {
            let mut open = self.open_accessors.lock();
            let count = open.entry(chunk).or_insert(0);
            *count += 1;
            if *count > 1 {
                warn!("{chunk} opened while another accessor is alive");
                self.overlap_detected.store(true, Ordering::SeqCst);
            }
        }
        self.opens.fetch_add(1, Ordering::Relaxed);

        Ok(MemoryAccessor {
            world: self,
            chunk,
            column: self.load(chunk),
            dirty: false,
        })
    }
}

/// Staged view of one [`MemoryWorld`] column.
pub struct MemoryAccessor<'a> {
    world: &'a MemoryWorld,
    chunk: ChunkPos,
    column: Column,
    dirty: bool,
}

impl MemoryAccessor<'_> {
    fn index(&self, pos: LocalPos) -> AccessResult<usize> {
        self.world.index(pos).ok_or_else(|| {
            AccessError::fault(self.chunk, format!("height {} outside the world", pos.y))
        })
    }
}

impl RegionAccessor for MemoryAccessor<'_> {
    fn chunk(&self) -> ChunkPos {
        self.chunk
    }

    fn read_block(&self, pos: LocalPos) -> AccessResult<BlockState> {
        Ok(self.column.blocks.get(self.index(pos)?).clone())
    }

    fn write_block(&mut self, pos: LocalPos, block: BlockState) -> AccessResult<()> {
        let i = self.index(pos)?;
        self.column.blocks.set(i, block);
        self.dirty = true;
        Ok(())
    }

    fn read_biome(&self, pos: LocalPos) -> AccessResult<Biome> {
        Ok(self.column.biomes.get(self.index(pos)?).clone())
    }

    fn write_biome(&mut self, pos: LocalPos, biome: Biome) -> AccessResult<()> {
        let i = self.index(pos)?;
        self.column.biomes.set(i, biome);
        self.dirty = true;
        Ok(())
    }

    fn list_entities(&self, area: &LocalArea) -> AccessResult<Vec<EntityRecord>> {
        Ok(self
            .column
            .entities
            .iter()
            .filter(|e| area.contains_point(e.pos))
            .cloned()
            .collect())
    }

    fn spawn_entity(&mut self, pos: [f64; 3], payload: Bytes) -> AccessResult<EntityId> {
        let id = self.world.allocate_entity();
        self.column.entities.push(EntityRecord { id, pos, payload });
        self.dirty = true;
        Ok(id)
    }

    fn remove_entity(&mut self, id: EntityId) -> AccessResult<bool> {
        let before = self.column.entities.len();
        self.column.entities.retain(|e| e.id != id);
        let removed = self.column.entities.len() != before;
        self.dirty |= removed;
        Ok(removed)
    }

    fn regenerate(&mut self, area: &LocalArea) -> AccessResult<()> {
        for pos in area.positions() {
            let i = self.index(pos)?;
            let block = self.world.generated_block(self.chunk.to_world(pos));
            self.column.blocks.set(i, block);
            self.column.biomes.set(i, Biome::default());
        }
        self.column.entities.retain(|e| !area.contains_point(e.pos));
        self.dirty = true;
        Ok(())
    }

    fn commit(mut self) -> AccessResult<()> {
        if self.dirty {
            let column = std::mem::replace(
                &mut self.column,
                Column {
                    blocks: Paletted::filled(BlockState::air(), 0),
                    biomes: Paletted::filled(Biome::default(), 0),
                    entities: Vec::new(),
                },
            );
            self.world.columns.write().insert(self.chunk, column);
            self.world.commits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

impl Drop for MemoryAccessor<'_> {
    fn drop(&mut self) {
        let mut open = self.world.open_accessors.lock();
        if let Some(count) = open.get_mut(&self.chunk) {
            *count -= 1;
            if *count == 0 {
                open.remove(&self.chunk);
            }
        }
    }
}
