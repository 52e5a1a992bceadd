//! # Chunk Providers
//!
//! Where chunks come from when they are not resident, and where they go when
//! they are saved.
//!
//! - [`VoidProvider`]: all-air chunks, nothing is stored
//! - [`FlatGenerator`]: layered superflat terrain, nothing is stored
//! - [`DiskProvider`](crate::DiskProvider): chunk files, falling back to a generator

use strata_core::coords::{unpack_chunk_key, SECTION_SIZE, SECTION_VOLUME};
use strata_core::BlockSection;

use crate::chunk::WorldChunk;
use crate::config::WorldBounds;
use crate::error::WorldResult;
use crate::flags::ChunkFlags;

/// Generation/storage collaborator consumed by the chunk index.
pub trait ChunkProvider: Send + Sync {
    /// Produces the chunk for `key`, from storage or by generating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk can be neither loaded nor generated.
    fn load_or_generate(&self, key: i64, bounds: &WorldBounds) -> WorldResult<WorldChunk>;

    /// Stores a chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk could not be written.
    fn persist(&self, chunk: &WorldChunk) -> WorldResult<()>;
}

/// Empty world. Persisting is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct VoidProvider;

impl ChunkProvider for VoidProvider {
    fn load_or_generate(&self, key: i64, bounds: &WorldBounds) -> WorldResult<WorldChunk> {
        let mut chunk = WorldChunk::from_key(key, *bounds);
        chunk.set_flag(ChunkFlags::GENERATED, true);
        Ok(chunk)
    }

    fn persist(&self, _chunk: &WorldChunk) -> WorldResult<()> {
        Ok(())
    }
}

/// Superflat terrain: horizontal layers stacked from the bottom of the world.
#[derive(Clone, Debug, Default)]
pub struct FlatGenerator {
    /// `(block id, thickness)` bottom to top.
    layers: Vec<(u32, u32)>,
}

impl FlatGenerator {
    /// Creates a generator from `(block id, thickness)` layers, bottom first.
    #[must_use]
    pub fn new(layers: Vec<(u32, u32)>) -> Self {
        Self { layers }
    }

    /// Bedrock, 3 dirt, 1 grass.
    #[must_use]
    pub fn classic() -> Self {
        Self::new(vec![(1, 1), (2, 3), (3, 1)])
    }

    /// Block id at height `offset` above the world floor.
    #[must_use]
    pub fn block_at(&self, offset: u32) -> u32 {
        let mut top = 0u32;
        for &(id, thickness) in &self.layers {
            top = top.saturating_add(thickness);
            if offset < top {
                return id;
            }
        }
        strata_core::AIR
    }

    fn section(&self, slot: usize) -> BlockSection {
        #[allow(clippy::cast_possible_truncation)]
        let base = (slot * SECTION_SIZE) as u32;
        let bottom = self.block_at(base);
        if (base..base + SECTION_SIZE as u32).all(|y| self.block_at(y) == bottom) {
            return BlockSection::filled(bottom);
        }
        let mut section = BlockSection::new();
        for i in 0..SECTION_VOLUME {
            #[allow(clippy::cast_possible_truncation)]
            let idx = i as u16;
            let id = self.block_at(base + u32::from(idx >> 10));
            section.set_flat(idx, id);
        }
        section
    }
}

impl ChunkProvider for FlatGenerator {
    fn load_or_generate(&self, key: i64, bounds: &WorldBounds) -> WorldResult<WorldChunk> {
        let (cx, cz) = unpack_chunk_key(key);
        let sections = (0..bounds.height_sections).map(|slot| self.section(slot)).collect();
        let mut chunk = WorldChunk::from_sections(cx, cz, *bounds, sections);
        chunk.set_flag(ChunkFlags::GENERATED, true);
        tracing::debug!("generated flat chunk ({}, {})", cx, cz);
        Ok(chunk)
    }

    fn persist(&self, _chunk: &WorldChunk) -> WorldResult<()> {
        Ok(())
    }
}
