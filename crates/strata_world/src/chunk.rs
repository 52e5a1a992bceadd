//! # World Chunk
//!
//! A full-height column of 32x32x32 sections at one chunk coordinate.
//!
//! ## Layout
//!
//! ```text
//! sections[h-1]  ┌──────────┐  y = max_y
//!                │  32^3    │
//!     ...        ├──────────┤
//! sections[0]    │  32^3    │  y = min_y
//!                └──────────┘
//! height_map     32x32 i16, highest non-air Y per column
//! states         sparse (y, lz, lx) -> Present | Cleared
//! flags          LOADED | GENERATED | POPULATED | TICKING | DIRTY | SAVING
//! ```
//!
//! ## Coordinates
//!
//! Block methods take world coordinates. X and Z are reduced to local
//! coordinates; the caller is responsible for routing them to the right chunk
//! (see [`ChunkAccessor`](crate::ChunkAccessor)). Y outside the world reads as
//! air and rejects writes.

use std::collections::HashMap;

use strata_core::coords::{
    chunk_coord, chunk_key, flat_block_index, flat_column_index, local_coord, unpack_chunk_key, COLUMN_AREA,
    SECTION_SIZE,
};
use strata_core::{BlockSection, AIR};

use crate::config::{DemotionPolicy, WorldBounds};
use crate::error::{WorldError, WorldResult};
use crate::flags::{ChunkFlags, SetBlockOptions};
use crate::state::{BlockState, StateEntry};

/// Height map value for a column with no non-air block.
pub const EMPTY_COLUMN: i16 = i16::MIN;

/// One column of sections plus per-column metadata.
#[derive(Clone, Debug)]
pub struct WorldChunk {
    /// Packed chunk coordinate.
    key: i64,
    /// Chunk X.
    cx: i32,
    /// Chunk Z.
    cz: i32,
    /// World height range.
    bounds: WorldBounds,
    /// Sections bottom to top.
    sections: Box<[BlockSection]>,
    /// Highest non-air Y per column, `EMPTY_COLUMN` if none.
    height_map: Box<[i16; COLUMN_AREA]>,
    /// State flags.
    flags: ChunkFlags,
    /// Sparse extra state. `None` marks an explicit clear.
    states: HashMap<u32, Option<BlockState>>,
    /// Palette demotion policy applied to every section.
    demotion: DemotionPolicy,
}

impl WorldChunk {
    /// Creates an all-air chunk.
    #[must_use]
    pub fn new(cx: i32, cz: i32, bounds: WorldBounds) -> Self {
        let sections = (0..bounds.height_sections).map(|_| BlockSection::new()).collect();
        Self::from_parts(cx, cz, bounds, sections)
    }

    /// Creates an all-air chunk for a packed key.
    #[must_use]
    pub fn from_key(key: i64, bounds: WorldBounds) -> Self {
        let (cx, cz) = unpack_chunk_key(key);
        Self::new(cx, cz, bounds)
    }

    /// Assembles a chunk from pre-built sections and recomputes the height map.
    ///
    /// # Panics
    /// Panics if `sections.len() != bounds.height_sections`.
    #[must_use]
    pub fn from_sections(cx: i32, cz: i32, bounds: WorldBounds, sections: Vec<BlockSection>) -> Self {
        let mut chunk = Self::from_parts(cx, cz, bounds, sections.into_boxed_slice());
        chunk.recompute_height_map();
        chunk
    }

    fn from_parts(cx: i32, cz: i32, bounds: WorldBounds, sections: Box<[BlockSection]>) -> Self {
        assert_eq!(
            sections.len(),
            bounds.height_sections,
            "chunk ({cx}, {cz}) needs {} sections",
            bounds.height_sections
        );
        let mut chunk = Self {
            key: chunk_key(cx, cz),
            cx,
            cz,
            bounds,
            sections,
            height_map: Box::new([EMPTY_COLUMN; COLUMN_AREA]),
            flags: ChunkFlags::empty(),
            states: HashMap::new(),
            demotion: DemotionPolicy::Manual,
        };
        chunk.set_demotion(DemotionPolicy::Eager);
        chunk
    }

    /// Packed chunk key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> i64 {
        self.key
    }

    /// Chunk X.
    #[inline]
    #[must_use]
    pub const fn cx(&self) -> i32 {
        self.cx
    }

    /// Chunk Z.
    #[inline]
    #[must_use]
    pub const fn cz(&self) -> i32 {
        self.cz
    }

    /// World height range.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// True if world column `(x, z)` belongs to this chunk.
    #[inline]
    #[must_use]
    pub const fn owns_column(&self, x: i32, z: i32) -> bool {
        chunk_coord(x) == self.cx && chunk_coord(z) == self.cz
    }

    /// Current demotion policy.
    #[inline]
    #[must_use]
    pub const fn demotion(&self) -> DemotionPolicy {
        self.demotion
    }

    /// Applies a demotion policy to every section.
    pub fn set_demotion(&mut self, policy: DemotionPolicy) {
        if self.demotion == policy {
            return;
        }
        self.demotion = policy;
        let eager = policy == DemotionPolicy::Eager;
        for section in self.sections.iter_mut() {
            section.set_auto_demote(eager);
        }
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Gets the block at a world position. Air outside the world height.
    #[must_use]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> u32 {
        if !self.bounds.contains_y(y) {
            return AIR;
        }
        self.sections[self.bounds.section_slot(y)].get(lx(x), ly(y), lz(z))
    }

    /// Sets the block at a world position and returns the previous id.
    ///
    /// When the id changes the chunk becomes dirty, the column height is
    /// updated (unless `SKIP_HEIGHT_RECOMPUTE`) and any extra state at the
    /// position is cleared (unless `SKIP_STATE_UPDATE`). `FORCE_DIRTY` marks
    /// the chunk dirty even for a no-op write.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if `y` is outside the world; nothing is modified.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: u32, options: SetBlockOptions) -> WorldResult<u32> {
        self.check_y(y)?;
        debug_assert!(self.owns_column(x, z), "({x}, {z}) is not in chunk ({}, {})", self.cx, self.cz);

        let (lx, lz) = (lx(x), lz(z));
        let old = self.sections[self.bounds.section_slot(y)].set_flat(flat_block_index(lx, ly(y), lz), id);
        let changed = old != id;

        if changed || options.contains(SetBlockOptions::FORCE_DIRTY) {
            self.flags.insert(ChunkFlags::DIRTY);
        }
        if changed && !options.contains(SetBlockOptions::SKIP_HEIGHT_RECOMPUTE) {
            self.update_height(lx, lz, y, id);
        }
        if changed && !options.contains(SetBlockOptions::SKIP_STATE_UPDATE) {
            let key = self.state_key(lx, y, lz);
            if let Some(entry) = self.states.get_mut(&key) {
                *entry = None;
            }
        }
        Ok(old)
    }

    /// Marks or unmarks the block at a world position as ticking.
    ///
    /// Returns false outside the world height or when asked to tick air.
    /// Tick bits are saved with the chunk, so a changed bit marks it dirty.
    pub fn set_ticking(&mut self, x: i32, y: i32, z: i32, active: bool) -> bool {
        if !self.bounds.contains_y(y) {
            return false;
        }
        let idx = flat_block_index(lx(x), ly(y), lz(z));
        let section = &mut self.sections[self.bounds.section_slot(y)];
        let was = section.is_ticking(idx);
        if !section.set_ticking(idx, active) {
            return false;
        }
        if was != active {
            self.flags.insert(ChunkFlags::DIRTY);
        }
        true
    }

    /// True if the block at a world position is ticking.
    #[must_use]
    pub fn is_ticking(&self, x: i32, y: i32, z: i32) -> bool {
        self.bounds.contains_y(y)
            && self.sections[self.bounds.section_slot(y)].is_ticking(flat_block_index(lx(x), ly(y), lz(z)))
    }

    /// Total ticking blocks across all sections.
    #[must_use]
    pub fn ticking_count(&self) -> u32 {
        self.sections.iter().map(BlockSection::ticking_count).sum()
    }

    /// Total non-air blocks.
    #[must_use]
    pub fn non_air_count(&self) -> u64 {
        self.sections.iter().map(|s| u64::from(s.count_non_air())).sum()
    }

    // =========================================================================
    // Height map
    // =========================================================================

    /// Cached highest non-air Y of a column, or [`EMPTY_COLUMN`].
    #[inline]
    #[must_use]
    pub fn get_height(&self, local_x: u8, local_z: u8) -> i16 {
        self.height_map[usize::from(flat_column_index(local_x, local_z))]
    }

    /// Raw height map, indexed by flat column index.
    #[must_use]
    pub fn height_map(&self) -> &[i16; COLUMN_AREA] {
        &self.height_map
    }

    /// Rebuilds every column of the height map from block data.
    pub fn recompute_height_map(&mut self) {
        for lz in 0..32u8 {
            for lx in 0..32u8 {
                let top = self.scan_column(lx, lz, self.bounds.max_y);
                self.height_map[usize::from(flat_column_index(lx, lz))] = top;
            }
        }
    }

    fn update_height(&mut self, lx: u8, lz: u8, y: i32, id: u32) {
        let col = usize::from(flat_column_index(lx, lz));
        let current = i32::from(self.height_map[col]);
        if id != AIR {
            if y > current {
                self.height_map[col] = to_height(y);
            }
        } else if y == current {
            self.height_map[col] = self.scan_column(lx, lz, y - 1);
        }
    }

    /// Highest non-air Y at or below `top`.
    fn scan_column(&self, lx: u8, lz: u8, top: i32) -> i16 {
        let mut y = top;
        while y >= self.bounds.min_y {
            let slot = self.bounds.section_slot(y);
            let section = &self.sections[slot];
            if section.is_uniform_air() {
                y = self.section_base(slot) - 1;
                continue;
            }
            if section.get(lx, ly(y), lz) != AIR {
                return to_height(y);
            }
            y -= 1;
        }
        EMPTY_COLUMN
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    const fn section_base(&self, slot: usize) -> i32 {
        self.bounds.min_y + (slot * SECTION_SIZE) as i32
    }

    // =========================================================================
    // Extra state
    // =========================================================================

    /// Extra state at a world position, if present.
    #[must_use]
    pub fn get_state(&self, x: i32, y: i32, z: i32) -> Option<&BlockState> {
        self.state_entry(x, y, z).present()
    }

    /// Distinguishes never-set, cleared and present extra state.
    #[must_use]
    pub fn state_entry(&self, x: i32, y: i32, z: i32) -> StateEntry<'_> {
        if !self.bounds.contains_y(y) {
            return StateEntry::Absent;
        }
        match self.states.get(&self.state_key(lx(x), y, lz(z))) {
            None => StateEntry::Absent,
            Some(None) => StateEntry::Cleared,
            Some(Some(state)) => StateEntry::Present(state),
        }
    }

    /// Attaches extra state to a world position, returning any previous state.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if `y` is outside the world.
    pub fn set_state(&mut self, x: i32, y: i32, z: i32, state: BlockState) -> WorldResult<Option<BlockState>> {
        self.check_y(y)?;
        self.flags.insert(ChunkFlags::DIRTY);
        let key = self.state_key(lx(x), y, lz(z));
        Ok(self.states.insert(key, Some(state)).flatten())
    }

    /// Explicitly clears extra state at a world position, returning it.
    ///
    /// The position reads as [`StateEntry::Cleared`] afterwards. Ignored
    /// outside the world height.
    pub fn clear_state(&mut self, x: i32, y: i32, z: i32) -> Option<BlockState> {
        if !self.bounds.contains_y(y) {
            return None;
        }
        let key = self.state_key(lx(x), y, lz(z));
        let previous = self.states.insert(key, None).flatten();
        if previous.is_some() {
            self.flags.insert(ChunkFlags::DIRTY);
        }
        previous
    }

    /// Forgets cleared markers. Returns how many were dropped.
    pub fn prune_cleared_states(&mut self) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| state.is_some());
        before - self.states.len()
    }

    /// Number of positions with present extra state.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.values().filter(|s| s.is_some()).count()
    }

    /// Packed overlay key: `(y - min_y) << 10 | lz << 5 | lx`.
    #[allow(clippy::cast_sign_loss)]
    fn state_key(&self, lx: u8, y: i32, lz: u8) -> u32 {
        ((y - self.bounds.min_y) as u32) << 10 | u32::from(flat_column_index(lx, lz))
    }

    pub(crate) fn raw_states(&self) -> impl Iterator<Item = (u32, Option<&BlockState>)> {
        self.states.iter().map(|(&k, v)| (k, v.as_ref()))
    }

    pub(crate) fn insert_raw_state(&mut self, key: u32, state: Option<BlockState>) {
        self.states.insert(key, state);
    }

    pub(crate) fn restore_height_map(&mut self, heights: &[i16; COLUMN_AREA]) {
        self.height_map.copy_from_slice(heights);
    }

    // =========================================================================
    // Flags & sections
    // =========================================================================

    /// True if every bit of `flag` is set.
    #[inline]
    #[must_use]
    pub const fn is(&self, flag: ChunkFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Sets or clears `flag`.
    #[inline]
    pub fn set_flag(&mut self, flag: ChunkFlags, value: bool) {
        self.flags.set(flag, value);
    }

    /// All flags.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ChunkFlags {
        self.flags
    }

    /// Section at slot `index` (0 = bottom).
    ///
    /// # Panics
    /// Panics if `index >= height_sections`.
    #[must_use]
    pub fn section(&self, index: usize) -> &BlockSection {
        &self.sections[index]
    }

    /// Mutable section at slot `index`. The height map is not updated.
    ///
    /// # Panics
    /// Panics if `index >= height_sections`.
    pub fn section_mut(&mut self, index: usize) -> &mut BlockSection {
        &mut self.sections[index]
    }

    /// All sections, bottom to top.
    #[must_use]
    pub fn sections(&self) -> &[BlockSection] {
        &self.sections
    }

    /// Demotes every section whose palette allows it. Returns how many changed.
    pub fn compact(&mut self) -> usize {
        let demoted = self.sections.iter_mut().map(BlockSection::compact).filter(|&d| d).count();
        if demoted > 0 {
            tracing::trace!("chunk ({}, {}) compacted {} sections", self.cx, self.cz, demoted);
        }
        demoted
    }

    /// Approximate bytes held by this chunk.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let sections: usize = self.sections.iter().map(BlockSection::memory_usage).sum();
        let states = self.states.capacity() * (std::mem::size_of::<u32>() + std::mem::size_of::<Option<BlockState>>());
        std::mem::size_of::<Self>() + sections + COLUMN_AREA * 2 + states
    }

    fn check_y(&self, y: i32) -> WorldResult<()> {
        if self.bounds.contains_y(y) {
            Ok(())
        } else {
            Err(WorldError::OutOfBounds {
                y,
                min_y: self.bounds.min_y,
                max_y: self.bounds.max_y,
            })
        }
    }
}

#[inline]
fn lx(x: i32) -> u8 {
    local_coord(i64::from(x))
}

#[inline]
fn ly(y: i32) -> u8 {
    local_coord(i64::from(y))
}

#[inline]
fn lz(z: i32) -> u8 {
    local_coord(i64::from(z))
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn to_height(y: i32) -> i16 {
    y as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::PaletteVariant;

    fn chunk() -> WorldChunk {
        WorldChunk::new(0, 0, WorldBounds::new(63).unwrap())
    }

    #[test]
    fn test_new_chunk_is_air() {
        let chunk = chunk();
        assert_eq!(chunk.sections().len(), 2);
        assert_eq!(chunk.get_block(5, 40, 5), AIR);
        assert_eq!(chunk.get_height(5, 5), EMPTY_COLUMN);
        assert_eq!(chunk.non_air_count(), 0);
        assert!(chunk.flags().is_empty());
        assert_eq!(chunk.key(), chunk_key(0, 0));
    }

    #[test]
    fn test_out_of_bounds_reads_air_and_rejects_writes() {
        let mut chunk = chunk();
        assert_eq!(chunk.get_block(0, -1, 0), AIR);
        assert_eq!(chunk.get_block(0, 64, 0), AIR);

        let err = chunk.set_block(0, -1, 0, 1, SetBlockOptions::empty()).unwrap_err();
        assert!(matches!(err, WorldError::OutOfBounds { y: -1, min_y: 0, max_y: 63 }));
        assert!(chunk.set_block(0, 64, 0, 1, SetBlockOptions::empty()).is_err());
        assert!(!chunk.is(ChunkFlags::DIRTY));
        assert_eq!(chunk.non_air_count(), 0);
    }

    #[test]
    fn test_set_block_returns_previous_and_dirties() {
        let mut chunk = chunk();
        assert_eq!(chunk.set_block(3, 33, 4, 7, SetBlockOptions::empty()).unwrap(), AIR);
        assert!(chunk.is(ChunkFlags::DIRTY));
        assert_eq!(chunk.get_block(3, 33, 4), 7);
        assert_eq!(chunk.section(1).get(3, 1, 4), 7);

        chunk.set_flag(ChunkFlags::DIRTY, false);
        assert_eq!(chunk.set_block(3, 33, 4, 7, SetBlockOptions::empty()).unwrap(), 7);
        assert!(!chunk.is(ChunkFlags::DIRTY));
        chunk.set_block(3, 33, 4, 7, SetBlockOptions::FORCE_DIRTY).unwrap();
        assert!(chunk.is(ChunkFlags::DIRTY));
    }

    #[test]
    fn test_negative_chunk_uses_local_coords() {
        let mut chunk = WorldChunk::new(-1, -1, WorldBounds::new(31).unwrap());
        chunk.set_block(-1, 0, -32, 9, SetBlockOptions::empty()).unwrap();
        assert_eq!(chunk.section(0).get(31, 0, 0), 9);
        assert_eq!(chunk.get_block(-1, 0, -32), 9);
        assert!(chunk.owns_column(-32, -1));
        assert!(!chunk.owns_column(0, -1));
    }

    #[test]
    fn test_height_map_tracks_writes() {
        let mut chunk = chunk();
        chunk.set_block(1, 10, 1, 5, SetBlockOptions::empty()).unwrap();
        chunk.set_block(1, 50, 1, 5, SetBlockOptions::empty()).unwrap();
        assert_eq!(chunk.get_height(1, 1), 50);

        chunk.set_block(1, 50, 1, AIR, SetBlockOptions::empty()).unwrap();
        assert_eq!(chunk.get_height(1, 1), 10);
        chunk.set_block(1, 10, 1, AIR, SetBlockOptions::empty()).unwrap();
        assert_eq!(chunk.get_height(1, 1), EMPTY_COLUMN);
    }

    #[test]
    fn test_skip_height_recompute() {
        let mut chunk = chunk();
        chunk.set_block(2, 20, 2, 5, SetBlockOptions::SKIP_HEIGHT_RECOMPUTE).unwrap();
        assert_eq!(chunk.get_height(2, 2), EMPTY_COLUMN);
        chunk.recompute_height_map();
        assert_eq!(chunk.get_height(2, 2), 20);
    }

    #[test]
    fn test_state_overlay_distinguishes_cleared() {
        let mut chunk = chunk();
        assert_eq!(chunk.state_entry(1, 2, 3), StateEntry::Absent);

        let state = BlockState::new().with("facing", "east");
        chunk.set_state(1, 2, 3, state.clone()).unwrap();
        assert_eq!(chunk.get_state(1, 2, 3), Some(&state));
        assert_eq!(chunk.state_count(), 1);

        assert_eq!(chunk.clear_state(1, 2, 3), Some(state));
        assert_eq!(chunk.state_entry(1, 2, 3), StateEntry::Cleared);
        assert_eq!(chunk.get_state(1, 2, 3), None);

        assert_eq!(chunk.prune_cleared_states(), 1);
        assert_eq!(chunk.state_entry(1, 2, 3), StateEntry::Absent);
        assert!(chunk.set_state(1, 64, 3, BlockState::new()).is_err());
    }

    #[test]
    fn test_changing_block_clears_stale_state() {
        let mut chunk = chunk();
        chunk.set_block(4, 4, 4, 2, SetBlockOptions::empty()).unwrap();
        chunk.set_state(4, 4, 4, BlockState::new().with("age", 1i64)).unwrap();

        chunk.set_block(4, 4, 4, 3, SetBlockOptions::SKIP_STATE_UPDATE).unwrap();
        assert!(chunk.get_state(4, 4, 4).is_some());

        chunk.set_block(4, 4, 4, 3, SetBlockOptions::empty()).unwrap();
        assert!(chunk.get_state(4, 4, 4).is_some(), "unchanged id keeps state");

        chunk.set_block(4, 4, 4, 5, SetBlockOptions::empty()).unwrap();
        assert_eq!(chunk.state_entry(4, 4, 4), StateEntry::Cleared);
    }

    #[test]
    fn test_ticking_through_chunk() {
        let mut chunk = chunk();
        assert!(!chunk.set_ticking(0, 0, 0, true));
        chunk.set_block(0, 0, 0, 1, SetBlockOptions::empty()).unwrap();
        chunk.set_flag(ChunkFlags::DIRTY, false);
        assert!(chunk.set_ticking(0, 0, 0, true));
        assert!(chunk.is_ticking(0, 0, 0));
        assert!(chunk.is(ChunkFlags::DIRTY));

        // Re-marking an already ticking block is not a change.
        chunk.set_flag(ChunkFlags::DIRTY, false);
        assert!(chunk.set_ticking(0, 0, 0, true));
        assert!(!chunk.is(ChunkFlags::DIRTY));
        assert!(!chunk.set_ticking(0, 99, 0, true));
        assert_eq!(chunk.ticking_count(), 1);
        chunk.set_block(0, 0, 0, AIR, SetBlockOptions::empty()).unwrap();
        assert_eq!(chunk.ticking_count(), 0);
    }

    #[test]
    fn test_demotion_policy() {
        let mut chunk = chunk();
        assert_eq!(chunk.demotion(), DemotionPolicy::Eager);
        chunk.set_block(0, 0, 0, 1, SetBlockOptions::empty()).unwrap();
        chunk.set_block(0, 0, 0, AIR, SetBlockOptions::empty()).unwrap();
        assert!(chunk.section(0).is_uniform_air());

        chunk.set_demotion(DemotionPolicy::Manual);
        chunk.set_block(0, 0, 0, 1, SetBlockOptions::empty()).unwrap();
        chunk.set_block(0, 0, 0, AIR, SetBlockOptions::empty()).unwrap();
        assert_eq!(chunk.section(0).variant(), PaletteVariant::HalfByte);
        assert_eq!(chunk.compact(), 1);
        assert!(chunk.section(0).is_uniform_air());
    }

    #[test]
    fn test_from_sections_builds_height_map() {
        let bounds = WorldBounds::new(63).unwrap();
        let chunk = WorldChunk::from_sections(2, -3, bounds, vec![BlockSection::filled(1), BlockSection::new()]);
        assert_eq!(chunk.get_height(0, 0), 31);
        assert_eq!(chunk.get_height(31, 31), 31);
        assert_eq!((chunk.cx(), chunk.cz()), (2, -3));
    }

    #[test]
    fn test_memory_usage_grows() {
        let mut chunk = chunk();
        let empty = chunk.memory_usage();
        chunk.set_block(0, 0, 0, 1, SetBlockOptions::empty()).unwrap();
        assert!(chunk.memory_usage() > empty);
    }
}
