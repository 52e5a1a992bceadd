//! # Block Section
//!
//! A 32x32x32 cube of blocks: one palette plus a tick-activity bitset.
//!
//! ## Tick Invariant
//!
//! Every set tick bit references a non-air block. Writing air clears the bit,
//! and marking an air cell as ticking is refused.
//!
//! The bitset is allocated on first use (4 KiB) so the vast majority of
//! sections, which never tick, pay nothing for it.

use bitvec::prelude::*;

use crate::coords::{flat_block_index, SECTION_VOLUME};
use crate::palette::{Palette, PaletteVariant};
use crate::AIR;

/// One bit per block in a section.
pub type TickBits = BitArr!(for SECTION_VOLUME, in u64, Lsb0);

/// A 32x32x32 cube of blocks.
#[derive(Clone, Debug, Default)]
pub struct BlockSection {
    /// Block ids.
    palette: Palette,
    /// Blocks that need scheduled processing. `None` until first tick is set.
    ticking: Option<Box<TickBits>>,
    /// Number of set tick bits.
    ticking_count: u32,
    /// Re-encode narrower as soon as an id disappears.
    auto_demote: bool,
}

impl BlockSection {
    /// Creates an all-air section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a section filled with `id`.
    #[must_use]
    pub fn filled(id: u32) -> Self {
        Self {
            palette: Palette::filled(id),
            ..Self::default()
        }
    }

    /// Enables or disables demotion on every write that removes an id.
    pub fn set_auto_demote(&mut self, enabled: bool) {
        self.auto_demote = enabled;
    }

    /// Returns true if writes demote eagerly.
    #[inline]
    #[must_use]
    pub const fn auto_demote(&self) -> bool {
        self.auto_demote
    }

    /// Read access to the palette.
    #[inline]
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Gets a block at local coordinates.
    #[inline]
    #[must_use]
    pub fn get(&self, lx: u8, ly: u8, lz: u8) -> u32 {
        self.palette.get(flat_block_index(lx, ly, lz))
    }

    /// Gets a block at a flat index.
    ///
    /// # Panics
    /// Panics if `idx >= 32768`.
    #[inline]
    #[must_use]
    pub fn get_flat(&self, idx: u16) -> u32 {
        self.palette.get(idx)
    }

    /// Sets a block at local coordinates, returning the previous id.
    #[inline]
    pub fn set(&mut self, lx: u8, ly: u8, lz: u8, id: u32) -> u32 {
        self.set_flat(flat_block_index(lx, ly, lz), id)
    }

    /// Sets a block at a flat index, returning the previous id.
    ///
    /// Writing air clears the tick bit at `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= 32768`.
    pub fn set_flat(&mut self, idx: u16, id: u32) -> u32 {
        let (old, _) = self.palette.replace(idx, id);
        if id == AIR {
            self.set_tick_bit(idx, false);
        }
        if self.auto_demote && old != id && !self.palette.contains(old) {
            self.palette.maybe_demote();
        }
        old
    }

    /// Resets every block to `id` and clears all tick bits.
    pub fn fill(&mut self, id: u32) {
        self.palette.fill(id);
        self.clear_ticking();
    }

    /// True if the section is the uniform-air encoding.
    #[inline]
    #[must_use]
    pub const fn is_uniform_air(&self) -> bool {
        matches!(self.palette, Palette::Empty { id: AIR })
    }

    /// Number of non-air blocks.
    #[inline]
    #[must_use]
    pub fn count_non_air(&self) -> u32 {
        self.palette.count_non_zero()
    }

    /// Active palette variant.
    #[inline]
    #[must_use]
    pub const fn variant(&self) -> PaletteVariant {
        self.palette.variant()
    }

    /// Demotes the palette if the live id count allows. Returns true on change.
    pub fn compact(&mut self) -> bool {
        self.palette.maybe_demote()
    }

    /// Marks or unmarks a block as ticking.
    ///
    /// Returns false (and changes nothing) when asked to tick an air block.
    ///
    /// # Panics
    /// Panics if `idx >= 32768`.
    pub fn set_ticking(&mut self, idx: u16, active: bool) -> bool {
        if active && self.palette.get(idx) == AIR {
            return false;
        }
        self.set_tick_bit(idx, active);
        true
    }

    /// True if the block at `idx` is marked as ticking.
    #[inline]
    #[must_use]
    pub fn is_ticking(&self, idx: u16) -> bool {
        self.ticking
            .as_ref()
            .is_some_and(|bits| bits[usize::from(idx)])
    }

    /// Number of ticking blocks.
    #[inline]
    #[must_use]
    pub const fn ticking_count(&self) -> u32 {
        self.ticking_count
    }

    /// Snapshot of the ticking flat indices, ascending.
    ///
    /// The snapshot is detached from the section, so the caller may mutate
    /// the section while draining it.
    #[must_use]
    pub fn ticking_indices(&self) -> std::vec::IntoIter<u16> {
        let snapshot: Vec<u16> = match &self.ticking {
            Some(bits) => bits
                .iter_ones()
                .map(|i| {
                    #[allow(clippy::cast_possible_truncation)]
                    let idx = i as u16;
                    idx
                })
                .collect(),
            None => Vec::new(),
        };
        snapshot.into_iter()
    }

    /// Clears every tick bit and releases the bitset.
    pub fn clear_ticking(&mut self) {
        self.ticking = None;
        self.ticking_count = 0;
    }

    /// Bytes held by block storage and the tick bitset.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.palette.memory_usage() + self.ticking.as_ref().map_or(0, |_| std::mem::size_of::<TickBits>())
    }

    /// Assembles a section from decoded parts.
    pub(crate) fn from_parts(palette: Palette, ticks: Option<Box<TickBits>>) -> Self {
        let ticking_count = ticks.as_ref().map_or(0, |bits| {
            #[allow(clippy::cast_possible_truncation)]
            let count = bits.count_ones() as u32;
            count
        });
        Self {
            palette,
            ticking: ticks.filter(|_| ticking_count > 0),
            ticking_count,
            auto_demote: false,
        }
    }

    /// Raw tick bitset for serialization.
    pub(crate) fn tick_bits(&self) -> Option<&TickBits> {
        self.ticking.as_deref()
    }

    fn set_tick_bit(&mut self, idx: u16, active: bool) {
        let i = usize::from(idx);
        assert!(i < SECTION_VOLUME, "flat index {i} outside section (0..{SECTION_VOLUME})");
        if !active && self.ticking.is_none() {
            return;
        }
        let bits = self.ticking.get_or_insert_with(|| Box::new(TickBits::ZERO));
        let was = bits.replace(i, active);
        match (was, active) {
            (false, true) => self.ticking_count += 1,
            (true, false) => self.ticking_count -= 1,
            _ => {}
        }
        if self.ticking_count == 0 {
            self.ticking = None;
        }
    }
}
