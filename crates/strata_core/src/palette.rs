//! # Paletted Block Storage
//!
//! One palette per section, encoding 32,768 block ids at the narrowest width
//! that can address the ids currently present.
//!
//! ## Encoding
//!
//! Non-empty variants store a per-cell **slot** into a section-local table of
//! block ids, so the width depends on how many distinct ids are present, never on
//! their numeric value. A section of 16 distinct ids costs 4 bits per block even
//! if the ids are in the millions.
//!
//! ```text
//! Empty    ── uniform id, no storage
//! HalfByte ── 2 slots per byte      (16 slots)
//! Byte     ── 1 slot per byte       (256 slots)
//! Short    ── 1 slot per u16        (65,536 slots)
//! ```
//!
//! ## Promotion / Demotion
//!
//! A write that needs a new slot when the table is full widens the storage to the
//! next variant (slots keep their numbers, only the packing changes). Slots whose
//! count drops to zero are recycled before a promotion is considered.
//!
//! Demotion is an explicit re-encode (`maybe_demote`) with hysteresis: the table
//! must shrink to 1 / 14 / 251 live ids before dropping to Empty / HalfByte / Byte,
//! so a section oscillating around a boundary does not thrash.

use std::collections::{BTreeSet, HashMap};

use crate::coords::SECTION_VOLUME;
use crate::error::{CodecError, CodecResult};

/// Bytes needed for a nibble-packed section.
const NIBBLE_BYTES: usize = SECTION_VOLUME / 2;

/// Storage variant of a palette, narrowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PaletteVariant {
    /// Single uniform id, no per-block storage.
    Empty = 0,
    /// 4 bits per block.
    HalfByte = 1,
    /// 8 bits per block.
    Byte = 2,
    /// 16 bits per block.
    Short = 3,
}

impl PaletteVariant {
    /// Bits stored per block.
    #[inline]
    #[must_use]
    pub const fn bits_per_block(self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::HalfByte => 4,
            Self::Byte => 8,
            Self::Short => 16,
        }
    }

    /// Maximum number of distinct ids representable.
    #[inline]
    #[must_use]
    pub const fn capacity(self) -> usize {
        match self {
            Self::Empty => 1,
            Self::HalfByte => 16,
            Self::Byte => 256,
            Self::Short => 65_536,
        }
    }

    /// Distinct-id count at or below which a wider palette demotes into this one.
    #[inline]
    #[must_use]
    pub const fn demote_threshold(self) -> usize {
        match self {
            Self::Empty => 1,
            Self::HalfByte => 14,
            Self::Byte => 251,
            Self::Short => 65_536,
        }
    }

    /// Next wider variant, if any.
    #[inline]
    #[must_use]
    pub const fn wider(self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::HalfByte),
            Self::HalfByte => Some(Self::Byte),
            Self::Byte => Some(Self::Short),
            Self::Short => None,
        }
    }

    /// Next narrower variant, if any.
    #[inline]
    #[must_use]
    pub const fn narrower(self) -> Option<Self> {
        match self {
            Self::Empty => None,
            Self::HalfByte => Some(Self::Empty),
            Self::Byte => Some(Self::HalfByte),
            Self::Short => Some(Self::Byte),
        }
    }

    /// Narrowest variant admitting `distinct` ids under the demotion thresholds.
    #[must_use]
    pub const fn narrowest_for(distinct: usize) -> Self {
        if distinct <= Self::Empty.demote_threshold() {
            Self::Empty
        } else if distinct <= Self::HalfByte.demote_threshold() {
            Self::HalfByte
        } else if distinct <= Self::Byte.demote_threshold() {
            Self::Byte
        } else {
            Self::Short
        }
    }

    /// Decodes a variant tag.
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Empty),
            1 => Some(Self::HalfByte),
            2 => Some(Self::Byte),
            3 => Some(Self::Short),
            _ => None,
        }
    }
}

/// Result of a palette write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromotionOccurred {
    /// The write fit the existing encoding.
    No,
    /// Storage was widened before the write.
    Promoted {
        /// Variant before the write.
        from: PaletteVariant,
        /// Variant after the write.
        to: PaletteVariant,
    },
}

impl PromotionOccurred {
    /// True if the storage was widened.
    #[inline]
    #[must_use]
    pub const fn occurred(self) -> bool {
        matches!(self, Self::Promoted { .. })
    }
}

/// Section-local id table: slot -> id, with per-slot occurrence counts.
#[derive(Clone, Debug, Default)]
pub struct SlotTable {
    /// Block id per slot. Free slots keep a stale id.
    ids: Vec<u32>,
    /// Occurrences per slot. Zero means the slot is free.
    counts: Vec<u32>,
    /// Live id -> slot.
    lookup: HashMap<u32, u16>,
    /// Recyclable slots.
    free: Vec<u16>,
}

impl SlotTable {
    fn uniform(id: u32) -> Self {
        Self {
            ids: vec![id],
            counts: vec![SECTION_VOLUME as u32],
            lookup: HashMap::from([(id, 0)]),
            free: Vec::new(),
        }
    }

    /// Number of distinct live ids.
    #[inline]
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.lookup.len()
    }

    /// Number of allocated slots (live and free).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no slot has been allocated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    fn id(&self, slot: u16) -> u32 {
        self.ids[usize::from(slot)]
    }

    fn release(&mut self, slot: u16) {
        let s = usize::from(slot);
        self.counts[s] -= 1;
        if self.counts[s] == 0 {
            self.lookup.remove(&self.ids[s]);
            self.free.push(slot);
        }
    }

    /// Takes a reference on `id`, allocating a slot if needed.
    /// Returns `None` when the table is full.
    fn acquire(&mut self, id: u32, capacity: usize) -> Option<u16> {
        if let Some(&slot) = self.lookup.get(&id) {
            self.counts[usize::from(slot)] += 1;
            return Some(slot);
        }
        let slot = if let Some(slot) = self.free.pop() {
            self.ids[usize::from(slot)] = id;
            slot
        } else if self.ids.len() < capacity {
            self.ids.push(id);
            self.counts.push(0);
            #[allow(clippy::cast_possible_truncation)]
            let slot = (self.ids.len() - 1) as u16;
            slot
        } else {
            return None;
        };
        self.counts[usize::from(slot)] = 1;
        self.lookup.insert(id, slot);
        Some(slot)
    }

    fn live_slots(&self) -> impl Iterator<Item = (u16, u32, u32)> + '_ {
        self.ids
            .iter()
            .zip(&self.counts)
            .enumerate()
            .filter(|(_, (_, count))| **count > 0)
            .map(|(slot, (&id, &count))| {
                #[allow(clippy::cast_possible_truncation)]
                let slot = slot as u16;
                (slot, id, count)
            })
    }
}

/// Variable-width block id storage for one section.
#[derive(Clone, Debug)]
pub enum Palette {
    /// Every block holds `id`.
    Empty {
        /// The uniform block id.
        id: u32,
    },
    /// Nibble-packed slots, low nibble first.
    HalfByte {
        /// Id table.
        table: SlotTable,
        /// `SECTION_VOLUME / 2` bytes.
        data: Box<[u8]>,
    },
    /// One byte per slot.
    Byte {
        /// Id table.
        table: SlotTable,
        /// `SECTION_VOLUME` bytes.
        data: Box<[u8]>,
    },
    /// One u16 per slot.
    Short {
        /// Id table.
        table: SlotTable,
        /// `SECTION_VOLUME` shorts.
        data: Box<[u16]>,
    },
}

impl Default for Palette {
    fn default() -> Self {
        Self::filled(crate::AIR)
    }
}

#[inline]
fn check_index(flat_index: u16) -> usize {
    let i = usize::from(flat_index);
    assert!(
        i < SECTION_VOLUME,
        "flat index {i} outside section (0..{SECTION_VOLUME})"
    );
    i
}

impl Palette {
    /// Creates a uniform palette holding `id` everywhere.
    #[inline]
    #[must_use]
    pub const fn filled(id: u32) -> Self {
        Self::Empty { id }
    }

    /// Resets every block to `id`, releasing all storage.
    pub fn fill(&mut self, id: u32) {
        *self = Self::filled(id);
    }

    /// Returns the active variant.
    #[inline]
    #[must_use]
    pub const fn variant(&self) -> PaletteVariant {
        match self {
            Self::Empty { .. } => PaletteVariant::Empty,
            Self::HalfByte { .. } => PaletteVariant::HalfByte,
            Self::Byte { .. } => PaletteVariant::Byte,
            Self::Short { .. } => PaletteVariant::Short,
        }
    }

    /// Returns the block id at a flat index.
    ///
    /// # Panics
    /// Panics if `flat_index >= 32768`.
    #[inline]
    #[must_use]
    pub fn get(&self, flat_index: u16) -> u32 {
        let i = check_index(flat_index);
        match self {
            Self::Empty { id } => *id,
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => {
                table.id(self.slot_at(i))
            }
        }
    }

    /// Writes a block id, promoting the storage first if the id needs a slot
    /// the current variant cannot address.
    ///
    /// # Panics
    /// Panics if `flat_index >= 32768`.
    pub fn set(&mut self, flat_index: u16, id: u32) -> PromotionOccurred {
        self.replace(flat_index, id).1
    }

    /// Writes a block id and returns the id it replaced.
    ///
    /// # Panics
    /// Panics if `flat_index >= 32768`.
    pub fn replace(&mut self, flat_index: u16, id: u32) -> (u32, PromotionOccurred) {
        let i = check_index(flat_index);
        let old = self.get(flat_index);
        if old == id {
            return (old, PromotionOccurred::No);
        }

        let from = self.variant();
        if from == PaletteVariant::Empty {
            self.widen();
        }

        let old_slot = self.slot_at(i);
        let capacity = self.variant().capacity();
        let table = self.table_mut();
        table.release(old_slot);
        let slot = match table.acquire(id, capacity) {
            Some(slot) => slot,
            None => {
                self.widen();
                let capacity = self.variant().capacity();
                let table = self.table_mut();
                // Widening always leaves room for at least one more slot.
                match table.acquire(id, capacity) {
                    Some(slot) => slot,
                    None => unreachable!("widened palette has free capacity"),
                }
            }
        };
        self.write_slot(i, slot);

        let to = self.variant();
        if from == to {
            (old, PromotionOccurred::No)
        } else {
            tracing::trace!("palette promoted {:?} -> {:?}", from, to);
            (old, PromotionOccurred::Promoted { from, to })
        }
    }

    /// Set of block ids currently present.
    #[must_use]
    pub fn distinct_ids(&self) -> BTreeSet<u32> {
        match self {
            Self::Empty { id } => BTreeSet::from([*id]),
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => {
                table.lookup.keys().copied().collect()
            }
        }
    }

    /// Number of distinct block ids currently present.
    #[inline]
    #[must_use]
    pub fn distinct_count(&self) -> usize {
        match self {
            Self::Empty { .. } => 1,
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => {
                table.distinct()
            }
        }
    }

    /// True if `id` occurs at least once. O(1).
    #[inline]
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        match self {
            Self::Empty { id: uniform } => *uniform == id,
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => {
                table.lookup.contains_key(&id)
            }
        }
    }

    /// Number of blocks holding `id`. O(1).
    #[inline]
    #[must_use]
    pub fn count_of(&self, id: u32) -> u32 {
        match self {
            Self::Empty { id: uniform } => {
                if *uniform == id {
                    SECTION_VOLUME as u32
                } else {
                    0
                }
            }
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => table
                .lookup
                .get(&id)
                .map_or(0, |&slot| table.counts[usize::from(slot)]),
        }
    }

    /// Number of non-air blocks.
    #[inline]
    #[must_use]
    pub fn count_non_zero(&self) -> u32 {
        SECTION_VOLUME as u32 - self.count_of(crate::AIR)
    }

    /// Re-encodes into the narrowest variant the live id count admits.
    ///
    /// Returns true if the variant changed. Never alters a `get` result.
    pub fn maybe_demote(&mut self) -> bool {
        let from = self.variant();
        let target = PaletteVariant::narrowest_for(self.distinct_count());
        if target >= from {
            return false;
        }
        self.reencode(target);
        tracing::trace!("palette demoted {:?} -> {:?}", from, target);
        true
    }

    /// Bytes held by the block encoding and its id table.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let table_bytes = |t: &SlotTable| {
            t.ids.capacity() * 4 + t.counts.capacity() * 4 + t.lookup.capacity() * 8 + t.free.capacity() * 2
        };
        match self {
            Self::Empty { .. } => 0,
            Self::HalfByte { table, data } | Self::Byte { table, data } => data.len() + table_bytes(table),
            Self::Short { table, data } => data.len() * 2 + table_bytes(table),
        }
    }

    #[inline]
    fn slot_at(&self, i: usize) -> u16 {
        match self {
            Self::Empty { .. } => 0,
            Self::HalfByte { data, .. } => u16::from((data[i >> 1] >> ((i & 1) * 4)) & 0x0F),
            Self::Byte { data, .. } => u16::from(data[i]),
            Self::Short { data, .. } => data[i],
        }
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn write_slot(&mut self, i: usize, slot: u16) {
        match self {
            Self::Empty { .. } => unreachable!("empty palette has no slots"),
            Self::HalfByte { data, .. } => {
                let shift = (i & 1) * 4;
                let byte = &mut data[i >> 1];
                *byte = (*byte & !(0x0F << shift)) | (((slot as u8) & 0x0F) << shift);
            }
            Self::Byte { data, .. } => data[i] = slot as u8,
            Self::Short { data, .. } => data[i] = slot,
        }
    }

    fn table(&self) -> Option<&SlotTable> {
        match self {
            Self::Empty { .. } => None,
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => Some(table),
        }
    }

    fn table_mut(&mut self) -> &mut SlotTable {
        match self {
            Self::Empty { .. } => unreachable!("empty palette has no table"),
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => table,
        }
    }

    /// Widens storage by one variant, keeping slot numbers.
    fn widen(&mut self) {
        let current = std::mem::take(self);
        *self = match current {
            Self::Empty { id } => Self::HalfByte {
                table: SlotTable::uniform(id),
                data: vec![0u8; NIBBLE_BYTES].into_boxed_slice(),
            },
            Self::HalfByte { table, data } => {
                let wide: Vec<u8> = (0..SECTION_VOLUME)
                    .map(|i| (data[i >> 1] >> ((i & 1) * 4)) & 0x0F)
                    .collect();
                Self::Byte {
                    table,
                    data: wide.into_boxed_slice(),
                }
            }
            Self::Byte { table, data } => Self::Short {
                table,
                data: data.iter().map(|&s| u16::from(s)).collect(),
            },
            Self::Short { .. } => panic!("short palette cannot widen: section holds at most 32768 ids"),
        };
    }

    /// Compacts the table and repacks into `target`.
    fn reencode(&mut self, target: PaletteVariant) {
        let Some(table) = self.table() else {
            return;
        };

        if target == PaletteVariant::Empty {
            let uniform = table.live_slots().next().map(|(_, id, _)| id);
            if let Some(id) = uniform {
                *self = Self::Empty { id };
            }
            return;
        }

        let slots: Vec<u16> = self.raw_slots().collect();

        let mut remap = vec![0u16; table.len()];
        let mut compact = SlotTable::default();
        for (new_slot, (old_slot, id, count)) in table.live_slots().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let new_slot = new_slot as u16;
            remap[usize::from(old_slot)] = new_slot;
            compact.ids.push(id);
            compact.counts.push(count);
            compact.lookup.insert(id, new_slot);
        }

        *self = Self::packed(target, compact, slots.iter().map(|&s| remap[usize::from(s)]));
    }

    /// Builds an indexed palette of `variant` from a slot stream.
    #[allow(clippy::cast_possible_truncation)]
    fn packed(variant: PaletteVariant, table: SlotTable, slots: impl Iterator<Item = u16>) -> Self {
        match variant {
            PaletteVariant::Empty => unreachable!("empty palette is not packed"),
            PaletteVariant::HalfByte => {
                let mut data = vec![0u8; NIBBLE_BYTES].into_boxed_slice();
                for (i, slot) in slots.enumerate() {
                    data[i >> 1] |= ((slot as u8) & 0x0F) << ((i & 1) * 4);
                }
                Self::HalfByte { table, data }
            }
            PaletteVariant::Byte => Self::Byte {
                table,
                data: slots.map(|s| s as u8).collect(),
            },
            PaletteVariant::Short => Self::Short {
                table,
                data: slots.collect(),
            },
        }
    }

    /// Slot table ids (including free slots) for serialization.
    pub(crate) fn raw_table(&self) -> &[u32] {
        match self {
            Self::Empty { .. } => &[],
            Self::HalfByte { table, .. } | Self::Byte { table, .. } | Self::Short { table, .. } => &table.ids,
        }
    }

    /// Per-block slot stream for serialization.
    pub(crate) fn raw_slots(&self) -> impl Iterator<Item = u16> + '_ {
        (0..SECTION_VOLUME).map(move |i| self.slot_at(i))
    }

    /// Rebuilds an indexed palette from a slot table and per-block slots,
    /// recomputing counts. Slots no block references become free.
    pub(crate) fn from_raw(variant: PaletteVariant, ids: Vec<u32>, slots: &[u16]) -> CodecResult<Self> {
        if variant == PaletteVariant::Empty || ids.is_empty() || ids.len() > variant.capacity() {
            return Err(CodecError::InvalidTable {
                variant: variant as u8,
                len: ids.len(),
            });
        }
        if slots.len() != SECTION_VOLUME {
            return Err(CodecError::Truncated {
                needed: SECTION_VOLUME,
                available: slots.len(),
            });
        }

        let mut counts = vec![0u32; ids.len()];
        for &slot in slots {
            let s = usize::from(slot);
            if s >= ids.len() {
                return Err(CodecError::SlotOutOfRange {
                    slot,
                    table_len: ids.len(),
                });
            }
            counts[s] += 1;
        }

        let mut table = SlotTable {
            ids,
            counts,
            lookup: HashMap::new(),
            free: Vec::new(),
        };
        for slot in 0..table.ids.len() {
            #[allow(clippy::cast_possible_truncation)]
            let slot16 = slot as u16;
            if table.counts[slot] == 0 {
                table.free.push(slot16);
            } else if table.lookup.insert(table.ids[slot], slot16).is_some() {
                return Err(CodecError::DuplicateId(table.ids[slot]));
            }
        }

        Ok(Self::packed(variant, table, slots.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::flat_block_index;

    fn all_indices() -> impl Iterator<Item = u16> {
        #[allow(clippy::cast_possible_truncation)]
        (0..SECTION_VOLUME).map(|i| i as u16)
    }

    #[test]
    fn test_fresh_palette_is_uniform_air() {
        let palette = Palette::default();
        assert_eq!(palette.variant(), PaletteVariant::Empty);
        assert!(all_indices().all(|i| palette.get(i) == 0));
        assert_eq!(palette.count_non_zero(), 0);
        assert_eq!(palette.count_of(0), SECTION_VOLUME as u32);
        assert_eq!(palette.memory_usage(), 0);
    }

    #[test]
    fn test_writing_uniform_id_is_noop() {
        let mut palette = Palette::filled(9);
        assert_eq!(palette.set(100, 9), PromotionOccurred::No);
        assert_eq!(palette.variant(), PaletteVariant::Empty);
    }

    #[test]
    fn test_empty_promotes_to_half_byte() {
        let mut palette = Palette::default();
        let outcome = palette.set(flat_block_index(1, 2, 3), 5_000_000);
        assert_eq!(
            outcome,
            PromotionOccurred::Promoted {
                from: PaletteVariant::Empty,
                to: PaletteVariant::HalfByte
            }
        );
        assert_eq!(palette.get(flat_block_index(1, 2, 3)), 5_000_000);
        assert_eq!(palette.get(0), 0);
        assert_eq!(palette.count_non_zero(), 1);
    }

    #[test]
    fn test_promotion_driven_by_distinct_count() {
        let mut palette = Palette::default();
        // Air plus ids 1..=15 is 16 distinct: still nibbles.
        for id in 1..16u32 {
            palette.set(id as u16, id);
        }
        assert_eq!(palette.variant(), PaletteVariant::HalfByte);

        // 17th distinct id forces a byte encoding.
        assert!(palette.set(16, 16).occurred());
        assert_eq!(palette.variant(), PaletteVariant::Byte);

        for id in 17..300u32 {
            palette.set(id as u16, id);
        }
        assert_eq!(palette.variant(), PaletteVariant::Short);
        assert_eq!(palette.distinct_count(), 300);

        for id in 1..300u32 {
            assert_eq!(palette.get(id as u16), id);
        }
        assert_eq!(palette.get(300), 0);
    }

    #[test]
    fn test_roundtrip_across_promotions() {
        let mut palette = Palette::default();
        let value = |i: u16| u32::from(i) % 700 * 3;
        for i in all_indices() {
            palette.set(i, value(i));
        }
        assert_eq!(palette.variant(), PaletteVariant::Short);
        assert!(all_indices().all(|i| palette.get(i) == value(i)));
        assert_eq!(palette.count_non_zero(), SECTION_VOLUME as u32 - palette.count_of(0));
    }

    #[test]
    fn test_freed_slot_is_recycled_before_promotion() {
        let mut palette = Palette::default();
        for id in 1..16u32 {
            palette.set(id as u16, id);
        }
        // Replace the only instance of id 7 with a brand new id.
        palette.set(7, 1000);
        assert_eq!(palette.variant(), PaletteVariant::HalfByte);
        assert!(!palette.contains(7));
        assert!(palette.contains(1000));
        assert_eq!(palette.count_of(1000), 1);
    }

    #[test]
    fn test_counts_and_contains() {
        let mut palette = Palette::default();
        for i in 0..100u16 {
            palette.set(i, 4);
        }
        palette.set(5, 0);
        assert_eq!(palette.count_of(4), 99);
        assert_eq!(palette.count_non_zero(), 99);
        assert!(palette.contains(4));
        assert!(!palette.contains(5));
        assert_eq!(palette.distinct_ids(), BTreeSet::from([0, 4]));
    }

    #[test]
    fn test_demote_300_to_10_preserves_reads() {
        let mut palette = Palette::default();
        for i in all_indices() {
            palette.set(i, u32::from(i) % 300 + 1);
        }
        assert_eq!(palette.variant(), PaletteVariant::Short);

        for i in all_indices() {
            palette.set(i, u32::from(i) % 10 + 290);
        }
        let before: Vec<u32> = all_indices().map(|i| palette.get(i)).collect();
        assert_eq!(palette.distinct_count(), 10);

        assert!(palette.maybe_demote());
        assert_eq!(palette.variant(), PaletteVariant::HalfByte);
        let after: Vec<u32> = all_indices().map(|i| palette.get(i)).collect();
        assert_eq!(before, after);
        assert_eq!(palette.count_of(295), palette.count_of(290));
    }

    #[test]
    fn test_demotion_hysteresis() {
        let mut palette = Palette::default();
        for id in 1..20u32 {
            palette.set(id as u16, id);
        }
        assert_eq!(palette.variant(), PaletteVariant::Byte);
        // 15 distinct fits 16 slots but is above the hysteresis threshold.
        for i in 15..20u16 {
            palette.set(i, 0);
        }
        assert_eq!(palette.distinct_count(), 15);
        assert!(!palette.maybe_demote());
        palette.set(14, 0);
        assert!(palette.maybe_demote());
        assert_eq!(palette.variant(), PaletteVariant::HalfByte);
    }

    #[test]
    fn test_demote_to_empty() {
        let mut palette = Palette::default();
        for i in all_indices() {
            palette.set(i, 3);
        }
        assert_eq!(palette.variant(), PaletteVariant::HalfByte);
        assert!(palette.maybe_demote());
        assert_eq!(palette.variant(), PaletteVariant::Empty);
        assert_eq!(palette.get(12_345), 3);
        assert!(!palette.maybe_demote());
    }

    #[test]
    fn test_memory_scales_with_variant() {
        let mut palette = Palette::default();
        palette.set(0, 1);
        let nibbles = palette.memory_usage();
        for id in 2..20u32 {
            palette.set(id as u16, id);
        }
        let bytes = palette.memory_usage();
        for id in 20..300u32 {
            palette.set(id as u16, id);
        }
        let shorts = palette.memory_usage();
        assert!(nibbles < bytes && bytes < shorts);
    }

    #[test]
    #[should_panic(expected = "outside section")]
    fn test_index_out_of_range_is_fatal() {
        let palette = Palette::default();
        let _ = palette.get(32_768);
    }
}
