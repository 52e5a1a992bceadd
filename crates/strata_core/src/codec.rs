//! # Section Codec
//!
//! Binary form of a section for persistence and network snapshots.
//!
//! ## Layout (little-endian)
//!
//! ```text
//! u8   variant tag (0 Empty, 1 HalfByte, 2 Byte, 3 Short)
//! ── Empty ──────────────────────────────
//! u32  uniform id
//! ── HalfByte / Byte / Short ────────────
//! u32  slot table length N
//! u32  × N   block ids
//! ...  packed slots (16 KiB nibbles, 32 KiB bytes, 64 KiB shorts)
//! ── always ─────────────────────────────
//! u8   tick flag; if 1: u64 × 512 tick words
//! ```
//!
//! Per-slot counts are not stored; they are recomputed from the packed slots on
//! decode.

use bitvec::prelude::*;

use crate::coords::SECTION_VOLUME;
use crate::error::{CodecError, CodecResult};
use crate::palette::{Palette, PaletteVariant};
use crate::section::{BlockSection, TickBits};
use crate::AIR;

/// u64 words in a tick bitset.
const TICK_WORDS: usize = SECTION_VOLUME / 64;

/// Encodes a section.
#[must_use]
pub fn encode_section(section: &BlockSection) -> Vec<u8> {
    let palette = section.palette();
    let variant = palette.variant();
    let mut buf = Vec::with_capacity(encoded_capacity(variant));
    buf.push(variant as u8);

    match palette {
        Palette::Empty { id } => buf.extend_from_slice(&id.to_le_bytes()),
        _ => {
            let table = palette.raw_table();
            #[allow(clippy::cast_possible_truncation)]
            buf.extend_from_slice(&(table.len() as u32).to_le_bytes());
            for id in table {
                buf.extend_from_slice(&id.to_le_bytes());
            }
            write_slots(&mut buf, variant, palette.raw_slots());
        }
    }

    match section.tick_bits() {
        Some(bits) => {
            buf.push(1);
            let words: Vec<u64> = bits.as_raw_slice().iter().map(|w| w.to_le()).collect();
            buf.extend_from_slice(bytemuck::cast_slice(&words));
        }
        None => buf.push(0),
    }
    buf
}

/// Decodes a section.
///
/// # Errors
///
/// Returns an error if the bytes are truncated, carry an unknown variant,
/// reference slots outside the table, or tick an air block.
pub fn decode_section(bytes: &[u8]) -> CodecResult<BlockSection> {
    let mut reader = Reader::new(bytes);
    let tag = reader.u8()?;
    let variant = PaletteVariant::from_u8(tag).ok_or(CodecError::UnknownVariant(tag))?;

    let palette = if variant == PaletteVariant::Empty {
        Palette::filled(reader.u32()?)
    } else {
        let len = reader.u32()? as usize;
        if len == 0 || len > variant.capacity() {
            return Err(CodecError::InvalidTable { variant: tag, len });
        }
        let ids = (0..len).map(|_| reader.u32()).collect::<CodecResult<Vec<u32>>>()?;
        let slots = read_slots(&mut reader, variant)?;
        Palette::from_raw(variant, ids, &slots)?
    };

    let ticks = if reader.u8()? == 1 {
        let raw = reader.take(TICK_WORDS * 8)?;
        let mut words = [0u64; TICK_WORDS];
        for (word, le) in words.iter_mut().zip(bytemuck::pod_collect_to_vec::<u8, u64>(raw)) {
            *word = u64::from_le(le);
        }
        let bits: TickBits = BitArray::new(words);
        if let Some(idx) = bits.iter_ones().find(|&i| {
            #[allow(clippy::cast_possible_truncation)]
            let flat = i as u16;
            palette.get(flat) == AIR
        }) {
            #[allow(clippy::cast_possible_truncation)]
            return Err(CodecError::TickOnAir(idx as u16));
        }
        Some(Box::new(bits))
    } else {
        None
    };

    Ok(BlockSection::from_parts(palette, ticks))
}

const fn encoded_capacity(variant: PaletteVariant) -> usize {
    let data = match variant {
        PaletteVariant::Empty => 4,
        PaletteVariant::HalfByte => SECTION_VOLUME / 2 + 4 + 16 * 4,
        PaletteVariant::Byte => SECTION_VOLUME + 4 + 256 * 4,
        PaletteVariant::Short => SECTION_VOLUME * 2 + 4 + 1024 * 4,
    };
    1 + data + 1
}

#[allow(clippy::cast_possible_truncation)]
fn write_slots(buf: &mut Vec<u8>, variant: PaletteVariant, slots: impl Iterator<Item = u16>) {
    match variant {
        PaletteVariant::Empty => {}
        PaletteVariant::HalfByte => {
            let slots: Vec<u16> = slots.collect();
            buf.extend(slots.chunks_exact(2).map(|pair| (pair[0] as u8 & 0x0F) | ((pair[1] as u8 & 0x0F) << 4)));
        }
        PaletteVariant::Byte => buf.extend(slots.map(|s| s as u8)),
        PaletteVariant::Short => {
            let shorts: Vec<u16> = slots.map(u16::to_le).collect();
            buf.extend_from_slice(bytemuck::cast_slice(&shorts));
        }
    }
}

fn read_slots(reader: &mut Reader<'_>, variant: PaletteVariant) -> CodecResult<Vec<u16>> {
    Ok(match variant {
        PaletteVariant::Empty => Vec::new(),
        PaletteVariant::HalfByte => reader
            .take(SECTION_VOLUME / 2)?
            .iter()
            .flat_map(|&b| [u16::from(b & 0x0F), u16::from(b >> 4)])
            .collect(),
        PaletteVariant::Byte => reader.take(SECTION_VOLUME)?.iter().map(|&b| u16::from(b)).collect(),
        PaletteVariant::Short => bytemuck::pod_collect_to_vec::<u8, u16>(reader.take(SECTION_VOLUME * 2)?)
            .into_iter()
            .map(u16::from_le)
            .collect(),
    })
}

/// Bounds-checked little-endian cursor.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        let available = self.buf.len() - self.pos;
        if n > available {
            return Err(CodecError::Truncated { needed: n, available });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> CodecResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::flat_block_index;

    #[test]
    fn test_uniform_air_is_tiny() {
        let bytes = encode_section(&BlockSection::new());
        assert_eq!(bytes.len(), 6);
        let decoded = decode_section(&bytes).unwrap();
        assert!(decoded.is_uniform_air());
    }

    #[test]
    fn test_sparse_section_survives_with_ticks() {
        let mut section = BlockSection::new();
        section.set(1, 2, 3, 40);
        section.set(31, 31, 31, 41);
        section.set_ticking(flat_block_index(1, 2, 3), true);

        let decoded = decode_section(&encode_section(&section)).unwrap();
        assert_eq!(decoded.variant(), PaletteVariant::HalfByte);
        assert_eq!(decoded.get(1, 2, 3), 40);
        assert_eq!(decoded.get(31, 31, 31), 41);
        assert_eq!(decoded.get(0, 0, 0), AIR);
        assert!(decoded.is_ticking(flat_block_index(1, 2, 3)));
        assert_eq!(decoded.ticking_count(), 1);
        assert_eq!(decoded.palette().count_of(40), 1);
    }

    #[test]
    fn test_short_section_with_free_slots() {
        let mut section = BlockSection::new();
        for i in 0..400u16 {
            section.set_flat(i, u32::from(i) + 1);
        }
        // Free a few slots so the table carries stale entries.
        for i in 0..10u16 {
            section.set_flat(i, AIR);
        }
        let decoded = decode_section(&encode_section(&section)).unwrap();
        assert_eq!(decoded.variant(), PaletteVariant::Short);
        assert_eq!(decoded.palette().distinct_count(), section.palette().distinct_count());
        for i in 0..500u16 {
            assert_eq!(decoded.get_flat(i), section.get_flat(i));
        }
        assert!(!decoded.palette().contains(5));
    }

    #[test]
    fn test_rejects_truncated_and_unknown() {
        assert!(matches!(decode_section(&[]), Err(CodecError::Truncated { .. })));
        assert_eq!(decode_section(&[9, 0, 0, 0, 0, 0]).unwrap_err(), CodecError::UnknownVariant(9));

        let mut section = BlockSection::new();
        section.set_flat(0, 1);
        let bytes = encode_section(&section);
        assert!(matches!(
            decode_section(&bytes[..bytes.len() / 2]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_rejects_slot_past_table() {
        let mut section = BlockSection::new();
        section.set_flat(0, 1);
        let mut bytes = encode_section(&section);
        // tag(1) + len(4) + 2 ids(8) -> first data byte; point slot 0 at 0xF.
        bytes[13] = 0x0F;
        assert!(matches!(decode_section(&bytes), Err(CodecError::SlotOutOfRange { .. })));
    }
}
