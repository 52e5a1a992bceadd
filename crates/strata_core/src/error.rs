//! # Codec Error Types
//!
//! Errors raised while decoding a persisted section. Runtime block access has
//! no recoverable failure modes; index violations panic.

use thiserror::Error;

/// Errors that can occur decoding section bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a field could be read.
    #[error("truncated section data: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes remaining.
        available: usize,
    },

    /// Unknown palette variant tag.
    #[error("unknown palette variant tag: {0}")]
    UnknownVariant(u8),

    /// Slot table is empty or larger than the variant can address.
    #[error("invalid slot table for variant {variant}: {len} entries")]
    InvalidTable {
        /// Variant tag.
        variant: u8,
        /// Table length.
        len: usize,
    },

    /// A block references a slot past the end of the table.
    #[error("slot {slot} out of range for table of {table_len}")]
    SlotOutOfRange {
        /// Offending slot.
        slot: u16,
        /// Table length.
        table_len: usize,
    },

    /// The same block id is live in two slots.
    #[error("block id {0} occupies more than one slot")]
    DuplicateId(u32),

    /// A tick bit is set on an air block.
    #[error("tick bit set on air at flat index {0}")]
    TickOnAir(u16),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
