//! # STRATA Core
//!
//! Leaf storage structures for a chunked voxel world:
//! - Bit-exact coordinate conversions between world, chunk, section and local space
//! - A variable-width palette per section that promotes and demotes its encoding
//! - 32x32x32 block sections with a tick-activity bitset
//!
//! ## Memory Density
//!
//! | Variant  | Bits/block | Distinct ids | Bytes/section |
//! |----------|------------|--------------|---------------|
//! | Empty    | 0          | 1            | 0             |
//! | HalfByte | 4          | 16           | 16,384        |
//! | Byte     | 8          | 256          | 32,768        |
//! | Short    | 16         | 65,536       | 65,536        |
//!
//! Uniform sections (all air, all stone) cost nothing beyond the section header.
//!
//! ## Example
//!
//! ```rust
//! use strata_core::{coords, BlockSection};
//!
//! let mut section = BlockSection::new();
//! let idx = coords::flat_block_index(3, 4, 5);
//! section.set_flat(idx, 7);
//! assert_eq!(section.get(3, 4, 5), 7);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod coords;
pub mod error;
pub mod palette;
pub mod section;

pub use codec::{decode_section, encode_section};
pub use error::{CodecError, CodecResult};
pub use palette::{Palette, PaletteVariant, PromotionOccurred};
pub use section::BlockSection;

/// Block id reserved for air (empty space).
pub const AIR: u32 = 0;
