//! # Coordinate Math
//!
//! Pure conversions between the four coordinate spaces:
//!
//! ```text
//! world (x, y, z: i32)
//!   ├── chunk   (cx, cz)      = (x >> 5, z >> 5)
//!   ├── section  sy           =  y >> 5
//!   └── local   (lx, ly, lz)  = (x & 31, y & 31, z & 31)
//!
//! flat section index = ly << 10 | lz << 5 | lx     (0..32768)
//! flat column index  =            lz << 5 | lx     (0..1024)
//! chunk key          = (cx as i64) << 32 | (cz as u32 as i64)
//! ```
//!
//! Every function is total: arithmetic shifts and masks are used instead of
//! division and remainder so negative coordinates floor correctly, and no input
//! can panic.

/// log2 of the section edge length.
pub const BITS: u32 = 5;

/// Section edge length in blocks.
pub const SECTION_SIZE: usize = 1 << BITS;

/// Mask extracting a local coordinate from a world coordinate.
pub const MASK: i32 = (1 << BITS) - 1;

/// Blocks per section (32^3).
pub const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;

/// Columns per chunk (32^2).
pub const COLUMN_AREA: usize = SECTION_SIZE * SECTION_SIZE;

const LOCAL_MASK: u8 = MASK as u8;

/// Converts a world block coordinate to its chunk coordinate.
#[inline]
#[must_use]
pub const fn chunk_coord(block: i32) -> i32 {
    block >> BITS
}

/// Converts a fractional world position (e.g. an entity) to its chunk coordinate.
///
/// NaN maps to chunk 0, infinities saturate.
#[inline]
#[must_use]
pub fn chunk_coord_f(block: f64) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let floored = block.floor() as i32;
    floored >> BITS
}

/// Extracts the local (0..32) coordinate of a world coordinate.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn local_coord(block: i64) -> u8 {
    (block & MASK as i64) as u8
}

/// Returns the vertical section slot containing world `y`.
#[inline]
#[must_use]
pub const fn section_index(y: i32) -> i32 {
    y >> BITS
}

/// Rebuilds a world coordinate from a chunk (or section) coordinate and a local offset.
#[inline]
#[must_use]
pub const fn world_from_local(chunk: i32, local: u8) -> i32 {
    (chunk << BITS) | (local & LOCAL_MASK) as i32
}

/// Packs local coordinates into a flat section index.
///
/// Layout is Y-major so a horizontal slice of a section is contiguous.
#[inline]
#[must_use]
pub const fn flat_block_index(lx: u8, ly: u8, lz: u8) -> u16 {
    ((ly & LOCAL_MASK) as u16) << 10 | ((lz & LOCAL_MASK) as u16) << 5 | (lx & LOCAL_MASK) as u16
}

/// Unpacks a flat section index into `(lx, ly, lz)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn xyz_from_flat_index(idx: u16) -> (u8, u8, u8) {
    let lx = (idx & 31) as u8;
    let lz = ((idx >> 5) & 31) as u8;
    let ly = ((idx >> 10) & 31) as u8;
    (lx, ly, lz)
}

/// Packs local X/Z into a flat column index (height map slot).
#[inline]
#[must_use]
pub const fn flat_column_index(lx: u8, lz: u8) -> u16 {
    ((lz & LOCAL_MASK) as u16) << 5 | (lx & LOCAL_MASK) as u16
}

/// Packs a chunk coordinate pair into a 64-bit key.
#[inline]
#[must_use]
pub const fn chunk_key(cx: i32, cz: i32) -> i64 {
    ((cx as i64) << 32) | (cz as u32 as i64)
}

/// Unpacks a chunk key into `(cx, cz)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn unpack_chunk_key(key: i64) -> (i32, i32) {
    ((key >> 32) as i32, key as i32)
}

/// Chunk key owning the world column `(x, z)`.
#[inline]
#[must_use]
pub const fn chunk_key_for_block(x: i32, z: i32) -> i64 {
    chunk_key(chunk_coord(x), chunk_coord(z))
}

/// True if a local X or Z sits on the chunk edge.
#[inline]
#[must_use]
pub const fn is_border(local: u8) -> bool {
    local == 0 || local == LOCAL_MASK
}

/// True if both world columns belong to the same chunk.
#[inline]
#[must_use]
pub const fn same_chunk(x0: i32, z0: i32, x1: i32, z1: i32) -> bool {
    chunk_coord(x0) == chunk_coord(x1) && chunk_coord(z0) == chunk_coord(z1)
}
