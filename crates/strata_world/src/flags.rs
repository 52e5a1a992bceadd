//! Chunk state flags and block-write options.
//!
//! Both are plain bitsets: every flag is independent and any combination is valid.

use bitflags::bitflags;

bitflags! {
    /// Per-chunk state flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChunkFlags: u8 {
        /// Resident in a chunk index.
        const LOADED = 1 << 0;
        /// Terrain has been generated.
        const GENERATED = 1 << 1;
        /// Decoration pass has run.
        const POPULATED = 1 << 2;
        /// Participates in world ticks.
        const TICKING = 1 << 3;
        /// Modified since the last save.
        const DIRTY = 1 << 4;
        /// A save is in progress.
        const SAVING = 1 << 5;
    }
}

bitflags! {
    /// Options gating the side effects of a block write.
    ///
    /// The storage engine applies the raw write itself; most bits only decide
    /// whether a request is forwarded to listeners.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SetBlockOptions: u16 {
        /// Do not create extra state for the new block.
        const SKIP_STATE_INIT = 1 << 0;
        /// Leave any existing extra state untouched.
        const SKIP_STATE_UPDATE = 1 << 1;
        /// Do not notify listeners.
        const SUPPRESS_NOTIFICATION = 1 << 2;
        /// Leave filler cells of the replaced block in place.
        const SKIP_FILLER_CLEANUP = 1 << 3;
        /// Do not place filler cells for the new block.
        const SKIP_FILLER_PLACEMENT = 1 << 4;
        /// Notify as a physics break rather than a normal change.
        const PHYSICS_BREAK = 1 << 5;
        /// Mark the chunk dirty even if the id is unchanged.
        const FORCE_DIRTY = 1 << 6;
        /// Propagate a block update to the 3x3x3 neighborhood.
        const REQUEST_NEIGHBOR_UPDATE = 1 << 7;
        /// Do not update the column height map.
        const SKIP_HEIGHT_RECOMPUTE = 1 << 8;
        /// Load or generate the owning chunk if it is not resident.
        const ALLOW_PARTIAL_LOAD = 1 << 9;
    }
}
