//! # Chunk Accessor
//!
//! World-coordinate block mutation on top of a [`ChunkIndex`].
//!
//! ## Write Path
//!
//! ```text
//! set_block_at(x, y, z)
//!   ├─ chunk_key_for_block(x, z) -> get_or_load(ALLOW_PARTIAL_LOAD?)
//!   ├─ WorldChunk::set_block            (under the chunk write lock)
//!   ├─ filler cleanup / placement
//!   │    ├─ same_chunk -> reuse the locked chunk
//!   │    └─ otherwise  -> resolved after the lock is released
//!   ├─ listeners                        (unless SUPPRESS_NOTIFICATION)
//!   └─ perform_block_update             (if REQUEST_NEIGHBOR_UPDATE)
//! ```
//!
//! At most one chunk lock is held at a time.

use std::sync::Arc;

use strata_core::coords::{chunk_key_for_block, same_chunk};
use strata_core::AIR;

use crate::chunk::WorldChunk;
use crate::events::{BlockChange, BlockChangeListener};
use crate::filler::FillerRegistry;
use crate::flags::SetBlockOptions;
use crate::index::{ChunkHandle, ChunkIndex};

/// Options carried over from a block write to its filler cells.
const FILLER_INHERITED: SetBlockOptions = SetBlockOptions::SKIP_STATE_INIT
    .union(SetBlockOptions::SKIP_STATE_UPDATE)
    .union(SetBlockOptions::SUPPRESS_NOTIFICATION)
    .union(SetBlockOptions::PHYSICS_BREAK)
    .union(SetBlockOptions::FORCE_DIRTY)
    .union(SetBlockOptions::SKIP_HEIGHT_RECOMPUTE);

/// A pending write to one filler cell.
#[derive(Clone, Copy, Debug)]
enum FillerOp {
    /// Reset to air if the cell still holds this filler id.
    Clear { x: i32, y: i32, z: i32, filler_id: u32 },
    /// Write the filler id.
    Place { x: i32, y: i32, z: i32, filler_id: u32 },
}

impl FillerOp {
    const fn column(self) -> (i32, i32) {
        match self {
            Self::Clear { x, z, .. } | Self::Place { x, z, .. } => (x, z),
        }
    }

    fn apply(self, chunk: &mut WorldChunk, options: SetBlockOptions) -> Option<BlockChange> {
        let (x, y, z, new_id) = match self {
            Self::Clear { x, y, z, filler_id } => {
                if chunk.get_block(x, y, z) != filler_id {
                    return None;
                }
                (x, y, z, AIR)
            }
            Self::Place { x, y, z, filler_id } => (x, y, z, filler_id),
        };
        let old_id = chunk.set_block(x, y, z, new_id, options).ok()?;
        (old_id != new_id).then_some(BlockChange {
            x,
            y,
            z,
            old_id,
            new_id,
            options,
        })
    }
}

/// Mutation facade over a chunk index.
pub struct ChunkAccessor {
    /// Resident chunks.
    index: Arc<ChunkIndex>,
    /// Multi-cell block shapes.
    fillers: FillerRegistry,
    /// Notified after each applied change.
    listeners: Vec<Arc<dyn BlockChangeListener>>,
}

impl ChunkAccessor {
    /// Creates an accessor with no filler shapes and no listeners.
    #[must_use]
    pub fn new(index: Arc<ChunkIndex>) -> Self {
        Self {
            index,
            fillers: FillerRegistry::new(),
            listeners: Vec::new(),
        }
    }

    /// Sets the filler shapes.
    #[must_use]
    pub fn with_fillers(mut self, fillers: FillerRegistry) -> Self {
        self.fillers = fillers;
        self
    }

    /// Registers a change listener.
    pub fn add_listener(&mut self, listener: Arc<dyn BlockChangeListener>) {
        self.listeners.push(listener);
    }

    /// Underlying index.
    #[must_use]
    pub fn index(&self) -> &Arc<ChunkIndex> {
        &self.index
    }

    /// Filler shapes.
    #[must_use]
    pub fn fillers(&self) -> &FillerRegistry {
        &self.fillers
    }

    /// Block at a world position, or `None` if its chunk is not resident.
    #[must_use]
    pub fn get_block_at(&self, x: i32, y: i32, z: i32) -> Option<u32> {
        let handle = self.index.get(chunk_key_for_block(x, z))?;
        let id = handle.read().get_block(x, y, z);
        Some(id)
    }

    /// Writes a block at a world position.
    ///
    /// Returns false if the owning chunk is not resident (and
    /// `ALLOW_PARTIAL_LOAD` is absent or loading failed) or `y` is outside
    /// the world. Filler cells whose chunk cannot be resolved are skipped.
    pub fn set_block_at(&self, x: i32, y: i32, z: i32, id: u32, options: SetBlockOptions) -> bool {
        let allow_partial_load = options.contains(SetBlockOptions::ALLOW_PARTIAL_LOAD);
        let Some(handle) = self.index.get_or_load(chunk_key_for_block(x, z), allow_partial_load) else {
            return false;
        };

        let filler_options = (options & FILLER_INHERITED)
            | SetBlockOptions::SKIP_FILLER_CLEANUP
            | SetBlockOptions::SKIP_FILLER_PLACEMENT;
        let mut changes = Vec::new();
        let mut foreign = Vec::new();
        {
            let mut chunk = handle.write();
            let old_id = match chunk.set_block(x, y, z, id, options) {
                Ok(old_id) => old_id,
                Err(_) => return false,
            };
            if old_id != id || options.contains(SetBlockOptions::FORCE_DIRTY) {
                changes.push(BlockChange {
                    x,
                    y,
                    z,
                    old_id,
                    new_id: id,
                    options,
                });
            }

            if old_id != id {
                for op in self.filler_ops(x, y, z, old_id, id, options) {
                    let (fx, fz) = op.column();
                    if same_chunk(x, z, fx, fz) {
                        changes.extend(op.apply(&mut chunk, filler_options));
                    } else {
                        foreign.push(op);
                    }
                }
            }
        }

        for op in foreign {
            let (fx, fz) = op.column();
            match self.index.get_or_load(chunk_key_for_block(fx, fz), allow_partial_load) {
                Some(neighbor) => changes.extend(op.apply(&mut neighbor.write(), filler_options)),
                None => tracing::debug!("filler at ({}, {}) skipped: chunk not resident", fx, fz),
            }
        }

        if !options.contains(SetBlockOptions::SUPPRESS_NOTIFICATION) {
            self.notify(&changes);
        }
        if options.contains(SetBlockOptions::REQUEST_NEIGHBOR_UPDATE) {
            self.perform_block_update(x, y, z, allow_partial_load);
        }
        true
    }

    fn filler_ops(&self, x: i32, y: i32, z: i32, old_id: u32, new_id: u32, options: SetBlockOptions) -> Vec<FillerOp> {
        let at = |(dx, dy, dz): (i32, i32, i32)| (x.wrapping_add(dx), y.wrapping_add(dy), z.wrapping_add(dz));
        let mut ops = Vec::new();
        if !options.contains(SetBlockOptions::SKIP_FILLER_CLEANUP) {
            if let Some(shape) = self.fillers.shape(old_id) {
                ops.extend(shape.offsets.iter().map(|&o| {
                    let (x, y, z) = at(o);
                    FillerOp::Clear {
                        x,
                        y,
                        z,
                        filler_id: shape.filler_id,
                    }
                }));
            }
        }
        if !options.contains(SetBlockOptions::SKIP_FILLER_PLACEMENT) {
            if let Some(shape) = self.fillers.shape(new_id) {
                ops.extend(shape.offsets.iter().map(|&o| {
                    let (x, y, z) = at(o);
                    FillerOp::Place {
                        x,
                        y,
                        z,
                        filler_id: shape.filler_id,
                    }
                }));
            }
        }
        ops
    }

    fn notify(&self, changes: &[BlockChange]) {
        for change in changes {
            for listener in &self.listeners {
                listener.on_block_changed(change);
            }
        }
    }

    /// Marks the 3x3x3 neighborhood around a position (center included) as
    /// ticking.
    ///
    /// Air cells and cells outside the world height have nothing to tick and
    /// are skipped. Returns false if any neighbor chunk could not be resolved;
    /// every resolvable chunk is still updated.
    pub fn perform_block_update(&self, x: i32, y: i32, z: i32, allow_partial_load: bool) -> bool {
        let center = self.index.get_or_load(chunk_key_for_block(x, z), allow_partial_load);
        let mut all_resolved = true;

        for dz in -1..=1 {
            for dx in -1..=1 {
                let (nx, nz) = (x.wrapping_add(dx), z.wrapping_add(dz));
                let handle: Option<ChunkHandle> = if same_chunk(x, z, nx, nz) {
                    center.clone()
                } else {
                    self.index.get_or_load(chunk_key_for_block(nx, nz), allow_partial_load)
                };
                let Some(handle) = handle else {
                    all_resolved = false;
                    continue;
                };
                let mut chunk = handle.write();
                for dy in -1..=1 {
                    chunk.set_ticking(nx, y.wrapping_add(dy), nz, true);
                }
            }
        }

        if !all_resolved {
            tracing::trace!("block update at ({}, {}, {}) partially applied", x, y, z);
        }
        all_resolved
    }
}

impl std::fmt::Debug for ChunkAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkAccessor")
            .field("index", &self.index)
            .field("fillers", &self.fillers.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::events::ChannelListener;
    use crate::flags::ChunkFlags;
    use strata_core::coords::chunk_key;

    fn accessor() -> ChunkAccessor {
        ChunkAccessor::new(Arc::new(ChunkIndex::with_void(&WorldConfig::testing()).unwrap()))
    }

    #[test]
    fn test_missing_chunk_is_false_not_fault() {
        let accessor = accessor();
        assert!(!accessor.set_block_at(0, 0, 0, 1, SetBlockOptions::empty()));
        assert_eq!(accessor.get_block_at(0, 0, 0), None);
        assert!(accessor.index().is_empty());
    }

    #[test]
    fn test_partial_load_resolves_chunk() {
        let accessor = accessor();
        assert!(accessor.set_block_at(-1, 3, -1, 4, SetBlockOptions::ALLOW_PARTIAL_LOAD));
        assert!(accessor.index().contains(chunk_key(-1, -1)));
        assert_eq!(accessor.get_block_at(-1, 3, -1), Some(4));
        assert_eq!(accessor.get_block_at(-1, 300, -1), Some(AIR));
    }

    #[test]
    fn test_out_of_world_write_is_false() {
        let accessor = accessor();
        assert!(!accessor.set_block_at(0, 64, 0, 1, SetBlockOptions::ALLOW_PARTIAL_LOAD));
        let handle = accessor.index().get(chunk_key(0, 0)).unwrap();
        assert!(!handle.read().is(ChunkFlags::DIRTY));
    }

    #[test]
    fn test_listeners_see_changes_unless_suppressed() {
        let mut accessor = accessor();
        let (listener, rx) = ChannelListener::unbounded();
        accessor.add_listener(Arc::new(listener));

        accessor.set_block_at(1, 1, 1, 5, SetBlockOptions::ALLOW_PARTIAL_LOAD);
        let change = rx.try_recv().unwrap();
        assert_eq!((change.x, change.y, change.z, change.old_id, change.new_id), (1, 1, 1, AIR, 5));

        // Unchanged id: nothing to report.
        accessor.set_block_at(1, 1, 1, 5, SetBlockOptions::empty());
        assert!(rx.try_recv().is_err());

        accessor.set_block_at(1, 1, 1, 6, SetBlockOptions::SUPPRESS_NOTIFICATION);
        assert!(rx.try_recv().is_err());
        assert_eq!(accessor.get_block_at(1, 1, 1), Some(6));
    }

    #[test]
    fn test_filler_placed_and_cleaned_in_same_chunk() {
        let mut fillers = FillerRegistry::new();
        fillers.register(10, 11, vec![(0, 1, 0)]);
        let accessor = accessor().with_fillers(fillers);

        assert!(accessor.set_block_at(5, 5, 5, 10, SetBlockOptions::ALLOW_PARTIAL_LOAD));
        assert_eq!(accessor.get_block_at(5, 6, 5), Some(11));

        assert!(accessor.set_block_at(5, 5, 5, AIR, SetBlockOptions::empty()));
        assert_eq!(accessor.get_block_at(5, 6, 5), Some(AIR));
    }

    #[test]
    fn test_filler_cleanup_leaves_foreign_blocks() {
        let mut fillers = FillerRegistry::new();
        fillers.register(10, 11, vec![(0, 1, 0)]);
        let accessor = accessor().with_fillers(fillers);

        accessor.set_block_at(5, 5, 5, 10, SetBlockOptions::ALLOW_PARTIAL_LOAD);
        accessor.set_block_at(5, 6, 5, 3, SetBlockOptions::empty());
        accessor.set_block_at(5, 5, 5, AIR, SetBlockOptions::empty());
        assert_eq!(accessor.get_block_at(5, 6, 5), Some(3));

        // SKIP_FILLER_PLACEMENT writes only the origin.
        accessor.set_block_at(8, 8, 8, 10, SetBlockOptions::SKIP_FILLER_PLACEMENT);
        assert_eq!(accessor.get_block_at(8, 9, 8), Some(AIR));
    }

    #[test]
    fn test_neighbor_update_marks_non_air() {
        let accessor = accessor();
        for (x, y, z) in [(4, 4, 4), (5, 5, 5), (3, 4, 4)] {
            accessor.set_block_at(x, y, z, 1, SetBlockOptions::ALLOW_PARTIAL_LOAD);
        }
        assert!(accessor.perform_block_update(4, 4, 4, false));

        let handle = accessor.index().get(chunk_key(0, 0)).unwrap();
        let chunk = handle.read();
        assert!(chunk.is_ticking(4, 4, 4));
        assert!(chunk.is_ticking(5, 5, 5));
        assert!(chunk.is_ticking(3, 4, 4));
        assert!(!chunk.is_ticking(4, 5, 4));
        assert_eq!(chunk.ticking_count(), 3);
    }

    #[test]
    fn test_request_neighbor_update_option() {
        let accessor = accessor();
        accessor.set_block_at(10, 10, 10, 1, SetBlockOptions::ALLOW_PARTIAL_LOAD);
        let options = SetBlockOptions::REQUEST_NEIGHBOR_UPDATE;
        assert!(accessor.set_block_at(11, 10, 10, 2, options));

        let handle = accessor.index().get(chunk_key(0, 0)).unwrap();
        assert!(handle.read().is_ticking(10, 10, 10));
        assert!(handle.read().is_ticking(11, 10, 10));
    }
}
