//! Multi-cell block shapes.
//!
//! A block such as a door or a bed occupies its origin cell plus a set of
//! filler cells at fixed offsets. Filler cells hold a dedicated filler id so
//! they can be told apart from ordinary blocks on cleanup.

use std::collections::HashMap;

/// Cells occupied by a multi-cell block besides its origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FillerShape {
    /// Id written into every filler cell.
    pub filler_id: u32,
    /// `(dx, dy, dz)` offsets from the origin. Never `(0, 0, 0)`.
    pub offsets: Vec<(i32, i32, i32)>,
}

/// Block id -> filler shape.
#[derive(Clone, Debug, Default)]
pub struct FillerRegistry {
    shapes: HashMap<u32, FillerShape>,
}

impl FillerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the shape of `block_id`, replacing any previous one.
    ///
    /// # Panics
    /// Panics if an offset is the origin or `filler_id == block_id`.
    pub fn register(&mut self, block_id: u32, filler_id: u32, offsets: Vec<(i32, i32, i32)>) {
        assert!(!offsets.contains(&(0, 0, 0)), "filler offset cannot be the origin");
        assert_ne!(block_id, filler_id, "filler id must differ from its block");
        self.shapes.insert(block_id, FillerShape { filler_id, offsets });
    }

    /// Shape of `block_id`, if it is a multi-cell block.
    #[inline]
    #[must_use]
    pub fn shape(&self, block_id: u32) -> Option<&FillerShape> {
        self.shapes.get(&block_id)
    }

    /// Number of registered shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True if no shape is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
