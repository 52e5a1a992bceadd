//! # Chunk Index
//!
//! Concurrent map from packed chunk key to resident chunk.
//!
//! ## Locking
//!
//! ```text
//! DashMap<i64, Arc<RwLock<WorldChunk>>>
//!    │            │
//!    │            └─ per-chunk lock, held only by the owning world thread
//!    └─ sharded map lock, held only for lookup/insert/remove
//! ```
//!
//! Lookups clone the `Arc` out of the map, so chunk contents are never
//! accessed under a shard lock. Provider loads also run outside it: two
//! threads may load the same key at once, and the first insert wins.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use strata_core::coords::unpack_chunk_key;

use crate::chunk::WorldChunk;
use crate::config::{DemotionPolicy, WorldBounds, WorldConfig};
use crate::error::{WorldError, WorldResult};
use crate::flags::ChunkFlags;
use crate::provider::{ChunkProvider, VoidProvider};

/// Shared handle to a resident chunk.
pub type ChunkHandle = Arc<RwLock<WorldChunk>>;

/// Concurrent chunk map backed by a provider.
pub struct ChunkIndex {
    /// Resident chunks.
    chunks: DashMap<i64, ChunkHandle>,
    /// Source and sink for non-resident chunks.
    provider: Arc<dyn ChunkProvider>,
    /// World height range.
    bounds: WorldBounds,
    /// Demotion policy applied to every resident chunk.
    demotion: DemotionPolicy,
}

impl ChunkIndex {
    /// Creates an empty index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config fails validation.
    pub fn new(config: &WorldConfig, provider: Arc<dyn ChunkProvider>) -> WorldResult<Self> {
        let bounds = config.bounds()?;
        let chunks = match config.shard_amount() {
            Some(shards) => DashMap::with_shard_amount(shards),
            None => DashMap::new(),
        };
        tracing::debug!(
            "chunk index: {} sections per column, demotion {:?}",
            bounds.height_sections,
            config.demotion
        );
        Ok(Self {
            chunks,
            provider,
            bounds,
            demotion: config.demotion,
        })
    }

    /// Creates an index whose missing chunks are empty air.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config fails validation.
    pub fn with_void(config: &WorldConfig) -> WorldResult<Self> {
        Self::new(config, Arc::new(VoidProvider))
    }

    /// World height range.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Resident chunk for `key`.
    #[must_use]
    pub fn get(&self, key: i64) -> Option<ChunkHandle> {
        self.chunks.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Resident chunk for `key`, loading it through the provider if absent and
    /// `allow_partial_load` is set.
    ///
    /// Without `allow_partial_load` a missing chunk returns `None` and nothing
    /// changes. A provider failure is logged and also returns `None`.
    /// Concurrent loads of the same key may each call the provider, but all
    /// resolve to one resident chunk.
    pub fn get_or_load(&self, key: i64, allow_partial_load: bool) -> Option<ChunkHandle> {
        if let Some(handle) = self.get(key) {
            return Some(handle);
        }
        if !allow_partial_load {
            return None;
        }

        // Load outside the shard lock; a racing loader's chunk is discarded.
        let chunk = match self.load(key) {
            Ok(chunk) => chunk,
            Err(e) => {
                let (cx, cz) = unpack_chunk_key(key);
                tracing::warn!("chunk ({}, {}) failed to load: {}", cx, cz, e);
                return None;
            }
        };
        let handle = match self.chunks.entry(key) {
            Entry::Occupied(entry) => {
                tracing::trace!("chunk {} loaded concurrently, keeping resident copy", key);
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::new(RwLock::new(chunk))).value()),
        };
        Some(handle)
    }

    fn load(&self, key: i64) -> WorldResult<WorldChunk> {
        let mut chunk = self.provider.load_or_generate(key, &self.bounds)?;
        if chunk.key() != key {
            return Err(WorldError::ChunkKeyMismatch {
                expected: key,
                found: chunk.key(),
            });
        }
        self.admit(&mut chunk);
        tracing::debug!("loaded chunk ({}, {})", chunk.cx(), chunk.cz());
        Ok(chunk)
    }

    fn admit(&self, chunk: &mut WorldChunk) {
        chunk.set_demotion(self.demotion);
        chunk.set_flag(ChunkFlags::LOADED, true);
    }

    /// Inserts a chunk, returning the handle it replaced.
    ///
    /// # Errors
    ///
    /// Returns `ChunkKeyMismatch` if `chunk` is not the chunk for `key`, or
    /// `InvalidConfig` if its height differs from the world's.
    pub fn insert(&self, key: i64, mut chunk: WorldChunk) -> WorldResult<Option<ChunkHandle>> {
        if chunk.key() != key {
            return Err(WorldError::ChunkKeyMismatch {
                expected: key,
                found: chunk.key(),
            });
        }
        if chunk.bounds() != self.bounds {
            return Err(WorldError::InvalidConfig(format!(
                "chunk height {:?} does not match world {:?}",
                chunk.bounds(),
                self.bounds
            )));
        }
        self.admit(&mut chunk);
        tracing::debug!("inserted chunk ({}, {})", chunk.cx(), chunk.cz());
        Ok(self.chunks.insert(key, Arc::new(RwLock::new(chunk))))
    }

    /// Removes a chunk without saving it.
    pub fn remove(&self, key: i64) -> Option<ChunkHandle> {
        let (_, handle) = self.chunks.remove(&key)?;
        handle.write().set_flag(ChunkFlags::LOADED, false);
        let (cx, cz) = unpack_chunk_key(key);
        tracing::debug!("removed chunk ({}, {})", cx, cz);
        Some(handle)
    }

    /// Unloads a chunk, persisting it first when `persist` is set and it is dirty.
    ///
    /// Returns false if the chunk was not resident. On a persist failure the
    /// chunk stays resident.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if persisting fails.
    pub fn unload(&self, key: i64, persist: bool) -> WorldResult<bool> {
        let Some(handle) = self.get(key) else {
            return Ok(false);
        };
        if persist {
            self.save(&handle)?;
        }
        Ok(self.remove(key).is_some())
    }

    /// Persists every dirty chunk. Returns how many were saved.
    ///
    /// # Errors
    ///
    /// Returns the first provider error; chunks saved before it stay clean.
    pub fn save_dirty(&self) -> WorldResult<usize> {
        let handles: Vec<ChunkHandle> = self.chunks.iter().map(|e| Arc::clone(e.value())).collect();
        let mut saved = 0;
        for handle in &handles {
            if self.save(handle)? {
                saved += 1;
            }
        }
        if saved > 0 {
            tracing::debug!("saved {} dirty chunks", saved);
        }
        Ok(saved)
    }

    fn save(&self, handle: &ChunkHandle) -> WorldResult<bool> {
        let mut chunk = handle.write();
        if !chunk.is(ChunkFlags::DIRTY) {
            return Ok(false);
        }
        chunk.set_flag(ChunkFlags::SAVING, true);
        let result = self.provider.persist(&chunk);
        chunk.set_flag(ChunkFlags::SAVING, false);
        result?;
        chunk.set_flag(ChunkFlags::DIRTY, false);
        Ok(true)
    }

    /// True if `key` is resident.
    #[must_use]
    pub fn contains(&self, key: i64) -> bool {
        self.chunks.contains_key(&key)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True if no chunk is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Snapshot of resident keys.
    #[must_use]
    pub fn keys(&self) -> Vec<i64> {
        self.chunks.iter().map(|e| *e.key()).collect()
    }
}

impl std::fmt::Debug for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIndex")
            .field("resident", &self.chunks.len())
            .field("bounds", &self.bounds)
            .field("demotion", &self.demotion)
            .finish_non_exhaustive()
    }
}
