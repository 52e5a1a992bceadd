//! # World Configuration
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! max_y = 319
//! demotion = "eager"
//! index_shards = 64
//! storage_dir = "world/chunks"
//! compression = true
//! ```
//!
//! Every field is optional and falls back to [`WorldConfig::default`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use strata_core::coords::{BITS, SECTION_SIZE};

use crate::error::{WorldError, WorldResult};

/// Lowest world Y.
pub const MIN_Y: i32 = 0;

/// When sections re-encode into a narrower palette.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemotionPolicy {
    /// Demote on the write that removes the last instance of an id.
    #[default]
    Eager,
    /// Demote only on [`WorldChunk::compact`](crate::WorldChunk::compact).
    Manual,
}

/// World configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Highest world Y. `max_y + 1` must be a multiple of 32.
    pub max_y: i32,
    /// Palette demotion policy.
    pub demotion: DemotionPolicy,
    /// Shard count for the chunk index (0 = library default). Rounded up to a power of two.
    pub index_shards: usize,
    /// Directory for chunk files, if disk storage is used.
    pub storage_dir: Option<PathBuf>,
    /// lz4-compress chunk files.
    pub compression: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_y: 319, // 10 sections
            demotion: DemotionPolicy::Eager,
            index_shards: 0,
            storage_dir: None,
            compression: true,
        }
    }
}

impl WorldConfig {
    /// Production config: full height, sharded index sized for many threads.
    #[must_use]
    pub const fn production() -> Self {
        Self {
            max_y: 319,
            demotion: DemotionPolicy::Eager,
            index_shards: 128,
            storage_dir: None,
            compression: true,
        }
    }

    /// Small world for tests: 2 sections, manual demotion, no compression.
    #[must_use]
    pub const fn testing() -> Self {
        Self {
            max_y: 63,
            demotion: DemotionPolicy::Manual,
            index_shards: 4,
            storage_dir: None,
            compression: false,
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on a parse failure or an invalid height.
    pub fn from_toml_str(text: &str) -> WorldResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| WorldError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `InvalidConfig` otherwise.
    pub fn from_toml_file(path: impl AsRef<Path>) -> WorldResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks the world height is a whole number of sections.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when `max_y + 1` is not a positive multiple of 32
    /// or exceeds `i16::MAX`.
    pub fn validate(&self) -> WorldResult<()> {
        self.bounds().map(|_| ())
    }

    /// Validated height bounds.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    pub fn bounds(&self) -> WorldResult<WorldBounds> {
        WorldBounds::new(self.max_y)
    }

    /// Shard count for the chunk index, if overridden.
    #[must_use]
    pub fn shard_amount(&self) -> Option<usize> {
        (self.index_shards > 0).then(|| self.index_shards.next_power_of_two().max(2))
    }
}

/// Validated world height range carried by every chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldBounds {
    /// Lowest valid Y (inclusive).
    pub min_y: i32,
    /// Highest valid Y (inclusive).
    pub max_y: i32,
    /// Sections per chunk column.
    pub height_sections: usize,
}

impl WorldBounds {
    /// Builds bounds for `[MIN_Y, max_y]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the height is not a positive multiple of 32
    /// or `max_y` does not fit the i16 height map.
    pub fn new(max_y: i32) -> WorldResult<Self> {
        let height = i64::from(max_y) - i64::from(MIN_Y) + 1;
        #[allow(clippy::cast_possible_wrap)]
        let section = SECTION_SIZE as i64;
        if height <= 0 || height % section != 0 {
            return Err(WorldError::InvalidConfig(format!(
                "world height {height} is not a positive multiple of {SECTION_SIZE}"
            )));
        }
        if max_y > i32::from(i16::MAX) {
            return Err(WorldError::InvalidConfig(format!("max_y {max_y} exceeds {}", i16::MAX)));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let height_sections = (height >> BITS) as usize;
        Ok(Self {
            min_y: MIN_Y,
            max_y,
            height_sections,
        })
    }

    /// True if `y` lies inside the world.
    #[inline]
    #[must_use]
    pub const fn contains_y(&self, y: i32) -> bool {
        y >= self.min_y && y <= self.max_y
    }

    /// Section slot holding `y`. Caller guarantees `contains_y(y)`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn section_slot(&self, y: i32) -> usize {
        ((y - self.min_y) >> BITS) as usize
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min_y: MIN_Y,
            max_y: 319,
            height_sections: 10,
        }
    }
}
