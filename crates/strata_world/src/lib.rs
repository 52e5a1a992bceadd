//! # STRATA World
//!
//! Chunk-level world storage built on [`strata_core`]:
//!
//! - [`WorldChunk`]: a full-height column of sections with a height map,
//!   state flags and a sparse extra-state overlay
//! - [`ChunkIndex`]: a sharded concurrent map of resident chunks with
//!   load-on-demand through a [`ChunkProvider`]
//! - [`ChunkAccessor`]: world-coordinate writes, multi-cell fillers,
//!   3x3x3 neighbor updates and change notification
//!
//! ## Threading
//!
//! The index may be shared freely across threads. Each chunk is expected to
//! be mutated by a single world thread; the per-chunk lock only keeps
//! concurrent readers (network, commands) consistent.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_world::{ChunkAccessor, ChunkIndex, SetBlockOptions, WorldConfig};
//!
//! let index = Arc::new(ChunkIndex::with_void(&WorldConfig::testing()).unwrap());
//! let accessor = ChunkAccessor::new(index);
//!
//! assert!(accessor.set_block_at(-5, 10, 40, 7, SetBlockOptions::ALLOW_PARTIAL_LOAD));
//! assert_eq!(accessor.get_block_at(-5, 10, 40), Some(7));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod accessor;
pub mod chunk;
pub mod config;
pub mod error;
pub mod events;
pub mod filler;
pub mod flags;
pub mod index;
pub mod persistence;
pub mod provider;
pub mod state;

pub use accessor::ChunkAccessor;
pub use chunk::{WorldChunk, EMPTY_COLUMN};
pub use config::{DemotionPolicy, WorldBounds, WorldConfig, MIN_Y};
pub use error::{WorldError, WorldResult};
pub use events::{BlockChange, BlockChangeListener, ChannelListener};
pub use filler::{FillerRegistry, FillerShape};
pub use flags::{ChunkFlags, SetBlockOptions};
pub use index::{ChunkHandle, ChunkIndex};
pub use persistence::{decode_chunk, encode_chunk, DiskProvider};
pub use provider::{ChunkProvider, FlatGenerator, VoidProvider};
pub use state::{BlockState, StateEntry, StateValue};

pub use strata_core::AIR;
