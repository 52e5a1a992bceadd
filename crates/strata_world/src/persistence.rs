//! # Chunk Files
//!
//! One file per chunk, `c.<cx>.<cz>.bin`, inside a storage directory.
//!
//! ## File Format (little-endian)
//!
//! ```text
//! u8      compression (0 raw, 1 lz4 with prepended size)
//! ── payload ───────────────────────────────
//! [u8;4]  magic "STRC"
//! u8      version
//! i64     chunk key
//! u16     section count
//! u8      persistent flags (GENERATED | POPULATED | TICKING)
//! i16 × 1024  height map
//! u32     state entry count
//!         per entry: u32 key, u8 present, [u16 props, per prop: str key, value]
//! per section: u32 length, section codec bytes
//! ```
//!
//! Missing files fall back to the wrapped generator. Corrupt files are logged
//! and regenerated; the corrupt file stays on disk until the chunk is saved.
//! Read failures other than a missing file are returned as `Io` errors.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use strata_core::coords::{unpack_chunk_key, COLUMN_AREA};
use strata_core::{decode_section, encode_section};

use crate::chunk::WorldChunk;
use crate::config::{WorldBounds, WorldConfig};
use crate::error::{WorldError, WorldResult};
use crate::flags::ChunkFlags;
use crate::provider::ChunkProvider;
use crate::state::{BlockState, StateValue};

const MAGIC: [u8; 4] = *b"STRC";
const VERSION: u8 = 1;

/// Flags that survive a save/load cycle.
const PERSISTENT_FLAGS: ChunkFlags = ChunkFlags::GENERATED
    .union(ChunkFlags::POPULATED)
    .union(ChunkFlags::TICKING);

/// Chunk storage on the local filesystem.
#[derive(Debug)]
pub struct DiskProvider<G> {
    /// Directory holding chunk files.
    dir: PathBuf,
    /// lz4-compress on write.
    compression: bool,
    /// Source of chunks with no file.
    fallback: G,
}

impl<G: ChunkProvider> DiskProvider<G> {
    /// Opens (creating if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>, fallback: G) -> WorldResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            compression: true,
            fallback,
        })
    }

    /// Opens the storage directory named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if no `storage_dir` is set, `Io` if it cannot be created.
    pub fn from_config(config: &WorldConfig, fallback: G) -> WorldResult<Self> {
        let dir = config
            .storage_dir
            .clone()
            .ok_or_else(|| WorldError::InvalidConfig("storage_dir is required for disk storage".into()))?;
        Ok(Self::new(dir, fallback)?.with_compression(config.compression))
    }

    /// Enables or disables lz4 compression for subsequent writes.
    #[must_use]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a chunk key.
    #[must_use]
    pub fn path_for(&self, key: i64) -> PathBuf {
        let (cx, cz) = unpack_chunk_key(key);
        self.dir.join(format!("c.{cx}.{cz}.bin"))
    }

    /// Reads a chunk file. `Ok(None)` if there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load(&self, key: i64, bounds: &WorldBounds) -> WorldResult<Option<WorldChunk>> {
        let bytes = match std::fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let payload = match bytes.split_first() {
            Some((0, rest)) => rest.to_vec(),
            Some((1, rest)) => decompress_size_prepended(rest).map_err(|e| WorldError::Decompress(e.to_string()))?,
            Some((tag, _)) => return Err(WorldError::Decompress(format!("unknown compression tag {tag}"))),
            None => return Err(WorldError::Decompress("empty chunk file".into())),
        };
        let chunk = decode_chunk(&payload, bounds)?;
        if chunk.key() != key {
            return Err(WorldError::ChunkKeyMismatch {
                expected: key,
                found: chunk.key(),
            });
        }
        Ok(Some(chunk))
    }
}

impl<G: ChunkProvider> ChunkProvider for DiskProvider<G> {
    fn load_or_generate(&self, key: i64, bounds: &WorldBounds) -> WorldResult<WorldChunk> {
        match self.load(key, bounds) {
            Ok(Some(chunk)) => {
                tracing::debug!("loaded chunk ({}, {}) from disk", chunk.cx(), chunk.cz());
                Ok(chunk)
            }
            Ok(None) => self.fallback.load_or_generate(key, bounds),
            // Unreadable is not corrupt: the file on disk must survive.
            Err(e @ WorldError::Io(_)) => Err(e),
            Err(e) => {
                let (cx, cz) = unpack_chunk_key(key);
                tracing::warn!("chunk ({}, {}) corrupt, regenerating: {}", cx, cz, e);
                self.fallback.load_or_generate(key, bounds)
            }
        }
    }

    fn persist(&self, chunk: &WorldChunk) -> WorldResult<()> {
        let payload = encode_chunk(chunk);
        let mut file = Vec::with_capacity(payload.len() + 1);
        if self.compression {
            file.push(1);
            file.extend_from_slice(&compress_prepend_size(&payload));
        } else {
            file.push(0);
            file.extend_from_slice(&payload);
        }

        let path = self.path_for(chunk.key());
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &file)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!("saved chunk ({}, {}): {} bytes", chunk.cx(), chunk.cz(), file.len());
        Ok(())
    }
}

/// Serializes a whole chunk (uncompressed payload).
#[must_use]
pub fn encode_chunk(chunk: &WorldChunk) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4096);
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&chunk.key().to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    buf.extend_from_slice(&(chunk.sections().len() as u16).to_le_bytes());
    buf.push(chunk.flags().intersection(PERSISTENT_FLAGS).bits());

    let heights: Vec<i16> = chunk.height_map().iter().map(|h| h.to_le()).collect();
    buf.extend_from_slice(bytemuck::cast_slice::<i16, u8>(&heights));

    let states: Vec<(u32, Option<&BlockState>)> = chunk.raw_states().collect();
    write_u32(&mut buf, states.len());
    for (key, state) in states {
        buf.extend_from_slice(&key.to_le_bytes());
        match state {
            None => buf.push(0),
            Some(state) => {
                buf.push(1);
                #[allow(clippy::cast_possible_truncation)]
                buf.extend_from_slice(&(state.len() as u16).to_le_bytes());
                for (name, value) in state.iter() {
                    write_str(&mut buf, name);
                    write_value(&mut buf, value);
                }
            }
        }
    }

    for section in chunk.sections() {
        let bytes = encode_section(section);
        write_u32(&mut buf, bytes.len());
        buf.extend_from_slice(&bytes);
    }
    buf
}

/// Deserializes a chunk payload produced by [`encode_chunk`].
///
/// # Errors
///
/// Returns `Decompress` on a malformed payload or a height mismatch with
/// `bounds`, `Codec` on a malformed section.
pub fn decode_chunk(bytes: &[u8], bounds: &WorldBounds) -> WorldResult<WorldChunk> {
    let mut r = ByteReader::new(bytes);
    if r.take(4)? != MAGIC {
        return Err(WorldError::Decompress("bad magic".into()));
    }
    let version = r.u8()?;
    if version != VERSION {
        return Err(WorldError::Decompress(format!("unsupported version {version}")));
    }
    let key = r.i64()?;
    let section_count = usize::from(r.u16()?);
    if section_count != bounds.height_sections {
        return Err(WorldError::Decompress(format!(
            "chunk has {section_count} sections, world expects {}",
            bounds.height_sections
        )));
    }
    let flags = ChunkFlags::from_bits_truncate(r.u8()?) & PERSISTENT_FLAGS;

    let mut heights = [0i16; COLUMN_AREA];
    for (h, le) in heights.iter_mut().zip(bytemuck::pod_collect_to_vec::<u8, i16>(r.take(COLUMN_AREA * 2)?)) {
        *h = i16::from_le(le);
    }

    let state_count = r.u32()?;
    let mut states = Vec::new();
    for _ in 0..state_count {
        let state_key = r.u32()?;
        let state = match r.u8()? {
            0 => None,
            1 => {
                let mut state = BlockState::new();
                for _ in 0..r.u16()? {
                    let name = r.str()?;
                    let value = r.value()?;
                    state.set(&name, value);
                }
                Some(state)
            }
            tag => return Err(WorldError::Decompress(format!("bad state tag {tag}"))),
        };
        states.push((state_key, state));
    }

    let mut sections = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        let len = r.u32()? as usize;
        sections.push(decode_section(r.take(len)?)?);
    }

    let (cx, cz) = unpack_chunk_key(key);
    let mut chunk = WorldChunk::from_sections(cx, cz, *bounds, sections);
    chunk.restore_height_map(&heights);
    for (state_key, state) in states {
        chunk.insert_raw_state(state_key, state);
    }
    chunk.set_flag(flags, true);
    Ok(chunk)
}

#[allow(clippy::cast_possible_truncation)]
fn write_u32(buf: &mut Vec<u8>, n: usize) {
    buf.extend_from_slice(&(n as u32).to_le_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn write_value(buf: &mut Vec<u8>, value: &StateValue) {
    match value {
        StateValue::Bool(b) => {
            buf.push(0);
            buf.push(u8::from(*b));
        }
        StateValue::Int(i) => {
            buf.push(1);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        StateValue::Text(s) => {
            buf.push(2);
            write_str(buf, s);
        }
    }
}

/// Bounds-checked cursor over a chunk payload.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> WorldResult<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(WorldError::Decompress(format!("truncated at byte {}", self.pos)));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> WorldResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> WorldResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> WorldResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> WorldResult<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn str(&mut self) -> WorldResult<String> {
        let len = usize::from(self.u16()?);
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| WorldError::Decompress(e.to_string()))
    }

    fn value(&mut self) -> WorldResult<StateValue> {
        match self.u8()? {
            0 => Ok(StateValue::Bool(self.u8()? != 0)),
            1 => {
                let b = self.take(8)?;
                Ok(StateValue::Int(i64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ])))
            }
            2 => Ok(StateValue::Text(self.str()?)),
            tag => Err(WorldError::Decompress(format!("bad value tag {tag}"))),
        }
    }
}
