//! Save archive container: a header plus named, checksummed blocks.
//!
//! ```no_run
//! use portia_archive::archive::Archive;
//! use portia_archive::summary::Summary;
//!
//! let mut ar = Archive::load("slot1.sav")?;
//! let mut summary: Summary = ar.fetch("Summary")?;
//! summary.dlc_require.clear();
//! ar.store("Summary", &summary)?;
//! ar.save("slot1.sav")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # On-disk layout
//! ```text
//! Header:     version:i32, timestamp:i64, framing_marker:i32
//! BlockCount: i32
//! Block*:     key:string, length:i32, payload:[u8; length], checksum:u64
//! ```
//!
//! Blocks are kept in an insertion-ordered map, so a load → modify → save
//! cycle writes them back in exactly the order they were read.  Saving
//! always emits a fresh header and recomputes every checksum.  The
//! destination file is overwritten in place; there is no temporary-file
//! swap, so an interrupted save leaves a partial file behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::block::{write_block, BlockEntry};
use crate::error::{ArchiveError, Result};
use crate::frame::{frame_to_vec, read_framed, FrameMode, FrameReader, FrameWriter};
use crate::header::Header;
use crate::ordered_map::OrderedMap;

// ── Record ───────────────────────────────────────────────────────────────────

/// A value that lives inside one framed block.
///
/// `decode` runs inside an already-open frame and must consume exactly its
/// payload (unless the caller asked for [`FrameMode::Lenient`]); `encode`
/// writes into a frame whose length is patched after it returns.
pub trait Record: Sized {
    fn decode<R: Read + Seek + ?Sized>(reader: &mut FrameReader<'_, R>) -> Result<Self>;
    fn encode<W: Write + Seek + ?Sized>(&self, writer: &mut FrameWriter<'_, W>) -> Result<()>;
}

/// Encode `value` as a complete framed block payload.
pub fn encode_record<T: Record>(value: &T) -> Result<Vec<u8>> {
    frame_to_vec(|w| value.encode(w))
}

/// Decode a complete framed block payload.
pub fn decode_record<T: Record>(payload: &[u8], mode: FrameMode) -> Result<T> {
    let mut cursor = Cursor::new(payload);
    read_framed(&mut cursor, mode, |r| T::decode(r))
}

// ── Archive ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Archive {
    header: Header,
    blocks: OrderedMap<String, Vec<u8>>,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading archive");
        Self::read_from(BufReader::new(File::open(path)?))
    }

    /// Parse a whole archive.  An incompatible header aborts before any
    /// block is read; a checksum mismatch aborts naming the block.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let header = Header::read(&mut reader)?;
        if !header.is_compatible() {
            return Err(ArchiveError::IncompatibleHeaderVersion { version: header.version });
        }

        let count = reader.read_i32::<LittleEndian>()?;
        let count = usize::try_from(count)
            .map_err(|_| ArchiveError::invalid(format!("negative block count {count}")))?;

        let mut blocks = OrderedMap::new();
        for _ in 0..count {
            let entry = BlockEntry::read(&mut reader)?;
            debug!(key = %entry.key, len = entry.payload.len(), "read block");
            blocks
                .insert(entry.key.clone(), entry.payload)
                .map_err(|_| ArchiveError::DuplicateBlockKey(entry.key))?;
        }
        debug!(version = header.version, blocks = blocks.len(), "archive loaded");
        Ok(Self { header, blocks })
    }

    // ── Write ────────────────────────────────────────────────────────────────

    /// Write to `path`, creating missing parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.display(), blocks = self.blocks.len(), "archive saved");
        Ok(())
    }

    /// Emit a fresh header followed by every block in map order.
    /// Returns the header that was written.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<Header> {
        let header = Header::write(&mut writer)?;
        let count = i32::try_from(self.blocks.len())
            .map_err(|_| ArchiveError::invalid("too many blocks"))?;
        writer.write_i32::<LittleEndian>(count)?;
        for (key, payload) in &self.blocks {
            write_block(&mut writer, key, payload)?;
        }
        Ok(header)
    }

    // ── Typed access ─────────────────────────────────────────────────────────

    pub fn fetch<T: Record>(&self, key: &str) -> Result<T> {
        self.fetch_with(key, FrameMode::Strict)
    }

    pub fn fetch_with<T: Record>(&self, key: &str, mode: FrameMode) -> Result<T> {
        let payload = self.block(key).ok_or_else(|| ArchiveError::BlockKeyNotFound(key.to_owned()))?;
        debug!(key, len = payload.len(), ?mode, "fetch");
        decode_record(payload, mode)
    }

    /// Re-encode `value` over an existing block.  The key must already be
    /// present; new blocks go through [`Archive::insert`].
    pub fn store<T: Record>(&mut self, key: &str, value: &T) -> Result<()> {
        if !self.blocks.contains_key(key) {
            return Err(ArchiveError::BlockKeyNotFound(key.to_owned()));
        }
        let payload = encode_record(value)?;
        debug!(key, len = payload.len(), "store");
        self.blocks
            .update(key, payload)
            .map(drop)
            .map_err(|_| ArchiveError::BlockKeyNotFound(key.to_owned()))
    }

    /// Append a new block holding `value`.  Fails if `key` exists.
    pub fn insert<T: Record>(&mut self, key: &str, value: &T) -> Result<()> {
        if self.blocks.contains_key(key) {
            return Err(ArchiveError::DuplicateBlockKey(key.to_owned()));
        }
        let payload = encode_record(value)?;
        self.insert_bytes(key, payload)
    }

    /// Append a new block with an already-encoded payload.
    pub fn insert_bytes(&mut self, key: &str, payload: Vec<u8>) -> Result<()> {
        debug!(key, len = payload.len(), "insert");
        self.blocks
            .insert(key.to_owned(), payload)
            .map_err(|_| ArchiveError::DuplicateBlockKey(key.to_owned()))
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    /// The header as loaded (or as created for a new archive).
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn version(&self) -> i32 {
        self.header.version
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blocks.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Raw payload bytes of one block.
    pub fn block(&self, key: &str) -> Option<&[u8]> {
        self.blocks.get(key).map(Vec::as_slice)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.blocks.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
