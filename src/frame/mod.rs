//! Length-prefixed frames, the read/write primitive under every block.
//!
//! # Layout
//! A frame is an `i32` little-endian byte count followed by exactly that
//! many bytes of structured payload.  Frames nest: a payload may open an
//! inner frame, and each scope checks its own length independently.
//!
//! # Reading
//! [`FrameReader::open`] reads the length and remembers where the payload
//! starts.  Closing compares the bytes actually consumed with the declared
//! length:
//!
//! | [`FrameMode`] | consumed ≠ declared                                          |
//! |---------------|--------------------------------------------------------------|
//! | `Strict`      | fails with [`ArchiveError::FrameLengthMismatch`]              |
//! | `Lenient`     | repositions to the declared end (unknown trailing fields skipped) |
//! | `Raw`         | no length prefix at all; nothing is checked                   |
//!
//! # Writing
//! [`FrameWriter::open`] writes an `i32::MIN` placeholder.  On close the
//! real byte count is backpatched over it and the stream is returned to the
//! append position.
//!
//! # Scope guarantees
//! [`read_framed`] and [`write_framed`] run the close step on every exit
//! path.  When the body fails its error wins, but the reader is still moved
//! to the frame end and the writer's length is still patched.  A frame that
//! is dropped without being closed does the same on a best-effort basis.

pub mod wire;

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::error::{ArchiveError, Result};

/// Written in place of the length until the frame is closed.
pub const LENGTH_PLACEHOLDER: i32 = i32::MIN;
/// Size of the length prefix on disk.
pub const LENGTH_PREFIX_SIZE: u64 = 4;

/// How a reader treats a frame's length prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameMode {
    /// Consumed bytes must equal the declared length.
    #[default]
    Strict,
    /// A mismatch is absorbed by seeking to the declared end.
    Lenient,
    /// Legacy unframed encoding: no prefix is read.
    Raw,
}

fn position<S: Seek + ?Sized>(stream: &mut S) -> Result<u64> {
    let pos = stream.stream_position()?;
    if pos > i32::MAX as u64 {
        return Err(ArchiveError::invalid(format!("stream position {pos} is too large")));
    }
    Ok(pos)
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct FrameReader<'a, R: Read + Seek + ?Sized> {
    inner:    &'a mut R,
    mode:     FrameMode,
    begin:    u64,
    declared: u64,
    closed:   bool,
}

impl<'a, R: Read + Seek + ?Sized> FrameReader<'a, R> {
    pub fn open(inner: &'a mut R, mode: FrameMode) -> Result<Self> {
        let declared = match mode {
            FrameMode::Raw => 0,
            FrameMode::Strict | FrameMode::Lenient => {
                let len = inner.read_i32::<LittleEndian>()?;
                u64::try_from(len)
                    .map_err(|_| ArchiveError::invalid(format!("negative frame length {len}")))?
            }
        };
        let begin = position(&mut *inner)?;
        Ok(Self { inner, mode, begin, declared, closed: false })
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// Declared payload length; `None` for a raw frame.
    pub fn declared_len(&self) -> Option<u64> {
        (self.mode != FrameMode::Raw).then_some(self.declared)
    }

    /// Bytes consumed since the payload started.
    pub fn consumed(&mut self) -> Result<u64> {
        Ok(position(&mut *self.inner)?.saturating_sub(self.begin))
    }

    /// Mode for a frame nested inside this one: raw stays raw, anything
    /// else is checked strictly.
    pub fn nested_mode(&self) -> FrameMode {
        match self.mode {
            FrameMode::Raw => FrameMode::Raw,
            FrameMode::Strict | FrameMode::Lenient => FrameMode::Strict,
        }
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        if self.mode == FrameMode::Raw {
            return Ok(());
        }
        let consumed = self.consumed()?;
        if consumed == self.declared {
            return Ok(());
        }
        match self.mode {
            FrameMode::Lenient => {
                warn!(declared = self.declared, consumed, "skipping to declared frame end");
                self.inner.seek(SeekFrom::Start(self.begin + self.declared))?;
                Ok(())
            }
            _ => Err(ArchiveError::FrameLengthMismatch { expected: self.declared, actual: consumed }),
        }
    }
}

impl<R: Read + Seek + ?Sized> Drop for FrameReader<'_, R> {
    fn drop(&mut self) {
        if !self.closed && self.mode != FrameMode::Raw {
            let _ = self.inner.seek(SeekFrom::Start(self.begin + self.declared));
        }
    }
}

impl<R: Read + Seek + ?Sized> Read for FrameReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Seek + ?Sized> Seek for FrameReader<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Run `body` inside a frame read from `reader`, closing it on every path.
pub fn read_framed<R, T, F>(reader: &mut R, mode: FrameMode, body: F) -> Result<T>
where
    R: Read + Seek + ?Sized,
    F: FnOnce(&mut FrameReader<'_, R>) -> Result<T>,
{
    let mut frame = FrameReader::open(reader, mode)?;
    match body(&mut frame) {
        Ok(value) => frame.close().map(|()| value),
        // Dropping repositions to the declared end.
        Err(e) => Err(e),
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct FrameWriter<'a, W: Write + Seek + ?Sized> {
    inner:  &'a mut W,
    /// Payload start; `None` for a raw (unprefixed) frame.
    begin:  Option<u64>,
    closed: bool,
}

impl<'a, W: Write + Seek + ?Sized> FrameWriter<'a, W> {
    pub fn open(inner: &'a mut W) -> Result<Self> {
        inner.write_i32::<LittleEndian>(LENGTH_PLACEHOLDER)?;
        let begin = position(&mut *inner)?;
        Ok(Self { inner, begin: Some(begin), closed: false })
    }

    pub fn open_raw(inner: &'a mut W) -> Self {
        Self { inner, begin: None, closed: false }
    }

    pub fn is_raw(&self) -> bool {
        self.begin.is_none()
    }

    fn backpatch(&mut self) -> Result<()> {
        let Some(begin) = self.begin else {
            return Ok(());
        };
        self.inner.flush()?;
        let end = position(&mut *self.inner)?;
        let written = i32::try_from(end - begin)
            .map_err(|_| ArchiveError::invalid(format!("frame of {} bytes is too large", end - begin)))?;
        self.inner.seek(SeekFrom::Start(begin - LENGTH_PREFIX_SIZE))?;
        self.inner.write_i32::<LittleEndian>(written)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.backpatch()
    }
}

impl<W: Write + Seek + ?Sized> Drop for FrameWriter<'_, W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.backpatch();
        }
    }
}

impl<W: Write + Seek + ?Sized> Write for FrameWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek + ?Sized> Seek for FrameWriter<'_, W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Run `body` inside a new frame on `writer`; the length is backpatched
/// even when `body` fails.
pub fn write_framed<W, T, F>(writer: &mut W, body: F) -> Result<T>
where
    W: Write + Seek + ?Sized,
    F: FnOnce(&mut FrameWriter<'_, W>) -> Result<T>,
{
    let mut frame = FrameWriter::open(writer)?;
    let result = body(&mut frame);
    let closed = frame.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Encode `body` into a fresh buffer wrapped in one frame.
pub fn frame_to_vec<F>(body: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut FrameWriter<'_, io::Cursor<Vec<u8>>>) -> Result<()>,
{
    let mut cursor = io::Cursor::new(Vec::new());
    write_framed(&mut cursor, body)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::wire::{WireRead, WireWrite};
    use super::*;
    use std::io::Cursor;

    fn sample_frame() -> Vec<u8> {
        frame_to_vec(|w| {
            w.write_i32::<LittleEndian>(7)?;
            w.write_string("seven")?;
            Ok(())
        })
        .unwrap()
    }

    fn read_sample(r: &mut FrameReader<'_, Cursor<Vec<u8>>>) -> Result<(i32, String)> {
        Ok((r.read_i32::<LittleEndian>()?, r.read_string()?))
    }

    fn set_declared(buf: &mut [u8], len: i32) {
        buf[..4].copy_from_slice(&len.to_le_bytes());
    }

    #[test]
    fn writer_backpatches_true_length() {
        let buf = sample_frame();
        assert_eq!(&buf[..4], &10i32.to_le_bytes());
        assert_eq!(buf.len(), 14);
    }

    #[test]
    fn strict_read_consumes_exactly() {
        let mut cur = Cursor::new(sample_frame());
        let v = read_framed(&mut cur, FrameMode::Strict, read_sample).unwrap();
        assert_eq!(v, (7, "seven".to_string()));
        assert_eq!(cur.position(), 14);
    }

    #[test]
    fn strict_rejects_extra_declared_byte() {
        let mut buf = sample_frame();
        buf.push(0xEE);
        set_declared(&mut buf, 11);
        let err = read_framed(&mut Cursor::new(buf), FrameMode::Strict, read_sample).unwrap_err();
        assert!(matches!(err, ArchiveError::FrameLengthMismatch { expected: 11, actual: 10 }));
    }

    #[test]
    fn strict_rejects_short_declared_length() {
        let mut buf = sample_frame();
        set_declared(&mut buf, 9);
        let err = read_framed(&mut Cursor::new(buf), FrameMode::Strict, read_sample).unwrap_err();
        assert!(matches!(err, ArchiveError::FrameLengthMismatch { expected: 9, actual: 10 }));
    }

    #[test]
    fn lenient_skips_unknown_trailing_bytes() {
        let mut buf = sample_frame();
        buf.extend_from_slice(&[1, 2, 3]);
        set_declared(&mut buf, 13);
        buf.push(0x42);
        let mut cur = Cursor::new(buf);
        let v = read_framed(&mut cur, FrameMode::Lenient, read_sample).unwrap();
        assert_eq!(v.0, 7);
        assert_eq!(cur.position(), 17);
        assert_eq!(cur.read_u8().unwrap(), 0x42);
    }

    #[test]
    fn lenient_rewinds_overread() {
        let mut buf = sample_frame();
        set_declared(&mut buf, 4);
        let mut cur = Cursor::new(buf);
        read_framed(&mut cur, FrameMode::Lenient, read_sample).unwrap();
        assert_eq!(cur.position(), 8);
    }

    #[test]
    fn raw_mode_reads_without_prefix() {
        let mut cur = Cursor::new(sample_frame()[4..].to_vec());
        let v = read_framed(&mut cur, FrameMode::Raw, read_sample).unwrap();
        assert_eq!(v.1, "seven");
    }

    #[test]
    fn failed_body_still_repositions_reader() {
        let mut buf = sample_frame();
        buf.push(0x99);
        let mut cur = Cursor::new(buf);
        let err = read_framed(&mut cur, FrameMode::Strict, |r| -> Result<()> {
            r.read_u8()?;
            Err(ArchiveError::invalid("boom"))
        })
        .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidData(_)));
        assert_eq!(cur.position(), 14);
        assert_eq!(cur.read_u8().unwrap(), 0x99);
    }

    #[test]
    fn failed_body_still_backpatches_writer() {
        let mut cur = Cursor::new(Vec::new());
        let err = write_framed(&mut cur, |w| -> Result<()> {
            w.write_u16::<LittleEndian>(0xBEEF)?;
            Err(ArchiveError::invalid("late failure"))
        });
        assert!(err.is_err());
        assert_eq!(&cur.get_ref()[..4], &2i32.to_le_bytes());
    }

    #[test]
    fn nested_frames_are_checked_independently() {
        let buf = frame_to_vec(|outer| {
            outer.write_bool(true)?;
            write_framed(outer, |inner| inner.write_int_list(&[1, 2, 3]))?;
            outer.write_u8(9)?;
            Ok(())
        })
        .unwrap();
        // outer: bool + (4 + 16) + u8
        assert_eq!(&buf[..4], &22i32.to_le_bytes());
        assert_eq!(&buf[5..9], &16i32.to_le_bytes());

        let mut cur = Cursor::new(buf);
        let (flag, list, tail) = read_framed(&mut cur, FrameMode::Strict, |outer| {
            let flag = outer.read_bool()?;
            let mode = outer.nested_mode();
            let list = read_framed(outer, mode, |inner| inner.read_int_list())?;
            Ok((flag, list, outer.read_u8()?))
        })
        .unwrap();
        assert!(flag);
        assert_eq!(list, [1, 2, 3]);
        assert_eq!(tail, 9);
    }

    #[test]
    fn negative_declared_length_is_invalid() {
        let mut cur = Cursor::new((-3i32).to_le_bytes().to_vec());
        let err = FrameReader::open(&mut cur, FrameMode::Strict).err().unwrap();
        assert!(matches!(err, ArchiveError::InvalidData(_)));
    }

    #[test]
    fn placeholder_survives_only_until_close() {
        let mut cur = Cursor::new(Vec::new());
        let mut frame = FrameWriter::open(&mut cur).unwrap();
        frame.write_all(&[0; 3]).unwrap();
        frame.close().unwrap();
        assert_ne!(&cur.get_ref()[..4], &LENGTH_PLACEHOLDER.to_le_bytes());
        assert_eq!(&cur.get_ref()[..4], &3i32.to_le_bytes());
    }
}
