use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::time::Ticks;

pub const LATEST_VERSION: i32 = 71;
pub const COMPATIBLE_VERSION: i32 = 5;
/// Demo builds wrote this version with an incompatible block layout.
pub const DEMO_VERSION: i32 = 42;
/// Marker for archives whose block payloads are length-framed.
pub const FRAMED_MARKER: i32 = 1;
pub const HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version:        i32,
    pub timestamp:      Ticks,
    pub framing_marker: i32,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Header {
    pub fn new() -> Self {
        Self {
            version:        LATEST_VERSION,
            timestamp:      Ticks::now_local(),
            framing_marker: FRAMED_MARKER,
        }
    }

    pub fn is_demo(&self) -> bool {
        self.version == DEMO_VERSION
    }

    pub fn is_compatible(&self) -> bool {
        is_compatible_version(self.version)
    }

    pub fn is_framed(&self) -> bool {
        self.framing_marker == FRAMED_MARKER
    }

    /// Always writes the latest version, the current time and the framed
    /// marker, whatever this header was loaded with.
    pub fn write<W: Write>(mut writer: W) -> io::Result<Header> {
        let header = Header::new();
        writer.write_i32::<LittleEndian>(header.version)?;
        writer.write_i64::<LittleEndian>(header.timestamp.0)?;
        writer.write_i32::<LittleEndian>(header.framing_marker)?;
        Ok(header)
    }

    /// Parses the fields without judging them; see [`Header::is_compatible`].
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            version:        reader.read_i32::<LittleEndian>()?,
            timestamp:      Ticks(reader.read_i64::<LittleEndian>()?),
            framing_marker: reader.read_i32::<LittleEndian>()?,
        })
    }
}

pub fn is_compatible_version(version: i32) -> bool {
    (COMPATIBLE_VERSION..=LATEST_VERSION).contains(&version) && version != DEMO_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn compatibility_window() {
        assert!(is_compatible_version(LATEST_VERSION));
        assert!(is_compatible_version(COMPATIBLE_VERSION));
        assert!(is_compatible_version(41));
        assert!(!is_compatible_version(4));
        assert!(!is_compatible_version(DEMO_VERSION));
        assert!(!is_compatible_version(72));
        assert!(!is_compatible_version(-1));
    }

    #[test]
    fn write_emits_latest_layout() {
        let mut buf = Vec::new();
        let written = Header::write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[..4], &LATEST_VERSION.to_le_bytes());
        assert_eq!(&buf[12..], &FRAMED_MARKER.to_le_bytes());

        let back = Header::read(Cursor::new(&buf)).unwrap();
        assert_eq!(back, written);
        assert!(back.is_compatible());
        assert!(back.is_framed());
    }

    #[test]
    fn read_keeps_foreign_fields() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&DEMO_VERSION.to_le_bytes());
        buf.extend_from_slice(&1234i64.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        let h = Header::read(Cursor::new(buf)).unwrap();
        assert_eq!(h.timestamp, Ticks(1234));
        assert!(h.is_demo());
        assert!(!h.is_compatible());
        assert!(!h.is_framed());
    }
}
