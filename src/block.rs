use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::checksum::crc64;
use crate::error::{ArchiveError, Result};
use crate::frame::wire::{WireRead, WireWrite};

/// One block table entry as it sits on disk:
/// `key:string, length:i32, payload:[u8; length], checksum:u64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub key:      String,
    pub payload:  Vec<u8>,
    pub checksum: u64,
}

impl BlockEntry {
    /// Reads one entry and verifies its checksum.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let key = reader.read_string()?;
        let len = reader.read_i32::<LittleEndian>()?;
        let len = usize::try_from(len)
            .map_err(|_| ArchiveError::invalid(format!("block '{key}' has negative length {len}")))?;
        let mut payload = Vec::new();
        (&mut reader).take(len as u64).read_to_end(&mut payload)?;
        if payload.len() != len {
            return Err(ArchiveError::invalid(format!(
                "block '{key}' truncated: {} of {len} bytes present",
                payload.len()
            )));
        }
        let expected = reader.read_u64::<LittleEndian>()?;
        let actual = crc64(&payload);
        if actual != expected {
            return Err(ArchiveError::BlockChecksumMismatch { key, expected, actual });
        }
        Ok(Self { key, payload, checksum: expected })
    }
}

/// Writes an entry with a freshly computed checksum.
pub fn write_block<W: Write>(mut writer: W, key: &str, payload: &[u8]) -> Result<()> {
    let len = i32::try_from(payload.len())
        .map_err(|_| ArchiveError::invalid(format!("block '{key}' too large: {} bytes", payload.len())))?;
    writer.write_string(key)?;
    writer.write_i32::<LittleEndian>(len)?;
    writer.write_all(payload)?;
    writer.write_u64::<LittleEndian>(crc64(payload))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded(key: &str, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_block(&mut buf, key, payload).unwrap();
        buf
    }

    #[test]
    fn entry_layout() {
        let buf = encoded("Summary", &[1, 2, 3]);
        assert_eq!(buf[0], 7);
        assert_eq!(&buf[1..8], b"Summary");
        assert_eq!(&buf[8..12], &3i32.to_le_bytes());
        assert_eq!(&buf[12..15], &[1, 2, 3]);
        assert_eq!(&buf[15..], &crc64(&[1, 2, 3]).to_le_bytes());
    }

    #[test]
    fn read_verifies_checksum() {
        let entry = BlockEntry::read(Cursor::new(encoded("Player", b"payload"))).unwrap();
        assert_eq!(entry.key, "Player");
        assert_eq!(entry.payload, b"payload");
        assert_eq!(entry.checksum, crc64(b"payload"));
    }

    #[test]
    fn corrupted_payload_names_the_block() {
        let mut buf = encoded("Player", b"payload");
        buf[12] ^= 0xFF;
        match BlockEntry::read(Cursor::new(buf)) {
            Err(ArchiveError::BlockChecksumMismatch { key, .. }) => assert_eq!(key, "Player"),
            other => panic!("expected checksum mismatch, got {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_is_invalid() {
        // key (1 + 6) + length (4) + 3 of 7 payload bytes
        let mut buf = encoded("Player", b"payload");
        buf.truncate(14);
        assert!(matches!(BlockEntry::read(Cursor::new(buf)), Err(ArchiveError::InvalidData(_))));
    }

    #[test]
    fn truncated_length_field_is_eof() {
        let mut buf = encoded("Player", b"payload");
        buf.truncate(10);
        assert!(matches!(BlockEntry::read(Cursor::new(buf)), Err(ArchiveError::Io(_))));
    }
}
