use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{Read, Write};
use uuid::Uuid;

use crate::error::{ArchiveError, Result};
use crate::frame::wire::{WireRead, WireWrite};
use crate::time::Ticks;

/// Who a save belongs to: a GUID plus the moment the character was created.
/// Two identities are equal only when both parts match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerIdentity {
    guid:    Uuid,
    created: Ticks,
}

impl PlayerIdentity {
    pub fn new(guid: Uuid, created: Ticks) -> Self {
        Self { guid, created }
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn created(&self) -> Ticks {
        self.created
    }

    /// GUID blob (mixed-endian field order) followed by creation ticks.
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let bytes = reader.read_blob()?.unwrap_or_default();
        let bytes: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ArchiveError::invalid(format!("player GUID must be 16 bytes, got {}", bytes.len())))?;
        let created = Ticks(reader.read_i64::<LittleEndian>()?);
        Ok(Self { guid: Uuid::from_bytes_le(bytes), created })
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_blob(Some(&self.guid.to_bytes_le()[..]))?;
        writer.write_i64::<LittleEndian>(self.created.0)?;
        Ok(())
    }
}
