//! Player summary: the small per-save record shown in the load menu.
//!
//! # Wire layout
//! ```text
//! revision: i32
//! payload:  blob  ── itself a frame holding the fields below
//! ```
//!
//! The fields inside the payload depend on `revision`; the revision ladder holds
//! the full table.  Decoding accepts every revision up to
//! [`CURRENT_REVISION`] and rejects anything newer.  Encoding always writes
//! the current layout tagged with [`CURRENT_REVISION`], so a record that is
//! fetched and stored again loses its historical shape for good.

pub mod appearance;
pub mod identity;
mod ladder;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{Cursor, Read, Seek, Write};

use crate::archive::Record;
use crate::error::{ArchiveError, Result};
use crate::frame::wire::{WireRead, WireWrite};
use crate::frame::{read_framed, write_framed, FrameReader, FrameWriter};
use crate::time::Ticks;

pub use appearance::{AppearData, ColorCombine};
pub use identity::PlayerIdentity;

pub const CURRENT_REVISION: i32 = 201901040;

/// First revision at which each field (or field shape) appears.
pub mod revision {
    pub const GENDER: i32 = 201711280;
    /// Workshop name became flag + nullable string.
    pub const WORKSHOP_NAME_FLAG: i32 = 201711281;
    pub const APPEARANCE: i32 = 201801150;
    /// Nullable equip paths, nude paths and three sub-model ids.
    pub const NULLABLE_PATHS: i32 = 201810100;
    pub const TATTOO: i32 = 201812100;
    pub const DLC_REQUIRE: i32 = 201812210;
    pub const SIX_SUB_MODELS: i32 = 201812250;
    pub const MAIN_STORY: i32 = 201901040;
}

pub const SUB_MODEL_SLOTS: usize = 6;
pub const NO_SUB_MODEL: i32 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
    /// Any other stored value, kept so it is written back unchanged.
    Other(i32),
}

impl From<i32> for Gender {
    fn from(v: i32) -> Self {
        match v {
            0 => Gender::Male,
            1 => Gender::Female,
            other => Gender::Other(other),
        }
    }
}

impl From<Gender> for i32 {
    fn from(g: Gender) -> Self {
        match g {
            Gender::Male => 0,
            Gender::Female => 1,
            Gender::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Content packs the save needs before the game will load it.
    pub dlc_require:       Vec<i32>,
    pub identity:          PlayerIdentity,
    pub player_name:       Option<String>,
    pub gender:            Gender,
    pub level:             i32,
    pub money:             i32,
    pub workshop_name_set: bool,
    pub workshop_name:     Option<String>,
    /// `None` for records older than the appearance data.
    pub equip_paths:       Option<Vec<Option<String>>>,
    pub nude_paths:        Option<Vec<Option<String>>>,
    pub sub_model_ids:     [i32; SUB_MODEL_SLOTS],
    pub appear_data:       Option<AppearData>,
    pub tattoo:            Option<String>,
    pub workshop_level:    String,
    pub game_time:         i64,
    pub system_time:       Ticks,
    pub played_time:       Ticks,
    pub main_story_done:   bool,
    /// Opaque preview image data.
    pub figure_preview:    Option<Vec<u8>>,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            dlc_require:       Vec::new(),
            identity:          PlayerIdentity::default(),
            player_name:       None,
            gender:            Gender::Male,
            level:             0,
            money:             0,
            workshop_name_set: false,
            workshop_name:     None,
            equip_paths:       None,
            nude_paths:        None,
            sub_model_ids:     [NO_SUB_MODEL; SUB_MODEL_SLOTS],
            appear_data:       None,
            tattoo:            None,
            workshop_level:    String::new(),
            game_time:         0,
            system_time:       Ticks::default(),
            played_time:       Ticks::default(),
            main_story_done:   false,
            figure_preview:    None,
        }
    }
}

fn check_revision(revision: i32) -> Result<()> {
    if revision > CURRENT_REVISION {
        return Err(ArchiveError::UnsupportedRecordRevision { revision, latest: CURRENT_REVISION });
    }
    Ok(())
}

fn write_path_list<W: Write + ?Sized>(w: &mut W, paths: Option<&[Option<String>]>) -> Result<()> {
    let paths = paths.unwrap_or_default();
    let count = i32::try_from(paths.len()).map_err(|_| ArchiveError::invalid("too many paths"))?;
    w.write_i32::<LittleEndian>(count)?;
    for p in paths {
        w.write_nullable_string(p.as_deref())?;
    }
    Ok(())
}

impl Summary {
    /// Decode the inner field payload stored at `revision`.
    pub fn decode_payload<R: Read>(reader: &mut R, revision: i32) -> Result<Self> {
        check_revision(revision)?;
        let mut summary = Summary::default();
        ladder::apply(ladder::SUMMARY, reader, revision, &mut summary)?;
        Ok(summary)
    }

    /// Write every field in the current layout.
    pub fn encode_payload<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_int_list(&self.dlc_require)?;
        self.identity.write(w)?;
        w.write_nullable_string(self.player_name.as_deref())?;
        w.write_i32::<LittleEndian>(self.gender.into())?;
        w.write_i32::<LittleEndian>(self.level)?;
        w.write_i32::<LittleEndian>(self.money)?;
        w.write_bool(self.workshop_name_set)?;
        w.write_nullable_string(self.workshop_name.as_deref())?;

        write_path_list(w, self.equip_paths.as_deref())?;
        write_path_list(w, self.nude_paths.as_deref())?;
        for &id in &self.sub_model_ids {
            w.write_i32::<LittleEndian>(id)?;
        }
        match &self.appear_data {
            Some(data) => data.write(w)?,
            None => AppearData::default().write(w)?,
        }
        w.write_nullable_string(self.tattoo.as_deref())?;

        w.write_string(&self.workshop_level)?;
        w.write_i64::<LittleEndian>(self.game_time)?;
        w.write_i64::<LittleEndian>(self.system_time.0)?;
        w.write_i64::<LittleEndian>(self.played_time.0)?;
        w.write_bool(self.main_story_done)?;
        w.write_blob(self.figure_preview.as_deref())?;
        // Reserved; always empty.
        w.write_blob(None)?;
        Ok(())
    }
}

impl Record for Summary {
    fn decode<R: Read + Seek + ?Sized>(reader: &mut FrameReader<'_, R>) -> Result<Self> {
        let revision = reader.read_i32::<LittleEndian>()?;
        check_revision(revision)?;
        let payload = reader
            .read_blob()?
            .ok_or_else(|| ArchiveError::invalid("summary payload is empty"))?;
        let mut inner = Cursor::new(payload.as_slice());
        read_framed(&mut inner, reader.nested_mode(), |r| Summary::decode_payload(r, revision))
    }

    fn encode<W: Write + Seek + ?Sized>(&self, writer: &mut FrameWriter<'_, W>) -> Result<()> {
        let mut inner = Cursor::new(Vec::with_capacity(512));
        if writer.is_raw() {
            self.encode_payload(&mut inner)?;
        } else {
            write_framed(&mut inner, |w| self.encode_payload(w))?;
        }
        writer.write_i32::<LittleEndian>(CURRENT_REVISION)?;
        writer.write_blob(Some(inner.get_ref().as_slice()))?;
        Ok(())
    }
}
