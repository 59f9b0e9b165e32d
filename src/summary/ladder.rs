//! Revision ladder for decoding [`Summary`] payloads.
//!
//! Each rung names one field in wire order and the first revision that
//! stores it.  Decoding walks the table top to bottom: a rung at or below
//! the record's revision reads its field, a newer rung applies its default
//! instead.  Fields whose wire shape changed over time pick the shape
//! inside their `read` function.  Adding a revision means adding or
//! editing a rung; earlier rungs are untouched.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use tracing::trace;

use super::appearance::AppearData;
use super::identity::PlayerIdentity;
use super::{revision, Gender, Summary, NO_SUB_MODEL, SUB_MODEL_SLOTS};
use crate::error::{ArchiveError, Result};
use crate::frame::wire::WireRead;
use crate::time::Ticks;

/// Present in every revision.
const ALWAYS: i32 = i32::MIN;

type ReadFn = fn(&mut dyn Read, i32, &mut Summary) -> Result<()>;
type AbsentFn = fn(&mut Summary);

pub(super) struct Rung {
    pub field:  &'static str,
    pub since:  i32,
    pub read:   ReadFn,
    pub absent: AbsentFn,
}

const fn rung(field: &'static str, since: i32, read: ReadFn, absent: AbsentFn) -> Rung {
    Rung { field, since, read, absent }
}

fn always_present(_: &mut Summary) {}

// ── Defaults for fields older revisions lack ─────────────────────────────────

fn no_dlc_require(s: &mut Summary) {
    s.dlc_require.clear();
}

fn default_gender(s: &mut Summary) {
    s.gender = Gender::Male;
}

fn story_not_done(s: &mut Summary) {
    s.main_story_done = false;
}

fn no_equip_paths(s: &mut Summary) {
    s.equip_paths = None;
}

fn no_nude_paths(s: &mut Summary) {
    s.nude_paths = None;
}

fn no_sub_models(s: &mut Summary) {
    s.sub_model_ids = [NO_SUB_MODEL; SUB_MODEL_SLOTS];
}

fn no_appear_data(s: &mut Summary) {
    s.appear_data = None;
}

fn no_tattoo(s: &mut Summary) {
    s.tattoo = None;
}

pub(super) const SUMMARY: &[Rung] = &[
    rung("dlc_require",     revision::DLC_REQUIRE,  read_dlc_require,     no_dlc_require),
    rung("identity",        ALWAYS,                 read_identity,        always_present),
    rung("player_name",     ALWAYS,                 read_player_name,     always_present),
    rung("gender",          revision::GENDER,       read_gender,          default_gender),
    rung("level",           ALWAYS,                 read_level,           always_present),
    rung("money",           ALWAYS,                 read_money,           always_present),
    rung("workshop_name",   ALWAYS,                 read_workshop_name,   always_present),
    rung("appearance",      revision::APPEARANCE,   read_appearance,      clear_appearance),
    rung("workshop_level",  ALWAYS,                 read_workshop_level,  always_present),
    rung("game_time",       ALWAYS,                 read_game_time,       always_present),
    rung("system_time",     ALWAYS,                 read_system_time,     always_present),
    rung("played_time",     ALWAYS,                 read_played_time,     always_present),
    rung("main_story_done", revision::MAIN_STORY,   read_main_story,      story_not_done),
    rung("figure_preview",  ALWAYS,                 read_figure_preview,  always_present),
    rung("reserved",        ALWAYS,                 skip_reserved,        always_present),
];

/// Only consulted once the appearance rung itself is present.
const APPEARANCE: &[Rung] = &[
    rung("equip_paths",   revision::APPEARANCE,     read_equip_paths,  no_equip_paths),
    rung("nude_paths",    revision::NULLABLE_PATHS, read_nude_paths,   no_nude_paths),
    rung("sub_model_ids", revision::NULLABLE_PATHS, read_sub_models,   no_sub_models),
    rung("appear_data",   revision::APPEARANCE,     read_appear_data,  no_appear_data),
    rung("tattoo",        revision::TATTOO,         read_tattoo,       no_tattoo),
];

pub(super) fn apply(ladder: &[Rung], reader: &mut dyn Read, rev: i32, target: &mut Summary) -> Result<()> {
    for rung in ladder {
        if rev >= rung.since {
            (rung.read)(reader, rev, target)?;
            trace!(field = rung.field, rev, "read");
        } else {
            (rung.absent)(target);
            trace!(field = rung.field, rev, since = rung.since, "defaulted");
        }
    }
    Ok(())
}

// ── Rungs ────────────────────────────────────────────────────────────────────

fn read_dlc_require(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.dlc_require = r.read_int_list()?;
    Ok(())
}

fn read_identity(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.identity = PlayerIdentity::read(r)?;
    Ok(())
}

fn read_player_name(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.player_name = r.read_nullable_string()?;
    Ok(())
}

fn read_gender(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.gender = Gender::from(r.read_i32::<LittleEndian>()?);
    Ok(())
}

fn read_level(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.level = r.read_i32::<LittleEndian>()?;
    Ok(())
}

fn read_money(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.money = r.read_i32::<LittleEndian>()?;
    Ok(())
}

fn read_workshop_name(r: &mut dyn Read, rev: i32, s: &mut Summary) -> Result<()> {
    if rev < revision::WORKSHOP_NAME_FLAG {
        s.workshop_name_set = false;
        s.workshop_name = Some(r.read_string()?);
    } else {
        s.workshop_name_set = r.read_bool()?;
        s.workshop_name = r.read_nullable_string()?;
    }
    Ok(())
}

fn read_appearance(r: &mut dyn Read, rev: i32, s: &mut Summary) -> Result<()> {
    apply(APPEARANCE, r, rev, s)
}

fn clear_appearance(s: &mut Summary) {
    for rung in APPEARANCE {
        (rung.absent)(s);
    }
}

fn read_path_list(r: &mut dyn Read, nullable: bool) -> Result<Vec<Option<String>>> {
    let count = r.read_i32::<LittleEndian>()?;
    let count = usize::try_from(count)
        .map_err(|_| ArchiveError::invalid(format!("negative path count {count}")))?;
    let mut paths = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        paths.push(if nullable { r.read_nullable_string()? } else { Some(r.read_string()?) });
    }
    Ok(paths)
}

fn read_equip_paths(r: &mut dyn Read, rev: i32, s: &mut Summary) -> Result<()> {
    s.equip_paths = Some(read_path_list(r, rev >= revision::NULLABLE_PATHS)?);
    Ok(())
}

fn read_nude_paths(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.nude_paths = Some(read_path_list(r, true)?);
    Ok(())
}

fn read_sub_models(r: &mut dyn Read, rev: i32, s: &mut Summary) -> Result<()> {
    // Three stored ids belong in the upper half of the slots.
    let first = if rev >= revision::SIX_SUB_MODELS { 0 } else { SUB_MODEL_SLOTS / 2 };
    s.sub_model_ids = [NO_SUB_MODEL; SUB_MODEL_SLOTS];
    for slot in &mut s.sub_model_ids[first..] {
        *slot = r.read_i32::<LittleEndian>()?;
    }
    Ok(())
}

fn read_appear_data(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.appear_data = Some(AppearData::read(r)?);
    Ok(())
}

fn read_tattoo(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.tattoo = r.read_nullable_string()?;
    Ok(())
}

fn read_workshop_level(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.workshop_level = r.read_string()?;
    Ok(())
}

fn read_game_time(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.game_time = r.read_i64::<LittleEndian>()?;
    Ok(())
}

fn read_system_time(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.system_time = Ticks(r.read_i64::<LittleEndian>()?);
    Ok(())
}

fn read_played_time(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.played_time = Ticks(r.read_i64::<LittleEndian>()?);
    Ok(())
}

fn read_main_story(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.main_story_done = r.read_bool()?;
    Ok(())
}

fn read_figure_preview(r: &mut dyn Read, _: i32, s: &mut Summary) -> Result<()> {
    s.figure_preview = r.read_blob()?;
    Ok(())
}

fn skip_reserved(r: &mut dyn Read, _: i32, _: &mut Summary) -> Result<()> {
    r.read_blob()?;
    Ok(())
}
