//! Fixed-shape appearance arrays.
//!
//! Element counts are stored on disk even though the arrays never change
//! size, so a reader accepts any count up to the capacity and leaves the
//! remaining slots at their defaults.  A writer always emits full arrays.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{Read, Write};

use crate::error::{ArchiveError, Result};
use crate::frame::wire::{Color, WireRead, WireWrite};

pub const PART_FACTOR_CAPACITY: usize = 19;
pub const PART_COLOR_CAPACITY: usize = 7;
pub const COLORS_PER_PART: usize = 2;

fn read_bounded_count<R: Read + ?Sized>(reader: &mut R, field: &'static str, capacity: usize) -> Result<usize> {
    let count = reader.read_i32::<LittleEndian>()?;
    let count = usize::try_from(count)
        .map_err(|_| ArchiveError::invalid(format!("{field}: negative count {count}")))?;
    if count > capacity {
        return Err(ArchiveError::CapacityExceeded { field, count, capacity });
    }
    Ok(count)
}

/// Pair of RGB colors for one body part; stored without alpha.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ColorCombine {
    pub colors: [Color; COLORS_PER_PART],
}

impl ColorCombine {
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut colors = [Color::default(); COLORS_PER_PART];
        for c in &mut colors {
            *c = reader.read_color3()?;
        }
        Ok(Self { colors })
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for c in &self.colors {
            writer.write_color3(*c)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppearData {
    pub part_factors: [f32; PART_FACTOR_CAPACITY],
    pub part_colors:  [ColorCombine; PART_COLOR_CAPACITY],
}

impl AppearData {
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut data = AppearData::default();

        let factors = read_bounded_count(reader, "part factors", PART_FACTOR_CAPACITY)?;
        for slot in &mut data.part_factors[..factors] {
            *slot = reader.read_f32::<LittleEndian>()?;
        }

        let colors = read_bounded_count(reader, "part colors", PART_COLOR_CAPACITY)?;
        for slot in &mut data.part_colors[..colors] {
            *slot = ColorCombine::read(reader)?;
        }
        Ok(data)
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<LittleEndian>(PART_FACTOR_CAPACITY as i32)?;
        for &f in &self.part_factors {
            writer.write_f32::<LittleEndian>(f)?;
        }
        writer.write_i32::<LittleEndian>(PART_COLOR_CAPACITY as i32)?;
        for part in &self.part_colors {
            part.write(writer)?;
        }
        Ok(())
    }
}
