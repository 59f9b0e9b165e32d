//! Little-endian primitive codec shared by every frame and record.
//!
//! Fixed-width integers and floats come straight from `byteorder`
//! (`read_i32::<LittleEndian>()` and friends).  The extension traits here
//! add the compound shapes the archive uses on top of them:
//!
//! | Shape           | Encoding                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | bool            | 1 byte, non-zero = true                                   |
//! | string          | 7-bit variable-length byte count (≤ 5 bytes) + UTF-8       |
//! | nullable string | bool "is null", then string when not null                 |
//! | blob            | i32 byte count + bytes; count ≤ 0 reads as absent         |
//! | int list        | i32 count + i32 values                                    |
//! | color / color3  | 4 × f32 RGBA / 3 × f32 RGB (alpha = 1 on read)            |
//! | string map      | i32 count + (string, string) pairs via `FromStr`/`Display` |
//! | JSON list       | i32 count + one JSON document per element, as strings      |

use std::fmt::Display;
use std::io::{Read, Write};
use std::str::FromStr;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

/// RGBA color with `f32` channels.  Defaults to opaque black, the value
/// an RGB-only field reads back as.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

// ── Reading ──────────────────────────────────────────────────────────────────

fn read_exact_vec<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    // Grow with the data instead of trusting a possibly corrupt length.
    let mut buf = Vec::new();
    Read::take(&mut *reader, len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(ArchiveError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, stream ended after {}", buf.len()),
        )));
    }
    Ok(buf)
}

fn read_count<R: Read + ?Sized>(reader: &mut R, what: &str) -> Result<usize> {
    let count = reader.read_i32::<LittleEndian>()?;
    usize::try_from(count).map_err(|_| ArchiveError::invalid(format!("negative {what} count {count}")))
}

pub trait WireRead: Read {
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Variable-length unsigned prefix, 7 bits per byte, low groups first.
    fn read_7bit_len(&mut self) -> Result<usize> {
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            if shift == 28 && byte > 0x0F {
                return Err(ArchiveError::invalid("7-bit encoded length overflows 32 bits"));
            }
            value |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return i32::try_from(value)
                    .map(|v| v as usize)
                    .map_err(|_| ArchiveError::invalid(format!("string length {value} is negative")));
            }
        }
        Err(ArchiveError::invalid("7-bit encoded length is longer than 5 bytes"))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_7bit_len()?;
        let bytes = read_exact_vec(self, len)?;
        String::from_utf8(bytes).map_err(|e| ArchiveError::invalid(format!("string is not UTF-8: {e}")))
    }

    fn read_nullable_string(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            Ok(None)
        } else {
            self.read_string().map(Some)
        }
    }

    fn read_blob(&mut self) -> Result<Option<Vec<u8>>> {
        let count = self.read_i32::<LittleEndian>()?;
        if count <= 0 {
            return Ok(None);
        }
        read_exact_vec(self, count as usize).map(Some)
    }

    fn read_int_list(&mut self) -> Result<Vec<i32>> {
        let count = read_count(self, "int list")?;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(self.read_i32::<LittleEndian>()?);
        }
        Ok(out)
    }

    fn read_color(&mut self) -> Result<Color> {
        Ok(Color {
            r: self.read_f32::<LittleEndian>()?,
            g: self.read_f32::<LittleEndian>()?,
            b: self.read_f32::<LittleEndian>()?,
            a: self.read_f32::<LittleEndian>()?,
        })
    }

    fn read_color3(&mut self) -> Result<Color> {
        Ok(Color::rgb(
            self.read_f32::<LittleEndian>()?,
            self.read_f32::<LittleEndian>()?,
            self.read_f32::<LittleEndian>()?,
        ))
    }

    fn read_string_map<K, V>(&mut self) -> Result<Vec<(K, V)>>
    where
        K: FromStr,
        V: FromStr,
    {
        let count = read_count(self, "map")?;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let k = self.read_string()?;
            let v = self.read_string()?;
            let key = k.parse().map_err(|_| ArchiveError::invalid(format!("unparsable map key '{k}'")))?;
            let value = v.parse().map_err(|_| ArchiveError::invalid(format!("unparsable map value '{v}'")))?;
            out.push((key, value));
        }
        Ok(out)
    }

    fn read_json_list<T: DeserializeOwned>(&mut self) -> Result<Vec<T>> {
        let count = read_count(self, "JSON list")?;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let doc = self.read_string()?;
            out.push(serde_json::from_str(&doc)?);
        }
        Ok(out)
    }
}

impl<R: Read + ?Sized> WireRead for R {}

// ── Writing ──────────────────────────────────────────────────────────────────

fn write_count<W: Write + ?Sized>(writer: &mut W, count: usize, what: &str) -> Result<()> {
    let count = i32::try_from(count).map_err(|_| ArchiveError::invalid(format!("{what} too long: {count}")))?;
    writer.write_i32::<LittleEndian>(count)?;
    Ok(())
}

pub trait WireWrite: Write {
    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)?;
        Ok(())
    }

    fn write_7bit_len(&mut self, len: usize) -> Result<()> {
        let mut value = u32::try_from(len)
            .ok()
            .filter(|&v| v <= i32::MAX as u32)
            .ok_or_else(|| ArchiveError::invalid(format!("string too long: {len} bytes")))?;
        while value >= 0x80 {
            self.write_u8((value as u8) | 0x80)?;
            value >>= 7;
        }
        self.write_u8(value as u8)?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_7bit_len(value.len())?;
        self.write_all(value.as_bytes())?;
        Ok(())
    }

    /// `None` and the empty string both encode as null.
    fn write_nullable_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(s) if !s.is_empty() => {
                self.write_bool(false)?;
                self.write_string(s)
            }
            _ => self.write_bool(true),
        }
    }

    fn write_blob(&mut self, value: Option<&[u8]>) -> Result<()> {
        let bytes = value.unwrap_or_default();
        write_count(self, bytes.len(), "blob")?;
        self.write_all(bytes)?;
        Ok(())
    }

    fn write_int_list(&mut self, values: &[i32]) -> Result<()> {
        write_count(self, values.len(), "int list")?;
        for &v in values {
            self.write_i32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    fn write_color(&mut self, c: Color) -> Result<()> {
        self.write_color3(c)?;
        self.write_f32::<LittleEndian>(c.a)?;
        Ok(())
    }

    fn write_color3(&mut self, c: Color) -> Result<()> {
        self.write_f32::<LittleEndian>(c.r)?;
        self.write_f32::<LittleEndian>(c.g)?;
        self.write_f32::<LittleEndian>(c.b)?;
        Ok(())
    }

    fn write_string_map<K: Display, V: Display>(&mut self, entries: &[(K, V)]) -> Result<()> {
        write_count(self, entries.len(), "map")?;
        for (k, v) in entries {
            self.write_string(&k.to_string())?;
            self.write_string(&v.to_string())?;
        }
        Ok(())
    }

    fn write_json_list<T: Serialize>(&mut self, items: &[T]) -> Result<()> {
        write_count(self, items.len(), "JSON list")?;
        for item in items {
            self.write_string(&serde_json::to_string(item)?)?;
        }
        Ok(())
    }
}

impl<W: Write + ?Sized> WireWrite for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        buf
    }

    #[test]
    fn seven_bit_prefix_layout() {
        assert_eq!(encoded(|w| w.write_7bit_len(0)), [0x00]);
        assert_eq!(encoded(|w| w.write_7bit_len(127)), [0x7F]);
        assert_eq!(encoded(|w| w.write_7bit_len(128)), [0x80, 0x01]);
        assert_eq!(encoded(|w| w.write_7bit_len(300)), [0xAC, 0x02]);
        assert_eq!(
            encoded(|w| w.write_7bit_len(i32::MAX as usize)),
            [0xFF, 0xFF, 0xFF, 0xFF, 0x07]
        );
    }

    #[test]
    fn seven_bit_prefix_rejects_overlong_input() {
        let mut r = Cursor::new(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x1F]);
        assert!(matches!(r.read_7bit_len(), Err(ArchiveError::InvalidData(_))));
        let mut r = Cursor::new(vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(r.read_7bit_len().is_err());
    }

    #[test]
    fn long_string_uses_multibyte_prefix() {
        let s = "é".repeat(100);
        let buf = encoded(|w| w.write_string(&s));
        assert_eq!(&buf[..2], &[0xC8, 0x01]);
        assert_eq!(Cursor::new(buf).read_string().unwrap(), s);
    }

    #[test]
    fn nullable_string_treats_empty_as_null() {
        assert_eq!(encoded(|w| w.write_nullable_string(Some(""))), [1]);
        assert_eq!(encoded(|w| w.write_nullable_string(None)), [1]);
        let buf = encoded(|w| w.write_nullable_string(Some("Ada")));
        assert_eq!(buf, [0, 3, b'A', b'd', b'a']);
        assert_eq!(Cursor::new(buf).read_nullable_string().unwrap().as_deref(), Some("Ada"));
    }

    #[test]
    fn non_positive_blob_count_reads_as_absent() {
        let mut r = Cursor::new((-4i32).to_le_bytes().to_vec());
        assert_eq!(r.read_blob().unwrap(), None);
        let buf = encoded(|w| w.write_blob(Some(&[][..])));
        assert_eq!(buf, 0i32.to_le_bytes());
        assert_eq!(Cursor::new(buf).read_blob().unwrap(), None);
    }

    #[test]
    fn truncated_blob_is_eof() {
        let mut buf = 10i32.to_le_bytes().to_vec();
        buf.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(Cursor::new(buf).read_blob(), Err(ArchiveError::Io(_))));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut r = Cursor::new(vec![2, 0xC3, 0x28]);
        assert!(matches!(r.read_string(), Err(ArchiveError::InvalidData(_))));
    }

    #[test]
    fn color3_reads_opaque_alpha() {
        let c = Color { r: 0.25, g: 0.5, b: 0.75, a: 0.1 };
        let buf = encoded(|w| w.write_color3(c));
        assert_eq!(buf.len(), 12);
        assert_eq!(Cursor::new(buf).read_color3().unwrap(), Color::rgb(0.25, 0.5, 0.75));
        let buf = encoded(|w| w.write_color(c));
        assert_eq!(Cursor::new(buf).read_color().unwrap(), c);
    }

    #[test]
    fn default_color_survives_color3() {
        let buf = encoded(|w| w.write_color3(Color::default()));
        assert_eq!(Cursor::new(buf).read_color3().unwrap(), Color::default());
    }

    #[test]
    fn string_map_parses_through_from_str() {
        let buf = encoded(|w| w.write_string_map(&[(4u32, -2i64), (7, 9)]));
        let back: Vec<(u32, i64)> = Cursor::new(buf).read_string_map().unwrap();
        assert_eq!(back, [(4, -2), (7, 9)]);
    }

    #[test]
    fn json_list_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Item {
            id:   u32,
            name: String,
        }
        let items = vec![Item { id: 1, name: "axe".into() }, Item { id: 2, name: "saw".into() }];
        let buf = encoded(|w| w.write_json_list(&items));
        let back: Vec<Item> = Cursor::new(buf).read_json_list().unwrap();
        assert_eq!(back, items);
    }

    #[test]
    fn negative_list_count_is_invalid() {
        let mut r = Cursor::new((-1i32).to_le_bytes().to_vec());
        assert!(matches!(r.read_int_list(), Err(ArchiveError::InvalidData(_))));
    }
}
