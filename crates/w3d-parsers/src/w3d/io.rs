// w3d-parsers/src/w3d/io.rs
//! Little-endian primitives shared by the record layouts.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use w3d_core::{Quat, Rgb, Vec2, Vec3};

use crate::traits::{ParseError, ParseResult};

/// Width of the short name fields (mesh, hierarchy, HLOD and animation names)
pub const NAME_LEN: usize = 16;
/// Width of the long name fields (sub-objects, aggregates, shapes)
pub const LONG_NAME_LEN: usize = 32;

/// A fixed-size record that can be read from and written to a payload.
pub trait Record: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode one record
    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self>;

    /// Encode one record, writing exactly [`Record::SIZE`] bytes
    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()>;
}

/// Decode a payload made of back-to-back records.
pub fn read_array<T: Record>(payload: &[u8], what: &str) -> ParseResult<Vec<T>> {
    if payload.len() % T::SIZE != 0 {
        return Err(ParseError::CorruptedData {
            offset: 0,
            message: format!(
                "{what} payload of {} bytes is not a multiple of {}",
                payload.len(),
                T::SIZE
            ),
        });
    }

    let mut rdr = Cursor::new(payload);
    (0..payload.len() / T::SIZE).map(|_| T::read(&mut rdr)).collect()
}

/// Encode records back-to-back.
pub fn write_array<T: Record, W: Write>(items: &[T], wtr: &mut W) -> ParseResult<()> {
    for item in items {
        item.write(wtr)?;
    }
    Ok(())
}

/// Bytes up to the first NUL, decoded as UTF-8 (lossy).
pub fn decode_cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// The string followed by a single NUL terminator.
pub fn encode_cstr(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

/// Read a NUL-padded string field of `len` bytes.
pub fn read_fixed_str<R: Read>(rdr: &mut R, len: usize) -> ParseResult<String> {
    let mut buf = vec![0u8; len];
    rdr.read_exact(&mut buf)?;
    Ok(decode_cstr(&buf))
}

/// Write `s` into a NUL-padded field of `len` bytes.
///
/// Strings longer than `len - 1` bytes are cut at the last character
/// boundary that still leaves room for the terminator.
pub fn write_fixed_str<W: Write>(wtr: &mut W, s: &str, len: usize) -> ParseResult<()> {
    let mut end = s.len().min(len.saturating_sub(1));
    while !s.is_char_boundary(end) {
        end -= 1;
    }

    let mut buf = vec![0u8; len];
    buf[..end].copy_from_slice(&s.as_bytes()[..end]);
    wtr.write_all(&buf)?;
    Ok(())
}

/// Skip `count` padding bytes.
pub fn skip<R: Read>(rdr: &mut R, count: usize) -> ParseResult<()> {
    let mut buf = vec![0u8; count];
    rdr.read_exact(&mut buf)?;
    Ok(())
}

/// Write `count` zero bytes.
pub fn pad<W: Write>(wtr: &mut W, count: usize) -> ParseResult<()> {
    wtr.write_all(&vec![0u8; count])?;
    Ok(())
}

/// Read an RGB color followed by its padding byte.
pub fn read_rgb<R: Read>(rdr: &mut R) -> ParseResult<Rgb> {
    let r = rdr.read_u8()?;
    let g = rdr.read_u8()?;
    let b = rdr.read_u8()?;
    rdr.read_u8()?;
    Ok(Rgb::new(r, g, b))
}

/// Write an RGB color followed by a zero padding byte.
pub fn write_rgb<W: Write>(wtr: &mut W, c: Rgb) -> ParseResult<()> {
    wtr.write_all(&[c.r, c.g, c.b, 0])?;
    Ok(())
}

pub fn read_quat<R: Read>(rdr: &mut R) -> ParseResult<Quat> {
    Ok(Quat {
        x: rdr.read_f32::<LittleEndian>()?,
        y: rdr.read_f32::<LittleEndian>()?,
        z: rdr.read_f32::<LittleEndian>()?,
        w: rdr.read_f32::<LittleEndian>()?,
    })
}

pub fn write_quat<W: Write>(wtr: &mut W, q: Quat) -> ParseResult<()> {
    for v in q.to_array() {
        wtr.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

impl Record for Vec3 {
    const SIZE: usize = 12;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Vec3 {
            x: rdr.read_f32::<LittleEndian>()?,
            y: rdr.read_f32::<LittleEndian>()?,
            z: rdr.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_f32::<LittleEndian>(self.x)?;
        wtr.write_f32::<LittleEndian>(self.y)?;
        wtr.write_f32::<LittleEndian>(self.z)?;
        Ok(())
    }
}

impl Record for Vec2 {
    const SIZE: usize = 8;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Vec2 {
            x: rdr.read_f32::<LittleEndian>()?,
            y: rdr.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_f32::<LittleEndian>(self.x)?;
        wtr.write_f32::<LittleEndian>(self.y)?;
        Ok(())
    }
}

impl Record for u32 {
    const SIZE: usize = 4;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(rdr.read_u32::<LittleEndian>()?)
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(*self)?;
        Ok(())
    }
}

impl Record for [u8; 4] {
    const SIZE: usize = 4;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let mut buf = [0u8; 4];
        rdr.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_all(self)?;
        Ok(())
    }
}

impl Record for [u32; 3] {
    const SIZE: usize = 12;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok([
            rdr.read_u32::<LittleEndian>()?,
            rdr.read_u32::<LittleEndian>()?,
            rdr.read_u32::<LittleEndian>()?,
        ])
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        for v in self {
            wtr.write_u32::<LittleEndian>(*v)?;
        }
        Ok(())
    }
}
