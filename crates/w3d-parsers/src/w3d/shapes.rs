// w3d-parsers/src/w3d/shapes.rs
//! Primitive render objects and light records

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use w3d_core::{Rgb, Vec3};

use super::io::{self, Record, LONG_NAME_LEN};
use crate::traits::ParseResult;

/// A BOX, SPHERE or RING render object. All three share one layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub version: u32,
    pub attributes: u32,
    pub name: String,
    pub color: Rgb,
    pub center: Vec3,
    pub extent: Vec3,
}

impl Record for ShapeRecord {
    const SIZE: usize = 68;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            version: rdr.read_u32::<LittleEndian>()?,
            attributes: rdr.read_u32::<LittleEndian>()?,
            name: io::read_fixed_str(rdr, LONG_NAME_LEN)?,
            color: io::read_rgb(rdr)?,
            center: Vec3::read(rdr)?,
            extent: Vec3::read(rdr)?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.version)?;
        wtr.write_u32::<LittleEndian>(self.attributes)?;
        io::write_fixed_str(wtr, &self.name, LONG_NAME_LEN)?;
        io::write_rgb(wtr, self.color)?;
        self.center.write(wtr)?;
        self.extent.write(wtr)
    }
}

/// Light colors and intensity. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightInfo {
    pub attributes: u32,
    pub ambient: Rgb,
    pub diffuse: Rgb,
    pub specular: Rgb,
    pub intensity: f32,
}

impl LightInfo {
    pub const SIZE: usize = 24;

    pub fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let attributes = rdr.read_u32::<LittleEndian>()?;
        rdr.read_u32::<LittleEndian>()?;
        Ok(Self {
            attributes,
            ambient: io::read_rgb(rdr)?,
            diffuse: io::read_rgb(rdr)?,
            specular: io::read_rgb(rdr)?,
            intensity: rdr.read_f32::<LittleEndian>()?,
        })
    }
}

/// 3x4 placement of a lightscape light. Read-only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightTransform {
    pub rows: [[f32; 4]; 3],
}

impl LightTransform {
    pub const SIZE: usize = 48;

    pub fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let mut rows = [[0.0f32; 4]; 3];
        for row in &mut rows {
            for v in row.iter_mut() {
                *v = rdr.read_f32::<LittleEndian>()?;
            }
        }
        Ok(Self { rows })
    }
}
