// w3d-parsers/src/w3d/hierarchy.rs
//! Skeleton records: hierarchy header, pivots and pivot fixups

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use w3d_core::{Quat, Vec3};

use super::io::{self, Record, NAME_LEN};
use super::mesh::version;
use crate::traits::ParseResult;

/// Parent index stored by the root pivot
pub const NO_PARENT: u32 = 0xFFFF_FFFF;

/// Header of a HIERARCHY chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyHeader {
    pub version: u32,
    pub name: String,
    pub num_pivots: u32,
    pub center: Vec3,
}

impl Default for HierarchyHeader {
    fn default() -> Self {
        Self {
            version: version(4, 1),
            name: "UNTITLED".to_string(),
            num_pivots: 0,
            center: Vec3::ZERO,
        }
    }
}

impl Record for HierarchyHeader {
    const SIZE: usize = 36;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            version: rdr.read_u32::<LittleEndian>()?,
            name: io::read_fixed_str(rdr, NAME_LEN)?,
            num_pivots: rdr.read_u32::<LittleEndian>()?,
            center: Vec3::read(rdr)?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.version)?;
        io::write_fixed_str(wtr, &self.name, NAME_LEN)?;
        wtr.write_u32::<LittleEndian>(self.num_pivots)?;
        self.center.write(wtr)
    }
}

/// One joint of a skeleton as stored in the PIVOTS array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRecord {
    pub name: String,
    /// Index of the parent pivot, [`NO_PARENT`] for the root
    pub parent_idx: u32,
    pub translation: Vec3,
    pub euler_angles: Vec3,
    pub rotation: Quat,
}

impl PivotRecord {
    /// Create a pivot with an identity transform
    pub fn new(name: impl Into<String>, parent: Option<u32>) -> Self {
        Self {
            name: name.into(),
            parent_idx: parent.unwrap_or(NO_PARENT),
            translation: Vec3::ZERO,
            euler_angles: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    /// Parent index, `None` for the root pivot
    pub fn parent(&self) -> Option<usize> {
        (self.parent_idx != NO_PARENT).then_some(self.parent_idx as usize)
    }
}

impl Record for PivotRecord {
    const SIZE: usize = 60;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            name: io::read_fixed_str(rdr, NAME_LEN)?,
            parent_idx: rdr.read_u32::<LittleEndian>()?,
            translation: Vec3::read(rdr)?,
            euler_angles: Vec3::read(rdr)?,
            rotation: io::read_quat(rdr)?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        io::write_fixed_str(wtr, &self.name, NAME_LEN)?;
        wtr.write_u32::<LittleEndian>(self.parent_idx)?;
        self.translation.write(wtr)?;
        self.euler_angles.write(wtr)?;
        io::write_quat(wtr, self.rotation)
    }
}

/// A 4x3 fixup matrix, one per pivot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotFixup {
    pub rows: [[f32; 3]; 4],
}

impl Record for PivotFixup {
    const SIZE: usize = 48;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let mut rows = [[0.0f32; 3]; 4];
        for row in &mut rows {
            for v in row.iter_mut() {
                *v = rdr.read_f32::<LittleEndian>()?;
            }
        }
        Ok(Self { rows })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        for row in &self.rows {
            for v in row {
                wtr.write_f32::<LittleEndian>(*v)?;
            }
        }
        Ok(())
    }
}
