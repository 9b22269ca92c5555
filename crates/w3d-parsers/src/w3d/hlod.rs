// w3d-parsers/src/w3d/hlod.rs
//! HLOD and aggregate records
//!
//! An HLOD binds a hierarchy to sets of sub-objects, one set per level of
//! detail plus an always-present aggregate set and a proxy set. An aggregate
//! names a base model and the sub-objects to hang off its bones.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::io::{self, Record, LONG_NAME_LEN, NAME_LEN};
use super::mesh::version;
use crate::traits::{ParseError, ParseResult};

/// Header of an HLOD chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlodHeader {
    pub version: u32,
    pub lod_count: u32,
    /// Display name of the model
    pub name: String,
    /// Name of the hierarchy the sub-objects are bound to
    pub hierarchy_name: String,
}

impl Default for HlodHeader {
    fn default() -> Self {
        Self {
            version: version(1, 0),
            lod_count: 1,
            name: "UNTITLED".to_string(),
            hierarchy_name: "UNTITLED".to_string(),
        }
    }
}

impl Record for HlodHeader {
    const SIZE: usize = 40;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            version: rdr.read_u32::<LittleEndian>()?,
            lod_count: rdr.read_u32::<LittleEndian>()?,
            name: io::read_fixed_str(rdr, NAME_LEN)?,
            hierarchy_name: io::read_fixed_str(rdr, NAME_LEN)?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.version)?;
        wtr.write_u32::<LittleEndian>(self.lod_count)?;
        io::write_fixed_str(wtr, &self.name, NAME_LEN)?;
        io::write_fixed_str(wtr, &self.hierarchy_name, NAME_LEN)
    }
}

/// Header of one sub-object array (HLOD_SUB_OBJECT_ARRAY_HEADER)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HlodArrayHeader {
    pub model_count: u32,
    pub max_screen_size: f32,
}

impl Record for HlodArrayHeader {
    const SIZE: usize = 8;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            model_count: rdr.read_u32::<LittleEndian>()?,
            max_screen_size: rdr.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.model_count)?;
        wtr.write_f32::<LittleEndian>(self.max_screen_size)?;
        Ok(())
    }
}

/// A render object, aggregate or proxy bound to a bone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlodSubObject {
    pub bone_index: u32,
    /// Usually `CONTAINER.MESH`
    pub name: String,
}

impl HlodSubObject {
    pub fn new(bone_index: u32, name: impl Into<String>) -> Self {
        Self {
            bone_index,
            name: name.into(),
        }
    }

    /// Name of the model file the sub-object lives in: everything before
    /// the first `.`
    pub fn model_name(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}

impl Record for HlodSubObject {
    const SIZE: usize = 36;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            bone_index: rdr.read_u32::<LittleEndian>()?,
            name: io::read_fixed_str(rdr, LONG_NAME_LEN)?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.bone_index)?;
        io::write_fixed_str(wtr, &self.name, LONG_NAME_LEN)
    }
}

/// Header of an AGGREGATE chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateHeader {
    pub version: u32,
    pub name: String,
}

impl Record for AggregateHeader {
    const SIZE: usize = 20;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            version: rdr.read_u32::<LittleEndian>()?,
            name: io::read_fixed_str(rdr, NAME_LEN)?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.version)?;
        io::write_fixed_str(wtr, &self.name, NAME_LEN)
    }
}

/// A sub-object attached to a named bone of an aggregate's base model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSubobject {
    pub subobject_name: String,
    pub bone_name: String,
}

impl Record for AggregateSubobject {
    const SIZE: usize = 2 * LONG_NAME_LEN;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            subobject_name: io::read_fixed_str(rdr, LONG_NAME_LEN)?,
            bone_name: io::read_fixed_str(rdr, LONG_NAME_LEN)?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        io::write_fixed_str(wtr, &self.subobject_name, LONG_NAME_LEN)?;
        io::write_fixed_str(wtr, &self.bone_name, LONG_NAME_LEN)
    }
}

/// Base model and sub-objects of an aggregate (AGGREGATE_INFO)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateInfo {
    pub base_model_name: String,
    pub subobjects: Vec<AggregateSubobject>,
}

impl AggregateInfo {
    const FIXED_SIZE: usize = LONG_NAME_LEN + 4;

    /// Decode the fixed part followed by as many sub-objects as the payload
    /// holds. The stored count is informational.
    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut rdr = Cursor::new(payload);
        let base_model_name = io::read_fixed_str(&mut rdr, LONG_NAME_LEN)?;
        let declared = rdr.read_u32::<LittleEndian>()?;

        let subobjects: Vec<AggregateSubobject> =
            io::read_array(&payload[Self::FIXED_SIZE..], "AGGREGATE_INFO")?;
        if declared as usize != subobjects.len() {
            tracing::debug!(
                declared,
                found = subobjects.len(),
                "aggregate sub-object count disagrees with payload"
            );
        }

        Ok(Self {
            base_model_name,
            subobjects,
        })
    }

    pub fn encode<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        let count = u32::try_from(self.subobjects.len()).map_err(|_| {
            ParseError::InvalidStructure("too many aggregate sub-objects".to_string())
        })?;

        io::write_fixed_str(wtr, &self.base_model_name, LONG_NAME_LEN)?;
        wtr.write_u32::<LittleEndian>(count)?;
        io::write_array(&self.subobjects, wtr)
    }
}

/// Class information of an aggregate (AGGREGATE_CLASS_INFO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateClassInfo {
    pub original_class_id: u32,
    pub flags: u32,
}

impl Record for AggregateClassInfo {
    const SIZE: usize = 20;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let original_class_id = rdr.read_u32::<LittleEndian>()?;
        let flags = rdr.read_u32::<LittleEndian>()?;
        io::skip(rdr, 12)?;
        Ok(Self {
            original_class_id,
            flags,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.original_class_id)?;
        wtr.write_u32::<LittleEndian>(self.flags)?;
        io::pad(wtr, 12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_object_model_name() {
        assert_eq!(HlodSubObject::new(1, "TANK.TURRET").model_name(), "TANK");
        assert_eq!(HlodSubObject::new(1, "A.B.C").model_name(), "A");
        assert_eq!(HlodSubObject::new(1, "PLAIN").model_name(), "PLAIN");
        assert_eq!(HlodSubObject::new(1, "").model_name(), "");
    }

    #[test]
    fn test_max_length_sub_object_name() {
        let name = "N".repeat(LONG_NAME_LEN - 1);
        let sub = HlodSubObject::new(4, name.clone());

        let mut buf = Vec::new();
        sub.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HlodSubObject::SIZE);
        assert_eq!(HlodSubObject::read(&mut Cursor::new(&buf)).unwrap().name, name);
    }

    #[test]
    fn test_aggregate_info_ignores_declared_count() {
        let info = AggregateInfo {
            base_model_name: "V_TANK".to_string(),
            subobjects: vec![AggregateSubobject {
                subobject_name: "FLAG".to_string(),
                bone_name: "ANTENNA".to_string(),
            }],
        };

        let mut buf = Vec::new();
        info.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 36 + 64);

        // Lie about the count; the payload length wins
        buf[32..36].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(AggregateInfo::decode(&buf).unwrap(), info);
    }
}
