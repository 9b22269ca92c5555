// w3d-parsers/src/w3d/mesh.rs
//! Mesh, material and texture records

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use w3d_core::{BoundingBox, Rgb, Vec3};

use super::io::{self, Record, NAME_LEN};
use crate::traits::ParseResult;

/// Pack a major/minor pair the way W3D version fields store it
pub const fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | minor
}

/// Mesh header (MESH_HEADER3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshHeader3 {
    pub version: u32,
    pub attributes: u32,
    pub mesh_name: String,
    pub container_name: String,
    pub num_tris: u32,
    pub num_vertices: u32,
    pub num_materials: u32,
    pub num_damage_stages: u32,
    pub sort_level: i32,
    pub prelit_version: u32,
    pub future_counts: u32,
    pub vertex_channels: u32,
    pub face_channels: u32,
    /// Bounding box of the vertices
    pub bounds: BoundingBox,
    pub sph_center: Vec3,
    pub sph_radius: f32,
}

impl MeshHeader3 {
    /// Name used by HLOD sub-objects to reference this mesh
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.container_name, self.mesh_name)
    }
}

impl Default for MeshHeader3 {
    fn default() -> Self {
        Self {
            version: version(4, 2),
            attributes: 0,
            mesh_name: "UNTITLED".to_string(),
            container_name: "UNTITLED".to_string(),
            num_tris: 0,
            num_vertices: 0,
            num_materials: 0,
            num_damage_stages: 0,
            sort_level: 0,
            prelit_version: 0,
            future_counts: 0,
            vertex_channels: 3,
            face_channels: 1,
            bounds: BoundingBox::ZERO,
            sph_center: Vec3::ZERO,
            sph_radius: 0.0,
        }
    }
}

impl Record for MeshHeader3 {
    const SIZE: usize = 116;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            version: rdr.read_u32::<LittleEndian>()?,
            attributes: rdr.read_u32::<LittleEndian>()?,
            mesh_name: io::read_fixed_str(rdr, NAME_LEN)?,
            container_name: io::read_fixed_str(rdr, NAME_LEN)?,
            num_tris: rdr.read_u32::<LittleEndian>()?,
            num_vertices: rdr.read_u32::<LittleEndian>()?,
            num_materials: rdr.read_u32::<LittleEndian>()?,
            num_damage_stages: rdr.read_u32::<LittleEndian>()?,
            sort_level: rdr.read_i32::<LittleEndian>()?,
            prelit_version: rdr.read_u32::<LittleEndian>()?,
            future_counts: rdr.read_u32::<LittleEndian>()?,
            vertex_channels: rdr.read_u32::<LittleEndian>()?,
            face_channels: rdr.read_u32::<LittleEndian>()?,
            bounds: BoundingBox::new(Vec3::read(rdr)?, Vec3::read(rdr)?),
            sph_center: Vec3::read(rdr)?,
            sph_radius: rdr.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.version)?;
        wtr.write_u32::<LittleEndian>(self.attributes)?;
        io::write_fixed_str(wtr, &self.mesh_name, NAME_LEN)?;
        io::write_fixed_str(wtr, &self.container_name, NAME_LEN)?;
        wtr.write_u32::<LittleEndian>(self.num_tris)?;
        wtr.write_u32::<LittleEndian>(self.num_vertices)?;
        wtr.write_u32::<LittleEndian>(self.num_materials)?;
        wtr.write_u32::<LittleEndian>(self.num_damage_stages)?;
        wtr.write_i32::<LittleEndian>(self.sort_level)?;
        wtr.write_u32::<LittleEndian>(self.prelit_version)?;
        wtr.write_u32::<LittleEndian>(self.future_counts)?;
        wtr.write_u32::<LittleEndian>(self.vertex_channels)?;
        wtr.write_u32::<LittleEndian>(self.face_channels)?;
        self.bounds.min.write(wtr)?;
        self.bounds.max.write(wtr)?;
        self.sph_center.write(wtr)?;
        wtr.write_f32::<LittleEndian>(self.sph_radius)?;
        Ok(())
    }
}

/// One face of a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// Vertex indices
    pub vindex: [u32; 3],
    /// Surface type code
    pub attributes: u32,
    pub normal: Vec3,
    pub dist: f32,
}

impl Record for Triangle {
    const SIZE: usize = 32;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            vindex: <[u32; 3]>::read(rdr)?,
            attributes: rdr.read_u32::<LittleEndian>()?,
            normal: Vec3::read(rdr)?,
            dist: rdr.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        self.vindex.write(wtr)?;
        wtr.write_u32::<LittleEndian>(self.attributes)?;
        self.normal.write(wtr)?;
        wtr.write_f32::<LittleEndian>(self.dist)?;
        Ok(())
    }
}

/// Skinning bone reference for one vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexInfluence {
    pub bone: u16,
    pub extra_bone: u16,
}

impl Record for VertexInfluence {
    const SIZE: usize = 8;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let bone = rdr.read_u16::<LittleEndian>()?;
        let extra_bone = rdr.read_u16::<LittleEndian>()?;
        io::skip(rdr, 4)?;
        Ok(Self { bone, extra_bone })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u16::<LittleEndian>(self.bone)?;
        wtr.write_u16::<LittleEndian>(self.extra_bone)?;
        io::pad(wtr, 4)
    }
}

/// Material counts for a mesh (MATERIAL_INFO)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialInfo {
    pub pass_count: u32,
    pub vertex_material_count: u32,
    pub shader_count: u32,
    pub texture_count: u32,
}

impl Record for MaterialInfo {
    const SIZE: usize = 16;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            pass_count: rdr.read_u32::<LittleEndian>()?,
            vertex_material_count: rdr.read_u32::<LittleEndian>()?,
            shader_count: rdr.read_u32::<LittleEndian>()?,
            texture_count: rdr.read_u32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.pass_count)?;
        wtr.write_u32::<LittleEndian>(self.vertex_material_count)?;
        wtr.write_u32::<LittleEndian>(self.shader_count)?;
        wtr.write_u32::<LittleEndian>(self.texture_count)?;
        Ok(())
    }
}

/// Fixed-function shader state, one byte per setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shader {
    pub depth_compare: u8,
    pub depth_mask: u8,
    pub color_mask: u8,
    pub dest_blend: u8,
    pub fog_func: u8,
    pub pri_gradient: u8,
    pub sec_gradient: u8,
    pub src_blend: u8,
    pub texturing: u8,
    pub detail_color_func: u8,
    pub detail_alpha_func: u8,
    pub shader_preset: u8,
    pub alpha_test: u8,
    pub post_detail_color_func: u8,
    pub post_detail_alpha_func: u8,
}

impl Record for Shader {
    const SIZE: usize = 16;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let mut b = [0u8; 16];
        rdr.read_exact(&mut b)?;
        Ok(Self {
            depth_compare: b[0],
            depth_mask: b[1],
            color_mask: b[2],
            dest_blend: b[3],
            fog_func: b[4],
            pri_gradient: b[5],
            sec_gradient: b[6],
            src_blend: b[7],
            texturing: b[8],
            detail_color_func: b[9],
            detail_alpha_func: b[10],
            shader_preset: b[11],
            alpha_test: b[12],
            post_detail_color_func: b[13],
            post_detail_alpha_func: b[14],
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_all(&[
            self.depth_compare,
            self.depth_mask,
            self.color_mask,
            self.dest_blend,
            self.fog_func,
            self.pri_gradient,
            self.sec_gradient,
            self.src_blend,
            self.texturing,
            self.detail_color_func,
            self.detail_alpha_func,
            self.shader_preset,
            self.alpha_test,
            self.post_detail_color_func,
            self.post_detail_alpha_func,
            0,
        ])?;
        Ok(())
    }
}

/// Shading properties of a vertex material (VERTEX_MATERIAL_INFO)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexMaterialInfo {
    pub attributes: u32,
    pub ambient: Rgb,
    pub diffuse: Rgb,
    pub specular: Rgb,
    pub emissive: Rgb,
    pub shininess: f32,
    pub opacity: f32,
    pub translucency: f32,
}

impl VertexMaterialInfo {
    /// Mapping function of the first texture stage
    pub fn mapping0(&self) -> u8 {
        ((self.attributes >> 16) & 0xFF) as u8
    }

    /// Mapping function of the second texture stage
    pub fn mapping1(&self) -> u8 {
        ((self.attributes >> 8) & 0xFF) as u8
    }
}

impl Default for VertexMaterialInfo {
    fn default() -> Self {
        Self {
            attributes: 0,
            ambient: Rgb::WHITE,
            diffuse: Rgb::WHITE,
            specular: Rgb::BLACK,
            emissive: Rgb::BLACK,
            shininess: 0.0,
            opacity: 1.0,
            translucency: 0.0,
        }
    }
}

impl Record for VertexMaterialInfo {
    const SIZE: usize = 32;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            attributes: rdr.read_u32::<LittleEndian>()?,
            ambient: io::read_rgb(rdr)?,
            diffuse: io::read_rgb(rdr)?,
            specular: io::read_rgb(rdr)?,
            emissive: io::read_rgb(rdr)?,
            shininess: rdr.read_f32::<LittleEndian>()?,
            opacity: rdr.read_f32::<LittleEndian>()?,
            translucency: rdr.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.attributes)?;
        io::write_rgb(wtr, self.ambient)?;
        io::write_rgb(wtr, self.diffuse)?;
        io::write_rgb(wtr, self.specular)?;
        io::write_rgb(wtr, self.emissive)?;
        wtr.write_f32::<LittleEndian>(self.shininess)?;
        wtr.write_f32::<LittleEndian>(self.opacity)?;
        wtr.write_f32::<LittleEndian>(self.translucency)?;
        Ok(())
    }
}

/// Texture animation settings (TEXTURE_INFO)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub attributes: u16,
    pub anim_type: u16,
    pub frame_count: u32,
    pub frame_rate: f32,
}

impl Record for TextureInfo {
    const SIZE: usize = 12;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            attributes: rdr.read_u16::<LittleEndian>()?,
            anim_type: rdr.read_u16::<LittleEndian>()?,
            frame_count: rdr.read_u32::<LittleEndian>()?,
            frame_rate: rdr.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u16::<LittleEndian>(self.attributes)?;
        wtr.write_u16::<LittleEndian>(self.anim_type)?;
        wtr.write_u32::<LittleEndian>(self.frame_count)?;
        wtr.write_f32::<LittleEndian>(self.frame_rate)?;
        Ok(())
    }
}

/// Collision tree header. Read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AabtreeHeader {
    pub node_count: u32,
    pub poly_count: u32,
}

impl AabtreeHeader {
    /// Encoded size including the trailing padding
    pub const SIZE: usize = 32;

    pub fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        let node_count = rdr.read_u32::<LittleEndian>()?;
        let poly_count = rdr.read_u32::<LittleEndian>()?;
        io::skip(rdr, 24)?;
        Ok(Self { node_count, poly_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_mesh_header_size_and_names() {
        let header = MeshHeader3 {
            mesh_name: "TURRET".to_string(),
            container_name: "TANK".to_string(),
            sort_level: -3,
            ..MeshHeader3::default()
        };

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), MeshHeader3::SIZE);

        let back = MeshHeader3::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back, header);
        assert_eq!(back.full_name(), "TANK.TURRET");
    }

    #[test]
    fn test_shader_byte_positions() {
        let mut raw = [0u8; 16];
        raw[1] = 1; // depth mask
        raw[3] = 5; // dest blend
        raw[7] = 2; // src blend
        raw[12] = 1; // alpha test

        let shader = Shader::read(&mut Cursor::new(raw)).unwrap();
        assert_eq!(shader.depth_mask, 1);
        assert_eq!(shader.dest_blend, 5);
        assert_eq!(shader.src_blend, 2);
        assert_eq!(shader.alpha_test, 1);

        let mut out = Vec::new();
        shader.write(&mut out).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_vertex_material_mapping_codes() {
        let info = VertexMaterialInfo {
            attributes: 0x0004_0200,
            ..VertexMaterialInfo::default()
        };
        assert_eq!(info.mapping0(), 4);
        assert_eq!(info.mapping1(), 2);
    }

    #[test]
    fn test_aabtree_header_skips_padding() {
        let mut raw = vec![0u8; AabtreeHeader::SIZE];
        raw[0] = 7;
        raw[4] = 9;
        let mut rdr = Cursor::new(&raw);

        let header = AabtreeHeader::read(&mut rdr).unwrap();
        assert_eq!(header, AabtreeHeader { node_count: 7, poly_count: 9 });
        assert_eq!(rdr.position() as usize, AabtreeHeader::SIZE);
    }
}
