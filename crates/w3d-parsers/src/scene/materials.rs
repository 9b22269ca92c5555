// w3d-parsers/src/scene/materials.rs
//! Material reduction
//!
//! Meshes store material state per face and per pass as indices into
//! their vertex material, shader and texture tables. Reduction turns the
//! index tuples into self-contained [`MaterialRecord`]s, shared between
//! faces within a mesh and deduplicated across meshes.

use std::collections::HashMap;

use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;
use w3d_core::Rgb;

use super::ImportOptions;
use crate::registry::ChunkKind;
use crate::traits::{ParseError, ParseResult};
use crate::w3d::{ChunkTree, MeshHeader3, NodeId, Shader, Triangle, VertexMaterialInfo};

/// Vertex material name that marks a lightmap pass
pub const LIGHTMAP_MATERIAL: &str = "Lightmap";

/// A named vertex material
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexMaterial {
    pub name: String,
    pub info: VertexMaterialInfo,
}

/// One render pass of a material
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialPass {
    pub vertex_material: VertexMaterial,
    pub shader: Shader,
    /// Texture names of the first texture stage
    pub textures: Vec<String>,
}

/// A fully resolved material
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialRecord {
    /// Surface type code of the faces using the material
    pub surface: u32,
    pub sort_level: i32,
    pub passes: Vec<MaterialPass>,
}

impl MaterialRecord {
    /// Structural identity; floats compare by bit pattern
    pub fn key(&self) -> MaterialKey {
        MaterialKey {
            surface: self.surface,
            sort_level: self.sort_level,
            passes: self.passes.iter().map(PassKey::new).collect(),
        }
    }
}

/// Hashable identity of a [`MaterialRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    surface: u32,
    sort_level: i32,
    passes: SmallVec<[PassKey; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PassKey {
    vm_name: String,
    vm_attributes: u32,
    colors: [Rgb; 4],
    scalars: [u32; 3],
    shader: Shader,
    textures: SmallVec<[String; 2]>,
}

impl PassKey {
    fn new(pass: &MaterialPass) -> Self {
        let info = &pass.vertex_material.info;
        Self {
            vm_name: pass.vertex_material.name.clone(),
            vm_attributes: info.attributes,
            colors: [info.ambient, info.diffuse, info.specular, info.emissive],
            scalars: [
                info.shininess.to_bits(),
                info.opacity.to_bits(),
                info.translucency.to_bits(),
            ],
            shader: pass.shader,
            textures: pass.textures.iter().cloned().collect(),
        }
    }
}

/// Material slots of one mesh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshMaterials {
    pub mesh: NodeId,
    /// `CONTAINER.MESH`
    pub name: String,
    /// Slot -> index into [`MaterialTable::materials`]
    pub slots: Vec<usize>,
    /// Face -> slot
    pub face_slots: Vec<usize>,
}

/// Output of [`reduce_materials`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterialTable {
    pub materials: Vec<MaterialRecord>,
    pub meshes: Vec<MeshMaterials>,
}

impl MaterialTable {
    /// Material used by a face of the `mesh`-th mesh
    pub fn face_material(&self, mesh: usize, face: usize) -> Option<&MaterialRecord> {
        let m = self.meshes.get(mesh)?;
        let slot = *m.face_slots.get(face)?;
        self.materials.get(*m.slots.get(slot)?)
    }
}

/// Per-face index tuple of one pass
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PassIds {
    vertex_material: u32,
    shader: u32,
    textures: SmallVec<[u32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FaceDescriptor {
    surface: u32,
    passes: SmallVec<[PassIds; 2]>,
}

/// Index arrays of one MATERIAL_PASS
struct PassTables<'a> {
    vertex_material_ids: &'a [u32],
    shader_ids: &'a [u32],
    texture_ids: Vec<&'a [u32]>,
}

/// Per-element id when the array holds more than one entry, the shared
/// id otherwise.
fn pick(ids: &[u32], index: usize, what: &str) -> ParseResult<u32> {
    match ids {
        [] => Err(ParseError::MissingField(format!("{what} ids"))),
        [shared] => Ok(*shared),
        _ => ids.get(index).copied().ok_or_else(|| {
            ParseError::InvalidStructure(format!("{what} ids hold {} entries, index {index} requested", ids.len()))
        }),
    }
}

fn pass_tables(tree: &ChunkTree, pass: NodeId) -> ParseResult<PassTables<'_>> {
    let vertex_material_ids = tree
        .get_record::<Vec<u32>>(Some(pass), ChunkKind::VertexMaterialIds)
        .ok_or_else(|| ParseError::MissingField("VERTEX_MATERIAL_IDS of material pass".to_string()))?;
    let shader_ids = tree
        .get_record::<Vec<u32>>(Some(pass), ChunkKind::ShaderIds)
        .ok_or_else(|| ParseError::MissingField("SHADER_IDS of material pass".to_string()))?;

    let texture_ids = match tree.get(Some(pass), ChunkKind::TextureStage) {
        Some(stage) => tree
            .find_records_rec::<Vec<u32>>(Some(stage), ChunkKind::TextureIds)
            .into_iter()
            .map(Vec::as_slice)
            .collect(),
        None => Vec::new(),
    };

    Ok(PassTables {
        vertex_material_ids,
        shader_ids,
        texture_ids,
    })
}

struct MeshTables<'a> {
    header: &'a MeshHeader3,
    faces: &'a [Triangle],
    passes: Vec<PassTables<'a>>,
    texture_names: Vec<&'a String>,
    vm_names: Vec<&'a String>,
    vm_infos: Vec<&'a VertexMaterialInfo>,
    shaders: &'a [Shader],
}

impl<'a> MeshTables<'a> {
    fn gather(tree: &'a ChunkTree, mesh: NodeId) -> ParseResult<Self> {
        let header = tree
            .get_record::<MeshHeader3>(Some(mesh), ChunkKind::MeshHeader3)
            .ok_or_else(|| ParseError::MissingField("MESH_HEADER3 of mesh".to_string()))?;
        let faces = tree
            .get_record::<Vec<Triangle>>(Some(mesh), ChunkKind::Triangles)
            .map_or(&[][..], Vec::as_slice);
        let passes = tree
            .find_rec(Some(mesh), ChunkKind::MaterialPass)
            .into_iter()
            .map(|pass| pass_tables(tree, pass))
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Self {
            header,
            faces,
            passes,
            texture_names: tree.find_records_rec(Some(mesh), ChunkKind::TextureName),
            vm_names: tree.find_records_rec(Some(mesh), ChunkKind::VertexMaterialName),
            vm_infos: tree.find_records_rec(Some(mesh), ChunkKind::VertexMaterialInfo),
            shaders: tree
                .get_record_rec::<Vec<Shader>>(Some(mesh), ChunkKind::Shaders)
                .map_or(&[][..], Vec::as_slice),
        })
    }

    fn vertex_material_id(&self, pass: &PassTables<'_>, face: &Triangle) -> ParseResult<u32> {
        pick(pass.vertex_material_ids, face.vindex[0] as usize, "vertex material")
    }

    /// Drop every pass that resolves to the lightmap material on any face
    fn drop_lightmap_passes(&mut self) -> ParseResult<()> {
        let mut keep = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            let mut lightmap = false;
            for face in self.faces {
                let id = self.vertex_material_id(pass, face)?;
                if self.vm_names.get(id as usize).is_some_and(|n| n.as_str() == LIGHTMAP_MATERIAL) {
                    lightmap = true;
                    break;
                }
            }
            keep.push(!lightmap);
        }

        let before = self.passes.len();
        let mut flags = keep.into_iter();
        self.passes.retain(|_| flags.next().unwrap_or(true));
        if self.passes.len() != before {
            debug!(
                mesh = %self.header.full_name(),
                dropped = before - self.passes.len(),
                "Dropped lightmap passes"
            );
        }
        Ok(())
    }

    fn describe_face(&self, index: usize, face: &Triangle) -> ParseResult<FaceDescriptor> {
        let mut passes = SmallVec::new();
        for pass in &self.passes {
            passes.push(PassIds {
                vertex_material: self.vertex_material_id(pass, face)?,
                shader: pick(pass.shader_ids, index, "shader")?,
                textures: pass
                    .texture_ids
                    .iter()
                    .map(|ids| pick(ids, index, "texture"))
                    .collect::<ParseResult<_>>()?,
            });
        }
        Ok(FaceDescriptor {
            surface: face.attributes,
            passes,
        })
    }

    fn expand(&self, desc: &FaceDescriptor) -> ParseResult<MaterialRecord> {
        let mesh = self.header.full_name();
        let out_of_range = |what: &str, id: u32| {
            ParseError::InvalidStructure(format!("mesh {mesh} references missing {what} {id}"))
        };

        let mut passes = Vec::with_capacity(desc.passes.len());
        for ids in &desc.passes {
            let vm = ids.vertex_material as usize;
            let name = self.vm_names.get(vm).ok_or_else(|| out_of_range("vertex material", ids.vertex_material))?;
            let info = self.vm_infos.get(vm).ok_or_else(|| out_of_range("vertex material info", ids.vertex_material))?;
            let shader = self
                .shaders
                .get(ids.shader as usize)
                .ok_or_else(|| out_of_range("shader", ids.shader))?;

            passes.push(MaterialPass {
                vertex_material: VertexMaterial {
                    name: (*name).clone(),
                    info: **info,
                },
                shader: *shader,
                textures: ids
                    .textures
                    .iter()
                    .filter_map(|&t| self.texture_names.get(t as usize))
                    .map(|n| (*n).clone())
                    .collect(),
            });
        }

        Ok(MaterialRecord {
            surface: desc.surface,
            sort_level: self.header.sort_level,
            passes,
        })
    }
}

/// Reduce the per-face material state of every top-level mesh.
///
/// With [`ImportOptions::ignore_lightmaps`], passes using the `Lightmap`
/// vertex material are removed before faces are resolved.
pub fn reduce_materials(tree: &ChunkTree, options: &ImportOptions) -> ParseResult<MaterialTable> {
    let mut table = MaterialTable::default();
    let mut global: HashMap<MaterialKey, usize> = HashMap::new();

    for mesh in tree.find(None, ChunkKind::Mesh) {
        let mut tables = MeshTables::gather(tree, mesh)?;
        if options.ignore_lightmaps {
            tables.drop_lightmap_passes()?;
        }

        let mut local: HashMap<FaceDescriptor, usize> = HashMap::new();
        let mut slots = Vec::new();
        let mut face_slots = Vec::with_capacity(tables.faces.len());

        for (index, face) in tables.faces.iter().enumerate() {
            let desc = tables.describe_face(index, face)?;
            if let Some(&slot) = local.get(&desc) {
                face_slots.push(slot);
                continue;
            }

            let material = tables.expand(&desc)?;
            let key = material.key();
            let material_index = match global.get(&key) {
                Some(&i) => i,
                None => {
                    table.materials.push(material);
                    global.insert(key, table.materials.len() - 1);
                    table.materials.len() - 1
                }
            };

            let slot = slots.len();
            slots.push(material_index);
            local.insert(desc, slot);
            face_slots.push(slot);
        }

        debug!(
            mesh = %tables.header.full_name(),
            faces = face_slots.len(),
            slots = slots.len(),
            "Reduced mesh materials"
        );
        table.meshes.push(MeshMaterials {
            mesh,
            name: tables.header.full_name(),
            slots,
            face_slots,
        });
    }

    Ok(table)
}

/// Every texture name in the tree, first occurrence order, no duplicates
pub fn texture_names(tree: &ChunkTree) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in tree.find_records_rec::<String>(None, ChunkKind::TextureName) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}
