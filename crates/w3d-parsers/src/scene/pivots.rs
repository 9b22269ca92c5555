// w3d-parsers/src/scene/pivots.rs
//! Pivot trees
//!
//! Each HLOD is paired with the hierarchy it names and turned into a rooted
//! tree of pivots. Render objects listed by the HLOD are attached to their
//! bone together with the level of detail they belong to.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};
use w3d_core::{Quat, Vec3};

use crate::registry::ChunkKind;
use crate::traits::{ParseError, ParseResult};
use crate::w3d::{
    AggregateHeader, AggregateInfo, ChunkTree, HierarchyHeader, HlodHeader, HlodSubObject,
    MeshHeader3, NodeId, PivotRecord, ShapeRecord,
};

/// LOD number of objects shown at every level of detail
pub const ALL_LODS: i32 = -1;

/// Renderable chunks by the name HLODs use to reference them
pub type RenderObjects = BTreeMap<String, NodeId>;

/// Index top-level meshes by `CONTAINER.MESH` and top-level primitives
/// (BOX, SPHERE, RING) by their name.
pub fn collect_render_objects(tree: &ChunkTree) -> RenderObjects {
    let mut objects = RenderObjects::new();

    for mesh in tree.find(None, ChunkKind::Mesh) {
        match tree.get_record::<MeshHeader3>(Some(mesh), ChunkKind::MeshHeader3) {
            Some(header) => {
                objects.insert(header.full_name(), mesh);
            }
            None => debug!(node = mesh.index(), "Mesh without header"),
        }
    }

    for kind in [ChunkKind::Box, ChunkKind::Sphere, ChunkKind::Ring] {
        for id in tree.find(None, kind) {
            if let Some(shape) = tree.record::<ShapeRecord>(id) {
                objects.insert(shape.name.clone(), id);
            }
        }
    }

    objects
}

/// A render object hung off a pivot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub node: NodeId,
    /// Level of detail, [`ALL_LODS`] for aggregate sub-objects
    pub lod: i32,
}

/// One joint of a pivot tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pivot {
    pub index: usize,
    /// Display name; the root takes the name of its HLOD
    pub name: String,
    /// Name stored in the hierarchy
    pub original_name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub euler_angles: Vec3,
    pub rotation: Quat,
    pub children: Vec<usize>,
    pub attachments: Vec<Attachment>,
    pub proxies: Vec<String>,
}

/// Pivots of one HLOD, root first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTree {
    pub name: String,
    pub hierarchy_name: String,
    pub lod_count: u32,
    pub pivots: Vec<Pivot>,
}

impl PivotTree {
    /// Pivot 0; `None` only for a tree assembled by hand without pivots
    pub fn root(&self) -> Option<&Pivot> {
        self.pivots.first()
    }

    pub fn get(&self, index: usize) -> Option<&Pivot> {
        self.pivots.get(index)
    }

    /// Index of the pivot whose hierarchy name is `name`
    pub fn find_original(&self, name: &str) -> Option<usize> {
        self.pivots.iter().position(|p| p.original_name == name)
    }

    fn attach(&mut self, bone: u32, f: impl FnOnce(&mut Pivot)) -> ParseResult<()> {
        let count = self.pivots.len();
        let pivot = self.pivots.get_mut(bone as usize).ok_or_else(|| {
            ParseError::InvalidStructure(format!(
                "HLOD {} binds to bone {bone} but its hierarchy has {count} pivots",
                self.name
            ))
        })?;
        f(pivot);
        Ok(())
    }
}

/// Pivot trees keyed by HLOD name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotForest {
    trees: BTreeMap<String, PivotTree>,
}

impl PivotForest {
    pub fn get(&self, name: &str) -> Option<&PivotTree> {
        self.trees.get(name)
    }

    /// Tree animated by an animation targeting `hierarchy`: matched on
    /// hierarchy name first, HLOD name second.
    pub fn for_hierarchy(&self, hierarchy: &str) -> Option<&PivotTree> {
        self.trees
            .values()
            .find(|t| t.hierarchy_name == hierarchy)
            .or_else(|| self.trees.get(hierarchy))
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PivotTree> {
        self.trees.values()
    }
}

/// Link pivots into a tree. Parents must come before their children and
/// exactly one pivot may have no parent.
fn build_pivots(hlod: &HlodHeader, records: &[PivotRecord]) -> ParseResult<Vec<Pivot>> {
    let mut pivots: Vec<Pivot> = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let parent = record.parent();
        let name = match parent {
            None if index == 0 => hlod.name.clone(),
            None => {
                return Err(ParseError::InvalidStructure(format!(
                    "hierarchy {} has a second root pivot {:?} at index {index}",
                    hlod.hierarchy_name, record.name
                )))
            }
            Some(p) if p >= index => {
                return Err(ParseError::InvalidStructure(format!(
                    "pivot {:?} at index {index} names parent {p}, which does not precede it",
                    record.name
                )))
            }
            Some(p) => {
                pivots[p].children.push(index);
                record.name.clone()
            }
        };

        pivots.push(Pivot {
            index,
            name,
            original_name: record.name.clone(),
            parent,
            translation: record.translation,
            euler_angles: record.euler_angles,
            rotation: record.rotation,
            children: Vec::new(),
            attachments: Vec::new(),
            proxies: Vec::new(),
        });
    }

    if pivots.is_empty() {
        return Err(ParseError::InvalidStructure(format!(
            "hierarchy {} has no root pivot",
            hlod.hierarchy_name
        )));
    }
    Ok(pivots)
}

fn sub_objects<'a>(tree: &'a ChunkTree, array: NodeId) -> impl Iterator<Item = &'a HlodSubObject> + 'a {
    tree.find(Some(array), ChunkKind::HlodSubObject)
        .into_iter()
        .filter_map(move |id| tree.record::<HlodSubObject>(id))
}

/// Build one pivot tree per HLOD that has a matching hierarchy.
pub fn build_pivot_forest(tree: &ChunkTree, render_objects: &RenderObjects) -> ParseResult<PivotForest> {
    let mut forest = PivotForest::default();

    for hlod in tree.find(None, ChunkKind::Hlod) {
        let Some(info) = tree.get_record::<HlodHeader>(Some(hlod), ChunkKind::HlodHeader) else {
            debug!(node = hlod.index(), "HLOD without header");
            continue;
        };

        let hierarchy = tree.find(None, ChunkKind::Hierarchy).into_iter().find(|&h| {
            tree.get_record::<HierarchyHeader>(Some(h), ChunkKind::HierarchyHeader)
                .is_some_and(|hh| hh.name == info.hierarchy_name)
        });
        let Some(hierarchy) = hierarchy else {
            debug!(hlod = %info.name, hierarchy = %info.hierarchy_name, "No hierarchy for HLOD");
            continue;
        };

        let records = tree
            .get_record::<Vec<PivotRecord>>(Some(hierarchy), ChunkKind::Pivots)
            .ok_or_else(|| ParseError::MissingField(format!("PIVOTS of hierarchy {}", info.hierarchy_name)))?;

        let mut pivots = PivotTree {
            name: info.name.clone(),
            hierarchy_name: info.hierarchy_name.clone(),
            lod_count: info.lod_count,
            pivots: build_pivots(info, records)?,
        };

        // The first array is the highest level of detail
        let mut lod = i64::from(info.lod_count);
        for array in tree.find(Some(hlod), ChunkKind::HlodLodArray) {
            lod -= 1;
            let level = i32::try_from(lod).unwrap_or(ALL_LODS);
            for sub in sub_objects(tree, array) {
                if let Some(&node) = render_objects.get(&sub.name) {
                    let name = sub.name.clone();
                    pivots.attach(sub.bone_index, |p| {
                        p.attachments.push(Attachment { name, node, lod: level })
                    })?;
                }
            }
        }

        for array in tree.find(Some(hlod), ChunkKind::HlodAggregateArray) {
            for sub in sub_objects(tree, array) {
                if let Some(&node) = render_objects.get(&sub.name) {
                    let name = sub.name.clone();
                    pivots.attach(sub.bone_index, |p| {
                        p.attachments.push(Attachment {
                            name,
                            node,
                            lod: ALL_LODS,
                        })
                    })?;
                }
            }
        }

        for array in tree.find(Some(hlod), ChunkKind::HlodProxyArray) {
            for sub in sub_objects(tree, array) {
                let name = sub.name.clone();
                pivots.attach(sub.bone_index, |p| p.proxies.push(name))?;
            }
        }

        debug!(hlod = %pivots.name, pivots = pivots.pivots.len(), "Built pivot tree");
        forest.trees.insert(pivots.name.clone(), pivots);
    }

    Ok(forest)
}

/// An aggregate sub-object to be parented under a bone of the base model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateLink {
    pub aggregate: String,
    /// Pivot tree of the attached object
    pub subobject: String,
    /// Pivot tree of the base model
    pub model: String,
    pub bone_index: usize,
}

/// Resolve the bone names of every top-level aggregate against the pivot
/// tree of its base model.
pub fn link_aggregates(tree: &ChunkTree, forest: &PivotForest) -> Vec<AggregateLink> {
    let mut links = Vec::new();

    for ag in tree.find(None, ChunkKind::Aggregate) {
        let name = tree
            .get_record::<AggregateHeader>(Some(ag), ChunkKind::AggregateHeader)
            .map(|h| h.name.clone())
            .unwrap_or_default();
        let Some(info) = tree.get_record::<AggregateInfo>(Some(ag), ChunkKind::AggregateInfo) else {
            continue;
        };
        let Some(base) = forest.get(&info.base_model_name) else {
            warn!(aggregate = %name, model = %info.base_model_name, "Aggregate base model has no pivots");
            continue;
        };

        for sub in &info.subobjects {
            match base.find_original(&sub.bone_name) {
                Some(bone_index) => links.push(AggregateLink {
                    aggregate: name.clone(),
                    subobject: sub.subobject_name.clone(),
                    model: info.base_model_name.clone(),
                    bone_index,
                }),
                None => warn!(
                    aggregate = %name,
                    bone = %sub.bone_name,
                    model = %info.base_model_name,
                    "Aggregate bone not found"
                ),
            }
        }
    }

    links
}
