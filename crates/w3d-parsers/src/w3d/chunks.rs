// w3d-parsers/src/w3d/chunks.rs
//! Chunk tree storage
//!
//! Decoded chunks live in a flat arena owned by [`ChunkTree`]. Containers
//! refer to their children by [`NodeId`], and the tree keeps the ordered
//! list of top-level chunks. A node is either a container or a leaf,
//! decided by its kind when it is decoded.

use std::fmt::Write as _;

use serde::Serialize;
use w3d_core::{Vec2, Vec3};

use super::animation::{
    AdaptiveDeltaChannel, AnimationChannel, AnimationHeader, BitChannel,
    CompressedAnimationHeader, TimecodedChannel,
};
use super::hierarchy::{HierarchyHeader, PivotFixup, PivotRecord};
use super::hlod::{
    AggregateClassInfo, AggregateHeader, AggregateInfo, HlodArrayHeader, HlodHeader, HlodSubObject,
};
use super::mesh::{
    AabtreeHeader, MaterialInfo, MeshHeader3, Shader, TextureInfo, Triangle, VertexInfluence,
    VertexMaterialInfo,
};
use super::shapes::{LightInfo, LightTransform, ShapeRecord};
use crate::registry::ChunkKind;
use crate::traits::{ParseError, ParseResult};

/// Index of a node inside its [`ChunkTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// Decoded payload of a leaf chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChunkData {
    MeshHeader(MeshHeader3),
    /// NUL-terminated text: user text, material names, texture names, mapper args
    Text(String),
    /// Vertex positions or normals
    Vectors(Vec<Vec3>),
    /// Shade indices, vertex material ids, shader ids or texture ids
    Ids(Vec<u32>),
    Influences(Vec<VertexInfluence>),
    Triangles(Vec<Triangle>),
    MaterialInfo(MaterialInfo),
    Shaders(Vec<Shader>),
    VertexMaterialInfo(VertexMaterialInfo),
    /// Per-vertex DCG/DIG/SCG colors
    Colors(Vec<[u8; 4]>),
    Texcoords(Vec<Vec2>),
    PerFaceTexcoordIds(Vec<[u32; 3]>),
    TextureInfo(TextureInfo),
    AabtreeHeader(AabtreeHeader),
    HierarchyHeader(HierarchyHeader),
    Pivots(Vec<PivotRecord>),
    PivotFixups(Vec<PivotFixup>),
    AnimationHeader(AnimationHeader),
    AnimationChannel(AnimationChannel),
    BitChannel(BitChannel),
    CompressedAnimationHeader(CompressedAnimationHeader),
    TimecodedChannel(TimecodedChannel),
    AdaptiveDeltaChannel(AdaptiveDeltaChannel),
    AggregateHeader(AggregateHeader),
    AggregateInfo(AggregateInfo),
    AggregateClassInfo(AggregateClassInfo),
    HlodHeader(HlodHeader),
    HlodArrayHeader(HlodArrayHeader),
    HlodSubObject(HlodSubObject),
    Shape(ShapeRecord),
    LightInfo(LightInfo),
    LightTransform(LightTransform),
    /// Payload of a registered kind without a typed layout, kept verbatim
    Raw(Vec<u8>),
}

impl ChunkData {
    /// Short human-readable description used by tree dumps
    pub fn describe(&self) -> String {
        match self {
            ChunkData::MeshHeader(h) => format!(
                "{} ({} tris, {} verts, sort {})",
                h.full_name(),
                h.num_tris,
                h.num_vertices,
                h.sort_level
            ),
            ChunkData::Text(s) => format!("{s:?}"),
            ChunkData::Vectors(v) => count(v.len(), "vector"),
            ChunkData::Ids(v) => {
                if v.len() <= 8 {
                    format!("{v:?}")
                } else {
                    count(v.len(), "id")
                }
            }
            ChunkData::Influences(v) => count(v.len(), "influence"),
            ChunkData::Triangles(v) => count(v.len(), "triangle"),
            ChunkData::Shaders(v) => count(v.len(), "shader"),
            ChunkData::Colors(v) => count(v.len(), "color"),
            ChunkData::Texcoords(v) => count(v.len(), "texcoord"),
            ChunkData::PerFaceTexcoordIds(v) => count(v.len(), "face"),
            ChunkData::Pivots(v) => {
                let names: Vec<&str> = v.iter().map(|p| p.name.as_str()).collect();
                format!("{} [{}]", count(v.len(), "pivot"), names.join(", "))
            }
            ChunkData::PivotFixups(v) => count(v.len(), "fixup"),
            ChunkData::AnimationChannel(c) => format!(
                "pivot {} flags {} frames {}..={} x{}",
                c.pivot, c.flags, c.first_frame, c.last_frame, c.vector_len
            ),
            ChunkData::BitChannel(c) => format!(
                "pivot {} frames {}..={} default {}",
                c.pivot, c.first_frame, c.last_frame, c.default_value
            ),
            ChunkData::TimecodedChannel(c) => format!(
                "pivot {} flags {} {} time codes",
                c.pivot, c.flags, c.num_time_codes
            ),
            ChunkData::AdaptiveDeltaChannel(c) => format!(
                "pivot {} flags {} {} frames",
                c.pivot, c.flags, c.num_frames
            ),
            ChunkData::AggregateInfo(a) => format!(
                "base {:?}, {}",
                a.base_model_name,
                count(a.subobjects.len(), "sub-object")
            ),
            ChunkData::Raw(bytes) => format!("{} raw bytes", bytes.len()),
            other => format!("{other:?}")
                .split_once('(')
                .map(|(_, rest)| rest.trim_end_matches(')').to_string())
                .unwrap_or_default(),
        }
    }
}

fn count(n: usize, what: &str) -> String {
    if n == 1 {
        format!("1 {what}")
    } else {
        format!("{n} {what}s")
    }
}

/// Access to the record stored in a leaf, by type
pub trait LeafRecord {
    /// The record if `data` holds this type
    fn from_data(data: &ChunkData) -> Option<&Self>;
}

macro_rules! leaf_records {
    ($($variant:ident => $ty:ty,)*) => {
        $(
            impl LeafRecord for $ty {
                fn from_data(data: &ChunkData) -> Option<&Self> {
                    match data {
                        ChunkData::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

leaf_records! {
    MeshHeader => MeshHeader3,
    Text => String,
    Vectors => Vec<Vec3>,
    Ids => Vec<u32>,
    Influences => Vec<VertexInfluence>,
    Triangles => Vec<Triangle>,
    MaterialInfo => MaterialInfo,
    Shaders => Vec<Shader>,
    VertexMaterialInfo => VertexMaterialInfo,
    Colors => Vec<[u8; 4]>,
    Texcoords => Vec<Vec2>,
    PerFaceTexcoordIds => Vec<[u32; 3]>,
    TextureInfo => TextureInfo,
    AabtreeHeader => AabtreeHeader,
    HierarchyHeader => HierarchyHeader,
    Pivots => Vec<PivotRecord>,
    PivotFixups => Vec<PivotFixup>,
    AnimationHeader => AnimationHeader,
    AnimationChannel => AnimationChannel,
    BitChannel => BitChannel,
    CompressedAnimationHeader => CompressedAnimationHeader,
    TimecodedChannel => TimecodedChannel,
    AdaptiveDeltaChannel => AdaptiveDeltaChannel,
    AggregateHeader => AggregateHeader,
    AggregateInfo => AggregateInfo,
    AggregateClassInfo => AggregateClassInfo,
    HlodHeader => HlodHeader,
    HlodArrayHeader => HlodArrayHeader,
    HlodSubObject => HlodSubObject,
    Shape => ShapeRecord,
    LightInfo => LightInfo,
    LightTransform => LightTransform,
    Raw => Vec<u8>,
}

/// Body of a chunk node
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkBody {
    /// Ordered child chunks
    Container(Vec<NodeId>),
    /// Decoded payload
    Leaf(ChunkData),
}

/// One chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkNode {
    pub kind: ChunkKind,
    pub body: ChunkBody,
    /// Payload size in bytes, excluding the 8-byte header. Set by decoding
    /// and refreshed by packing.
    pub size: u32,
}

impl ChunkNode {
    pub fn is_container(&self) -> bool {
        matches!(self.body, ChunkBody::Container(_))
    }

    /// Child ids; empty for leaves
    pub fn children(&self) -> &[NodeId] {
        match &self.body {
            ChunkBody::Container(children) => children,
            ChunkBody::Leaf(_) => &[],
        }
    }

    /// Decoded payload; `None` for containers
    pub fn data(&self) -> Option<&ChunkData> {
        match &self.body {
            ChunkBody::Leaf(data) => Some(data),
            ChunkBody::Container(_) => None,
        }
    }
}

/// Arena of chunk nodes plus the ordered top-level chunk list
///
/// Query methods take a `scope`: `None` searches the top-level chunks,
/// `Some(id)` searches the children of a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkTree {
    nodes: Vec<ChunkNode>,
    roots: Vec<NodeId>,
}

impl ChunkTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level chunks, in file order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// # Panics
    /// If `id` was not issued by this tree.
    pub fn node(&self, id: NodeId) -> &ChunkNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ChunkNode {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> ChunkKind {
        self.nodes[id.0].kind
    }

    /// Children of a scope (`None` = top level)
    pub fn children_of(&self, scope: Option<NodeId>) -> &[NodeId] {
        match scope {
            None => &self.roots,
            Some(id) => self.nodes[id.0].children(),
        }
    }

    /// Add a container chunk at the end of `parent`
    pub fn add_container(&mut self, parent: Option<NodeId>, kind: ChunkKind) -> ParseResult<NodeId> {
        self.push(parent, kind, ChunkBody::Container(Vec::new()), 0)
    }

    /// Add a leaf chunk at the end of `parent`
    pub fn add_leaf(
        &mut self,
        parent: Option<NodeId>,
        kind: ChunkKind,
        data: ChunkData,
    ) -> ParseResult<NodeId> {
        self.push(parent, kind, ChunkBody::Leaf(data), 0)
    }

    pub(crate) fn push(
        &mut self,
        parent: Option<NodeId>,
        kind: ChunkKind,
        body: ChunkBody,
        size: u32,
    ) -> ParseResult<NodeId> {
        let id = NodeId(self.nodes.len());
        match parent {
            None => self.roots.push(id),
            Some(p) => match &mut self.nodes[p.0].body {
                ChunkBody::Container(children) => children.push(id),
                ChunkBody::Leaf(_) => {
                    return Err(ParseError::InvalidStructure(format!(
                        "cannot add {kind} under leaf chunk {}",
                        self.nodes[p.0].kind
                    )))
                }
            },
        }
        self.nodes.push(ChunkNode { kind, body, size });
        Ok(id)
    }

    /// First direct child of `scope` with the given kind
    pub fn get(&self, scope: Option<NodeId>, kind: ChunkKind) -> Option<NodeId> {
        self.children_of(scope)
            .iter()
            .copied()
            .find(|&id| self.kind(id) == kind)
    }

    /// First descendant of `scope` with the given kind, depth first
    pub fn get_rec(&self, scope: Option<NodeId>, kind: ChunkKind) -> Option<NodeId> {
        for &id in self.children_of(scope) {
            if self.kind(id) == kind {
                return Some(id);
            }
            if let Some(found) = self.get_rec(Some(id), kind) {
                return Some(found);
            }
        }
        None
    }

    /// All direct children of `scope` with the given kind
    pub fn find(&self, scope: Option<NodeId>, kind: ChunkKind) -> Vec<NodeId> {
        self.children_of(scope)
            .iter()
            .copied()
            .filter(|&id| self.kind(id) == kind)
            .collect()
    }

    /// All descendants of `scope` with the given kind, in pre-order
    pub fn find_rec(&self, scope: Option<NodeId>, kind: ChunkKind) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_rec(scope, kind, &mut out);
        out
    }

    fn collect_rec(&self, scope: Option<NodeId>, kind: ChunkKind, out: &mut Vec<NodeId>) {
        for &id in self.children_of(scope) {
            if self.kind(id) == kind {
                out.push(id);
            }
            self.collect_rec(Some(id), kind, out);
        }
    }

    /// Typed record stored in a leaf
    pub fn record<T: LeafRecord>(&self, id: NodeId) -> Option<&T> {
        self.nodes[id.0].data().and_then(T::from_data)
    }

    /// Typed record of the first direct child of the given kind
    pub fn get_record<T: LeafRecord>(&self, scope: Option<NodeId>, kind: ChunkKind) -> Option<&T> {
        self.get(scope, kind).and_then(|id| self.record(id))
    }

    /// Typed record of the first descendant of the given kind
    pub fn get_record_rec<T: LeafRecord>(
        &self,
        scope: Option<NodeId>,
        kind: ChunkKind,
    ) -> Option<&T> {
        self.get_rec(scope, kind).and_then(|id| self.record(id))
    }

    /// Typed records of every descendant of the given kind
    pub fn find_records_rec<T: LeafRecord>(&self, scope: Option<NodeId>, kind: ChunkKind) -> Vec<&T> {
        self.find_rec(scope, kind)
            .into_iter()
            .filter_map(|id| self.record(id))
            .collect()
    }

    /// Copy the subtrees rooted at `ids` of `source` to the end of this
    /// tree's top level. Returns the new ids of the copied roots.
    pub fn graft(&mut self, source: &ChunkTree, ids: &[NodeId]) -> Vec<NodeId> {
        let mut grafted = Vec::with_capacity(ids.len());
        for &id in ids {
            let new_id = self.copy_subtree(source, id);
            self.roots.push(new_id);
            grafted.push(new_id);
        }
        grafted
    }

    fn copy_subtree(&mut self, source: &ChunkTree, id: NodeId) -> NodeId {
        let node = source.node(id);
        let body = match &node.body {
            ChunkBody::Leaf(data) => ChunkBody::Leaf(data.clone()),
            ChunkBody::Container(children) => {
                let copied = children
                    .iter()
                    .map(|&child| self.copy_subtree(source, child))
                    .collect();
                ChunkBody::Container(copied)
            }
        };

        let new_id = NodeId(self.nodes.len());
        self.nodes.push(ChunkNode {
            kind: node.kind,
            body,
            size: node.size,
        });
        new_id
    }

    /// Indented listing of the tree, `max_depth` levels deep
    pub fn dump(&self, max_depth: usize) -> String {
        let mut out = String::new();
        for &id in &self.roots {
            self.dump_node(id, 0, max_depth, &mut out);
        }
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, max_depth: usize, out: &mut String) {
        let node = self.node(id);
        let indent = "  ".repeat(depth);
        match &node.body {
            ChunkBody::Container(children) => {
                let _ = writeln!(out, "{indent}{} ({} bytes)", node.kind, node.size);
                if depth + 1 < max_depth {
                    for &child in children {
                        self.dump_node(child, depth + 1, max_depth, out);
                    }
                }
            }
            ChunkBody::Leaf(data) => {
                let _ = writeln!(out, "{indent}{} ({} bytes) {}", node.kind, node.size, data.describe());
            }
        }
    }
}
