// w3d-parsers/src/w3d/mod.rs
//! W3D (Westwood 3D) chunk format
//!
//! A W3D file is a flat sequence of chunks. Container chunks hold further
//! chunks, leaf chunks hold a fixed-layout record, an array of records or a
//! NUL-terminated string.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      W3D File Structure                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                   Chunk Header (8 bytes)                ││
//! │  │  - u32 chunk code                                       ││
//! │  │  - u32 payload size (top bit: marker, always set)       ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Chunk Payload                        ││
//! │  │  - container: child chunks, sizes summing to payload    ││
//! │  │  - leaf: record / record array / string                 ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │                          ... repeated                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Top-level chunks are usually MESH, HIERARCHY, ANIMATION,
//! COMPRESSED_ANIMATION, HLOD, AGGREGATE, BOX and LIGHTSCAPE.

mod animation;
mod chunks;
pub mod codec;
mod hierarchy;
mod hlod;
pub mod io;
mod mesh;
mod shapes;

pub use animation::{
    AdaptiveDeltaChannel, AnimationChannel, AnimationHeader, BitChannel,
    CompressedAnimationHeader, TimecodedChannel, FLAVOR_ADAPTIVE_DELTA, FLAVOR_TIMECODED,
};
pub use chunks::{ChunkBody, ChunkData, ChunkNode, ChunkTree, LeafRecord, NodeId};
pub use codec::{decode, encode, pack, parse_nodes, verify_sizes, write};
pub use hierarchy::{HierarchyHeader, PivotFixup, PivotRecord, NO_PARENT};
pub use hlod::{
    AggregateClassInfo, AggregateHeader, AggregateInfo, AggregateSubobject, HlodArrayHeader,
    HlodHeader, HlodSubObject,
};
pub use io::Record;
pub use mesh::{
    version, AabtreeHeader, MaterialInfo, MeshHeader3, Shader, TextureInfo, Triangle,
    VertexInfluence, VertexMaterialInfo,
};
pub use shapes::{LightInfo, LightTransform, ShapeRecord};

use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use crate::logging::instrument_parse;
use crate::traits::{HierarchicalParser, ParseOptions, ParseResult, Parser};
use crate::{log_parse_complete, log_parse_error, log_parse_start};

/// Parser for `.w3d` files
#[derive(Debug, Default, Clone, Copy)]
pub struct W3dParser;

impl W3dParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for W3dParser {
    type Output = ChunkTree;

    fn extensions(&self) -> &[&str] {
        &["w3d"]
    }

    fn name(&self) -> &str {
        "W3D Chunk Parser"
    }

    fn parse_with_options<R: Read>(&self, reader: R, options: &ParseOptions) -> ParseResult<Self::Output> {
        instrument_parse(self.name(), || parse_nodes(reader, options))
    }
}

impl HierarchicalParser for W3dParser {
    type Node = ChunkNode;

    fn roots<'a>(&self, parsed: &'a ChunkTree) -> Vec<&'a ChunkNode> {
        parsed.roots().iter().map(|&id| parsed.node(id)).collect()
    }

    fn children<'a>(&self, parsed: &'a ChunkTree, node: &'a ChunkNode) -> Vec<&'a ChunkNode> {
        node.children().iter().map(|&id| parsed.node(id)).collect()
    }

    fn is_leaf(&self, _parsed: &ChunkTree, node: &ChunkNode) -> bool {
        !node.is_container()
    }
}

/// Load a W3D file with default options
pub fn load(path: &Path) -> ParseResult<ChunkTree> {
    load_with_options(path, &ParseOptions::default())
}

/// Load a W3D file
pub fn load_with_options(path: &Path, options: &ParseOptions) -> ParseResult<ChunkTree> {
    let parser = W3dParser::new();
    log_parse_start!(path);

    let start = Instant::now();
    match parser.parse_file_with_options(path, options) {
        Ok(tree) => {
            log_parse_complete!(path, start.elapsed(), tree);
            Ok(tree)
        }
        Err(e) => {
            let e = e.with_context(path.display().to_string());
            log_parse_error!(path, e);
            Err(e)
        }
    }
}

/// Pack a tree and write it to `path`
pub fn save(tree: &mut ChunkTree, path: &Path) -> ParseResult<()> {
    pack(tree)?;
    let mut wtr = BufWriter::new(std::fs::File::create(path)?);
    write(tree, &mut wtr)?;
    wtr.flush()?;

    tracing::info!(path = %path.display(), nodes = tree.len(), "Wrote W3D file");
    Ok(())
}
