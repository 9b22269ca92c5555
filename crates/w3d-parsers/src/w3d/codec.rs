// w3d-parsers/src/w3d/codec.rs
//! Recursive chunk reader and writer
//!
//! Every chunk starts with an 8-byte header: the chunk code and the payload
//! size, both little-endian `u32`. The top bit of the size word is a marker
//! that writers always set and readers mask off.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, trace, warn};

use super::animation::{
    AdaptiveDeltaChannel, AnimationChannel, BitChannel, TimecodedChannel, FLAVOR_ADAPTIVE_DELTA,
    FLAVOR_TIMECODED,
};
use super::chunks::{ChunkBody, ChunkData, ChunkTree, NodeId};
use super::hierarchy::{PivotFixup, PivotRecord};
use super::hlod::AggregateInfo;
use super::io::{self, Record};
use super::mesh::{AabtreeHeader, Shader, Triangle, VertexInfluence};
use super::shapes::{LightInfo, LightTransform};
use crate::registry::ChunkKind;
use crate::traits::{ParseError, ParseOptions, ParseResult};

/// Size of a chunk header
pub const HEADER_SIZE: u64 = 8;
/// Bits of the size word holding the payload length
pub const SIZE_MASK: u32 = 0x7FFF_FFFF;
/// Marker bit set on every written size word
pub const SIZE_MARKER: u32 = 0x8000_0000;

/// Payload decoder of a leaf kind
pub type Decoder = fn(&[u8]) -> ParseResult<ChunkData>;

/// How the payload of a chunk kind is laid out
#[derive(Clone, Copy)]
pub enum Layout {
    /// Payload is a sequence of child chunks
    Container,
    /// Payload is decoded by a typed decoder
    Leaf(Decoder),
    /// Payload is kept as raw bytes
    Opaque,
}

impl std::fmt::Debug for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Container => f.write_str("Container"),
            Layout::Leaf(_) => f.write_str("Leaf"),
            Layout::Opaque => f.write_str("Opaque"),
        }
    }
}

/// Static layout table.
///
/// `COMPRESSED_ANIMATION_CHANNEL` is listed as opaque: inside a compressed
/// animation its decoder is chosen by the header's flavor instead.
pub fn layout(kind: ChunkKind) -> Layout {
    use ChunkKind as K;

    match kind {
        K::Mesh
        | K::PrelitUnlit
        | K::PrelitVertex
        | K::PrelitLightmapMultiPass
        | K::PrelitLightmapMultiTexture
        | K::VertexMaterials
        | K::VertexMaterial
        | K::Textures
        | K::Texture
        | K::MaterialPass
        | K::TextureStage
        | K::Aabtree
        | K::Hierarchy
        | K::Animation
        | K::CompressedAnimation
        | K::Aggregate
        | K::Hlod
        | K::HlodLodArray
        | K::HlodAggregateArray
        | K::HlodProxyArray
        | K::Lightscape
        | K::LightscapeLight
        | K::Light => Layout::Container,

        K::MeshHeader3 => Layout::Leaf(|p| single(p).map(ChunkData::MeshHeader)),
        K::MeshUserText
        | K::VertexMaterialName
        | K::TextureName
        | K::VertexMapperArgs0
        | K::VertexMapperArgs1 => Layout::Leaf(|p| Ok(ChunkData::Text(io::decode_cstr(p)))),
        K::Vertices | K::VertexNormals => {
            Layout::Leaf(|p| io::read_array::<w3d_core::Vec3>(p, "vector").map(ChunkData::Vectors))
        }
        K::VertexShadeIndices | K::VertexMaterialIds | K::ShaderIds | K::TextureIds => {
            Layout::Leaf(|p| io::read_array::<u32>(p, "id").map(ChunkData::Ids))
        }
        K::VertexInfluences => {
            Layout::Leaf(|p| io::read_array::<VertexInfluence>(p, "influence").map(ChunkData::Influences))
        }
        K::Triangles => {
            Layout::Leaf(|p| io::read_array::<Triangle>(p, "triangle").map(ChunkData::Triangles))
        }
        K::MaterialInfo => Layout::Leaf(|p| single(p).map(ChunkData::MaterialInfo)),
        K::Shaders => Layout::Leaf(|p| io::read_array::<Shader>(p, "shader").map(ChunkData::Shaders)),
        K::VertexMaterialInfo => Layout::Leaf(|p| single(p).map(ChunkData::VertexMaterialInfo)),
        K::Dcg | K::Dig | K::Scg => {
            Layout::Leaf(|p| io::read_array::<[u8; 4]>(p, "color").map(ChunkData::Colors))
        }
        K::StageTexcoords => {
            Layout::Leaf(|p| io::read_array::<w3d_core::Vec2>(p, "texcoord").map(ChunkData::Texcoords))
        }
        K::PerFaceTexcoordIds => Layout::Leaf(|p| {
            io::read_array::<[u32; 3]>(p, "face texcoord id").map(ChunkData::PerFaceTexcoordIds)
        }),
        K::TextureInfo => Layout::Leaf(|p| single(p).map(ChunkData::TextureInfo)),
        K::AabtreeHeader => Layout::Leaf(|p| {
            expect_len(p, AabtreeHeader::SIZE)?;
            AabtreeHeader::read(&mut Cursor::new(p)).map(ChunkData::AabtreeHeader)
        }),

        K::HierarchyHeader => Layout::Leaf(|p| single(p).map(ChunkData::HierarchyHeader)),
        K::Pivots => Layout::Leaf(|p| io::read_array::<PivotRecord>(p, "pivot").map(ChunkData::Pivots)),
        K::PivotFixups => {
            Layout::Leaf(|p| io::read_array::<PivotFixup>(p, "pivot fixup").map(ChunkData::PivotFixups))
        }

        K::AnimationHeader => Layout::Leaf(|p| single(p).map(ChunkData::AnimationHeader)),
        K::AnimationChannel => Layout::Leaf(|p| AnimationChannel::decode(p).map(ChunkData::AnimationChannel)),
        K::BitChannel => Layout::Leaf(|p| BitChannel::decode(p).map(ChunkData::BitChannel)),
        K::CompressedAnimationHeader => {
            Layout::Leaf(|p| single(p).map(ChunkData::CompressedAnimationHeader))
        }

        K::AggregateHeader => Layout::Leaf(|p| single(p).map(ChunkData::AggregateHeader)),
        K::AggregateInfo => Layout::Leaf(|p| AggregateInfo::decode(p).map(ChunkData::AggregateInfo)),
        K::AggregateClassInfo => Layout::Leaf(|p| single(p).map(ChunkData::AggregateClassInfo)),

        K::HlodHeader => Layout::Leaf(|p| single(p).map(ChunkData::HlodHeader)),
        K::HlodSubObjectArrayHeader => Layout::Leaf(|p| single(p).map(ChunkData::HlodArrayHeader)),
        K::HlodSubObject => Layout::Leaf(|p| single(p).map(ChunkData::HlodSubObject)),

        K::Box | K::Sphere | K::Ring => Layout::Leaf(|p| single(p).map(ChunkData::Shape)),

        K::LightInfo => Layout::Leaf(|p| {
            expect_len(p, LightInfo::SIZE)?;
            LightInfo::read(&mut Cursor::new(p)).map(ChunkData::LightInfo)
        }),
        K::LightTransform => Layout::Leaf(|p| {
            expect_len(p, LightTransform::SIZE)?;
            LightTransform::read(&mut Cursor::new(p)).map(ChunkData::LightTransform)
        }),

        _ => Layout::Opaque,
    }
}

fn expect_len(payload: &[u8], size: usize) -> ParseResult<()> {
    if payload.len() != size {
        return Err(ParseError::LengthMismatch {
            context: "fixed-size record".to_string(),
            expected: size,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn single<T: Record>(payload: &[u8]) -> ParseResult<T> {
    expect_len(payload, T::SIZE)?;
    T::read(&mut Cursor::new(payload))
}

/// Byte stream with a running offset, for error reporting
struct ChunkReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> ChunkReader<R> {
    /// Next header, or `None` when the stream ends cleanly before it
    fn read_header(&mut self) -> ParseResult<Option<(u32, u32)>> {
        let mut buf = [0u8; 8];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(None),
            8 => {
                self.pos += HEADER_SIZE;
                let mut rdr = Cursor::new(buf);
                let code = rdr.read_u32::<LittleEndian>()?;
                let size = rdr.read_u32::<LittleEndian>()? & SIZE_MASK;
                Ok(Some((code, size)))
            }
            n => Err(ParseError::CorruptedData {
                offset: self.pos,
                message: format!("truncated chunk header ({n} of 8 bytes)"),
            }),
        }
    }

    fn read_payload(&mut self, size: u32) -> ParseResult<Vec<u8>> {
        let mut payload = Vec::new();
        let read = (&mut self.inner).take(u64::from(size)).read_to_end(&mut payload)?;
        if read != size as usize {
            return Err(ParseError::CorruptedData {
                offset: self.pos,
                message: format!("payload truncated: expected {size} bytes, found {read}"),
            });
        }
        self.pos += u64::from(size);
        Ok(payload)
    }

    fn skip(&mut self, size: u32) -> ParseResult<()> {
        let skipped = std::io::copy(&mut (&mut self.inner).take(u64::from(size)), &mut std::io::sink())?;
        if skipped != u64::from(size) {
            return Err(ParseError::CorruptedData {
                offset: self.pos,
                message: format!("cannot skip {size} bytes, only {skipped} left"),
            });
        }
        self.pos += skipped;
        Ok(())
    }
}

struct TreeDecoder<'a, R> {
    rdr: ChunkReader<R>,
    options: &'a ParseOptions,
    tree: ChunkTree,
}

impl<R: Read> TreeDecoder<'_, R> {
    /// Read chunks into `parent` until `budget` bytes are used up, or, at
    /// top level (`budget == None`), until the stream ends.
    fn parse_nodes(&mut self, parent: Option<NodeId>, budget: Option<u64>, depth: u32) -> ParseResult<()> {
        let parent_kind = parent.map(|p| self.tree.kind(p));
        let mut remaining = budget;
        let mut flavor: Option<u16> = None;

        loop {
            if remaining == Some(0) {
                break;
            }

            let offset = self.rdr.pos;
            let Some((code, size)) = self.rdr.read_header()? else {
                if let Some(left) = remaining {
                    return Err(ParseError::CorruptedData {
                        offset,
                        message: format!("stream ended with {left} bytes of the enclosing chunk unread"),
                    });
                }
                break;
            };

            if let Some(left) = remaining {
                let total = HEADER_SIZE + u64::from(size);
                if total > left {
                    return Err(ParseError::CorruptedData {
                        offset,
                        message: format!(
                            "chunk 0x{code:08X} of {size} bytes overruns its container ({left} bytes left)"
                        ),
                    });
                }
                remaining = Some(left - total);
            }

            let Some(kind) = ChunkKind::from_code(code) else {
                let Some(container) = parent_kind.filter(|_| self.options.skip_unknown_chunks) else {
                    return Err(ParseError::UnknownChunkType { chunk_type: code, offset });
                };
                warn!(
                    code = format_args!("0x{code:08X}"),
                    size,
                    offset,
                    container = %container,
                    "Skipping unknown chunk"
                );
                self.rdr.skip(size)?;
                continue;
            };

            trace!(kind = %kind, size, offset, "chunk");

            if parent_kind == Some(ChunkKind::CompressedAnimation)
                && kind == ChunkKind::CompressedAnimationChannel
            {
                let payload = self.rdr.read_payload(size)?;
                let data = match flavor {
                    Some(FLAVOR_TIMECODED) => TimecodedChannel::decode(&payload).map(ChunkData::TimecodedChannel),
                    Some(FLAVOR_ADAPTIVE_DELTA) => {
                        AdaptiveDeltaChannel::decode(&payload).map(ChunkData::AdaptiveDeltaChannel)
                    }
                    other => {
                        warn!(flavor = ?other, offset, "Skipping compressed channel of unknown flavor");
                        continue;
                    }
                }
                .map_err(|e| e.with_context(format!("{kind} at offset {offset}")))?;
                self.tree.push(parent, kind, ChunkBody::Leaf(data), size)?;
                continue;
            }

            match layout(kind) {
                Layout::Container => {
                    if depth >= self.options.max_nesting_depth {
                        return Err(ParseError::InvalidStructure(format!(
                            "{kind} at offset {offset} nests deeper than {} levels",
                            self.options.max_nesting_depth
                        )));
                    }
                    let id = self.tree.push(parent, kind, ChunkBody::Container(Vec::new()), size)?;
                    let start = self.rdr.pos;
                    self.parse_nodes(Some(id), Some(u64::from(size)), depth + 1)?;

                    let consumed = self.rdr.pos - start;
                    if consumed != u64::from(size) {
                        return Err(ParseError::CorruptedData {
                            offset,
                            message: format!("{kind} declared {size} bytes but {consumed} were read"),
                        });
                    }
                }
                Layout::Leaf(decode) => {
                    let payload = self.rdr.read_payload(size)?;
                    let data =
                        decode(&payload).map_err(|e| e.with_context(format!("{kind} at offset {offset}")))?;
                    if let ChunkData::CompressedAnimationHeader(header) = &data {
                        flavor = Some(header.flavor);
                    }
                    self.tree.push(parent, kind, ChunkBody::Leaf(data), size)?;
                }
                Layout::Opaque => {
                    let payload = self.rdr.read_payload(size)?;
                    self.tree.push(parent, kind, ChunkBody::Leaf(ChunkData::Raw(payload)), size)?;
                }
            }
        }

        Ok(())
    }
}

/// Decode a whole chunk stream.
pub fn parse_nodes<R: Read>(reader: R, options: &ParseOptions) -> ParseResult<ChunkTree> {
    let mut decoder = TreeDecoder {
        rdr: ChunkReader { inner: reader, pos: 0 },
        options,
        tree: ChunkTree::new(),
    };
    decoder.parse_nodes(None, None, 0)?;

    debug!(
        nodes = decoder.tree.len(),
        top_level = decoder.tree.roots().len(),
        bytes = decoder.rdr.pos,
        "Decoded chunk tree"
    );
    Ok(decoder.tree)
}

/// Decode an in-memory chunk stream with default options.
pub fn decode(bytes: &[u8]) -> ParseResult<ChunkTree> {
    parse_nodes(Cursor::new(bytes), &ParseOptions::default())
}

/// Encoded payload of a leaf.
pub fn encode_payload(kind: ChunkKind, data: &ChunkData) -> ParseResult<Vec<u8>> {
    let mut buf = Vec::new();
    match data {
        ChunkData::MeshHeader(h) => h.write(&mut buf)?,
        ChunkData::Text(s) => buf = io::encode_cstr(s),
        ChunkData::Vectors(v) => io::write_array(v, &mut buf)?,
        ChunkData::Ids(v) => io::write_array(v, &mut buf)?,
        ChunkData::Influences(v) => io::write_array(v, &mut buf)?,
        ChunkData::Triangles(v) => io::write_array(v, &mut buf)?,
        ChunkData::MaterialInfo(m) => m.write(&mut buf)?,
        ChunkData::Shaders(v) => io::write_array(v, &mut buf)?,
        ChunkData::VertexMaterialInfo(m) => m.write(&mut buf)?,
        ChunkData::Colors(v) => io::write_array(v, &mut buf)?,
        ChunkData::Texcoords(v) => io::write_array(v, &mut buf)?,
        ChunkData::PerFaceTexcoordIds(v) => io::write_array(v, &mut buf)?,
        ChunkData::TextureInfo(t) => t.write(&mut buf)?,
        ChunkData::HierarchyHeader(h) => h.write(&mut buf)?,
        ChunkData::Pivots(v) => io::write_array(v, &mut buf)?,
        ChunkData::PivotFixups(v) => io::write_array(v, &mut buf)?,
        ChunkData::AnimationHeader(h) => h.write(&mut buf)?,
        ChunkData::AnimationChannel(c) => c.encode(&mut buf)?,
        ChunkData::CompressedAnimationHeader(h) => h.write(&mut buf)?,
        ChunkData::AggregateHeader(h) => h.write(&mut buf)?,
        ChunkData::AggregateInfo(a) => a.encode(&mut buf)?,
        ChunkData::AggregateClassInfo(c) => c.write(&mut buf)?,
        ChunkData::HlodHeader(h) => h.write(&mut buf)?,
        ChunkData::HlodArrayHeader(h) => h.write(&mut buf)?,
        ChunkData::HlodSubObject(s) => s.write(&mut buf)?,
        ChunkData::Shape(s) => s.write(&mut buf)?,
        ChunkData::Raw(bytes) => buf.extend_from_slice(bytes),
        ChunkData::AabtreeHeader(_)
        | ChunkData::BitChannel(_)
        | ChunkData::TimecodedChannel(_)
        | ChunkData::AdaptiveDeltaChannel(_)
        | ChunkData::LightInfo(_)
        | ChunkData::LightTransform(_) => {
            return Err(ParseError::EncodeNotImplemented { chunk: kind.name() })
        }
    }
    Ok(buf)
}

/// Recompute every reachable node's payload size, bottom-up.
pub fn pack(tree: &mut ChunkTree) -> ParseResult<()> {
    let roots = tree.roots().to_vec();
    for id in roots {
        pack_node(tree, id)?;
    }
    Ok(())
}

fn pack_node(tree: &mut ChunkTree, id: NodeId) -> ParseResult<u32> {
    let node = tree.node(id);
    let kind = node.kind;
    let size: u64 = match &node.body {
        ChunkBody::Leaf(data) => encode_payload(kind, data)?.len() as u64,
        ChunkBody::Container(children) => {
            let children = children.clone();
            let mut total = 0u64;
            for child in children {
                total += HEADER_SIZE + u64::from(pack_node(tree, child)?);
            }
            total
        }
    };

    let size = u32::try_from(size)
        .ok()
        .filter(|&s| s <= SIZE_MASK)
        .ok_or_else(|| ParseError::InvalidStructure(format!("{kind} payload of {size} bytes exceeds 31 bits")))?;
    tree.node_mut(id).size = size;
    Ok(size)
}

/// Write a packed tree.
pub fn write<W: Write>(tree: &ChunkTree, wtr: &mut W) -> ParseResult<()> {
    for &id in tree.roots() {
        write_node(tree, id, wtr)?;
    }
    Ok(())
}

fn write_node<W: Write>(tree: &ChunkTree, id: NodeId, wtr: &mut W) -> ParseResult<()> {
    let node = tree.node(id);
    wtr.write_u32::<LittleEndian>(node.kind.code())?;
    wtr.write_u32::<LittleEndian>(node.size | SIZE_MARKER)?;

    match &node.body {
        ChunkBody::Leaf(data) => {
            let payload = encode_payload(node.kind, data)?;
            if payload.len() != node.size as usize {
                return Err(ParseError::InvalidStructure(format!(
                    "{} encodes to {} bytes but was packed as {}; pack the tree before writing",
                    node.kind,
                    payload.len(),
                    node.size
                )));
            }
            wtr.write_all(&payload)?;
        }
        ChunkBody::Container(children) => {
            for &child in children {
                write_node(tree, child, wtr)?;
            }
        }
    }
    Ok(())
}

/// Pack and write a tree into a byte vector.
pub fn encode(tree: &mut ChunkTree) -> ParseResult<Vec<u8>> {
    pack(tree)?;
    let mut out = Vec::new();
    write(tree, &mut out)?;
    Ok(out)
}

/// Check that every container's size equals the sum of its children's
/// header and payload sizes.
pub fn verify_sizes(tree: &ChunkTree) -> ParseResult<()> {
    let mut stack: Vec<NodeId> = tree.roots().to_vec();
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        if let ChunkBody::Container(children) = &node.body {
            let sum: u64 = children
                .iter()
                .map(|&c| HEADER_SIZE + u64::from(tree.node(c).size))
                .sum();
            if sum != u64::from(node.size) {
                return Err(ParseError::InvalidStructure(format!(
                    "{} declares {} bytes but its children occupy {sum}",
                    node.kind, node.size
                )));
            }
            stack.extend_from_slice(children);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::w3d::CompressedAnimationHeader;

    fn chunk(code: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&code.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32 | SIZE_MARKER).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_size_marker_is_masked() {
        let bytes = chunk(ChunkKind::TextureName.code(), b"tex.tga\0");
        let tree = decode(&bytes).unwrap();

        let id = tree.roots()[0];
        assert_eq!(tree.node(id).size, 8);
        assert_eq!(tree.record::<String>(id).unwrap(), "tex.tga");
    }

    #[test]
    fn test_unknown_top_level_chunk_is_fatal() {
        let bytes = chunk(0x0000_0001, &[0; 4]);
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, ParseError::UnknownChunkType { chunk_type: 1, offset: 0 }));
    }

    #[test]
    fn test_unknown_nested_chunk_is_skipped() {
        let mut inner = chunk(0x0000_0001, &[1, 2, 3]);
        inner.extend(chunk(ChunkKind::TextureName.code(), b"a\0"));
        let bytes = chunk(ChunkKind::Texture.code(), &inner);

        let tree = decode(&bytes).unwrap();
        let texture = tree.roots()[0];
        assert_eq!(tree.node(texture).children().len(), 1);
        assert_eq!(tree.kind(tree.node(texture).children()[0]), ChunkKind::TextureName);

        let strict = parse_nodes(Cursor::new(&bytes), &ParseOptions::strict());
        assert!(matches!(strict, Err(ParseError::UnknownChunkType { .. })));
    }

    #[test]
    fn test_known_kind_without_layout_is_kept_raw() {
        let bytes = chunk(ChunkKind::EmitterHeader.code(), &[9, 8, 7]);
        let mut tree = decode(&bytes).unwrap();

        assert_eq!(tree.record::<Vec<u8>>(tree.roots()[0]).unwrap(), &vec![9, 8, 7]);
        assert_eq!(encode(&mut tree).unwrap(), bytes);
    }

    #[test]
    fn test_child_overrunning_container_is_corrupt() {
        let mut inner = chunk(ChunkKind::TextureName.code(), b"abc\0");
        inner.truncate(inner.len() - 1);
        let mut bytes = chunk(ChunkKind::Texture.code(), &inner);
        bytes.push(0);

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, ParseError::CorruptedData { .. }));
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        let mut bytes = chunk(ChunkKind::TextureName.code(), b"a\0");
        bytes.extend_from_slice(&[0x32, 0, 0]);

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, ParseError::CorruptedData { offset: 10, .. }));
    }

    #[test]
    fn test_nesting_limit() {
        let mut bytes = chunk(ChunkKind::TextureName.code(), b"a\0");
        for _ in 0..3 {
            bytes = chunk(ChunkKind::Texture.code(), &bytes);
        }
        let options = ParseOptions {
            max_nesting_depth: 2,
            ..ParseOptions::default()
        };

        let err = parse_nodes(Cursor::new(&bytes), &options).unwrap_err();
        assert!(matches!(err, ParseError::InvalidStructure(_)));
        assert!(parse_nodes(Cursor::new(&bytes), &ParseOptions::default()).is_ok());
    }

    #[test]
    fn test_fixed_record_with_wrong_length() {
        let bytes = chunk(ChunkKind::MaterialInfo.code(), &[0; 12]);
        let err = decode(&bytes).unwrap_err();

        assert!(matches!(
            err.root_cause(),
            ParseError::LengthMismatch { expected: 16, actual: 12, .. }
        ));
    }

    #[test]
    fn test_read_only_kind_fails_only_when_packed() {
        let mut payload = vec![0u8; 9];
        payload[2] = 1; // last frame
        payload.push(0b11);
        let bytes = chunk(
            ChunkKind::Animation.code(),
            &chunk(ChunkKind::BitChannel.code(), &payload),
        );

        let mut tree = decode(&bytes).unwrap();
        let err = encode(&mut tree).unwrap_err();
        assert!(matches!(err, ParseError::EncodeNotImplemented { chunk: "BIT_CHANNEL" }));

        let mut empty = ChunkTree::new();
        empty.add_container(None, ChunkKind::Animation).unwrap();
        assert_eq!(encode(&mut empty).unwrap().len(), 8);
    }

    #[test]
    fn test_compressed_channel_follows_flavor() {
        let mut header = Vec::new();
        CompressedAnimationHeader {
            version: 0,
            name: "WALK".to_string(),
            hierarchy_name: "BODY".to_string(),
            num_frames: 10,
            frame_rate: 15,
            flavor: FLAVOR_TIMECODED,
        }
        .write(&mut header)
        .unwrap();

        let mut channel = Vec::new();
        channel.extend_from_slice(&2u32.to_le_bytes());
        channel.extend_from_slice(&3u16.to_le_bytes());
        channel.extend_from_slice(&[1, 0]);
        channel.extend_from_slice(&[0xAA; 16]);

        let mut inner = chunk(ChunkKind::CompressedAnimationHeader.code(), &header);
        inner.extend(chunk(ChunkKind::CompressedAnimationChannel.code(), &channel));
        let tree = decode(&chunk(ChunkKind::CompressedAnimation.code(), &inner)).unwrap();

        let anim = tree.roots()[0];
        let id = tree.get(Some(anim), ChunkKind::CompressedAnimationChannel).unwrap();
        let decoded = tree.record::<TimecodedChannel>(id).unwrap();
        assert_eq!(decoded.num_time_codes, 2);
        assert_eq!(decoded.pivot, 3);
        assert_eq!(decoded.data.len(), 16);
    }

    #[test]
    fn test_compressed_channel_before_header_is_skipped() {
        let inner = chunk(ChunkKind::CompressedAnimationChannel.code(), &[0; 8]);
        let tree = decode(&chunk(ChunkKind::CompressedAnimation.code(), &inner)).unwrap();

        assert!(tree.node(tree.roots()[0]).children().is_empty());
    }

    #[test]
    fn test_pack_sets_container_sizes() {
        let mut tree = ChunkTree::new();
        let texture = tree.add_container(None, ChunkKind::Texture).unwrap();
        tree.add_leaf(Some(texture), ChunkKind::TextureName, ChunkData::Text("abc".to_string()))
            .unwrap();

        pack(&mut tree).unwrap();
        assert_eq!(tree.node(texture).size, 8 + 4);
        verify_sizes(&tree).unwrap();

        let mut out = Vec::new();
        write(&tree, &mut out).unwrap();
        assert_eq!(&out[4..8], &(12u32 | SIZE_MARKER).to_le_bytes());
    }

    #[test]
    fn test_write_without_pack_is_rejected() {
        let mut tree = ChunkTree::new();
        tree.add_leaf(None, ChunkKind::TextureName, ChunkData::Text("abc".to_string()))
            .unwrap();

        let err = write(&tree, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidStructure(_)));
    }
}
