//! Integration tests for the W3D chunk codec
//!
//! These tests cover:
//! - Decoding hand-built byte streams
//! - Size bookkeeping after decode and after packing
//! - Encode/decode of every writable leaf record, including empty arrays
//!   and names that fill their fixed-width field
//! - Read-only records refusing to encode
//! - Encode/decode of string fields and vertex arrays (proptest)
//! - File round trips through `save` and `load`

use proptest::prelude::*;
use tempfile::TempDir;

use w3d_core::{BoundingBox, Rgb, Vec2, Vec3};
use w3d_parsers::w3d::{
    self, AabtreeHeader, AdaptiveDeltaChannel, AggregateClassInfo, AggregateHeader, AggregateInfo,
    AggregateSubobject, AnimationChannel, AnimationHeader, BitChannel, ChunkData, ChunkTree,
    CompressedAnimationHeader, HierarchyHeader, HlodArrayHeader, HlodHeader, HlodSubObject, LightInfo,
    LightTransform, MaterialInfo, MeshHeader3, PivotFixup, PivotRecord, Shader, ShapeRecord,
    TextureInfo, TimecodedChannel, Triangle, VertexInfluence, VertexMaterialInfo, FLAVOR_TIMECODED,
};
use w3d_parsers::{ChunkKind, ParseError, ParseOptions};

/// Helper to build a chunk header
fn header(kind: ChunkKind, size: u32, container: bool) -> Vec<u8> {
    let mut out = kind.code().to_le_bytes().to_vec();
    let size = if container { size | 0x8000_0000 } else { size };
    out.extend_from_slice(&size.to_le_bytes());
    out
}

/// Helper to build a small mesh with a header, user text and vertices
fn make_mesh_tree(name: &str, text: &str, vertices: Vec<Vec3>) -> ChunkTree {
    let mut tree = ChunkTree::new();
    let mesh = tree.add_container(None, ChunkKind::Mesh).unwrap();
    tree.add_leaf(
        Some(mesh),
        ChunkKind::MeshHeader3,
        ChunkData::MeshHeader(MeshHeader3 {
            mesh_name: name.to_string(),
            container_name: "BOX".to_string(),
            num_vertices: vertices.len() as u32,
            ..MeshHeader3::default()
        }),
    )
    .unwrap();
    tree.add_leaf(Some(mesh), ChunkKind::MeshUserText, ChunkData::Text(text.to_string()))
        .unwrap();
    tree.add_leaf(Some(mesh), ChunkKind::Vertices, ChunkData::Vectors(vertices))
        .unwrap();
    tree
}

mod decode_tests {
    use super::*;

    #[test]
    fn test_decode_container_with_text_leaf() {
        let mut bytes = header(ChunkKind::Mesh, 8 + 6, true);
        bytes.extend(header(ChunkKind::MeshUserText, 6, false));
        bytes.extend_from_slice(b"hello\0");

        let tree = w3d::decode(&bytes).unwrap();
        assert_eq!(tree.len(), 2);

        let mesh = tree.get(None, ChunkKind::Mesh).unwrap();
        assert_eq!(tree.node(mesh).size, 14);
        assert_eq!(
            tree.get_record::<String>(Some(mesh), ChunkKind::MeshUserText).map(String::as_str),
            Some("hello")
        );
    }

    #[test]
    fn test_decoded_sizes_are_consistent() {
        let mut bytes = header(ChunkKind::Hierarchy, 8 + 4, true);
        bytes.extend(header(ChunkKind::Pivots, 4, false));
        bytes.extend_from_slice(&[0; 4]);
        // PIVOTS payload of 4 bytes is not a whole pivot record
        assert!(w3d::decode(&bytes).is_err());

        let mut tree = make_mesh_tree("CUBE", "note", vec![Vec3::ONE; 3]);
        let encoded = w3d::encode(&mut tree).unwrap();
        let decoded = w3d::decode(&encoded).unwrap();

        w3d::verify_sizes(&decoded).unwrap();
        let mesh = decoded.get(None, ChunkKind::Mesh).unwrap();
        assert_eq!(u64::from(decoded.node(mesh).size) + 8, encoded.len() as u64);
    }

    #[test]
    fn test_container_size_not_covered_by_children() {
        // MESH claims 4 bytes but its child header alone needs 8
        let mut bytes = header(ChunkKind::Mesh, 4, true);
        bytes.extend(header(ChunkKind::MeshUserText, 0, false));

        assert!(w3d::decode(&bytes).is_err());
    }

    #[test]
    fn test_unknown_top_level_chunk_is_fatal() {
        let mut bytes = 0xDEAD_BEEFu32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let err = w3d::decode(&bytes).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ParseError::UnknownChunkType { chunk_type: 0xDEAD_BEEF, offset: 0 }
        ));
    }

    #[test]
    fn test_strict_options_reject_nested_unknown_chunk() {
        let mut bytes = header(ChunkKind::Mesh, 8, true);
        bytes.extend_from_slice(&0x0000_7777u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let lenient = w3d::parse_nodes(bytes.as_slice(), &ParseOptions::default()).unwrap();
        assert_eq!(lenient.len(), 1);

        let strict = w3d::parse_nodes(bytes.as_slice(), &ParseOptions::strict());
        assert!(strict.is_err());
    }

    #[test]
    fn test_empty_input_is_empty_tree() {
        let tree = w3d::decode(&[]).unwrap();
        assert!(tree.is_empty());
    }
}

/// A name that fills a 16-byte field up to its terminator
const SHORT_MAX: &str = "ABCDEFGHIJKLMNO";
/// A name that fills a 32-byte field up to its terminator
const LONG_MAX: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ01234";

/// One writable leaf per entry, with the kind it is stored under
fn make_writable_leaves() -> Vec<(&'static str, ChunkKind, ChunkData)> {
    let triangle = Triangle {
        vindex: [0, 1, 2],
        attributes: 13,
        normal: Vec3::new(0.0, 0.0, 1.0),
        dist: -2.5,
    };
    let shader = Shader {
        depth_compare: 3,
        dest_blend: 2,
        src_blend: 1,
        texturing: 1,
        alpha_test: 1,
        ..Shader::default()
    };
    let mut rooted = PivotRecord::new(SHORT_MAX, Some(0));
    rooted.translation = Vec3::new(1.0, -2.0, 0.5);
    rooted.euler_angles = Vec3::new(0.25, 0.0, -0.75);

    vec![
        (
            "mesh header",
            ChunkKind::MeshHeader3,
            ChunkData::MeshHeader(MeshHeader3 {
                attributes: 0x0002_0000,
                mesh_name: SHORT_MAX.to_string(),
                container_name: "TANK".to_string(),
                num_tris: 12,
                num_vertices: 8,
                num_materials: 1,
                sort_level: -3,
                bounds: BoundingBox::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::ONE),
                sph_center: Vec3::ZERO,
                sph_radius: 1.75,
                ..MeshHeader3::default()
            }),
        ),
        ("user text", ChunkKind::MeshUserText, ChunkData::Text("Prelit=1".to_string())),
        ("empty text", ChunkKind::TextureName, ChunkData::Text(String::new())),
        ("mapper args", ChunkKind::VertexMapperArgs0, ChunkData::Text("UPerSec=0.5\nVPerSec=0".to_string())),
        ("vertices", ChunkKind::Vertices, ChunkData::Vectors(vec![Vec3::ONE, Vec3::new(-4.0, 0.5, 8.0)])),
        ("no normals", ChunkKind::VertexNormals, ChunkData::Vectors(Vec::new())),
        ("shade indices", ChunkKind::VertexShadeIndices, ChunkData::Ids(vec![0, 1, 1, u32::MAX])),
        ("no texture ids", ChunkKind::TextureIds, ChunkData::Ids(Vec::new())),
        (
            "influences",
            ChunkKind::VertexInfluences,
            ChunkData::Influences(vec![VertexInfluence { bone: 3, extra_bone: 0 }]),
        ),
        ("no influences", ChunkKind::VertexInfluences, ChunkData::Influences(Vec::new())),
        ("triangles", ChunkKind::Triangles, ChunkData::Triangles(vec![triangle.clone(), triangle])),
        ("no triangles", ChunkKind::Triangles, ChunkData::Triangles(Vec::new())),
        (
            "material info",
            ChunkKind::MaterialInfo,
            ChunkData::MaterialInfo(MaterialInfo {
                pass_count: 2,
                vertex_material_count: 3,
                shader_count: 1,
                texture_count: 4,
            }),
        ),
        ("shaders", ChunkKind::Shaders, ChunkData::Shaders(vec![shader, Shader::default()])),
        ("no shaders", ChunkKind::Shaders, ChunkData::Shaders(Vec::new())),
        (
            "vertex material",
            ChunkKind::VertexMaterialInfo,
            ChunkData::VertexMaterialInfo(VertexMaterialInfo {
                attributes: 1,
                diffuse: Rgb::new(200, 10, 30),
                shininess: 0.5,
                opacity: 0.25,
                ..VertexMaterialInfo::default()
            }),
        ),
        ("diffuse colors", ChunkKind::Dcg, ChunkData::Colors(vec![[255, 0, 128, 255], [1, 2, 3, 4]])),
        ("no specular colors", ChunkKind::Scg, ChunkData::Colors(Vec::new())),
        (
            "texcoords",
            ChunkKind::StageTexcoords,
            ChunkData::Texcoords(vec![Vec2::new(0.0, 1.0), Vec2::new(0.5, -0.25)]),
        ),
        ("no texcoords", ChunkKind::StageTexcoords, ChunkData::Texcoords(Vec::new())),
        (
            "face texcoord ids",
            ChunkKind::PerFaceTexcoordIds,
            ChunkData::PerFaceTexcoordIds(vec![[0, 1, 2], [2, 3, 0]]),
        ),
        ("no face texcoord ids", ChunkKind::PerFaceTexcoordIds, ChunkData::PerFaceTexcoordIds(Vec::new())),
        (
            "texture info",
            ChunkKind::TextureInfo,
            ChunkData::TextureInfo(TextureInfo {
                attributes: 0x0010,
                anim_type: 2,
                frame_count: 8,
                frame_rate: 15.0,
            }),
        ),
        (
            "hierarchy header",
            ChunkKind::HierarchyHeader,
            ChunkData::HierarchyHeader(HierarchyHeader {
                name: SHORT_MAX.to_string(),
                num_pivots: 2,
                center: Vec3::new(0.0, 0.0, 3.5),
                ..HierarchyHeader::default()
            }),
        ),
        (
            "pivots",
            ChunkKind::Pivots,
            ChunkData::Pivots(vec![PivotRecord::new("ROOTTRANSFORM", None), rooted]),
        ),
        ("no pivots", ChunkKind::Pivots, ChunkData::Pivots(Vec::new())),
        (
            "pivot fixups",
            ChunkKind::PivotFixups,
            ChunkData::PivotFixups(vec![PivotFixup {
                rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, -0.5, 2.0]],
            }]),
        ),
        ("no pivot fixups", ChunkKind::PivotFixups, ChunkData::PivotFixups(Vec::new())),
        (
            "animation header",
            ChunkKind::AnimationHeader,
            ChunkData::AnimationHeader(AnimationHeader {
                version: w3d::version(4, 1),
                name: SHORT_MAX.to_string(),
                hierarchy_name: "SKEL".to_string(),
                num_frames: 30,
                frame_rate: 15,
            }),
        ),
        (
            "animation channel",
            ChunkKind::AnimationChannel,
            ChunkData::AnimationChannel(AnimationChannel {
                first_frame: 2,
                last_frame: 4,
                vector_len: 1,
                flags: 0,
                pivot: 1,
                data: (0u8..12).collect(),
            }),
        ),
        (
            "compressed animation header",
            ChunkKind::CompressedAnimationHeader,
            ChunkData::CompressedAnimationHeader(CompressedAnimationHeader {
                version: w3d::version(0, 1),
                name: SHORT_MAX.to_string(),
                hierarchy_name: SHORT_MAX.to_string(),
                num_frames: 60,
                frame_rate: 30,
                flavor: FLAVOR_TIMECODED,
            }),
        ),
        (
            "aggregate header",
            ChunkKind::AggregateHeader,
            ChunkData::AggregateHeader(AggregateHeader {
                version: 1,
                name: SHORT_MAX.to_string(),
            }),
        ),
        (
            "aggregate info",
            ChunkKind::AggregateInfo,
            ChunkData::AggregateInfo(AggregateInfo {
                base_model_name: LONG_MAX.to_string(),
                subobjects: vec![AggregateSubobject {
                    subobject_name: LONG_MAX.to_string(),
                    bone_name: "TURRET".to_string(),
                }],
            }),
        ),
        (
            "aggregate info without sub-objects",
            ChunkKind::AggregateInfo,
            ChunkData::AggregateInfo(AggregateInfo {
                base_model_name: "TANK".to_string(),
                subobjects: Vec::new(),
            }),
        ),
        (
            "aggregate class info",
            ChunkKind::AggregateClassInfo,
            ChunkData::AggregateClassInfo(AggregateClassInfo {
                original_class_id: 0x5A,
                flags: 1,
            }),
        ),
        (
            "hlod header",
            ChunkKind::HlodHeader,
            ChunkData::HlodHeader(HlodHeader {
                lod_count: 2,
                name: SHORT_MAX.to_string(),
                hierarchy_name: SHORT_MAX.to_string(),
                ..HlodHeader::default()
            }),
        ),
        (
            "hlod array header",
            ChunkKind::HlodSubObjectArrayHeader,
            ChunkData::HlodArrayHeader(HlodArrayHeader {
                model_count: 3,
                max_screen_size: 0.5,
            }),
        ),
        ("hlod sub-object", ChunkKind::HlodSubObject, ChunkData::HlodSubObject(HlodSubObject::new(7, LONG_MAX))),
        (
            "box",
            ChunkKind::Box,
            ChunkData::Shape(ShapeRecord {
                version: 1,
                attributes: 0x10,
                name: LONG_MAX.to_string(),
                color: Rgb::new(0, 128, 255),
                center: Vec3::new(0.0, 0.0, 1.0),
                extent: Vec3::new(2.0, 1.0, 0.5),
            }),
        ),
        ("opaque", ChunkKind::EmitterHeader, ChunkData::Raw(vec![9, 8, 7, 6, 5])),
    ]
}

mod roundtrip_tests {
    use super::*;

    #[test]
    fn test_every_writable_leaf_survives_encoding() {
        for (label, kind, data) in make_writable_leaves() {
            let mut tree = ChunkTree::new();
            tree.add_leaf(None, kind, data.clone()).unwrap();

            let encoded = w3d::encode(&mut tree).unwrap_or_else(|e| panic!("{label}: {e}"));
            let decoded = w3d::decode(&encoded).unwrap_or_else(|e| panic!("{label}: {e}"));

            assert_eq!(decoded, tree, "{label}");
            let id = decoded.roots()[0];
            assert_eq!(decoded.kind(id), kind, "{label}");
            assert_eq!(decoded.node(id).size as usize + 8, encoded.len(), "{label}");
        }
    }

    #[test]
    fn test_writable_leaves_survive_inside_containers() {
        let mut tree = ChunkTree::new();
        let mesh = tree.add_container(None, ChunkKind::Mesh).unwrap();
        let hlod = tree.add_container(None, ChunkKind::Hlod).unwrap();
        let lods = tree.add_container(Some(hlod), ChunkKind::HlodLodArray).unwrap();

        for (_, kind, data) in make_writable_leaves() {
            let parent = match kind {
                ChunkKind::HlodHeader => Some(hlod),
                ChunkKind::HlodSubObjectArrayHeader | ChunkKind::HlodSubObject => Some(lods),
                _ => Some(mesh),
            };
            tree.add_leaf(parent, kind, data).unwrap();
        }

        let encoded = w3d::encode(&mut tree).unwrap();
        let decoded = w3d::decode(&encoded).unwrap();
        w3d::verify_sizes(&decoded).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_read_only_records_refuse_to_encode() {
        let read_only = [
            (
                ChunkKind::AabtreeHeader,
                ChunkData::AabtreeHeader(AabtreeHeader {
                    node_count: 1,
                    poly_count: 2,
                }),
            ),
            (
                ChunkKind::BitChannel,
                ChunkData::BitChannel(BitChannel {
                    first_frame: 0,
                    last_frame: 7,
                    flags: 0,
                    pivot: 1,
                    default_value: 1,
                    bits: vec![0b1010_1010],
                }),
            ),
            (
                ChunkKind::CompressedAnimationChannel,
                ChunkData::TimecodedChannel(TimecodedChannel {
                    num_time_codes: 0,
                    pivot: 1,
                    vector_len: 1,
                    flags: 0,
                    data: Vec::new(),
                }),
            ),
            (
                ChunkKind::CompressedAnimationChannel,
                ChunkData::AdaptiveDeltaChannel(AdaptiveDeltaChannel {
                    num_frames: 4,
                    pivot: 1,
                    vector_len: 1,
                    flags: 0,
                    scale: 1.0,
                    data: Vec::new(),
                }),
            ),
            (
                ChunkKind::LightInfo,
                ChunkData::LightInfo(LightInfo {
                    attributes: 0,
                    ambient: Rgb::BLACK,
                    diffuse: Rgb::WHITE,
                    specular: Rgb::WHITE,
                    intensity: 1.0,
                }),
            ),
            (
                ChunkKind::LightTransform,
                ChunkData::LightTransform(LightTransform {
                    rows: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
                }),
            ),
        ];

        for (kind, data) in read_only {
            let err = w3d::codec::encode_payload(kind, &data).unwrap_err();
            assert!(
                matches!(err, ParseError::EncodeNotImplemented { chunk } if chunk == kind.name()),
                "{kind}: {err}"
            );

            let mut tree = ChunkTree::new();
            tree.add_leaf(None, kind, data).unwrap();
            assert!(w3d::encode(&mut tree).is_err(), "{kind}");
        }
    }
}

mod file_tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skel.w3d");

        let mut tree = ChunkTree::new();
        let h = tree.add_container(None, ChunkKind::Hierarchy).unwrap();
        tree.add_leaf(
            Some(h),
            ChunkKind::HierarchyHeader,
            ChunkData::HierarchyHeader(HierarchyHeader {
                name: "SKEL".to_string(),
                num_pivots: 2,
                ..HierarchyHeader::default()
            }),
        )
        .unwrap();
        tree.add_leaf(
            Some(h),
            ChunkKind::Pivots,
            ChunkData::Pivots(vec![PivotRecord::new("ROOTTRANSFORM", None), PivotRecord::new("ARM", Some(0))]),
        )
        .unwrap();

        w3d::save(&mut tree, &path).unwrap();
        let loaded = w3d::load(&path).unwrap();

        assert_eq!(loaded, tree);
        let pivots = loaded.get_record_rec::<Vec<PivotRecord>>(None, ChunkKind::Pivots).unwrap();
        assert_eq!(pivots[1].parent(), Some(0));
    }

    #[test]
    fn test_load_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cut.w3d");

        let mut tree = make_mesh_tree("CUBE", "", vec![Vec3::ZERO; 2]);
        let mut bytes = w3d::encode(&mut tree).unwrap();
        bytes.truncate(bytes.len() - 5);
        std::fs::write(&path, &bytes).unwrap();

        let err = w3d::load(&path).unwrap_err();
        assert!(err.to_string().contains("cut.w3d"));
    }
}

fn finite_vec3() -> impl Strategy<Value = Vec3> {
    (-1.0e6f32..1.0e6, -1.0e6f32..1.0e6, -1.0e6f32..1.0e6).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #[test]
    fn test_mesh_fields_survive_encoding(
        name in "[A-Za-z0-9_]{0,15}",
        text in "[ -~]{0,64}",
        vertices in prop::collection::vec(finite_vec3(), 0..32),
    ) {
        let mut tree = make_mesh_tree(&name, &text, vertices.clone());
        let encoded = w3d::encode(&mut tree).unwrap();
        let decoded = w3d::decode(&encoded).unwrap();

        prop_assert_eq!(&decoded, &tree);

        let header = decoded.get_record_rec::<MeshHeader3>(None, ChunkKind::MeshHeader3).unwrap();
        prop_assert_eq!(&header.mesh_name, &name);
        let stored = decoded.get_record_rec::<Vec<Vec3>>(None, ChunkKind::Vertices).unwrap();
        prop_assert_eq!(stored, &vertices);
    }

    #[test]
    fn test_long_names_are_cut_to_fit(name in "[A-Z]{16,40}") {
        let mut tree = make_mesh_tree(&name, "", Vec::new());
        let encoded = w3d::encode(&mut tree).unwrap();
        let decoded = w3d::decode(&encoded).unwrap();

        let header = decoded.get_record_rec::<MeshHeader3>(None, ChunkKind::MeshHeader3).unwrap();
        prop_assert_eq!(header.mesh_name.as_str(), &name[..15]);
    }
}
