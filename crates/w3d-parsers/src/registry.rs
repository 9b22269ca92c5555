//! Chunk type registry.
//!
//! Every chunk code the format defines is listed once in the
//! [`chunk_kinds!`] table below, which generates the closed [`ChunkKind`]
//! enumeration together with its code and symbolic name. The global
//! [`CHUNK_REGISTRY`] indexes the table both ways and is built on first use.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

macro_rules! chunk_kinds {
    ($( $variant:ident = $code:literal => $name:literal, )*) => {
        /// Every chunk type known to the W3D format
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ChunkKind {
            $(
                #[doc = $name]
                $variant,
            )*
        }

        impl ChunkKind {
            /// All kinds, in table order
            pub const ALL: &'static [ChunkKind] = &[$(ChunkKind::$variant,)*];

            /// Numeric chunk code as written in the chunk header
            pub const fn code(self) -> u32 {
                match self {
                    $(ChunkKind::$variant => $code,)*
                }
            }

            /// Symbolic name of the chunk type
            pub const fn name(self) -> &'static str {
                match self {
                    $(ChunkKind::$variant => $name,)*
                }
            }
        }
    };
}

chunk_kinds! {
    Mesh = 0x0000_0000 => "MESH",
    Vertices = 0x0000_0002 => "VERTICES",
    VertexNormals = 0x0000_0003 => "VERTEX_NORMALS",
    MeshUserText = 0x0000_000C => "MESH_USER_TEXT",
    VertexInfluences = 0x0000_000E => "VERTEX_INFLUENCES",
    MeshHeader3 = 0x0000_001F => "MESH_HEADER3",
    Triangles = 0x0000_0020 => "TRIANGLES",
    VertexShadeIndices = 0x0000_0022 => "VERTEX_SHADE_INDICES",

    PrelitUnlit = 0x0000_0023 => "PRELIT_UNLIT",
    PrelitVertex = 0x0000_0024 => "PRELIT_VERTEX",
    PrelitLightmapMultiPass = 0x0000_0025 => "PRELIT_LIGHTMAP_MULTI_PASS",
    PrelitLightmapMultiTexture = 0x0000_0026 => "PRELIT_LIGHTMAP_MULTI_TEXTURE",

    MaterialInfo = 0x0000_0028 => "MATERIAL_INFO",
    Shaders = 0x0000_0029 => "SHADERS",

    VertexMaterials = 0x0000_002A => "VERTEX_MATERIALS",
    VertexMaterial = 0x0000_002B => "VERTEX_MATERIAL",
    VertexMaterialName = 0x0000_002C => "VERTEX_MATERIAL_NAME",
    VertexMaterialInfo = 0x0000_002D => "VERTEX_MATERIAL_INFO",
    VertexMapperArgs0 = 0x0000_002E => "VERTEX_MAPPER_ARGS0",
    VertexMapperArgs1 = 0x0000_002F => "VERTEX_MAPPER_ARGS1",

    Textures = 0x0000_0030 => "TEXTURES",
    Texture = 0x0000_0031 => "TEXTURE",
    TextureName = 0x0000_0032 => "TEXTURE_NAME",
    TextureInfo = 0x0000_0033 => "TEXTURE_INFO",

    MaterialPass = 0x0000_0038 => "MATERIAL_PASS",
    VertexMaterialIds = 0x0000_0039 => "VERTEX_MATERIAL_IDS",
    ShaderIds = 0x0000_003A => "SHADER_IDS",
    Dcg = 0x0000_003B => "DCG",
    Dig = 0x0000_003C => "DIG",
    Scg = 0x0000_003E => "SCG",

    TextureStage = 0x0000_0048 => "TEXTURE_STAGE",
    TextureIds = 0x0000_0049 => "TEXTURE_IDS",
    StageTexcoords = 0x0000_004A => "STAGE_TEXCOORDS",
    PerFaceTexcoordIds = 0x0000_004B => "PER_FACE_TEXCOORD_IDS",

    Deform = 0x0000_0058 => "DEFORM",
    DeformSet = 0x0000_0059 => "DEFORM_SET",
    DeformKeyframe = 0x0000_005A => "DEFORM_KEYFRAME",
    DeformData = 0x0000_005B => "DEFORM_DATA",

    Ps2Shaders = 0x0000_0080 => "PS2_SHADERS",

    Aabtree = 0x0000_0090 => "AABTREE",
    AabtreeHeader = 0x0000_0091 => "AABTREE_HEADER",
    AabtreePolyIndices = 0x0000_0092 => "AABTREE_POLYINDICES",
    AabtreeNodes = 0x0000_0093 => "AABTREE_NODES",

    Hierarchy = 0x0000_0100 => "HIERARCHY",
    HierarchyHeader = 0x0000_0101 => "HIERARCHY_HEADER",
    Pivots = 0x0000_0102 => "PIVOTS",
    PivotFixups = 0x0000_0103 => "PIVOT_FIXUPS",

    Animation = 0x0000_0200 => "ANIMATION",
    AnimationHeader = 0x0000_0201 => "ANIMATION_HEADER",
    AnimationChannel = 0x0000_0202 => "ANIMATION_CHANNEL",
    BitChannel = 0x0000_0203 => "BIT_CHANNEL",

    CompressedAnimation = 0x0000_0280 => "COMPRESSED_ANIMATION",
    CompressedAnimationHeader = 0x0000_0281 => "COMPRESSED_ANIMATION_HEADER",
    CompressedAnimationChannel = 0x0000_0282 => "COMPRESSED_ANIMATION_CHANNEL",
    CompressedBitChannel = 0x0000_0283 => "COMPRESSED_BIT_CHANNEL",

    MorphAnimation = 0x0000_02C0 => "MORPH_ANIMATION",
    MorphAnimHeader = 0x0000_02C1 => "MORPHANIM_HEADER",
    MorphAnimChannel = 0x0000_02C2 => "MORPHANIM_CHANNEL",
    MorphAnimPoseName = 0x0000_02C3 => "MORPHANIM_POSENAME",
    MorphAnimKeyData = 0x0000_02C4 => "MORPHANIM_KEYDATA",
    MorphAnimPivotChannelData = 0x0000_02C5 => "MORPHANIM_PIVOTCHANNELDATA",

    Hmodel = 0x0000_0300 => "HMODEL",
    HmodelHeader = 0x0000_0301 => "HMODEL_HEADER",
    Node = 0x0000_0302 => "NODE",
    CollisionNode = 0x0000_0303 => "COLLISION_NODE",
    SkinNode = 0x0000_0304 => "SKIN_NODE",
    ObsoleteHmodelAuxData = 0x0000_0305 => "OBSOLETE_W3D_CHUNK_HMODEL_AUX_DATA",
    ObsoleteShadowNode = 0x0000_0306 => "OBSOLETE_W3D_CHUNK_SHADOW_NODE",

    LodModel = 0x0000_0400 => "LODMODEL",
    LodModelHeader = 0x0000_0401 => "LODMODEL_HEADER",
    Lod = 0x0000_0402 => "LOD",

    Collection = 0x0000_0420 => "COLLECTION",
    CollectionHeader = 0x0000_0421 => "COLLECTION_HEADER",
    CollectionObjName = 0x0000_0422 => "COLLECTION_OBJ_NAME",
    Placeholder = 0x0000_0423 => "PLACEHOLDER",
    TransformNode = 0x0000_0424 => "TRANSFORM_NODE",

    Points = 0x0000_0440 => "POINTS",

    Light = 0x0000_0460 => "LIGHT",
    LightInfo = 0x0000_0461 => "LIGHT_INFO",
    SpotLightInfo = 0x0000_0462 => "SPOT_LIGHT_INFO",
    NearAttenuation = 0x0000_0463 => "NEAR_ATTENUATION",
    FarAttenuation = 0x0000_0464 => "FAR_ATTENUATION",

    Emitter = 0x0000_0500 => "EMITTER",
    EmitterHeader = 0x0000_0501 => "EMITTER_HEADER",
    EmitterUserData = 0x0000_0502 => "EMITTER_USER_DATA",
    EmitterInfo = 0x0000_0503 => "EMITTER_INFO",
    EmitterInfoV2 = 0x0000_0504 => "EMITTER_INFOV2",
    EmitterProps = 0x0000_0505 => "EMITTER_PROPS",
    ObsoleteEmitterColorKeyframe = 0x0000_0506 => "OBSOLETE_W3D_CHUNK_EMITTER_COLOR_KEYFRAME",
    ObsoleteEmitterOpacityKeyframe = 0x0000_0507 => "OBSOLETE_W3D_CHUNK_EMITTER_OPACITY_KEYFRAME",
    ObsoleteEmitterSizeKeyframe = 0x0000_0508 => "OBSOLETE_W3D_CHUNK_EMITTER_SIZE_KEYFRAME",
    EmitterLineProperties = 0x0000_0509 => "EMITTER_LINE_PROPERTIES",
    EmitterRotationKeyframes = 0x0000_050A => "EMITTER_ROTATION_KEYFRAMES",
    EmitterFrameKeyframes = 0x0000_050B => "EMITTER_FRAME_KEYFRAMES",
    EmitterBlurTimeKeyframes = 0x0000_050C => "EMITTER_BLUR_TIME_KEYFRAMES",

    Aggregate = 0x0000_0600 => "AGGREGATE",
    AggregateHeader = 0x0000_0601 => "AGGREGATE_HEADER",
    AggregateInfo = 0x0000_0602 => "AGGREGATE_INFO",
    TextureReplacerInfo = 0x0000_0603 => "TEXTURE_REPLACER_INFO",
    AggregateClassInfo = 0x0000_0604 => "AGGREGATE_CLASS_INFO",

    Hlod = 0x0000_0700 => "HLOD",
    HlodHeader = 0x0000_0701 => "HLOD_HEADER",
    HlodLodArray = 0x0000_0702 => "HLOD_LOD_ARRAY",
    HlodSubObjectArrayHeader = 0x0000_0703 => "HLOD_SUB_OBJECT_ARRAY_HEADER",
    HlodSubObject = 0x0000_0704 => "HLOD_SUB_OBJECT",
    HlodAggregateArray = 0x0000_0705 => "HLOD_AGGREGATE_ARRAY",
    HlodProxyArray = 0x0000_0706 => "HLOD_PROXY_ARRAY",

    Box = 0x0000_0740 => "BOX",
    Sphere = 0x0000_0741 => "SPHERE",
    Ring = 0x0000_0742 => "RING",

    NullObject = 0x0000_0750 => "NULL_OBJECT",

    Lightscape = 0x0000_0800 => "LIGHTSCAPE",
    LightscapeLight = 0x0000_0801 => "LIGHTSCAPE_LIGHT",
    LightTransform = 0x0000_0802 => "LIGHT_TRANSFORM",

    Dazzle = 0x0000_0900 => "DAZZLE",
    DazzleName = 0x0000_0901 => "DAZZLE_NAME",
    DazzleTypeName = 0x0000_0902 => "DAZZLE_TYPENAME",

    SoundRobj = 0x0000_0A00 => "SOUNDROBJ",
    SoundRobjHeader = 0x0000_0A01 => "SOUNDROBJ_HEADER",
    SoundRobjDefinition = 0x0000_0A02 => "SOUNDROBJ_DEFINITION",
}

impl ChunkKind {
    /// Look up a kind by its numeric code
    pub fn from_code(code: u32) -> Option<Self> {
        CHUNK_REGISTRY.lookup(code)
    }

    /// Look up a kind by its symbolic name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        CHUNK_REGISTRY.lookup_name(name)
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Two-way index over the chunk kind table
pub struct ChunkRegistry {
    /// Map of chunk code to kind
    by_code: HashMap<u32, ChunkKind>,
    /// Map of upper-case symbolic name to kind
    by_name: HashMap<&'static str, ChunkKind>,
}

impl ChunkRegistry {
    fn new() -> Self {
        let mut by_code = HashMap::with_capacity(ChunkKind::ALL.len());
        let mut by_name = HashMap::with_capacity(ChunkKind::ALL.len());

        for &kind in ChunkKind::ALL {
            by_code.insert(kind.code(), kind);
            by_name.insert(kind.name(), kind);
        }

        Self { by_code, by_name }
    }

    /// Resolve a chunk code read from a header
    pub fn lookup(&self, code: u32) -> Option<ChunkKind> {
        self.by_code.get(&code).copied()
    }

    /// Resolve a symbolic name
    pub fn lookup_name(&self, name: &str) -> Option<ChunkKind> {
        self.by_name.get(name.to_ascii_uppercase().as_str()).copied()
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Global chunk registry
pub static CHUNK_REGISTRY: Lazy<ChunkRegistry> = Lazy::new(ChunkRegistry::new);
