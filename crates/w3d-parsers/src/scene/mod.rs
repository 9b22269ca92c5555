// w3d-parsers/src/scene/mod.rs
//! Scene assembly on top of the chunk tree
//!
//! ```text
//!   file.w3d ──load──► ChunkTree ──resolve_aggregates──► merged ChunkTree
//!                                                             │
//!              ┌──────────────────┬───────────────────────────┼──────────────────┐
//!              ▼                  ▼                           ▼                  ▼
//!    collect_render_objects  reduce_materials        build_pivot_forest   texture_names
//!              │                  │                           │
//!              │                  │                 decode_animations, link_aggregates
//!              └──────────────────┴─────────────► ImportedScene ◄─────────────────┘
//! ```

pub mod aggregate;
pub mod animation;
pub mod materials;
pub mod pivots;

pub use aggregate::{resolve_aggregates, AssetSource, LoadedSet, SearchPath};
pub use animation::{
    decode_animations, Animation, ChannelKind, DecodedChannel, Frame, PivotTarget, VisibilityTrack,
};
pub use materials::{
    reduce_materials, texture_names, MaterialKey, MaterialPass, MaterialRecord, MaterialTable,
    MeshMaterials, VertexMaterial, LIGHTMAP_MATERIAL,
};
pub use pivots::{
    build_pivot_forest, collect_render_objects, link_aggregates, AggregateLink, Attachment, Pivot,
    PivotForest, PivotTree, RenderObjects, ALL_LODS,
};

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::traits::{ParseOptions, ParseResult};
use crate::w3d::{self, ChunkTree};

/// Settings of a full import
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Directories searched for referenced files. Empty means
    /// [`default_search_dirs`] of the imported file.
    pub search_dirs: Vec<PathBuf>,
    /// Drop lightmap passes from materials
    pub ignore_lightmaps: bool,
    pub parse: ParseOptions,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            ignore_lightmaps: true,
            parse: ParseOptions::default(),
        }
    }
}

/// Search directories for the references of `file`: its own directory,
/// `../always`, `../textures` and `textures`.
pub fn default_search_dirs(file: &Path) -> Vec<PathBuf> {
    let dir = file.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    vec![
        dir.clone(),
        dir.join("..").join("always"),
        dir.join("..").join("textures"),
        dir.join("textures"),
    ]
}

/// A fully resolved model
#[derive(Debug, Clone, Serialize)]
pub struct ImportedScene {
    #[serde(skip)]
    pub tree: ChunkTree,
    pub loaded: LoadedSet,
    pub render_objects: RenderObjects,
    pub textures: Vec<String>,
    pub materials: MaterialTable,
    pub pivots: PivotForest,
    pub animations: Vec<Animation>,
    pub aggregate_links: Vec<AggregateLink>,
}

impl ImportedScene {
    /// Run every scene pass over an already loaded tree
    pub fn build(mut tree: ChunkTree, source: &dyn AssetSource, options: &ImportOptions) -> ParseResult<Self> {
        let loaded = resolve_aggregates(&mut tree, source)?;
        let render_objects = collect_render_objects(&tree);
        let materials = reduce_materials(&tree, options)?;
        let pivots = build_pivot_forest(&tree, &render_objects)?;
        let animations = decode_animations(&tree, &pivots)?;
        let aggregate_links = link_aggregates(&tree, &pivots);
        let textures = texture_names(&tree);

        Ok(Self {
            tree,
            loaded,
            render_objects,
            textures,
            materials,
            pivots,
            animations,
            aggregate_links,
        })
    }
}

/// Load `path`, resolve its references and run every scene pass
pub fn import_file(path: &Path, options: &ImportOptions) -> ParseResult<ImportedScene> {
    let tree = w3d::load_with_options(path, &options.parse)?;

    let dirs = if options.search_dirs.is_empty() {
        default_search_dirs(path)
    } else {
        options.search_dirs.clone()
    };
    let source = SearchPath::new(dirs).with_options(options.parse.clone());

    let scene = ImportedScene::build(tree, &source, options)?;
    info!(
        path = %path.display(),
        materials = scene.materials.materials.len(),
        pivot_trees = scene.pivots.len(),
        animations = scene.animations.len(),
        "Imported scene"
    );
    Ok(scene)
}
