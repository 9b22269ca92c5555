// w3d-parsers/src/scene/aggregate.rs
//! Aggregate resolution
//!
//! A W3D model rarely lives in one file. HLODs name their hierarchy and the
//! files their LOD meshes come from, and aggregates name a base model and
//! sub-objects. [`resolve_aggregates`] loads every referenced file through
//! an [`AssetSource`] and grafts its top-level chunks onto the tree being
//! resolved, until no unresolved reference remains.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::registry::ChunkKind;
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser};
use crate::w3d::{
    AggregateHeader, AggregateInfo, ChunkTree, HierarchyHeader, HlodHeader, HlodSubObject, NodeId,
    W3dParser,
};

/// Provider of referenced asset files
pub trait AssetSource {
    /// Load the asset called `name` (no extension, any case)
    fn load(&self, name: &str) -> ParseResult<ChunkTree>;
}

/// Loads `<dir>/<name>.w3d` from an ordered list of directories
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
    options: ParseOptions,
}

impl SearchPath {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            options: ParseOptions::default(),
        }
    }

    /// Parse options used for every loaded file
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// File name an asset is stored under
    pub fn file_name(name: &str) -> String {
        format!("{}.w3d", name.to_lowercase())
    }
}

impl AssetSource for SearchPath {
    fn load(&self, name: &str) -> ParseResult<ChunkTree> {
        let file = Self::file_name(name);
        let parser = W3dParser::new();
        let mut searched = Vec::with_capacity(self.dirs.len());

        for dir in &self.dirs {
            let path = dir.join(&file);
            debug!(path = %path.display(), "Trying asset location");

            match parser.parse_file_with_options(&path, &self.options) {
                Ok(tree) => {
                    info!(asset = %name, path = %path.display(), "Loaded referenced asset");
                    return Ok(tree);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "Asset location rejected"),
            }
            searched.push(path);
        }

        Err(ParseError::MissingFile { file, searched })
    }
}

/// Names already resolved during one resolution, lower-cased, in the order
/// they were marked
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadedSet {
    names: Vec<String>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl LoadedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as loaded. Returns `false` if it already was.
    pub fn insert(&mut self, name: &str) -> bool {
        let key = name.to_lowercase();
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.names.push(key);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// References collected from one scope, in first-seen order
#[derive(Debug, Default)]
struct References {
    /// Files whose HLODs are dropped when grafted
    implicit: Vec<String>,
    explicit: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if name.is_empty() {
        return;
    }
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

/// Mark the scope's own names as loaded and gather what it refers to.
fn collect_references(tree: &ChunkTree, scope: &[NodeId], loaded: &mut LoadedSet) -> References {
    let mut refs = References::default();

    for &id in scope {
        match tree.kind(id) {
            ChunkKind::Aggregate => {
                if let Some(header) = tree.get_record::<AggregateHeader>(Some(id), ChunkKind::AggregateHeader) {
                    loaded.insert(&header.name);
                }
                if let Some(info) = tree.get_record::<AggregateInfo>(Some(id), ChunkKind::AggregateInfo) {
                    push_unique(&mut refs.explicit, &info.base_model_name);
                    for sub in &info.subobjects {
                        push_unique(&mut refs.explicit, &sub.subobject_name);
                    }
                }
            }
            ChunkKind::Hierarchy => {
                if let Some(header) = tree.get_record::<HierarchyHeader>(Some(id), ChunkKind::HierarchyHeader) {
                    loaded.insert(&header.name);
                }
            }
            ChunkKind::Hlod => {
                if let Some(header) = tree.get_record::<HlodHeader>(Some(id), ChunkKind::HlodHeader) {
                    loaded.insert(&header.name);
                    push_unique(&mut refs.implicit, &header.hierarchy_name);
                }
                for lod in tree.find(Some(id), ChunkKind::HlodLodArray) {
                    for sub in tree.find(Some(lod), ChunkKind::HlodSubObject) {
                        if let Some(sub) = tree.record::<HlodSubObject>(sub) {
                            push_unique(&mut refs.implicit, sub.model_name());
                        }
                    }
                }
                for array in tree.find(Some(id), ChunkKind::HlodAggregateArray) {
                    for sub in tree.find(Some(array), ChunkKind::HlodSubObject) {
                        if let Some(sub) = tree.record::<HlodSubObject>(sub) {
                            push_unique(&mut refs.explicit, &sub.name);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    refs
}

fn resolve_scope(
    tree: &mut ChunkTree,
    scope: &[NodeId],
    source: &dyn AssetSource,
    loaded: &mut LoadedSet,
) -> ParseResult<()> {
    let refs = collect_references(tree, scope, loaded);

    for name in &refs.implicit {
        if !loaded.insert(name) {
            continue;
        }
        let asset = source.load(name)?;
        let keep: Vec<NodeId> = asset
            .roots()
            .iter()
            .copied()
            .filter(|&id| asset.kind(id) != ChunkKind::Hlod)
            .collect();
        let grafted = tree.graft(&asset, &keep);
        debug!(asset = %name, chunks = grafted.len(), "Grafted implicit reference");
        resolve_scope(tree, &grafted, source, loaded)?;
    }

    for name in &refs.explicit {
        if !loaded.insert(name) {
            continue;
        }
        let asset = source.load(name)?;
        let grafted = tree.graft(&asset, asset.roots());
        debug!(asset = %name, chunks = grafted.len(), "Grafted explicit reference");
        resolve_scope(tree, &grafted, source, loaded)?;
    }

    Ok(())
}

/// Load everything `tree` refers to and merge it in.
///
/// Every name is marked loaded before its file is fetched, so each file is
/// requested at most once and mutually referencing files terminate.
pub fn resolve_aggregates(tree: &mut ChunkTree, source: &dyn AssetSource) -> ParseResult<LoadedSet> {
    let mut loaded = LoadedSet::new();
    let scope = tree.roots().to_vec();
    resolve_scope(tree, &scope, source, &mut loaded)?;

    info!(loaded = loaded.len(), top_level = tree.roots().len(), "Resolved aggregates");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::w3d::{ChunkData, HlodArrayHeader};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemorySource {
        assets: HashMap<String, ChunkTree>,
        requests: RefCell<Vec<String>>,
    }

    impl AssetSource for MemorySource {
        fn load(&self, name: &str) -> ParseResult<ChunkTree> {
            self.requests.borrow_mut().push(name.to_string());
            self.assets
                .get(&name.to_lowercase())
                .cloned()
                .ok_or_else(|| ParseError::MissingFile {
                    file: SearchPath::file_name(name),
                    searched: Vec::new(),
                })
        }
    }

    fn make_hierarchy(tree: &mut ChunkTree, name: &str) {
        let h = tree.add_container(None, ChunkKind::Hierarchy).unwrap();
        tree.add_leaf(
            Some(h),
            ChunkKind::HierarchyHeader,
            ChunkData::HierarchyHeader(HierarchyHeader {
                name: name.to_string(),
                ..HierarchyHeader::default()
            }),
        )
        .unwrap();
    }

    fn make_hlod(tree: &mut ChunkTree, name: &str, hierarchy: &str, lod_meshes: &[&str]) {
        let hlod = tree.add_container(None, ChunkKind::Hlod).unwrap();
        tree.add_leaf(
            Some(hlod),
            ChunkKind::HlodHeader,
            ChunkData::HlodHeader(HlodHeader {
                name: name.to_string(),
                hierarchy_name: hierarchy.to_string(),
                ..HlodHeader::default()
            }),
        )
        .unwrap();

        let lod = tree.add_container(Some(hlod), ChunkKind::HlodLodArray).unwrap();
        tree.add_leaf(
            Some(lod),
            ChunkKind::HlodSubObjectArrayHeader,
            ChunkData::HlodArrayHeader(HlodArrayHeader {
                model_count: lod_meshes.len() as u32,
                max_screen_size: 0.0,
            }),
        )
        .unwrap();
        for mesh in lod_meshes {
            tree.add_leaf(
                Some(lod),
                ChunkKind::HlodSubObject,
                ChunkData::HlodSubObject(HlodSubObject::new(0, *mesh)),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_loaded_set_is_case_insensitive() {
        let mut loaded = LoadedSet::new();
        assert!(loaded.insert("V_Tank"));
        assert!(!loaded.insert("v_tank"));
        assert!(loaded.contains("V_TANK"));
        assert_eq!(loaded.iter().collect::<Vec<_>>(), vec!["v_tank"]);
    }

    #[test]
    fn test_implicit_reference_drops_hlods() {
        let mut skeleton = ChunkTree::new();
        make_hierarchy(&mut skeleton, "SKEL");
        make_hlod(&mut skeleton, "SKEL", "SKEL", &[]);

        let mut source = MemorySource::default();
        source.assets.insert("skel".to_string(), skeleton);

        let mut tree = ChunkTree::new();
        make_hlod(&mut tree, "TANK", "SKEL", &[]);

        let loaded = resolve_aggregates(&mut tree, &source).unwrap();
        assert_eq!(loaded.iter().collect::<Vec<_>>(), vec!["tank", "skel"]);
        assert_eq!(tree.find(None, ChunkKind::Hlod).len(), 1);
        assert_eq!(tree.find(None, ChunkKind::Hierarchy).len(), 1);
    }

    #[test]
    fn test_own_hierarchy_is_not_fetched() {
        let mut tree = ChunkTree::new();
        make_hierarchy(&mut tree, "TANK");
        make_hlod(&mut tree, "TANK", "TANK", &["TANK.HULL", "TANK.TURRET"]);

        let source = MemorySource::default();
        resolve_aggregates(&mut tree, &source).unwrap();
        assert!(source.requests.borrow().is_empty());
    }

    #[test]
    fn test_lod_meshes_fetch_their_file_once() {
        let mut parts = ChunkTree::new();
        parts.add_container(None, ChunkKind::Mesh).unwrap();

        let mut source = MemorySource::default();
        source.assets.insert("parts".to_string(), parts);

        let mut tree = ChunkTree::new();
        make_hierarchy(&mut tree, "TANK");
        make_hlod(&mut tree, "TANK", "TANK", &["PARTS.HULL", "PARTS.TURRET"]);

        resolve_aggregates(&mut tree, &source).unwrap();
        assert_eq!(*source.requests.borrow(), vec!["PARTS".to_string()]);
        assert_eq!(tree.find(None, ChunkKind::Mesh).len(), 1);
    }

    #[test]
    fn test_missing_reference_is_reported() {
        let mut tree = ChunkTree::new();
        make_hlod(&mut tree, "TANK", "GONE", &[]);

        let err = resolve_aggregates(&mut tree, &MemorySource::default()).unwrap_err();
        assert!(matches!(err, ParseError::MissingFile { ref file, .. } if file == "gone.w3d"));
    }
}
