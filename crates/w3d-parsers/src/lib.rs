//! w3d-parsers
//!
//! Reader, writer and scene resolution for Westwood 3D (`.w3d`) asset files.
//!
//! # Layers
//!
//! | Module     | Purpose |
//! |------------|---------|
//! | `registry` | Chunk code ↔ name table |
//! | `w3d`      | Chunk codec, typed records, chunk tree |
//! | `scene`    | Aggregate resolution, pivots, materials, animations |
//! | `traits`   | Errors, parse options, parser traits |
//! | `logging`  | `tracing` setup and parse logging helpers |
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use w3d_parsers::scene::{import_file, ImportOptions};
//!
//! let scene = import_file(Path::new("units/v_tank.w3d"), &ImportOptions::default())?;
//!
//! println!("{} materials, {} pivot trees", scene.materials.materials.len(), scene.pivots.len());
//! ```

pub mod logging;
pub mod registry;
pub mod scene;
pub mod traits;
pub mod w3d;

// Re-export main types
pub use traits::{HierarchicalParser, ParseError, ParseOptions, ParseResult, Parser};

pub use registry::{ChunkKind, ChunkRegistry, CHUNK_REGISTRY};

pub use w3d::{ChunkBody, ChunkData, ChunkNode, ChunkTree, NodeId, W3dParser};

pub use scene::{import_file, ImportOptions, ImportedScene};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
