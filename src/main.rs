//! w3d CLI
//!
//! Command-line interface for inspecting, resolving and re-encoding
//! Westwood 3D (`.w3d`) asset files.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use w3d_parsers::logging::{self, TracingConfig};
use w3d_parsers::scene::{self, ImportOptions, ImportedScene};
use w3d_parsers::w3d::{self as chunks, ChunkTree};
use w3d_parsers::{ParseOptions, VERSION};

/// w3d - Westwood 3D asset inspection tool
#[derive(Parser)]
#[command(name = "w3d")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show chunk counts and a top-level summary of a file
    Info(FileArgs),

    /// Dump the chunk tree with decoded fields
    Tree(TreeArgs),

    /// Resolve aggregate and HLOD references, listing every loaded model
    Resolve(SceneArgs),

    /// Reduce mesh materials to unique records
    Materials(SceneArgs),

    /// Build pivot trees from hierarchies and HLODs
    Pivots(SceneArgs),

    /// Decode animation channels
    Anims(SceneArgs),

    /// Decode, encode and decode again, comparing the trees
    Roundtrip(RoundtripArgs),
}

#[derive(Args)]
struct FileArgs {
    /// Path to the .w3d file
    path: PathBuf,

    /// Reject unknown chunks instead of skipping them
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct TreeArgs {
    #[command(flatten)]
    file: FileArgs,

    /// Maximum depth to print
    #[arg(short, long, default_value = "8")]
    depth: usize,
}

#[derive(Args)]
struct SceneArgs {
    #[command(flatten)]
    file: FileArgs,

    /// Directory searched for referenced files (repeatable, in priority order)
    #[arg(short = 'I', long = "search-dir")]
    search_dirs: Vec<PathBuf>,

    /// Keep lightmap passes in materials
    #[arg(long)]
    keep_lightmaps: bool,
}

#[derive(Args)]
struct RoundtripArgs {
    #[command(flatten)]
    file: FileArgs,

    /// Write the re-encoded file here
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn setup_logging(verbosity: u8) {
    logging::init_with_config(TracingConfig::from_verbosity(verbosity));
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    debug!(version = VERSION, "w3d starting");

    match cli.command {
        Commands::Info(args) => cmd_info(args, cli.format),
        Commands::Tree(args) => cmd_tree(args, cli.format),
        Commands::Resolve(args) => cmd_resolve(args, cli.format),
        Commands::Materials(args) => cmd_materials(args, cli.format),
        Commands::Pivots(args) => cmd_pivots(args, cli.format),
        Commands::Anims(args) => cmd_anims(args, cli.format),
        Commands::Roundtrip(args) => cmd_roundtrip(args, cli.format),
    }
}

impl FileArgs {
    fn parse_options(&self) -> ParseOptions {
        if self.strict {
            ParseOptions::strict()
        } else {
            ParseOptions::default()
        }
    }

    fn load(&self) -> Result<ChunkTree> {
        info!("Loading: {:?}", self.path);
        chunks::load_with_options(&self.path, &self.parse_options())
            .with_context(|| format!("Failed to load {}", self.path.display()))
    }
}

impl SceneArgs {
    fn import(&self) -> Result<ImportedScene> {
        let options = ImportOptions {
            search_dirs: self.search_dirs.clone(),
            ignore_lightmaps: !self.keep_lightmaps,
            parse: self.file.parse_options(),
        };
        scene::import_file(&self.file.path, &options)
            .with_context(|| format!("Failed to import {}", self.file.path.display()))
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn kind_counts(tree: &ChunkTree) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    let mut stack: Vec<_> = tree.roots().to_vec();
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        *counts.entry(node.kind.name()).or_insert(0) += 1;
        stack.extend_from_slice(node.children());
    }
    counts
}

fn cmd_info(args: FileArgs, format: OutputFormat) -> Result<()> {
    let tree = args.load()?;
    let counts = kind_counts(&tree);
    let file_size = fs::metadata(&args.path)?.len();

    let top_level: Vec<_> = tree
        .roots()
        .iter()
        .map(|&id| {
            let node = tree.node(id);
            (node.kind.name(), node.size)
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": args.path,
            "file_size": file_size,
            "chunks": tree.len(),
            "top_level": top_level
                .iter()
                .map(|(kind, size)| serde_json::json!({ "kind": kind, "size": size }))
                .collect::<Vec<_>>(),
            "counts": counts,
        }))?,
        OutputFormat::Text => {
            println!("File:       {}", args.path.display());
            println!("Size:       {}", format_size(file_size));
            println!("Chunks:     {}", tree.len());
            println!();
            println!("Top level:");
            for (kind, size) in &top_level {
                println!("  {kind:<24} {}", format_size(u64::from(*size)));
            }
            println!();
            println!("{:<28} {}", "Kind", "Count");
            println!("{:-<28} {:-<6}", "", "");
            for (kind, count) in &counts {
                println!("{kind:<28} {count}");
            }
        }
    }

    Ok(())
}

fn cmd_tree(args: TreeArgs, format: OutputFormat) -> Result<()> {
    if args.depth == 0 {
        bail!("--depth must be at least 1");
    }
    let tree = args.file.load()?;

    match format {
        OutputFormat::Json => {
            let nodes: Vec<_> = tree
                .roots()
                .iter()
                .map(|&id| tree_json(&tree, id, 1, args.depth))
                .collect();
            print_json(&nodes)?;
        }
        OutputFormat::Text => print!("{}", tree.dump(args.depth)),
    }

    Ok(())
}

fn tree_json(tree: &ChunkTree, id: chunks::NodeId, depth: usize, max_depth: usize) -> serde_json::Value {
    let node = tree.node(id);
    match node.data() {
        Some(data) => serde_json::json!({
            "kind": node.kind.name(),
            "size": node.size,
            "data": data.describe(),
        }),
        None => {
            let children: Vec<_> = if depth < max_depth {
                node.children()
                    .iter()
                    .map(|&child| tree_json(tree, child, depth + 1, max_depth))
                    .collect()
            } else {
                Vec::new()
            };
            serde_json::json!({
                "kind": node.kind.name(),
                "size": node.size,
                "children": children,
            })
        }
    }
}

fn cmd_resolve(args: SceneArgs, format: OutputFormat) -> Result<()> {
    let scene = args.import()?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "loaded": scene.loaded,
            "chunks": scene.tree.len(),
            "render_objects": scene.render_objects,
            "textures": scene.textures,
        }))?,
        OutputFormat::Text => {
            println!("Loaded models ({}):", scene.loaded.len());
            for name in scene.loaded.iter() {
                println!("  {name}");
            }
            println!("\nRender objects ({}):", scene.render_objects.len());
            for name in scene.render_objects.keys() {
                println!("  {name}");
            }
            println!("\nTextures ({}):", scene.textures.len());
            for name in &scene.textures {
                println!("  {name}");
            }
            println!("\nTotal: {} chunks after resolution", scene.tree.len());
        }
    }

    Ok(())
}

fn cmd_materials(args: SceneArgs, format: OutputFormat) -> Result<()> {
    let scene = args.import()?;
    let table = &scene.materials;

    match format {
        OutputFormat::Json => print_json(table)?,
        OutputFormat::Text => {
            for (index, material) in table.materials.iter().enumerate() {
                println!(
                    "[{index}] surface={} sort_level={} passes={}",
                    material.surface,
                    material.sort_level,
                    material.passes.len()
                );
                for (pass_index, pass) in material.passes.iter().enumerate() {
                    let textures = if pass.textures.is_empty() {
                        "-".to_string()
                    } else {
                        pass.textures.join(", ")
                    };
                    println!(
                        "    pass {pass_index}: {} textures: {textures}",
                        pass.vertex_material.name
                    );
                }
            }
            println!();
            for mesh in &table.meshes {
                println!("{:<32} {} faces, materials {:?}", mesh.name, mesh.face_slots.len(), mesh.slots);
            }
            println!("\nTotal: {} materials over {} meshes", table.materials.len(), table.meshes.len());
        }
    }

    Ok(())
}

fn cmd_pivots(args: SceneArgs, format: OutputFormat) -> Result<()> {
    let scene = args.import()?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "pivots": scene.pivots,
            "aggregate_links": scene.aggregate_links,
        }))?,
        OutputFormat::Text => {
            for tree in scene.pivots.iter() {
                println!("{} (hierarchy {}, {} LODs)", tree.name, tree.hierarchy_name, tree.lod_count);
                print_pivot(tree, 0, 1);
            }
            for link in &scene.aggregate_links {
                println!(
                    "aggregate {}: {} -> {} bone {}",
                    link.aggregate, link.subobject, link.model, link.bone_index
                );
            }
        }
    }

    Ok(())
}

fn print_pivot(tree: &scene::PivotTree, index: usize, depth: usize) {
    let Some(pivot) = tree.get(index) else {
        return;
    };
    let indent = "  ".repeat(depth);
    println!("{indent}[{}] {}", pivot.index, pivot.name);
    for attachment in &pivot.attachments {
        let lod = if attachment.lod == scene::ALL_LODS {
            "all".to_string()
        } else {
            attachment.lod.to_string()
        };
        println!("{indent}  + {} (lod {lod})", attachment.name);
    }
    for proxy in &pivot.proxies {
        println!("{indent}  ~ {proxy}");
    }
    for &child in &pivot.children {
        print_pivot(tree, child, depth + 1);
    }
}

fn cmd_anims(args: SceneArgs, format: OutputFormat) -> Result<()> {
    let scene = args.import()?;

    match format {
        OutputFormat::Json => print_json(&scene.animations)?,
        OutputFormat::Text => {
            for anim in &scene.animations {
                println!(
                    "{} on {}: {} frames @ {} fps",
                    anim.name, anim.hierarchy_name, anim.num_frames, anim.frame_rate
                );
                for channel in &anim.channels {
                    let target = channel
                        .target
                        .as_ref()
                        .map_or_else(|| "?".to_string(), |t| t.name.clone());
                    println!(
                        "  {:<3} pivot {:<4} {:<24} frames {}..={}",
                        channel.kind, channel.pivot, target, channel.first_frame, channel.last_frame
                    );
                }
                if !anim.visibility.is_empty() {
                    println!("  {} visibility tracks", anim.visibility.len());
                }
            }
            println!("\nTotal: {} animations", scene.animations.len());
        }
    }

    Ok(())
}

fn cmd_roundtrip(args: RoundtripArgs, format: OutputFormat) -> Result<()> {
    let original_bytes = fs::read(&args.file.path)
        .with_context(|| format!("Failed to read {}", args.file.path.display()))?;

    let mut tree = args.file.load()?;
    let encoded = chunks::encode(&mut tree).context("Failed to encode chunk tree")?;
    let reparsed = chunks::parse_nodes(encoded.as_slice(), &args.file.parse_options())
        .context("Failed to decode re-encoded bytes")?;
    chunks::verify_sizes(&reparsed).context("Re-encoded sizes are inconsistent")?;

    let identical_trees = reparsed == tree;
    let identical_bytes = encoded == original_bytes;

    if let Some(ref output) = args.output {
        fs::write(output, &encoded).with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Wrote {:?}", output);
    }

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": args.file.path,
            "original_size": original_bytes.len(),
            "encoded_size": encoded.len(),
            "identical_trees": identical_trees,
            "identical_bytes": identical_bytes,
        }))?,
        OutputFormat::Text => {
            println!("Original: {}", format_size(original_bytes.len() as u64));
            println!("Encoded:  {}", format_size(encoded.len() as u64));
            println!("Trees:    {}", if identical_trees { "identical" } else { "DIFFERENT" });
            println!("Bytes:    {}", if identical_bytes { "identical" } else { "different" });
        }
    }

    if !identical_trees {
        bail!("Round trip changed the chunk tree");
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
