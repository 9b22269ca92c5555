//! Logging for W3D loading
//!
//! Subscriber setup for the `w3d` binary plus the macros `load` uses to
//! report what a file contained.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::w3d::ChunkTree;

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "warn,w3d_parsers=info,w3d=info";

/// Initialize tracing with a custom configuration
///
/// Returns `false` when a subscriber was already installed by an earlier call.
pub fn init_with_config(config: TracingConfig) -> bool {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        return false;
    }

    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.show_target)
        .with_file(config.show_source)
        .with_line_number(config.show_source);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .is_ok()
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub default_level: String,
    pub show_target: bool,
    /// Show source file and line of each event
    pub show_source: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_FILTER.to_string(),
            show_target: true,
            show_source: false,
        }
    }
}

impl TracingConfig {
    /// Config whose default level follows a `-v` count
    pub fn from_verbosity(verbosity: u8) -> Self {
        let default_level = match verbosity {
            0 => DEFAULT_FILTER,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        Self {
            default_level: default_level.to_string(),
            show_source: verbosity >= 3,
            ..Self::default()
        }
    }
}

/// Top-level chunk kinds of `tree` in file order, repeats collapsed to a
/// count: `"HIERARCHY, MESH x3, HLOD"`.
pub fn top_level_summary(tree: &ChunkTree) -> String {
    let mut runs: Vec<(&str, usize)> = Vec::new();
    for &id in tree.roots() {
        let name = tree.kind(id).name();
        match runs.last_mut() {
            Some((last, count)) if *last == name => *count += 1,
            _ => runs.push((name, 1)),
        }
    }

    runs.iter()
        .map(|&(name, count)| if count == 1 { name.to_string() } else { format!("{name} x{count}") })
        .collect::<Vec<_>>()
        .join(", ")
}

#[macro_export]
macro_rules! log_parse_start {
    ($path:expr) => {
        tracing::info!(path = %$path.display(), "Loading W3D file");
    };
}

/// Report a decoded tree: total chunks, top-level chunks and their kinds
#[macro_export]
macro_rules! log_parse_complete {
    ($path:expr, $duration:expr, $tree:expr) => {
        tracing::info!(
            path = %$path.display(),
            duration_ms = %$duration.as_millis(),
            chunks = $tree.len(),
            top_level = $tree.roots().len(),
            kinds = %$crate::logging::top_level_summary(&$tree),
            "Loaded W3D file"
        );
    };
}

#[macro_export]
macro_rules! log_parse_error {
    ($path:expr, $error:expr) => {
        tracing::error!(path = %$path.display(), error = %$error, "W3D load failed");
    };
}

/// Run a chunk stream decode inside a `decode` span and log its duration
pub fn instrument_parse<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("decode", parser = %name);
    let _guard = span.enter();

    let start = std::time::Instant::now();
    let result = f();
    tracing::debug!(duration_ms = %start.elapsed().as_millis(), "Chunk stream decoded");

    result
}
