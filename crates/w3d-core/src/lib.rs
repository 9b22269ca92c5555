//! westwood3d core library
//!
//! This crate provides the plain value types shared by the parser crate
//! and the `w3d` command-line tool.

pub mod types;

pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::types::*;
}
