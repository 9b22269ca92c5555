// w3d-parsers/src/traits.rs
//! Core traits defining the parser interface.
//!
//! This module establishes the parsing interface shared by the chunk codec
//! and the scene passes built on top of it:
//! - Consistent error handling across decode, encode and resolution
//! - Tunable parse behaviour through [`ParseOptions`]
//! - Tree-shaped access to parsed output through [`HierarchicalParser`]

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData { offset: u64, message: String },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown chunk type 0x{chunk_type:08X} at offset {offset}; not a valid W3D container")]
    UnknownChunkType { chunk_type: u32, offset: u64 },

    #[error("Length mismatch in {context}: expected {expected} bytes, found {actual}")]
    LengthMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Missing file {file} (searched {} location(s))", searched.len())]
    MissingFile { file: String, searched: Vec<PathBuf> },

    #[error("Encoding {chunk} chunks is not implemented")]
    EncodeNotImplemented { chunk: &'static str },

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any `Nested` wrappers
    pub fn root_cause(&self) -> &ParseError {
        match self {
            ParseError::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Configuration options for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum nesting depth for recursive structures
    pub max_nesting_depth: u32,
    /// Whether to skip unknown chunk types nested in known containers
    /// instead of erroring. Unknown top-level chunks are always an error.
    pub skip_unknown_chunks: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: 32,
            skip_unknown_chunks: true,
        }
    }
}

impl ParseOptions {
    /// Options that reject every unknown chunk
    pub fn strict() -> Self {
        Self {
            skip_unknown_chunks: false,
            ..Self::default()
        }
    }
}

/// Core trait for all file format parsers
///
/// Implementors of this trait provide the ability to parse a specific
/// file format from a byte stream or a path.
pub trait Parser: Send + Sync {
    /// The parsed output type
    type Output: Send + Sync;

    /// Returns the file extensions this parser handles (e.g., ["w3d"])
    fn extensions(&self) -> &[&str];

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Parse from a reader with default options
    fn parse<R: Read>(&self, reader: R) -> ParseResult<Self::Output> {
        self.parse_with_options(reader, &ParseOptions::default())
    }

    /// Parse from a reader with custom options
    fn parse_with_options<R: Read>(
        &self,
        reader: R,
        options: &ParseOptions,
    ) -> ParseResult<Self::Output>;

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default())
    }

    /// Parse from a file path with options
    fn parse_file_with_options(
        &self,
        path: &Path,
        options: &ParseOptions,
    ) -> ParseResult<Self::Output> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        self.parse_with_options(reader, options)
    }

    /// Check if this parser can handle the given file
    fn can_parse(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();
            return self.extensions().iter().any(|e| e.to_lowercase() == ext_str);
        }

        false
    }
}

/// Trait for parsers that produce hierarchical/tree structures
pub trait HierarchicalParser: Parser {
    /// Node type in the hierarchy
    type Node;

    /// Get the root node(s) of the parsed structure
    fn roots<'a>(&self, parsed: &'a Self::Output) -> Vec<&'a Self::Node>;

    /// Get children of a node
    fn children<'a>(&self, parsed: &'a Self::Output, node: &'a Self::Node) -> Vec<&'a Self::Node>;

    /// Check if a node is a leaf (no children)
    fn is_leaf(&self, parsed: &Self::Output, node: &Self::Node) -> bool {
        self.children(parsed, node).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_context() {
        let error = ParseError::UnknownChunkType {
            chunk_type: 0xDEAD_BEEF,
            offset: 0,
        };

        let contextualized = error.with_context("parsing header");

        match &contextualized {
            ParseError::Nested { context, .. } => {
                assert_eq!(context, "parsing header");
            }
            _ => panic!("Expected Nested error"),
        }
        assert!(matches!(
            contextualized.root_cause(),
            ParseError::UnknownChunkType { chunk_type: 0xDEAD_BEEF, .. }
        ));
    }

    #[test]
    fn test_missing_file_message_counts_locations() {
        let error = ParseError::MissingFile {
            file: "tank.w3d".to_string(),
            searched: vec![PathBuf::from("a/tank.w3d"), PathBuf::from("b/tank.w3d")],
        };

        let message = error.to_string();
        assert!(message.contains("tank.w3d"));
        assert!(message.contains("2 location"));
    }

    #[test]
    fn test_default_options_skip_nested_unknowns() {
        let options = ParseOptions::default();
        assert!(options.skip_unknown_chunks);
        assert_eq!(options.max_nesting_depth, 32);
        assert!(!ParseOptions::strict().skip_unknown_chunks);
    }
}
