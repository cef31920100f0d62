//! xmlmap - Bidirectional XML to ordered key-value tree converter
//!
//! Parses XML documents into ordered, nestable key-value trees that
//! mirror the markup (attributes as `@`-marked keys, character data
//! under `#text`, repeated sibling tags as lists), and serializes
//! such trees back to XML. Large documents can be processed in
//! streaming mode, which hands each subtree at a chosen depth to a
//! callback instead of building the whole tree.
//!
//! # Quick Start
//!
//! ```
//! use xmlmap::{parse, unparse};
//! # fn main() -> Result<(), xmlmap::Error> {
//! let tree = parse("<config><port>8080</port></config>")?;
//! let port = tree
//!     .get("config")
//!     .and_then(|c| c.get("port"))
//!     .and_then(|p| p.as_text())
//!     .unwrap_or_default();
//! assert_eq!(port, "8080");
//!
//! let xml = unparse(&tree)?;
//! assert_eq!(
//!     xml,
//!     "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<config><port>8080</port></config>"
//! );
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ErrorKind, Pos, Result};

pub mod value;
pub use value::{Node, Value};

pub mod lexer;
pub use lexer::{Cursor, LexerOptions, XmlHandler, XmlLexer};

pub mod namespace;

pub mod builder;
pub use builder::{ForceList, ItemCallback, ParseOptions, PathSegment, Postprocessor, TreeBuilder};

pub mod emitter;
pub use emitter::{EmitOptions, Preprocessor, TreeEmitter};

pub mod writer;
pub use writer::XmlWriter;

/// Parse an XML string into a document tree
pub fn parse(xml: &str) -> Result<Value> {
    let mut builder = TreeBuilder::new(ParseOptions::default());
    builder.parse(xml)
}

/// Parse XML from bytes (must be UTF-8)
pub fn parse_bytes(bytes: &[u8]) -> Result<Value> {
    let mut builder = TreeBuilder::new(ParseOptions::default());
    builder.parse_bytes(bytes)
}

/// Parse with custom options
pub fn parse_with_options(xml: &str, options: ParseOptions) -> Result<Value> {
    let mut builder = TreeBuilder::new(options);
    builder.parse(xml)
}

/// Serialize a document tree to an XML string
pub fn unparse(tree: &Value) -> Result<String> {
    let mut emitter = TreeEmitter::new(EmitOptions::default());
    emitter.unparse(tree)
}

/// Serialize with custom options
pub fn unparse_with_options(tree: &Value, options: EmitOptions) -> Result<String> {
    let mut emitter = TreeEmitter::new(options);
    emitter.unparse(tree)
}
