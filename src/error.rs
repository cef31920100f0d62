//! Error types for xmlmap

use std::fmt;
use thiserror::Error;

/// Position in the XML input
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.offset, self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Error kind for detailed categorization
///
/// Three families: lexer syntax errors (malformed input), structural
/// violations raised on emit, and the cooperative streaming abort
/// (`ParsingInterrupted`), which callers should treat as early
/// termination rather than a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidToken,
    UnterminatedMarkup,
    MismatchedTag { expected: String, found: String },
    DuplicateAttribute { name: String },
    InvalidEntity { entity: String },
    InvalidUtf8,
    DoctypeDisabled,
    UnboundPrefix { prefix: String },
    MaxDepthExceeded { max: u16 },
    NoRootElement,
    TrailingContent,
    ParsingInterrupted,
    MultipleRoots,
    Structure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken => write!(f, "invalid token"),
            Self::UnterminatedMarkup => write!(f, "unterminated markup"),
            Self::MismatchedTag { expected, found } => {
                write!(
                    f,
                    "mismatched closing tag: expected </{expected}>, found </{found}>"
                )
            }
            Self::DuplicateAttribute { name } => write!(f, "duplicate attribute: {name}"),
            Self::InvalidEntity { entity } => write!(f, "invalid entity reference: &{entity};"),
            Self::InvalidUtf8 => write!(f, "invalid utf-8"),
            Self::DoctypeDisabled => write!(f, "doctype declarations are disabled"),
            Self::UnboundPrefix { prefix } => write!(f, "unbound namespace prefix: {prefix}"),
            Self::MaxDepthExceeded { max } => write!(f, "max depth exceeded: {max}"),
            Self::NoRootElement => write!(f, "no root element found"),
            Self::TrailingContent => write!(f, "content after document root"),
            Self::ParsingInterrupted => write!(f, "parsing interrupted by item callback"),
            Self::MultipleRoots => write!(f, "document with multiple roots"),
            Self::Structure => write!(f, "invalid document tree structure"),
        }
    }
}

/// Main error type for xmlmap
#[derive(Error, Clone, Debug, PartialEq)]
#[error("error at {pos}: {message}")]
pub struct Error {
    kind: ErrorKind,
    pos: Pos,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, pos: Pos) -> Self {
        let message = kind.to_string();
        Self { kind, pos, message }
    }

    pub fn with_message(kind: ErrorKind, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind,
            pos,
            message: message.into(),
        }
    }

    /// Create an error with no meaningful input position (emit-side errors)
    pub fn structural(kind: ErrorKind) -> Self {
        Self::new(kind, Pos::default())
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this is the streaming early-exit signal rather
    /// than a parse or structure failure
    pub fn is_interrupted(&self) -> bool {
        matches!(self.kind, ErrorKind::ParsingInterrupted)
    }
}

/// Result type alias for xmlmap
pub type Result<T> = std::result::Result<T, Error>;
