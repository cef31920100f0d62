//! XML lexing: byte cursor and the push lexer driving handler callbacks

pub mod cursor;
pub mod xml;

pub use cursor::Cursor;
pub use xml::{LexerOptions, XmlHandler, XmlLexer};
