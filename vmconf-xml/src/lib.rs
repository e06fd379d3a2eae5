//! Generic XML tree parsing and writing primitives used by the vmconf codecs.

pub mod parser;
pub mod tree;
pub mod writer;

pub use parser::{parse, parse_file, parse_str, ParseError, MAX_DEPTH};
pub use tree::XmlNode;
pub use writer::{write, write_document, write_file, WriteError};
