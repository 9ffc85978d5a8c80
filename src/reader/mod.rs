//! The OSM XML reader: entity filter, file header, parser state machine
//! and the producer-thread runtime.

pub mod filter;
pub mod header;
pub mod parser;
pub mod runtime;

pub use filter::EntityFilter;
pub use header::Header;
pub use parser::{OsmXmlParser, ReaderConfig};
pub use runtime::{FileFormat, InputChunk, ParserFactory, ParserInput, XmlInput};
