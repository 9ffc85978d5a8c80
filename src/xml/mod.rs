//! XML parsing primitives.
//!
//! - `entities`: entity decoding with a zero-copy fast path
//! - `attributes`: attribute extraction from tag bytes
//! - `Tokenizer`: pull tokenizer with an integrated memchr-backed cursor
//! - `events`: chunked push adapter dispatching to an [`XmlHandler`]
//!
//! The tokenizer accepts only what OSM files need. XML entity declarations
//! are rejected outright (billion-laughs defense); the first malformed
//! construct aborts the stream with line/column information.

pub mod attributes;
pub mod entities;
pub mod events;
pub mod tokenizer;

pub use attributes::Attribute;
pub use events::{XmlEventSource, XmlHandler};
