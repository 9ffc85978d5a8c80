//! RustyOSM - Streaming OpenStreetMap XML reader
//!
//! Converts an OSM XML (or osmChange) character stream into a sequence of
//! bounded buffers, each containing densely packed, aligned OSM entities
//! ready for zero-copy downstream consumption.
//!
//! Pieces:
//! - `osm`: domain model (locations, timestamps, ids, entity kinds)
//! - `memory`: the buffer arena, the item byte layout and zero-copy views
//! - `builder`: hierarchical builders assembling entities into a buffer
//! - `xml`: tokenizer and chunked event adapter (entity declarations are
//!   rejected outright)
//! - `reader`: the parser state machine and its producer-thread runtime
//!
//! The reader runs on a dedicated thread per parser instance: chunks come
//! in through a bounded input queue, filled buffers go out through a
//! bounded output queue, and the file header is delivered exactly once
//! through a one-shot channel.
//!
//! ```
//! use rustyosm::{ParserInput, ReaderConfig, XmlInput};
//!
//! let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(8);
//! let (buffer_tx, buffer_rx) = crossbeam_channel::bounded(8);
//! let (header_tx, header_rx) = crossbeam_channel::bounded(1);
//!
//! let handle = XmlInput::spawn(ParserInput {
//!     config: ReaderConfig::default(),
//!     input: chunk_rx,
//!     output: buffer_tx,
//!     header: header_tx,
//! })
//! .unwrap();
//!
//! chunk_tx
//!     .send(Ok(br#"<osm version="0.6"><node id="1" lat="1.5" lon="2.5"/></osm>"#.to_vec()))
//!     .unwrap();
//! chunk_tx.send(Ok(Vec::new())).unwrap(); // end-of-input sentinel
//!
//! let header = header_rx.recv().unwrap().unwrap();
//! assert_eq!(header.version(), "0.6");
//! for buffer in buffer_rx.iter() {
//!     let buffer = buffer.unwrap();
//!     for item in rustyosm::memory::items(buffer.committed_bytes()) {
//!         assert_eq!(item.id(), 1);
//!     }
//! }
//! handle.join().unwrap();
//! ```

pub mod builder;
pub mod error;
pub mod memory;
pub mod osm;
pub mod reader;
pub mod xml;

pub use error::{Error, Result};
pub use memory::{Buffer, ItemRef};
pub use osm::{Bounds, ItemKind, Location, Timestamp};
pub use reader::{
    EntityFilter, FileFormat, Header, InputChunk, OsmXmlParser, ParserFactory, ParserInput,
    ReaderConfig, XmlInput,
};
