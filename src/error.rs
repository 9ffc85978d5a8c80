//! Error types for the OSM XML reader.
//!
//! Every error here is fatal to the stream: the parser never resynchronizes.
//! The producer thread forwards the pending error to both the header channel
//! (if the header was not delivered yet) and the output queue, so consumers
//! see the failure in-order relative to the buffers already produced. That
//! fan-out is why the type is `Clone`.

use thiserror::Error;

/// Errors raised while reading an OSM XML stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Malformed XML reported by the tokenizer, with the position of the
    /// offending byte.
    #[error("XML parsing error at line {line}, column {column}: {message}")]
    XmlSyntax {
        line: u64,
        column: u64,
        message: String,
    },

    /// An XML entity declaration was encountered. Entities are normally not
    /// used in OSM files but they can be misused (billion laughs), so any
    /// declaration aborts the stream.
    #[error("XML entities are not supported")]
    EntitiesNotSupported,

    /// Missing or unknown `version` attribute on the root element. The
    /// carried string is the offending version, empty when absent.
    #[error("can not read file with version \"{0}\"")]
    FormatVersion(String),

    /// Root element is neither `osm` nor `osmChange`.
    #[error("unknown top-level element: {0}")]
    UnknownTopLevel(String),

    /// Input violates the OSM schema in a way that prevents building a
    /// well-formed record (bad member type, zero ref, malformed number).
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A single entity does not fit into a fresh buffer.
    #[error("entity does not fit into buffer")]
    BufferFull,

    /// Input acquisition failed upstream.
    #[error("input error: {0}")]
    Io(String),
}

impl Error {
    /// Shorthand for a tokenizer error at a known position.
    pub(crate) fn syntax(line: u64, column: u64, message: impl Into<String>) -> Self {
        Error::XmlSyntax {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
