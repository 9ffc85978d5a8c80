//! Producer-thread runtime and parser registration.
//!
//! One dedicated thread per reader pulls character chunks from the input
//! queue, feeds them to the tokenizer and pushes committed buffers to the
//! output queue. The header is fulfilled exactly once through its own
//! one-shot channel. An empty chunk is the end-of-input sentinel; closing
//! the input queue has the same effect.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::Buffer;
use crate::xml::XmlEventSource;

use super::header::Header;
use super::parser::{OsmXmlParser, ReaderConfig};

/// One chunk of input characters. `Err` propagates an upstream I/O
/// failure into the parser thread.
pub type InputChunk = std::result::Result<Vec<u8>, Error>;

/// OS-visible name of the producer thread.
const THREAD_NAME: &str = "_rustyosm_xml_in";

/// Everything a parser needs to run: configuration plus its three
/// channels.
pub struct ParserInput {
    pub config: ReaderConfig,
    pub input: Receiver<InputChunk>,
    pub output: Sender<std::result::Result<Buffer, Error>>,
    pub header: Sender<std::result::Result<Header, Error>>,
}

/// The XML reader's producer thread.
pub struct XmlInput;

impl XmlInput {
    /// Spawn the producer thread. The thread exits when the input is
    /// exhausted, when only the header is wanted and it has been
    /// delivered, or on the first error.
    pub fn spawn(input: ParserInput) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(input))
    }
}

fn run(input: ParserInput) {
    debug!(thread = THREAD_NAME, "xml reader started");
    let ParserInput {
        config,
        input: chunks,
        output,
        header,
    } = input;

    let mut parser = OsmXmlParser::new(config, output, header);
    let mut source = XmlEventSource::new();

    let result = run_loop(&chunks, &mut parser, &mut source);
    match result {
        Ok(()) => debug!(thread = THREAD_NAME, "xml reader finished"),
        Err(error) => {
            warn!(thread = THREAD_NAME, %error, "xml reader failed");
            parser.fail(error);
        }
    }
}

fn run_loop(
    chunks: &Receiver<InputChunk>,
    parser: &mut OsmXmlParser,
    source: &mut XmlEventSource,
) -> Result<()> {
    loop {
        match chunks.recv() {
            Ok(Ok(chunk)) => {
                let last = chunk.is_empty();
                source.feed(&chunk, last, parser)?;
                if last {
                    break;
                }
                // Early exit: header-only consumers do not need the rest
                // of the stream.
                if parser.read_types().is_empty() && parser.header_is_done() {
                    debug!("read filter is empty and header is done, exiting early");
                    break;
                }
            }
            Ok(Err(error)) => return Err(error),
            // Input queue closed: drain what we have and stop.
            Err(_) => {
                source.feed(b"", true, parser)?;
                break;
            }
        }
    }
    parser.flush_final()
}

/// Tags under which parsers register with the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Xml,
}

type SpawnFn = fn(ParserInput) -> std::io::Result<JoinHandle<()>>;

/// Registry mapping file formats to parser constructors. The XML parser
/// registers itself when the instance is first accessed.
pub struct ParserFactory {
    parsers: Mutex<HashMap<FileFormat, SpawnFn>>,
}

impl ParserFactory {
    /// The global factory.
    pub fn instance() -> &'static ParserFactory {
        static INSTANCE: OnceLock<ParserFactory> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            let factory = ParserFactory {
                parsers: Mutex::new(HashMap::new()),
            };
            factory.register(FileFormat::Xml, XmlInput::spawn);
            factory
        })
    }

    /// Register a parser constructor. Returns false when the format was
    /// already taken.
    pub fn register(&self, format: FileFormat, spawn: SpawnFn) -> bool {
        let mut parsers = match self.parsers.lock() {
            Ok(parsers) => parsers,
            Err(poisoned) => poisoned.into_inner(),
        };
        if parsers.contains_key(&format) {
            return false;
        }
        parsers.insert(format, spawn);
        true
    }

    /// Spawn the registered parser for `format`.
    pub fn spawn(
        &self,
        format: FileFormat,
        input: ParserInput,
    ) -> Option<std::io::Result<JoinHandle<()>>> {
        let spawn = {
            let parsers = match self.parsers.lock() {
                Ok(parsers) => parsers,
                Err(poisoned) => poisoned.into_inner(),
            };
            parsers.get(&format).copied()
        };
        spawn.map(|f| f(input))
    }
}
