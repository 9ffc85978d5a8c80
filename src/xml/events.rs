//! Chunked push adapter over the tokenizer.
//!
//! An [`XmlEventSource`] accepts data in arbitrary-sized chunks, keeps the
//! unprocessable tail between feeds and dispatches start/end/text events to
//! an [`XmlHandler`]. Tokenizer errors are surfaced with line/column
//! positions tracked across feeds.

use memchr::{memchr_iter, memrchr};

use crate::error::{Error, Result};

use super::attributes::{parse_attributes, Attribute};
use super::tokenizer::{Token, TokenKind, Tokenizer, TokenizerError};

/// Receiver of XML events.
///
/// Empty elements are delivered as a start immediately followed by an end.
/// Whitespace between elements arrives through `characters` like any other
/// text, mirroring the behavior of push parsers.
pub trait XmlHandler {
    fn start_element(&mut self, name: &str, attrs: &[Attribute<'_>]) -> Result<()>;
    fn end_element(&mut self, name: &str) -> Result<()>;
    fn characters(&mut self, text: &str) -> Result<()>;
}

/// Find a safe boundary in a buffer: the offset just past the last `>`
/// that is outside quotes and outside a DOCTYPE bracket section. Bytes
/// beyond the boundary are kept as the tail for the next feed, so no
/// markup construct is ever tokenized half-complete.
fn find_safe_boundary(buf: &[u8]) -> usize {
    let mut last_valid_gt = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut bracket_depth = 0usize;

    for (i, &b) in buf.iter().enumerate() {
        match b {
            b'"' if !in_single => in_double = !in_double,
            b'\'' if !in_double => in_single = !in_single,
            b'[' if !in_single && !in_double => bracket_depth += 1,
            b']' if !in_single && !in_double => bracket_depth = bracket_depth.saturating_sub(1),
            b'>' if !in_single && !in_double && bracket_depth == 0 => last_valid_gt = i + 1,
            _ => {}
        }
    }
    last_valid_gt
}

/// Chunk-fed XML event source with position tracking.
pub struct XmlEventSource {
    /// Unprocessed bytes carried over from the previous feed.
    tail: Vec<u8>,
    /// Names of currently open elements, for well-formedness checking.
    open_elements: Vec<Vec<u8>>,
    line: u64,
    column: u64,
}

impl XmlEventSource {
    pub fn new() -> Self {
        XmlEventSource {
            tail: Vec::new(),
            open_elements: Vec::new(),
            line: 1,
            column: 1,
        }
    }

    /// Feed one chunk. With `last`, everything is processed and an
    /// unterminated construct is an error; otherwise processing stops at
    /// the last safe boundary and the rest is buffered.
    pub fn feed<H: XmlHandler>(&mut self, chunk: &[u8], last: bool, handler: &mut H) -> Result<()> {
        let assembled;
        let input: &[u8] = if self.tail.is_empty() {
            chunk
        } else {
            let mut carried = std::mem::take(&mut self.tail);
            carried.extend_from_slice(chunk);
            assembled = carried;
            &assembled
        };

        let boundary = if last { input.len() } else { find_safe_boundary(input) };
        let processable = &input[..boundary];

        let mut tokenizer = Tokenizer::new(processable);
        loop {
            match tokenizer.next_token() {
                Ok(token) => {
                    if token.kind == TokenKind::Eof {
                        break;
                    }
                    match token.kind {
                        TokenKind::StartTag => {
                            self.open_elements.push(token.name.unwrap_or(b"").to_vec());
                        }
                        TokenKind::EndTag => {
                            let matches = self
                                .open_elements
                                .pop()
                                .is_some_and(|open| Some(open.as_slice()) == token.name);
                            if !matches {
                                return Err(self.syntax_error(
                                    processable,
                                    token.span.0,
                                    "mismatched end tag",
                                ));
                            }
                        }
                        _ => {}
                    }
                    if let Err(e) = dispatch(processable, &token, handler) {
                        return Err(match e {
                            DispatchError::At(pos, msg) => {
                                self.syntax_error(processable, pos, msg)
                            }
                            DispatchError::Fatal(err) => err,
                        });
                    }
                }
                Err(TokenizerError::EntityDeclaration) => {
                    return Err(Error::EntitiesNotSupported);
                }
                Err(TokenizerError::Syntax { position, message }) => {
                    return Err(self.syntax_error(processable, position, message));
                }
            }
        }

        self.advance_position(processable);
        self.tail = input[boundary..].to_vec();
        // Keep the long-lived tail small; at a chunk boundary it holds a
        // partial tag, not document-sized data.
        self.tail.shrink_to(1024);

        if last && !self.open_elements.is_empty() {
            return Err(Error::syntax(
                self.line,
                self.column,
                "unexpected end of input: unclosed element",
            ));
        }
        Ok(())
    }

    fn syntax_error(&self, processed: &[u8], position: usize, message: &str) -> Error {
        let (line, column) = position_after(&processed[..position], self.line, self.column);
        Error::syntax(line, column, message)
    }

    fn advance_position(&mut self, bytes: &[u8]) {
        let (line, column) = position_after(bytes, self.line, self.column);
        self.line = line;
        self.column = column;
    }
}

impl Default for XmlEventSource {
    fn default() -> Self {
        XmlEventSource::new()
    }
}

/// Line/column (1-based) after consuming `bytes` from the given position.
fn position_after(bytes: &[u8], line: u64, column: u64) -> (u64, u64) {
    let newlines = memchr_iter(b'\n', bytes).count() as u64;
    match memrchr(b'\n', bytes) {
        Some(last) => (line + newlines, (bytes.len() - last) as u64),
        None => (line, column + bytes.len() as u64),
    }
}

enum DispatchError {
    /// Positioned syntax problem (attribute syntax, UTF-8).
    At(usize, &'static str),
    /// Error raised by the handler, forwarded unchanged.
    Fatal(Error),
}

fn dispatch<H: XmlHandler>(
    input: &[u8],
    token: &Token<'_>,
    handler: &mut H,
) -> std::result::Result<(), DispatchError> {
    match token.kind {
        TokenKind::StartTag | TokenKind::EmptyTag => {
            let name = name_str(token)?;
            let (start, end) = token.attrs_span.unwrap_or((0, 0));
            let attrs = parse_attributes(&input[start..end])
                .map_err(|msg| DispatchError::At(token.span.0, msg))?;
            handler
                .start_element(name, &attrs)
                .map_err(DispatchError::Fatal)?;
            if token.kind == TokenKind::EmptyTag {
                handler.end_element(name).map_err(DispatchError::Fatal)?;
            }
        }
        TokenKind::EndTag => {
            handler
                .end_element(name_str(token)?)
                .map_err(DispatchError::Fatal)?;
        }
        TokenKind::Text | TokenKind::CData => {
            if let Some(content) = &token.content {
                let text = std::str::from_utf8(content)
                    .map_err(|_| DispatchError::At(token.span.0, "text content is not UTF-8"))?;
                handler.characters(text).map_err(DispatchError::Fatal)?;
            }
        }
        // Declarations, comments and PIs carry no OSM data.
        _ => {}
    }
    Ok(())
}

fn name_str<'a>(token: &Token<'a>) -> std::result::Result<&'a str, DispatchError> {
    std::str::from_utf8(token.name.unwrap_or(b""))
        .map_err(|_| DispatchError::At(token.span.0, "element name is not UTF-8"))
}
