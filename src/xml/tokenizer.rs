//! XML tokenizer.
//!
//! Pull tokenizer over one complete slice (the chunked adapter in
//! `events` guarantees it never sees a construct split across feeds,
//! except at end of input). The cursor lives directly in the tokenizer:
//! a byte position plus memchr-backed searches, with exactly the helpers
//! the token grammar needs. Only the constructs OSM files can contain are
//! accepted; everything else is a syntax error carrying the byte position
//! of the offending construct.
//!
//! Any XML entity declaration inside a DOCTYPE internal subset is rejected
//! outright. Entities are normally not used in OSM files, but they can be
//! misused, see <https://en.wikipedia.org/wiki/Billion_laughs>.

use std::borrow::Cow;

use memchr::memchr;

use super::entities::decode_text;

/// Type of XML token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: `<element>`
    StartTag,
    /// Element end tag: `</element>`
    EndTag,
    /// Empty element: `<element/>`
    EmptyTag,
    /// Text content
    Text,
    /// CDATA section: `<![CDATA[...]]>`
    CData,
    /// Comment: `<!--...-->`
    Comment,
    /// Processing instruction: `<?target ...?>`
    Pi,
    /// XML declaration: `<?xml ...?>`
    XmlDecl,
    /// DOCTYPE declaration (free of entity declarations)
    Doctype,
    /// End of input
    Eof,
}

/// A parsed XML token.
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw span in input (start, end).
    pub span: (usize, usize),
    /// For tags: the element name.
    pub name: Option<&'a [u8]>,
    /// For text/cdata: the content, entity-decoded for text.
    pub content: Option<Cow<'a, [u8]>>,
    /// For start/empty tags: span of the attribute region.
    pub attrs_span: Option<(usize, usize)>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            content: None,
            attrs_span: None,
        }
    }
}

/// Tokenizer failure. Positions are byte offsets into the tokenized slice;
/// the chunked adapter translates them to line/column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    Syntax {
        position: usize,
        message: &'static str,
    },
    /// An `<!ENTITY` declaration was found.
    EntityDeclaration,
}

fn syntax(position: usize, message: &'static str) -> TokenizerError {
    TokenizerError::Syntax { position, message }
}

/// Valid first byte of an XML name. Non-ASCII bytes pass, they may start
/// a UTF-8 encoded Unicode letter.
#[inline]
pub(crate) fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || !b.is_ascii()
}

/// Valid continuation byte of an XML name.
#[inline]
pub(crate) fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b':') || !b.is_ascii()
}

/// Pull tokenizer over a byte slice.
pub struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer { input, pos: 0 }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Absolute offset of the next `byte`, searching from the cursor.
    #[inline]
    fn find(&self, byte: u8) -> Option<usize> {
        memchr(byte, self.rest()).map(|i| self.pos + i)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Consume an XML name at the cursor. `None` when the current byte
    /// cannot start a name.
    fn eat_name(&mut self) -> Option<&'a [u8]> {
        let rest = self.rest();
        if !rest.first().copied().is_some_and(is_name_start) {
            return None;
        }
        let len = rest.iter().take_while(|&&b| is_name_char(b)).count();
        self.pos += len;
        Some(&rest[..len])
    }

    /// Absolute offset of the `>` closing the current tag, skipping over
    /// quoted attribute values.
    fn closing_gt(&self) -> Option<usize> {
        let mut quote = 0u8;
        for (i, &b) in self.rest().iter().enumerate() {
            match b {
                b'"' | b'\'' if quote == 0 => quote = b,
                _ if b == quote => quote = 0,
                b'>' if quote == 0 => return Some(self.pos + i),
                _ => {}
            }
        }
        None
    }

    /// Get the next token. `Eof` marks the end of the slice.
    pub fn next_token(&mut self) -> Result<Token<'a>, TokenizerError> {
        match self.peek() {
            None => Ok(Token::new(TokenKind::Eof, (self.pos, self.pos))),
            Some(b'<') => self.parse_markup(),
            Some(_) => self.parse_text(),
        }
    }

    /// Parse text content up to the next `<` or end of input.
    fn parse_text(&mut self) -> Result<Token<'a>, TokenizerError> {
        let start = self.pos;
        let end = self.find(b'<').unwrap_or(self.input.len());
        let content = &self.input[start..end];
        self.pos = end;

        let mut token = Token::new(TokenKind::Text, (start, end));
        token.content = Some(decode_text(content));
        Ok(token)
    }

    /// Parse markup starting with `<`.
    fn parse_markup(&mut self) -> Result<Token<'a>, TokenizerError> {
        let start = self.pos;
        self.pos += 1;

        match self.peek() {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            Some(b) if is_name_start(b) => self.parse_start_tag(start),
            _ => Err(syntax(start, "invalid element name")),
        }
    }

    /// Parse a start tag or empty element tag.
    fn parse_start_tag(&mut self, start: usize) -> Result<Token<'a>, TokenizerError> {
        let name = self
            .eat_name()
            .ok_or_else(|| syntax(start, "invalid element name"))?;
        let attrs_start = self.pos;

        let end = self
            .closing_gt()
            .ok_or_else(|| syntax(start, "unterminated tag"))?;
        let is_empty = end > attrs_start && self.input[end - 1] == b'/';

        self.pos = end + 1;

        let kind = if is_empty {
            TokenKind::EmptyTag
        } else {
            TokenKind::StartTag
        };
        let mut token = Token::new(kind, (start, end + 1));
        token.name = Some(name);
        token.attrs_span = Some((attrs_start, if is_empty { end - 1 } else { end }));
        Ok(token)
    }

    /// Parse an end tag.
    fn parse_end_tag(&mut self, start: usize) -> Result<Token<'a>, TokenizerError> {
        self.pos += 1; // Skip '/'
        let name = self
            .eat_name()
            .ok_or_else(|| syntax(start, "invalid element name in end tag"))?;
        self.skip_whitespace();
        if self.peek() != Some(b'>') {
            return Err(syntax(start, "malformed end tag"));
        }
        self.pos += 1;

        let mut token = Token::new(TokenKind::EndTag, (start, self.pos));
        token.name = Some(name);
        Ok(token)
    }

    /// Parse markup starting with `<!` (comment, CDATA, DOCTYPE).
    fn parse_bang_markup(&mut self, start: usize) -> Result<Token<'a>, TokenizerError> {
        self.pos += 1; // Skip '!'

        if self.rest().starts_with(b"--") {
            self.parse_comment(start)
        } else if self.rest().starts_with(b"[CDATA[") {
            self.parse_cdata(start)
        } else if self.rest().starts_with(b"DOCTYPE") {
            self.parse_doctype(start)
        } else {
            Err(syntax(start, "unsupported markup"))
        }
    }

    /// Parse a comment `<!--...-->`.
    fn parse_comment(&mut self, start: usize) -> Result<Token<'a>, TokenizerError> {
        self.pos += 2;
        let content_start = self.pos;

        loop {
            let dash = self
                .find(b'-')
                .ok_or_else(|| syntax(start, "unterminated comment"))?;
            if self.input[dash..].starts_with(b"-->") {
                let content = &self.input[content_start..dash];
                self.pos = dash + 3;
                let mut token = Token::new(TokenKind::Comment, (start, self.pos));
                token.content = Some(Cow::Borrowed(content));
                return Ok(token);
            }
            self.pos = dash + 1;
        }
    }

    /// Parse a CDATA section `<![CDATA[...]]>`.
    fn parse_cdata(&mut self, start: usize) -> Result<Token<'a>, TokenizerError> {
        self.pos += 7;
        let content_start = self.pos;

        loop {
            let bracket = self
                .find(b']')
                .ok_or_else(|| syntax(start, "unterminated CDATA section"))?;
            if self.input[bracket..].starts_with(b"]]>") {
                let content = &self.input[content_start..bracket];
                self.pos = bracket + 3;
                let mut token = Token::new(TokenKind::CData, (start, self.pos));
                token.content = Some(Cow::Borrowed(content));
                return Ok(token);
            }
            self.pos = bracket + 1;
        }
    }

    /// Parse a DOCTYPE declaration, rejecting entity declarations.
    fn parse_doctype(&mut self, start: usize) -> Result<Token<'a>, TokenizerError> {
        self.pos += 7; // Skip 'DOCTYPE'

        let mut in_subset = false;
        let mut quote = 0u8;

        loop {
            let b = self
                .peek()
                .ok_or_else(|| syntax(start, "unterminated DOCTYPE"))?;

            if quote != 0 {
                if b == quote {
                    quote = 0;
                }
                self.pos += 1;
                continue;
            }

            match b {
                b'"' | b'\'' => quote = b,
                b'[' => in_subset = true,
                b']' => in_subset = false,
                b'<' if in_subset => {
                    if self.rest().starts_with(b"<!ENTITY") {
                        return Err(TokenizerError::EntityDeclaration);
                    }
                }
                b'>' if !in_subset => {
                    self.pos += 1;
                    return Ok(Token::new(TokenKind::Doctype, (start, self.pos)));
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Parse a processing instruction `<?...?>`.
    fn parse_pi(&mut self, start: usize) -> Result<Token<'a>, TokenizerError> {
        self.pos += 1;
        let name = self
            .eat_name()
            .ok_or_else(|| syntax(start, "invalid processing instruction target"))?;

        loop {
            let qmark = self
                .find(b'?')
                .ok_or_else(|| syntax(start, "unterminated processing instruction"))?;
            if self.input.get(qmark + 1) == Some(&b'>') {
                self.pos = qmark + 2;
                let kind = if name.eq_ignore_ascii_case(b"xml") {
                    TokenKind::XmlDecl
                } else {
                    TokenKind::Pi
                };
                let mut token = Token::new(kind, (start, self.pos));
                token.name = Some(name);
                return Ok(token);
            }
            self.pos = qmark + 1;
        }
    }
}
