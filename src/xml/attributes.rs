//! XML attribute parsing.
//!
//! Parses the attribute region of a tag (between the element name and the
//! closing `>`). Values are entity-decoded; names and values must be valid
//! UTF-8. Malformed attribute syntax is an error, matching the no-recovery
//! policy of the reader.

use std::borrow::Cow;

use super::entities::decode_text;
use super::tokenizer::{is_name_char, is_name_start};

/// A parsed XML attribute.
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Attribute name.
    pub name: &'a str,
    /// Attribute value, entities decoded.
    pub value: Cow<'a, str>,
}

/// Parse attributes from raw tag content (after the element name).
pub fn parse_attributes(input: &[u8]) -> Result<Vec<Attribute<'_>>, &'static str> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }

        // Attribute name.
        let name_start = pos;
        if !is_name_start(input[pos]) {
            return Err("invalid attribute name");
        }
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name =
            std::str::from_utf8(&input[name_start..pos]).map_err(|_| "attribute name is not UTF-8")?;

        // '=' with optional surrounding whitespace.
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() || input[pos] != b'=' {
            return Err("attribute without value");
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        // Quoted value.
        if pos >= input.len() {
            return Err("attribute value missing");
        }
        let quote = input[pos];
        if quote != b'"' && quote != b'\'' {
            return Err("attribute value must be quoted");
        }
        pos += 1;
        let value_start = pos;
        while pos < input.len() && input[pos] != quote {
            pos += 1;
        }
        if pos >= input.len() {
            return Err("attribute value has mismatched quotes");
        }

        let value = match decode_text(&input[value_start..pos]) {
            Cow::Borrowed(bytes) => Cow::Borrowed(
                std::str::from_utf8(bytes).map_err(|_| "attribute value is not UTF-8")?,
            ),
            Cow::Owned(bytes) => Cow::Owned(
                String::from_utf8(bytes).map_err(|_| "attribute value is not UTF-8")?,
            ),
        };
        attrs.push(Attribute { name, value });
        pos += 1;
    }

    Ok(attrs)
}

#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
