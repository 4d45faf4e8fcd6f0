use crate::error::DecodeError;
use crate::tree::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Prefix of keys that hold attribute values.
pub const ATTRIBUTE_PREFIX: &str = "-";

/// Key holding an element's text when it also has attributes or children.
pub const TEXT_KEY: &str = "#text";

/// Decode an XML document into a tree.
///
/// The result is a mapping with a single key, the root element's name.
/// Within an element:
/// - attributes become `-name` string entries,
/// - child elements become entries under their own name, turning into a
///   sequence (in document order) when the name repeats,
/// - text becomes a `#text` entry, or the element's whole value when it has
///   neither attributes nor children.
///
/// Every leaf is a string; typing is left to variable declarations.
/// Elements nested more than `max_depth` levels deep are rejected.
pub fn from_xml(input: &str, max_depth: usize) -> Result<Value, DecodeError> {
    let mut p = XmlParser::new(input, max_depth);
    p.skip_misc()?;
    if p.pos >= p.input.len() {
        return Err(p.error("Document has no root element"));
    }
    let (name, element) = p.parse_element(1)?;
    p.skip_misc()?;
    if p.pos < p.input.len() {
        return Err(p.error("Trailing content after the root element"));
    }
    let mut root = BTreeMap::new();
    root.insert(name, element);
    Ok(Value::Mapping(root))
}

struct XmlParser<'a> {
    src: &'a str,
    input: &'a [u8],
    pos: usize,
    max_depth: usize,
}

impl<'a> XmlParser<'a> {
    fn new(src: &'a str, max_depth: usize) -> Self {
        XmlParser {
            src,
            input: src.as_bytes(),
            pos: 0,
            max_depth,
        }
    }

    fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::Xml {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn starts_with(&self, s: &[u8]) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn expect(&mut self, ch: u8) -> Result<(), DecodeError> {
        if self.pos < self.input.len() && self.input[self.pos] == ch {
            self.pos += 1;
            Ok(())
        } else {
            let found = match self.src[self.pos..].chars().next() {
                Some(c) => format!("'{}'", c),
                None => "EOF".to_string(),
            };
            Err(self.error(format!("Expected '{}', found {}", ch as char, found)))
        }
    }

    /// Position of the next `needle` at or after the cursor.
    fn find(&self, needle: &[u8], what: &str) -> Result<usize, DecodeError> {
        self.input[self.pos..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|i| self.pos + i)
            .ok_or_else(|| self.error(format!("Unterminated {}", what)))
    }

    /// Move the cursor just past the next `terminator`.
    fn skip_past(&mut self, terminator: &[u8], what: &str) -> Result<(), DecodeError> {
        self.pos = self.find(terminator, what)? + terminator.len();
        Ok(())
    }

    /// Skip whitespace, comments, processing instructions and DOCTYPE.
    fn skip_misc(&mut self) -> Result<(), DecodeError> {
        loop {
            self.skip_ws();
            if self.starts_with(b"<?") {
                self.skip_past(b"?>", "processing instruction")?;
            } else if self.starts_with(b"<!--") {
                self.skip_past(b"-->", "comment")?;
            } else if self.starts_with(b"<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_doctype(&mut self) -> Result<(), DecodeError> {
        // Internal subsets may contain '>' inside [...].
        let mut depth = 0usize;
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            self.pos += 1;
            match ch {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(self.error("Unterminated DOCTYPE"))
    }

    fn parse_name(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>' | b'=' | b'<' => break,
                _ => self.pos += 1,
            }
        }
        if self.pos == start {
            return Err(self.error("Expected a name"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_quoted(&mut self) -> Result<String, DecodeError> {
        let quote = match self.input.get(self.pos) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => return Err(self.error("Expected a quoted attribute value")),
        };
        self.pos += 1;
        let end = self.find(&[quote], "attribute value")?;
        let raw = &self.src[self.pos..end];
        let start = self.pos;
        self.pos = end + 1;
        decode_entities(raw).map_err(|message| DecodeError::Xml {
            message,
            offset: start,
        })
    }

    /// Parse `<name ...>...</name>` or `<name .../>` at the cursor.
    fn parse_element(&mut self, depth: usize) -> Result<(String, Value), DecodeError> {
        if depth > self.max_depth {
            return Err(self.error(format!(
                "Element nesting exceeds {} levels",
                self.max_depth
            )));
        }
        self.expect(b'<')?;
        let name = self.parse_name()?;
        let mut entries: BTreeMap<String, Value> = BTreeMap::new();

        loop {
            self.skip_ws();
            if self.starts_with(b"/>") {
                self.pos += 2;
                return Ok((name, finish_element(entries, "")));
            }
            if self.starts_with(b">") {
                self.pos += 1;
                break;
            }
            if self.pos >= self.input.len() {
                return Err(self.error(format!("Unterminated start tag <{}>", name)));
            }
            let attr = self.parse_name()?;
            self.skip_ws();
            self.expect(b'=')?;
            self.skip_ws();
            let value = self.parse_quoted()?;
            insert_entry(
                &mut entries,
                format!("{}{}", ATTRIBUTE_PREFIX, attr),
                Value::String(value),
            );
        }

        let mut text = String::new();
        loop {
            if self.pos >= self.input.len() {
                return Err(self.error(format!("Unterminated element <{}>", name)));
            }
            if self.starts_with(b"</") {
                self.pos += 2;
                let closing = self.parse_name()?;
                if closing != name {
                    return Err(self.error(format!(
                        "Mismatched closing tag: expected </{}>, found </{}>",
                        name, closing
                    )));
                }
                self.skip_ws();
                self.expect(b'>')?;
                break;
            } else if self.starts_with(b"<!--") {
                self.skip_past(b"-->", "comment")?;
            } else if self.starts_with(b"<![CDATA[") {
                self.pos += b"<![CDATA[".len();
                let end = self.find(b"]]>", "CDATA section")?;
                text.push_str(&self.src[self.pos..end]);
                self.pos = end + 3;
            } else if self.starts_with(b"<?") {
                self.skip_past(b"?>", "processing instruction")?;
            } else if self.starts_with(b"<") {
                let (child, value) = self.parse_element(depth + 1)?;
                insert_entry(&mut entries, child, value);
            } else {
                let start = self.pos;
                let end = self.input[start..]
                    .iter()
                    .position(|&b| b == b'<')
                    .map_or(self.input.len(), |i| start + i);
                self.pos = end;
                let decoded = decode_entities(&self.src[start..end]).map_err(|message| {
                    DecodeError::Xml {
                        message,
                        offset: start,
                    }
                })?;
                text.push_str(&decoded);
            }
        }

        Ok((name, finish_element(entries, &text)))
    }
}

fn finish_element(mut entries: BTreeMap<String, Value>, text: &str) -> Value {
    let text = text.trim();
    if entries.is_empty() {
        return Value::String(text.to_string());
    }
    if !text.is_empty() {
        insert_entry(&mut entries, TEXT_KEY.to_string(), Value::String(text.to_string()));
    }
    Value::Mapping(entries)
}

/// Insert a child, turning repeated names into a sequence.
fn insert_entry(entries: &mut BTreeMap<String, Value>, key: String, value: Value) {
    match entries.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
        }
        Entry::Occupied(mut slot) => match slot.get_mut() {
            Value::Sequence(items) => items.push(value),
            existing => {
                let first = std::mem::take(existing);
                *existing = Value::Sequence(vec![first, value]);
            }
        },
    }
}

/// Replace predefined entities and character references.
fn decode_entities(raw: &str) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| format!("Unterminated entity in \"{}\"", raw))?;
        let entity = &after[..semi];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => return Err(format!("Unknown entity \"&{};\"", entity)),
                }
            }
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
