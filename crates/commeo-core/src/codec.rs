//! Commeo text codec
//!
//! Decodes the gateway's XML-RPC dialect into [`Frame`]s and encodes outbound
//! method calls. Only the small subset the gateway emits is understood:
//! elements, text, comments, CDATA, an optional prolog, and the five
//! predefined entities plus numeric character references. Attributes are
//! skipped.

use std::collections::BTreeSet;

use base64::{engine::general_purpose, Engine as _};
use tracing::trace;

use crate::frame::{Envelope, Field, FieldKind, Frame};
use crate::{Error, Result};

/// Bytes emitted for an actor bitmask; the gateway addresses up to 64 actors
const INT_SET_MIN_BYTES: usize = 8;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Decode one frame of gateway text.
///
/// Anything before the first `<` is discarded. A `<fault>` envelope is
/// returned as [`Error::Fault`], never as a frame.
pub fn decode(raw: &str) -> Result<Frame> {
    let start = raw
        .find('<')
        .ok_or_else(|| Error::Format("no markup in frame".to_string()))?;
    let root = Parser::new(&raw[start..]).parse_document()?;

    let envelope = match root.name.as_str() {
        "methodCall" => Envelope::Call,
        "methodResponse" => Envelope::Response,
        other => {
            return Err(Error::Format(format!(
                "unexpected root element <{}>",
                other
            )))
        }
    };

    if let Some(fault) = root.child("fault") {
        let mut strings = Vec::new();
        fault.collect_text("string", &mut strings);
        return Err(Error::Fault(strings));
    }

    let fields = root
        .child("array")
        .map(|array| {
            array
                .children
                .iter()
                .filter_map(|c| FieldKind::from_tag(&c.name).map(|k| Field::new(k, c.text.clone())))
                .collect()
        })
        .unwrap_or_default();

    match envelope {
        Envelope::Call => {
            let name = root
                .child("methodName")
                .map(|e| e.text.clone())
                .ok_or_else(|| Error::Format("methodCall without methodName".to_string()))?;
            Ok(Frame::call(name, fields))
        }
        Envelope::Response => Ok(Frame::response(fields)),
    }
}

/// Encode a frame to wire text (without the terminator)
pub fn encode(frame: &Frame) -> String {
    let root = frame.envelope().root_tag();
    let mut out = String::with_capacity(64 + frame.fields().len() * 24);

    out.push('<');
    out.push_str(root);
    out.push('>');

    if frame.envelope() == Envelope::Call {
        if let Ok(name) = frame.method_name() {
            out.push_str("<methodName>");
            out.push_str(&escape(name));
            out.push_str("</methodName>");
        }
    }

    if !frame.fields().is_empty() {
        out.push_str("<array>");
        for field in frame.fields() {
            let tag = field.kind.tag();
            out.push('<');
            out.push_str(tag);
            out.push('>');
            out.push_str(&escape(&field.text));
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        out.push_str("</array>");
    }

    out.push_str("</");
    out.push_str(root);
    out.push('>');
    out
}

/// Encode an outbound method call with integer arguments
pub fn encode_call(method: &str, args: &[i64]) -> String {
    let fields = args
        .iter()
        .map(|a| Field::new(FieldKind::Int, a.to_string()))
        .collect();
    encode(&Frame::call(method, fields))
}

/// Expand a base64 little-endian bitmask into the set of its set bit positions.
///
/// Byte 0 holds bits 0..8, byte 1 holds bits 8..16, and so on; within a byte
/// the least significant bit comes first. `"BQ=="` (`0x05`) is `{0, 2}`.
pub fn decode_int_set(b64: &str) -> Result<BTreeSet<u32>> {
    let compact: String = b64.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(compact.as_bytes())?;

    let mut set = BTreeSet::new();
    for (byte_index, byte) in bytes.iter().enumerate() {
        for bit in 0..8u32 {
            if byte & (1 << bit) != 0 {
                set.insert(byte_index as u32 * 8 + bit);
            }
        }
    }

    trace!("int set {} -> {:?}", compact, set);
    Ok(set)
}

/// Pack a set of IDs into the gateway's base64 bitmask
pub fn encode_int_set(ids: &BTreeSet<u32>) -> String {
    let needed = ids
        .iter()
        .next_back()
        .map(|max| *max as usize / 8 + 1)
        .unwrap_or(0);
    let mut bytes = vec![0u8; needed.max(INT_SET_MIN_BYTES)];
    for id in ids {
        bytes[*id as usize / 8] |= 1 << (id % 8);
    }
    general_purpose::STANDARD.encode(bytes)
}

// ============================================================================
// TEXT ESCAPING
// ============================================================================

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()))
                .and_then(|n| n.ok())
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            // Unknown entity: keep it verbatim
            None => out.push_str(&tail[..=semi]),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

// ============================================================================
// MINIMAL XML TREE
// ============================================================================

#[derive(Debug)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn collect_text(&self, name: &str, out: &mut Vec<String>) {
        for child in &self.children {
            if child.name == name {
                out.push(child.text.clone());
            }
            child.collect_text(name, out);
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn skip_past(&mut self, marker: &str, what: &str) -> Result<()> {
        let idx = self
            .rest()
            .find(marker)
            .ok_or_else(|| Error::Format(format!("unterminated {}", what)))?;
        self.pos += idx + marker.len();
        Ok(())
    }

    /// Skip whitespace, prolog and comments between top-level nodes
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if self.rest().starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_document(mut self) -> Result<Element> {
        self.skip_misc()?;
        let root = self.parse_element()?;
        self.skip_misc()?;
        if !self.rest().is_empty() {
            return Err(Error::Format(
                "trailing content after root element".to_string(),
            ));
        }
        Ok(root)
    }

    fn parse_name(&mut self) -> Result<String> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(Error::Format(format!("expected element name at {}", self.pos)));
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn parse_element(&mut self) -> Result<Element> {
        if !self.rest().starts_with('<') {
            return Err(Error::Format(format!("expected '<' at {}", self.pos)));
        }
        self.pos += 1;
        let name = self.parse_name()?;

        let close = self
            .rest()
            .find('>')
            .ok_or_else(|| Error::Format(format!("unterminated tag <{}", name)))?;
        let self_closing = self.rest()[..close].trim_end().ends_with('/');
        self.pos += close + 1;

        let mut element = Element::new(name);
        if self_closing {
            return Ok(element);
        }

        loop {
            let rest = self.rest();
            let lt = rest
                .find('<')
                .ok_or_else(|| Error::Format(format!("unterminated <{}>", element.name)))?;
            element.text.push_str(&unescape(&rest[..lt]));
            self.pos += lt;

            let rest = self.rest();
            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.parse_name()?;
                if closing != element.name {
                    return Err(Error::Format(format!(
                        "mismatched closing tag: <{}> closed by </{}>",
                        element.name, closing
                    )));
                }
                self.skip_whitespace();
                if !self.rest().starts_with('>') {
                    return Err(Error::Format(format!("malformed </{}>", closing)));
                }
                self.pos += 1;
                element.text = element.text.trim().to_string();
                return Ok(element);
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if let Some(cdata) = rest.strip_prefix("<![CDATA[") {
                let end = cdata
                    .find("]]>")
                    .ok_or_else(|| Error::Format("unterminated CDATA".to_string()))?;
                element.text.push_str(&cdata[..end]);
                self.pos += "<![CDATA[".len() + end + "]]>".len();
            } else {
                let child = self.parse_element()?;
                element.children.push(child);
            }
        }
    }
}
