//! Decoded gateway frames
//!
//! A frame is one terminator-delimited message. The gateway speaks a reduced
//! XML-RPC dialect:
//! ```text
//! <methodCall>
//!   <methodName>selve.GW.event.device</methodName>
//!   <array><int>5</int><int>1</int><int>0</int><int>0</int></array>
//! </methodCall>
//!
//! <methodResponse>
//!   <array><string>selve.GW.device.getInfo</string><int>5</int>...</array>
//! </methodResponse>
//! ```
//! Fields are addressed by type and position: `int(1)` is the second `<int>`
//! in the array, regardless of how many strings precede it.

use std::collections::BTreeSet;
use std::fmt;

use crate::codec::decode_int_set;
use crate::{Error, Method, Result};

/// Envelope root of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `<methodCall>`, used for gateway events and for our own requests
    Call,
    /// `<methodResponse>`, the method name is the first string field
    Response,
}

impl Envelope {
    pub fn root_tag(&self) -> &'static str {
        match self {
            Envelope::Call => "methodCall",
            Envelope::Response => "methodResponse",
        }
    }
}

/// Wire type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Int,
    Base64,
}

impl FieldKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(FieldKind::String),
            "int" | "i4" => Some(FieldKind::Int),
            "base64" => Some(FieldKind::Base64),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Int => "int",
            FieldKind::Base64 => "base64",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single positional field, kept as unescaped text until accessed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub kind: FieldKind,
    pub text: String,
}

impl Field {
    pub fn new(kind: FieldKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A decoded Commeo frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    envelope: Envelope,
    method_name: Option<String>,
    fields: Vec<Field>,
}

impl Frame {
    /// Create a method call frame
    pub fn call(method_name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            envelope: Envelope::Call,
            method_name: Some(method_name.into()),
            fields,
        }
    }

    /// Create a method response frame
    pub fn response(fields: Vec<Field>) -> Self {
        Self {
            envelope: Envelope::Response,
            method_name: None,
            fields,
        }
    }

    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Method name: the dedicated element of a call, the 0th string of a response
    pub fn method_name(&self) -> Result<&str> {
        match self.envelope {
            Envelope::Call => self
                .method_name
                .as_deref()
                .ok_or_else(|| Error::Format("methodCall without methodName".to_string())),
            Envelope::Response => self.string(0),
        }
    }

    pub fn method(&self) -> Result<Method> {
        self.method_name().map(Method::from_name)
    }

    /// Number of fields of the given kind
    pub fn count(&self, kind: FieldKind) -> usize {
        self.fields.iter().filter(|f| f.kind == kind).count()
    }

    fn nth(&self, kind: FieldKind, index: usize) -> Result<&str> {
        self.fields
            .iter()
            .filter(|f| f.kind == kind)
            .nth(index)
            .map(|f| f.text.as_str())
            .ok_or(Error::MissingField { kind, index })
    }

    /// The `index`-th `<string>` field
    pub fn string(&self, index: usize) -> Result<&str> {
        self.nth(FieldKind::String, index)
    }

    /// The `index`-th `<int>` field
    pub fn int(&self, index: usize) -> Result<i64> {
        let text = self.nth(FieldKind::Int, index)?;
        text.trim().parse().map_err(|_| Error::InvalidField {
            kind: FieldKind::Int,
            index,
            value: text.to_string(),
        })
    }

    /// The `index`-th `<int>` field, converted to a narrower integer type
    pub fn int_as<T: TryFrom<i64>>(&self, index: usize) -> Result<T> {
        let value = self.int(index)?;
        T::try_from(value).map_err(|_| Error::InvalidField {
            kind: FieldKind::Int,
            index,
            value: value.to_string(),
        })
    }

    /// The `index`-th `<base64>` field, expanded from a little-endian bitmask
    pub fn int_set(&self, index: usize) -> Result<BTreeSet<u32>> {
        decode_int_set(self.nth(FieldKind::Base64, index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_response() -> Frame {
        Frame::response(vec![
            Field::new(FieldKind::String, "selve.GW.device.getInfo"),
            Field::new(FieldKind::Int, "5"),
            Field::new(FieldKind::String, "Kitchen"),
            Field::new(FieldKind::Int, "1234567"),
            Field::new(FieldKind::Int, "1"),
            Field::new(FieldKind::Int, "1"),
        ])
    }

    #[test]
    fn test_response_method_name_is_first_string() {
        let frame = info_response();
        assert_eq!(frame.method_name().unwrap(), "selve.GW.device.getInfo");
        assert_eq!(frame.method().unwrap(), Method::DeviceGetInfo);
    }

    #[test]
    fn test_typed_index_skips_other_kinds() {
        let frame = info_response();
        assert_eq!(frame.int(0).unwrap(), 5);
        assert_eq!(frame.string(1).unwrap(), "Kitchen");
        assert_eq!(frame.int(1).unwrap(), 1234567);
        assert_eq!(frame.count(FieldKind::Int), 4);
    }

    #[test]
    fn test_singleton_only_resolves_index_zero() {
        let frame = Frame::call("selve.GW.device.getIDs", vec![Field::new(FieldKind::Int, "7")]);
        assert_eq!(frame.int(0).unwrap(), 7);
        assert_eq!(
            frame.int(1),
            Err(Error::MissingField {
                kind: FieldKind::Int,
                index: 1
            })
        );
    }

    #[test]
    fn test_invalid_int() {
        let frame = Frame::call("x", vec![Field::new(FieldKind::Int, "abc")]);
        assert!(matches!(frame.int(0), Err(Error::InvalidField { .. })));
    }

    #[test]
    fn test_int_as_rejects_negative_actor_id() {
        let frame = Frame::call("x", vec![Field::new(FieldKind::Int, "-1")]);
        assert!(frame.int_as::<u32>(0).is_err());
        assert_eq!(frame.int_as::<i32>(0).unwrap(), -1);
    }

    #[test]
    fn test_call_without_name_is_format_error() {
        let frame = Frame {
            envelope: Envelope::Call,
            method_name: None,
            fields: Vec::new(),
        };
        assert!(matches!(frame.method_name(), Err(Error::Format(_))));
    }
}
