//! Reply templates over a described binary layout
//!
//! A [`ReplyTemplate`] is an immutable byte sequence together with the layout
//! it was built from: every field's name, offset, width and encoding. The
//! layout is what tests and audits look at instead of raw byte literals.
//!
//! Templates are produced by [`TemplateBuilder`], which writes the PDU tag,
//! patches the overall length and the IE count on [`TemplateBuilder::build`],
//! and computes every IE length from the value it carries.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::codec::{PduType, HEADER_LEN};

/// Template construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Cause string does not fit the one-byte cause length
    #[error("Cause too long: {len} bytes (max {max})")]
    CauseTooLong { len: usize, max: usize },

    /// A field value does not fit its length encoding
    #[error("Field {field} too long: {len} bytes (max {max})")]
    FieldTooLong { field: String, len: usize, max: usize },
}

/// How a field's bytes are to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Single-byte tag or discriminator
    Tag,
    /// Unsigned byte
    Uint8,
    /// Unsigned 16-bit, big-endian
    Uint16Be,
    /// ASCII text
    Ascii,
    /// Opaque octets
    Octets,
}

/// One field of a template layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Dotted field name, e.g. `amf_name.length`
    pub name: String,
    /// Offset from the first byte of the message
    pub offset: usize,
    /// Width in bytes
    pub width: usize,
    /// How the bytes are encoded
    pub encoding: Encoding,
}

/// One piece of an IE value
#[derive(Debug, Clone, Copy)]
pub struct ValuePart<'a> {
    /// Field name inside the IE
    pub name: &'static str,
    /// Encoding of the bytes
    pub encoding: Encoding,
    /// The bytes themselves
    pub bytes: &'a [u8],
}

impl<'a> ValuePart<'a> {
    /// Creates a value part
    pub const fn new(name: &'static str, encoding: Encoding, bytes: &'a [u8]) -> Self {
        Self {
            name,
            encoding,
            bytes,
        }
    }
}

/// Immutable reply bytes plus the layout they were built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTemplate {
    bytes: Bytes,
    layout: Vec<FieldSpec>,
}

impl ReplyTemplate {
    /// The encoded message
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the encoded message
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a built template
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// All fields in wire order
    pub fn layout(&self) -> &[FieldSpec] {
        &self.layout
    }

    /// Layout entry of a field
    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.layout.iter().find(|f| f.name == name)
    }

    /// Bytes of a field
    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.spec(name)
            .map(|f| &self.bytes[f.offset..f.offset + f.width])
    }

    /// Outcome tag (byte 0)
    pub fn pdu_type(&self) -> Option<PduType> {
        PduType::try_from(self.bytes[0]).ok()
    }

    /// Procedure code (byte 1)
    pub fn procedure_code(&self) -> u8 {
        self.bytes[1]
    }

    /// Length declared in bytes 2-3
    pub fn declared_length(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]])
    }
}

/// Builder for [`ReplyTemplate`]
#[derive(Debug)]
pub struct TemplateBuilder {
    buf: BytesMut,
    layout: Vec<FieldSpec>,
    ie_count: u8,
}

/// Offset of the IE count byte inside the protocol-IE container header
const IE_COUNT_OFFSET: usize = HEADER_LEN + 2;

impl TemplateBuilder {
    /// Starts a message with the given outcome and procedure code
    pub fn new(pdu_type: PduType, procedure_code: u8) -> Self {
        let mut builder = Self {
            buf: BytesMut::with_capacity(64),
            layout: Vec::new(),
            ie_count: 0,
        };
        builder.push("pdu_type", Encoding::Tag, &[pdu_type as u8]);
        builder.push("procedure_code", Encoding::Uint8, &[procedure_code]);
        builder.push("length", Encoding::Uint16Be, &[0x00, 0x00]);
        builder.push("ie_container", Encoding::Octets, &[0x00, 0x00]);
        builder.push("ie_count", Encoding::Uint8, &[0x00]);
        builder
    }

    /// Appends an IE with a two-byte length
    pub fn ie_wide(
        mut self,
        ie: &str,
        id: u16,
        value: &[ValuePart<'_>],
    ) -> Result<Self, TemplateError> {
        let len = value_len(value);
        let len = u16::try_from(len).map_err(|_| TemplateError::FieldTooLong {
            field: format!("{ie}.length"),
            len,
            max: usize::from(u16::MAX),
        })?;

        self.push(&format!("{ie}.id"), Encoding::Uint16Be, &id.to_be_bytes());
        self.push(&format!("{ie}.length"), Encoding::Uint16Be, &len.to_be_bytes());
        self.push_value(ie, value);
        self.ie_count += 1;
        Ok(self)
    }

    /// Appends an IE with a criticality byte and a one-byte length
    pub fn ie_short(
        mut self,
        ie: &str,
        id: u16,
        criticality: u8,
        value: &[ValuePart<'_>],
    ) -> Result<Self, TemplateError> {
        let len = value_len(value);
        let len = u8::try_from(len).map_err(|_| TemplateError::FieldTooLong {
            field: format!("{ie}.length"),
            len,
            max: usize::from(u8::MAX),
        })?;

        self.push(&format!("{ie}.id"), Encoding::Uint16Be, &id.to_be_bytes());
        self.push(&format!("{ie}.criticality"), Encoding::Tag, &[criticality]);
        self.push(&format!("{ie}.length"), Encoding::Uint8, &[len]);
        self.push_value(ie, value);
        self.ie_count += 1;
        Ok(self)
    }

    /// Patches length and IE count and freezes the bytes
    pub fn build(mut self) -> Result<ReplyTemplate, TemplateError> {
        let body = self.buf.len() - HEADER_LEN;
        let body = u16::try_from(body).map_err(|_| TemplateError::FieldTooLong {
            field: "length".into(),
            len: body,
            max: usize::from(u16::MAX),
        })?;

        self.buf[2..HEADER_LEN].copy_from_slice(&body.to_be_bytes());
        self.buf[IE_COUNT_OFFSET] = self.ie_count;

        Ok(ReplyTemplate {
            bytes: self.buf.freeze(),
            layout: self.layout,
        })
    }

    fn push_value(&mut self, ie: &str, value: &[ValuePart<'_>]) {
        for part in value {
            self.push(&format!("{ie}.{}", part.name), part.encoding, part.bytes);
        }
    }

    fn push(&mut self, name: &str, encoding: Encoding, bytes: &[u8]) {
        self.layout.push(FieldSpec {
            name: name.to_string(),
            offset: self.buf.len(),
            width: bytes.len(),
            encoding,
        });
        self.buf.put_slice(bytes);
    }
}

fn value_len(value: &[ValuePart<'_>]) -> usize {
    value.iter().map(|part| part.bytes.len()).sum()
}
