//! Minimal NGAP header recognizer
//!
//! This is not an APER decoder. It reads the four leading bytes of an NGAP
//! PDU as a fixed header, which is enough to recognize an NG Setup Request
//! and to tag the replies the mock AMF sends back.
//!
//! ```text
//!  0                   1                   2                   3
//! +-------------------+-------------------+---------------------------------+
//! | procedure code    | criticality       | length (u16, big-endian)        |
//! +-------------------+-------------------+---------------------------------+
//! | payload ...
//! ```
//!
//! On the wire a gNB puts the NGAP-PDU choice in byte 0 and the procedure code
//! in byte 1, so an NG Setup Request starts with [`SETUP_REQUEST_TAG`].

/// Procedure code of NG Setup (TS 38.413 id-NGSetup)
pub const NG_SETUP_PROCEDURE_CODE: u8 = 21;

/// Number of bytes [`decode_header`] needs
pub const HEADER_LEN: usize = 4;

/// Two leading bytes of an NG Setup Request: initiatingMessage, id-NGSetup
pub const SETUP_REQUEST_TAG: [u8; 2] = [PduType::InitiatingMessage as u8, NG_SETUP_PROCEDURE_CODE];

/// Keepalive the mock AMF sends after a receive timeout. Not NGAP.
pub const LIVENESS_PROBE: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

/// NGAP-PDU choice as it appears in the first byte of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    /// initiatingMessage
    InitiatingMessage = 0x00,
    /// successfulOutcome
    SuccessfulOutcome = 0x20,
    /// unsuccessfulOutcome
    UnsuccessfulOutcome = 0x40,
}

impl TryFrom<u8> for PduType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PduType::InitiatingMessage),
            0x20 => Ok(PduType::SuccessfulOutcome),
            0x40 => Ok(PduType::UnsuccessfulOutcome),
            other => Err(other),
        }
    }
}

/// Decoded fixed header of one inbound message.
///
/// Borrows the input; it only lives for the duration of one decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgapHeader<'a> {
    /// Byte 0
    pub procedure_code: u8,
    /// Byte 1, passed through uninterpreted
    pub criticality: u8,
    /// Bytes 2-3, big-endian
    pub length: u16,
    /// Everything after the header
    pub payload: &'a [u8],
}

impl NgapHeader<'_> {
    /// The two leading bytes as they were received
    pub fn tag(&self) -> [u8; 2] {
        [self.procedure_code, self.criticality]
    }

    /// Whether the message starts with [`SETUP_REQUEST_TAG`]
    pub fn is_setup_request(&self) -> bool {
        self.tag() == SETUP_REQUEST_TAG
    }

    /// Whether the declared length equals the payload actually present.
    ///
    /// [`decode_header`] never enforces this.
    pub fn declared_length_matches(&self) -> bool {
        self.payload.len() == usize::from(self.length)
    }
}

/// Decodes the fixed header. Returns `None` for fewer than [`HEADER_LEN`] bytes.
///
/// The declared length is not checked against the payload size.
pub fn decode_header(data: &[u8]) -> Option<NgapHeader<'_>> {
    if data.len() < HEADER_LEN {
        return None;
    }

    Some(NgapHeader {
        procedure_code: data[0],
        criticality: data[1],
        length: u16::from_be_bytes([data[2], data[3]]),
        payload: &data[HEADER_LEN..],
    })
}

/// Whether `data` decodes and carries the NG Setup Request tag
pub fn is_setup_request(data: &[u8]) -> bool {
    decode_header(data).is_some_and(|header| header.is_setup_request())
}
