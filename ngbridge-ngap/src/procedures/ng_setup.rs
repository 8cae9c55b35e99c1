//! NG Setup Response / Failure templates
//!
//! Simplified stand-ins for the APER-encoded messages: the IEs a gNB expects
//! (AMF Name, Served GUAMI List, Relative AMF Capacity, Cause) laid out with
//! plain id/length framing.

use crate::codec::{PduType, NG_SETUP_PROCEDURE_CODE};
use crate::template::{Encoding, ReplyTemplate, TemplateBuilder, TemplateError, ValuePart};

/// id-AMFName
pub const IE_ID_AMF_NAME: u16 = 1;
/// id-Cause
pub const IE_ID_CAUSE: u16 = 15;
/// id-RelativeAMFCapacity
pub const IE_ID_RELATIVE_AMF_CAPACITY: u16 = 86;
/// id-ServedGUAMIList
pub const IE_ID_SERVED_GUAMI_LIST: u16 = 96;

/// Criticality `ignore` as carried in front of one-byte IE lengths
pub const CRITICALITY_IGNORE: u8 = 0x40;

/// Name the mock AMF announces
pub const MOCK_AMF_NAME: &str = "mock-amf";

/// MCC 001
pub const MOCK_MCC: [u8; 3] = [0x00, 0x00, 0x01];
/// MNC 01
pub const MOCK_MNC: u8 = 0x01;
/// AMF Region ID
pub const MOCK_AMF_REGION_ID: u8 = 0x02;
/// AMF Set ID
pub const MOCK_AMF_SET_ID: u16 = 0x0001;
/// AMF Pointer
pub const MOCK_AMF_POINTER: u8 = 0x00;
/// Relative AMF capacity
pub const MOCK_RELATIVE_CAPACITY: u8 = 255;

/// GUAMI list item header
const GUAMI_ITEM_HEADER: [u8; 2] = [0x00, 0x0c];

/// Cause group discriminator: misc
pub const CAUSE_MISC: u8 = 0x00;

/// Longest cause that fits the one-byte cause length (which counts the
/// discriminator too)
pub const MAX_CAUSE_LEN: usize = 254;

/// Cause sent when the first message is not an NG Setup Request
pub const UNRECOGNIZED_CAUSE: &str = "unrecognized message";

/// Builds the NG Setup Response the mock AMF sends.
///
/// Deterministic: the same bytes on every call. Every declared length counts
/// the bytes actually emitted (message `0x24`, 3 IEs, GUAMI list `0x0a`), so
/// the reply is not byte-identical to mocks that declare `0x2e`, 4 IEs and
/// `0x0e` for the same content.
pub fn build_setup_success() -> ReplyTemplate {
    let name = MOCK_AMF_NAME.as_bytes();
    let name_prefix = [0x00, name.len() as u8];
    let set_id = MOCK_AMF_SET_ID.to_be_bytes();

    let template = TemplateBuilder::new(PduType::SuccessfulOutcome, NG_SETUP_PROCEDURE_CODE)
        .ie_wide(
            "amf_name",
            IE_ID_AMF_NAME,
            &[
                ValuePart::new("prefix", Encoding::Octets, &name_prefix),
                ValuePart::new("value", Encoding::Ascii, name),
            ],
        )
        .and_then(|b| {
            b.ie_wide(
                "served_guami_list",
                IE_ID_SERVED_GUAMI_LIST,
                &[
                    ValuePart::new("item_header", Encoding::Octets, &GUAMI_ITEM_HEADER),
                    ValuePart::new("mcc", Encoding::Octets, &MOCK_MCC),
                    ValuePart::new("mnc", Encoding::Uint8, &[MOCK_MNC]),
                    ValuePart::new("amf_region_id", Encoding::Uint8, &[MOCK_AMF_REGION_ID]),
                    ValuePart::new("amf_set_id", Encoding::Uint16Be, &set_id),
                    ValuePart::new("amf_pointer", Encoding::Uint8, &[MOCK_AMF_POINTER]),
                ],
            )
        })
        .and_then(|b| {
            b.ie_short(
                "relative_amf_capacity",
                IE_ID_RELATIVE_AMF_CAPACITY,
                CRITICALITY_IGNORE,
                &[ValuePart::new("value", Encoding::Uint8, &[MOCK_RELATIVE_CAPACITY])],
            )
        })
        .and_then(TemplateBuilder::build);

    // Every length above is a compile-time constant well inside its field.
    match template {
        Ok(template) => template,
        Err(e) => unreachable!("fixed NG Setup Response layout overflowed: {e}"),
    }
}

/// Builds an NG Setup Failure carrying `cause` as a misc cause.
///
/// The cause length byte is `cause.len() + 1`; a cause longer than
/// [`MAX_CAUSE_LEN`] bytes is rejected.
pub fn build_setup_failure(cause: &str) -> Result<ReplyTemplate, TemplateError> {
    let cause = cause.as_bytes();
    if cause.len() > MAX_CAUSE_LEN {
        return Err(TemplateError::CauseTooLong {
            len: cause.len(),
            max: MAX_CAUSE_LEN,
        });
    }

    TemplateBuilder::new(PduType::UnsuccessfulOutcome, NG_SETUP_PROCEDURE_CODE)
        .ie_short(
            "cause",
            IE_ID_CAUSE,
            CRITICALITY_IGNORE,
            &[
                ValuePart::new("group", Encoding::Tag, &[CAUSE_MISC]),
                ValuePart::new("value", Encoding::Ascii, cause),
            ],
        )?
        .build()
}
