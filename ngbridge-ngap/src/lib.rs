//! Minimal NGAP support for the bridge
//!
//! No ASN.1 here: just enough framing to recognize an NG Setup Request and
//! answer it from a mock AMF.
//!
//! # Modules
//!
//! - `codec` - fixed four-byte header recognizer
//! - `template` - reply bytes built over a described field layout
//! - `procedures` - NG Setup Response / Failure templates

pub mod codec;
pub mod procedures;
pub mod template;

pub use codec::{
    decode_header, is_setup_request, NgapHeader, PduType, HEADER_LEN, LIVENESS_PROBE,
    NG_SETUP_PROCEDURE_CODE, SETUP_REQUEST_TAG,
};
pub use procedures::{build_setup_failure, build_setup_success, MAX_CAUSE_LEN, UNRECOGNIZED_CAUSE};
pub use template::{Encoding, FieldSpec, ReplyTemplate, TemplateBuilder, TemplateError};
