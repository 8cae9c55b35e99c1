//! NGAP procedures
//!
//! Only NG Setup (TS 38.413 section 8.7.1) is modeled, and only from the AMF
//! side: the replies a mock AMF sends to an NG Setup Request.

pub mod ng_setup;

pub use ng_setup::*;
