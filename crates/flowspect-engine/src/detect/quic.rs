//! QUIC long-header recognition.
//!
//! Only the long-header form is recognized (high bit of the first byte set)
//! together with a known version word. Short-header packets carry no version
//! and are indistinguishable from other UDP traffic at this layer.

/// QUIC version 1 (RFC 9000).
const VERSION_1: u32 = 0x0000_0001;
/// QUIC version 2 (RFC 9369).
const VERSION_2: u32 = 0x6b33_43cf;
/// IETF draft version prefix (0xff0000xx).
const DRAFT_PREFIX: u32 = 0xff00_0000;

/// True when the packet looks like a QUIC long-header packet of a known
/// version.
pub fn is_long_header(data: &[u8]) -> bool {
    if data.len() < 5 || data[0] & 0x80 == 0 {
        return false;
    }
    let version = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
    version == VERSION_1 || version == VERSION_2 || (version & 0xffff_ff00) == DRAFT_PREFIX
}
