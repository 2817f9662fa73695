//! TLS record inspection and SNI extraction.
//!
//! Only the ClientHello (handshake type 0x01) is inspected, and only the
//! `server_name` extension (type 0x0000) with the `host_name` entry kind
//! (0x00) is interpreted. The ClientHello is assumed to fit in a single
//! record; fragmented hellos yield no SNI. Every length field is
//! bounds-checked against the packet - an overflowing length means "no SNI",
//! never a parse error.

/// TLS record content type for handshake messages.
const CONTENT_HANDSHAKE: u8 = 0x16;
/// Handshake message type for ClientHello.
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
/// Extension type carrying the server name.
const EXT_SERVER_NAME: u16 = 0x0000;
/// server_name entry kind for a DNS host name.
const NAME_KIND_HOST: u8 = 0x00;

/// Offset of the session-id length byte inside the record:
/// 5 (record header) + 4 (handshake header) + 2 (version) + 32 (random).
const SESSION_ID_LEN_OFFSET: usize = 43;

/// True when the packet starts a TLS handshake record.
///
/// The record-layer version gate is 0x0301..=0x0304. Real TLS 1.3
/// ClientHellos still advertise 0x0301 at the record layer, so the gate must
/// not be tightened.
pub fn is_handshake_record(data: &[u8]) -> bool {
    data.len() >= 3
        && data[0] == CONTENT_HANDSHAKE
        && data[1] == 0x03
        && (0x01..=0x04).contains(&data[2])
}

/// True when the record carries a ClientHello.
pub fn is_client_hello(data: &[u8]) -> bool {
    is_handshake_record(data) && data.len() > 5 && data[5] == HANDSHAKE_CLIENT_HELLO
}

fn read_u16(data: &[u8], pos: usize) -> Option<u16> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
}

/// Extracts the server name from a ClientHello record, if present.
pub fn parse_sni(data: &[u8]) -> Option<String> {
    if !is_client_hello(data) {
        return None;
    }

    // Skip session id, cipher suites and compression methods.
    let mut pos = SESSION_ID_LEN_OFFSET;
    let session_len = *data.get(pos)? as usize;
    pos += 1 + session_len;

    let cipher_len = read_u16(data, pos)? as usize;
    pos += 2 + cipher_len;

    let comp_len = *data.get(pos)? as usize;
    pos += 1 + comp_len;

    let ext_total = read_u16(data, pos)? as usize;
    pos += 2;
    let ext_end = pos.checked_add(ext_total)?.min(data.len());

    while pos + 4 <= ext_end {
        let ext_type = read_u16(data, pos)?;
        let ext_len = read_u16(data, pos + 2)? as usize;
        pos += 4;
        if pos + ext_len > ext_end {
            return None;
        }
        if ext_type == EXT_SERVER_NAME {
            return parse_server_name(&data[pos..pos + ext_len]);
        }
        pos += ext_len;
    }

    None
}

/// Walks the server_name_list inside the extension body.
fn parse_server_name(body: &[u8]) -> Option<String> {
    // Two bytes of list length, then (kind, len, bytes) entries.
    let mut pos = 2;
    while pos + 3 <= body.len() {
        let kind = body[pos];
        let len = read_u16(body, pos + 1)? as usize;
        pos += 3;
        if pos + len > body.len() {
            return None;
        }
        if kind == NAME_KIND_HOST {
            let name = &body[pos..pos + len];
            if name.is_empty() || !name.is_ascii() {
                return None;
            }
            return String::from_utf8(name.to_vec()).ok();
        }
        pos += len;
    }
    None
}

// =============================================================================
// Tests
// =============================================================================
