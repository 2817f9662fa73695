//! HTTP/1.x recognition and `Host:` extraction.
//!
//! Requests are identified by a method token followed by a space (the
//! trailing space keeps e.g. `GETTY` from matching); responses by the
//! `HTTP/` prefix. Only ASCII is assumed. Headers beyond the configured scan
//! budget are not examined, so a `Host:` line straddling the boundary is
//! silently missed.

/// Request/response prefixes that identify HTTP/1.x traffic.
const PREFIXES: &[&[u8]] = &[
    b"GET ",
    b"POST ",
    b"PUT ",
    b"HEAD ",
    b"DELETE ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"HTTP/",
];

/// True when the packet starts like an HTTP/1.x message.
pub fn is_message(data: &[u8]) -> bool {
    PREFIXES.iter().any(|prefix| data.starts_with(prefix))
}

/// Extracts the target host from an HTTP packet.
///
/// For `CONNECT host[:port]` requests the request-line target itself is the
/// host (port stripped). Otherwise the first `scan_limit` bytes are scanned
/// for a case-insensitive `Host:` header.
pub fn parse_host(data: &[u8], scan_limit: usize) -> Option<String> {
    if let Some(rest) = data.strip_prefix(b"CONNECT ") {
        return connect_target(rest);
    }
    if !is_message(data) {
        return None;
    }

    let window = &data[..data.len().min(scan_limit)];
    for line in window.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() < 5 || !line[..5].eq_ignore_ascii_case(b"host:") {
            continue;
        }
        let value = trim_ascii(&line[5..]);
        if value.is_empty() || !value.is_ascii() {
            return None;
        }
        return String::from_utf8(value.to_vec()).ok();
    }
    None
}

/// Parses the `host[:port]` target of a CONNECT request line.
fn connect_target(rest: &[u8]) -> Option<String> {
    let end = rest
        .iter()
        .position(|&b| b == b' ' || b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    let target = &rest[..end];
    if target.is_empty() || !target.is_ascii() {
        return None;
    }
    let target = std::str::from_utf8(target).ok()?;
    let host = target.split(':').next().unwrap_or(target);
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

// =============================================================================
// Tests
// =============================================================================
