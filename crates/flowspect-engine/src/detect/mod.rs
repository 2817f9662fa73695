//! Protocol detection and domain extraction.
//!
//! The detector is stateless and lock-free: it dispatches pure recognizers
//! over the packet bytes, first match wins. Detection failures are never
//! errors - the fallback is the transport tag, then [`Protocol::Unknown`].

pub mod banner;
pub mod http;
pub mod quic;
pub mod tls;

use flowspect_core::{FlowContext, FlowType, Protocol};

use crate::config::DEFAULT_HTTP_SCAN_LIMIT;

/// Dispatches protocol recognizers and domain extractors over packet bytes.
#[derive(Debug, Clone)]
pub struct Detector {
    http_scan_limit: usize,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Creates a detector with the default HTTP scan budget.
    pub fn new() -> Self {
        Self {
            http_scan_limit: DEFAULT_HTTP_SCAN_LIMIT,
        }
    }

    /// Creates a detector with a custom HTTP scan budget.
    pub fn with_http_scan_limit(http_scan_limit: usize) -> Self {
        Self { http_scan_limit }
    }

    /// Identifies the application protocol of a packet.
    ///
    /// Dispatch order: DNS by port, TLS record, HTTP/1.x, QUIC (UDP only),
    /// then the banner protocols, then the transport fallback.
    pub fn detect(&self, ctx: &FlowContext, packet: &[u8]) -> Protocol {
        if packet.is_empty() {
            return Protocol::Unknown;
        }
        if ctx.is_dns() {
            return Protocol::Dns;
        }
        if tls::is_handshake_record(packet) {
            return Protocol::Tls;
        }
        if http::is_message(packet) {
            return Protocol::Http;
        }
        if ctx.flow_type == FlowType::Udp && quic::is_long_header(packet) {
            return Protocol::Quic;
        }
        if banner::is_ssh(packet) {
            return Protocol::Ssh;
        }
        if banner::is_ftp(packet) {
            return Protocol::Ftp;
        }
        if banner::is_smtp(packet) {
            return Protocol::Smtp;
        }
        if banner::is_imap(packet) {
            return Protocol::Imap;
        }
        if banner::is_pop3(packet) {
            return Protocol::Pop3;
        }
        match ctx.flow_type {
            FlowType::Tcp => Protocol::Tcp,
            FlowType::Udp => Protocol::Udp,
            FlowType::Dns => Protocol::Dns,
        }
    }

    /// Identifies the protocol and, where the protocol carries one, extracts
    /// the server domain.
    pub fn extract_domain(
        &self,
        ctx: &FlowContext,
        packet: &[u8],
    ) -> (Protocol, Option<String>) {
        if packet.is_empty() {
            return (Protocol::Unknown, None);
        }
        let protocol = self.detect(ctx, packet);
        let domain = match protocol {
            Protocol::Http => http::parse_host(packet, self.http_scan_limit),
            Protocol::Tls | Protocol::Https => tls::parse_sni(packet),
            _ => None,
        };
        if let Some(domain) = &domain {
            tracing::trace!(%protocol, domain = %domain, "extracted domain from payload");
        }
        (protocol, domain)
    }
}

// =============================================================================
// Tests
// =============================================================================
