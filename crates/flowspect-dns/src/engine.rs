//! DNS sub-engine: glues the wire decoder, the response cache and the
//! reverse index.
//!
//! Both entry points are fed raw packets straight off the flow. Decoding
//! failures are silently ignored - the worst outcome of malformed DNS is a
//! missed cache opportunity, never an error surfaced to the host.

use flowspect_core::FlowContext;

use crate::cache::{DnsResponseCache, DEFAULT_CACHE_CAPACITY};
use crate::index::IpDomainIndex;
use crate::message::{DnsMessage, HEADER_LEN};

/// DNS query/response processor shared by every flow.
#[derive(Debug, Default)]
pub struct DnsEngine {
    cache: DnsResponseCache,
    index: IpDomainIndex,
}

impl DnsEngine {
    /// Creates an engine with the default cache capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Creates an engine whose response cache holds `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: DnsResponseCache::new(capacity),
            index: IpDomainIndex::new(),
        }
    }

    /// Handles an outbound DNS query.
    ///
    /// Question names are appended to the context's domain list. On a cache
    /// hit the rewritten response bytes are returned; the caller sends them
    /// back to the client instead of forwarding the query upstream.
    /// Malformed input returns `None` without mutating anything.
    pub fn handle_query(&self, ctx: &mut FlowContext, packet: &[u8]) -> Option<Vec<u8>> {
        if packet.is_empty() {
            return None;
        }
        let msg = DnsMessage::parse(packet).ok()?;

        ctx.add_domains(msg.questions.iter().map(|q| q.name.clone()));

        self.cache.respond(packet)
    }

    /// Ingests an inbound DNS response.
    ///
    /// Collects every name the response mentions (question names, answer
    /// owner names, CNAME/PTR/MX/SRV targets) and every A/AAAA address,
    /// appends the names to the context, cross-indexes every address against
    /// every name, and caches the raw response when it carried an address.
    pub fn handle_response(&self, ctx: &mut FlowContext, packet: &[u8]) {
        if packet.len() < HEADER_LEN {
            return;
        }
        let msg = match DnsMessage::parse(packet) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::trace!(error = %err, "ignoring undecodable dns response");
                return;
            }
        };
        if !msg.header.is_response() {
            return;
        }

        let mut names: Vec<String> = Vec::new();
        let push_name = |names: &mut Vec<String>, name: &str| {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        for question in &msg.questions {
            push_name(&mut names, &question.name);
        }

        let mut addresses: Vec<String> = Vec::new();
        for answer in &msg.answers {
            push_name(&mut names, &answer.name);
            if let Some(referenced) = answer.rdata.referenced_name() {
                push_name(&mut names, referenced);
            }
            if let Some(v4) = answer.ipv4() {
                addresses.push(v4.to_string());
            }
            if let Some(v6) = answer.ipv6() {
                addresses.push(v6.to_string());
            }
        }

        ctx.add_domains(names.iter().cloned());

        if !addresses.is_empty() && !names.is_empty() {
            self.index.insert_all(&addresses, &names);
        }

        // Only responses that resolved to an address can answer a future
        // query from the cache.
        if !addresses.is_empty() {
            self.cache.store(packet);
        }
    }

    /// Domains recorded for an address, empty when never observed.
    pub fn domains_for_ip(&self, ip: &str) -> Vec<String> {
        self.index.domains_for(ip)
    }

    /// Number of cached responses.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Number of indexed addresses.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Atomically forgets the response cache and the reverse index.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.index.clear();
        tracing::debug!("dns cache and reverse index cleared");
    }
}

// =============================================================================
// Tests
// =============================================================================
