//! TTL-aware LRU cache of encoded DNS responses.
//!
//! The cache stores whole response packets keyed by their first question and
//! answers a later query by rewriting the transaction id over a copy of the
//! stored bytes. Only responses that could answer a future query usefully are
//! kept: the QR bit must be set, the TC bit clear, at least one A/AAAA answer
//! present and the minimum answer TTL non-zero.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::message::DnsMessage;

/// Default number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 2048;

/// Normalized cache key: lowercased qname plus qtype and qclass. Names are
/// lowercased during wire decoding, so the tuple is already canonical.
type QuestionKey = (String, u16, u16);

#[derive(Debug)]
struct CacheEntry {
    response: Vec<u8>,
    expires_at: Instant,
}

/// Storage behind the lock: entries plus recency order, least recently used
/// first.
#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<QuestionKey, CacheEntry>,
    order: Vec<QuestionKey>,
}

impl CacheInner {
    fn touch(&mut self, key: &QuestionKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let key = self.order.remove(pos);
            self.order.push(key);
        }
    }
}

/// Bounded store of encoded DNS responses.
///
/// A single internal mutex serializes readers and writers; the hit path
/// copies the response bytes out before the caller transmits, so the lock is
/// never held across host I/O.
#[derive(Debug)]
pub struct DnsResponseCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl Default for DnsResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl DnsResponseCache {
    /// Creates a cache holding at most `capacity` responses.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored responses, expired entries included until evicted.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached response.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Ingests a raw response packet.
    ///
    /// Returns true if the packet was cached. Queries, truncated responses,
    /// responses without an A/AAAA answer and zero-TTL responses are skipped.
    pub fn store(&self, packet: &[u8]) -> bool {
        self.store_at(packet, Instant::now())
    }

    fn store_at(&self, packet: &[u8], now: Instant) -> bool {
        let msg = match DnsMessage::parse(packet) {
            Ok(msg) => msg,
            Err(_) => return false,
        };
        if !msg.header.is_response() || msg.header.is_truncated() {
            return false;
        }
        if !msg.has_address_answer() {
            return false;
        }
        let min_ttl = match msg.min_answer_ttl() {
            Some(ttl) if ttl > 0 => ttl,
            _ => return false,
        };
        let question = match msg.first_question() {
            Some(q) => q,
            None => return false,
        };

        let key: QuestionKey = (question.name.clone(), question.qtype, question.qclass);
        let entry = CacheEntry {
            response: packet.to_vec(),
            expires_at: now + Duration::from_secs(u64::from(min_ttl)),
        };

        let mut inner = self.inner.lock();
        if inner.entries.insert(key.clone(), entry).is_some() {
            inner.touch(&key);
        } else {
            if inner.entries.len() > self.capacity {
                if let Some(oldest) = inner.order.first().cloned() {
                    inner.entries.remove(&oldest);
                    inner.order.remove(0);
                    tracing::debug!(qname = %oldest.0, "evicted least recently used dns response");
                }
            }
            inner.order.push(key.clone());
        }
        tracing::debug!(qname = %key.0, qtype = key.1, ttl = min_ttl, "cached dns response");
        true
    }

    /// Builds a response image for a raw query packet.
    ///
    /// On a fresh hit, returns the cached response with its transaction id
    /// rewritten to the query's; every other byte is transmitted verbatim.
    /// Expired entries miss and are evicted on the spot.
    pub fn respond(&self, query: &[u8]) -> Option<Vec<u8>> {
        self.respond_at(query, Instant::now())
    }

    fn respond_at(&self, query: &[u8], now: Instant) -> Option<Vec<u8>> {
        let msg = DnsMessage::parse(query).ok()?;
        let question = msg.first_question()?;
        let key: QuestionKey = (question.name.clone(), question.qtype, question.qclass);

        let mut response = {
            let mut inner = self.inner.lock();
            let expires_at = inner.entries.get(&key)?.expires_at;
            if expires_at <= now {
                inner.entries.remove(&key);
                if let Some(pos) = inner.order.iter().position(|k| k == &key) {
                    inner.order.remove(pos);
                }
                tracing::debug!(qname = %key.0, "expired dns response dropped");
                return None;
            }
            inner.touch(&key);
            inner.entries[&key].response.clone()
        };

        response[0..2].copy_from_slice(&msg.header.id.to_be_bytes());
        tracing::debug!(qname = %key.0, qtype = key.1, "dns cache hit");
        Some(response)
    }
}

// =============================================================================
// Tests
// =============================================================================
