//! Flowspect DNS - wire decoder, response cache and reverse IP index.
//!
//! This crate holds everything DNS-shaped in the flowspect pipeline:
//!
//! - [`message`] - RFC 1035 wire-format decoder (compression-aware)
//! - [`cache`] - TTL-aware LRU cache of encoded responses
//! - [`index`] - reverse IP → domains mapping built from observed answers
//! - [`engine`] - the [`DnsEngine`] gluing the three together
//!
//! The decoder is a pure function over a byte slice; the cache and index are
//! the only stateful pieces and each sits behind its own mutex. Nothing here
//! performs I/O.

pub mod cache;
pub mod engine;
pub mod index;
pub mod message;

pub use cache::{DnsResponseCache, DEFAULT_CACHE_CAPACITY};
pub use engine::DnsEngine;
pub use index::IpDomainIndex;
pub use message::{DnsHeader, DnsMessage, DnsParseError, DnsQuestion, DnsRecord, RData};
