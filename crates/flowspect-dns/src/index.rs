//! Reverse IP → domains index built from observed DNS answers.
//!
//! Every address seen in a response is mapped to every name the response
//! mentioned; a later flow towards one of those addresses can recover the
//! server names without inspecting a single payload byte. Entries have no
//! per-item TTL - the index reflects everything observed since the last
//! [`IpDomainIndex::clear`].

use std::collections::HashMap;

use parking_lot::Mutex;

/// Concurrent multi-valued IP → domains mapping.
///
/// Keys are canonical address text without brackets. Value lists are
/// insertion-ordered and deduplicated, which makes concurrent ingest
/// commutative: the final state is the union of the observed pairs
/// regardless of interleaving.
#[derive(Debug, Default)]
pub struct IpDomainIndex {
    inner: Mutex<HashMap<String, Vec<String>>>,
}

impl IpDomainIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps one address to every domain in `domains`.
    ///
    /// Empty addresses and empty domains are silently skipped.
    pub fn insert(&self, ip: &str, domains: &[String]) {
        if ip.is_empty() || domains.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        let entry = inner.entry(ip.to_string()).or_default();
        for domain in domains {
            if domain.is_empty() || entry.contains(domain) {
                continue;
            }
            entry.push(domain.clone());
            tracing::trace!(ip, domain = %domain, "indexed dns mapping");
        }
    }

    /// Maps every address to every domain.
    pub fn insert_all(&self, ips: &[String], domains: &[String]) {
        for ip in ips {
            self.insert(ip, domains);
        }
    }

    /// Snapshot of the domains recorded for an address; empty when the
    /// address was never observed.
    pub fn domains_for(&self, ip: &str) -> Vec<String> {
        self.inner.lock().get(ip).cloned().unwrap_or_default()
    }

    /// Number of indexed addresses.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no address is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every mapping.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn insert_and_lookup() {
        let index = IpDomainIndex::new();
        index.insert("93.184.216.34", &strings(&["example.com"]));
        assert_eq!(index.domains_for("93.184.216.34"), strings(&["example.com"]));
        assert!(index.domains_for("1.1.1.1").is_empty());
    }

    #[test]
    fn insert_dedups_per_address() {
        let index = IpDomainIndex::new();
        index.insert("1.2.3.4", &strings(&["a.com", "b.com"]));
        index.insert("1.2.3.4", &strings(&["b.com", "a.com", "c.com"]));
        assert_eq!(
            index.domains_for("1.2.3.4"),
            strings(&["a.com", "b.com", "c.com"])
        );
    }

    #[test]
    fn empty_ip_and_domains_skipped() {
        let index = IpDomainIndex::new();
        index.insert("", &strings(&["a.com"]));
        index.insert("1.2.3.4", &strings(&["", "a.com"]));
        assert!(index.domains_for("").is_empty());
        assert_eq!(index.domains_for("1.2.3.4"), strings(&["a.com"]));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn insert_all_crosses_ips_and_domains() {
        let index = IpDomainIndex::new();
        index.insert_all(
            &strings(&["183.2.172.177", "183.2.172.17"]),
            &strings(&["www.baidu.com", "www.a.shifen.com"]),
        );
        for ip in ["183.2.172.177", "183.2.172.17"] {
            let domains = index.domains_for(ip);
            assert!(domains.contains(&"www.baidu.com".to_string()));
            assert!(domains.contains(&"www.a.shifen.com".to_string()));
        }
    }

    #[test]
    fn ingest_order_does_not_change_the_set() {
        let a = IpDomainIndex::new();
        a.insert("1.1.1.1", &strings(&["x.com"]));
        a.insert("1.1.1.1", &strings(&["y.com"]));

        let b = IpDomainIndex::new();
        b.insert("1.1.1.1", &strings(&["y.com"]));
        b.insert("1.1.1.1", &strings(&["x.com"]));

        let mut from_a = a.domains_for("1.1.1.1");
        let mut from_b = b.domains_for("1.1.1.1");
        from_a.sort();
        from_b.sort();
        assert_eq!(from_a, from_b);
    }

    #[test]
    fn clear_forgets_everything() {
        let index = IpDomainIndex::new();
        index.insert("1.2.3.4", &strings(&["a.com"]));
        index.clear();
        assert!(index.is_empty());
        assert!(index.domains_for("1.2.3.4").is_empty());
    }

    #[test]
    fn concurrent_ingest_is_a_union() {
        use std::sync::Arc;
        use std::thread;

        let index = Arc::new(IpDomainIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let index = index.clone();
                thread::spawn(move || {
                    index.insert("10.0.0.1", &[format!("host{i}.test")]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let domains = index.domains_for("10.0.0.1");
        assert_eq!(domains.len(), 8);
        for i in 0..8 {
            assert!(domains.contains(&format!("host{i}.test")));
        }
    }
}
